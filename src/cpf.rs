//! CPF (Cadastro de Pessoas Físicas) handling
//!
//! A CPF is 11 decimal digits, the last two being mod-11 check digits over
//! the preceding ones. Input may arrive punctuated (`111.444.777-35`) or bare
//! (`11144477735`); both canonicalize to the punctuated form, which is what
//! gets stored and compared for uniqueness.
//!
//! ```
//! use multibpo_mvp::cpf::Cpf;
//!
//! let cpf = Cpf::parse("11144477735").unwrap();
//! assert_eq!(cpf.as_str(), "111.444.777-35");
//! assert!(Cpf::parse("123.456.789-00").is_err());
//! ```

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Number of digits in a CPF, check digits included
pub const CPF_LEN: usize = 11;

/// Why a CPF was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CpfError {
    #[error("CPF is empty")]
    Empty,

    #[error("CPF must have 11 digits, got {0}")]
    WrongLength(usize),

    #[error("CPF digits are all identical")]
    RepeatedDigits,

    #[error("CPF check digits do not match")]
    BadChecksum,
}

/// A checksum-valid CPF in canonical `NNN.NNN.NNN-NN` form
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Cpf(String);

impl Cpf {
    /// Strip punctuation, validate the check digits and canonicalize.
    pub fn parse(input: &str) -> Result<Self, CpfError> {
        let digits = strip(input);
        validate_digits(&digits)?;
        Ok(Self(format_digits(&digits)))
    }

    /// Canonical punctuated form
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The 11 bare digits
    pub fn digits(&self) -> String {
        strip(&self.0)
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Cpf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Cpf {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Keep only ASCII digits.
pub fn strip(input: &str) -> String {
    input.chars().filter(char::is_ascii_digit).collect()
}

/// Whether `input` (punctuated or bare) is a valid CPF.
pub fn is_valid(input: &str) -> bool {
    validate_digits(&strip(input)).is_ok()
}

/// Format 11 bare digits as `NNN.NNN.NNN-NN`.
///
/// Input that is not exactly 11 digits is returned unchanged.
pub fn format_digits(digits: &str) -> String {
    if digits.len() != CPF_LEN || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return digits.to_string();
    }
    format!(
        "{}.{}.{}-{}",
        &digits[..3],
        &digits[3..6],
        &digits[6..9],
        &digits[9..]
    )
}

fn validate_digits(digits: &str) -> Result<(), CpfError> {
    if digits.is_empty() {
        return Err(CpfError::Empty);
    }
    if digits.len() != CPF_LEN {
        return Err(CpfError::WrongLength(digits.len()));
    }

    let values: Vec<u32> = digits.bytes().map(|b| u32::from(b - b'0')).collect();

    // 000.000.000-00, 111.111.111-11, ... pass the arithmetic but are not issued
    if values.iter().all(|&d| d == values[0]) {
        return Err(CpfError::RepeatedDigits);
    }

    let first = check_digit(&values[..9]);
    let second = check_digit(&values[..10]);
    if values[9] != first || values[10] != second {
        return Err(CpfError::BadChecksum);
    }
    Ok(())
}

/// Mod-11 check digit; weights run from `len + 1` down to 2.
fn check_digit(values: &[u32]) -> u32 {
    let weight_start = values.len() as u32 + 1;
    let sum: u32 = values
        .iter()
        .enumerate()
        .map(|(i, &d)| d * (weight_start - i as u32))
        .sum();
    match sum % 11 {
        r if r < 2 => 0,
        r => 11 - r,
    }
}
