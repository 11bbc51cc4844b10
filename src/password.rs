//! Password policy and hashing
//!
//! Registration enforces a length-only policy (at least 8 characters, at
//! most 128) and stores an Argon2id PHC string. Plain passwords never leave
//! this module.
//!
//! ```ignore
//! use multibpo_mvp::password::{hash_password, verify_password, PasswordPolicy};
//!
//! PasswordPolicy::default().validate("senha123456")?;
//! let hash = hash_password("senha123456")?;
//! assert!(verify_password("senha123456", &hash));
//! ```

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::rngs::OsRng;
use thiserror::Error;

/// Length policy applied to new passwords
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordPolicy {
    /// Minimum number of characters
    pub min_length: usize,
    /// Maximum number of characters
    pub max_length: usize,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            max_length: 128,
        }
    }
}

impl PasswordPolicy {
    /// Check a candidate password against the policy.
    ///
    /// Lengths are counted in characters, not bytes.
    pub fn validate(&self, password: &str) -> Result<(), PasswordError> {
        let len = password.chars().count();
        if len < self.min_length {
            return Err(PasswordError::TooShort {
                min: self.min_length,
                actual: len,
            });
        }
        if len > self.max_length {
            return Err(PasswordError::TooLong {
                max: self.max_length,
                actual: len,
            });
        }
        Ok(())
    }
}

/// Password policy and hashing errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PasswordError {
    #[error("Password must be at least {min} characters (got {actual})")]
    TooShort { min: usize, actual: usize },

    #[error("Password must be at most {max} characters (got {actual})")]
    TooLong { max: usize, actual: usize },

    #[error("Password hashing failed: {0}")]
    Hashing(String),
}

impl PasswordError {
    /// Message shown on the `password` field for policy violations
    pub fn user_message(&self) -> String {
        match self {
            Self::TooShort { min, .. } => format!(
                "Esta senha é muito curta. Ela precisa conter pelo menos {} caracteres.",
                min
            ),
            Self::TooLong { max, .. } => format!(
                "Certifique-se de que este campo não tenha mais de {} caracteres.",
                max
            ),
            Self::Hashing(_) => "Não foi possível processar a senha.".to_string(),
        }
    }
}

/// Hash a password with Argon2id and a random salt.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordError::Hashing(e.to_string()))
}

/// Verify a password against a stored PHC hash.
///
/// An unparseable stored hash verifies as `false`.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}
