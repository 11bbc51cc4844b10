//! Structured security events
//!
//! Each event carries a stable `security_event` name, a category and a
//! severity so log pipelines can route identity activity without parsing
//! messages.
//!
//! ```ignore
//! security_event!(
//!     SecurityEvent::LoginFailed,
//!     email = %email,
//!     reason = "wrong_password",
//!     "Login rejected"
//! );
//! ```

use std::fmt;

/// Identity-relevant events emitted by the service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityEvent {
    /// Credentials accepted and tokens issued
    LoginSucceeded,
    LoginFailed,
    Logout,

    /// Bearer token accepted on a protected route
    AccessGranted,
    /// Missing, invalid or expired bearer token, or a 401/403 response
    AccessDenied,

    /// Account and MVP profile created together
    AccountRegistered,
    /// Account or profile active flag flipped
    AccountStatusChanged,
    AccountDeleted,

    /// 5xx response
    ServerError,

    SystemStartup,
    SystemShutdown,
    DatabaseConnected,
}

impl SecurityEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::LoginSucceeded => "login_succeeded",
            Self::LoginFailed => "login_failed",
            Self::Logout => "logout",
            Self::AccessGranted => "access_granted",
            Self::AccessDenied => "access_denied",
            Self::AccountRegistered => "account_registered",
            Self::AccountStatusChanged => "account_status_changed",
            Self::AccountDeleted => "account_deleted",
            Self::ServerError => "server_error",
            Self::SystemStartup => "system_startup",
            Self::SystemShutdown => "system_shutdown",
            Self::DatabaseConnected => "database_connected",
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            Self::LoginSucceeded | Self::LoginFailed | Self::Logout => "authentication",
            Self::AccessGranted | Self::AccessDenied => "authorization",
            Self::AccountRegistered | Self::AccountStatusChanged | Self::AccountDeleted => "identity",
            Self::ServerError => "availability",
            Self::SystemStartup | Self::SystemShutdown | Self::DatabaseConnected => "lifecycle",
        }
    }

    pub fn severity(&self) -> Severity {
        use Severity::*;
        match self {
            Self::ServerError => Critical,
            Self::LoginFailed | Self::AccessDenied => High,
            Self::LoginSucceeded | Self::AccountRegistered | Self::AccountStatusChanged | Self::AccountDeleted => {
                Medium
            }
            _ => Low,
        }
    }
}

impl fmt::Display for SecurityEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Severity, mapped onto tracing levels by [`security_event!`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Emit a [`SecurityEvent`] with extra structured fields.
///
/// Critical events log at `error`, high at `warn`, medium at `info` and
/// low at `debug`.
#[macro_export]
macro_rules! security_event {
    ($event:expr, $($field:tt)*) => {{
        let event: $crate::observability::SecurityEvent = $event;
        let severity = event.severity();
        match severity {
            $crate::observability::Severity::Critical => ::tracing::error!(
                security_event = event.name(), category = event.category(), severity = severity.as_str(), $($field)*
            ),
            $crate::observability::Severity::High => ::tracing::warn!(
                security_event = event.name(), category = event.category(), severity = severity.as_str(), $($field)*
            ),
            $crate::observability::Severity::Medium => ::tracing::info!(
                security_event = event.name(), category = event.category(), severity = severity.as_str(), $($field)*
            ),
            $crate::observability::Severity::Low => ::tracing::debug!(
                security_event = event.name(), category = event.category(), severity = severity.as_str(), $($field)*
            ),
        }
    }};
}
