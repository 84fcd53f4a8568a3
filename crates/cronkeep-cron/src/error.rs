use thiserror::Error;

/// Errors returned synchronously by registry operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CronError {
    /// A job with this name is already registered.
    #[error("cron job \"{name}\" already exists")]
    DuplicateName { name: String },

    /// The name has the shape of a generated name (`cron-` followed by digits).
    #[error("cron job name \"{name}\" uses the reserved prefix \"{prefix}\"")]
    ReservedName { name: String, prefix: &'static str },

    /// The schedule pattern could not be parsed.
    #[error("invalid pattern \"{pattern}\": {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

pub type Result<T> = std::result::Result<T, CronError>;

/// Raised on the timer's execution context when a deferred registration fails.
///
/// Never returned to a caller: it becomes the panic message of the timer callback.
#[derive(Debug, Error)]
#[error("deferred registration of cron job {} failed: {source}", .name.as_deref().unwrap_or("<unnamed>"))]
pub struct DeferredRegistrationFault {
    pub name: Option<String>,
    #[source]
    pub source: CronError,
}
