use thiserror::Error;

/// Unified error type for the entire Grocha runtime.
#[derive(Error, Debug)]
pub enum GrochaError {
    // ── User-facing errors ─────────────────────────────────────
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    // ── Action errors ──────────────────────────────────────────
    #[error("{action} failed for {subject}: {reason}")]
    PartialActionFailure {
        action: String,
        subject: String,
        reason: String,
    },

    #[error("fault: {0}")]
    Fault(String),

    // ── Platform errors ────────────────────────────────────────
    #[error("platform error: {platform}: {reason}")]
    Platform { platform: String, reason: String },

    #[error("platform not connected: {0}")]
    PlatformNotConnected(String),

    // ── External services ──────────────────────────────────────
    #[error("service error: {service}: {reason}")]
    Service { service: String, reason: String },

    // ── Memory errors ──────────────────────────────────────────
    #[error("memory error: {0}")]
    Memory(String),

    // ── Config errors ──────────────────────────────────────────
    #[error("config error: {0}")]
    Config(String),

    #[error("config validation failed: {field}: {reason}")]
    ConfigValidation { field: String, reason: String },

    // ── Generic wrappers ───────────────────────────────────────
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl GrochaError {
    /// Errors that are answered with a direct reply instead of going through
    /// the fault path (apology + diagnostics channel).
    pub fn is_user_facing(&self) -> bool {
        matches!(self, GrochaError::InvalidInput(_) | GrochaError::NotFound(_))
    }

    pub fn platform(platform: &str, reason: impl Into<String>) -> Self {
        GrochaError::Platform {
            platform: platform.to_string(),
            reason: reason.into(),
        }
    }

    pub fn service(service: &str, reason: impl Into<String>) -> Self {
        GrochaError::Service {
            service: service.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, GrochaError>;
