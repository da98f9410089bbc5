//! Error types.

/// Categorized exchange adapter failures. The state machine matches on these
/// explicitly: an entry aborts on any of them, an exit proceeds unreconciled.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExchangeError {
    #[error("insufficient funds: {reason}")]
    InsufficientFunds { reason: String },

    #[error("invalid order: {reason}")]
    InvalidOrder { reason: String },

    #[error("network error: {reason}")]
    Network { reason: String },

    #[error("exchange error: {reason}")]
    Exchange { reason: String },
}

/// Top-level error type for kestrel.
#[derive(Debug, thiserror::Error)]
pub enum KestrelError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Exchange(#[from] ExchangeError),

    #[error("snapshot feed error: {reason}")]
    Feed { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&KestrelError> for std::process::ExitCode {
    fn from(err: &KestrelError) -> Self {
        let code: u8 = match err {
            KestrelError::Io(_) => 1,
            KestrelError::ConfigParse { .. }
            | KestrelError::ConfigMissing { .. }
            | KestrelError::ConfigInvalid { .. } => 2,
            KestrelError::Database { .. } | KestrelError::DatabaseQuery { .. } => 3,
            KestrelError::Exchange(_) => 4,
            KestrelError::Feed { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
