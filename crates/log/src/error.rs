pub type LogResult<T> = Result<T, LogError>;

#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("invalid filter '{directive}': {reason}")]
    Filter { directive: String, reason: String },

    #[error("unknown log format '{0}'")]
    Format(String),

    /// A global subscriber was already installed.
    #[error("logger init failed: {0}")]
    Init(String),
}
