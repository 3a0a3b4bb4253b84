use thiserror::Error;

#[derive(Debug, Error)]
pub enum RedgreenError {
    #[error("no TDD cycle started: run 'redgreen start feature <description>'")]
    NoCycle,

    #[error("timed out after {waited_ms}ms waiting for lock {path}")]
    LockTimeout { path: String, waited_ms: u64 },

    #[error("invalid phase: {0}")]
    InvalidPhase(String),

    #[error("invalid strictness '{0}': expected strict, standard or relaxed")]
    InvalidStrictness(String),

    #[error("invalid task kind '{0}': expected feature, bug or refactor")]
    InvalidTaskKind(String),

    #[error("invalid transition from {from} to {to}: {reason}")]
    InvalidTransition {
        from: String,
        to: String,
        reason: String,
    },

    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RedgreenError>;
