use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Mailbox error: {0}")]
    Mailbox(String),

    #[error("HTTP error: {0}")]
    Http(String),

    /// The site refused the session outright; retrying cannot help.
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// The same UI state survived every escalation tier.
    #[error("Stuck in state {state} after {count} consecutive cycles (cycle {cycle})")]
    Stuck {
        state: String,
        count: u32,
        cycle: u32,
    },

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this error must end the run instead of being folded into
    /// stagnation accounting.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::AccessDenied(_) | Error::Stuck { .. } | Error::Timeout(_) | Error::Config(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
