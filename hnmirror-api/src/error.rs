#[derive(Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    /// The value read at `path` was missing required fields; absorbed
    /// into "no item" everywhere a batch or a tree can tolerate it
    #[error("failed to parse value at {0}")]
    ParsingFailed(String),

    #[error("network error at {path}: {message}")]
    Network { path: String, message: String },

    #[error("observer failed at {path}: {message}")]
    ObserverFailed { path: String, message: String },
}
