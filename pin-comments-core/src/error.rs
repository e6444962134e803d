//! Error types, one enum per concern.
//!
//! Remote and cache failures are logged and swallowed by the state model;
//! `Rejected` is the only error an interactive caller sees from a mutation.

/// Failure talking to the remote comment table.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("failed to {op} comments: {status} {body}")]
    Status {
        op: &'static str,
        status: u16,
        body: String,
    },
}

impl RemoteError {
    /// HTTP status of the failed response, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            RemoteError::Status { status, .. } => Some(*status),
            RemoteError::Transport(e) => e.status().map(|s| s.as_u16()),
        }
    }
}

/// Failure reading or writing the local cache.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The cache file could not be opened.
    #[error("cannot open local cache: {0}")]
    Open(#[from] rusqlite::Error),

    #[error("local cache: {0}")]
    Sqlite(#[from] tokio_rusqlite::Error),

    #[error("local cache entry {key} is not valid JSON: {source}")]
    Json {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// A mutation refused at its entry point. State is unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejected {
    #[error("no pin has been placed")]
    NoPendingPosition,

    #[error("text is empty")]
    EmptyText,

    #[error("display name is empty")]
    EmptyName,

    #[error("no comment with id {0}")]
    UnknownComment(String),
}

/// Setup flow error.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("both the backend URL and the access token are required")]
    MissingCredentials,

    #[error("cannot {action} while in step {from}")]
    InvalidTransition {
        from: &'static str,
        action: &'static str,
    },

    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Configuration file error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),
}
