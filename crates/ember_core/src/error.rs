use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Why an account could not be kept during a refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshFailure {
    /// The provider rejected the stored credentials
    Rejected(String),
    /// The stored record already carried an error flag
    StoredError,
    /// Refresh succeeded but no display name could be found
    MissingDisplayName,
    /// The account's provider type is not one we can refresh
    UnknownProvider(String),
}

impl fmt::Display for RefreshFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected(msg) => write!(f, "{}", msg),
            Self::StoredError => write!(f, "stored account is flagged as errored"),
            Self::MissingDisplayName => write!(f, "refreshed account has no display name"),
            Self::UnknownProvider(kind) => write!(f, "account type '{}' not found", kind),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    // =========================================================================
    // Accounts
    // =========================================================================
    #[error("{provider} provider error: {message}")]
    Provider { provider: String, message: String },

    #[error("unknown account provider type: {0}")]
    UnknownProvider(String),

    #[error("account has no resolvable display name")]
    UnresolvableDisplayName,

    #[error("account '{0}' not found")]
    AccountNotFound(String),

    #[error("no account selected")]
    NoAccountSelected,

    #[error("invalid username: {0}")]
    InvalidUsername(String),

    // =========================================================================
    // Instances
    // =========================================================================
    #[error("instance '{0}' not found")]
    InstanceNotFound(String),

    #[error("no instance selected")]
    NoInstanceSelected,

    #[error("account '{account}' is not authorized for instance '{instance}'")]
    InstanceNotAuthorized { instance: String, account: String },

    #[error("unlock code is empty")]
    EmptyUnlockCode,

    // =========================================================================
    // Settings
    // =========================================================================
    #[error("invalid java executable: {0}")]
    InvalidJavaPath(PathBuf),

    #[error("invalid resolution {width}x{height}")]
    InvalidResolution { width: u32, height: u32 },

    // =========================================================================
    // Infrastructure
    // =========================================================================
    #[error("launcher is under maintenance: {0}")]
    Maintenance(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("invalid response from server: {0}")]
    InvalidServerResponse(String),

    #[error("game launch failed: {0}")]
    Launch(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}
