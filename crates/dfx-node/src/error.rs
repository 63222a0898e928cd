use dfx_core::{InvariantViolation, LedgerError};
use std::fmt;

/// Errors surfaced by node commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeError {
    /// Transaction or command rejected by ledger rules; nothing was changed
    Ledger(LedgerError),
    /// Undo data or stored state no longer matches; the node halts
    Fatal(String),
    /// A previous fatal error stopped the node
    Halted,
    /// sled or bincode failure
    Storage(String),
    /// Block does not extend the chain it was offered to
    InvalidBlock(String),
    InvalidParameter(String),
    Config(String),
}

impl NodeError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }
}

impl fmt::Display for NodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ledger(e) => write!(f, "{}", e),
            Self::Fatal(e) => write!(f, "fatal: {}", e),
            Self::Halted => write!(f, "node halted after a fatal error"),
            Self::Storage(e) => write!(f, "storage error: {}", e),
            Self::InvalidBlock(e) => write!(f, "invalid block: {}", e),
            Self::InvalidParameter(e) => write!(f, "invalid parameter: {}", e),
            Self::Config(e) => write!(f, "config error: {}", e),
        }
    }
}

impl std::error::Error for NodeError {}

impl From<LedgerError> for NodeError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::Invariant(v) => Self::Fatal(v.0),
            other => Self::Ledger(other),
        }
    }
}

impl From<InvariantViolation> for NodeError {
    fn from(e: InvariantViolation) -> Self {
        Self::Fatal(e.0)
    }
}

impl From<sled::Error> for NodeError {
    fn from(e: sled::Error) -> Self {
        Self::Storage(e.to_string())
    }
}

impl From<bincode::Error> for NodeError {
    fn from(e: bincode::Error) -> Self {
        Self::Storage(e.to_string())
    }
}

impl From<toml::de::Error> for NodeError {
    fn from(e: toml::de::Error) -> Self {
        Self::Config(e.to_string())
    }
}

impl From<toml::ser::Error> for NodeError {
    fn from(e: toml::ser::Error) -> Self {
        Self::Config(e.to_string())
    }
}

impl From<std::io::Error> for NodeError {
    fn from(e: std::io::Error) -> Self {
        Self::Config(e.to_string())
    }
}
