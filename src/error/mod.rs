//! Error handling for the ledger
//!
//! One error type for the whole crate. Transport failures carry their own
//! kinds so a caller can tell an unreachable peer from a peer that answered
//! with garbage or with nothing at all.

use std::fmt;

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, ChainError>;

/// Error kinds for ledger, storage and gossip operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    /// File I/O errors (block store, key files)
    Io(String),
    /// Encoding/decoding errors
    Serialization(String),
    /// Key generation, parsing or signing errors
    Crypto(String),
    /// Local socket errors (bind, accept)
    Network(String),
    /// A peer could not be reached or the exchange was cut short
    PeerUnreachable(String),
    /// A peer answered with something we could not decode or did not ask for
    MalformedResponse(String),
    /// A peer answered but had nothing to offer
    NoData(String),
    /// Block validation errors
    InvalidBlock(String),
    /// Mining errors, including aborted proof-of-work
    Mining(String),
    /// Configuration errors
    Config(String),
    /// A lock guarding shared state was poisoned
    Lock(String),
}

impl fmt::Display for ChainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainError::Io(msg) => write!(f, "I/O error: {msg}"),
            ChainError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            ChainError::Crypto(msg) => write!(f, "Cryptographic error: {msg}"),
            ChainError::Network(msg) => write!(f, "Network error: {msg}"),
            ChainError::PeerUnreachable(msg) => write!(f, "Peer unreachable: {msg}"),
            ChainError::MalformedResponse(msg) => write!(f, "Malformed response: {msg}"),
            ChainError::NoData(msg) => write!(f, "No data: {msg}"),
            ChainError::InvalidBlock(msg) => write!(f, "Invalid block: {msg}"),
            ChainError::Mining(msg) => write!(f, "Mining error: {msg}"),
            ChainError::Config(msg) => write!(f, "Configuration error: {msg}"),
            ChainError::Lock(msg) => write!(f, "Lock error: {msg}"),
        }
    }
}

impl std::error::Error for ChainError {}

impl ChainError {
    /// True for the error kinds produced at the gossip transport boundary
    pub fn is_peer_failure(&self) -> bool {
        matches!(
            self,
            ChainError::PeerUnreachable(_) | ChainError::MalformedResponse(_) | ChainError::NoData(_)
        )
    }
}

impl From<std::io::Error> for ChainError {
    fn from(err: std::io::Error) -> Self {
        ChainError::Io(err.to_string())
    }
}

impl From<bincode::error::EncodeError> for ChainError {
    fn from(err: bincode::error::EncodeError) -> Self {
        ChainError::Serialization(err.to_string())
    }
}

impl From<bincode::error::DecodeError> for ChainError {
    fn from(err: bincode::error::DecodeError) -> Self {
        ChainError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for ChainError {
    fn from(err: serde_json::Error) -> Self {
        ChainError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_kind_and_message() {
        let err = ChainError::PeerUnreachable("127.0.0.1:9".to_string());
        assert_eq!(err.to_string(), "Peer unreachable: 127.0.0.1:9");
    }

    #[test]
    fn test_peer_failure_kinds() {
        assert!(ChainError::NoData("x".into()).is_peer_failure());
        assert!(ChainError::MalformedResponse("x".into()).is_peer_failure());
        assert!(!ChainError::Io("x".into()).is_peer_failure());
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: ChainError = io.into();
        assert!(matches!(err, ChainError::Io(_)));
    }
}
