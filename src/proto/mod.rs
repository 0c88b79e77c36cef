//! Protocol objects: the data-acquisition collaborators handlers share
//!
//! The registry never looks inside a protocol. It keeps one instance per
//! handler family and hands it to every handler of that family, so state
//! such as default headers or the last response metadata is shared.

mod url;

pub use url::{ResponseMeta, UrlProtocol};

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Connection timeout")]
    Timeout,

    #[error("HTTP {status}: {reason}")]
    Status { status: u16, reason: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl ProtocolError {
    /// Whether retrying the same request may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            ProtocolError::Timeout | ProtocolError::RequestFailed(_) => true,
            ProtocolError::Status { status, .. } => *status >= 500,
            ProtocolError::InvalidUrl(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Opaque transport capability
pub trait Protocol: fmt::Debug + Send + Sync + 'static {
    /// Kind label used to detect two families fighting over one name
    fn kind(&self) -> &'static str;

    fn as_any(&self) -> &dyn Any;
}

pub type SharedProtocol = Arc<dyn Protocol>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors() {
        assert!(ProtocolError::Timeout.is_transient());
        assert!(
            ProtocolError::Status {
                status: 503,
                reason: "Service Unavailable".to_string()
            }
            .is_transient()
        );
        assert!(
            !ProtocolError::Status {
                status: 404,
                reason: "Not Found".to_string()
            }
            .is_transient()
        );
        assert!(!ProtocolError::InvalidUrl("nope".to_string()).is_transient());
    }
}
