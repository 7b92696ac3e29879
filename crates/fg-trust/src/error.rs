//! Trust-layer errors.

use thiserror::Error;

/// Errors from certificate stores and containers.
#[derive(Debug, Error)]
pub enum TrustError {
    /// A certificate could not be decoded.
    #[error("invalid certificate: {0}")]
    InvalidCertificate(String),

    /// The container file is unreadable or corrupt.
    #[error("invalid container: {0}")]
    InvalidContainer(String),

    /// The supplied container password is wrong.
    #[error("container password rejected")]
    BadPassword,

    /// No entry exists under the requested alias.
    #[error("no entry for alias: {0}")]
    UnknownAlias(String),

    /// The entry under the alias is not of the requested kind.
    #[error("alias holds a different entry kind: {0}")]
    WrongEntryKind(String),

    /// Symmetric encryption or key derivation failed.
    #[error("container crypto error: {0}")]
    Crypto(String),

    /// Filesystem failure while persisting a container.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
