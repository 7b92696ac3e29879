//! Verification errors.

use thiserror::Error;

/// Terminal rejections from the verification protocols.
#[derive(Debug, Error)]
pub enum VerifyError {
    /// A required callback parameter is absent or malformed.
    #[error("missing or malformed parameter: {0}")]
    Parameter(String),

    /// The calling entity is not in the metadata registry.
    #[error("no metadata for entity: {0}")]
    MetadataNotFound(String),

    /// The engine configuration has not been loaded yet.
    #[error("engine not initialised")]
    Uninitialized,

    /// The secure-comms probe failed.
    #[error("comms probe failed: {0}")]
    Probe(String),

    /// The counterpart failed verification.
    #[error("verification failed: {0}")]
    Verification(String),

    /// The inbound message could not be parsed.
    #[error(transparent)]
    Parse(#[from] fg_protocol_saml::SamlError),

    /// Trust store failure while persisting a probed certificate.
    #[error(transparent)]
    Trust(#[from] fg_trust::TrustError),

    /// A network call failed.
    #[error("connection error: {0}")]
    Connection(String),
}

impl From<VerifyError> for fg_core::Error {
    fn from(err: VerifyError) -> Self {
        match err {
            VerifyError::Parameter(p) => Self::Parameter(p),
            VerifyError::MetadataNotFound(e) => Self::MetadataNotFound(e),
            VerifyError::Uninitialized => Self::Uninitialized,
            VerifyError::Probe(m) => Self::Probe(m),
            VerifyError::Verification(m) => Self::Verification(m),
            VerifyError::Parse(e) => Self::Parse(e.to_string()),
            VerifyError::Trust(e) => Self::Crypto(e.to_string()),
            VerifyError::Connection(m) => Self::Connection(m),
        }
    }
}
