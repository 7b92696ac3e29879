//! Pipeline errors.

use thiserror::Error;

/// Failures along the attribute retrieval pipeline.
///
/// Every variant is terminal; the only local recovery anywhere in the
/// pipeline is the single certificate-less retry against the attribute
/// authority, which happens before an error surfaces.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A network call failed.
    #[error("connection error: {0}")]
    Connection(String),

    /// The attribute authority's response could not be parsed.
    #[error("attribute authority response unusable: {0}")]
    AuthorityResponse(String),

    /// The guard's acknowledgement could not be parsed.
    #[error("guard acknowledgement unusable: {0}")]
    GuardResponse(String),

    /// The identity keystore for the guard could not be opened.
    #[error("guard identity unavailable: {0}")]
    Identity(String),
}

impl From<PipelineError> for fg_core::Error {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Connection(m) => Self::Connection(m),
            PipelineError::AuthorityResponse(m) | PipelineError::GuardResponse(m) => Self::Parse(m),
            PipelineError::Identity(m) => Self::Crypto(m),
        }
    }
}
