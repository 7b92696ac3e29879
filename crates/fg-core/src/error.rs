//! Engine-wide error taxonomy.
//!
//! Every failure in a single SSO flow maps onto one of these variants. The
//! only error any component recovers from locally is the one documented
//! retry in the attribute pipeline; everything else is terminal for the
//! current flow and surfaces here.

use thiserror::Error;

/// Result type alias using the engine error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Terminal errors for an SSO flow.
#[derive(Debug, Error)]
pub enum Error {
    /// A required request parameter was absent.
    #[error("missing parameter: {0}")]
    Parameter(String),

    /// No metadata is registered for the named entity.
    #[error("no metadata for entity: {0}")]
    MetadataNotFound(String),

    /// The engine configuration has not been loaded yet.
    #[error("engine not initialised")]
    Uninitialized,

    /// The secure-comms probe against a guard failed.
    #[error("guard comms probe failed: {0}")]
    Probe(String),

    /// The counterpart failed to verify the session or assertion.
    #[error("verification failed: {0}")]
    Verification(String),

    /// Malformed SAML or SOAP input.
    #[error("parse error: {0}")]
    Parse(String),

    /// A network call to a guard, IdP or attribute authority failed.
    #[error("connection error: {0}")]
    Connection(String),

    /// Key generation, signing or container crypto failed.
    #[error("crypto error: {0}")]
    Crypto(String),

    /// Filesystem error while touching metadata or stores.
    #[error("io error: {0}")]
    Io(String),
}

impl Error {
    /// Whether the flow failed because of something the caller sent.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Parameter(_)
                | Self::MetadataNotFound(_)
                | Self::Verification(_)
                | Self::Parse(_)
        )
    }

    /// Short stable tag for logging.
    #[must_use]
    pub const fn tag(&self) -> &'static str {
        match self {
            Self::Parameter(_) => "parameter",
            Self::MetadataNotFound(_) => "metadata-not-found",
            Self::Uninitialized => "uninitialized",
            Self::Probe(_) => "probe",
            Self::Verification(_) => "verification",
            Self::Parse(_) => "parse",
            Self::Connection(_) => "connection",
            Self::Crypto(_) => "crypto",
            Self::Io(_) => "io",
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_are_classified() {
        assert!(Error::Parameter("guardid".into()).is_client_error());
        assert!(Error::MetadataNotFound("x".into()).is_client_error());
        assert!(!Error::Uninitialized.is_client_error());
        assert!(!Error::Connection("refused".into()).is_client_error());
    }

    #[test]
    fn tags_are_stable() {
        assert_eq!(Error::Uninitialized.tag(), "uninitialized");
        assert_eq!(Error::Probe("tls".into()).tag(), "probe");
    }
}
