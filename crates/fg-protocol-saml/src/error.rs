//! SAML protocol errors.

use thiserror::Error;

/// Result type for SAML operations.
pub type SamlResult<T> = Result<T, SamlError>;

/// Errors constructing or decoding protocol messages.
#[derive(Debug, Error)]
pub enum SamlError {
    /// XML parsing failed.
    #[error("XML parse error: {0}")]
    XmlParse(String),

    /// A required element or attribute is absent.
    #[error("missing required element: {0}")]
    MissingElement(String),

    /// Base64 decoding failed.
    #[error("base64 decode error: {0}")]
    Base64(String),

    /// DEFLATE compression or decompression failed.
    #[error("deflate error: {0}")]
    Deflate(String),

    /// The IdP advertises no endpoint the engine can address.
    #[error("no usable single-sign-on endpoint for: {0}")]
    NoUsableEndpoint(String),

    /// No metadata is registered for the entity.
    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    /// Message content is not valid UTF-8.
    #[error("invalid encoding: {0}")]
    InvalidEncoding(String),
}

impl From<quick_xml::Error> for SamlError {
    fn from(err: quick_xml::Error) -> Self {
        Self::XmlParse(err.to_string())
    }
}

impl From<base64::DecodeError> for SamlError {
    fn from(err: base64::DecodeError) -> Self {
        Self::Base64(err.to_string())
    }
}

impl From<std::io::Error> for SamlError {
    fn from(err: std::io::Error) -> Self {
        Self::Deflate(err.to_string())
    }
}
