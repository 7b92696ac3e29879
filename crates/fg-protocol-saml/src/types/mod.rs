//! Protocol message types.

pub mod authn_request;
pub mod constants;
pub mod legacy_response;

pub use authn_request::AuthnRequest;
pub use legacy_response::{LegacyResponse, SignatureInfo};

/// Generates a fresh NCName-safe message identifier.
///
/// XML IDs may not start with a digit, hence the underscore prefix.
#[must_use]
pub fn create_ncname_id() -> String {
    format!("_{}", uuid::Uuid::new_v4().simple())
}

/// Escapes XML attribute and text content.
#[must_use]
pub fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
