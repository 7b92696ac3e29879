//! Transport bindings.
//!
//! The engine only ever sends requests, so both bindings are written from
//! the sending side; the decoders exist for symmetry and for exercising the
//! round-trip property.

pub mod post;
pub mod redirect;

pub use post::HttpPostBinding;
pub use redirect::HttpRedirectBinding;

/// Form/query parameter carrying a request.
pub const SAML_REQUEST_PARAM: &str = "SAMLRequest";

/// Form/query parameter carrying the relay state token.
pub const RELAY_STATE_PARAM: &str = "RelayState";

/// A message recovered from a binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedMessage {
    /// The message document.
    pub xml: String,
    /// The relay state token, if one travelled with it.
    pub relay_state: Option<String>,
}
