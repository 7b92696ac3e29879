//! SAML protocol support for the fedgate engine.
//!
//! The engine speaks two protocol generations: the legacy browser profile
//! (redirect to a discovery service, SAML 1.x assertions and SOAP attribute
//! queries) and the modern one (SAML 2.0 AuthnRequests over the POST and
//! Redirect bindings). This crate holds the message types, the transport
//! bindings, the profile selection and construction logic, and the SOAP
//! envelopes exchanged with attribute authorities and guards.
//!
//! Message emission uses plain formatted XML; parsing uses `quick-xml`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bindings;
pub mod error;
pub mod profile;
pub mod soap;
pub mod types;

pub use error::{SamlError, SamlResult};
pub use profile::{select_profile, AuthnDispatch, Profile, ProfileDispatcher};
pub use types::{AuthnRequest, LegacyResponse};
