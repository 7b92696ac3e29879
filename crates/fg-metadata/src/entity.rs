//! Entity records.

use std::path::PathBuf;

/// A federation participant known to the engine.
///
/// Created when metadata is loaded or a guard is registered, immutable once
/// loaded, replaced wholesale on reload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRecord {
    /// Globally unique entity ID within the federation.
    pub entity_id: String,
    /// Role-specific endpoints and key material.
    pub role: EntityRole,
}

/// The role an entity plays in the federation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityRole {
    /// A protected application fronted by the engine.
    Guard(GuardEndpoints),
    /// An identity provider issuing assertions.
    IdP(IdpEndpoints),
}

/// Guard-side endpoints and identity material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardEndpoints {
    /// Endpoint the engine calls to verify a guard session.
    pub verifier_url: String,
    /// Endpoint receiving the attribute SOAP envelope.
    pub attribute_consumer_url: String,
    /// Endpoint receiving the final session handoff.
    pub podder_url: String,
    /// Path of the guard's identity keystore.
    pub keystore: PathBuf,
    /// Password for the guard's identity keystore.
    pub keystore_password: String,
}

impl GuardEndpoints {
    /// Whether the guard advertises HTTPS on any engine-facing endpoint.
    ///
    /// The podder URL is only ever visited by the browser, so it does not
    /// count towards secure-comms probing.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        let https = |url: &str| url.to_ascii_lowercase().starts_with("https");
        https(&self.verifier_url) || https(&self.attribute_consumer_url)
    }
}

/// IdP-side endpoints and signing material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdpEndpoints {
    /// Attribute authority endpoint queried after authentication.
    pub attribute_authority_url: String,
    /// DER-encoded signing certificate declared in the metadata.
    pub signing_certificate: Vec<u8>,
    /// Advertised single-sign-on endpoints, in document order.
    pub sso_endpoints: Vec<SsoEndpoint>,
}

/// One advertised single-sign-on endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SsoEndpoint {
    /// Binding URN for this endpoint.
    pub binding: String,
    /// Endpoint location.
    pub location: String,
}

impl EntityRecord {
    /// The guard endpoints, if this entity is a guard.
    #[must_use]
    pub fn as_guard(&self) -> Option<&GuardEndpoints> {
        match &self.role {
            EntityRole::Guard(g) => Some(g),
            EntityRole::IdP(_) => None,
        }
    }

    /// The IdP endpoints, if this entity is an identity provider.
    #[must_use]
    pub fn as_idp(&self) -> Option<&IdpEndpoints> {
        match &self.role {
            EntityRole::IdP(i) => Some(i),
            EntityRole::Guard(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard(verifier: &str, acs: &str) -> GuardEndpoints {
        GuardEndpoints {
            verifier_url: verifier.to_string(),
            attribute_consumer_url: acs.to_string(),
            podder_url: "https://app.example.org/podder".to_string(),
            keystore: PathBuf::from("guards/app/app.keystore"),
            keystore_password: "secret".to_string(),
        }
    }

    #[test]
    fn https_verifier_counts_as_secure() {
        assert!(guard("HTTPS://app/verify", "http://app/acs").is_secure());
        assert!(guard("http://app/verify", "https://app/acs").is_secure());
    }

    #[test]
    fn plain_http_guard_is_not_secure() {
        // Podder being HTTPS alone never triggers probing.
        assert!(!guard("http://app/verify", "http://app/acs").is_secure());
    }
}
