//! SAML 2.0 web-browser SSO profile.

use fg_metadata::IdpEndpoints;
use fg_session::EngineSessionId;
use tracing::debug;

use crate::bindings::{HttpPostBinding, HttpRedirectBinding};
use crate::error::{SamlError, SamlResult};
use crate::profile::AuthnDispatch;
use crate::types::constants::{SAML2_BINDING_HTTP_POST, SAML2_BINDING_HTTP_REDIRECT};
use crate::types::AuthnRequest;

/// Builder for SAML 2.0 authentication requests.
pub struct ModernProfile {
    assertion_consumer_url: String,
}

impl ModernProfile {
    /// Creates the profile with the engine's assertion consumer endpoint.
    #[must_use]
    pub fn new(acs_url: impl Into<String>) -> Self {
        Self {
            assertion_consumer_url: acs_url.into(),
        }
    }

    /// Builds the request for `guard_id` against the IdP's first usable
    /// single-sign-on endpoint.
    ///
    /// The request's `ProtocolBinding` stays the POST binding URN whichever
    /// transport carries it out; see [`AuthnRequest::protocol_binding`].
    pub fn build(
        &self,
        guard_id: &str,
        engine_session: &EngineSessionId,
        idp: &IdpEndpoints,
    ) -> SamlResult<AuthnDispatch> {
        let sso = idp
            .sso_endpoints
            .iter()
            .find(|sso| {
                sso.binding.eq_ignore_ascii_case(SAML2_BINDING_HTTP_POST)
                    || sso.binding.eq_ignore_ascii_case(SAML2_BINDING_HTTP_REDIRECT)
            })
            .ok_or_else(|| SamlError::NoUsableEndpoint(guard_id.to_string()))?;

        let request = AuthnRequest::new(guard_id, &self.assertion_consumer_url);
        let xml = request.to_xml();
        debug!(guard_id, binding = %sso.binding, destination = %sso.location, "built authentication request");

        if sso.binding.eq_ignore_ascii_case(SAML2_BINDING_HTTP_REDIRECT) {
            let url = HttpRedirectBinding::encode_request(
                &xml,
                &sso.location,
                Some(engine_session.as_str()),
            )?;
            Ok(AuthnDispatch::Redirect { url })
        } else {
            Ok(AuthnDispatch::Post(HttpPostBinding::encode_request(
                &xml,
                &sso.location,
                Some(engine_session.as_str()),
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fg_metadata::SsoEndpoint;

    fn idp(bindings: &[&str]) -> IdpEndpoints {
        IdpEndpoints {
            attribute_authority_url: "https://idp.example.org/aa".to_string(),
            signing_certificate: vec![1],
            sso_endpoints: bindings
                .iter()
                .enumerate()
                .map(|(i, b)| SsoEndpoint {
                    binding: (*b).to_string(),
                    location: format!("https://idp.example.org/sso/{i}"),
                })
                .collect(),
        }
    }

    fn session() -> EngineSessionId {
        EngineSessionId::from_raw("ENGINE-5")
    }

    fn profile() -> ModernProfile {
        ModernProfile::new("https://engine.example.org/acs")
    }

    #[test]
    fn redirect_transport_still_requests_a_post_response() {
        let dispatch = profile()
            .build("app", &session(), &idp(&[SAML2_BINDING_HTTP_REDIRECT]))
            .unwrap();

        let AuthnDispatch::Redirect { url } = dispatch else {
            panic!("expected redirect");
        };
        let decoded = HttpRedirectBinding::decode_url(&url).unwrap();
        assert!(decoded.xml.contains(SAML2_BINDING_HTTP_POST));
        assert_eq!(decoded.relay_state.as_deref(), Some("ENGINE-5"));
    }

    #[test]
    fn first_advertised_endpoint_wins() {
        let dispatch = profile()
            .build(
                "app",
                &session(),
                &idp(&[SAML2_BINDING_HTTP_POST, SAML2_BINDING_HTTP_REDIRECT]),
            )
            .unwrap();

        let AuthnDispatch::Post(form) = dispatch else {
            panic!("expected POST form");
        };
        assert_eq!(form.destination, "https://idp.example.org/sso/0");
    }

    #[test]
    fn post_transport_leaves_relay_state_unencoded() {
        let dispatch = profile()
            .build("app", &session(), &idp(&[SAML2_BINDING_HTTP_POST]))
            .unwrap();

        let AuthnDispatch::Post(form) = dispatch else {
            panic!("expected POST form");
        };
        assert_eq!(form.relay_state.as_deref(), Some("ENGINE-5"));
    }

    #[test]
    fn idp_without_usable_endpoint_is_an_error() {
        let result = profile().build("app", &session(), &idp(&[]));
        assert!(matches!(result, Err(SamlError::NoUsableEndpoint(_))));
    }
}
