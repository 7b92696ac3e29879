//! SAML 2.0 authentication request.

use chrono::{DateTime, SecondsFormat, Utc};

use super::constants::{NS_SAML2_ASSERTION, NS_SAML2_PROTOCOL, SAML2_BINDING_HTTP_POST};
use super::{create_ncname_id, xml_escape};

/// An authentication request sent to an identity provider on behalf of a
/// guard.
#[derive(Debug, Clone)]
pub struct AuthnRequest {
    /// Unique request identifier.
    pub id: String,
    /// Issue instant.
    pub issue_instant: DateTime<Utc>,
    /// Entity ID of the guard the request is issued for.
    pub issuer: String,
    /// Where the IdP should deliver the response.
    pub assertion_consumer_service_url: String,
    /// Binding the response is requested over.
    ///
    /// Always the POST binding URN, independent of the transport the
    /// request itself travels on; counterpart IdPs expect the response as a
    /// form post even when the request went out as a redirect.
    pub protocol_binding: String,
}

impl AuthnRequest {
    /// Creates a request with a fresh identifier.
    #[must_use]
    pub fn new(issuer: impl Into<String>, acs_url: impl Into<String>) -> Self {
        Self {
            id: create_ncname_id(),
            issue_instant: Utc::now(),
            issuer: issuer.into(),
            assertion_consumer_service_url: acs_url.into(),
            protocol_binding: SAML2_BINDING_HTTP_POST.to_string(),
        }
    }

    /// Serialises the request.
    #[must_use]
    pub fn to_xml(&self) -> String {
        format!(
            concat!(
                r#"<samlp:AuthnRequest xmlns:samlp="{}" xmlns:saml="{}" "#,
                r#"ID="{}" Version="2.0" IssueInstant="{}" "#,
                r#"AssertionConsumerServiceURL="{}" ProtocolBinding="{}">"#,
                r#"<saml:Issuer>{}</saml:Issuer>"#,
                r#"</samlp:AuthnRequest>"#
            ),
            NS_SAML2_PROTOCOL,
            NS_SAML2_ASSERTION,
            xml_escape(&self.id),
            self.issue_instant.to_rfc3339_opts(SecondsFormat::Secs, true),
            xml_escape(&self.assertion_consumer_service_url),
            xml_escape(&self.protocol_binding),
            xml_escape(&self.issuer),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_requests_get_unique_ids() {
        let a = AuthnRequest::new("guard", "https://engine/acs");
        let b = AuthnRequest::new("guard", "https://engine/acs");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn xml_carries_issuer_acs_and_post_binding() {
        let request = AuthnRequest::new("app-guard", "https://engine.example.org/acs");
        let xml = request.to_xml();

        assert!(xml.contains("<saml:Issuer>app-guard</saml:Issuer>"));
        assert!(xml.contains(r#"AssertionConsumerServiceURL="https://engine.example.org/acs""#));
        assert!(xml.contains(r#"Version="2.0""#));
        assert!(xml.contains(SAML2_BINDING_HTTP_POST));
    }
}
