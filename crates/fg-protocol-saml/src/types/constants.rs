//! Protocol constants.

/// SAML 2.0 HTTP-POST binding URN.
pub const SAML2_BINDING_HTTP_POST: &str = "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST";

/// SAML 2.0 HTTP-Redirect binding URN.
pub const SAML2_BINDING_HTTP_REDIRECT: &str = "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-Redirect";

/// SAML 2.0 protocol namespace.
pub const NS_SAML2_PROTOCOL: &str = "urn:oasis:names:tc:SAML:2.0:protocol";

/// SAML 2.0 assertion namespace.
pub const NS_SAML2_ASSERTION: &str = "urn:oasis:names:tc:SAML:2.0:assertion";

/// SAML 1.0 protocol namespace (legacy profile).
pub const NS_SAML1_PROTOCOL: &str = "urn:oasis:names:tc:SAML:1.0:protocol";

/// SAML 1.0 assertion namespace (legacy profile).
pub const NS_SAML1_ASSERTION: &str = "urn:oasis:names:tc:SAML:1.0:assertion";

/// Name identifier format used by legacy-profile attribute queries.
pub const LEGACY_NAME_IDENTIFIER_FORMAT: &str = "urn:mace:shibboleth:1.0:nameIdentifier";

/// SOAP 1.1 envelope namespace.
pub const NS_SOAP_ENVELOPE: &str = "http://schemas.xmlsoap.org/soap/envelope/";

/// Namespace of the engine's custom SOAP headers.
pub const NS_ENGINE_HEADERS: &str = "urn:fedgate:sp";
