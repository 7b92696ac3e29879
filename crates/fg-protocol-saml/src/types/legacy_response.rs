//! Legacy-protocol response parsing.
//!
//! The legacy profile delivers a base64-encoded SAML 1.x `Response` as a
//! form parameter. The engine needs four things out of it: the issuer of
//! the assertion, the subject's name identifier, whether the response
//! carries a signature at all, and the raw certificates embedded in that
//! signature's key-info block.

use base64::Engine;
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{SamlError, SamlResult};

/// Signature material found on a response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignatureInfo {
    /// DER certificates from the signature's key-info block, in document
    /// order.
    pub certificates: Vec<Vec<u8>>,
}

/// The pieces of a legacy response the engine acts on.
#[derive(Debug, Clone)]
pub struct LegacyResponse {
    /// Issuer of the first assertion.
    pub issuer: Option<String>,
    /// Name identifier of the authenticated subject.
    pub subject_name_identifier: Option<String>,
    /// The response-level signature, if one is present.
    pub signature: Option<SignatureInfo>,
    /// The response document as received, re-used when the authentication
    /// envelope is forwarded to the guard.
    pub xml: String,
}

impl LegacyResponse {
    /// Decodes a base64 form parameter and parses the response inside.
    pub fn parse_base64(encoded: &str) -> SamlResult<Self> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| SamlError::Base64(e.to_string()))?;
        let xml = String::from_utf8(bytes).map_err(|e| SamlError::InvalidEncoding(e.to_string()))?;
        Self::parse(&xml)
    }

    /// Parses a response document.
    pub fn parse(xml: &str) -> SamlResult<Self> {
        let mut reader = Reader::from_str(xml);

        let mut issuer = None;
        let mut subject_name_identifier = None;
        let mut signature: Option<SignatureInfo> = None;

        // Element ancestry, by local name. The signature that matters is
        // the one directly under the Response element.
        let mut stack: Vec<Vec<u8>> = Vec::new();
        let mut seen_response = false;

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => {
                    let name = e.local_name().as_ref().to_vec();
                    match name.as_slice() {
                        b"Response" if stack.is_empty() => seen_response = true,
                        b"Assertion" if issuer.is_none() => {
                            issuer = e
                                .try_get_attribute("Issuer")
                                .map_err(|err| SamlError::XmlParse(err.to_string()))?
                                .map(|attr| {
                                    attr.unescape_value()
                                        .map(|v| v.into_owned())
                                        .map_err(|err| SamlError::XmlParse(err.to_string()))
                                })
                                .transpose()?;
                        }
                        b"Signature" => {
                            if stack.last().map(Vec::as_slice) == Some(b"Response")
                                && signature.is_none()
                            {
                                signature = Some(SignatureInfo::default());
                            }
                        }
                        _ => {}
                    }
                    stack.push(name);
                }
                Ok(Event::Text(t)) => {
                    let text = t
                        .unescape()
                        .map_err(|e| SamlError::XmlParse(e.to_string()))?;
                    let text = text.trim();
                    if text.is_empty() {
                        continue;
                    }
                    match stack.last().map(Vec::as_slice) {
                        Some(b"NameIdentifier") if subject_name_identifier.is_none() => {
                            subject_name_identifier = Some(text.to_string());
                        }
                        Some(b"X509Certificate") => {
                            if let Some(sig) = signature.as_mut() {
                                if in_signature(&stack) {
                                    let compact: String = text.split_whitespace().collect();
                                    let der = base64::engine::general_purpose::STANDARD
                                        .decode(compact)
                                        .map_err(|e| SamlError::Base64(e.to_string()))?;
                                    sig.certificates.push(der);
                                }
                            }
                        }
                        _ => {}
                    }
                }
                Ok(Event::End(_)) => {
                    stack.pop();
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(SamlError::XmlParse(e.to_string())),
                _ => {}
            }
        }

        if !seen_response {
            return Err(SamlError::MissingElement("Response".to_string()));
        }

        Ok(Self {
            issuer,
            subject_name_identifier,
            signature,
            xml: xml.to_string(),
        })
    }
}

fn in_signature(stack: &[Vec<u8>]) -> bool {
    stack.iter().any(|name| name.as_slice() == b"Signature")
}
