//! HTTP-POST binding.
//!
//! The message travels base64-encoded in an auto-submitting HTML form; the
//! relay state rides along as a plain form field, unencoded.

use base64::Engine;

use crate::error::{SamlError, SamlResult};
use crate::types::xml_escape;

use super::{DecodedMessage, RELAY_STATE_PARAM, SAML_REQUEST_PARAM};

/// Encoder/decoder for the POST binding.
pub struct HttpPostBinding;

/// The pieces a POST dispatch needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostForm {
    /// Where the form submits to.
    pub destination: String,
    /// Base64-encoded message.
    pub saml_request: String,
    /// Relay state form field, left as-is for the form.
    pub relay_state: Option<String>,
}

impl HttpPostBinding {
    /// Encodes a request into its form fields.
    #[must_use]
    pub fn encode_request(xml: &str, destination: &str, relay_state: Option<&str>) -> PostForm {
        PostForm {
            destination: destination.to_string(),
            saml_request: base64::engine::general_purpose::STANDARD.encode(xml),
            relay_state: relay_state.map(str::to_string),
        }
    }

    /// Recovers the message from posted form values.
    pub fn decode(saml_request: &str, relay_state: Option<&str>) -> SamlResult<DecodedMessage> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(saml_request)
            .map_err(|e| SamlError::Base64(e.to_string()))?;
        let xml = String::from_utf8(bytes).map_err(|e| SamlError::InvalidEncoding(e.to_string()))?;
        Ok(DecodedMessage {
            xml,
            relay_state: relay_state.map(str::to_string),
        })
    }
}

impl PostForm {
    /// Renders the auto-submitting HTML page carrying the form.
    #[must_use]
    pub fn render(&self) -> String {
        let relay_input = self
            .relay_state
            .as_deref()
            .map(|rs| {
                format!(
                    r#"<input type="hidden" name="{RELAY_STATE_PARAM}" value="{}"/>"#,
                    xml_escape(rs)
                )
            })
            .unwrap_or_default();

        format!(
            r#"<!DOCTYPE html>
<html>
<head><meta charset="UTF-8"><title>Redirecting to your identity provider</title></head>
<body onload="document.forms[0].submit()">
    <noscript><p>JavaScript is disabled. Use the button below to continue.</p></noscript>
    <form method="post" action="{}">
        <input type="hidden" name="{SAML_REQUEST_PARAM}" value="{}"/>
        {}
        <noscript><input type="submit" value="Continue"/></noscript>
    </form>
</body>
</html>"#,
            xml_escape(&self.destination),
            self.saml_request,
            relay_input
        )
    }
}
