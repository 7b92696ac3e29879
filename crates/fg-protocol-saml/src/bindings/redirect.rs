//! HTTP-Redirect binding.
//!
//! The message is DEFLATE-compressed (raw, no zlib wrapper), base64-encoded
//! and URL-encoded into the query string; the relay state is URL-encoded
//! alongside it.

use base64::Engine;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use std::io::{Read, Write};

use crate::error::{SamlError, SamlResult};

use super::{DecodedMessage, RELAY_STATE_PARAM, SAML_REQUEST_PARAM};

/// Encoder/decoder for the redirect binding.
pub struct HttpRedirectBinding;

impl HttpRedirectBinding {
    /// Encodes a request into a redirect URL for `destination`.
    pub fn encode_request(
        xml: &str,
        destination: &str,
        relay_state: Option<&str>,
    ) -> SamlResult<String> {
        let compressed = deflate_compress(xml.as_bytes())?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(&compressed);
        let url_encoded = urlencoding::encode(&encoded);

        let separator = if destination.contains('?') { '&' } else { '?' };
        let mut url = format!("{destination}{separator}{SAML_REQUEST_PARAM}={url_encoded}");
        if let Some(rs) = relay_state {
            url.push_str(&format!(
                "&{RELAY_STATE_PARAM}={}",
                urlencoding::encode(rs)
            ));
        }
        Ok(url)
    }

    /// Recovers the message from a redirect URL.
    pub fn decode_url(url: &str) -> SamlResult<DecodedMessage> {
        let parsed = url::Url::parse(url)
            .map_err(|e| SamlError::XmlParse(format!("invalid URL: {e}")))?;

        let mut request = None;
        let mut relay_state = None;
        for (key, value) in parsed.query_pairs() {
            match key.as_ref() {
                SAML_REQUEST_PARAM => request = Some(value.into_owned()),
                RELAY_STATE_PARAM => relay_state = Some(value.into_owned()),
                _ => {}
            }
        }
        let encoded =
            request.ok_or_else(|| SamlError::MissingElement(SAML_REQUEST_PARAM.to_string()))?;

        // query_pairs already URL-decoded the value.
        let compressed = base64::engine::general_purpose::STANDARD
            .decode(encoded.as_bytes())
            .map_err(|e| SamlError::Base64(e.to_string()))?;
        let xml_bytes = deflate_decompress(&compressed)?;
        let xml =
            String::from_utf8(xml_bytes).map_err(|e| SamlError::InvalidEncoding(e.to_string()))?;

        Ok(DecodedMessage { xml, relay_state })
    }
}

/// Raw DEFLATE compression, no zlib header.
fn deflate_compress(data: &[u8]) -> SamlResult<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| SamlError::Deflate(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| SamlError::Deflate(e.to_string()))
}

fn deflate_decompress(data: &[u8]) -> SamlResult<Vec<u8>> {
    let mut decoder = DeflateDecoder::new(data);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| SamlError::Deflate(e.to_string()))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_and_decode_with_relay_state() {
        let xml = "<samlp:AuthnRequest ID=\"_x\"/>";
        let url = HttpRedirectBinding::encode_request(
            xml,
            "https://idp.example.org/sso",
            Some("ENGINE-42"),
        )
        .unwrap();

        assert!(url.starts_with("https://idp.example.org/sso?SAMLRequest="));
        assert!(url.contains("RelayState=ENGINE-42"));

        let decoded = HttpRedirectBinding::decode_url(&url).unwrap();
        assert_eq!(decoded.xml, xml);
        assert_eq!(decoded.relay_state.as_deref(), Some("ENGINE-42"));
    }

    #[test]
    fn round_trips_across_payload_sizes() {
        // Payloads from one byte up to ten thousand, in rough decades.
        for size in [1usize, 10, 100, 1_000, 5_000, 10_000] {
            let payload: String = ('a'..='z').cycle().take(size).collect();
            let url =
                HttpRedirectBinding::encode_request(&payload, "https://idp.example.org/sso", None)
                    .unwrap();
            let decoded = HttpRedirectBinding::decode_url(&url).unwrap();
            assert_eq!(decoded.xml, payload, "size {size}");
        }
    }

    #[test]
    fn destination_with_existing_query_keeps_it() {
        let url = HttpRedirectBinding::encode_request(
            "<x/>",
            "https://idp.example.org/sso?tenant=1",
            None,
        )
        .unwrap();
        assert!(url.contains("?tenant=1&SAMLRequest="));
    }

    #[test]
    fn relay_state_is_url_encoded() {
        let url = HttpRedirectBinding::encode_request(
            "<x/>",
            "https://idp.example.org/sso",
            Some("a b&c"),
        )
        .unwrap();
        assert!(url.contains("RelayState=a%20b%26c"));
    }

    #[test]
    fn url_without_request_parameter_is_an_error() {
        assert!(HttpRedirectBinding::decode_url("https://idp.example.org/sso?x=1").is_err());
    }
}
