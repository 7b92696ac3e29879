//! SOAP envelopes for the attribute exchange.
//!
//! The attribute authority is queried with a legacy-protocol `Request`
//! wrapped in a SOAP body; its response envelope is forwarded to the guard
//! unmodified apart from two headers the engine injects: the guard session
//! identifier and the original authentication envelope.

use chrono::{SecondsFormat, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{SamlError, SamlResult};
use crate::types::constants::{
    LEGACY_NAME_IDENTIFIER_FORMAT, NS_ENGINE_HEADERS, NS_SAML1_ASSERTION, NS_SAML1_PROTOCOL,
    NS_SOAP_ENVELOPE,
};
use crate::types::{create_ncname_id, xml_escape};

/// Builds the SOAP-wrapped attribute query for one subject.
///
/// The query is keyed by the guard's externally visible entity ID (the
/// `Resource`) and addresses the subject by the name identifier the IdP
/// issued, qualified by the IdP's provider ID.
#[must_use]
pub fn build_attribute_query(
    guard_entity_id: &str,
    idp_provider_id: &str,
    name_identifier: &str,
) -> String {
    let issue_instant = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
    format!(
        concat!(
            r#"<soapenv:Envelope xmlns:soapenv="{soap}">"#,
            "<soapenv:Body>",
            r#"<samlp:Request xmlns:samlp="{proto}" RequestID="{id}" MajorVersion="1" MinorVersion="1" IssueInstant="{instant}">"#,
            r#"<samlp:AttributeQuery Resource="{resource}">"#,
            r#"<saml:Subject xmlns:saml="{assertion}">"#,
            r#"<saml:NameIdentifier Format="{format}" NameQualifier="{qualifier}">{name}</saml:NameIdentifier>"#,
            "</saml:Subject>",
            "</samlp:AttributeQuery>",
            "</samlp:Request>",
            "</soapenv:Body>",
            "</soapenv:Envelope>"
        ),
        soap = NS_SOAP_ENVELOPE,
        proto = NS_SAML1_PROTOCOL,
        id = create_ncname_id(),
        instant = issue_instant,
        resource = xml_escape(guard_entity_id),
        assertion = NS_SAML1_ASSERTION,
        format = LEGACY_NAME_IDENTIFIER_FORMAT,
        qualifier = xml_escape(idp_provider_id),
        name = xml_escape(name_identifier),
    )
}

/// Checks that a document is well-formed XML containing a SOAP envelope.
pub fn ensure_envelope(xml: &str) -> SamlResult<()> {
    let mut reader = Reader::from_str(xml);
    let mut seen_envelope = false;
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"Envelope" {
                    seen_envelope = true;
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(SamlError::XmlParse(e.to_string())),
            _ => {}
        }
    }
    if seen_envelope {
        Ok(())
    } else {
        Err(SamlError::MissingElement("Envelope".to_string()))
    }
}

/// Injects the engine's two headers into an attribute authority response
/// envelope before it goes to the guard.
///
/// The body is left byte-for-byte as the authority produced it. The header
/// carries the guard session identifier and the original authentication
/// envelope, tagged with the authority URL it came from.
pub fn attach_guard_headers(
    aa_response_xml: &str,
    guard_session_id: &str,
    aa_url: &str,
    authn_xml: &str,
) -> SamlResult<String> {
    ensure_envelope(aa_response_xml)?;

    // Find the end of the envelope's opening tag, whatever its prefix.
    let open_start = find_envelope_open(aa_response_xml)
        .ok_or_else(|| SamlError::MissingElement("Envelope".to_string()))?;
    let open_end = aa_response_xml[open_start..]
        .find('>')
        .map(|i| open_start + i + 1)
        .ok_or_else(|| SamlError::XmlParse("unterminated Envelope tag".to_string()))?;

    let prefix = envelope_prefix(&aa_response_xml[open_start..open_end]);
    let header = format!(
        concat!(
            "<{p}Header>",
            r#"<GuardSessionID xmlns="{ns}">{session}</GuardSessionID>"#,
            r#"<AuthnFromIdP xmlns="{ns}" aa="{aa}">{authn}</AuthnFromIdP>"#,
            "</{p}Header>"
        ),
        p = prefix,
        ns = NS_ENGINE_HEADERS,
        session = xml_escape(guard_session_id),
        aa = xml_escape(aa_url),
        authn = authn_xml,
    );

    let mut out = String::with_capacity(aa_response_xml.len() + header.len());
    out.push_str(&aa_response_xml[..open_end]);
    out.push_str(&header);
    out.push_str(&aa_response_xml[open_end..]);
    Ok(out)
}

/// Byte offset of the `<` opening the envelope element.
fn find_envelope_open(xml: &str) -> Option<usize> {
    let mut search_from = 0;
    while let Some(rel) = xml[search_from..].find('<') {
        let start = search_from + rel;
        let rest = &xml[start + 1..];
        // Skip declarations, comments and closing tags.
        if !rest.starts_with('?') && !rest.starts_with('!') && !rest.starts_with('/') {
            let name_end = rest
                .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
                .unwrap_or(rest.len());
            let name = &rest[..name_end];
            if name == "Envelope" || name.ends_with(":Envelope") {
                return Some(start);
            }
        }
        search_from = start + 1;
    }
    None
}

/// The namespace prefix (with trailing colon) of the envelope tag, or empty.
fn envelope_prefix(open_tag: &str) -> String {
    let name = open_tag
        .trim_start_matches('<')
        .split(|c: char| c.is_whitespace() || c == '>')
        .next()
        .unwrap_or_default();
    match name.rsplit_once(':') {
        Some((prefix, _)) => format!("{prefix}:"),
        None => String::new(),
    }
}
