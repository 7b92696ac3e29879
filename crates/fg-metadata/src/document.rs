//! Metadata document reading and writing.
//!
//! Documents are plain XML: an `EntityDescriptor` element carrying either a
//! `GuardService` extension (written by the engine when a guard is
//! registered) or an `IdPService` extension (provisioned out-of-band by the
//! federation operator).

use base64::Engine;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::path::PathBuf;

use crate::entity::{EntityRecord, EntityRole, GuardEndpoints, IdpEndpoints, SsoEndpoint};
use crate::registry::MetadataError;

/// Parses a metadata document into an [`EntityRecord`].
pub fn parse_entity_document(xml: &str) -> Result<EntityRecord, MetadataError> {
    let mut reader = Reader::from_str(xml);

    let mut entity_id: Option<String> = None;
    let mut role: Option<EntityRole> = None;

    let mut guard = GuardFields::default();
    let mut idp = IdpFields::default();
    let mut in_guard = false;
    let mut in_idp = false;
    let mut current: Vec<u8> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.local_name().as_ref().to_vec();
                match name.as_slice() {
                    b"EntityDescriptor" => {
                        entity_id = attribute(&e, "entityID")?;
                    }
                    b"GuardService" => in_guard = true,
                    b"IdPService" => in_idp = true,
                    b"SingleSignOnService" => idp.push_sso(&e)?,
                    _ => {}
                }
                current = name;
            }
            Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"SingleSignOnService" {
                    idp.push_sso(&e)?;
                }
            }
            Ok(Event::Text(t)) => {
                let text = t
                    .unescape()
                    .map_err(|e| MetadataError::Malformed(e.to_string()))?;
                let text = text.trim();
                if text.is_empty() {
                    continue;
                }
                if in_guard {
                    guard.set(&current, text);
                } else if in_idp {
                    idp.set(&current, text);
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"GuardService" => {
                    in_guard = false;
                    role = Some(EntityRole::Guard(guard.take()?));
                }
                b"IdPService" => {
                    in_idp = false;
                    role = Some(EntityRole::IdP(idp.take()?));
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(MetadataError::Malformed(e.to_string())),
            _ => {}
        }
    }

    let entity_id = entity_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| MetadataError::Malformed("missing entityID attribute".to_string()))?;
    let role = role.ok_or_else(|| {
        MetadataError::Malformed("document declares neither GuardService nor IdPService".to_string())
    })?;

    Ok(EntityRecord { entity_id, role })
}

fn attribute(
    e: &quick_xml::events::BytesStart<'_>,
    name: &str,
) -> Result<Option<String>, MetadataError> {
    e.try_get_attribute(name)
        .map_err(|err| MetadataError::Malformed(err.to_string()))?
        .map(|attr| {
            attr.unescape_value()
                .map(|v| v.into_owned())
                .map_err(|err| MetadataError::Malformed(err.to_string()))
        })
        .transpose()
}

#[derive(Default)]
struct GuardFields {
    verifier_url: Option<String>,
    attribute_consumer_url: Option<String>,
    podder_url: Option<String>,
    keystore: Option<String>,
    keystore_password: Option<String>,
}

impl GuardFields {
    fn set(&mut self, element: &[u8], text: &str) {
        let value = Some(text.to_string());
        match element {
            b"VerifierURL" => self.verifier_url = value,
            b"AttributeConsumerServiceURL" => self.attribute_consumer_url = value,
            b"PodderURL" => self.podder_url = value,
            b"Keystore" => self.keystore = value,
            b"KeystorePassword" => self.keystore_password = value,
            _ => {}
        }
    }

    fn take(&mut self) -> Result<GuardEndpoints, MetadataError> {
        let missing = |field: &str| MetadataError::Malformed(format!("GuardService missing {field}"));
        Ok(GuardEndpoints {
            verifier_url: self.verifier_url.take().ok_or_else(|| missing("VerifierURL"))?,
            attribute_consumer_url: self
                .attribute_consumer_url
                .take()
                .ok_or_else(|| missing("AttributeConsumerServiceURL"))?,
            podder_url: self.podder_url.take().ok_or_else(|| missing("PodderURL"))?,
            keystore: PathBuf::from(self.keystore.take().ok_or_else(|| missing("Keystore"))?),
            keystore_password: self
                .keystore_password
                .take()
                .ok_or_else(|| missing("KeystorePassword"))?,
        })
    }
}

#[derive(Default)]
struct IdpFields {
    attribute_authority_url: Option<String>,
    signing_certificate: Option<Vec<u8>>,
    sso_endpoints: Vec<SsoEndpoint>,
}

impl IdpFields {
    fn set(&mut self, element: &[u8], text: &str) {
        match element {
            b"AttributeAuthorityURL" => self.attribute_authority_url = Some(text.to_string()),
            b"SigningCertificate" => {
                // Whitespace inside the base64 block is tolerated.
                let compact: String = text.split_whitespace().collect();
                self.signing_certificate = base64::engine::general_purpose::STANDARD
                    .decode(compact)
                    .ok();
            }
            _ => {}
        }
    }

    fn push_sso(&mut self, e: &quick_xml::events::BytesStart<'_>) -> Result<(), MetadataError> {
        let binding = attribute(e, "Binding")?
            .ok_or_else(|| MetadataError::Malformed("SingleSignOnService missing Binding".into()))?;
        let location = attribute(e, "Location")?
            .ok_or_else(|| MetadataError::Malformed("SingleSignOnService missing Location".into()))?;
        self.sso_endpoints.push(SsoEndpoint { binding, location });
        Ok(())
    }

    fn take(&mut self) -> Result<IdpEndpoints, MetadataError> {
        Ok(IdpEndpoints {
            attribute_authority_url: self.attribute_authority_url.take().ok_or_else(|| {
                MetadataError::Malformed("IdPService missing AttributeAuthorityURL".into())
            })?,
            signing_certificate: self.signing_certificate.take().ok_or_else(|| {
                MetadataError::Malformed("IdPService missing SigningCertificate".into())
            })?,
            sso_endpoints: std::mem::take(&mut self.sso_endpoints),
        })
    }
}

/// Serialises a guard record to its metadata document.
#[must_use]
pub fn guard_document_xml(entity_id: &str, guard: &GuardEndpoints) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<EntityDescriptor entityID="{}">
  <GuardService>
    <VerifierURL>{}</VerifierURL>
    <AttributeConsumerServiceURL>{}</AttributeConsumerServiceURL>
    <PodderURL>{}</PodderURL>
    <Keystore>{}</Keystore>
    <KeystorePassword>{}</KeystorePassword>
  </GuardService>
</EntityDescriptor>
"#,
        xml_escape(entity_id),
        xml_escape(&guard.verifier_url),
        xml_escape(&guard.attribute_consumer_url),
        xml_escape(&guard.podder_url),
        xml_escape(&guard.keystore.display().to_string()),
        xml_escape(&guard.keystore_password),
    )
}

/// Serialises an IdP record to its metadata document.
#[must_use]
pub fn idp_document_xml(entity_id: &str, idp: &IdpEndpoints) -> String {
    let cert = base64::engine::general_purpose::STANDARD.encode(&idp.signing_certificate);
    let mut ssos = String::new();
    for sso in &idp.sso_endpoints {
        ssos.push_str(&format!(
            "    <SingleSignOnService Binding=\"{}\" Location=\"{}\"/>\n",
            xml_escape(&sso.binding),
            xml_escape(&sso.location)
        ));
    }
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<EntityDescriptor entityID="{}">
  <IdPService>
    <AttributeAuthorityURL>{}</AttributeAuthorityURL>
    <SigningCertificate>{}</SigningCertificate>
{}  </IdPService>
</EntityDescriptor>
"#,
        xml_escape(entity_id),
        xml_escape(&idp.attribute_authority_url),
        cert,
        ssos,
    )
}

/// Escapes XML attribute and text content.
#[must_use]
pub fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_document_round_trips() {
        let guard = GuardEndpoints {
            verifier_url: "https://app.example.org/guard.sessionVerifier".to_string(),
            attribute_consumer_url: "https://app.example.org/guard.acs".to_string(),
            podder_url: "https://app.example.org/guard.podder".to_string(),
            keystore: PathBuf::from("metadata/guards/app/app.keystore"),
            keystore_password: "s3cret".to_string(),
        };
        let xml = guard_document_xml("app-guard", &guard);
        let record = parse_entity_document(&xml).unwrap();

        assert_eq!(record.entity_id, "app-guard");
        assert_eq!(record.as_guard(), Some(&guard));
    }

    #[test]
    fn idp_document_round_trips() {
        let idp = IdpEndpoints {
            attribute_authority_url: "https://idp.example.org/aa".to_string(),
            signing_certificate: vec![0x30, 0x82, 0x01, 0x0a],
            sso_endpoints: vec![SsoEndpoint {
                binding: "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST".to_string(),
                location: "https://idp.example.org/sso".to_string(),
            }],
        };
        let xml = idp_document_xml("https://idp.example.org", &idp);
        let record = parse_entity_document(&xml).unwrap();

        assert_eq!(record.entity_id, "https://idp.example.org");
        assert_eq!(record.as_idp(), Some(&idp));
    }

    #[test]
    fn document_without_role_is_rejected() {
        let xml = r#"<EntityDescriptor entityID="x"></EntityDescriptor>"#;
        assert!(matches!(
            parse_entity_document(xml),
            Err(MetadataError::Malformed(_))
        ));
    }

    #[test]
    fn missing_entity_id_is_rejected() {
        let xml = "<EntityDescriptor><GuardService></GuardService></EntityDescriptor>";
        assert!(parse_entity_document(xml).is_err());
    }
}
