//! In-memory store of trusted certificates.

use fg_metadata::MetadataRegistry;
use tracing::warn;
use x509_parser::prelude::*;

/// One trusted certificate, indexed by its subject distinguished name.
#[derive(Debug, Clone)]
pub struct StoredCertificate {
    /// Subject DN in the parser's canonical string form.
    pub subject_dn: String,
    /// DER-encoded certificate.
    pub der: Vec<u8>,
}

/// The set of trusted X.509 certificates, one per IdP metadata document.
///
/// The store is rebuilt in full on every load call; there is no incremental
/// update. Lookups compare subject DN strings exactly, and the first match
/// wins when two certificates share a DN.
#[derive(Debug, Default)]
pub struct CertificateStore {
    certs: Vec<StoredCertificate>,
}

impl CertificateStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the store from the signing certificate of every registered
    /// IdP. Returns the number of certificates loaded.
    ///
    /// The previous content is discarded first: the only certificates in
    /// the store should be the ones from the currently loaded metadata.
    pub fn rebuild_from_registry(&mut self, registry: &MetadataRegistry) -> usize {
        self.certs.clear();
        for record in registry.idp_records() {
            let Some(idp) = record.as_idp() else { continue };
            match subject_dn_of(&idp.signing_certificate) {
                Ok(subject_dn) => self.certs.push(StoredCertificate {
                    subject_dn,
                    der: idp.signing_certificate.clone(),
                }),
                Err(e) => {
                    warn!(entity_id = %record.entity_id, error = %e, "skipping undecodable signing certificate");
                }
            }
        }
        self.certs.len()
    }

    /// Adds a certificate directly. Used by tests and by hosts that do not
    /// go through the metadata registry.
    pub fn insert_der(&mut self, der: Vec<u8>) -> Result<(), crate::TrustError> {
        let subject_dn = subject_dn_of(&der)
            .map_err(crate::TrustError::InvalidCertificate)?;
        self.certs.push(StoredCertificate { subject_dn, der });
        Ok(())
    }

    /// Whether some stored certificate carries exactly this subject DN.
    #[must_use]
    pub fn contains_subject(&self, subject_dn: &str) -> bool {
        self.first_by_subject(subject_dn).is_some()
    }

    /// First stored certificate with this subject DN, if any.
    #[must_use]
    pub fn first_by_subject(&self, subject_dn: &str) -> Option<&StoredCertificate> {
        self.certs.iter().find(|c| c.subject_dn == subject_dn)
    }

    /// Number of stored certificates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.certs.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.certs.is_empty()
    }
}

/// Extracts the subject DN string from a DER certificate.
pub(crate) fn subject_dn_of(der: &[u8]) -> Result<String, String> {
    let (_, cert) = X509Certificate::from_der(der).map_err(|e| e.to_string())?;
    Ok(cert.subject().to_string())
}

/// Extracts the issuer DN string from a DER certificate.
pub(crate) fn issuer_dn_of(der: &[u8]) -> Result<String, String> {
    let (_, cert) = X509Certificate::from_der(der).map_err(|e| e.to_string())?;
    Ok(cert.issuer().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fg_metadata::{EntityRecord, EntityRole, IdpEndpoints};

    fn idp_with_cert(id: &str, der: Vec<u8>) -> EntityRecord {
        EntityRecord {
            entity_id: id.to_string(),
            role: EntityRole::IdP(IdpEndpoints {
                attribute_authority_url: format!("https://{id}/aa"),
                signing_certificate: der,
                sso_endpoints: Vec::new(),
            }),
        }
    }

    fn self_signed(cn: &str) -> Vec<u8> {
        let key = rcgen::KeyPair::generate().unwrap();
        let mut params = rcgen::CertificateParams::default();
        params
            .distinguished_name
            .push(rcgen::DnType::CommonName, cn);
        params.self_signed(&key).unwrap().der().as_ref().to_vec()
    }

    #[test]
    fn rebuild_replaces_previous_content() {
        let registry = MetadataRegistry::new();
        registry.register(idp_with_cert("idp-one", self_signed("idp-one")));

        let mut store = CertificateStore::new();
        assert_eq!(store.rebuild_from_registry(&registry), 1);

        registry.replace_all(vec![idp_with_cert("idp-two", self_signed("idp-two"))]);
        assert_eq!(store.rebuild_from_registry(&registry), 1);

        let dn_two = subject_dn_of(&self_signed("idp-two")).unwrap();
        assert!(store.contains_subject(&dn_two));
        let dn_one = subject_dn_of(&self_signed("idp-one")).unwrap();
        assert!(!store.contains_subject(&dn_one));
    }

    #[test]
    fn undecodable_certificates_are_skipped() {
        let registry = MetadataRegistry::new();
        registry.register(idp_with_cert("broken", vec![0xde, 0xad]));
        registry.register(idp_with_cert("good", self_signed("good")));

        let mut store = CertificateStore::new();
        assert_eq!(store.rebuild_from_registry(&registry), 1);
    }

    #[test]
    fn first_match_wins_on_duplicate_dn() {
        let der_a = self_signed("shared");
        let der_b = self_signed("shared");
        let mut store = CertificateStore::new();
        store.insert_der(der_a.clone()).unwrap();
        store.insert_der(der_b).unwrap();

        let dn = subject_dn_of(&der_a).unwrap();
        let found = store.first_by_subject(&dn).unwrap();
        assert_eq!(found.der, der_a);
    }
}
