//! The engine's on-disk trust store.

use fg_metadata::MetadataRegistry;
use parking_lot::Mutex;
use std::path::PathBuf;
use tracing::info;
use x509_parser::pem::parse_x509_pem;

use crate::container::Container;
use crate::error::TrustError;

/// On-disk store of counterpart certificates, keyed by alias.
///
/// Guard certificates captured by the secure-comms probe land here under the
/// guard's entity ID; IdP attribute-authority certificates are synced from
/// metadata under theirs. Every read-modify-write cycle runs under one lock
/// and persists through an atomic rename, so two concurrent probes for
/// different guards cannot lose each other's update.
pub struct TrustStore {
    path: PathBuf,
    inner: Mutex<Container>,
}

impl TrustStore {
    /// Opens the trust store file, creating it when absent.
    pub fn open(path: PathBuf, password: &str) -> Result<Self, TrustError> {
        let container = Container::open_or_create(&path, password)?;
        Ok(Self {
            path,
            inner: Mutex::new(container),
        })
    }

    /// Inserts a DER certificate under `alias` and persists the store.
    ///
    /// An existing entry under the alias is replaced.
    pub fn insert_certificate_der(&self, alias: &str, der: &[u8]) -> Result<(), TrustError> {
        let pem = pem::encode(&pem::Pem::new("CERTIFICATE", der.to_vec()));
        self.insert_certificate_pem(alias, &pem)
    }

    /// Inserts a PEM certificate under `alias` and persists the store.
    pub fn insert_certificate_pem(&self, alias: &str, cert_pem: &str) -> Result<(), TrustError> {
        // Reject garbage before it lands on disk.
        parse_x509_pem(cert_pem.as_bytes())
            .map_err(|e| TrustError::InvalidCertificate(e.to_string()))?;

        let mut container = self.inner.lock();
        container.set_certificate(alias, cert_pem);
        container.save(&self.path)?;
        info!(alias, "trust store updated");
        Ok(())
    }

    /// Replaces the stored certificate of every registered IdP with the one
    /// its metadata currently declares, keyed by entity ID, then persists.
    pub fn sync_authority_certificates(
        &self,
        registry: &MetadataRegistry,
    ) -> Result<usize, TrustError> {
        let mut container = self.inner.lock();
        let mut synced = 0;
        for record in registry.idp_records() {
            let Some(idp) = record.as_idp() else { continue };
            let pem = pem::encode(&pem::Pem::new(
                "CERTIFICATE",
                idp.signing_certificate.clone(),
            ));
            container.set_certificate(&record.entity_id, &pem);
            synced += 1;
        }
        container.save(&self.path)?;
        Ok(synced)
    }

    /// The certificate PEM stored under an alias.
    pub fn certificate(&self, alias: &str) -> Result<String, TrustError> {
        self.inner.lock().certificate(alias).map(str::to_string)
    }

    /// Whether an entry exists under the alias.
    #[must_use]
    pub fn contains(&self, alias: &str) -> bool {
        self.inner.lock().contains(alias)
    }

    /// Every stored certificate PEM, for use as TLS roots.
    #[must_use]
    pub fn root_certificates_pem(&self) -> Vec<String> {
        self.inner
            .lock()
            .certificates()
            .into_iter()
            .map(|(_, pem)| pem)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fg_metadata::{EntityRecord, EntityRole, IdpEndpoints};
    use std::sync::Arc;

    fn cert_der(cn: &str) -> Vec<u8> {
        let key = rcgen::KeyPair::generate().unwrap();
        let mut params = rcgen::CertificateParams::default();
        params.distinguished_name.push(rcgen::DnType::CommonName, cn);
        params.self_signed(&key).unwrap().der().as_ref().to_vec()
    }

    #[test]
    fn insert_persists_and_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.truststore");

        let store = TrustStore::open(path.clone(), "pw").unwrap();
        store
            .insert_certificate_der("app-guard", &cert_der("app-guard"))
            .unwrap();

        let reopened = TrustStore::open(path, "pw").unwrap();
        assert!(reopened.contains("app-guard"));
        assert!(reopened
            .certificate("app-guard")
            .unwrap()
            .contains("BEGIN CERTIFICATE"));
    }

    #[test]
    fn concurrent_inserts_do_not_lose_updates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.truststore");
        let store = Arc::new(TrustStore::open(path.clone(), "pw").unwrap());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    let alias = format!("guard-{i}");
                    store
                        .insert_certificate_der(&alias, &cert_der(&alias))
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let reopened = TrustStore::open(path, "pw").unwrap();
        for i in 0..8 {
            assert!(reopened.contains(&format!("guard-{i}")), "guard-{i} lost");
        }
    }

    #[test]
    fn sync_replaces_idp_certificates_under_entity_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.truststore");
        let store = TrustStore::open(path, "pw").unwrap();

        let registry = MetadataRegistry::new();
        registry.register(EntityRecord {
            entity_id: "https://idp.example.org".to_string(),
            role: EntityRole::IdP(IdpEndpoints {
                attribute_authority_url: "https://idp.example.org/aa".to_string(),
                signing_certificate: cert_der("idp"),
                sso_endpoints: Vec::new(),
            }),
        });

        assert_eq!(store.sync_authority_certificates(&registry).unwrap(), 1);
        assert!(store.contains("https://idp.example.org"));
    }

    #[test]
    fn garbage_certificates_never_reach_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.truststore");
        let store = TrustStore::open(path, "pw").unwrap();

        assert!(store
            .insert_certificate_pem("bad", "not a certificate")
            .is_err());
        assert!(!store.contains("bad"));
    }
}
