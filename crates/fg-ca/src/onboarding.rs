//! Guard registration.
//!
//! Registering a guard creates its metadata directory, issues its identity,
//! writes the identity into a fresh keystore, emits the guard metadata
//! document and loads the new record into the registry. The directory is
//! removed again if any step fails: a half-initialised guard must never be
//! left in a loaded state.

use fg_core::EngineConfig;
use fg_metadata::{guard_document_xml, EntityRecord, EntityRole, GuardEndpoints, MetadataRegistry};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::authority::{CertificateAuthority, IssuedIdentity, KeyAlgorithm, SubjectDn};
use crate::error::CaError;
use crate::password::generate_keystore_password;

/// Input describing the guard being registered.
#[derive(Debug, Clone)]
pub struct GuardRegistration {
    /// The guard's entity ID; also becomes the certificate common name.
    pub guard_id: String,
    /// Organisational unit for the certificate subject.
    pub org_unit: String,
    /// Organisation for the certificate subject.
    pub org: String,
    /// City for the certificate subject.
    pub city: String,
    /// State or province for the certificate subject.
    pub locality: String,
    /// Country code for the certificate subject.
    pub country: String,
    /// URL scheme the guard application is served over.
    pub scheme: String,
    /// Host name of the guard application.
    pub host: String,
    /// Port of the guard application.
    pub port: u16,
    /// Context path of the guard application.
    pub application_name: String,
}

impl GuardRegistration {
    fn subject_dn(&self) -> SubjectDn {
        SubjectDn {
            common_name: self.guard_id.clone(),
            org_unit: self.org_unit.clone(),
            org: self.org.clone(),
            city: self.city.clone(),
            locality: self.locality.clone(),
            country: self.country.clone(),
        }
    }

    fn application_url(&self) -> String {
        let mut url = format!("{}://{}", self.scheme, self.host);
        if self.port != 80 {
            url.push_str(&format!(":{}", self.port));
        }
        url.push('/');
        url.push_str(&self.application_name);
        url
    }
}

/// The outcome of a successful registration.
pub struct RegisteredGuard {
    /// The record now present in the registry.
    pub record: Arc<EntityRecord>,
    /// The issued identity; the chain is shown to the operator.
    pub identity: IssuedIdentity,
    /// Password of the keystore written for this guard.
    pub keystore_password: String,
}

/// Registers a guard end to end.
pub fn register_guard(
    config: &EngineConfig,
    registry: &MetadataRegistry,
    ca: &CertificateAuthority,
    form: &GuardRegistration,
) -> Result<RegisteredGuard, CaError> {
    let guard_key = form.guard_id.to_lowercase();
    let guard_dir = config.guards_metadata_dir.join(&guard_key);

    if guard_dir.exists() {
        return Err(CaError::AlreadyRegistered(form.guard_id.clone()));
    }
    std::fs::create_dir_all(&guard_dir)?;

    match provision(config, registry, ca, form, &guard_key, &guard_dir) {
        Ok(registered) => {
            info!(guard_id = %form.guard_id, "guard registered");
            Ok(registered)
        }
        Err(e) => {
            // Roll the directory back so nothing half-initialised stays
            // loaded or on disk.
            if let Err(cleanup) = std::fs::remove_dir_all(&guard_dir) {
                warn!(guard_id = %form.guard_id, error = %cleanup, "guard directory cleanup failed");
            }
            registry.remove(&guard_key);
            Err(e)
        }
    }
}

fn provision(
    config: &EngineConfig,
    registry: &MetadataRegistry,
    ca: &CertificateAuthority,
    form: &GuardRegistration,
    guard_key: &str,
    guard_dir: &Path,
) -> Result<RegisteredGuard, CaError> {
    let algorithm: KeyAlgorithm = config.key_type.parse()?;
    let identity = ca.issue_certificate(&form.subject_dn(), algorithm)?;

    let keystore_password = generate_keystore_password();
    let keystore_path = guard_dir.join(format!("{guard_key}.keystore"));
    let mut keystore = fg_trust::Container::create(&keystore_password)?;
    keystore.set_identity(guard_key, &identity.as_store_identity())?;
    keystore.save(&keystore_path)?;

    let app_url = form.application_url();
    let endpoints = GuardEndpoints {
        verifier_url: format!("{app_url}/guard/session-verifier"),
        attribute_consumer_url: format!("{app_url}/guard/attribute-consumer"),
        podder_url: format!("{app_url}/guard/podder"),
        keystore: keystore_path,
        keystore_password: keystore_password.clone(),
    };

    let document = guard_document_xml(guard_key, &endpoints);
    std::fs::write(guard_dir.join(format!("{guard_key}.xml")), document)?;

    let record = registry.register(EntityRecord {
        entity_id: guard_key.to_string(),
        role: EntityRole::Guard(endpoints),
    });

    Ok(RegisteredGuard {
        record,
        identity,
        keystore_password,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authority::SubjectDn;

    fn test_config(dir: &Path) -> EngineConfig {
        let mut config = EngineConfig::default();
        config.guards_metadata_dir = dir.join("guards");
        config.key_type = "rsa".to_string();
        config
    }

    fn test_ca() -> CertificateAuthority {
        let subject = SubjectDn {
            common_name: "fedgate-root".to_string(),
            org_unit: "Engine".to_string(),
            org: "Example".to_string(),
            city: "Inverness".to_string(),
            locality: "Highland".to_string(),
            country: "GB".to_string(),
        };
        CertificateAuthority::new(CertificateAuthority::bootstrap_root(&subject, 3650).unwrap())
    }

    fn form(guard_id: &str) -> GuardRegistration {
        GuardRegistration {
            guard_id: guard_id.to_string(),
            org_unit: "Apps".to_string(),
            org: "Example".to_string(),
            city: "Inverness".to_string(),
            locality: "Highland".to_string(),
            country: "GB".to_string(),
            scheme: "https".to_string(),
            host: "app.example.org".to_string(),
            port: 8443,
            application_name: "portal".to_string(),
        }
    }

    #[test]
    fn registration_creates_keystore_document_and_record() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        std::fs::create_dir_all(&config.guards_metadata_dir).unwrap();
        let registry = MetadataRegistry::new();

        let registered = register_guard(&config, &registry, &test_ca(), &form("MyGuard")).unwrap();

        // Record loaded under the lowercased ID.
        let record = registry.lookup("myguard").unwrap();
        let guard = record.as_guard().unwrap();
        assert_eq!(
            guard.verifier_url,
            "https://app.example.org:8443/portal/guard/session-verifier"
        );

        // Keystore opens with the generated password and holds the identity.
        let keystore =
            fg_trust::Container::open(&guard.keystore, &registered.keystore_password).unwrap();
        let identity = keystore.identity("myguard").unwrap();
        assert_eq!(identity.chain_pem.len(), 2);

        // Metadata document parses back to the same record.
        let xml = std::fs::read_to_string(
            config.guards_metadata_dir.join("myguard").join("myguard.xml"),
        )
        .unwrap();
        let parsed = fg_metadata::parse_entity_document(&xml).unwrap();
        assert_eq!(parsed.entity_id, "myguard");
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        std::fs::create_dir_all(&config.guards_metadata_dir).unwrap();
        let registry = MetadataRegistry::new();
        let ca = test_ca();

        register_guard(&config, &registry, &ca, &form("app")).unwrap();
        assert!(matches!(
            register_guard(&config, &registry, &ca, &form("app")),
            Err(CaError::AlreadyRegistered(_))
        ));
    }

    #[test]
    fn failed_issuance_leaves_no_guard_directory_or_record() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.key_type = "dsa".to_string();
        std::fs::create_dir_all(&config.guards_metadata_dir).unwrap();
        let registry = MetadataRegistry::new();

        let result = register_guard(&config, &registry, &test_ca(), &form("app"));
        assert!(matches!(result, Err(CaError::UnsupportedKeyAlgorithm(_))));
        assert!(!config.guards_metadata_dir.join("app").exists());
        assert!(registry.lookup("app").is_none());
    }

    #[test]
    fn default_port_is_omitted_from_the_application_url() {
        let mut f = form("app");
        f.port = 80;
        f.scheme = "http".to_string();
        assert_eq!(f.application_url(), "http://app.example.org/portal");
    }
}
