//! Certificate issuance.

use rcgen::{
    BasicConstraints, CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa, KeyIdMethod,
    KeyPair, KeyUsagePurpose, SerialNumber,
};
use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use rsa::RsaPrivateKey;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};
use ::time::{Duration, OffsetDateTime};
use tracing::{error, info};
use x509_parser::prelude::*;

use crate::error::CaError;

/// RSA modulus size for newly issued guard keys.
///
/// The signing backend refuses anything below 2048 bits, so that is the
/// floor here as well.
pub const RSA_KEY_BITS: usize = 2048;

/// Leaf certificates become valid this long before the issuance instant,
/// absorbing clock skew between the engine and its counterparts.
const VALID_FROM_BACKDATE: Duration = Duration::minutes(10);

/// Leaf certificate lifetime past the issuance instant.
const VALID_FOR: Duration = Duration::days(20);

/// Key algorithms a registration may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAlgorithm {
    /// RSA with SHA-256.
    Rsa,
    /// DSA. Accepted by the parser for completeness; issuance rejects it
    /// because no crate in the stack generates or signs DSA keys.
    Dsa,
}

impl FromStr for KeyAlgorithm {
    type Err = CaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rsa" => Ok(Self::Rsa),
            "dsa" => Ok(Self::Dsa),
            other => Err(CaError::UnsupportedKeyAlgorithm(other.to_string())),
        }
    }
}

/// The subject name for a new guard certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectDn {
    /// Common name; the guard ID.
    pub common_name: String,
    /// Organisational unit.
    pub org_unit: String,
    /// Organisation.
    pub org: String,
    /// Locality (city).
    pub city: String,
    /// State or province.
    pub locality: String,
    /// Two-letter country code.
    pub country: String,
}

impl fmt::Display for SubjectDn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CN={},OU={},O={},L={},ST={},C={}",
            self.common_name, self.org_unit, self.org, self.city, self.locality, self.country
        )
    }
}

impl SubjectDn {
    fn apply(&self, params: &mut CertificateParams) {
        let dn = &mut params.distinguished_name;
        dn.push(DnType::CommonName, &self.common_name);
        dn.push(DnType::OrganizationalUnitName, &self.org_unit);
        dn.push(DnType::OrganizationName, &self.org);
        dn.push(DnType::LocalityName, &self.city);
        dn.push(DnType::StateOrProvinceName, &self.locality);
        dn.push(DnType::CountryName, &self.country);
    }
}

/// A freshly issued identity: the new private key and its 2-element chain.
///
/// The private key never leaves the issuing process except through the
/// keystore file written for the guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedIdentity {
    /// Subject DN the certificate was issued for.
    pub subject_dn: String,
    /// PKCS#8 private key, PEM-encoded.
    pub private_key_pem: String,
    /// Certificate chain `[leaf, root]`, PEM-encoded.
    pub chain_pem: Vec<String>,
}

impl IssuedIdentity {
    /// The identity as a [`fg_trust::Identity`] for keystore storage.
    #[must_use]
    pub fn as_store_identity(&self) -> fg_trust::Identity {
        fg_trust::Identity {
            chain_pem: self.chain_pem.clone(),
            key_pem: self.private_key_pem.clone(),
        }
    }
}

/// The root signing material, loaded from the engine keystore.
///
/// Read-only at runtime.
pub struct CaBundle {
    /// The root certificate exactly as configured, PEM-encoded.
    pub certificate_pem: String,
    /// The root certificate, DER-encoded.
    pub certificate_der: Vec<u8>,
    /// Subject DN of the root.
    pub subject_dn: String,
    key_pair: KeyPair,
    /// Issuer handle the signing backend needs; carries the root's DN and
    /// key, rebuilt once at load time.
    issuer: rcgen::Certificate,
}

impl CaBundle {
    /// Loads the bundle from a keystore container entry.
    pub fn from_keystore(path: &Path, password: &str, alias: &str) -> Result<Self, CaError> {
        let container = fg_trust::Container::open(path, password)?;
        let identity = container.identity(alias)?;
        let root_pem = identity
            .chain_pem
            .first()
            .ok_or_else(|| CaError::InvalidBundle("keystore entry has an empty chain".into()))?;
        Self::from_pem(root_pem, &identity.key_pem)
    }

    /// Builds the bundle from PEM material.
    pub fn from_pem(certificate_pem: &str, key_pem: &str) -> Result<Self, CaError> {
        let key_pair =
            KeyPair::from_pem(key_pem).map_err(|e| CaError::InvalidBundle(e.to_string()))?;

        let (_, parsed) = x509_parser::pem::parse_x509_pem(certificate_pem.as_bytes())
            .map_err(|e| CaError::InvalidBundle(e.to_string()))?;
        let certificate_der = parsed.contents.clone();
        let cert = parsed
            .parse_x509()
            .map_err(|e| CaError::InvalidBundle(e.to_string()))?;
        let subject_dn = cert.subject().to_string();

        let issuer = issuer_handle(&cert, &key_pair)?;

        Ok(Self {
            certificate_pem: certificate_pem.to_string(),
            certificate_der,
            subject_dn,
            key_pair,
            issuer,
        })
    }
}

/// Rebuilds an issuer handle carrying the root's distinguished name, for
/// signing leaves against.
fn issuer_handle(cert: &X509Certificate<'_>, key: &KeyPair) -> Result<rcgen::Certificate, CaError> {
    let mut params = CertificateParams::default();
    for rdn in cert.subject().iter() {
        for attr in rdn.iter() {
            let value = attr.as_str().unwrap_or("");
            match attr.attr_type().to_string().as_str() {
                "2.5.4.3" => params.distinguished_name.push(DnType::CommonName, value),
                "2.5.4.6" => params.distinguished_name.push(DnType::CountryName, value),
                "2.5.4.7" => params.distinguished_name.push(DnType::LocalityName, value),
                "2.5.4.8" => params
                    .distinguished_name
                    .push(DnType::StateOrProvinceName, value),
                "2.5.4.10" => params
                    .distinguished_name
                    .push(DnType::OrganizationName, value),
                "2.5.4.11" => params
                    .distinguished_name
                    .push(DnType::OrganizationalUnitName, value),
                _ => {}
            }
        }
    }
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.key_usages = vec![
        KeyUsagePurpose::KeyCertSign,
        KeyUsagePurpose::DigitalSignature,
    ];
    params
        .self_signed(key)
        .map_err(|e| CaError::InvalidBundle(e.to_string()))
}

/// Signs guard certificate requests against the engine root.
pub struct CertificateAuthority {
    bundle: CaBundle,
}

impl CertificateAuthority {
    /// Creates the authority over a loaded bundle.
    #[must_use]
    pub fn new(bundle: CaBundle) -> Self {
        Self { bundle }
    }

    /// The root bundle this authority signs with.
    #[must_use]
    pub fn bundle(&self) -> &CaBundle {
        &self.bundle
    }

    /// Creates a brand new self-signed root and returns it as a bundle.
    ///
    /// Used when an engine is first provisioned; afterwards the bundle is
    /// loaded from the keystore.
    pub fn bootstrap_root(subject: &SubjectDn, validity_days: i64) -> Result<CaBundle, CaError> {
        let key_pem = generate_rsa_key_pem()?;
        let key_pair =
            KeyPair::from_pem(&key_pem).map_err(|e| CaError::KeyGeneration(e.to_string()))?;

        let mut params = CertificateParams::default();
        subject.apply(&mut params);
        let now = OffsetDateTime::now_utc();
        params.not_before = now - VALID_FROM_BACKDATE;
        params.not_after = now + Duration::days(validity_days);
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![
            KeyUsagePurpose::KeyCertSign,
            KeyUsagePurpose::DigitalSignature,
        ];
        params.key_identifier_method = KeyIdMethod::Sha256;

        let cert = params
            .self_signed(&key_pair)
            .map_err(|e| CaError::Signing(e.to_string()))?;

        CaBundle::from_pem(&cert.pem(), &key_pem)
    }

    /// Issues a new identity for `subject`.
    ///
    /// The leaf is valid from ten minutes before now until twenty days from
    /// now, its serial number is the current time in milliseconds, and it
    /// carries the authority key identifier of the root, a subject key
    /// identifier for the new key, CA:false basic constraints, key usage
    /// digitalSignature|keyEncipherment and extended key usage clientAuth.
    /// The resulting chain is `[leaf, root]`.
    pub fn issue_certificate(
        &self,
        subject: &SubjectDn,
        algorithm: KeyAlgorithm,
    ) -> Result<IssuedIdentity, CaError> {
        match self.try_issue(subject, algorithm) {
            Ok(identity) => {
                info!(subject = %subject, "issued guard identity");
                Ok(identity)
            }
            Err(e) => {
                error!(subject = %subject, error = %e, "guard identity issuance failed");
                Err(e)
            }
        }
    }

    fn try_issue(
        &self,
        subject: &SubjectDn,
        algorithm: KeyAlgorithm,
    ) -> Result<IssuedIdentity, CaError> {
        let key_pem = match algorithm {
            KeyAlgorithm::Rsa => generate_rsa_key_pem()?,
            KeyAlgorithm::Dsa => {
                return Err(CaError::UnsupportedKeyAlgorithm("dsa".to_string()));
            }
        };
        let leaf_key =
            KeyPair::from_pem(&key_pem).map_err(|e| CaError::KeyGeneration(e.to_string()))?;

        let mut params = CertificateParams::default();
        subject.apply(&mut params);

        let now = OffsetDateTime::now_utc();
        params.not_before = now - VALID_FROM_BACKDATE;
        params.not_after = now + VALID_FOR;
        params.serial_number = Some(SerialNumber::from_slice(&unix_millis().to_be_bytes()));
        params.use_authority_key_identifier_extension = true;
        params.key_identifier_method = KeyIdMethod::Sha256;
        params.is_ca = IsCa::ExplicitNoCa;
        params.key_usages = vec![
            KeyUsagePurpose::DigitalSignature,
            KeyUsagePurpose::KeyEncipherment,
        ];
        params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ClientAuth];

        let leaf = params
            .signed_by(&leaf_key, &self.bundle.issuer, &self.bundle.key_pair)
            .map_err(|e| CaError::Signing(e.to_string()))?;

        Ok(IssuedIdentity {
            subject_dn: subject.to_string(),
            private_key_pem: key_pem,
            chain_pem: vec![leaf.pem(), self.bundle.certificate_pem.clone()],
        })
    }
}

fn generate_rsa_key_pem() -> Result<String, CaError> {
    let mut rng = rand::rngs::OsRng;
    let key = RsaPrivateKey::new(&mut rng, RSA_KEY_BITS)
        .map_err(|e| CaError::KeyGeneration(e.to_string()))?;
    let pem = key
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| CaError::KeyGeneration(e.to_string()))?;
    Ok(pem.to_string())
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subject(cn: &str) -> SubjectDn {
        SubjectDn {
            common_name: cn.to_string(),
            org_unit: "Apps".to_string(),
            org: "Example University".to_string(),
            city: "Inverness".to_string(),
            locality: "Highland".to_string(),
            country: "GB".to_string(),
        }
    }

    fn authority() -> CertificateAuthority {
        let bundle = CertificateAuthority::bootstrap_root(&subject("fedgate-root"), 3650).unwrap();
        CertificateAuthority::new(bundle)
    }

    #[test]
    fn issued_chain_is_leaf_then_configured_root() {
        let ca = authority();
        let identity = ca
            .issue_certificate(&subject("app-guard"), KeyAlgorithm::Rsa)
            .unwrap();

        assert_eq!(identity.chain_pem.len(), 2);
        assert_eq!(identity.chain_pem[1], ca.bundle().certificate_pem);
        assert_eq!(identity.subject_dn, subject("app-guard").to_string());
    }

    #[test]
    fn leaf_subject_matches_request_and_signature_verifies_against_root() {
        let ca = authority();
        let identity = ca
            .issue_certificate(&subject("app-guard"), KeyAlgorithm::Rsa)
            .unwrap();

        let (_, leaf_pem) =
            x509_parser::pem::parse_x509_pem(identity.chain_pem[0].as_bytes()).unwrap();
        let leaf = leaf_pem.parse_x509().unwrap();
        let (_, root_pem) =
            x509_parser::pem::parse_x509_pem(identity.chain_pem[1].as_bytes()).unwrap();
        let root = root_pem.parse_x509().unwrap();

        let cn = leaf
            .subject()
            .iter_common_name()
            .next()
            .unwrap()
            .as_str()
            .unwrap();
        assert_eq!(cn, "app-guard");
        assert_eq!(leaf.issuer(), root.subject());
        assert!(leaf.verify_signature(Some(root.public_key())).is_ok());
    }

    #[test]
    fn leaf_is_a_client_certificate_not_a_ca() {
        let ca = authority();
        let identity = ca
            .issue_certificate(&subject("app-guard"), KeyAlgorithm::Rsa)
            .unwrap();

        let (_, leaf_pem) =
            x509_parser::pem::parse_x509_pem(identity.chain_pem[0].as_bytes()).unwrap();
        let leaf = leaf_pem.parse_x509().unwrap();

        let bc = leaf.basic_constraints().unwrap().unwrap();
        assert!(!bc.value.ca);

        let ku = leaf.key_usage().unwrap().unwrap();
        assert!(ku.value.digital_signature());
        assert!(ku.value.key_encipherment());

        let eku = leaf.extended_key_usage().unwrap().unwrap();
        assert!(eku.value.client_auth);
    }

    #[test]
    fn validity_window_is_backdated_ten_minutes_for_twenty_days() {
        let ca = authority();
        let identity = ca
            .issue_certificate(&subject("app-guard"), KeyAlgorithm::Rsa)
            .unwrap();

        let (_, leaf_pem) =
            x509_parser::pem::parse_x509_pem(identity.chain_pem[0].as_bytes()).unwrap();
        let leaf = leaf_pem.parse_x509().unwrap();

        let now = OffsetDateTime::now_utc().unix_timestamp();
        let not_before = leaf.validity().not_before.timestamp();
        let not_after = leaf.validity().not_after.timestamp();

        // Ten minutes back, give or take a minute of test execution.
        assert!((now - not_before - 600).abs() < 60);
        assert!((not_after - now - 20 * 24 * 3600).abs() < 60);
    }

    #[test]
    fn dsa_issuance_is_rejected() {
        let ca = authority();
        let result = ca.issue_certificate(&subject("app-guard"), KeyAlgorithm::Dsa);
        assert!(matches!(result, Err(CaError::UnsupportedKeyAlgorithm(_))));
    }

    #[test]
    fn key_algorithm_parses_case_insensitively() {
        assert_eq!("RSA".parse::<KeyAlgorithm>().unwrap(), KeyAlgorithm::Rsa);
        assert_eq!("dsa".parse::<KeyAlgorithm>().unwrap(), KeyAlgorithm::Dsa);
        assert!("ed25519".parse::<KeyAlgorithm>().is_err());
    }
}
