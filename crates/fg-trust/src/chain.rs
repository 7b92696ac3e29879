//! Certificate chain evaluation.

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::store::{issuer_dn_of, subject_dn_of, CertificateStore};

/// A decoded element of a presented chain.
#[derive(Debug)]
struct ChainElement {
    subject_dn: String,
    issuer_dn: String,
}

/// Decides whether a presented certificate chain resolves to the trusted
/// store.
///
/// Trust here reduces to distinguished-name presence: a chain verifies when
/// one of its elements carries a subject DN found in the metadata-sourced
/// store and the issuer/subject name walk over the presented set terminates
/// on a non-null element. No public key signature is checked at any step of
/// the walk; the store content itself is what was provisioned out-of-band
/// with the federation metadata.
#[derive(Debug, Default)]
pub struct ChainVerifier {
    store: RwLock<CertificateStore>,
}

impl ChainVerifier {
    /// Creates a verifier over an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a verifier over a pre-populated store.
    #[must_use]
    pub fn with_store(store: CertificateStore) -> Self {
        Self {
            store: RwLock::new(store),
        }
    }

    /// Rebuilds the trusted set from the metadata registry.
    ///
    /// Full replace, not additive. Returns the number of certificates now
    /// in the store.
    pub fn load_trusted_certificates(&self, registry: &fg_metadata::MetadataRegistry) -> usize {
        self.store.write().rebuild_from_registry(registry)
    }

    /// Evaluates a presented chain, ordered as it appeared in the
    /// signature's key-info block.
    ///
    /// Returns `false` when no element matches the store; callers must
    /// treat `false` as a hard deny.
    #[must_use]
    pub fn verify_chain(&self, chain: &[Vec<u8>]) -> bool {
        let elements = decode_elements(chain);
        if elements.is_empty() {
            return false;
        }

        let store = self.store.read();

        // The signer candidate is the first presented element whose subject
        // DN exactly matches a stored certificate's subject DN.
        let Some(signer) = elements
            .iter()
            .find(|e| store.contains_subject(&e.subject_dn))
        else {
            debug!("no presented certificate matches the trusted store");
            return false;
        };

        // A chain of one is the recognised certificate itself.
        if elements.len() == 1 {
            return true;
        }

        // Walk the presented set by name: the signer's issuer must appear
        // as some element's subject, and each step re-resolves the current
        // element's subject, for at most chain-length iterations.
        let mut current = find_by_subject(&elements, &signer.issuer_dn);
        let mut remaining = elements.len();
        while remaining != 0 {
            let Some(element) = current else { break };
            current = find_by_subject(&elements, &element.subject_dn);
            remaining -= 1;
        }

        current.is_some()
    }
}

fn decode_elements(chain: &[Vec<u8>]) -> Vec<ChainElement> {
    let mut elements = Vec::with_capacity(chain.len());
    for der in chain {
        match (subject_dn_of(der), issuer_dn_of(der)) {
            (Ok(subject_dn), Ok(issuer_dn)) => elements.push(ChainElement {
                subject_dn,
                issuer_dn,
            }),
            (Err(e), _) | (_, Err(e)) => {
                warn!(error = %e, "skipping undecodable chain element");
            }
        }
    }
    elements
}

fn find_by_subject<'a>(elements: &'a [ChainElement], subject_dn: &str) -> Option<&'a ChainElement> {
    elements.iter().find(|e| e.subject_dn == subject_dn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::CertificateStore;
    use rcgen::{BasicConstraints, CertificateParams, DnType, IsCa, KeyPair};

    struct TestCa {
        cert: rcgen::Certificate,
        key: KeyPair,
    }

    fn make_ca(cn: &str) -> TestCa {
        let key = KeyPair::generate().unwrap();
        let mut params = CertificateParams::default();
        params.distinguished_name.push(DnType::CommonName, cn);
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        let cert = params.self_signed(&key).unwrap();
        TestCa { cert, key }
    }

    fn make_leaf(cn: &str, ca: &TestCa) -> Vec<u8> {
        let key = KeyPair::generate().unwrap();
        let mut params = CertificateParams::default();
        params.distinguished_name.push(DnType::CommonName, cn);
        params
            .signed_by(&key, &ca.cert, &ca.key)
            .unwrap()
            .der()
            .to_vec()
    }

    fn verifier_trusting(ders: &[&[u8]]) -> ChainVerifier {
        let mut store = CertificateStore::new();
        for der in ders {
            store.insert_der(der.to_vec()).unwrap();
        }
        ChainVerifier::with_store(store)
    }

    #[test]
    fn single_element_chain_verifies_on_dn_presence_alone_no_signature_check() {
        let ca = make_ca("idp-signer");
        let leaf = make_leaf("idp-signer-key", &ca);
        let verifier = verifier_trusting(&[&leaf]);

        assert!(verifier.verify_chain(&[leaf]));
    }

    #[test]
    fn chain_with_no_store_match_is_denied() {
        let ca = make_ca("trusted-root");
        let stranger_ca = make_ca("stranger-root");
        let trusted = make_leaf("known", &ca);
        let stranger = make_leaf("unknown", &stranger_ca);

        let verifier = verifier_trusting(&[&trusted]);
        assert!(!verifier.verify_chain(&[stranger]));
    }

    #[test]
    fn two_element_chain_walk_terminates_within_length() {
        let ca = make_ca("federation-root");
        let leaf = make_leaf("idp-signing", &ca);
        let root = ca.cert.der().as_ref().to_vec();

        let verifier = verifier_trusting(&[&leaf]);
        assert!(verifier.verify_chain(&[leaf, root]));
    }

    #[test]
    fn walk_fails_when_issuer_is_absent_from_presented_set() {
        let ca = make_ca("federation-root");
        let other_ca = make_ca("unrelated-root");
        let leaf = make_leaf("idp-signing", &ca);
        let unrelated = other_ca.cert.der().as_ref().to_vec();

        // The leaf matches the store but nothing presented carries its
        // issuer's name, so the walk starts on null.
        let verifier = verifier_trusting(&[&leaf]);
        assert!(!verifier.verify_chain(&[leaf, unrelated]));
    }

    #[test]
    fn dn_lineup_verifies_even_when_issuer_never_signed_the_leaf_no_signature_check() {
        // A chain whose names line up passes: the companion certificate
        // merely carries the right subject DN, it never signed anything.
        let ca = make_ca("federation-root");
        let leaf = make_leaf("idp-signing", &ca);
        let impostor = make_ca("federation-root").cert.der().as_ref().to_vec();

        let verifier = verifier_trusting(&[&leaf]);
        assert!(verifier.verify_chain(&[leaf, impostor]));
    }

    #[test]
    fn undecodable_elements_contribute_no_trust() {
        let verifier = verifier_trusting(&[]);
        assert!(!verifier.verify_chain(&[vec![0xff, 0x00]]));
    }

    #[test]
    fn empty_chain_is_denied() {
        let ca = make_ca("root");
        let verifier = verifier_trusting(&[ca.cert.der().as_ref()]);
        assert!(!verifier.verify_chain(&[]));
    }
}
