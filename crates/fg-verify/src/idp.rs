//! IdP assertion verification.

use fg_metadata::{EntityRecord, MetadataRegistry};
use fg_protocol_saml::types::LegacyResponse;
use fg_trust::ChainVerifier;
use std::sync::Arc;
use tracing::{debug, error};

use crate::error::VerifyError;

/// A verified inbound assertion, ready for the attribute pipeline.
pub struct VerifiedAssertion {
    /// The parsed response.
    pub response: LegacyResponse,
    /// Issuer provider ID.
    pub issuer: String,
    /// The subject's name identifier.
    pub name_identifier: String,
    /// The issuing IdP's record.
    pub idp: Arc<EntityRecord>,
}

/// Decides whether an inbound assertion genuinely originates from a known
/// IdP.
pub struct IdpAssertionVerifier {
    registry: Arc<MetadataRegistry>,
    chain_verifier: Arc<ChainVerifier>,
}

impl IdpAssertionVerifier {
    /// Creates the verifier.
    #[must_use]
    pub fn new(registry: Arc<MetadataRegistry>, chain_verifier: Arc<ChainVerifier>) -> Self {
        Self {
            registry,
            chain_verifier,
        }
    }

    /// Verifies the base64-encoded response delivered by the browser.
    pub fn verify(&self, saml_response: Option<&str>) -> Result<VerifiedAssertion, VerifyError> {
        let encoded = saml_response
            .ok_or_else(|| VerifyError::Parameter("SAMLResponse".to_string()))?;
        let response = LegacyResponse::parse_base64(encoded)?;

        let issuer = response
            .issuer
            .clone()
            .ok_or_else(|| VerifyError::Verification("response carries no issuer".to_string()))?;
        let name_identifier = response.subject_name_identifier.clone().ok_or_else(|| {
            VerifyError::Verification("response carries no subject name identifier".to_string())
        })?;

        // An unsigned response is rejected outright.
        let Some(signature) = response.signature.clone() else {
            error!(%issuer, "response from IdP carries no signature");
            return Err(VerifyError::Verification(
                "response is not signed".to_string(),
            ));
        };

        let idp = self
            .registry
            .lookup(&issuer)
            .filter(|record| record.as_idp().is_some())
            .ok_or_else(|| VerifyError::MetadataNotFound(issuer.clone()))?;

        // The issuer's provider ID and its certificate subject rarely agree
        // letter for letter, so trust rides on the certificates embedded in
        // the signature, matched against the metadata-sourced store.
        if !self.chain_verifier.verify_chain(&signature.certificates) {
            error!(%issuer, "no trusted certificate for IdP");
            return Err(VerifyError::Verification(format!(
                "untrusted certificate chain from {issuer}"
            )));
        }

        debug!(%issuer, %name_identifier, "assertion verified");
        Ok(VerifiedAssertion {
            response,
            issuer,
            name_identifier,
            idp,
        })
    }
}
