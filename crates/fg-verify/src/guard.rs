//! Guard session verification.

use fg_core::EngineConfig;
use fg_metadata::MetadataRegistry;
use fg_session::{ProbeFlags, ProbeOutcome, SessionBinding, SessionRegistry};
use fg_trust::TrustStore;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{error, info};

use crate::client::{GuardVerifierClient, SESSION_VERIFIER_VERIFIED};
use crate::error::VerifyError;
use crate::probe::SecureChannelProber;

/// The raw callback parameters, both optional until validated.
#[derive(Debug, Clone, Copy, Default)]
pub struct GuardCallback<'a> {
    /// The `guardid` parameter.
    pub guard_id: Option<&'a str>,
    /// The `sessionid` parameter.
    pub session_id: Option<&'a str>,
}

/// Blocks guard access to engine services until the guard is verified.
///
/// A callback walks through: parameter validation, metadata resolution,
/// a one-time secure-comms probe, the verifier-endpoint round trip, and
/// finally session binding. Every rejection is terminal for the flow.
pub struct GuardSessionVerifier {
    registry: Arc<MetadataRegistry>,
    sessions: Arc<SessionRegistry>,
    probes: Arc<ProbeFlags>,
    trust_store: Arc<TrustStore>,
    prober: Arc<dyn SecureChannelProber>,
    client: Arc<dyn GuardVerifierClient>,
    config: RwLock<Option<Arc<EngineConfig>>>,
}

impl GuardSessionVerifier {
    /// Creates the verifier over its collaborators.
    #[must_use]
    pub fn new(
        registry: Arc<MetadataRegistry>,
        sessions: Arc<SessionRegistry>,
        probes: Arc<ProbeFlags>,
        trust_store: Arc<TrustStore>,
        prober: Arc<dyn SecureChannelProber>,
        client: Arc<dyn GuardVerifierClient>,
    ) -> Self {
        Self {
            registry,
            sessions,
            probes,
            trust_store,
            prober,
            client,
            config: RwLock::new(None),
        }
    }

    /// Marks the engine configuration as loaded. Callbacks arriving before
    /// this are rejected as uninitialised.
    pub fn set_config(&self, config: Arc<EngineConfig>) {
        *self.config.write() = Some(config);
    }

    /// Runs the verification protocol for one callback.
    ///
    /// On success the session is bound in the registry and the binding is
    /// returned.
    pub async fn verify(&self, callback: GuardCallback<'_>) -> Result<SessionBinding, VerifyError> {
        let guard_id = callback
            .guard_id
            .ok_or_else(|| VerifyError::Parameter("guardid".to_string()))?;
        let session_id = callback
            .session_id
            .ok_or_else(|| VerifyError::Parameter("sessionid".to_string()))?;

        let record = self
            .registry
            .lookup(guard_id)
            .ok_or_else(|| VerifyError::MetadataNotFound(guard_id.to_string()))?;
        let guard = record
            .as_guard()
            .ok_or_else(|| VerifyError::MetadataNotFound(guard_id.to_string()))?;

        if self.config.read().is_none() {
            error!(guard_id, "guard called before engine initialisation finished");
            return Err(VerifyError::Uninitialized);
        }

        // One-time secure comms probe: capture the guard's certificate into
        // the trust store so the mutually authenticated calls later in the
        // flow can be made against it.
        if !self.probes.is_probed(guard_id) {
            if guard.is_secure() {
                info!(guard_id, "probing guard certificate");
                let der = self
                    .prober
                    .capture_server_certificate(&guard.verifier_url)
                    .await?;
                self.trust_store
                    .insert_certificate_der(guard_id, &der)
                    .map_err(|e| VerifyError::Probe(e.to_string()))?;
                self.probes.mark(guard_id, ProbeOutcome::Secure);
                info!(guard_id, "added guard certificate to trust store");
            } else {
                self.probes.mark(guard_id, ProbeOutcome::NotSecure);
            }
        }

        // The guard must confirm it issued this session.
        let body = self
            .client
            .verify_session(&guard.verifier_url, session_id)
            .await
            .map_err(|e| VerifyError::Verification(e.to_string()))?;
        if body != SESSION_VERIFIER_VERIFIED {
            error!(guard_id, %body, "guard rejected the session");
            return Err(VerifyError::Verification(format!(
                "guard returned '{body}'"
            )));
        }

        let binding = SessionBinding::new(session_id, guard_id)
            .map_err(|e| VerifyError::Parameter(e.to_string()))?;
        self.sessions.bind(binding.clone(), record);
        Ok(binding)
    }
}
