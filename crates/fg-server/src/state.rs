//! Engine wiring.

use anyhow::Context;
use std::sync::Arc;
use tracing::info;

use fg_ca::{CaBundle, CertificateAuthority};
use fg_core::EngineConfig;
use fg_metadata::MetadataRegistry;
use fg_pipeline::JobRegistry;
use fg_protocol_saml::profile::{LegacyProfile, ModernProfile};
use fg_protocol_saml::ProfileDispatcher;
use fg_session::{ProbeFlags, SessionRegistry};
use fg_trust::{ChainVerifier, TrustStore};
use fg_verify::probe::ProbeIdentity;
use fg_verify::{GuardSessionVerifier, HttpGuardVerifierClient, IdpAssertionVerifier, TlsProber};

/// Everything the handlers need, wired once at startup.
pub struct EngineState {
    /// Engine configuration.
    pub config: Arc<EngineConfig>,
    /// Entity metadata.
    pub registry: Arc<MetadataRegistry>,
    /// Live session bindings.
    pub sessions: Arc<SessionRegistry>,
    /// Metadata-sourced certificate trust.
    pub chain_verifier: Arc<ChainVerifier>,
    /// On-disk counterpart certificates.
    pub trust_store: Arc<TrustStore>,
    /// Guard callback gatekeeper.
    pub guard_verifier: Arc<GuardSessionVerifier>,
    /// IdP assertion gatekeeper.
    pub idp_verifier: Arc<IdpAssertionVerifier>,
    /// Outbound request construction.
    pub dispatcher: Arc<ProfileDispatcher>,
    /// In-flight attribute pipeline jobs.
    pub jobs: Arc<JobRegistry>,
    /// Guard identity issuance.
    pub ca: Arc<CertificateAuthority>,
    /// Discovery location for the legacy profile.
    pub wayf_location: String,
}

impl EngineState {
    /// Loads metadata, trust material and the CA, and wires the engine.
    pub fn initialise(config: EngineConfig, wayf_location: String) -> anyhow::Result<Arc<Self>> {
        let config = Arc::new(config);

        let registry = Arc::new(MetadataRegistry::new());
        if config.idp_metadata_dir.is_dir() {
            let loaded = registry.load_dir(&config.idp_metadata_dir)?;
            info!(loaded, "IdP metadata loaded");
        }
        if config.guards_metadata_dir.is_dir() {
            let loaded = registry.load_guards_dir(&config.guards_metadata_dir)?;
            info!(loaded, "guard metadata loaded");
        }

        let chain_verifier = Arc::new(ChainVerifier::new());
        let trusted = chain_verifier.load_trusted_certificates(&registry);
        info!(trusted, "trusted certificates loaded");

        let trust_store = Arc::new(TrustStore::open(
            config.trust_store.clone(),
            &config.trust_store_password,
        )?);
        trust_store.sync_authority_certificates(&registry)?;

        // The engine's own identity backs the CA, the probe and the
        // verifier client.
        let engine_identity = fg_trust::Container::open(&config.keystore, &config.keystore_password)
            .and_then(|c| c.identity(&config.certificate_alias))
            .context("engine keystore")?;
        let ca_bundle = CaBundle::from_keystore(
            &config.keystore,
            &config.keystore_password,
            &config.certificate_alias,
        )?;
        let ca = Arc::new(CertificateAuthority::new(ca_bundle));

        let roots = trust_store.root_certificates_pem();
        let prober = Arc::new(TlsProber::new(Some(ProbeIdentity {
            chain_pem: engine_identity.chain_pem.join("\n"),
            key_pem: engine_identity.key_pem.clone(),
        })));
        let verifier_client = Arc::new(HttpGuardVerifierClient::new(
            Some(engine_identity.pem_bundle().as_bytes()),
            &roots,
        )?);

        let sessions = Arc::new(SessionRegistry::new());
        let probes = Arc::new(ProbeFlags::new());

        let guard_verifier = Arc::new(GuardSessionVerifier::new(
            Arc::clone(&registry),
            Arc::clone(&sessions),
            probes,
            Arc::clone(&trust_store),
            prober,
            verifier_client,
        ));
        guard_verifier.set_config(Arc::clone(&config));

        let idp_verifier = Arc::new(IdpAssertionVerifier::new(
            Arc::clone(&registry),
            Arc::clone(&chain_verifier),
        ));

        let dispatcher = Arc::new(ProfileDispatcher::new(
            Arc::clone(&registry),
            LegacyProfile::new(wayf_location.clone(), config.assertion_consumer_url()),
            ModernProfile::new(config.assertion_consumer_url()),
        ));

        Ok(Arc::new(Self {
            config,
            registry,
            sessions,
            chain_verifier,
            trust_store,
            guard_verifier,
            idp_verifier,
            dispatcher,
            jobs: Arc::new(JobRegistry::new()),
            ca,
            wayf_location,
        }))
    }

    /// Reload hook for the external metadata-refresh job: replaces the
    /// trusted certificate set and re-syncs the trust store from whatever
    /// is currently registered.
    pub fn reload_trust(&self) -> anyhow::Result<usize> {
        let trusted = self.chain_verifier.load_trusted_certificates(&self.registry);
        self.trust_store
            .sync_authority_certificates(&self.registry)?;
        Ok(trusted)
    }
}
