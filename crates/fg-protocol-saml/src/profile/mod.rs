//! Profile selection and dispatch.
//!
//! Two profile generations coexist. Which one a flow uses is a pure
//! function of the target IdP's advertised capabilities: no IdP entity ID
//! means the legacy discovery profile, an IdP advertising a SAML 2.0 POST
//! or Redirect single-sign-on endpoint gets the modern profile, anything
//! else falls back to legacy.

pub mod legacy;
pub mod modern;

use std::collections::HashMap;
use std::sync::Arc;

use fg_metadata::{IdpEndpoints, MetadataRegistry};
use fg_session::EngineSessionId;
use tracing::info;

use crate::error::{SamlError, SamlResult};
use crate::types::constants::{SAML2_BINDING_HTTP_POST, SAML2_BINDING_HTTP_REDIRECT};

pub use legacy::LegacyProfile;
pub use modern::ModernProfile;

/// Marker key in per-guard maps selecting the fallback entry.
pub const DEFAULT_MARKER: &str = "__DEFAULT__";

/// Delimiter splitting a composite guard ID into internal and external
/// parts.
pub const CLUSTER_DELIMITER: &str = "::";

/// The two protocol generations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// Legacy discovery-service profile.
    Legacy,
    /// SAML 2.0 web-browser SSO profile.
    Modern,
}

/// Chooses the profile for a flow from the target IdP's capabilities.
#[must_use]
pub fn select_profile(idp: Option<&IdpEndpoints>) -> Profile {
    let Some(idp) = idp else {
        return Profile::Legacy;
    };
    let modern = idp.sso_endpoints.iter().any(|sso| {
        sso.binding.eq_ignore_ascii_case(SAML2_BINDING_HTTP_POST)
            || sso.binding.eq_ignore_ascii_case(SAML2_BINDING_HTTP_REDIRECT)
    });
    if modern {
        Profile::Modern
    } else {
        Profile::Legacy
    }
}

/// A constructed outbound authentication request, ready for the browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthnDispatch {
    /// Send the browser to this URL.
    Redirect {
        /// Fully encoded redirect target.
        url: String,
    },
    /// Auto-submit this form to the destination.
    Post(crate::bindings::post::PostForm),
}

/// For a composite guard ID, the externally registered entity ID it
/// resolves to.
///
/// Many internal guards can share one externally visible identity by
/// calling in as `<internal-id>::<external-entity-id>`.
#[must_use]
pub fn cluster_external_id(guard_id: &str) -> Option<&str> {
    guard_id
        .split_once(CLUSTER_DELIMITER)
        .map(|(_, external)| external)
}

/// Builds the outbound authentication request for a guard.
pub struct ProfileDispatcher {
    registry: Arc<MetadataRegistry>,
    legacy: LegacyProfile,
    modern: ModernProfile,
    /// Per-guard registered IdP entity IDs, with an optional
    /// [`DEFAULT_MARKER`] entry.
    entity_ids: HashMap<String, String>,
}

impl ProfileDispatcher {
    /// Creates a dispatcher.
    #[must_use]
    pub fn new(registry: Arc<MetadataRegistry>, legacy: LegacyProfile, modern: ModernProfile) -> Self {
        Self {
            registry,
            legacy,
            modern,
            entity_ids: HashMap::new(),
        }
    }

    /// Sets the per-guard IdP entity ID map.
    #[must_use]
    pub fn with_entity_ids(mut self, entity_ids: HashMap<String, String>) -> Self {
        self.entity_ids = entity_ids;
        self
    }

    /// Constructs the authentication request for `guard_id`.
    ///
    /// `requested_idp` is the IdP entity ID the caller asked for, if any;
    /// otherwise the per-guard map and its default entry are consulted.
    /// The relay state round-tripped through the IdP is the engine session
    /// key.
    pub fn dispatch(
        &self,
        guard_id: &str,
        engine_session: &EngineSessionId,
        requested_idp: Option<&str>,
    ) -> SamlResult<AuthnDispatch> {
        // A clustered guard calls in under a composite ID; everything from
        // here on uses the externally registered identity.
        let effective_guard = match cluster_external_id(guard_id) {
            Some(external) => {
                info!(guard_id, external, "resolved clustered guard identity");
                external
            }
            None => guard_id,
        };
        self.registry
            .lookup(effective_guard)
            .ok_or_else(|| SamlError::UnknownEntity(effective_guard.to_string()))?;

        let idp_entity_id = requested_idp
            .map(str::to_string)
            .or_else(|| self.entity_ids.get(effective_guard).cloned())
            .or_else(|| self.entity_ids.get(DEFAULT_MARKER).cloned());

        let idp_record = match idp_entity_id.as_deref() {
            Some(id) => Some(
                self.registry
                    .lookup(id)
                    .ok_or_else(|| SamlError::UnknownEntity(id.to_string()))?,
            ),
            None => None,
        };
        let idp_endpoints = idp_record.as_deref().and_then(|r| r.as_idp());

        match select_profile(idp_endpoints) {
            Profile::Modern => {
                // select_profile only returns Modern when endpoints exist.
                let idp = idp_endpoints
                    .ok_or_else(|| SamlError::UnknownEntity("idp".to_string()))?;
                self.modern.build(effective_guard, engine_session, idp)
            }
            Profile::Legacy => self.legacy.build(effective_guard, engine_session),
        }
    }
}
