//! Legacy discovery profile.
//!
//! The browser is sent to the federation's discovery service, which lets
//! the user pick an IdP and forwards the request. The engine session key
//! travels in the `target` parameter and comes back with the assertion.

use fg_session::EngineSessionId;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::SamlResult;
use crate::profile::AuthnDispatch;

/// Builder for legacy discovery redirects.
pub struct LegacyProfile {
    wayf_location: String,
    assertion_consumer_url: String,
}

impl LegacyProfile {
    /// Creates the profile with the discovery service location and the
    /// engine's legacy assertion consumer endpoint.
    #[must_use]
    pub fn new(wayf_location: impl Into<String>, acs_url: impl Into<String>) -> Self {
        Self {
            wayf_location: wayf_location.into(),
            assertion_consumer_url: acs_url.into(),
        }
    }

    /// Builds the discovery redirect for a guard.
    pub fn build(
        &self,
        guard_id: &str,
        engine_session: &EngineSessionId,
    ) -> SamlResult<AuthnDispatch> {
        let time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let url = format!(
            "{}?shire={}&target={}&time={}&providerId={}",
            self.wayf_location,
            urlencoding::encode(&self.assertion_consumer_url),
            urlencoding::encode(engine_session.as_str()),
            time,
            urlencoding::encode(guard_id),
        );
        Ok(AuthnDispatch::Redirect { url })
    }
}
