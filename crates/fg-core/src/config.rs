//! Engine configuration.
//!
//! Loaded once at startup and shared read-only. Paths are resolved against
//! the working directory by the host that wires the engine up.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration for the fedgate engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Entity ID the engine itself presents to counterparts.
    pub entity_id: String,
    /// Name qualifier used when addressing subjects at an IdP.
    pub name_qualifier: String,
    /// Keystore holding the engine's own identity and the CA root.
    pub keystore: PathBuf,
    /// Password for the engine keystore.
    pub keystore_password: String,
    /// Alias of the engine certificate inside the keystore.
    pub certificate_alias: String,
    /// Key algorithm used when issuing guard identities ("rsa").
    pub key_type: String,
    /// Trust store file holding counterpart certificates.
    pub trust_store: PathBuf,
    /// Password for the trust store.
    pub trust_store_password: String,
    /// Directory holding one subdirectory per registered guard.
    pub guards_metadata_dir: PathBuf,
    /// Directory holding IdP metadata documents.
    pub idp_metadata_dir: PathBuf,
    /// HTTP server settings.
    pub server: ServerConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    pub host: String,
    /// Port to bind to.
    pub port: u16,
    /// Externally visible base URL, used to derive the assertion consumer URL.
    pub base_url: String,
}

impl EngineConfig {
    /// The engine's assertion consumer endpoint, derived from the base URL.
    #[must_use]
    pub fn assertion_consumer_url(&self) -> String {
        format!("{}/acs", self.server.base_url.trim_end_matches('/'))
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            entity_id: "fedgate-engine".to_string(),
            name_qualifier: "fedgate".to_string(),
            keystore: PathBuf::from("config/engine.keystore"),
            keystore_password: String::new(),
            certificate_alias: "fedgate-engine".to_string(),
            key_type: "rsa".to_string(),
            trust_store: PathBuf::from("config/engine.truststore"),
            trust_store_password: String::new(),
            guards_metadata_dir: PathBuf::from("metadata/guards"),
            idp_metadata_dir: PathBuf::from("metadata/idp"),
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8084,
                base_url: "http://localhost:8084".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assertion_consumer_url_strips_trailing_slash() {
        let mut config = EngineConfig::default();
        config.server.base_url = "https://engine.example.org/".to_string();
        assert_eq!(
            config.assertion_consumer_url(),
            "https://engine.example.org/acs"
        );
    }
}
