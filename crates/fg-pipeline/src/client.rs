//! SOAP transport.

use async_trait::async_trait;
use tracing::debug;

use crate::error::PipelineError;

/// Posts SOAP envelopes to attribute authorities and guards.
#[async_trait]
pub trait SoapClient: Send + Sync {
    /// Posts `envelope` to `url` and returns the response body.
    ///
    /// `present_identity` selects whether the client certificate is offered
    /// during the handshake.
    async fn post_envelope(
        &self,
        url: &str,
        envelope: &str,
        present_identity: bool,
    ) -> Result<String, PipelineError>;
}

/// Mutually authenticated HTTP client carrying a guard identity.
///
/// Holds two underlying clients: one presenting the identity, one not.
/// The anonymous one backs the single documented retry against attribute
/// authorities that request a client certificate only to reject it.
pub struct MutualTlsSoapClient {
    with_identity: reqwest::Client,
    without_identity: reqwest::Client,
}

impl MutualTlsSoapClient {
    /// Builds the client pair from a guard identity and the trust-store
    /// roots.
    pub fn new(
        identity: &fg_trust::Identity,
        roots_pem: &[String],
    ) -> Result<Self, PipelineError> {
        let reqwest_identity = reqwest::Identity::from_pem(identity.pem_bundle().as_bytes())
            .map_err(|e| PipelineError::Identity(e.to_string()))?;

        let with_identity = Self::builder(roots_pem)?
            .identity(reqwest_identity)
            .build()
            .map_err(|e| PipelineError::Identity(e.to_string()))?;
        let without_identity = Self::builder(roots_pem)?
            .build()
            .map_err(|e| PipelineError::Identity(e.to_string()))?;

        Ok(Self {
            with_identity,
            without_identity,
        })
    }

    fn builder(roots_pem: &[String]) -> Result<reqwest::ClientBuilder, PipelineError> {
        let mut builder = reqwest::Client::builder().use_rustls_tls();
        for root in roots_pem {
            let cert = reqwest::Certificate::from_pem(root.as_bytes())
                .map_err(|e| PipelineError::Identity(e.to_string()))?;
            builder = builder.add_root_certificate(cert);
        }
        Ok(builder)
    }
}

#[async_trait]
impl SoapClient for MutualTlsSoapClient {
    async fn post_envelope(
        &self,
        url: &str,
        envelope: &str,
        present_identity: bool,
    ) -> Result<String, PipelineError> {
        let client = if present_identity {
            &self.with_identity
        } else {
            &self.without_identity
        };
        debug!(%url, present_identity, "posting SOAP envelope");

        let response = client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "text/xml")
            .body(envelope.to_string())
            .send()
            .await
            .map_err(|e| PipelineError::Connection(e.to_string()))?;
        response
            .text()
            .await
            .map_err(|e| PipelineError::Connection(e.to_string()))
    }
}
