//! Guard verifier endpoint client.

use async_trait::async_trait;
use tracing::debug;

use crate::error::VerifyError;

/// Response body a guard must return for a session it recognises.
///
/// An exact match on this sentinel is the entire success criterion; any
/// other body, and any transport failure, is a verification failure.
pub const SESSION_VERIFIER_VERIFIED: &str = "VERIFIED";

/// Query parameter carrying the session identifier.
pub const SESSION_ID_PARAM: &str = "sessionid";

/// Calls a guard's verifier endpoint.
#[async_trait]
pub trait GuardVerifierClient: Send + Sync {
    /// `GET {verifier_url}?sessionid={session_id}`, returning the response
    /// body.
    async fn verify_session(
        &self,
        verifier_url: &str,
        session_id: &str,
    ) -> Result<String, VerifyError>;
}

/// HTTP implementation presenting the engine's identity over TLS.
pub struct HttpGuardVerifierClient {
    client: reqwest::Client,
}

impl HttpGuardVerifierClient {
    /// Builds the client.
    ///
    /// `identity_pem` is the engine's certificate chain and key as one PEM
    /// bundle; `roots_pem` are the trust-store certificates accepted as
    /// server roots.
    pub fn new(identity_pem: Option<&[u8]>, roots_pem: &[String]) -> Result<Self, VerifyError> {
        let mut builder = reqwest::Client::builder().use_rustls_tls();
        if let Some(pem) = identity_pem {
            let identity = reqwest::Identity::from_pem(pem)
                .map_err(|e| VerifyError::Connection(e.to_string()))?;
            builder = builder.identity(identity);
        }
        for root in roots_pem {
            let cert = reqwest::Certificate::from_pem(root.as_bytes())
                .map_err(|e| VerifyError::Connection(e.to_string()))?;
            builder = builder.add_root_certificate(cert);
        }
        let client = builder
            .build()
            .map_err(|e| VerifyError::Connection(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl GuardVerifierClient for HttpGuardVerifierClient {
    async fn verify_session(
        &self,
        verifier_url: &str,
        session_id: &str,
    ) -> Result<String, VerifyError> {
        let separator = if verifier_url.contains('?') { '&' } else { '?' };
        let url = format!(
            "{verifier_url}{separator}{SESSION_ID_PARAM}={}",
            urlencoding_encode(session_id)
        );
        debug!(%url, "calling guard verifier endpoint");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| VerifyError::Connection(e.to_string()))?;
        response
            .text()
            .await
            .map_err(|e| VerifyError::Connection(e.to_string()))
    }
}

fn urlencoding_encode(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}
