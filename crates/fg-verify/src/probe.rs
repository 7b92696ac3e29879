//! Secure-comms probing.
//!
//! On first contact with an HTTPS guard the engine opens a TLS connection
//! to the guard's verifier endpoint, presents its own client certificate
//! and captures whatever server certificate the guard offers. The capture
//! connection deliberately accepts any server certificate: the point of the
//! probe is to learn the certificate so later mutually-authenticated calls
//! can pin it through the trust store.

use async_trait::async_trait;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, SignatureScheme};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::info;

use crate::error::VerifyError;

/// Captures a counterpart's TLS server certificate.
#[async_trait]
pub trait SecureChannelProber: Send + Sync {
    /// Connects to `url` and returns the server's leaf certificate, DER
    /// encoded.
    async fn capture_server_certificate(&self, url: &str) -> Result<Vec<u8>, VerifyError>;
}

/// The engine identity a probe presents.
pub struct ProbeIdentity {
    /// Certificate chain PEM, leaf first.
    pub chain_pem: String,
    /// PKCS#8 private key PEM.
    pub key_pem: String,
}

/// TLS implementation of the prober.
pub struct TlsProber {
    identity: Option<ProbeIdentity>,
}

impl TlsProber {
    /// Creates a prober presenting the given identity, or none.
    #[must_use]
    pub fn new(identity: Option<ProbeIdentity>) -> Self {
        Self { identity }
    }

    fn client_config(&self) -> Result<rustls::ClientConfig, VerifyError> {
        let builder = rustls::ClientConfig::builder_with_provider(Arc::new(
            rustls::crypto::aws_lc_rs::default_provider(),
        ))
        .with_safe_default_protocol_versions()
        .map_err(|e| VerifyError::Probe(e.to_string()))?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(CaptureAnyServerCert));

        match &self.identity {
            Some(identity) => {
                let certs: Vec<CertificateDer<'static>> =
                    rustls_pemfile::certs(&mut identity.chain_pem.as_bytes())
                        .collect::<Result<_, _>>()
                        .map_err(|e| VerifyError::Probe(e.to_string()))?;
                let key: PrivateKeyDer<'static> =
                    rustls_pemfile::private_key(&mut identity.key_pem.as_bytes())
                        .map_err(|e| VerifyError::Probe(e.to_string()))?
                        .ok_or_else(|| VerifyError::Probe("no private key in identity".into()))?;
                builder
                    .with_client_auth_cert(certs, key)
                    .map_err(|e| VerifyError::Probe(e.to_string()))
            }
            None => Ok(builder.with_no_client_auth()),
        }
    }
}

#[async_trait]
impl SecureChannelProber for TlsProber {
    async fn capture_server_certificate(&self, url: &str) -> Result<Vec<u8>, VerifyError> {
        let parsed = url::Url::parse(url).map_err(|e| VerifyError::Probe(e.to_string()))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| VerifyError::Probe(format!("no host in {url}")))?
            .to_string();
        let port = parsed.port_or_known_default().unwrap_or(443);

        let config = self.client_config()?;
        let connector = TlsConnector::from(Arc::new(config));

        let stream = TcpStream::connect((host.as_str(), port))
            .await
            .map_err(|e| VerifyError::Probe(e.to_string()))?;
        let server_name = ServerName::try_from(host.clone())
            .map_err(|e| VerifyError::Probe(e.to_string()))?;
        let tls = connector
            .connect(server_name, stream)
            .await
            .map_err(|e| VerifyError::Probe(e.to_string()))?;

        let (_, connection) = tls.get_ref();
        let certificate = connection
            .peer_certificates()
            .and_then(|certs| certs.first())
            .ok_or_else(|| VerifyError::Probe(format!("{host} presented no certificate")))?;

        info!(%host, port, "captured server certificate");
        Ok(certificate.as_ref().to_vec())
    }
}

/// Accepts whatever the server presents so the handshake completes and the
/// certificate can be read off the connection.
#[derive(Debug)]
struct CaptureAnyServerCert;

impl ServerCertVerifier for CaptureAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        rustls::crypto::aws_lc_rs::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn invalid_urls_fail_as_probe_errors() {
        let prober = TlsProber::new(None);
        let result = prober.capture_server_certificate("not a url").await;
        assert!(matches!(result, Err(VerifyError::Probe(_))));
    }

    #[tokio::test]
    async fn unreachable_hosts_fail_as_probe_errors() {
        let prober = TlsProber::new(None);
        // Port 1 on loopback refuses immediately.
        let result = prober
            .capture_server_certificate("https://127.0.0.1:1/verify")
            .await;
        assert!(matches!(result, Err(VerifyError::Probe(_))));
    }
}
