//! CA errors.

use thiserror::Error;

/// Errors raised while issuing identities or onboarding guards.
#[derive(Debug, Error)]
pub enum CaError {
    /// The requested key algorithm cannot be generated.
    #[error("unsupported key algorithm: {0}")]
    UnsupportedKeyAlgorithm(String),

    /// Keypair generation failed.
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    /// Signing the new certificate failed.
    #[error("certificate signing failed: {0}")]
    Signing(String),

    /// The CA bundle could not be loaded or parsed.
    #[error("invalid CA bundle: {0}")]
    InvalidBundle(String),

    /// Keystore container failure.
    #[error(transparent)]
    Keystore(#[from] fg_trust::TrustError),

    /// A guard with this ID already has a metadata directory.
    #[error("guard already registered: {0}")]
    AlreadyRegistered(String),

    /// Filesystem failure during onboarding.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
