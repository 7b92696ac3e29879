//! The fedgate certification authority.
//!
//! Guards do not bring their own key material: when a guard is registered
//! the engine generates a keypair, signs it with the engine's root
//! certificate and packages the result into a per-guard keystore. The
//! engine later presents that identity when it masquerades for the guard on
//! mutually authenticated connections.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod authority;
pub mod error;
pub mod onboarding;
pub mod password;

pub use authority::{CaBundle, CertificateAuthority, IssuedIdentity, KeyAlgorithm, SubjectDn};
pub use error::CaError;
pub use onboarding::{register_guard, GuardRegistration, RegisteredGuard};
pub use password::generate_keystore_password;
