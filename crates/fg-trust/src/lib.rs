//! Certificate trust for the fedgate engine.
//!
//! Two concerns live here:
//!
//! - **Chain evaluation**: [`CertificateStore`] holds the signing
//!   certificates declared in IdP metadata and [`ChainVerifier`] decides
//!   whether a presented certificate chain resolves to it.
//! - **Containers**: [`Container`] is the password-protected
//!   certificate-and-key file format used for per-guard identity keystores
//!   and for the engine trust store; [`TrustStore`] wraps a container file
//!   with serialised read-modify-write persistence.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod chain;
pub mod container;
pub mod error;
pub mod store;
pub mod truststore;

pub use chain::ChainVerifier;
pub use container::{Container, ContainerEntry, Identity};
pub use error::TrustError;
pub use store::{CertificateStore, StoredCertificate};
pub use truststore::TrustStore;
