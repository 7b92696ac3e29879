//! Core types for the fedgate engine.
//!
//! This crate carries the two things every other crate needs: the engine
//! error taxonomy and the engine configuration. It has no knowledge of
//! protocols, certificates or sessions.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;

pub use config::{EngineConfig, ServerConfig};
pub use error::{Error, Result};
