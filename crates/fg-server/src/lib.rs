//! HTTP wiring for the fedgate engine.
//!
//! Thin by design: every decision lives in the component crates, the
//! handlers here only translate between HTTP and the engine types. View
//! rendering is minimal markup; a fronting deployment is expected to
//! replace it.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod handlers;
pub mod router;
pub mod state;

pub use router::engine_router;
pub use state::EngineState;
