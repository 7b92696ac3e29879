//! Session state for the fedgate engine.
//!
//! A guard opens a session under its own identifier; the engine tracks that
//! session under an engine-scoped counterpart. The [`SessionRegistry`] holds
//! the binding between the two plus the entity record it belongs to, and the
//! [`ProbeFlags`] map remembers which guards have already had their secure
//! channel probed this process run. Both stores live for the process
//! lifetime; nothing in them expires.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod binding;
pub mod registry;

pub use binding::{EngineSessionId, SessionBinding, SessionIdError};
pub use registry::{ProbeFlags, ProbeOutcome, SessionRegistry};
