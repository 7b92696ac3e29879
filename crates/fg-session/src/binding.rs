//! Session identifier translation.
//!
//! Guard session identifiers carry the literal `GUARD` marker; the engine
//! tracks the same session under an identifier with that marker replaced by
//! `ENGINE`. The substitution is the entire namespacing mechanism on the
//! wire, so it happens in exactly one place (here) and exactly once per
//! identifier. Holding both fields in the binding record removes any chance
//! of a second substitution later in the flow.

use std::fmt;
use thiserror::Error;

/// Marker carried by guard-issued session identifiers.
pub const GUARD_MARKER: &str = "GUARD";
/// Marker carried by the engine-scoped counterpart.
pub const ENGINE_MARKER: &str = "ENGINE";

/// Errors translating session identifiers.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionIdError {
    /// The guard session identifier does not carry the `GUARD` marker.
    #[error("session id carries no {GUARD_MARKER} marker: {0}")]
    MissingMarker(String),
}

/// An engine-scoped session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EngineSessionId(String);

impl EngineSessionId {
    /// Derives the engine identifier for a guard session identifier.
    ///
    /// Replaces the first `GUARD` marker with `ENGINE` and leaves the rest
    /// of the identifier byte-identical.
    pub fn for_guard_session(guard_session_id: &str) -> Result<Self, SessionIdError> {
        if !guard_session_id.contains(GUARD_MARKER) {
            return Err(SessionIdError::MissingMarker(guard_session_id.to_string()));
        }
        Ok(Self(guard_session_id.replacen(GUARD_MARKER, ENGINE_MARKER, 1)))
    }

    /// Wraps an identifier that is already engine-scoped.
    #[must_use]
    pub fn from_raw(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EngineSessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The binding between a guard session and its engine counterpart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionBinding {
    /// Identifier the guard issued for this session.
    pub guard_session_id: String,
    /// Engine-scoped identifier for the same session.
    pub engine_session_id: EngineSessionId,
    /// Entity ID of the guard the session belongs to.
    pub entity_id: String,
}

impl SessionBinding {
    /// Builds the binding for a guard session.
    pub fn new(guard_session_id: &str, entity_id: &str) -> Result<Self, SessionIdError> {
        Ok(Self {
            guard_session_id: guard_session_id.to_string(),
            engine_session_id: EngineSessionId::for_guard_session(guard_session_id)?,
            entity_id: entity_id.to_string(),
        })
    }
}
