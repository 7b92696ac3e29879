//! Process-wide session and probe-flag stores.

use dashmap::DashMap;
use fg_metadata::EntityRecord;
use std::sync::Arc;
use tracing::debug;

use crate::binding::{EngineSessionId, SessionBinding};

/// One bound session: the identifier pair plus the guard's record.
#[derive(Debug, Clone)]
pub struct BoundSession {
    /// The identifier binding.
    pub binding: SessionBinding,
    /// The guard the session belongs to.
    pub record: Arc<EntityRecord>,
}

/// Keyed store of bound sessions.
///
/// Bindings are created on successful guard verification, consumed by the
/// attribute pipeline and otherwise never expire; their lifetime is the
/// process lifetime. Lookup works from either identifier.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    by_engine_id: DashMap<String, BoundSession>,
    by_guard_id: DashMap<String, EngineSessionId>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a binding, replacing any previous binding for the same session.
    pub fn bind(&self, binding: SessionBinding, record: Arc<EntityRecord>) {
        debug!(
            guard_session = %binding.guard_session_id,
            engine_session = %binding.engine_session_id,
            entity_id = %binding.entity_id,
            "session bound"
        );
        self.by_guard_id.insert(
            binding.guard_session_id.clone(),
            binding.engine_session_id.clone(),
        );
        self.by_engine_id.insert(
            binding.engine_session_id.as_str().to_string(),
            BoundSession { binding, record },
        );
    }

    /// Resolves a session by its engine-scoped identifier.
    #[must_use]
    pub fn resolve_engine(&self, engine_session_id: &EngineSessionId) -> Option<BoundSession> {
        self.by_engine_id
            .get(engine_session_id.as_str())
            .map(|e| e.clone())
    }

    /// Resolves a session by the identifier the guard issued.
    #[must_use]
    pub fn resolve_guard(&self, guard_session_id: &str) -> Option<BoundSession> {
        let engine_id = self.by_guard_id.get(guard_session_id)?.clone();
        self.resolve_engine(&engine_id)
    }

    /// Removes a binding once the flow is complete.
    pub fn unbind(&self, engine_session_id: &EngineSessionId) {
        if let Some((_, session)) = self.by_engine_id.remove(engine_session_id.as_str()) {
            self.by_guard_id.remove(&session.binding.guard_session_id);
        }
    }

    /// Number of live bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_engine_id.len()
    }

    /// Whether there are no live bindings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_engine_id.is_empty()
    }
}

/// Result of a secure-comms probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The guard advertises HTTPS and its certificate was captured.
    Secure,
    /// The guard advertises no HTTPS endpoint; nothing to capture.
    NotSecure,
}

/// Per-entity "already probed this process run" flags.
///
/// Set on first probe, never invalidated for the rest of the process
/// lifetime.
#[derive(Debug, Default)]
pub struct ProbeFlags {
    flags: DashMap<String, ProbeOutcome>,
}

impl ProbeFlags {
    /// Creates an empty flag map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the entity has been probed this process run.
    #[must_use]
    pub fn is_probed(&self, entity_id: &str) -> bool {
        self.flags.contains_key(entity_id)
    }

    /// Records the probe outcome for an entity.
    pub fn mark(&self, entity_id: &str, outcome: ProbeOutcome) {
        self.flags.insert(entity_id.to_string(), outcome);
    }

    /// The recorded outcome, if any.
    #[must_use]
    pub fn outcome(&self, entity_id: &str) -> Option<ProbeOutcome> {
        self.flags.get(entity_id).map(|o| *o)
    }
}
