//! Entity identity.

use std::sync::atomic::{AtomicU64, Ordering};

/// Identifier of a simulation entity (host, VM, cloudlet, PE or resource counter).
///
/// Ids are minted at entity creation and are strictly increasing in creation
/// order, so "smaller id" always means "created earlier". All owning maps are
/// keyed by this id and all deterministic tie-breaks reduce to comparing it.
pub type EntityId = u64;

static ENTITY_COUNTER: AtomicU64 = AtomicU64::new(0);

pub(crate) fn fresh_entity_id() -> EntityId {
    ENTITY_COUNTER.fetch_add(1, Ordering::Relaxed)
}
