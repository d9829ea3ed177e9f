//! Processing element (CPU core).

use serde::Serialize;

use crate::entity::{fresh_entity_id, EntityId};
use crate::error::SimulationError;
use crate::simulator::EPSILON;

/// Occupancy of a processing element.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum PeState {
    Free,
    Busy,
}

/// A processing element (PE) models a single CPU core rated in MIPS
/// (million instructions per second).
///
/// A host PE is flipped to [`PeState::Busy`] when a virtual PE is carved out
/// of it for a VM; a virtual PE is flipped when a cloudlet claims it. The
/// utilization accumulates the shares claimed by cloudlets bound to the core.
#[derive(Debug, Clone)]
pub struct Pe {
    id: EntityId,
    mips_capacity: f64,
    state: PeState,
    utilization: f64,
}

impl Pe {
    pub fn new(mips_capacity: f64) -> Result<Self, SimulationError> {
        if mips_capacity <= 0.0 {
            return Err(SimulationError::InvalidInput(format!(
                "PE MIPS capacity must be positive, got {}",
                mips_capacity
            )));
        }
        Ok(Self {
            id: fresh_entity_id(),
            mips_capacity,
            state: PeState::Free,
            utilization: 0.0,
        })
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn mips_capacity(&self) -> f64 {
        self.mips_capacity
    }

    pub fn state(&self) -> PeState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: PeState) {
        self.state = state;
    }

    /// Utilization share currently claimed by cloudlets.
    pub fn utilization(&self) -> f64 {
        self.utilization
    }

    pub fn utilization_available(&self) -> f64 {
        1.0 - self.utilization
    }

    /// Adds a cloudlet's utilization share; the share must lie in (0, 1].
    pub fn allocate(&mut self, share: f64) -> Result<(), SimulationError> {
        Self::validate_share(share)?;
        self.utilization += share;
        Ok(())
    }

    /// Removes a previously added utilization share.
    pub fn deallocate(&mut self, share: f64) -> Result<(), SimulationError> {
        Self::validate_share(share)?;
        if share > self.utilization + EPSILON {
            return Err(SimulationError::InvalidState(format!(
                "deallocation of share {} exceeds allocated utilization {}",
                share, self.utilization
            )));
        }
        self.utilization -= share;
        Ok(())
    }

    fn validate_share(share: f64) -> Result<(), SimulationError> {
        if share <= 0.0 || share > 1.0 {
            return Err(SimulationError::InvalidInput(format!(
                "PE utilization share must lie in (0, 1], got {}",
                share
            )));
        }
        Ok(())
    }
}
