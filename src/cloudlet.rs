//! Cloudlet descriptor and its lifecycle state.

use std::fmt::{Display, Formatter};

use serde::Serialize;

use crate::entity::{fresh_entity_id, EntityId};
use crate::error::SimulationError;

/// Lifecycle state of a cloudlet.
///
/// Transitions are monotone along Created → Submitted → Running → Succeeded;
/// Failed is entered when the hosting VM shuts down under the cloudlet, and
/// Canceled when a submitted cloudlet never gets scheduled before termination.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum CloudletState {
    Created,
    Submitted,
    Running,
    Succeeded,
    Failed,
    Canceled,
}

impl Display for CloudletState {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            CloudletState::Created => write!(f, "created"),
            CloudletState::Submitted => write!(f, "submitted"),
            CloudletState::Running => write!(f, "running"),
            CloudletState::Succeeded => write!(f, "succeeded"),
            CloudletState::Failed => write!(f, "failed"),
            CloudletState::Canceled => write!(f, "canceled"),
        }
    }
}

/// A unit of computational work to be executed on a VM, sized in million
/// instructions (MI). Once bound, a cloudlet runs to completion or fails with
/// its VM; there is no preemptive time-slicing.
#[derive(Debug)]
pub struct Cloudlet {
    id: EntityId,
    length: f64,
    num_pes: u32,
    utilization_pe: f64,
    required_ram: f64,
    required_storage: f64,
    required_bandwidth: f64,
    state: CloudletState,
}

impl Cloudlet {
    pub fn new(
        length: f64,
        num_pes: u32,
        utilization_pe: f64,
        required_ram: f64,
        required_storage: f64,
        required_bandwidth: f64,
    ) -> Result<Self, SimulationError> {
        if length <= 0.0 {
            return Err(SimulationError::InvalidInput(format!(
                "cloudlet length must be positive, got {}",
                length
            )));
        }
        if num_pes == 0 {
            return Err(SimulationError::InvalidInput(
                "cloudlet must request at least one PE".to_string(),
            ));
        }
        if utilization_pe <= 0.0 || utilization_pe > 1.0 {
            return Err(SimulationError::InvalidInput(format!(
                "cloudlet PE utilization must lie in (0, 1], got {}",
                utilization_pe
            )));
        }
        if required_ram < 0.0 || required_storage < 0.0 || required_bandwidth < 0.0 {
            return Err(SimulationError::InvalidInput(format!(
                "cloudlet resource requirements must be non-negative, got ram {}, storage {}, bandwidth {}",
                required_ram, required_storage, required_bandwidth
            )));
        }
        Ok(Self {
            id: fresh_entity_id(),
            length,
            num_pes,
            utilization_pe,
            required_ram,
            required_storage,
            required_bandwidth,
            state: CloudletState::Created,
        })
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Length in million instructions.
    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn num_pes(&self) -> u32 {
        self.num_pes
    }

    /// Share of each granted PE this cloudlet occupies while running.
    pub fn utilization_pe(&self) -> f64 {
        self.utilization_pe
    }

    pub fn required_ram(&self) -> f64 {
        self.required_ram
    }

    pub fn required_storage(&self) -> f64 {
        self.required_storage
    }

    pub fn required_bandwidth(&self) -> f64 {
        self.required_bandwidth
    }

    pub fn state(&self) -> CloudletState {
        self.state
    }

    pub fn set_state(&mut self, state: CloudletState) {
        self.state = state;
    }
}
