//! Virtual machine descriptor and its lifecycle state.

use std::fmt::{Display, Formatter};

use serde::Serialize;

use crate::entity::{fresh_entity_id, EntityId};
use crate::error::SimulationError;

/// Lifecycle state of a VM.
///
/// The happy path is Created → Submitted → Bounded → Running → ShuttingDown
/// → Destroyed; Canceled and Failed are reachable from the earlier stages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum VmState {
    Created,
    Submitted,
    Bounded,
    Running,
    ShuttingDown,
    Destroyed,
    Failed,
    Canceled,
}

impl Display for VmState {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            VmState::Created => write!(f, "created"),
            VmState::Submitted => write!(f, "submitted"),
            VmState::Bounded => write!(f, "bounded"),
            VmState::Running => write!(f, "running"),
            VmState::ShuttingDown => write!(f, "shutting_down"),
            VmState::Destroyed => write!(f, "destroyed"),
            VmState::Failed => write!(f, "failed"),
            VmState::Canceled => write!(f, "canceled"),
        }
    }
}

/// Static description of a virtual machine: a reservation of host resources
/// (PEs, RAM, storage, bandwidth) on which cloudlets execute.
///
/// The descriptor is immutable after construction except for the lifecycle
/// state; the live placement bookkeeping lives in
/// [`VmRunning`](crate::vm_running::VmRunning).
#[derive(Debug)]
pub struct Vm {
    id: EntityId,
    host_mips_factor: f64,
    num_pes: u32,
    size_ram: f64,
    size_storage: f64,
    size_bandwidth: f64,
    startup_delay: f64,
    shutdown_delay: f64,
    state: VmState,
}

impl Vm {
    /// Creates a VM descriptor.
    ///
    /// `host_mips_factor` scales the MIPS rating of the host PEs the VM ends
    /// up on; a factor of 1 means no virtualization overhead.
    pub fn new(
        host_mips_factor: f64,
        num_pes: u32,
        size_ram: f64,
        size_storage: f64,
        size_bandwidth: f64,
        startup_delay: f64,
        shutdown_delay: f64,
    ) -> Result<Self, SimulationError> {
        if host_mips_factor <= 0.0 {
            return Err(SimulationError::InvalidInput(format!(
                "VM host MIPS factor must be positive, got {}",
                host_mips_factor
            )));
        }
        if num_pes == 0 {
            return Err(SimulationError::InvalidInput(
                "VM must request at least one PE".to_string(),
            ));
        }
        if size_ram < 0.0 || size_storage < 0.0 || size_bandwidth < 0.0 {
            return Err(SimulationError::InvalidInput(format!(
                "VM resource sizes must be non-negative, got ram {}, storage {}, bandwidth {}",
                size_ram, size_storage, size_bandwidth
            )));
        }
        if startup_delay < 0.0 || shutdown_delay < 0.0 {
            return Err(SimulationError::InvalidInput(format!(
                "VM delays must be non-negative, got startup {}, shutdown {}",
                startup_delay, shutdown_delay
            )));
        }
        Ok(Self {
            id: fresh_entity_id(),
            host_mips_factor,
            num_pes,
            size_ram,
            size_storage,
            size_bandwidth,
            startup_delay,
            shutdown_delay,
            state: VmState::Created,
        })
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn host_mips_factor(&self) -> f64 {
        self.host_mips_factor
    }

    pub fn num_pes(&self) -> u32 {
        self.num_pes
    }

    pub fn size_ram(&self) -> f64 {
        self.size_ram
    }

    pub fn size_storage(&self) -> f64 {
        self.size_storage
    }

    pub fn size_bandwidth(&self) -> f64 {
        self.size_bandwidth
    }

    pub fn startup_delay(&self) -> f64 {
        self.startup_delay
    }

    pub fn shutdown_delay(&self) -> f64 {
        self.shutdown_delay
    }

    pub fn state(&self) -> VmState {
        self.state
    }

    pub fn set_state(&mut self, state: VmState) {
        self.state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::{Vm, VmState};
    use crate::error::SimulationError;

    #[test]
    fn valid_descriptor_starts_created() {
        let vm = Vm::new(1.0, 2, 1024.0, 10240.0, 100.0, 30.0, 10.0).unwrap();
        assert_eq!(vm.state(), VmState::Created);
        assert_eq!(vm.num_pes(), 2);
    }

    #[test]
    fn constructor_constraints_are_enforced() {
        assert!(matches!(
            Vm::new(0.0, 1, 0.0, 0.0, 0.0, 0.0, 0.0),
            Err(SimulationError::InvalidInput(_))
        ));
        assert!(matches!(
            Vm::new(1.0, 0, 0.0, 0.0, 0.0, 0.0, 0.0),
            Err(SimulationError::InvalidInput(_))
        ));
        assert!(matches!(
            Vm::new(1.0, 1, -1.0, 0.0, 0.0, 0.0, 0.0),
            Err(SimulationError::InvalidInput(_))
        ));
        assert!(matches!(
            Vm::new(1.0, 1, 0.0, 0.0, 0.0, -5.0, 0.0),
            Err(SimulationError::InvalidInput(_))
        ));
    }

    #[test]
    fn ids_increase_with_creation_order() {
        let first = Vm::new(1.0, 1, 0.0, 0.0, 0.0, 0.0, 0.0).unwrap();
        let second = Vm::new(1.0, 1, 0.0, 0.0, 0.0, 0.0, 0.0).unwrap();
        assert!(first.id() < second.id());
    }
}
