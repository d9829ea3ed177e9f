//! Suitability of a running VM for an incoming cloudlet.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::rc::Rc;

use crate::cloudlet_running::CloudletRunning;
use crate::vm_running::VmRunning;

/// Heap entry scoring one running VM against the cloudlet currently being
/// scheduled.
pub struct VmSuitability {
    vm_running: Rc<RefCell<VmRunning>>,
    suitable: bool,
}

impl VmSuitability {
    pub fn new(vm_running: Rc<RefCell<VmRunning>>) -> Self {
        Self {
            vm_running,
            suitable: false,
        }
    }

    /// Re-scores this VM against the given cloudlet.
    pub fn update_suitability(&mut self, target: &CloudletRunning) {
        let vm = self.vm_running.borrow();
        self.suitable = match (vm.ram(), vm.storage(), vm.bandwidth()) {
            (Some(ram), Some(storage), Some(bandwidth)) => {
                target.num_pes() <= vm.num_pes_available()
                    && target.required_ram() <= ram.available()
                    && target.required_storage() <= storage.available()
                    && target.required_bandwidth() <= bandwidth.available()
            }
            // not placed on any host, cannot run anything
            _ => false,
        };
    }

    pub fn suitable(&self) -> bool {
        self.suitable
    }

    pub fn vm_running(&self) -> &Rc<RefCell<VmRunning>> {
        &self.vm_running
    }

    /// Max-fit heap order: suitable VMs first; among them, more available
    /// virtual PEs first, ties broken by smaller VM id.
    pub fn precedes(&self, other: &VmSuitability) -> bool {
        if self.suitable != other.suitable {
            return self.suitable;
        }
        if !self.suitable {
            return false;
        }
        let a = self.vm_running.borrow();
        let b = other.vm_running.borrow();
        match a.num_pes_available().cmp(&b.num_pes_available()) {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => a.id() < b.id(),
        }
    }
}
