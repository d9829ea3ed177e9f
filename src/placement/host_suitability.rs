//! Suitability of a host for an incoming VM.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::rc::Rc;

use crate::host::Host;
use crate::vm_running::VmRunning;

/// Heap entry scoring one host against the VM currently being placed.
///
/// The `suitable` flag is recomputed against every target and is only
/// meaningful until the underlying host mutates again.
pub struct HostSuitability {
    host: Rc<RefCell<Host>>,
    suitable: bool,
}

impl HostSuitability {
    pub fn new(host: Rc<RefCell<Host>>) -> Self {
        Self {
            host,
            suitable: false,
        }
    }

    /// Re-scores this host against the given VM.
    pub fn update_suitability(&mut self, target: &VmRunning) {
        let host = self.host.borrow();
        self.suitable = target.num_pes() <= host.num_pes_available()
            && target.size_ram() <= host.ram().available()
            && target.size_storage() <= host.storage().available()
            && target.size_bandwidth() <= host.bandwidth().available();
    }

    pub fn suitable(&self) -> bool {
        self.suitable
    }

    pub fn host(&self) -> &Rc<RefCell<Host>> {
        &self.host
    }

    /// Max-fit heap order: suitable hosts first; among them, more available
    /// PEs first, ties broken by smaller host id.
    pub fn precedes(&self, other: &HostSuitability) -> bool {
        if self.suitable != other.suitable {
            return self.suitable;
        }
        if !self.suitable {
            return false;
        }
        let a = self.host.borrow();
        let b = other.host.borrow();
        match a.num_pes_available().cmp(&b.num_pes_available()) {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => a.id() < b.id(),
        }
    }
}
