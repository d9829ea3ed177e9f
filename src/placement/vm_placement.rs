//! Max-fit placement of a VM batch onto hosts.

use std::cell::RefCell;
use std::rc::Rc;

use crate::host::Host;
use crate::placement::host_suitability::HostSuitability;
use crate::util::heap::MinHeap;
use crate::vm_running::VmRunning;

/// Places a batch of VMs onto hosts with the max-fit heuristic: each VM goes
/// to the suitable host with the most available PEs, ties broken by smaller
/// host id.
///
/// Placement is a try/rollback transaction over live hosts: binding mutates
/// them immediately, and the first VM with no suitable host aborts the batch
/// and releases every binding performed so far.
pub struct VmPlacementMaxFit;

impl VmPlacementMaxFit {
    pub fn new() -> Self {
        Self {}
    }

    /// Attempts to place every VM of the batch, in input order.
    ///
    /// Returns `(true, placed)` with every VM bound to its host, or
    /// `(false, [])` with all hosts left exactly as they were.
    pub fn try_to_place(
        &self,
        hosts: &[Rc<RefCell<Host>>],
        vms: &[Rc<RefCell<VmRunning>>],
    ) -> (bool, Vec<Rc<RefCell<VmRunning>>>) {
        if hosts.is_empty() {
            return (false, Vec::new());
        }
        let mut heap = MinHeap::new(|a: &HostSuitability, b: &HostSuitability| a.precedes(b));
        for host in hosts {
            heap.push(HostSuitability::new(host.clone()));
        }

        let mut placed = Vec::new();
        let mut succeeded = true;
        for vm in vms {
            {
                let target = vm.borrow();
                for suitability in heap.iter_mut() {
                    suitability.update_suitability(&target);
                }
            }
            heap.reheapify();
            let head = match heap.pop() {
                Some(head) => head,
                None => {
                    succeeded = false;
                    break;
                }
            };
            if !head.suitable() {
                succeeded = false;
                break;
            }
            if let Err(error) = head.host().borrow_mut().bind_vm(vm) {
                // exhaustion slipping past the suitability check aborts the batch
                log::debug!(target: "placement", "vm bind refused: {}", error);
                succeeded = false;
                break;
            }
            placed.push(vm.clone());
            heap.push(head);
        }

        if !succeeded {
            for vm in placed.drain(..) {
                Self::rollback(hosts, &vm);
            }
            return (false, Vec::new());
        }
        (true, placed)
    }

    fn rollback(hosts: &[Rc<RefCell<Host>>], vm: &Rc<RefCell<VmRunning>>) {
        let host_id = vm.borrow().host_id();
        let host = host_id.and_then(|id| hosts.iter().find(|host| host.borrow().id() == id));
        if let Some(host) = host {
            if let Err(error) = host.borrow_mut().release_vm(vm) {
                log::error!(target: "placement", "vm placement rollback failed: {}", error);
            }
        }
    }
}

impl Default for VmPlacementMaxFit {
    fn default() -> Self {
        Self::new()
    }
}
