//! Max-fit placement of cloudlets onto running VMs.

use std::cell::RefCell;
use std::rc::Rc;

use crate::cloudlet_running::CloudletRunning;
use crate::placement::vm_suitability::VmSuitability;
use crate::util::heap::MinHeap;
use crate::vm_running::VmRunning;

/// Places a batch of cloudlets onto running VMs with the max-fit heuristic:
/// each cloudlet goes to the suitable VM with the most available virtual PEs,
/// ties broken by smaller VM id.
///
/// The batch is all-or-nothing per invocation; the datacenter feeds one
/// cloudlet at a time from the head of the waiting queue, which yields the
/// "schedule as many as fit" behavior.
pub struct CloudletPlacementMaxFit;

impl CloudletPlacementMaxFit {
    pub fn new() -> Self {
        Self {}
    }

    /// Attempts to place every cloudlet of the batch, in input order.
    ///
    /// Returns `(true, placed)` with every cloudlet bound to its VM, or
    /// `(false, [])` with all VMs left exactly as they were.
    pub fn try_to_place(
        &self,
        vms: &[Rc<RefCell<VmRunning>>],
        cloudlets: &[Rc<RefCell<CloudletRunning>>],
    ) -> (bool, Vec<Rc<RefCell<CloudletRunning>>>) {
        if vms.is_empty() {
            return (false, Vec::new());
        }
        let mut heap = MinHeap::new(|a: &VmSuitability, b: &VmSuitability| a.precedes(b));
        for vm in vms {
            heap.push(VmSuitability::new(vm.clone()));
        }

        let mut placed = Vec::new();
        let mut succeeded = true;
        for cloudlet in cloudlets {
            {
                let target = cloudlet.borrow();
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
            if let Err(error) = head.vm_running().borrow_mut().bind_cloudlet(cloudlet) {
                log::debug!(target: "placement", "cloudlet bind refused: {}", error);
                succeeded = false;
                break;
            }
            placed.push(cloudlet.clone());
            heap.push(head);
        }

        if !succeeded {
            for cloudlet in placed.drain(..) {
                Self::rollback(vms, &cloudlet);
            }
            return (false, Vec::new());
        }
        (true, placed)
    }

    fn rollback(vms: &[Rc<RefCell<VmRunning>>], cloudlet: &Rc<RefCell<CloudletRunning>>) {
        let vm_id = cloudlet.borrow().vm_id();
        let vm = vm_id.and_then(|id| vms.iter().find(|vm| vm.borrow().id() == id));
        if let Some(vm) = vm {
            if let Err(error) = vm.borrow_mut().release_cloudlet(cloudlet) {
                log::error!(target: "placement", "cloudlet placement rollback failed: {}", error);
            }
        }
    }
}

impl Default for CloudletPlacementMaxFit {
    fn default() -> Self {
        Self::new()
    }
}
