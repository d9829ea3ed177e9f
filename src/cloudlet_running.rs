//! Live state of a cloudlet bound to a VM.

use std::cell::RefCell;
use std::rc::Rc;

use crate::cloudlet::{Cloudlet, CloudletState};
use crate::entity::EntityId;

/// Running wrapper around a [`Cloudlet`] descriptor: adds the VM executing it
/// and the execution window.
///
/// Start and end times are -1 until the corresponding transition happens.
pub struct CloudletRunning {
    cloudlet: Rc<RefCell<Cloudlet>>,
    id: EntityId,
    vm_id: Option<EntityId>,
    start_time: f64,
    end_time: f64,
}

impl CloudletRunning {
    pub fn new(cloudlet: Rc<RefCell<Cloudlet>>) -> Self {
        let id = cloudlet.borrow().id();
        Self {
            cloudlet,
            id,
            vm_id: None,
            start_time: -1.,
            end_time: -1.,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn cloudlet(&self) -> &Rc<RefCell<Cloudlet>> {
        &self.cloudlet
    }

    pub fn length(&self) -> f64 {
        self.cloudlet.borrow().length()
    }

    pub fn num_pes(&self) -> u32 {
        self.cloudlet.borrow().num_pes()
    }

    pub fn utilization_pe(&self) -> f64 {
        self.cloudlet.borrow().utilization_pe()
    }

    pub fn required_ram(&self) -> f64 {
        self.cloudlet.borrow().required_ram()
    }

    pub fn required_storage(&self) -> f64 {
        self.cloudlet.borrow().required_storage()
    }

    pub fn required_bandwidth(&self) -> f64 {
        self.cloudlet.borrow().required_bandwidth()
    }

    pub fn state(&self) -> CloudletState {
        self.cloudlet.borrow().state()
    }

    pub fn set_state(&self, state: CloudletState) {
        self.cloudlet.borrow_mut().set_state(state);
    }

    /// Id of the VM currently executing this cloudlet.
    pub fn vm_id(&self) -> Option<EntityId> {
        self.vm_id
    }

    pub(crate) fn set_vm(&mut self, vm_id: EntityId) {
        self.vm_id = Some(vm_id);
    }

    pub(crate) fn clear_vm(&mut self) {
        self.vm_id = None;
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub(crate) fn set_start_time(&mut self, time: f64) {
        self.start_time = time;
    }

    pub fn end_time(&self) -> f64 {
        self.end_time
    }

    pub(crate) fn set_end_time(&mut self, time: f64) {
        self.end_time = time;
    }
}
