//! Submission proxy between customers and a datacenter.

use std::cell::RefCell;
use std::rc::Rc;

use crate::cloudlet::{Cloudlet, CloudletState};
use crate::datacenter::Datacenter;
use crate::event::{Event, EventPayload, EventType};
use crate::log_info;
use crate::simulator::{SimulationContext, Simulator};
use crate::vm::{Vm, VmState};

/// A thin proxy hiding VM and cloudlet submission details from scenario code.
pub struct Broker {
    ctx: SimulationContext,
    datacenter: Rc<RefCell<Datacenter>>,
}

impl Broker {
    pub fn new(simulator: &Simulator, datacenter: &Rc<RefCell<Datacenter>>) -> Self {
        Self {
            ctx: simulator.context("broker"),
            datacenter: datacenter.clone(),
        }
    }

    /// Marks the VMs submitted and asks the datacenter to bind the whole
    /// batch at the current time.
    pub fn submit_vm_list(&self, vms: &[Rc<RefCell<Vm>>]) {
        for vm in vms {
            vm.borrow_mut().set_state(VmState::Submitted);
        }
        log_info!(self.ctx, "submitted {} vm(s)", vms.len());
        self.ctx.submit(
            Event::new(
                EventType::VmBind,
                EventPayload::VmBatch(vms.to_vec()),
                self.ctx.time(),
            )
            .with_target(self.datacenter.clone()),
        );
    }

    /// Marks the cloudlets submitted and queues them at the datacenter at
    /// the current time.
    pub fn submit_cloudlet_list(&self, cloudlets: &[Rc<RefCell<Cloudlet>>]) {
        for cloudlet in cloudlets {
            cloudlet.borrow_mut().set_state(CloudletState::Submitted);
        }
        log_info!(self.ctx, "submitted {} cloudlet(s)", cloudlets.len());
        self.ctx.submit(
            Event::new(
                EventType::CloudletSubmit,
                EventPayload::CloudletBatch(cloudlets.to_vec()),
                self.ctx.time(),
            )
            .with_target(self.datacenter.clone()),
        );
    }
}
