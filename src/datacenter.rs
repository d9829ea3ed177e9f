//! Datacenter: stateful handler of VM and cloudlet lifecycle events.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use sugars::{rc, refcell};

use crate::cloudlet::{Cloudlet, CloudletState};
use crate::cloudlet_running::CloudletRunning;
use crate::entity::{fresh_entity_id, EntityId};
use crate::error::SimulationError;
use crate::event::{Event, EventHandler, EventPayload, EventType};
use crate::host::Host;
use crate::placement::cloudlet_placement::CloudletPlacementMaxFit;
use crate::placement::vm_placement::VmPlacementMaxFit;
use crate::simulator::SimulationContext;
use crate::vm::{Vm, VmState};
use crate::vm_running::VmRunning;
use crate::{log_info, log_warn};

// kept at two decimals for parity with the reference behavior
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// The resource-management core of the simulation.
///
/// Owns all hosts, the VM maps partitioned by lifecycle phase, the FIFO
/// queue of waiting cloudlets and the placement policies. The datacenter is
/// the sole mutator of host/VM/cloudlet state once the simulation runs;
/// every lifecycle transition enters through [`process`](EventHandler::process).
pub struct Datacenter {
    id: EntityId,
    hosts: IndexMap<EntityId, Rc<RefCell<Host>>>,
    vm_placement_policy: VmPlacementMaxFit,
    vm_booting: IndexMap<EntityId, Rc<RefCell<VmRunning>>>,
    vm_running: IndexMap<EntityId, Rc<RefCell<VmRunning>>>,
    vm_end_of_life: IndexMap<EntityId, Rc<RefCell<Vm>>>,
    cloudlet_placement_policy: CloudletPlacementMaxFit,
    cloudlet_waiting: VecDeque<Rc<RefCell<Cloudlet>>>,
    cloudlet_running: IndexMap<EntityId, Rc<RefCell<CloudletRunning>>>,
    cloudlet_end_of_life: IndexMap<EntityId, Rc<RefCell<Cloudlet>>>,
    ctx: Option<SimulationContext>,
    self_ref: Weak<RefCell<Datacenter>>,
}

impl Datacenter {
    /// Builds a datacenter over the given hosts.
    pub fn new(hosts: Vec<Host>) -> Rc<RefCell<Self>> {
        let id = fresh_entity_id();
        let mut host_map = IndexMap::new();
        for mut host in hosts {
            host.set_datacenter(id);
            host_map.insert(host.id(), rc!(refcell!(host)));
        }
        let datacenter = rc!(refcell!(Self {
            id,
            hosts: host_map,
            vm_placement_policy: VmPlacementMaxFit::new(),
            vm_booting: IndexMap::new(),
            vm_running: IndexMap::new(),
            vm_end_of_life: IndexMap::new(),
            cloudlet_placement_policy: CloudletPlacementMaxFit::new(),
            cloudlet_waiting: VecDeque::new(),
            cloudlet_running: IndexMap::new(),
            cloudlet_end_of_life: IndexMap::new(),
            ctx: None,
            self_ref: Weak::new(),
        }));
        datacenter.borrow_mut().self_ref = Rc::downgrade(&datacenter);
        datacenter
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub(crate) fn set_context(&mut self, ctx: SimulationContext) {
        self.ctx = Some(ctx);
    }

    /// Hosts by id, in insertion order.
    pub fn host_running_dict(&self) -> &IndexMap<EntityId, Rc<RefCell<Host>>> {
        &self.hosts
    }

    /// VMs bound to a host but still starting up.
    pub fn vm_booting_dict(&self) -> &IndexMap<EntityId, Rc<RefCell<VmRunning>>> {
        &self.vm_booting
    }

    /// VMs up and able to accept cloudlets.
    pub fn vm_running_dict(&self) -> &IndexMap<EntityId, Rc<RefCell<VmRunning>>> {
        &self.vm_running
    }

    /// Descriptors of VMs that reached a terminal state.
    pub fn vm_end_of_life_dict(&self) -> &IndexMap<EntityId, Rc<RefCell<Vm>>> {
        &self.vm_end_of_life
    }

    /// Submitted cloudlets not yet placed on any VM, in submission order.
    pub fn cloudlet_waiting_deque(&self) -> &VecDeque<Rc<RefCell<Cloudlet>>> {
        &self.cloudlet_waiting
    }

    pub fn cloudlet_running_dict(&self) -> &IndexMap<EntityId, Rc<RefCell<CloudletRunning>>> {
        &self.cloudlet_running
    }

    /// Descriptors of cloudlets that reached a terminal state.
    pub fn cloudlet_end_of_life_dict(&self) -> &IndexMap<EntityId, Rc<RefCell<Cloudlet>>> {
        &self.cloudlet_end_of_life
    }

    fn ctx(&self) -> Result<SimulationContext, SimulationError> {
        self.ctx.clone().ok_or_else(|| {
            SimulationError::InvalidState("datacenter is not attached to a simulator".to_string())
        })
    }

    fn handler(&self) -> Rc<RefCell<dyn EventHandler>> {
        self.self_ref
            .upgrade()
            .expect("datacenter is always constructed behind Rc")
    }

    /// Binds the submitted VM batch to hosts, all or nothing.
    fn on_vm_bind(&mut self, vms: Vec<Rc<RefCell<Vm>>>) -> Result<(), SimulationError> {
        let ctx = self.ctx()?;
        log_info!(ctx, "trying to bind {} vm(s) to hosts", vms.len());
        let wrappers: Vec<Rc<RefCell<VmRunning>>> = vms
            .iter()
            .map(|vm| rc!(refcell!(VmRunning::new(vm.clone()))))
            .collect();
        let hosts: Vec<Rc<RefCell<Host>>> = self.hosts.values().cloned().collect();
        let (succeeded, placed) = self.vm_placement_policy.try_to_place(&hosts, &wrappers);
        if !succeeded {
            for vm in &vms {
                vm.borrow_mut().set_state(VmState::Canceled);
            }
            log_warn!(
                ctx,
                "failed to bind vms: no host set can accommodate the whole batch"
            );
            return Ok(());
        }
        for vm_running in placed {
            let (vm_id, host_id, startup_delay) = {
                let vm = vm_running.borrow();
                (vm.id(), vm.host_id(), vm.startup_delay())
            };
            vm_running.borrow().set_state(VmState::Bounded);
            self.vm_booting.insert(vm_id, vm_running.clone());
            ctx.submit(
                Event::new(
                    EventType::VmBootup,
                    EventPayload::Vm(vm_running),
                    ctx.time() + startup_delay,
                )
                .with_target(self.handler()),
            );
            if let Some(host_id) = host_id {
                log_info!(ctx, "bind vm {} to host {}", vm_id, host_id);
            }
        }
        Ok(())
    }

    /// Moves a bound VM into the running pool and drains the waiting queue.
    fn on_vm_bootup(&mut self, vm_running: Rc<RefCell<VmRunning>>) -> Result<(), SimulationError> {
        let ctx = self.ctx()?;
        let vm_id = vm_running.borrow().id();
        if self.vm_booting.shift_remove(&vm_id).is_none() {
            return Err(SimulationError::InvalidState(format!(
                "vm {} is not booting",
                vm_id
            )));
        }
        vm_running.borrow().set_state(VmState::Running);
        self.vm_running.insert(vm_id, vm_running);
        log_info!(ctx, "vm {} booted up", vm_id);
        ctx.submit(
            Event::new(EventType::CloudletBind, EventPayload::None, ctx.time())
                .with_target(self.handler()),
        );
        Ok(())
    }

    /// Queues the submitted cloudlets and triggers a binding round.
    fn on_cloudlet_submit(
        &mut self,
        cloudlets: Vec<Rc<RefCell<Cloudlet>>>,
    ) -> Result<(), SimulationError> {
        let ctx = self.ctx()?;
        for cloudlet in cloudlets {
            log_info!(ctx, "cloudlet {} submitted", cloudlet.borrow().id());
            self.cloudlet_waiting.push_back(cloudlet);
        }
        ctx.submit(
            Event::new(EventType::CloudletBind, EventPayload::None, ctx.time())
                .with_target(self.handler()),
        );
        Ok(())
    }

    /// Binds waiting cloudlets in FIFO order until the queue is empty or the
    /// head does not fit on any running VM.
    fn on_cloudlet_bind(&mut self) -> Result<(), SimulationError> {
        let ctx = self.ctx()?;
        while let Some(cloudlet) = self.cloudlet_waiting.pop_front() {
            let vms: Vec<Rc<RefCell<VmRunning>>> = self
                .vm_running
                .values()
                .filter(|vm| {
                    let vm = vm.borrow();
                    !vm.is_scheduled_to_shutdown() && vm.state() == VmState::Running
                })
                .cloned()
                .collect();
            let wrappers = vec![rc!(refcell!(CloudletRunning::new(cloudlet.clone())))];
            let (succeeded, placed) = self.cloudlet_placement_policy.try_to_place(&vms, &wrappers);
            if !succeeded {
                log_warn!(
                    ctx,
                    "no suitable vm for cloudlet {}, scheduling delayed until resources are released",
                    cloudlet.borrow().id()
                );
                self.cloudlet_waiting.push_front(cloudlet);
                break;
            }
            for cloudlet_running in placed {
                cloudlet_running.borrow().set_state(CloudletState::Running);
                cloudlet_running.borrow_mut().set_start_time(ctx.time());
                let (cloudlet_id, vm_id, length, utilization) = {
                    let cloudlet = cloudlet_running.borrow();
                    (
                        cloudlet.id(),
                        cloudlet.vm_id(),
                        cloudlet.length(),
                        cloudlet.utilization_pe(),
                    )
                };
                let vm_id = vm_id.ok_or_else(|| {
                    SimulationError::InvalidState(format!(
                        "cloudlet {} was placed but has no vm",
                        cloudlet_id
                    ))
                })?;
                let mips = self
                    .vm_running
                    .get(&vm_id)
                    .ok_or_else(|| {
                        SimulationError::InvalidState(format!("vm {} is not running", vm_id))
                    })?
                    .borrow()
                    .mips();
                let exec_time = round2(length / (mips * utilization));
                self.cloudlet_running.insert(cloudlet_id, cloudlet_running.clone());
                ctx.submit(
                    Event::new(
                        EventType::CloudletFinish,
                        EventPayload::Cloudlet(cloudlet_running),
                        ctx.time() + exec_time,
                    )
                    .with_target(self.handler()),
                );
                log_info!(ctx, "bind cloudlet {} to vm {}", cloudlet_id, vm_id);
            }
        }
        Ok(())
    }

    /// Completes a cloudlet, releases its resources and triggers the next
    /// binding round.
    fn on_cloudlet_finish(
        &mut self,
        cloudlet_running: Rc<RefCell<CloudletRunning>>,
    ) -> Result<(), SimulationError> {
        let ctx = self.ctx()?;
        cloudlet_running.borrow_mut().set_end_time(ctx.time());
        let (cloudlet_id, vm_id) = {
            let cloudlet = cloudlet_running.borrow();
            (cloudlet.id(), cloudlet.vm_id())
        };
        if self.cloudlet_running.shift_remove(&cloudlet_id).is_none() {
            return Err(SimulationError::InvalidState(format!(
                "cloudlet {} is not running",
                cloudlet_id
            )));
        }
        let vm_id = vm_id.ok_or_else(|| {
            SimulationError::InvalidState(format!("cloudlet {} is not bound to any vm", cloudlet_id))
        })?;
        let vm_running = self.vm_running.get(&vm_id).cloned().ok_or_else(|| {
            SimulationError::InvalidState(format!("vm {} is not running", vm_id))
        })?;
        vm_running.borrow_mut().release_cloudlet(&cloudlet_running)?;
        cloudlet_running.borrow().set_state(CloudletState::Succeeded);
        self.cloudlet_end_of_life
            .insert(cloudlet_id, cloudlet_running.borrow().cloudlet().clone());
        log_info!(ctx, "cloudlet {} execution done at vm {}", cloudlet_id, vm_id);
        ctx.submit(
            Event::new(EventType::CloudletBind, EventPayload::None, ctx.time())
                .with_target(self.handler()),
        );
        let shutdown_now = {
            let vm = vm_running.borrow();
            vm.is_scheduled_to_shutdown() && vm.cloudlets().is_empty()
        };
        if shutdown_now {
            ctx.submit(
                Event::new(EventType::VmShutdown, EventPayload::Vm(vm_running), ctx.time())
                    .with_target(self.handler()),
            );
        }
        Ok(())
    }

    /// Starts shutting a VM down, failing every cloudlet still on it.
    fn on_vm_shutdown(&mut self, vm_running: Rc<RefCell<VmRunning>>) -> Result<(), SimulationError> {
        let ctx = self.ctx()?;
        let vm_id = vm_running.borrow().id();
        log_info!(ctx, "vm {} begins shutting down", vm_id);
        vm_running.borrow().set_state(VmState::ShuttingDown);
        let leftovers: Vec<Rc<RefCell<CloudletRunning>>> =
            vm_running.borrow().cloudlets().values().cloned().collect();
        for cloudlet_running in leftovers {
            cloudlet_running.borrow_mut().set_end_time(ctx.time());
            vm_running.borrow_mut().release_cloudlet(&cloudlet_running)?;
            cloudlet_running.borrow().set_state(CloudletState::Failed);
            let cloudlet_id = cloudlet_running.borrow().id();
            self.cloudlet_running.shift_remove(&cloudlet_id);
            self.cloudlet_end_of_life
                .insert(cloudlet_id, cloudlet_running.borrow().cloudlet().clone());
        }
        let shutdown_delay = vm_running.borrow().shutdown_delay();
        ctx.submit(
            Event::new(
                EventType::VmDestroy,
                EventPayload::Vm(vm_running),
                ctx.time() + shutdown_delay,
            )
            .with_target(self.handler()),
        );
        Ok(())
    }

    /// Detaches a VM from its host and archives its descriptor.
    fn on_vm_destroy(&mut self, vm_running: Rc<RefCell<VmRunning>>) -> Result<(), SimulationError> {
        let ctx = self.ctx()?;
        let (vm_id, host_id) = {
            let vm = vm_running.borrow();
            (vm.id(), vm.host_id())
        };
        let host_id = host_id.ok_or_else(|| {
            SimulationError::InvalidState(format!("vm {} is not placed on any host", vm_id))
        })?;
        let host = self.hosts.get(&host_id).cloned().ok_or_else(|| {
            SimulationError::InvalidState(format!(
                "host {} is not part of datacenter {}",
                host_id, self.id
            ))
        })?;
        host.borrow_mut().release_vm(&vm_running)?;
        vm_running.borrow().set_state(VmState::Destroyed);
        if self.vm_running.shift_remove(&vm_id).is_none() {
            return Err(SimulationError::InvalidState(format!(
                "vm {} is not running",
                vm_id
            )));
        }
        self.vm_end_of_life
            .insert(vm_id, vm_running.borrow().vm().clone());
        log_info!(ctx, "vm {} destroyed on host {}", vm_id, host_id);
        Ok(())
    }

    /// Shuts every running VM down and cancels every waiting cloudlet.
    fn on_simulation_terminate(&mut self) -> Result<(), SimulationError> {
        let ctx = self.ctx()?;
        for vm_running in self.vm_running.values() {
            ctx.submit(
                Event::new(
                    EventType::VmShutdown,
                    EventPayload::Vm(vm_running.clone()),
                    ctx.time(),
                )
                .with_target(self.handler()),
            );
        }
        while let Some(cloudlet) = self.cloudlet_waiting.pop_front() {
            cloudlet.borrow_mut().set_state(CloudletState::Canceled);
            let cloudlet_id = cloudlet.borrow().id();
            log_info!(ctx, "cloudlet {} canceled at termination", cloudlet_id);
            self.cloudlet_end_of_life.insert(cloudlet_id, cloudlet);
        }
        Ok(())
    }
}

impl EventHandler for Datacenter {
    fn process(&mut self, event: Event) -> Result<(), SimulationError> {
        let Event {
            event_type, payload, ..
        } = event;
        match (event_type, payload) {
            (EventType::SimulationTerminate, _) => self.on_simulation_terminate(),
            (EventType::VmBind, EventPayload::VmBatch(vms)) => self.on_vm_bind(vms),
            (EventType::VmBootup, EventPayload::Vm(vm)) => self.on_vm_bootup(vm),
            (EventType::VmShutdown, EventPayload::Vm(vm)) => self.on_vm_shutdown(vm),
            (EventType::VmDestroy, EventPayload::Vm(vm)) => self.on_vm_destroy(vm),
            (EventType::CloudletSubmit, EventPayload::CloudletBatch(cloudlets)) => {
                self.on_cloudlet_submit(cloudlets)
            }
            (EventType::CloudletBind, _) => self.on_cloudlet_bind(),
            (EventType::CloudletFinish, EventPayload::Cloudlet(cloudlet)) => {
                self.on_cloudlet_finish(cloudlet)
            }
            // reserved lifecycle hooks
            (EventType::HostAdd, _)
            | (EventType::HostRemove, _)
            | (EventType::HostPowerOn, _)
            | (EventType::HostPowerOff, _)
            | (EventType::VmFail, _)
            | (EventType::CloudletFail, _) => Ok(()),
            (event_type, _) => Err(SimulationError::InvalidInput(format!(
                "event {:?} carries an unexpected payload",
                event_type
            ))),
        }
    }
}
