//! Live state of a virtual machine placed on a host.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::cloudlet_running::CloudletRunning;
use crate::entity::EntityId;
use crate::error::SimulationError;
use crate::resources::counter::Resource;
use crate::resources::pe::{Pe, PeState};
use crate::vm::{Vm, VmState};

/// A virtual PE carved out of a host PE at bind time: the VM-side core plus
/// the busy host core it is paired with.
pub struct VmPe {
    pe: Pe,
    host_pe: Rc<RefCell<Pe>>,
}

impl VmPe {
    pub(crate) fn new(pe: Pe, host_pe: Rc<RefCell<Pe>>) -> Self {
        Self { pe, host_pe }
    }

    pub fn pe(&self) -> &Pe {
        &self.pe
    }

    pub fn host_pe(&self) -> &Rc<RefCell<Pe>> {
        &self.host_pe
    }
}

/// Running wrapper around a [`Vm`] descriptor.
///
/// Created when the descriptor enters placement; tracks the hosting
/// placement, the virtual PEs carved out of host PEs, the resource counters
/// granted by the host and the cloudlets currently bound to this VM.
pub struct VmRunning {
    vm: Rc<RefCell<Vm>>,
    id: EntityId,
    mips: f64,
    num_pes_available: u32,
    vm_pes: IndexMap<EntityId, VmPe>,
    ram: Option<Resource>,
    storage: Option<Resource>,
    bandwidth: Option<Resource>,
    is_scheduled_to_shutdown: bool,
    cloudlet_pes: HashMap<EntityId, Vec<EntityId>>,
    cloudlets: IndexMap<EntityId, Rc<RefCell<CloudletRunning>>>,
    host_id: Option<EntityId>,
}

impl VmRunning {
    pub fn new(vm: Rc<RefCell<Vm>>) -> Self {
        let (id, num_pes) = {
            let vm = vm.borrow();
            (vm.id(), vm.num_pes())
        };
        Self {
            vm,
            id,
            mips: 0.0,
            num_pes_available: num_pes,
            vm_pes: IndexMap::new(),
            ram: None,
            storage: None,
            bandwidth: None,
            is_scheduled_to_shutdown: false,
            cloudlet_pes: HashMap::new(),
            cloudlets: IndexMap::new(),
            host_id: None,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn vm(&self) -> &Rc<RefCell<Vm>> {
        &self.vm
    }

    pub fn state(&self) -> VmState {
        self.vm.borrow().state()
    }

    pub fn set_state(&self, state: VmState) {
        self.vm.borrow_mut().set_state(state);
    }

    pub fn num_pes(&self) -> u32 {
        self.vm.borrow().num_pes()
    }

    pub fn host_mips_factor(&self) -> f64 {
        self.vm.borrow().host_mips_factor()
    }

    pub fn size_ram(&self) -> f64 {
        self.vm.borrow().size_ram()
    }

    pub fn size_storage(&self) -> f64 {
        self.vm.borrow().size_storage()
    }

    pub fn size_bandwidth(&self) -> f64 {
        self.vm.borrow().size_bandwidth()
    }

    pub fn startup_delay(&self) -> f64 {
        self.vm.borrow().startup_delay()
    }

    pub fn shutdown_delay(&self) -> f64 {
        self.vm.borrow().shutdown_delay()
    }

    /// Per-virtual-PE MIPS rate, fixed when the VM is bound to a host as
    /// `host_pe.mips_capacity × host_mips_factor`. All virtual PEs of a
    /// single VM are equal. Zero while the VM is not placed.
    pub fn mips(&self) -> f64 {
        self.mips
    }

    /// Virtual PEs not claimed by any cloudlet.
    pub fn num_pes_available(&self) -> u32 {
        self.num_pes_available
    }

    pub fn vm_pes(&self) -> &IndexMap<EntityId, VmPe> {
        &self.vm_pes
    }

    pub fn ram(&self) -> Option<&Resource> {
        self.ram.as_ref()
    }

    pub fn storage(&self) -> Option<&Resource> {
        self.storage.as_ref()
    }

    pub fn bandwidth(&self) -> Option<&Resource> {
        self.bandwidth.as_ref()
    }

    pub fn host_id(&self) -> Option<EntityId> {
        self.host_id
    }

    pub fn is_scheduled_to_shutdown(&self) -> bool {
        self.is_scheduled_to_shutdown
    }

    /// Marks the VM for shutdown once its last cloudlet finishes.
    pub fn set_scheduled_to_shutdown(&mut self, scheduled: bool) {
        self.is_scheduled_to_shutdown = scheduled;
    }

    /// Cloudlets currently bound to this VM, in binding order.
    pub fn cloudlets(&self) -> &IndexMap<EntityId, Rc<RefCell<CloudletRunning>>> {
        &self.cloudlets
    }

    /// Virtual-PE ids granted to each bound cloudlet.
    pub fn cloudlet_pes(&self) -> &HashMap<EntityId, Vec<EntityId>> {
        &self.cloudlet_pes
    }

    /// Installs the placement produced by `Host::bind_vm`.
    pub(crate) fn attach_to_host(
        &mut self,
        host_id: EntityId,
        vm_pes: Vec<VmPe>,
        ram: Resource,
        storage: Resource,
        bandwidth: Resource,
    ) {
        self.mips = vm_pes.first().map(|vm_pe| vm_pe.pe.mips_capacity()).unwrap_or(0.0);
        for vm_pe in vm_pes {
            self.vm_pes.insert(vm_pe.pe.id(), vm_pe);
        }
        self.ram = Some(ram);
        self.storage = Some(storage);
        self.bandwidth = Some(bandwidth);
        self.host_id = Some(host_id);
    }

    /// Discards the placement; the inverse of `attach_to_host`.
    pub(crate) fn detach_from_host(&mut self) -> Result<(), SimulationError> {
        if self.host_id.is_none() {
            return Err(SimulationError::InvalidState(format!(
                "vm {} is not placed on any host",
                self.id
            )));
        }
        self.vm_pes.clear();
        self.ram = None;
        self.storage = None;
        self.bandwidth = None;
        self.host_id = None;
        self.mips = 0.0;
        Ok(())
    }

    /// Grants virtual PEs and fungible resources to the cloudlet.
    ///
    /// Picks the first free virtual PEs in insertion order, marks each busy
    /// and adds the cloudlet's utilization share to both the virtual PE and
    /// its paired host PE.
    pub fn bind_cloudlet(
        &mut self,
        cloudlet_running: &Rc<RefCell<CloudletRunning>>,
    ) -> Result<(), SimulationError> {
        let (cloudlet_id, num_pes, share, ram, storage, bandwidth) = {
            let cloudlet = cloudlet_running.borrow();
            (
                cloudlet.id(),
                cloudlet.num_pes(),
                cloudlet.utilization_pe(),
                cloudlet.required_ram(),
                cloudlet.required_storage(),
                cloudlet.required_bandwidth(),
            )
        };
        if num_pes > self.num_pes_available {
            return Err(SimulationError::ResourceExhausted {
                requested: num_pes as f64,
                available: self.num_pes_available as f64,
            });
        }
        // check the fungible resources up front so a refusal leaves no partial allocation
        for (counter, required) in [
            (self.ram.as_ref(), ram),
            (self.storage.as_ref(), storage),
            (self.bandwidth.as_ref(), bandwidth),
        ] {
            let counter = counter.ok_or_else(|| {
                SimulationError::InvalidState(format!("vm {} is not placed on any host", self.id))
            })?;
            if required > counter.available() {
                return Err(SimulationError::ResourceExhausted {
                    requested: required,
                    available: counter.available(),
                });
            }
        }
        self.ram.as_mut().map(|counter| counter.allocate(ram)).transpose()?;
        self.storage.as_mut().map(|counter| counter.allocate(storage)).transpose()?;
        self.bandwidth.as_mut().map(|counter| counter.allocate(bandwidth)).transpose()?;

        let mut granted = Vec::with_capacity(num_pes as usize);
        for vm_pe in self.vm_pes.values_mut() {
            if granted.len() == num_pes as usize {
                break;
            }
            if vm_pe.pe.state() == PeState::Free {
                vm_pe.pe.set_state(PeState::Busy);
                vm_pe.pe.allocate(share)?;
                vm_pe.host_pe.borrow_mut().allocate(share)?;
                granted.push(vm_pe.pe.id());
            }
        }
        self.num_pes_available -= num_pes;
        self.cloudlet_pes.insert(cloudlet_id, granted);
        self.cloudlets.insert(cloudlet_id, cloudlet_running.clone());
        cloudlet_running.borrow_mut().set_vm(self.id);
        Ok(())
    }

    /// Releases everything granted to the cloudlet; the inverse of
    /// [`bind_cloudlet`](VmRunning::bind_cloudlet).
    pub fn release_cloudlet(
        &mut self,
        cloudlet_running: &Rc<RefCell<CloudletRunning>>,
    ) -> Result<(), SimulationError> {
        let (cloudlet_id, num_pes, share, ram, storage, bandwidth) = {
            let cloudlet = cloudlet_running.borrow();
            (
                cloudlet.id(),
                cloudlet.num_pes(),
                cloudlet.utilization_pe(),
                cloudlet.required_ram(),
                cloudlet.required_storage(),
                cloudlet.required_bandwidth(),
            )
        };
        let granted = self.cloudlet_pes.remove(&cloudlet_id).ok_or_else(|| {
            SimulationError::InvalidState(format!(
                "cloudlet {} is not bound to vm {}",
                cloudlet_id, self.id
            ))
        })?;
        self.cloudlets.shift_remove(&cloudlet_id);
        cloudlet_running.borrow_mut().clear_vm();

        self.bandwidth.as_mut().map(|counter| counter.deallocate(bandwidth)).transpose()?;
        self.storage.as_mut().map(|counter| counter.deallocate(storage)).transpose()?;
        self.ram.as_mut().map(|counter| counter.deallocate(ram)).transpose()?;
        self.num_pes_available += num_pes;

        for vm_pe_id in granted {
            let vm_pe = self.vm_pes.get_mut(&vm_pe_id).ok_or_else(|| {
                SimulationError::InvalidState(format!(
                    "virtual pe {} is not owned by vm {}",
                    vm_pe_id, self.id
                ))
            })?;
            vm_pe.pe.set_state(PeState::Free);
            vm_pe.pe.deallocate(share)?;
            vm_pe.host_pe.borrow_mut().deallocate(share)?;
        }
        Ok(())
    }
}
