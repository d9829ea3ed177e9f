//! Physical machine: container of PEs and fungible resources.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use indexmap::IndexMap;
use sugars::{rc, refcell};

use crate::entity::{fresh_entity_id, EntityId};
use crate::error::SimulationError;
use crate::resources::counter::Resource;
use crate::resources::pe::{Pe, PeState};
use crate::vm_running::{VmPe, VmRunning};

/// A physical machine in the datacenter.
///
/// A host exclusively owns its PEs and fungible resource counters. Binding a
/// VM carves one virtual PE out of each of the first free host PEs (in
/// insertion order) and allocates the requested RAM, storage and bandwidth;
/// releasing the VM restores everything.
pub struct Host {
    id: EntityId,
    pes: Vec<Rc<RefCell<Pe>>>,
    num_pes_available: u32,
    ram: Resource,
    storage: Resource,
    bandwidth: Resource,
    /// Virtual-PE id → host-PE id for every carved core.
    pe_pairing: HashMap<EntityId, EntityId>,
    /// Virtual-PE ids granted to each hosted VM.
    vm_pes: HashMap<EntityId, Vec<EntityId>>,
    vms: IndexMap<EntityId, Rc<RefCell<VmRunning>>>,
    datacenter_id: Option<EntityId>,
}

impl Host {
    pub fn new(
        pes: Vec<Pe>,
        size_ram: f64,
        size_storage: f64,
        size_bandwidth: f64,
    ) -> Result<Self, SimulationError> {
        if pes.is_empty() {
            return Err(SimulationError::InvalidInput(
                "host must have at least one PE".to_string(),
            ));
        }
        if size_ram <= 0.0 || size_storage <= 0.0 || size_bandwidth <= 0.0 {
            return Err(SimulationError::InvalidInput(format!(
                "host resource capacities must be positive, got ram {}, storage {}, bandwidth {}",
                size_ram, size_storage, size_bandwidth
            )));
        }
        let num_pes = pes.len() as u32;
        Ok(Self {
            id: fresh_entity_id(),
            pes: pes.into_iter().map(|pe| rc!(refcell!(pe))).collect(),
            num_pes_available: num_pes,
            ram: Resource::new(size_ram)?,
            storage: Resource::new(size_storage)?,
            bandwidth: Resource::new(size_bandwidth)?,
            pe_pairing: HashMap::new(),
            vm_pes: HashMap::new(),
            vms: IndexMap::new(),
            datacenter_id: None,
        })
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn num_pes(&self) -> u32 {
        self.pes.len() as u32
    }

    pub fn num_pes_available(&self) -> u32 {
        self.num_pes_available
    }

    /// Host PEs in insertion order.
    pub fn pes(&self) -> &[Rc<RefCell<Pe>>] {
        &self.pes
    }

    pub fn ram(&self) -> &Resource {
        &self.ram
    }

    pub fn storage(&self) -> &Resource {
        &self.storage
    }

    pub fn bandwidth(&self) -> &Resource {
        &self.bandwidth
    }

    /// VMs currently placed on this host.
    pub fn vms(&self) -> &IndexMap<EntityId, Rc<RefCell<VmRunning>>> {
        &self.vms
    }

    /// Virtual-PE id → host-PE id pairing for every carved core.
    pub fn pe_pairing(&self) -> &HashMap<EntityId, EntityId> {
        &self.pe_pairing
    }

    /// Id of the datacenter owning this host.
    pub fn datacenter_id(&self) -> Option<EntityId> {
        self.datacenter_id
    }

    pub(crate) fn set_datacenter(&mut self, datacenter_id: EntityId) {
        self.datacenter_id = Some(datacenter_id);
    }

    /// Carves PEs and fungible resources out of this host for the VM.
    ///
    /// Requires `vm.num_pes` free host PEs and sufficient RAM, storage and
    /// bandwidth; fails with a resource-exhausted error otherwise, leaving
    /// the host untouched.
    pub fn bind_vm(&mut self, vm_running: &Rc<RefCell<VmRunning>>) -> Result<(), SimulationError> {
        let mut vm = vm_running.borrow_mut();
        let num_pes = vm.num_pes();
        if num_pes > self.num_pes_available {
            return Err(SimulationError::ResourceExhausted {
                requested: num_pes as f64,
                available: self.num_pes_available as f64,
            });
        }
        let size_ram = vm.size_ram();
        let size_storage = vm.size_storage();
        let size_bandwidth = vm.size_bandwidth();
        for (counter, required) in [
            (&self.ram, size_ram),
            (&self.storage, size_storage),
            (&self.bandwidth, size_bandwidth),
        ] {
            if required > counter.available() {
                return Err(SimulationError::ResourceExhausted {
                    requested: required,
                    available: counter.available(),
                });
            }
        }
        self.ram.allocate(size_ram)?;
        self.storage.allocate(size_storage)?;
        self.bandwidth.allocate(size_bandwidth)?;

        let factor = vm.host_mips_factor();
        let mut carved = Vec::with_capacity(num_pes as usize);
        let mut granted_ids = Vec::with_capacity(num_pes as usize);
        for host_pe in &self.pes {
            if carved.len() == num_pes as usize {
                break;
            }
            let mut pe = host_pe.borrow_mut();
            if pe.state() == PeState::Free {
                pe.set_state(PeState::Busy);
                let vm_pe = Pe::new(pe.mips_capacity() * factor)?;
                self.pe_pairing.insert(vm_pe.id(), pe.id());
                granted_ids.push(vm_pe.id());
                carved.push(VmPe::new(vm_pe, host_pe.clone()));
            }
        }
        self.num_pes_available -= num_pes;
        self.vm_pes.insert(vm.id(), granted_ids);

        vm.attach_to_host(
            self.id,
            carved,
            Resource::new(size_ram)?,
            Resource::new(size_storage)?,
            Resource::new(size_bandwidth)?,
        );
        let vm_id = vm.id();
        drop(vm);
        self.vms.insert(vm_id, vm_running.clone());
        Ok(())
    }

    /// Returns everything carved for the VM; the inverse of
    /// [`bind_vm`](Host::bind_vm).
    pub fn release_vm(&mut self, vm_running: &Rc<RefCell<VmRunning>>) -> Result<(), SimulationError> {
        let mut vm = vm_running.borrow_mut();
        let vm_id = vm.id();
        if self.vms.shift_remove(&vm_id).is_none() {
            return Err(SimulationError::InvalidState(format!(
                "vm {} is not placed on host {}",
                vm_id, self.id
            )));
        }
        let size_ram = vm.size_ram();
        let size_storage = vm.size_storage();
        let size_bandwidth = vm.size_bandwidth();
        let num_pes = vm.num_pes();
        vm.detach_from_host()?;

        self.bandwidth.deallocate(size_bandwidth)?;
        self.storage.deallocate(size_storage)?;
        self.ram.deallocate(size_ram)?;
        self.num_pes_available += num_pes;

        let granted = self.vm_pes.remove(&vm_id).ok_or_else(|| {
            SimulationError::InvalidState(format!("no PEs recorded for vm {} on host {}", vm_id, self.id))
        })?;
        for vm_pe_id in granted {
            let host_pe_id = self.pe_pairing.remove(&vm_pe_id).ok_or_else(|| {
                SimulationError::InvalidState(format!("virtual pe {} has no host pairing", vm_pe_id))
            })?;
            let host_pe = self
                .pes
                .iter()
                .find(|pe| pe.borrow().id() == host_pe_id)
                .ok_or_else(|| {
                    SimulationError::InvalidState(format!(
                        "host pe {} does not belong to host {}",
                        host_pe_id, self.id
                    ))
                })?;
            host_pe.borrow_mut().set_state(PeState::Free);
        }
        Ok(())
    }
}
