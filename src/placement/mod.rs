//! Max-fit placement policies binding VMs to hosts and cloudlets to VMs.

pub mod cloudlet_placement;
pub mod host_suitability;
pub mod vm_placement;
pub mod vm_suitability;
