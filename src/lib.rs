#![doc = include_str!("../readme.md")]

pub mod broker;
pub mod cloudlet;
pub mod cloudlet_running;
pub mod datacenter;
pub mod entity;
pub mod error;
pub mod event;
pub mod host;
pub mod listener;
pub mod log;
pub mod placement;
pub mod resources;
pub mod simulator;
pub mod util;
pub mod vm;
pub mod vm_running;

pub use colored;

pub use broker::Broker;
pub use cloudlet::{Cloudlet, CloudletState};
pub use cloudlet_running::CloudletRunning;
pub use datacenter::Datacenter;
pub use entity::EntityId;
pub use error::SimulationError;
pub use event::{Event, EventHandler, EventPayload, EventType};
pub use host::Host;
pub use listener::{CircularClockListener, EventListener};
pub use resources::counter::Resource;
pub use resources::pe::{Pe, PeState};
pub use simulator::{SimulationContext, SimulationStatus, Simulator, EPSILON};
pub use util::heap::MinHeap;
pub use vm::{Vm, VmState};
pub use vm_running::{VmPe, VmRunning};
