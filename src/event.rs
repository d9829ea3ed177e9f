//! Simulation events.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::rc::Rc;

use serde::Serialize;

use crate::cloudlet::Cloudlet;
use crate::cloudlet_running::CloudletRunning;
use crate::entity::EntityId;
use crate::error::SimulationError;
use crate::vm::Vm;
use crate::vm_running::VmRunning;

/// Types of events flowing through the simulation.
///
/// Every type carries a fixed delivery priority (see
/// [`priority`](EventType::priority)); among events scheduled at the same
/// time, the smaller priority value wins. The numeric spreads ensure that
/// termination preempts tick listeners, tick listeners preempt lifecycle
/// events, and destructive events precede constructive ones.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum EventType {
    SimulationTerminate,
    SimulationPause,
    CircularClockTick,
    HostAdd,
    HostRemove,
    HostPowerOn,
    HostPowerOff,
    VmFail,
    VmDestroy,
    VmBind,
    VmShutdown,
    VmBootup,
    CloudletFail,
    CloudletFinish,
    CloudletBind,
    CloudletSubmit,
}

impl EventType {
    /// Delivery priority among events scheduled at the same time; smaller is
    /// higher.
    pub fn priority(self) -> u32 {
        match self {
            EventType::SimulationTerminate => 0,
            EventType::SimulationPause => 1,
            EventType::CircularClockTick => 100,
            EventType::HostAdd => 200,
            EventType::HostRemove => 201,
            EventType::HostPowerOn => 202,
            EventType::HostPowerOff => 203,
            EventType::VmFail => 300,
            EventType::VmDestroy => 301,
            EventType::VmBind => 302,
            EventType::VmShutdown => 303,
            EventType::VmBootup => 304,
            EventType::CloudletFail => 400,
            EventType::CloudletFinish => 401,
            EventType::CloudletBind => 402,
            EventType::CloudletSubmit => 403,
        }
    }
}

/// Payload attached to an event.
pub enum EventPayload {
    None,
    /// VM descriptors submitted for placement as one atomic batch.
    VmBatch(Vec<Rc<RefCell<Vm>>>),
    /// A single placed VM going through its lifecycle.
    Vm(Rc<RefCell<VmRunning>>),
    /// Cloudlet descriptors submitted for scheduling.
    CloudletBatch(Vec<Rc<RefCell<Cloudlet>>>),
    /// A single scheduled cloudlet.
    Cloudlet(Rc<RefCell<CloudletRunning>>),
}

/// Trait for components that consume events.
pub trait EventHandler {
    /// Processes the event, possibly mutating component state and scheduling
    /// follow-up events. Handlers run to completion and never block.
    fn process(&mut self, event: Event) -> Result<(), SimulationError>;
}

/// An event scheduled for delivery at a fixed simulation time.
///
/// Events are immutable once submitted; listeners observe them by reference
/// and the target handler finally consumes them.
pub struct Event {
    /// Submission sequence number, stamped by the simulator. It provides the
    /// consistent within-run order among events with equal time and priority.
    pub(crate) seq: u64,
    /// Time of event occurrence.
    pub time: f64,
    pub event_type: EventType,
    /// Identifier of the entity that produced the event, if any.
    pub src: Option<EntityId>,
    /// Component the event is addressed to; `None` addresses the simulator
    /// itself (terminate, pause, circular-clock ticks).
    pub target: Option<Rc<RefCell<dyn EventHandler>>>,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(event_type: EventType, payload: EventPayload, time: f64) -> Self {
        Self {
            seq: 0,
            time,
            event_type,
            src: None,
            target: None,
            payload,
        }
    }

    pub fn with_target(mut self, target: Rc<RefCell<dyn EventHandler>>) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_source(mut self, src: EntityId) -> Self {
        self.src = Some(src);
        self
    }

    pub fn priority(&self) -> u32 {
        self.event_type.priority()
    }
}

/// Ordering predicate for the event queue: earlier time first, then higher
/// priority (smaller value), then submission order.
pub(crate) fn event_precedes(a: &Event, b: &Event) -> bool {
    match a.time.total_cmp(&b.time) {
        Ordering::Less => true,
        Ordering::Greater => false,
        Ordering::Equal => match a.priority().cmp(&b.priority()) {
            Ordering::Less => true,
            Ordering::Greater => false,
            Ordering::Equal => a.seq < b.seq,
        },
    }
}
