//! Simulation clock, event queue and dispatch loop.

use std::cell::RefCell;
use std::rc::Rc;

use serde::Serialize;
use sugars::{rc, refcell};

use crate::datacenter::Datacenter;
use crate::error::SimulationError;
use crate::event::{event_precedes, Event, EventHandler, EventPayload, EventType};
use crate::listener::{CircularClockListener, EventListener};
use crate::log::log_undelivered_event;
use crate::util::heap::MinHeap;

/// Epsilon to compare floating point values for equality.
pub const EPSILON: f64 = 1e-12;

/// Execution status of the simulator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum SimulationStatus {
    Initialized,
    Running,
    Paused,
    Terminated,
}

/// Mutable state shared between the simulator and its contexts: the event
/// queue, the clocks and the execution status.
pub(crate) struct SimulationState {
    queue: MinHeap<Event>,
    clock: f64,
    clock_prev: f64,
    status: SimulationStatus,
    is_termination_time_set: bool,
    event_seq: u64,
}

impl SimulationState {
    fn new() -> Self {
        let mut state = Self {
            queue: MinHeap::new(event_precedes),
            clock: 0.0,
            clock_prev: 0.0,
            status: SimulationStatus::Initialized,
            is_termination_time_set: false,
            event_seq: 0,
        };
        // floor event: absent any other termination the loop still ends
        state.submit(Event::new(
            EventType::SimulationTerminate,
            EventPayload::None,
            f64::MAX,
        ));
        state
    }

    fn submit(&mut self, mut event: Event) {
        if event.time < 0.0 {
            panic!("Event time is negative! It is not allowed to add events from the past.");
        }
        event.seq = self.event_seq;
        self.event_seq += 1;
        self.queue.push(event);
    }
}

/// A facade for reading the clock and submitting events from components and
/// listeners.
///
/// Contexts share the simulator state behind `Rc<RefCell<..>>`, so
/// [`submit`](SimulationContext::submit) is reentrant: handlers and listeners
/// may schedule follow-up events while the dispatch loop is delivering one.
#[derive(Clone)]
pub struct SimulationContext {
    name: String,
    state: Rc<RefCell<SimulationState>>,
}

impl SimulationContext {
    /// Name of the component owning this context.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current simulation time.
    pub fn time(&self) -> f64 {
        self.state.borrow().clock
    }

    /// Schedules an event for delivery.
    pub fn submit(&self, event: Event) {
        self.state.borrow_mut().submit(event);
    }
}

/// The core of the simulation.
///
/// Owns the event queue and the global clock, pops events in (time, priority)
/// order, fans each one out to the registered event listeners and then either
/// handles it itself (terminate, pause, circular-clock ticks) or dispatches
/// it to the target's [`process`](crate::event::EventHandler::process).
pub struct Simulator {
    state: Rc<RefCell<SimulationState>>,
    ctx: SimulationContext,
    event_listeners: Vec<Rc<RefCell<dyn EventListener>>>,
    circular_clock_listeners: Vec<Rc<RefCell<dyn CircularClockListener>>>,
    datacenter: Option<Rc<RefCell<Datacenter>>>,
}

impl Simulator {
    /// Creates a simulator with an empty queue except for the termination
    /// sentinel scheduled at the largest representable time.
    pub fn new() -> Self {
        let state = rc!(refcell!(SimulationState::new()));
        let ctx = SimulationContext {
            name: "simulator".to_string(),
            state: state.clone(),
        };
        Self {
            state,
            ctx,
            event_listeners: Vec::new(),
            circular_clock_listeners: Vec::new(),
            datacenter: None,
        }
    }

    /// Creates a named context sharing this simulator's clock and queue.
    pub fn context<S: AsRef<str>>(&self, name: S) -> SimulationContext {
        SimulationContext {
            name: name.as_ref().to_owned(),
            state: self.state.clone(),
        }
    }

    /// Attaches the datacenter this simulation drives.
    pub fn set_datacenter(&mut self, datacenter: Rc<RefCell<Datacenter>>) {
        datacenter.borrow_mut().set_context(self.context("datacenter"));
        self.datacenter = Some(datacenter);
    }

    pub fn datacenter(&self) -> Option<&Rc<RefCell<Datacenter>>> {
        self.datacenter.as_ref()
    }

    /// Schedules a termination event at the given time, replacing the
    /// default infinite floor as the effective end of the simulation.
    pub fn set_termination_time(&mut self, time: f64) {
        let mut state = self.state.borrow_mut();
        state.is_termination_time_set = true;
        state.submit(Event::new(
            EventType::SimulationTerminate,
            EventPayload::None,
            time,
        ));
    }

    /// Schedules an event for delivery.
    pub fn submit(&self, event: Event) {
        self.state.borrow_mut().submit(event);
    }

    /// Registers a listener invoked on every delivered event, before the
    /// event's own handler.
    pub fn add_event_listener(&mut self, listener: Rc<RefCell<dyn EventListener>>) {
        self.event_listeners.push(listener);
    }

    /// Registers a circular-clock listener and enqueues its initial tick at
    /// t = 0.
    pub fn add_circular_clock_listener(&mut self, listener: Rc<RefCell<dyn CircularClockListener>>) {
        self.circular_clock_listeners.push(listener);
        self.submit(Event::new(
            EventType::CircularClockTick,
            EventPayload::None,
            0.0,
        ));
    }

    /// Current simulation time.
    pub fn global_clock(&self) -> f64 {
        self.state.borrow().clock
    }

    /// Current execution status.
    pub fn state(&self) -> SimulationStatus {
        self.state.borrow().status
    }

    /// Runs the dispatch loop until a pause or terminate event is delivered
    /// or the queue runs dry.
    ///
    /// A paused simulation resumes from the same queue on the next call;
    /// calling again after termination is a no-op.
    pub fn run_until_pause_or_terminate(&mut self) -> Result<(), SimulationError> {
        if self.state.borrow().status == SimulationStatus::Terminated {
            return Ok(());
        }
        self.state.borrow_mut().status = SimulationStatus::Running;
        loop {
            let event = {
                let mut state = self.state.borrow_mut();
                if state.status != SimulationStatus::Running {
                    break;
                }
                match state.queue.pop() {
                    Some(event) => {
                        assert!(
                            event.time >= state.clock_prev - EPSILON,
                            "Event delivery is not monotonic in time"
                        );
                        state.clock = event.time;
                        event
                    }
                    None => break,
                }
            };
            for listener in &self.event_listeners {
                listener.borrow_mut().update(&event, &self.ctx);
            }
            match event.event_type {
                EventType::SimulationTerminate => {
                    {
                        let mut state = self.state.borrow_mut();
                        if !state.is_termination_time_set {
                            // report the time of the last real activity, not the sentinel
                            state.clock = state.clock_prev;
                        }
                        state.status = SimulationStatus::Terminated;
                    }
                    match self.datacenter.clone() {
                        Some(datacenter) => datacenter.borrow_mut().process(event)?,
                        None => {
                            return Err(SimulationError::InvalidState(
                                "cannot terminate a simulation with no attached datacenter".to_string(),
                            ))
                        }
                    }
                    break;
                }
                EventType::SimulationPause => {
                    self.state.borrow_mut().status = SimulationStatus::Paused;
                    break;
                }
                EventType::CircularClockTick => {
                    for listener in &self.circular_clock_listeners {
                        listener.borrow_mut().update(&self.ctx);
                    }
                }
                _ => match event.target.clone() {
                    Some(target) => target.borrow_mut().process(event)?,
                    None => log_undelivered_event(&event),
                },
            }
            let mut state = self.state.borrow_mut();
            state.clock_prev = state.clock;
        }
        Ok(())
    }
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new()
    }
}
