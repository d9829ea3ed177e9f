//! User callbacks interleaved into the event stream.

use crate::event::Event;
use crate::simulator::SimulationContext;

/// Observer invoked on every event delivered from the queue, before the event
/// reaches its handler.
///
/// Listeners are an observability point, not a filter: they receive the event
/// by shared reference and must not try to alter its effect. Implementations
/// typically inspect the event type and act conditionally.
pub trait EventListener {
    fn update(&mut self, event: &Event, ctx: &SimulationContext);
}

/// Observer invoked whenever a circular-clock tick event is delivered.
///
/// Registering a listener enqueues one initial tick at t = 0. The engine does
/// not repeat ticks implicitly: a listener keeps its cadence alive by
/// submitting the next tick at `now + interval` from its own `update`;
/// otherwise the ticking stops. This keeps the simulator agnostic of tick
/// cadences.
pub trait CircularClockListener {
    fn update(&mut self, ctx: &SimulationContext);

    /// The cadence this listener re-arms itself with.
    fn interval(&self) -> f64;
}
