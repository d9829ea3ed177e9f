//! Resource accounting primitives: processing elements and fungible counters.

pub mod counter;
pub mod pe;
