//! Serialized request processing.
//!
//! Player requests, table events and timer ticks all travel through one
//! bounded queue drained by a single [`ProcessorWorker`]. Handlers run to
//! completion one at a time, so a competition is never mutated concurrently.

pub mod messages;
mod settlement;
pub mod timers;
pub mod worker;

pub use messages::{Request, RequestAction, RequestTicket};
pub use timers::{DeferredTask, TimerRegistry};
pub use worker::ProcessorWorker;
