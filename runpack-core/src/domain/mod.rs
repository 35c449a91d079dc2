//! Core domain types
//!
//! These types represent the entities the runner works with. They are
//! shared between the queue client (wire format) and the runner (execution).

pub mod heartbeat;
pub mod job;
pub mod runner;
