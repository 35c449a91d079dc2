//! Data Transfer Objects for communication with the queue service
//!
//! DTOs are the JSON bodies sent to and received from the service. They
//! wrap domain types where the service adds an envelope.

pub mod job;
pub mod runner;
