//! Scheduler layer for the runner
//!
//! This layer polls the queue service for work, claims at most one job per
//! cycle, hands it to the execution service and adapts the poll interval.

pub mod interval;
pub mod poller;

pub use interval::PollInterval;
pub use poller::JobPoller;
