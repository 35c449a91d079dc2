//! Repository layer
//!
//! Repositories abstract everything the runner reads from or writes to:
//! the queue service (runners, jobs) and the local identity file. They
//! contain no business logic.
//!
//! Queue repositories are trait-based so the scheduler and supervisor can
//! be exercised against in-memory fakes.

mod identity;
mod jobs;
mod runners;

// Re-export traits
pub use jobs::JobRepository;
pub use runners::{RegisterError, RunnerRepository};

// Re-export implementations
pub use identity::{FileIdentityStore, generate_name};
pub use jobs::HttpJobRepository;
pub use runners::HttpRunnerRepository;
