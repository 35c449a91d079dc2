//! Service layer
//!
//! Services contain the runner's business logic: establishing the runner
//! identity and supervising job execution. They work against repository
//! traits so they can be tested without a queue service.

mod execution;
mod registration;

// Re-export traits
pub use execution::ExecutionService;

// Re-export implementations
pub use execution::{CurrentJob, StandardExecutionService};
pub use registration::RegistrationService;
