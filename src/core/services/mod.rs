// src/core/services/mod.rs
pub mod scheduler;
pub mod state_machine;
pub mod verification;

pub use scheduler::{CancelFlag, PollScheduler};
pub use state_machine::{TickOutcome, VerificationStateMachine};
pub use verification::{StatusReport, VerificationRequest, VerificationService};
