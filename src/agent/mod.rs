//! # Agent
//!
//! The two ways the agent runs:
//!
//! - Init container: a single provisioning pass ([`run_init_container`])
//! - Sidecar: the TTL driven refresh loop ([`TtlScheduler`])

pub mod provision;
pub mod scheduler;
pub mod source;

pub use provision::{run_init_container, InitMode, ProvisionOutcome};
pub use scheduler::{CycleOutcome, RetryPolicy, TtlScheduler};
pub use source::SecretSource;
