//! # Observability
//!
//! Structured logging for the agent. See [`logging`] for the span macros.

pub mod logging;

pub use logging::{init_logging, log_settings_info};
