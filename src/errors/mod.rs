//! # Error Handling
//!
//! Error types for the DSM agent. Library code returns [`DsmError`]; only the
//! CLI layer decides whether a failure ends the process.

pub mod types;

pub use types::{DsmError, Result};
