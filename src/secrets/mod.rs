//! Secret data as the agent sees it.
//!
//! - [`SecretSet`] / [`SecretRecord`]: the secrets of one application as
//!   returned by DSM, plus the TTL rule that schedules the next refresh
//! - [`SecretString`]: redacting wrapper for client secrets and tokens
//!
//! A `SecretSet` lives for exactly one fetch-materialize cycle. Nothing is
//! cached in memory between cycles; the filesystem is the only output.

pub mod set;
pub mod types;

pub use set::{SecretRecord, SecretSet, DEFAULT_TTL_FLOOR_SECS, MIN_ACCEPTED_TTL_SECS, TTL_KEY};
pub use types::SecretString;
