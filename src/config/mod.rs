//! # Configuration Management
//!
//! Loads [`AgentSettings`] from an optional YAML file and the environment.
//! Library code receives the resolved values by construction; nothing below
//! the CLI reads the environment on its own.

pub mod settings;

pub use settings::{
    AgentSettings, CLIENT_ID_KEY, CLIENT_SECRET_KEY, CONFIG_FILE_KEY, DEFAULT_REQUEST_TIMEOUT_SECS,
    DEFAULT_SECRETS_FILE, DEFAULT_SECRETS_FOLDER, MAPPING_FILE_KEY, URL_KEY,
};
