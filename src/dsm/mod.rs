//! # DSM resources
//!
//! Clients for the DSM application and CI/CD variable endpoints, built on
//! top of [`crate::iso::IsoClient`].

pub mod application;
pub mod variables;

pub use application::{ApplicationClient, ApplicationDescriptor, APPLICATION_PATH};
pub use variables::{
    collect_environment, encode_payload, load_mapping_file, VariableClient, VARIABLES_PATH,
};
