//! # DSM ISO transport
//!
//! Credentials, the HTTP client and the response model for the DSM ISO API.
//! Everything that talks to the network goes through [`IsoClient`].

pub mod client;
pub mod credential;
pub mod response;

pub use client::{ClientOptions, IsoClient, TOKEN_PATH};
pub use credential::Credential;
pub use response::{
    ApiResponse, Application, ApplicationResponse, Envelope, ResponseKind, ResponseStatus,
    TokenResponse, VariableResponse,
};
