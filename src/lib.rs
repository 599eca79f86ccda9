//! # DSM Agent
//!
//! Provisions application secrets from senhasegura DSM onto the local
//! filesystem, for Kubernetes init containers, sidecars and CI/CD pipelines.
//!
//! ## Architecture
//!
//! ```text
//! TtlScheduler → ApplicationClient → IsoClient → DSM ISO API
//!      ↓
//! SecretMaterializer → <secrets folder>/senhasegura/<identity>/<key>
//! ```
//!
//! ## Core Components
//!
//! - **IsoClient**: transport credentials and the client-credentials exchange
//! - **ApplicationClient**: registers an application identity and fetches its secrets
//! - **SecretMaterializer**: writes credentials and secret sets to disk
//! - **TtlScheduler**: the refresh loop, sleeping for the secrets' minimum TTL
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use dsm_agent::{
//!     ApplicationClient, ApplicationDescriptor, ClientOptions, Credential, IsoClient,
//!     SecretMaterializer, TtlScheduler,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> dsm_agent::Result<()> {
//!     let credential = Credential::new("https://dsm.example.com", "client-id", "client-secret")?;
//!     let client = IsoClient::new(credential, &ClientOptions::default())?;
//!     let descriptor = ApplicationDescriptor::new("billing", "prod", "erp")?;
//!
//!     let mut scheduler = TtlScheduler::new(
//!         ApplicationClient::new(client, descriptor),
//!         SecretMaterializer::new("/var/run/secrets"),
//!     );
//!     scheduler.run(CancellationToken::new()).await
//! }
//! ```

pub mod agent;
pub mod cli;
pub mod config;
pub mod dsm;
pub mod errors;
pub mod iso;
pub mod materialize;
pub mod observability;
pub mod secrets;
pub mod utils;

pub use agent::{run_init_container, InitMode, RetryPolicy, SecretSource, TtlScheduler};
pub use config::AgentSettings;
pub use dsm::{ApplicationClient, ApplicationDescriptor, VariableClient};
pub use errors::{DsmError, Result};
pub use iso::{ApiResponse, ClientOptions, Credential, IsoClient, ResponseKind};
pub use materialize::{MaterializeReport, SecretMaterializer};
pub use secrets::{SecretRecord, SecretSet, SecretString};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "dsm-agent";
