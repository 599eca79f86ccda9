//! One-shot provisioning performed by the init container.

use std::fmt;
use std::path::PathBuf;

use clap::ValueEnum;
use tracing::info;

use crate::dsm::ApplicationClient;
use crate::errors::{DsmError, Result};
use crate::materialize::{MaterializeReport, SecretMaterializer};

/// Init container execution type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum InitMode {
    /// Register the application and write its issued credentials
    #[default]
    Iso,
    /// Register, switch to the issued credentials, then fetch and write secrets
    Inject,
    /// Fetch and write secrets with the configured credentials
    InjectTemplate,
}

impl fmt::Display for InitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitMode::Iso => write!(f, "iso"),
            InitMode::Inject => write!(f, "inject"),
            InitMode::InjectTemplate => write!(f, "inject-template"),
        }
    }
}

/// What an init container run left on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionOutcome {
    /// Directory holding the issued credential files
    Credentials(PathBuf),
    /// Secret set written under the secrets directory
    Secrets(MaterializeReport),
}

/// Run one init container pass in the given mode.
pub async fn run_init_container(
    mode: InitMode,
    app: &mut ApplicationClient,
    materializer: &SecretMaterializer,
) -> Result<ProvisionOutcome> {
    info!(mode = %mode, application = %app.descriptor().name(), "Running init container");

    match mode {
        InitMode::Iso => {
            let issued = app.register().await?;
            if issued.id.is_empty() || issued.signature.is_empty() {
                return Err(DsmError::api("DSM did not issue application credentials"));
            }

            let url = app.client().credential().url().to_string();
            let dir = materializer.write_credentials(&url, &issued.id, &issued.signature).await?;
            Ok(ProvisionOutcome::Credentials(dir))
        }
        InitMode::Inject => {
            let issued = app.register().await?;
            app.define_credentials_by_application(&issued)?;

            let secrets = app.get_secrets().await?;
            Ok(ProvisionOutcome::Secrets(materializer.write_secret_set(&secrets).await?))
        }
        InitMode::InjectTemplate => {
            let secrets = app.get_secrets().await?;
            Ok(ProvisionOutcome::Secrets(materializer.write_secret_set(&secrets).await?))
        }
    }
}
