//! runb: CI/CD pipeline plugin
//!
//! Registers the application, reports the pipeline environment to DSM and
//! writes the application's secrets as variable assignments for the CI tool.

use anyhow::{bail, Context, Result};
use clap::Args;
use tracing::info;

use super::inject::{write_secrets_file, ToolName};
use super::kubernetes::{application_client, ApplicationArgs};
use crate::config::AgentSettings;
use crate::dsm::{collect_environment, load_mapping_file, VariableClient};

#[derive(Debug, Clone, Args)]
pub struct RunbArgs {
    /// CI tool whose variable syntax is written
    #[arg(short = 't', long = "tool-name", value_enum, default_value_t = ToolName::Linux)]
    pub tool_name: ToolName,

    #[command(flatten)]
    pub app: ApplicationArgs,
}

/// Handle the runb command
pub async fn handle_runb(args: RunbArgs, settings: &AgentSettings) -> Result<()> {
    if settings.runb_disabled {
        bail!("RUNB_DISABLED is set - plugin is disabled");
    }

    let mut app = application_client(&args.app, settings)?;

    let issued = app.register().await.context("Failed to register application")?;
    app.define_credentials_by_application(&issued)?;

    let env = collect_environment();
    let map = load_mapping_file(settings.mapping_file.as_deref());
    VariableClient::new(app.client_mut())
        .register(&env, &map)
        .await
        .context("Failed to post variables to DSM")?;

    let secrets = app.get_secrets().await?;
    let count = write_secrets_file(&settings.secrets_file, args.tool_name, &secrets.flatten()).await?;

    info!(
        path = %settings.secrets_file.display(),
        tool = %args.tool_name,
        count,
        "Secrets written for CI tool"
    );
    Ok(())
}
