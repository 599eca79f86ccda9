//! Kubernetes CLI commands
//!
//! `init-container` provisions once before the application starts;
//! `sidecar` keeps the secrets directory fresh for the life of the pod.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::agent::{run_init_container, InitMode, ProvisionOutcome, TtlScheduler};
use crate::config::AgentSettings;
use crate::dsm::{ApplicationClient, ApplicationDescriptor};
use crate::iso::IsoClient;

/// Application identity flags shared by every command
#[derive(Debug, Clone, Args)]
pub struct ApplicationArgs {
    /// Application name (required)
    #[arg(short = 'a', long = "app-name", value_name = "NAME")]
    pub app_name: String,

    /// Application environment (required)
    #[arg(short, long, value_name = "ENVIRONMENT")]
    pub environment: String,

    /// Application system (required)
    #[arg(short, long, value_name = "SYSTEM")]
    pub system: String,
}

impl ApplicationArgs {
    pub fn descriptor(&self) -> crate::Result<ApplicationDescriptor> {
        ApplicationDescriptor::new(&self.app_name, &self.environment, &self.system)
    }
}

#[derive(Debug, Subcommand)]
pub enum KubernetesCommands {
    /// Provision the application's secrets once into <secrets folder>/senhasegura
    #[command(
        long_about = "Provision the application's secrets once before the application container starts.\n\nExecution types:\n  iso              register the application and save its issued credentials into senhasegura/iso\n  inject           register, then use the issued credentials to fetch and save the secrets\n  inject-template  fetch and save the secrets with the configured credentials",
        after_help = "EXAMPLES:\n    dsm kubernetes init-container -t inject -a billing -e prod -s erp"
    )]
    InitContainer {
        /// Execution type
        #[arg(short = 't', long = "type", value_enum, default_value_t = InitMode::Iso)]
        execution_type: InitMode,

        #[command(flatten)]
        app: ApplicationArgs,
    },

    /// Refresh the application's secrets periodically according to their TTL
    #[command(after_help = "EXAMPLES:\n    dsm kubernetes sidecar -a billing -e prod -s erp")]
    Sidecar {
        #[command(flatten)]
        app: ApplicationArgs,
    },
}

/// Handle kubernetes commands
pub async fn handle_kubernetes_command(
    command: KubernetesCommands,
    settings: &AgentSettings,
    shutdown: CancellationToken,
) -> Result<()> {
    match command {
        KubernetesCommands::InitContainer { execution_type, app } => {
            let mut client = application_client(&app, settings)?;
            let materializer = settings.materializer();

            let outcome = run_init_container(execution_type, &mut client, &materializer)
                .await
                .with_context(|| format!("init-container ({}) failed", execution_type))?;

            match outcome {
                ProvisionOutcome::Credentials(dir) => {
                    info!(path = %dir.display(), "Application credentials saved");
                }
                ProvisionOutcome::Secrets(report) => {
                    info!(directories = report.directories, files = report.files, "Secrets saved");
                }
            }
        }
        KubernetesCommands::Sidecar { app } => {
            let client = application_client(&app, settings)?;
            let mut scheduler = TtlScheduler::new(client, settings.materializer());

            scheduler.run(shutdown).await.context("sidecar stopped")?;
        }
    }

    Ok(())
}

/// Build an application client from the identity flags and settings.
pub(crate) fn application_client(
    app: &ApplicationArgs,
    settings: &AgentSettings,
) -> Result<ApplicationClient> {
    let descriptor = app.descriptor()?;
    let client = IsoClient::new(settings.credential()?, &settings.client_options())?;
    Ok(ApplicationClient::new(client, descriptor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(subcommand)]
        command: KubernetesCommands,
    }

    #[test]
    fn test_init_container_flags() {
        let cli = TestCli::parse_from([
            "dsm",
            "init-container",
            "-t",
            "inject-template",
            "-a",
            "billing",
            "-e",
            "prod",
            "-s",
            "erp",
        ]);

        match cli.command {
            KubernetesCommands::InitContainer { execution_type, app } => {
                assert_eq!(execution_type, InitMode::InjectTemplate);
                assert_eq!(app.app_name, "billing");
                assert_eq!(app.descriptor().unwrap().system(), "erp");
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_init_container_defaults_to_iso() {
        let cli = TestCli::parse_from([
            "dsm",
            "init-container",
            "--app-name",
            "billing",
            "--environment",
            "prod",
            "--system",
            "erp",
        ]);
        assert!(matches!(
            cli.command,
            KubernetesCommands::InitContainer { execution_type: InitMode::Iso, .. }
        ));
    }

    #[test]
    fn test_invalid_type_is_rejected() {
        let result = TestCli::try_parse_from([
            "dsm", "init-container", "-t", "bogus", "-a", "a", "-e", "e", "-s", "s",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_sidecar_requires_identity() {
        assert!(TestCli::try_parse_from(["dsm", "sidecar", "-a", "billing"]).is_err());
    }

    #[test]
    fn test_application_client_requires_credentials() {
        let app = ApplicationArgs {
            app_name: "billing".into(),
            environment: "prod".into(),
            system: "erp".into(),
        };
        let err = application_client(&app, &AgentSettings::default()).unwrap_err();
        assert!(err.to_string().contains("SENHASEGURA_URL"));
    }
}
