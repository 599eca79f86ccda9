//! Application registration and secret lookup.

use tracing::{debug, info};

use crate::errors::{DsmError, Result};
use crate::iso::{ApplicationResponse, IsoClient, ResponseKind};
use crate::secrets::SecretSet;

/// Application endpoint: POST registers, GET looks up
pub const APPLICATION_PATH: &str = "/iso/dapp/Application";

/// Identity of the application whose secrets are provisioned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationDescriptor {
    name: String,
    environment: String,
    system: String,
}

impl ApplicationDescriptor {
    /// All three fields are required; an empty (or whitespace only) value is
    /// a configuration error.
    pub fn new(name: &str, environment: &str, system: &str) -> Result<Self> {
        Ok(Self {
            name: required(name, "application", "Application name must be defined")?,
            environment: required(environment, "environment", "Environment must be defined")?,
            system: required(system, "system", "System must be defined")?,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn system(&self) -> &str {
        &self.system
    }

    fn form(&self) -> [(&str, &str); 3] {
        [
            ("application", self.name.as_str()),
            ("environment", self.environment.as_str()),
            ("system", self.system.as_str()),
        ]
    }
}

fn required(value: &str, field: &str, message: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DsmError::config_field(message, field));
    }
    Ok(trimmed.to_string())
}

/// Registers an application identity with DSM and retrieves its secrets.
///
/// Every operation re-authenticates under the currently active credentials;
/// no token is reused across calls.
#[derive(Debug)]
pub struct ApplicationClient {
    client: IsoClient,
    descriptor: ApplicationDescriptor,
}

impl ApplicationClient {
    pub fn new(client: IsoClient, descriptor: ApplicationDescriptor) -> Self {
        Self { client, descriptor }
    }

    pub fn descriptor(&self) -> &ApplicationDescriptor {
        &self.descriptor
    }

    pub fn client(&self) -> &IsoClient {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut IsoClient {
        &mut self.client
    }

    /// Register this application and return the issued identity.
    pub async fn register(&mut self) -> Result<ApplicationResponse> {
        info!(
            application = %self.descriptor.name,
            environment = %self.descriptor.environment,
            system = %self.descriptor.system,
            "Registering application on DSM"
        );

        self.client.authenticate().await?;

        let response = self
            .client
            .post_form(APPLICATION_PATH, &self.descriptor.form(), ResponseKind::Application)
            .await?
            .into_application()?;

        debug!(client_id = %response.id, "Application registered");
        Ok(response)
    }

    /// Switch to the application scoped credentials issued by [`register`].
    ///
    /// [`register`]: ApplicationClient::register
    pub fn define_credentials_by_application(&mut self, application: &ApplicationResponse) -> Result<()> {
        self.client.define_new_credentials(&application.id, application.signature.expose_secret())
    }

    /// Look up the application's current state under the active credentials.
    pub async fn get_application(&mut self) -> Result<ApplicationResponse> {
        self.client.authenticate().await?;
        self.client.get(APPLICATION_PATH, ResponseKind::Application).await?.into_application()
    }

    /// Fetch the secret set currently delivered to this application.
    ///
    /// A response without an `application` block or without `secrets` is a
    /// not-found error; an empty `secrets` array is a valid empty set.
    pub async fn get_secrets(&mut self) -> Result<SecretSet> {
        debug!(application = %self.descriptor.name, "Finding secrets from application");

        let response = self.get_application().await?;
        let secrets = response
            .application
            .and_then(|application| application.secrets)
            .ok_or_else(|| DsmError::not_found("secrets", &self.descriptor.name))?;

        debug!(records = secrets.len(), "Secrets retrieved");
        Ok(secrets)
    }
}
