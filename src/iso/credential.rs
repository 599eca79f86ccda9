//! Transport credentials for the DSM ISO API.

use url::Url;

use crate::errors::{DsmError, Result};
use crate::secrets::SecretString;

/// URL and client credentials used to talk to DSM, plus the bearer token
/// obtained by the most recent authentication.
///
/// The bearer token is transient: it is replaced on every authentication and
/// cleared whenever the client credentials change. It is never persisted.
#[derive(Debug, Clone)]
pub struct Credential {
    url: String,
    base_url: Url,
    client_id: String,
    client_secret: SecretString,
    bearer_token: Option<SecretString>,
}

impl Credential {
    /// Build a credential from raw configuration values.
    ///
    /// Every input is whitespace-trimmed; an empty value or an unparseable URL
    /// is a configuration error. No network call is made.
    pub fn new(base_url: &str, client_id: &str, client_secret: &str) -> Result<Self> {
        let url = required(base_url, "senhaseguraUrl")?;
        let parsed = Url::parse(&url).map_err(|e| {
            DsmError::config_field(format!("senhaseguraUrl '{}' is invalid: {}", url, e), "senhaseguraUrl")
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(DsmError::config_field(
                format!("senhaseguraUrl '{}' must use http or https", url),
                "senhaseguraUrl",
            ));
        }

        Ok(Self {
            url,
            base_url: parsed,
            client_id: required(client_id, "clientID")?,
            client_secret: SecretString::new(required(client_secret, "clientSecret")?),
            bearer_token: None,
        })
    }

    /// Replace the active client id/secret pair, e.g. with the application
    /// scoped identity issued by a registration call.
    pub fn define_new_credentials(&mut self, client_id: &str, client_secret: &str) -> Result<()> {
        let client_id = required(client_id, "clientID")?;
        let client_secret = required(client_secret, "clientSecret")?;

        self.client_id = client_id;
        self.client_secret = SecretString::new(client_secret);
        self.bearer_token = None;
        Ok(())
    }

    /// The configured URL exactly as given (trimmed).
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn client_secret(&self) -> &SecretString {
        &self.client_secret
    }

    pub fn bearer_token(&self) -> Option<&SecretString> {
        self.bearer_token.as_ref()
    }

    pub(crate) fn set_bearer_token(&mut self, token: SecretString) {
        self.bearer_token = Some(token);
    }

    /// Absolute URL for an API resource. The resource path replaces any path
    /// present on the base URL.
    pub fn resource_url(&self, resource: &str) -> Url {
        let mut url = self.base_url.clone();
        url.set_path(resource);
        url.set_query(None);
        url
    }
}

fn required(value: &str, name: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DsmError::config_field(format!("{} cannot be null", name), name));
    }
    Ok(trimmed.to_string())
}
