//! CI/CD variable reporting through `/iso/cicd/variables`.

use std::ffi::OsStr;
use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::{debug, info};

use crate::errors::Result;
use crate::iso::{IsoClient, ResponseKind, VariableResponse};

pub const VARIABLES_PATH: &str = "/iso/cicd/variables";

/// Posts pipeline variables under the client's active credentials
#[derive(Debug)]
pub struct VariableClient<'a> {
    client: &'a mut IsoClient,
}

impl<'a> VariableClient<'a> {
    pub fn new(client: &'a mut IsoClient) -> Self {
        Self { client }
    }

    /// Authenticate, then post the already encoded `env` and `map` payloads.
    pub async fn register(&mut self, env: &str, map: &str) -> Result<VariableResponse> {
        info!("Posting variables to DSM");

        self.client.authenticate().await?;

        let response = self
            .client
            .post_form(VARIABLES_PATH, &[("env", env), ("map", map)], ResponseKind::Variable)
            .await?
            .into_variable()?;

        debug!(status = response.envelope.response.status, "Variables posted");
        Ok(response)
    }
}

/// Standard base64 with `+`, `/` and `=` replaced by `-`, `_` and `,`.
pub fn encode_payload(raw: &str) -> String {
    STANDARD
        .encode(raw.as_bytes())
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            '=' => ',',
            other => other,
        })
        .collect()
}

/// Join `KEY=VALUE` pairs into newline separated lines. Bytes that are not
/// valid UTF-8 become U+FFFD.
pub fn join_environment<I, K, V>(vars: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<OsStr>,
    V: AsRef<OsStr>,
{
    vars.into_iter()
        .map(|(k, v)| format!("{}={}", k.as_ref().to_string_lossy(), v.as_ref().to_string_lossy()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// The encoded process environment.
pub fn collect_environment() -> String {
    encode_payload(&join_environment(std::env::vars_os()))
}

/// The encoded mapping file, or an empty string when no file is configured
/// or it cannot be read.
pub fn load_mapping_file(path: Option<&Path>) -> String {
    let Some(path) = path else {
        debug!("Mapping file not set, proceeding");
        return String::new();
    };

    match std::fs::read_to_string(path) {
        Ok(content) => {
            debug!(path = %path.display(), "Using mapping file");
            encode_payload(&content)
        }
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Mapping file not readable, proceeding");
            String::new()
        }
    }
}
