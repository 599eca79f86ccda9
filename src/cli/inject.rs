//! CI tool output formats for runb.
//!
//! Each secret becomes one line the CI job can source or echo to set a
//! pipeline variable. Values are quoted for the shell, and keys that are not
//! valid variable names are skipped.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use clap::ValueEnum;
use tracing::{debug, info, warn};

use crate::errors::{DsmError, Result};

/// CI tool whose variable syntax the secrets file uses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ToolName {
    Github,
    AzureDevops,
    Bamboo,
    Bitbucket,
    Circleci,
    Teamcity,
    #[default]
    Linux,
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ToolName::Github => "github",
            ToolName::AzureDevops => "azure-devops",
            ToolName::Bamboo => "bamboo",
            ToolName::Bitbucket => "bitbucket",
            ToolName::Circleci => "circleci",
            ToolName::Teamcity => "teamcity",
            ToolName::Linux => "linux",
        };
        f.write_str(name)
    }
}

impl ToolName {
    /// Render one variable assignment, without the trailing newline.
    pub fn render(&self, key: &str, value: &str) -> String {
        match self {
            ToolName::Github => {
                format!("echo {} >> \"$GITHUB_ENV\"", shell_quote(&format!("{}={}", key, value)))
            }
            ToolName::AzureDevops => format!(
                "echo {}",
                shell_quote(&format!(
                    "##vso[task.setvariable variable={};issecret=true]{}",
                    key,
                    azure_escape(value)
                ))
            ),
            ToolName::Bamboo => format!("{}={}", key, shell_quote(value)),
            ToolName::Bitbucket => format!("export {}={}", key, shell_quote(value)),
            ToolName::Circleci => format!(
                "echo {} >> \"$BASH_ENV\"",
                shell_quote(&format!("export {}={}", key, shell_quote(value)))
            ),
            ToolName::Teamcity => format!(
                "echo {}",
                shell_quote(&format!(
                    "##teamcity[setParameter name='env.{}' value='{}']",
                    key,
                    teamcity_escape(value)
                ))
            ),
            ToolName::Linux => format!("declare -x {}={}", key, shell_quote(value)),
        }
    }
}

/// Single-quote `value` for POSIX shells.
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

fn azure_escape(value: &str) -> String {
    value.replace('%', "%AZP25").replace('\r', "%0D").replace('\n', "%0A")
}

fn teamcity_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '|' => escaped.push_str("||"),
            '\'' => escaped.push_str("|'"),
            '[' => escaped.push_str("|["),
            ']' => escaped.push_str("|]"),
            '\n' => escaped.push_str("|n"),
            '\r' => escaped.push_str("|r"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn is_variable_name(key: &str) -> bool {
    let mut chars = key.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Render every variable for `tool`, skipping keys that are not variable
/// names. Returns the file contents and the number of variables included.
pub fn render_secrets(tool: ToolName, secrets: &BTreeMap<String, String>) -> (String, usize) {
    let mut contents = String::new();
    let mut count = 0;

    for (key, value) in secrets {
        if !is_variable_name(key) {
            warn!(key = %key, "Skipping secret whose key is not a valid variable name");
            continue;
        }
        contents.push_str(&tool.render(key, value));
        contents.push('\n');
        count += 1;
    }

    (contents, count)
}

/// Write the runb secrets file, replacing any previous content. An empty
/// map still truncates the file so an earlier run's variables are not
/// sourced again.
pub async fn write_secrets_file(
    path: &Path,
    tool: ToolName,
    secrets: &BTreeMap<String, String>,
) -> Result<usize> {
    if secrets.is_empty() {
        info!("No secrets to be injected");
    }

    let (contents, count) = render_secrets(tool, secrets);
    tokio::fs::write(path, contents)
        .await
        .map_err(|e| DsmError::filesystem(e, "Failed to write secrets file", path))?;

    debug!(path = %path.display(), tool = %tool, count, "Secrets injected");
    Ok(count)
}
