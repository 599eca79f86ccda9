//! # Agent Settings
//!
//! Settings come from an optional YAML file overlaid with environment
//! variables; a non-empty environment variable always wins over the file.
//!
//! The file is resolved in order: the `--config` flag, `SENHASEGURA_CONFIG_FILE`,
//! then `$HOME/.config.yaml`. Only the last one may be missing.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;
use validator::Validate;

use crate::errors::{DsmError, Result};
use crate::iso::{ClientOptions, Credential};
use crate::materialize::SecretMaterializer;
use crate::secrets::SecretString;

pub const URL_KEY: &str = "SENHASEGURA_URL";
pub const CLIENT_ID_KEY: &str = "SENHASEGURA_CLIENT_ID";
pub const CLIENT_SECRET_KEY: &str = "SENHASEGURA_CLIENT_SECRET";
pub const SECRETS_FOLDER_KEY: &str = "SENHASEGURA_SECRETS_FOLDER";
pub const SECRETS_FILE_KEY: &str = "SENHASEGURA_SECRETS_FILE";
pub const MAPPING_FILE_KEY: &str = "SENHASEGURA_MAPPING_FILE";
pub const RUNB_DISABLED_KEY: &str = "RUNB_DISABLED";
pub const REQUEST_TIMEOUT_KEY: &str = "SENHASEGURA_REQUEST_TIMEOUT";
pub const INSECURE_SKIP_VERIFY_KEY: &str = "SENHASEGURA_INSECURE_SKIP_VERIFY";
pub const CONFIG_FILE_KEY: &str = "SENHASEGURA_CONFIG_FILE";

pub const DEFAULT_SECRETS_FOLDER: &str = "/var/run/secrets";
pub const DEFAULT_SECRETS_FILE: &str = ".runb.vars";
pub const DEFAULT_CONFIG_FILE_NAME: &str = ".config.yaml";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

const KNOWN_KEYS: [&str; 9] = [
    URL_KEY,
    CLIENT_ID_KEY,
    CLIENT_SECRET_KEY,
    SECRETS_FOLDER_KEY,
    SECRETS_FILE_KEY,
    MAPPING_FILE_KEY,
    RUNB_DISABLED_KEY,
    REQUEST_TIMEOUT_KEY,
    INSECURE_SKIP_VERIFY_KEY,
];

/// Fully resolved agent configuration
#[derive(Debug, Clone, Validate)]
pub struct AgentSettings {
    pub url: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<SecretString>,

    /// Root under which `senhasegura/` is materialized
    pub secrets_folder: PathBuf,

    /// runb output file
    pub secrets_file: PathBuf,

    pub mapping_file: Option<PathBuf>,

    pub runb_disabled: bool,

    #[validate(range(
        min = 1,
        max = 600,
        message = "SENHASEGURA_REQUEST_TIMEOUT must be between 1 and 600 seconds"
    ))]
    pub request_timeout_secs: u64,

    pub insecure_skip_verify: bool,

    /// Config file consulted, whether or not it existed
    pub config_path: Option<PathBuf>,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            url: None,
            client_id: None,
            client_secret: None,
            secrets_folder: PathBuf::from(DEFAULT_SECRETS_FOLDER),
            secrets_file: PathBuf::from(DEFAULT_SECRETS_FILE),
            mapping_file: None,
            runb_disabled: false,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            insecure_skip_verify: true,
            config_path: None,
        }
    }
}

impl AgentSettings {
    /// Load settings from the config file and the process environment.
    pub fn load(config_flag: Option<&Path>) -> Result<Self> {
        Self::load_with(config_flag, |key| std::env::var(key).ok())
    }

    /// Load settings using `env` to look up environment variables.
    pub fn load_with<F>(config_flag: Option<&Path>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| env(key).filter(|value| !value.trim().is_empty());

        let (config_path, required) = match config_flag {
            Some(path) => (Some(path.to_path_buf()), true),
            None => match lookup(CONFIG_FILE_KEY) {
                Some(path) => (Some(PathBuf::from(path)), true),
                None => (
                    lookup("HOME").map(|home| Path::new(&home).join(DEFAULT_CONFIG_FILE_NAME)),
                    false,
                ),
            },
        };

        let mut values = match &config_path {
            Some(path) => read_config_file(path, required)?,
            None => BTreeMap::new(),
        };

        for key in KNOWN_KEYS {
            if let Some(value) = lookup(key) {
                values.insert(key.to_string(), value);
            }
        }

        let settings = Self::from_values(&values, config_path)?;
        settings.validate()?;
        Ok(settings)
    }

    fn from_values(values: &BTreeMap<String, String>, config_path: Option<PathBuf>) -> Result<Self> {
        let get = |key: &str| {
            values.get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
        };

        let request_timeout_secs = match get(REQUEST_TIMEOUT_KEY) {
            Some(raw) => raw.parse::<u64>().map_err(|_| {
                DsmError::config_field(
                    format!("{} must be a whole number of seconds, got '{}'", REQUEST_TIMEOUT_KEY, raw),
                    REQUEST_TIMEOUT_KEY,
                )
            })?,
            None => DEFAULT_REQUEST_TIMEOUT_SECS,
        };

        let insecure_skip_verify = match get(INSECURE_SKIP_VERIFY_KEY) {
            Some(raw) => parse_bool(INSECURE_SKIP_VERIFY_KEY, &raw)?,
            None => true,
        };

        Ok(Self {
            url: get(URL_KEY),
            client_id: get(CLIENT_ID_KEY),
            client_secret: get(CLIENT_SECRET_KEY).map(SecretString::new),
            secrets_folder: get(SECRETS_FOLDER_KEY)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SECRETS_FOLDER)),
            secrets_file: get(SECRETS_FILE_KEY)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SECRETS_FILE)),
            mapping_file: get(MAPPING_FILE_KEY).map(PathBuf::from),
            runb_disabled: get(RUNB_DISABLED_KEY).as_deref() == Some("1"),
            request_timeout_secs,
            insecure_skip_verify,
            config_path,
        })
    }

    /// Validate the loaded settings
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).map_err(DsmError::from)
    }

    /// Build the transport credential; every field must be present.
    pub fn credential(&self) -> Result<Credential> {
        let url = self.require(URL_KEY, self.url.as_deref())?;
        let client_id = self.require(CLIENT_ID_KEY, self.client_id.as_deref())?;
        let client_secret =
            self.require(CLIENT_SECRET_KEY, self.client_secret.as_ref().map(SecretString::expose_secret))?;

        Credential::new(url, client_id, client_secret)
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            timeout: Duration::from_secs(self.request_timeout_secs),
            accept_invalid_certs: self.insecure_skip_verify,
        }
    }

    pub fn materializer(&self) -> SecretMaterializer {
        SecretMaterializer::new(&self.secrets_folder)
    }

    fn require<'a>(&self, key: &str, value: Option<&'a str>) -> Result<&'a str> {
        value.ok_or_else(|| {
            let source = self
                .config_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| format!("$HOME/{}", DEFAULT_CONFIG_FILE_NAME));
            DsmError::config_field(
                format!("'{}' must be defined as env var or in config file {}", key, source),
                key,
            )
        })
    }
}

/// Read a flat YAML mapping into upper-cased keys.
fn read_config_file(path: &Path, required: bool) -> Result<BTreeMap<String, String>> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => {
            debug!(path = %path.display(), "No config file found, using environment only");
            return Ok(BTreeMap::new());
        }
        Err(e) => {
            return Err(DsmError::config_field(
                format!("Failed to read config file '{}': {}", path.display(), e),
                CONFIG_FILE_KEY,
            ))
        }
    };

    let document: serde_yaml::Value = serde_yaml::from_str(&contents).map_err(|e| {
        DsmError::config_field(
            format!("Invalid yaml syntax on config file '{}': {}", path.display(), e),
            CONFIG_FILE_KEY,
        )
    })?;

    let mapping = match document {
        serde_yaml::Value::Null => return Ok(BTreeMap::new()),
        serde_yaml::Value::Mapping(mapping) => mapping,
        _ => {
            return Err(DsmError::config_field(
                format!("Config file '{}' must contain a mapping of keys to values", path.display()),
                CONFIG_FILE_KEY,
            ))
        }
    };

    let mut values = BTreeMap::new();
    for (key, value) in mapping {
        let Some(key) = key.as_str().map(str::to_uppercase) else {
            continue;
        };
        let value = match value {
            serde_yaml::Value::Null => continue,
            serde_yaml::Value::String(s) => s,
            serde_yaml::Value::Bool(b) => b.to_string(),
            serde_yaml::Value::Number(n) => n.to_string(),
            _ => {
                return Err(DsmError::config_field(
                    format!("Config key '{}' in '{}' must be a scalar value", key, path.display()),
                    key,
                ))
            }
        };
        values.insert(key, value);
    }

    debug!(path = %path.display(), keys = values.len(), "Loaded config file");
    Ok(values)
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(DsmError::config_field(format!("{} must be a boolean, got '{}'", key, raw), key)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_file_or_env() {
        let settings = AgentSettings::load_with(None, env_from(&[])).unwrap();
        assert_eq!(settings.secrets_folder, PathBuf::from("/var/run/secrets"));
        assert_eq!(settings.secrets_file, PathBuf::from(".runb.vars"));
        assert_eq!(settings.request_timeout_secs, 30);
        assert!(settings.insecure_skip_verify);
        assert!(!settings.runb_disabled);
        assert!(settings.config_path.is_none());
    }

    #[test]
    fn test_missing_home_config_is_optional() {
        let home = TempDir::new().unwrap();
        let settings = AgentSettings::load_with(
            None,
            env_from(&[("HOME", home.path().to_str().unwrap())]),
        )
        .unwrap();
        assert_eq!(settings.config_path, Some(home.path().join(".config.yaml")));
    }

    #[test]
    fn test_file_values_with_env_overlay() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dsm.yaml");
        std::fs::write(
            &path,
            "senhasegura_url: https://file.example.com\n\
             SENHASEGURA_CLIENT_ID: file-id\n\
             SENHASEGURA_CLIENT_SECRET: file-secret\n\
             SENHASEGURA_REQUEST_TIMEOUT: 45\n\
             SENHASEGURA_INSECURE_SKIP_VERIFY: false\n",
        )
        .unwrap();

        let settings = AgentSettings::load_with(
            Some(&path),
            env_from(&[(CLIENT_ID_KEY, "env-id"), (CLIENT_SECRET_KEY, "")]),
        )
        .unwrap();

        assert_eq!(settings.url.as_deref(), Some("https://file.example.com"));
        assert_eq!(settings.client_id.as_deref(), Some("env-id"));
        assert_eq!(settings.client_secret.as_ref().unwrap().expose_secret(), "file-secret");
        assert_eq!(settings.request_timeout_secs, 45);
        assert!(!settings.insecure_skip_verify);

        let options = settings.client_options();
        assert_eq!(options.timeout, Duration::from_secs(45));
        assert!(!options.accept_invalid_certs);
    }

    #[test]
    fn test_config_file_from_env_var() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("agent.yaml");
        std::fs::write(&path, "SENHASEGURA_SECRETS_FOLDER: /tmp/secrets\nRUNB_DISABLED: 1\n").unwrap();

        let settings = AgentSettings::load_with(
            None,
            env_from(&[(CONFIG_FILE_KEY, path.to_str().unwrap())]),
        )
        .unwrap();
        assert_eq!(settings.secrets_folder, PathBuf::from("/tmp/secrets"));
        assert!(settings.runb_disabled);
        assert_eq!(settings.materializer().root(), Path::new("/tmp/secrets"));
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let dir = TempDir::new().unwrap();
        let err = AgentSettings::load_with(Some(&dir.path().join("nope.yaml")), env_from(&[]))
            .unwrap_err();
        assert!(matches!(err, DsmError::Config { .. }));
    }

    #[test]
    fn test_invalid_yaml_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.yaml");
        std::fs::write(&path, "SENHASEGURA_URL: [unclosed\n").unwrap();

        let err = AgentSettings::load_with(Some(&path), env_from(&[])).unwrap_err();
        assert!(err.to_string().contains("Invalid yaml syntax"));
    }

    #[test]
    fn test_timeout_out_of_range_fails_validation() {
        let err = AgentSettings::load_with(None, env_from(&[(REQUEST_TIMEOUT_KEY, "0")])).unwrap_err();
        assert!(matches!(err, DsmError::Config { .. }));

        let err =
            AgentSettings::load_with(None, env_from(&[(REQUEST_TIMEOUT_KEY, "601")])).unwrap_err();
        assert!(matches!(err, DsmError::Config { .. }));

        let err =
            AgentSettings::load_with(None, env_from(&[(REQUEST_TIMEOUT_KEY, "soon")])).unwrap_err();
        assert!(matches!(err, DsmError::Config { .. }));
    }

    #[test]
    fn test_credential_requires_every_key() {
        let settings = AgentSettings::load_with(
            None,
            env_from(&[(URL_KEY, "https://dsm.example.com"), (CLIENT_ID_KEY, "id")]),
        )
        .unwrap();

        let err = settings.credential().unwrap_err();
        assert!(err.to_string().contains("'SENHASEGURA_CLIENT_SECRET' must be defined"));

        let settings = AgentSettings::load_with(
            None,
            env_from(&[
                (URL_KEY, "https://dsm.example.com"),
                (CLIENT_ID_KEY, "id"),
                (CLIENT_SECRET_KEY, "secret"),
            ]),
        )
        .unwrap();
        let credential = settings.credential().unwrap();
        assert_eq!(credential.client_id(), "id");
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("K", "TRUE").unwrap());
        assert!(!parse_bool("K", "0").unwrap());
        assert!(parse_bool("K", "maybe").is_err());
    }
}
