//! # Secret materialization
//!
//! Writes DSM output under the configured secrets folder:
//!
//! - `<root>/senhasegura/iso/{SENHASEGURA_URL, SENHASEGURA_CLIENT_ID, SENHASEGURA_CLIENT_SECRET}`
//!   for the application scoped credentials issued on registration
//! - `<root>/senhasegura/<identity>/<key>` with one file per secret data entry
//!
//! `<root>/senhasegura` itself is never removed or renamed, so it may be a
//! volume mount. Secret sets are written into a fresh version directory and
//! published by flipping one symlink:
//!
//! ```text
//! senhasegura/
//!   ..2026_10_17_08_30_00.000000000_1a2b3c4d/db/PASSWORD
//!   ..data -> ..2026_10_17_08_30_00.000000000_1a2b3c4d
//!   db -> ..data/db
//! ```
//!
//! Renaming a symlink over `..data` is atomic, so a reader of
//! `senhasegura/<identity>/<key>` sees either the old set or the new one.
//! The version before the current one is kept until the next refresh so
//! readers that already resolved `..data` can finish.

mod writer;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::{DsmError, Result};
use crate::secrets::{SecretSet, SecretString};
use crate::utils::validate_path_component;

pub const SECRETS_DIR: &str = "senhasegura";
pub const CREDENTIALS_DIR: &str = "iso";

pub const URL_FILE: &str = "SENHASEGURA_URL";
pub const CLIENT_ID_FILE: &str = "SENHASEGURA_CLIENT_ID";
pub const CLIENT_SECRET_FILE: &str = "SENHASEGURA_CLIENT_SECRET";

/// Prefix of every entry the materializer keeps for itself.
const INTERNAL_PREFIX: &str = "..";
const DATA_LINK: &str = "..data";
const DATA_LINK_TMP: &str = "..data_tmp";

/// What a secret-set write produced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaterializeReport {
    /// Identity directories created
    pub directories: usize,
    /// Distinct files written
    pub files: usize,
}

/// Writes credentials and secret sets below a root folder.
///
/// Assumes it is the only writer of `<root>/senhasegura`.
#[derive(Debug, Clone)]
pub struct SecretMaterializer {
    root: PathBuf,
}

impl SecretMaterializer {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/senhasegura`
    pub fn secrets_dir(&self) -> PathBuf {
        self.root.join(SECRETS_DIR)
    }

    /// `<root>/senhasegura/iso`
    pub fn credentials_dir(&self) -> PathBuf {
        self.secrets_dir().join(CREDENTIALS_DIR)
    }

    /// Write the three credential files, overwriting existing ones.
    pub async fn write_credentials(
        &self,
        url: &str,
        client_id: &str,
        client_secret: &SecretString,
    ) -> Result<PathBuf> {
        let dir = self.credentials_dir();
        info!(path = %dir.display(), "Adding credentials to system");

        // An `iso` identity from an earlier secret set is a link into a version
        if writer::is_symlink(&dir).await? {
            writer::remove_entry(&dir).await?;
        }

        writer::create_dir_all(&dir).await?;
        writer::write_file(&dir.join(URL_FILE), url.as_bytes()).await?;
        writer::write_file(&dir.join(CLIENT_ID_FILE), client_id.as_bytes()).await?;
        writer::write_file(&dir.join(CLIENT_SECRET_FILE), client_secret.expose_secret().as_bytes())
            .await?;

        Ok(dir)
    }

    /// Replace the contents of `<root>/senhasegura` with `secrets`.
    ///
    /// Identities and data keys are validated before anything touches the
    /// disk. A failure before the `..data` flip leaves the previously
    /// materialized set untouched.
    pub async fn write_secret_set(&self, secrets: &SecretSet) -> Result<MaterializeReport> {
        let identities = validate(secrets)?;

        let live = self.secrets_dir();
        writer::create_dir_all(&live).await?;

        let previous = writer::read_link_if_exists(&live.join(DATA_LINK)).await?;

        let version = version_name();
        let version_dir = live.join(&version);
        let report = match populate(&version_dir, secrets).await {
            Ok(report) => report,
            Err(e) => {
                discard(&version_dir).await;
                return Err(e);
            }
        };

        if let Err(e) = point_data_at(&live, &version).await {
            discard(&version_dir).await;
            return Err(e);
        }

        publish(&live, &identities).await?;
        prune(&live, &version, previous.as_deref()).await;

        info!(
            path = %live.display(),
            version = %version,
            directories = report.directories,
            files = report.files,
            "Secrets materialized"
        );
        Ok(report)
    }
}

fn validate(secrets: &SecretSet) -> Result<BTreeSet<&str>> {
    let mut identities = BTreeSet::new();
    for record in secrets {
        validate_path_component(&record.identity, "identity")?;
        if record.identity.starts_with(INTERNAL_PREFIX) {
            return Err(DsmError::config_field(
                format!("identity '{}' cannot start with '{}'", record.identity, INTERNAL_PREFIX),
                "identity",
            ));
        }
        for (key, _) in record.entries() {
            validate_path_component(key, "data key")?;
        }
        identities.insert(record.identity.as_str());
    }
    Ok(identities)
}

fn version_name() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!(
        "{}{}_{}",
        INTERNAL_PREFIX,
        Utc::now().format("%Y_%m_%d_%H_%M_%S%.9f"),
        &id[..8]
    )
}

async fn populate(version_dir: &Path, secrets: &SecretSet) -> Result<MaterializeReport> {
    writer::create_dir_all(version_dir).await?;

    let mut directories = BTreeSet::new();
    let mut files = BTreeSet::new();

    for record in secrets {
        let dir = version_dir.join(&record.identity);
        if directories.insert(record.identity.as_str()) {
            writer::create_dir_all(&dir).await?;
        }

        for (key, content) in record.entries() {
            writer::write_file(&dir.join(key), content.as_bytes()).await?;
            files.insert((record.identity.as_str(), key));
        }

        debug!(identity = %record.identity, "Secret staged");
    }

    Ok(MaterializeReport { directories: directories.len(), files: files.len() })
}

/// Atomically repoint `..data` at `version`.
async fn point_data_at(live: &Path, version: &str) -> Result<()> {
    let tmp = live.join(DATA_LINK_TMP);
    writer::remove_entry(&tmp).await?;
    writer::symlink_dir(Path::new(version), &tmp).await?;

    if let Err(e) = writer::rename(&tmp, &live.join(DATA_LINK)).await {
        discard(&tmp).await;
        return Err(e);
    }
    Ok(())
}

/// Link every identity through `..data` and drop entries no longer served.
async fn publish(live: &Path, identities: &BTreeSet<&str>) -> Result<()> {
    for identity in identities {
        let link = live.join(identity);
        if writer::is_symlink(&link).await? {
            continue;
        }
        // Plain directories come from credential mode or older layouts
        writer::remove_entry(&link).await?;
        writer::symlink_dir(&Path::new(DATA_LINK).join(identity), &link).await?;
    }

    for name in writer::list_names(live).await? {
        let keep = name.to_str().is_some_and(|name| {
            name.starts_with(INTERNAL_PREFIX) || identities.contains(name)
        });
        if !keep {
            writer::remove_entry(&live.join(&name)).await?;
        }
    }
    Ok(())
}

/// Remove version directories other than the current and previous one.
async fn prune(live: &Path, current: &str, previous: Option<&Path>) {
    let names = match writer::list_names(live).await {
        Ok(names) => names,
        Err(e) => {
            warn!(error = %e, "Failed to list old secret versions");
            return;
        }
    };

    for name in names {
        let Some(name) = name.to_str() else { continue };
        if !name.starts_with(INTERNAL_PREFIX)
            || name == DATA_LINK
            || name == DATA_LINK_TMP
            || name == current
            || previous.is_some_and(|p| p == Path::new(name))
        {
            continue;
        }
        discard(&live.join(name)).await;
    }
}

async fn discard(path: &Path) {
    if let Err(e) = writer::remove_entry(path).await {
        warn!(error = %e, "Failed to clean up old secret version");
    }
}
