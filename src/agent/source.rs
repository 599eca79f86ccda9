//! Where the refresh loop gets its secrets from.

use async_trait::async_trait;

use crate::dsm::ApplicationClient;
use crate::errors::Result;
use crate::secrets::SecretSet;

/// Fetches the current secret set of one application
#[async_trait]
pub trait SecretSource: Send {
    async fn fetch_secrets(&mut self) -> Result<SecretSet>;
}

#[async_trait]
impl SecretSource for ApplicationClient {
    async fn fetch_secrets(&mut self) -> Result<SecretSet> {
        self.get_secrets().await
    }
}
