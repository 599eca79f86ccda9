//! TTL driven refresh loop.
//!
//! Each cycle fetches the secret set, materializes it and sleeps for the
//! set's minimum TTL. The sleep observes a [`CancellationToken`] so the loop
//! stops promptly on shutdown. Retryable failures back off exponentially; any
//! other failure ends the loop with that error.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Instrument};

use super::source::SecretSource;
use crate::errors::Result;
use crate::materialize::{MaterializeReport, SecretMaterializer};

/// Backoff applied to consecutive retryable failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Consecutive failures tolerated; the last one is returned to the caller
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_secs(5),
            max_backoff: Duration::from_secs(120),
            max_attempts: 5,
        }
    }
}

impl RetryPolicy {
    /// Delay after the `failures`-th consecutive failure (1-based).
    pub fn backoff(&self, failures: u32) -> Duration {
        let factor = 2u32.saturating_pow(failures.saturating_sub(1));
        self.initial_backoff.saturating_mul(factor).min(self.max_backoff)
    }
}

/// Outcome of one fetch and materialize cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleOutcome {
    pub next_refresh: Duration,
    pub report: MaterializeReport,
    /// Earliest `expiration_date` advertised by the fetched secrets
    pub earliest_expiration: Option<DateTime<Utc>>,
}

/// Drives the fetch, materialize, sleep cycle
#[derive(Debug)]
pub struct TtlScheduler<S> {
    source: S,
    materializer: SecretMaterializer,
    retry: RetryPolicy,
}

impl<S: SecretSource> TtlScheduler<S> {
    pub fn new(source: S, materializer: SecretMaterializer) -> Self {
        Self { source, materializer, retry: RetryPolicy::default() }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn materializer(&self) -> &SecretMaterializer {
        &self.materializer
    }

    /// Fetch and materialize once, returning the next refresh interval.
    pub async fn run_once(&mut self) -> Result<CycleOutcome> {
        let secrets = self.source.fetch_secrets().await?;
        let report = self.materializer.write_secret_set(&secrets).await?;
        Ok(CycleOutcome {
            next_refresh: secrets.min_ttl(),
            report,
            earliest_expiration: secrets.earliest_expiration(),
        })
    }

    /// Loop until `shutdown` is cancelled or a cycle fails for good.
    ///
    /// Cancellation is observed between cycles and during every sleep; a
    /// cycle already in flight is allowed to finish.
    pub async fn run(&mut self, shutdown: CancellationToken) -> Result<()> {
        let mut failures: u32 = 0;

        loop {
            if shutdown.is_cancelled() {
                info!("Shutdown requested, stopping secret refresh");
                return Ok(());
            }

            let delay = match self.run_once().instrument(crate::cycle_span!()).await {
                Ok(outcome) => {
                    failures = 0;
                    if let Some(expires_at) = outcome.earliest_expiration {
                        info!(expires_at = %expires_at.to_rfc3339(), "Earliest secret expiration");
                    }
                    info!(
                        next_update_secs = outcome.next_refresh.as_secs(),
                        "Next update in {} seconds",
                        outcome.next_refresh.as_secs()
                    );
                    outcome.next_refresh
                }
                Err(e) if e.is_retryable() && failures + 1 < self.retry.max_attempts => {
                    failures += 1;
                    let backoff = self.retry.backoff(failures);
                    warn!(
                        error = %e,
                        attempt = failures,
                        backoff_secs = backoff.as_secs(),
                        "Secret refresh failed, retrying"
                    );
                    backoff
                }
                Err(e) => {
                    error!(error = %e, "Secret refresh failed");
                    return Err(e);
                }
            };

            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested, stopping secret refresh");
                    return Ok(());
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}
