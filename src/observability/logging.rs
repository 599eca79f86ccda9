//! # Structured Logging
//!
//! Subscriber setup and span macros built on the tracing ecosystem.
//!
//! Every HTTP exchange with DSM runs inside a `dsm_request` span and every
//! refresh cycle inside a `refresh_cycle` span. Each carries a fresh UUID so
//! the log lines of one request or cycle can be grouped, including in JSON
//! output where span fields are emitted alongside the event.

use tracing_subscriber::EnvFilter;

use crate::config::AgentSettings;

/// Create a tracing span for a DSM request.
///
/// ```rust,ignore
/// let span = request_span!("POST", "/iso/oauth2/token");
/// let span = request_span!("GET", "/iso/dapp/Application", application = "billing");
/// ```
#[macro_export]
macro_rules! request_span {
    ($method:expr, $path:expr) => {
        tracing::info_span!(
            "dsm_request",
            method = %$method,
            path = %$path,
            request_id = %uuid::Uuid::new_v4()
        )
    };
    ($method:expr, $path:expr, $($field:tt)*) => {
        tracing::info_span!(
            "dsm_request",
            method = %$method,
            path = %$path,
            request_id = %uuid::Uuid::new_v4(),
            $($field)*
        )
    };
}

/// Create a tracing span for one fetch and materialize cycle.
#[macro_export]
macro_rules! cycle_span {
    () => {
        tracing::info_span!("refresh_cycle", cycle_id = %uuid::Uuid::new_v4())
    };
    ($($field:tt)*) => {
        tracing::info_span!("refresh_cycle", cycle_id = %uuid::Uuid::new_v4(), $($field)*)
    };
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins when set; otherwise the level is `info`, or `debug` with
/// `verbose`. Output goes to stderr so command output on stdout stays clean.
pub fn init_logging(verbose: bool, json: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder =
        tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);

    let result = if json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };

    if result.is_err() {
        // Subscriber already set elsewhere (e.g. integration tests); ignore.
    }
}

/// Log the effective settings at startup. Secrets are never included.
pub fn log_settings_info(settings: &AgentSettings) {
    tracing::info!(
        url = settings.url.as_deref().unwrap_or("<unset>"),
        client_id = settings.client_id.as_deref().unwrap_or("<unset>"),
        secrets_folder = %settings.secrets_folder.display(),
        request_timeout_secs = settings.request_timeout_secs,
        insecure_skip_verify = settings.insecure_skip_verify,
        config_file = ?settings.config_path,
        "DSM agent configuration"
    );
}
