//! Mock DSM server for integration tests
//!
//! Two identities are modelled: the bootstrap credentials from configuration
//! and the application credentials issued on registration. Each gets its own
//! bearer token so tests can tell which identity made a call.

#![allow(dead_code)]

use std::path::Path;

use dsm_agent::AgentSettings;
use serde_json::{json, Value};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const BOOTSTRAP_ID: &str = "bootstrap-id";
pub const BOOTSTRAP_SECRET: &str = "bootstrap-secret";
pub const BOOTSTRAP_TOKEN: &str = "bootstrap-token";

pub const APP_ID: &str = "app-id";
pub const APP_SIGNATURE: &str = "app-signature";
pub const APP_TOKEN: &str = "app-token";

pub const TOKEN_PATH: &str = "/iso/oauth2/token";
pub const APPLICATION_PATH: &str = "/iso/dapp/Application";
pub const VARIABLES_PATH: &str = "/iso/cicd/variables";

pub struct MockDsm {
    pub server: MockServer,
}

impl MockDsm {
    /// Start a server that issues tokens for both identities.
    pub async fn start() -> Self {
        let server = MockServer::start().await;

        for (client_id, token) in [(BOOTSTRAP_ID, BOOTSTRAP_TOKEN), (APP_ID, APP_TOKEN)] {
            Mock::given(method("POST"))
                .and(path(TOKEN_PATH))
                .and(body_string_contains(format!("client_id={}", client_id)))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "access_token": token,
                    "token_type": "Bearer",
                    "expires_in": 3600
                })))
                .mount(&server)
                .await;
        }

        Self { server }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// Registration of billing/prod/erp issues the application identity.
    pub async fn mount_registration(&self) {
        Mock::given(method("POST"))
            .and(path(APPLICATION_PATH))
            .and(header("authorization", format!("Bearer {}", BOOTSTRAP_TOKEN).as_str()))
            .and(body_string_contains("application=billing"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": APP_ID,
                "signature": APP_SIGNATURE,
                "response": {"status": 200, "message": "", "error": false, "error_code": 0}
            })))
            .mount(&self.server)
            .await;
    }

    /// Secret lookup answering only callers holding `token`.
    pub async fn mount_secrets(&self, token: &str, secrets: Value) {
        Mock::given(method("GET"))
            .and(path(APPLICATION_PATH))
            .and(header("authorization", format!("Bearer {}", token).as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "response": {"status": 200, "error": false},
                "application": {
                    "name": "billing",
                    "system": "erp",
                    "Environment": "prod",
                    "secrets": secrets
                }
            })))
            .mount(&self.server)
            .await;
    }

    pub async fn mount_variables(&self) {
        Mock::given(method("POST"))
            .and(path(VARIABLES_PATH))
            .and(header("authorization", format!("Bearer {}", APP_TOKEN).as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "response": {"status": 200, "error": false}
            })))
            .expect(1)
            .mount(&self.server)
            .await;
    }

    /// Settings pointing at this server with the bootstrap identity.
    pub fn settings(&self, root: &Path) -> AgentSettings {
        AgentSettings {
            url: Some(self.uri()),
            client_id: Some(BOOTSTRAP_ID.to_string()),
            client_secret: Some(BOOTSTRAP_SECRET.into()),
            secrets_folder: root.to_path_buf(),
            secrets_file: root.join(".runb.vars"),
            ..Default::default()
        }
    }
}

pub fn database_secrets() -> Value {
    json!([
        {
            "secret_id": "1",
            "secret_name": "database",
            "identity": "database",
            "version": "2",
            "expiration_date": null,
            "engine": "generic",
            "data": [{"DB_USER": "billing"}, {"DB_PASSWORD": "s3cr3t", "TTL": "30"}]
        },
        {
            "secret_id": "2",
            "identity": "api",
            "data": [{"API_KEY": "k-123"}]
        }
    ])
}

pub fn read(root: &Path, relative: &str) -> String {
    std::fs::read_to_string(root.join(relative)).unwrap()
}
