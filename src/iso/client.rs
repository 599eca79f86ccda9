//! HTTP client for the DSM ISO API.
//!
//! Owns the transport [`Credential`] and performs the client-credentials
//! exchange. Every call is a single request/response exchange; retries are
//! the refresh loop's business.

use std::time::Duration;

use reqwest::{Client, Method};
use tracing::{debug, warn, Instrument};

use super::credential::Credential;
use super::response::{ApiResponse, ResponseKind};
use crate::errors::{DsmError, Result};

/// OAuth2 token endpoint
pub const TOKEN_PATH: &str = "/iso/oauth2/token";

/// Longest slice of an unparseable body echoed into an error message
const BODY_SNIPPET_LEN: usize = 200;

/// HTTP client options
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Per-request timeout
    pub timeout: Duration,

    /// Skip TLS certificate verification. DSM appliances commonly run with
    /// self-signed certificates, so this is on unless configured otherwise.
    pub accept_invalid_certs: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self { timeout: Duration::from_secs(30), accept_invalid_certs: true }
    }
}

/// Authenticated client for the DSM ISO API
#[derive(Debug, Clone)]
pub struct IsoClient {
    http: Client,
    credential: Credential,
}

impl IsoClient {
    /// Create a new client. No network call is made.
    pub fn new(credential: Credential, options: &ClientOptions) -> Result<Self> {
        if options.accept_invalid_certs {
            warn!(
                url = %credential.url(),
                "TLS certificate verification is disabled for DSM requests"
            );
        }

        let http = Client::builder()
            .timeout(options.timeout)
            .danger_accept_invalid_certs(options.accept_invalid_certs)
            .user_agent(concat!("dsm-agent/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DsmError::transport_with_source("Failed to build HTTP client", e))?;

        Ok(Self { http, credential })
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Exchange the active client credentials for a bearer token.
    ///
    /// On success the token replaces any previous one and is sent on every
    /// following call. Failures are returned to the caller; nothing here ends
    /// the process.
    pub async fn authenticate(&mut self) -> Result<()> {
        debug!(client_id = %self.credential.client_id(), "Trying to authenticate on DSM");

        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.credential.client_id()),
            ("client_secret", self.credential.client_secret().expose_secret()),
        ];

        let token = match self.call(Method::POST, TOKEN_PATH, Some(&form), ResponseKind::Token, false).await
        {
            Ok(response) => response.into_token()?,
            Err(e) => {
                warn!(error = %e, "Error trying to authenticate");
                return Err(e);
            }
        };

        if token.access_token.is_empty() {
            return Err(DsmError::api("DSM returned an empty access token"));
        }

        debug!(token_type = %token.token_type, expires_in = token.expires_in, "Authenticated successfully");
        self.credential.set_bearer_token(token.access_token);
        Ok(())
    }

    /// Replace the active client id/secret pair.
    pub fn define_new_credentials(&mut self, client_id: &str, client_secret: &str) -> Result<()> {
        self.credential.define_new_credentials(client_id, client_secret)
    }

    /// POST a form-encoded body and decode the reply as `kind`.
    pub async fn post_form(
        &self,
        resource: &str,
        form: &[(&str, &str)],
        kind: ResponseKind,
    ) -> Result<ApiResponse> {
        self.call(Method::POST, resource, Some(form), kind, true).await
    }

    /// GET a resource and decode the reply as `kind`.
    pub async fn get(&self, resource: &str, kind: ResponseKind) -> Result<ApiResponse> {
        self.call(Method::GET, resource, None, kind, true).await
    }

    async fn call(
        &self,
        method: Method,
        resource: &str,
        form: Option<&[(&str, &str)]>,
        kind: ResponseKind,
        authorized: bool,
    ) -> Result<ApiResponse> {
        let url = self.credential.resource_url(resource);
        let span = crate::request_span!(method, resource);

        let mut request = self.http.request(method, url);
        if authorized {
            if let Some(token) = self.credential.bearer_token() {
                request = request.bearer_auth(token.expose_secret());
            }
        }
        if let Some(form) = form {
            request = request.form(form);
        }

        async move {
            let response = request.send().await?;
            let status = response.status();
            debug!(status = %status, "Response status");

            let body = response.bytes().await?;

            match ApiResponse::decode(kind, &body) {
                Err(DsmError::Serialization { .. }) if !status.is_success() => Err(DsmError::Api {
                    message: format!("DSM responded with HTTP {}: {}", status, snippet(&body)),
                    detail: None,
                    status: Some(i64::from(status.as_u16())),
                    error_code: None,
                }),
                other => other,
            }
        }
        .instrument(span)
        .await
    }
}

fn snippet(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.len() <= BODY_SNIPPET_LEN {
        text.to_string()
    } else {
        let mut end = BODY_SNIPPET_LEN;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &text[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> IsoClient {
        let credential = Credential::new(&server.uri(), "client-id", "client-secret").unwrap();
        IsoClient::new(credential, &ClientOptions::default()).unwrap()
    }

    #[test]
    fn test_client_options_default() {
        let options = ClientOptions::default();
        assert_eq!(options.timeout, Duration::from_secs(30));
        assert!(options.accept_invalid_certs);
    }

    #[tokio::test]
    async fn test_authenticate_stores_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .and(body_string_contains("grant_type=client_credentials"))
            .and(body_string_contains("client_id=client-id"))
            .and(body_string_contains("client_secret=client-secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "token-1",
                "token_type": "Bearer",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut client = client_for(&server);
        client.authenticate().await.unwrap();
        assert_eq!(client.credential().bearer_token().unwrap().expose_secret(), "token-1");
    }

    #[tokio::test]
    async fn test_authenticate_surfaces_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": "invalid_client",
                "message": "Client authentication failed"
            })))
            .mount(&server)
            .await;

        let mut client = client_for(&server);
        let err = client.authenticate().await.unwrap_err();
        assert_eq!(err.api_message(), Some("invalid_client"));
        assert!(client.credential().bearer_token().is_none());
    }

    #[tokio::test]
    async fn test_authenticate_rejects_empty_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": ""})))
            .mount(&server)
            .await;

        let mut client = client_for(&server);
        assert!(matches!(client.authenticate().await, Err(DsmError::Api { .. })));
    }

    #[tokio::test]
    async fn test_authenticate_transport_failure_is_returned() {
        let server = MockServer::start().await;
        let uri = server.uri();
        drop(server);

        let credential = Credential::new(&uri, "client-id", "client-secret").unwrap();
        let options = ClientOptions { timeout: Duration::from_secs(2), ..Default::default() };
        let mut client = IsoClient::new(credential, &options).unwrap();

        let err = client.authenticate().await.unwrap_err();
        assert!(matches!(err, DsmError::Transport { .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_authorized_calls_send_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "tok"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/iso/dapp/Application"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "x"})))
            .expect(1)
            .mount(&server)
            .await;

        let mut client = client_for(&server);
        client.authenticate().await.unwrap();
        let response = client.get("/iso/dapp/Application", ResponseKind::Application).await.unwrap();
        assert_eq!(response.into_application().unwrap().id, "x");
    }

    #[tokio::test]
    async fn test_non_json_error_status_becomes_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/iso/dapp/Application"))
            .respond_with(ResponseTemplate::new(502).set_body_string("<html>Bad Gateway</html>"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.get("/iso/dapp/Application", ResponseKind::Application).await.unwrap_err();
        match &err {
            DsmError::Api { status, message, .. } => {
                assert_eq!(*status, Some(502));
                assert!(message.contains("Bad Gateway"));
            }
            other => panic!("expected api error, got {:?}", other),
        }
        assert!(err.is_retryable());
    }

    #[test]
    fn test_snippet_truncates() {
        let long = "x".repeat(500);
        let s = snippet(long.as_bytes());
        assert_eq!(s.len(), BODY_SNIPPET_LEN + 3);
        assert_eq!(snippet(b"  short  "), "short");
    }
}
