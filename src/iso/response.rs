//! Response shapes returned by the DSM ISO API.
//!
//! Every DSM response shares an envelope: an optional top-level
//! `error`/`message` pair and a nested `response` status block. The concrete
//! payload depends on the endpoint, so responses are modelled as a closed set
//! of variants ([`ApiResponse`]) decoded and validated by one operation,
//! [`ApiResponse::decode`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{DsmError, Result};
use crate::secrets::{SecretSet, SecretString};
use crate::utils::nullable;

/// Nested `response` block present on every DSM reply
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseStatus {
    #[serde(default, deserialize_with = "nullable")]
    pub status: i64,

    #[serde(default, deserialize_with = "nullable")]
    pub message: String,

    #[serde(default, deserialize_with = "nullable")]
    pub error: bool,

    #[serde(default, deserialize_with = "nullable")]
    pub error_code: i64,
}

/// Fields shared by all DSM responses
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default, deserialize_with = "nullable")]
    pub error: String,

    #[serde(default, deserialize_with = "nullable")]
    pub message: String,

    #[serde(default, deserialize_with = "nullable")]
    pub response: ResponseStatus,
}

impl Envelope {
    /// Fail if either error indicator is set.
    ///
    /// A non-empty top-level `error` is surfaced verbatim as the API error
    /// message (with `message` kept as detail); otherwise `response.error`
    /// surfaces `response.message`.
    pub fn validate(&self) -> Result<()> {
        if !self.error.is_empty() {
            return Err(DsmError::Api {
                message: self.error.clone(),
                detail: non_empty(&self.message),
                status: non_zero(self.response.status),
                error_code: non_zero(self.response.error_code),
            });
        }

        if self.response.error {
            let message = if self.response.message.is_empty() {
                format!("DSM reported an error (status {})", self.response.status)
            } else {
                self.response.message.clone()
            };
            return Err(DsmError::Api {
                message,
                detail: None,
                status: non_zero(self.response.status),
                error_code: non_zero(self.response.error_code),
            });
        }

        Ok(())
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

fn non_zero(value: i64) -> Option<i64> {
    (value != 0).then_some(value)
}

/// Reply of the client-credentials exchange at `/iso/oauth2/token`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenResponse {
    #[serde(flatten)]
    pub envelope: Envelope,

    #[serde(default)]
    pub access_token: SecretString,

    #[serde(default, deserialize_with = "nullable")]
    pub token_type: String,

    #[serde(default, deserialize_with = "nullable")]
    pub expires_in: i64,
}

/// Application entity embedded in registration and lookup replies
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Application {
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,

    #[serde(default, deserialize_with = "nullable")]
    pub description: String,

    #[serde(default, deserialize_with = "nullable")]
    pub tags: Vec<String>,

    #[serde(default, deserialize_with = "nullable")]
    pub system: String,

    #[serde(rename = "Environment", alias = "environment", default, deserialize_with = "nullable")]
    pub environment: String,

    #[serde(default)]
    pub secrets: Option<SecretSet>,
}

/// Reply of `/iso/dapp/Application` (POST registers, GET looks up)
///
/// On registration `id`/`signature` carry the application scoped client
/// credentials issued by DSM.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApplicationResponse {
    #[serde(flatten)]
    pub envelope: Envelope,

    #[serde(default, deserialize_with = "nullable")]
    pub id: String,

    #[serde(default)]
    pub signature: SecretString,

    #[serde(default)]
    pub application: Option<Application>,
}

/// Reply of `/iso/cicd/variables`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VariableResponse {
    #[serde(flatten)]
    pub envelope: Envelope,
}

/// Which response shape a request expects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    Token,
    Application,
    Variable,
}

impl fmt::Display for ResponseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseKind::Token => write!(f, "token"),
            ResponseKind::Application => write!(f, "application"),
            ResponseKind::Variable => write!(f, "variable"),
        }
    }
}

/// A decoded and validated DSM response
#[derive(Debug, Clone)]
pub enum ApiResponse {
    Token(TokenResponse),
    Application(ApplicationResponse),
    Variable(VariableResponse),
}

impl ApiResponse {
    /// Decode `body` as the shape named by `kind`, then validate its envelope.
    pub fn decode(kind: ResponseKind, body: &[u8]) -> Result<Self> {
        let context = || format!("Failed to decode DSM {} response", kind);
        let response = match kind {
            ResponseKind::Token => ApiResponse::Token(
                serde_json::from_slice(body).map_err(|e| DsmError::serialization(e, context()))?,
            ),
            ResponseKind::Application => ApiResponse::Application(
                serde_json::from_slice(body).map_err(|e| DsmError::serialization(e, context()))?,
            ),
            ResponseKind::Variable => ApiResponse::Variable(
                serde_json::from_slice(body).map_err(|e| DsmError::serialization(e, context()))?,
            ),
        };

        response.validate()?;
        Ok(response)
    }

    pub fn kind(&self) -> ResponseKind {
        match self {
            ApiResponse::Token(_) => ResponseKind::Token,
            ApiResponse::Application(_) => ResponseKind::Application,
            ApiResponse::Variable(_) => ResponseKind::Variable,
        }
    }

    pub fn envelope(&self) -> &Envelope {
        match self {
            ApiResponse::Token(r) => &r.envelope,
            ApiResponse::Application(r) => &r.envelope,
            ApiResponse::Variable(r) => &r.envelope,
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.envelope().validate()
    }

    pub fn into_token(self) -> Result<TokenResponse> {
        match self {
            ApiResponse::Token(r) => Ok(r),
            other => Err(unexpected(ResponseKind::Token, other.kind())),
        }
    }

    pub fn into_application(self) -> Result<ApplicationResponse> {
        match self {
            ApiResponse::Application(r) => Ok(r),
            other => Err(unexpected(ResponseKind::Application, other.kind())),
        }
    }

    pub fn into_variable(self) -> Result<VariableResponse> {
        match self {
            ApiResponse::Variable(r) => Ok(r),
            other => Err(unexpected(ResponseKind::Variable, other.kind())),
        }
    }
}

fn unexpected(expected: ResponseKind, got: ResponseKind) -> DsmError {
    DsmError::api(format!("expected a {} response but decoded a {} response", expected, got))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_envelope_validates() {
        let body = br#"{"error": "", "message": "", "response": {"status": 200, "error": false}}"#;
        let response = ApiResponse::decode(ResponseKind::Variable, body).unwrap();
        assert_eq!(response.kind(), ResponseKind::Variable);
        assert_eq!(response.envelope().response.status, 200);
    }

    #[test]
    fn test_missing_envelope_fields_validate() {
        let response = ApiResponse::decode(ResponseKind::Variable, b"{}").unwrap();
        assert!(response.validate().is_ok());

        let body = br#"{"error": null, "message": null, "response": null}"#;
        assert!(ApiResponse::decode(ResponseKind::Variable, body).is_ok());
    }

    #[test]
    fn test_top_level_error_surfaces_error_value() {
        let body = br#"{"error": "invalid_client", "message": "Client authentication failed"}"#;
        let err = ApiResponse::decode(ResponseKind::Token, body).unwrap_err();
        assert_eq!(err.api_message(), Some("invalid_client"));
        if let DsmError::Api { detail, .. } = err {
            assert_eq!(detail.as_deref(), Some("Client authentication failed"));
        } else {
            panic!("expected api error");
        }
    }

    #[test]
    fn test_response_error_flag_surfaces_nested_message() {
        let body = br#"{"response": {"status": 429, "message": "quota exceeded", "error": true, "error_code": 1042}}"#;
        let err = ApiResponse::decode(ResponseKind::Application, body).unwrap_err();
        match err {
            DsmError::Api { message, status, error_code, .. } => {
                assert_eq!(message, "quota exceeded");
                assert_eq!(status, Some(429));
                assert_eq!(error_code, Some(1042));
            }
            other => panic!("expected api error, got {:?}", other),
        }
    }

    #[test]
    fn test_token_response_decodes() {
        let body = br#"{"access_token": "abc", "token_type": "Bearer", "expires_in": 3600}"#;
        let token = ApiResponse::decode(ResponseKind::Token, body).unwrap().into_token().unwrap();
        assert_eq!(token.access_token.expose_secret(), "abc");
        assert_eq!(token.token_type, "Bearer");
        assert_eq!(token.expires_in, 3600);
    }

    #[test]
    fn test_application_response_decodes_secrets() {
        let body = br#"{
            "id": "app-client",
            "signature": "app-signature",
            "response": {"status": 200, "error": false},
            "application": {
                "name": "billing",
                "system": "erp",
                "Environment": "prod",
                "tags": null,
                "secrets": [{"identity": "db", "data": [{"DB_PASSWORD": "x"}]}]
            }
        }"#;

        let app = ApiResponse::decode(ResponseKind::Application, body)
            .unwrap()
            .into_application()
            .unwrap();
        assert_eq!(app.id, "app-client");
        assert_eq!(app.signature.expose_secret(), "app-signature");

        let application = app.application.unwrap();
        assert_eq!(application.environment, "prod");
        assert!(application.tags.is_empty());
        assert_eq!(application.secrets.unwrap().len(), 1);
    }

    #[test]
    fn test_invalid_json_is_serialization_error() {
        let err = ApiResponse::decode(ResponseKind::Token, b"<html>").unwrap_err();
        assert!(matches!(err, DsmError::Serialization { .. }));
    }

    #[test]
    fn test_unexpected_variant() {
        let response = ApiResponse::decode(ResponseKind::Variable, b"{}").unwrap();
        assert!(matches!(response.into_token(), Err(DsmError::Api { .. })));
    }
}
