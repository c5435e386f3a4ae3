//! JSON-over-HTTP record and metadata API clients.

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};

use crate::models::{Payload, RemoteId};
use crate::util::{compact_text, is_http_url, normalize_text_option};
use crate::{Error, Result};

use super::{MetadataApi, PhotoMetadata, RecordApi, RemoteError, RemoteResult};

/// Shared transport for the record and metadata endpoints.
#[derive(Clone)]
struct ApiClient {
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl ApiClient {
    fn new(base_url: &str, token: Option<String>) -> Result<Self> {
        let base_url = normalize_base_url(base_url)?;
        let client = reqwest::Client::builder()
            .build()
            .map_err(|error| Error::InvalidInput(format!("Failed to construct HTTP client: {error}")))?;
        Ok(Self {
            base_url,
            token: normalize_text_option(token),
            client,
        })
    }

    async fn send<B: Serialize + Sync>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> RemoteResult<reqwest::Response> {
        let url = format!("{}{path}", self.base_url);
        let mut request = self
            .client
            .request(method, url)
            .header("Accept", "application/json")
            .json(body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(map_status(status, &body))
    }

    async fn create<B: Serialize + Sync>(&self, path: &str, body: &B) -> RemoteResult<RemoteId> {
        let response = self.send(Method::POST, path, body).await?;
        let created = response.json::<CreatedResponse>().await?;
        created.into_remote_id()
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish_non_exhaustive()
    }
}

/// Record API at `{base}/v1/records`.
#[derive(Debug, Clone)]
pub struct HttpRecordApi {
    api: ApiClient,
}

impl HttpRecordApi {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self> {
        Ok(Self {
            api: ApiClient::new(base_url, token)?,
        })
    }
}

#[async_trait]
impl RecordApi for HttpRecordApi {
    async fn create(&self, payload: &Payload) -> RemoteResult<RemoteId> {
        self.api.create("/v1/records", payload).await
    }

    async fn update(&self, remote_id: &RemoteId, payload: &Payload) -> RemoteResult<()> {
        let path = format!("/v1/records/{}", urlencoding::encode(remote_id.as_str()));
        self.api.send(Method::PATCH, &path, payload).await?;
        Ok(())
    }
}

/// Photo metadata API at `{base}/v1/photos`.
#[derive(Debug, Clone)]
pub struct HttpMetadataApi {
    api: ApiClient,
}

impl HttpMetadataApi {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self> {
        Ok(Self {
            api: ApiClient::new(base_url, token)?,
        })
    }
}

#[async_trait]
impl MetadataApi for HttpMetadataApi {
    async fn insert(&self, row: &PhotoMetadata) -> RemoteResult<RemoteId> {
        self.api.create("/v1/photos", row).await
    }
}

#[derive(Debug, Deserialize)]
struct CreatedResponse {
    id: Option<serde_json::Value>,
}

impl CreatedResponse {
    fn into_remote_id(self) -> RemoteResult<RemoteId> {
        let id = match self.id {
            Some(serde_json::Value::String(id)) => id,
            Some(serde_json::Value::Number(id)) => id.to_string(),
            _ => {
                return Err(RemoteError::InvalidResponse(
                    "response did not include an id".to_string(),
                ))
            }
        };
        id.parse()
            .map_err(|_| RemoteError::InvalidResponse("response id was empty".to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn map_status(status: StatusCode, body: &str) -> RemoteError {
    let message = parse_api_error(body);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RemoteError::Unauthorized(
            message.unwrap_or_else(|| format!("HTTP {}", status.as_u16())),
        ),
        StatusCode::NOT_FOUND => RemoteError::NotFound(
            message.unwrap_or_else(|| "record does not exist".to_string()),
        ),
        _ => RemoteError::Api {
            status: status.as_u16(),
            message: message.unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            }),
        },
    }
}

fn parse_api_error(body: &str) -> Option<String> {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return normalize_text_option(Some(compact_text(&message)));
        }
    }

    normalize_text_option(Some(compact_text(body)))
}

fn normalize_base_url(raw: &str) -> Result<String> {
    let base_url = normalize_text_option(Some(raw.to_string()))
        .ok_or_else(|| Error::InvalidInput("API base URL must not be empty".to_string()))?;
    if !is_http_url(&base_url) {
        return Err(Error::InvalidInput(
            "API base URL must include http:// or https://".to_string(),
        ));
    }
    Ok(base_url.trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_base_url_trims_and_validates() {
        assert_eq!(
            normalize_base_url(" https://api.example.com/ ").unwrap(),
            "https://api.example.com"
        );
        assert!(normalize_base_url("api.example.com").is_err());
        assert!(normalize_base_url("  ").is_err());
    }

    #[test]
    fn auth_statuses_map_to_unauthorized() {
        let error = map_status(StatusCode::UNAUTHORIZED, r#"{"error":"token expired"}"#);
        assert!(matches!(error, RemoteError::Unauthorized(ref message) if message == "token expired"));

        let error = map_status(StatusCode::FORBIDDEN, "");
        assert!(matches!(error, RemoteError::Unauthorized(ref message) if message == "HTTP 403"));
    }

    #[test]
    fn other_statuses_keep_code_and_message() {
        let error = map_status(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"message":"parent case is closed"}"#,
        );
        match error {
            RemoteError::Api { status, message } => {
                assert_eq!(status, 422);
                assert_eq!(message, "parent case is closed");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let error = map_status(StatusCode::BAD_GATEWAY, "   ");
        assert_eq!(error.to_string(), "HTTP 502: Bad Gateway");
    }

    #[test]
    fn created_response_accepts_string_or_number_ids() {
        let created: CreatedResponse = serde_json::from_str(r#"{"id":"r1"}"#).unwrap();
        assert_eq!(created.into_remote_id().unwrap().as_str(), "r1");

        let created: CreatedResponse = serde_json::from_str(r#"{"id":42}"#).unwrap();
        assert_eq!(created.into_remote_id().unwrap().as_str(), "42");

        let created: CreatedResponse = serde_json::from_str("{}").unwrap();
        assert!(matches!(
            created.into_remote_id(),
            Err(RemoteError::InvalidResponse(_))
        ));
    }

    #[test]
    fn debug_redacts_token() {
        let api = HttpRecordApi::new("https://api.example.com", Some("secret".to_string())).unwrap();
        let debug = format!("{api:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
