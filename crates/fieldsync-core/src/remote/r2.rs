//! Cloudflare R2 blob storage over the S3-compatible API.

use std::env;

use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_s3::{primitives::ByteStream, Client};
use aws_types::region::Region;

use crate::{Error, Result};

use super::{BlobStorage, RemoteError, RemoteResult};

const ENV_ACCOUNT_ID: &str = "R2_ACCOUNT_ID";
const ENV_BUCKET: &str = "R2_BUCKET";
const ENV_ACCESS_KEY_ID: &str = "R2_ACCESS_KEY_ID";
const ENV_SECRET_ACCESS_KEY: &str = "R2_SECRET_ACCESS_KEY";

/// Cloudflare R2 configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct R2Config {
    /// Cloudflare account identifier.
    pub account_id: String,
    /// R2 bucket name.
    pub bucket: String,
    /// Access key id for S3-compatible auth.
    pub access_key_id: String,
    /// Secret access key for S3-compatible auth.
    pub secret_access_key: String,
}

impl R2Config {
    /// Load R2 configuration from environment variables.
    ///
    /// Returns `Ok(None)` when no R2 variables are set.
    /// Returns an error when only a partial configuration is provided.
    pub fn from_env() -> Result<Option<Self>> {
        parse_config(|key| env::var(key).ok())
    }

    /// Cloudflare R2 S3-compatible endpoint URL.
    #[must_use]
    pub fn endpoint_url(&self) -> String {
        format!("https://{}.r2.cloudflarestorage.com", self.account_id)
    }
}

impl std::fmt::Debug for R2Config {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("R2Config")
            .field("account_id", &self.account_id)
            .field("bucket", &self.bucket)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .finish()
    }
}

/// Photo blob storage backed by one R2 bucket.
#[derive(Clone, Debug)]
pub struct R2BlobStorage {
    bucket: String,
    client: Client,
}

impl R2BlobStorage {
    #[must_use]
    pub fn new(config: &R2Config) -> Self {
        Self {
            bucket: config.bucket.clone(),
            client: build_s3_client(config),
        }
    }
}

#[async_trait]
impl BlobStorage for R2BlobStorage {
    async fn put(&self, path: &str, bytes: &[u8], content_type: &str) -> RemoteResult<String> {
        let object_key = normalize_object_key(path)?;

        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .body(ByteStream::from(bytes.to_vec()));

        let content_type = content_type.trim();
        if !content_type.is_empty() {
            request = request.content_type(content_type);
        }

        request
            .send()
            .await
            .map_err(|error| storage_error("put_object", &self.bucket, &object_key, error))?;

        tracing::debug!("Uploaded {} bytes to {}/{}", bytes.len(), self.bucket, object_key);
        Ok(object_key)
    }

    async fn delete(&self, path: &str) -> RemoteResult<()> {
        let object_key = normalize_object_key(path)?;

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .send()
            .await
            .map_err(|error| storage_error("delete_object", &self.bucket, &object_key, error))?;

        Ok(())
    }
}

fn parse_config(lookup: impl Fn(&str) -> Option<String>) -> Result<Option<R2Config>> {
    let account_id = lookup(ENV_ACCOUNT_ID).map(|value| value.trim().to_string());
    let bucket = lookup(ENV_BUCKET).map(|value| value.trim().to_string());
    let access_key_id = lookup(ENV_ACCESS_KEY_ID).map(|value| value.trim().to_string());
    let secret_access_key = lookup(ENV_SECRET_ACCESS_KEY).map(|value| value.trim().to_string());

    if account_id.is_none()
        && bucket.is_none()
        && access_key_id.is_none()
        && secret_access_key.is_none()
    {
        return Ok(None);
    }

    let mut missing = Vec::new();
    let mut require = |name: &'static str, value: Option<String>| {
        let value = value.filter(|value| !value.is_empty());
        if value.is_none() {
            missing.push(name);
        }
        value.unwrap_or_default()
    };

    let config = R2Config {
        account_id: require(ENV_ACCOUNT_ID, account_id),
        bucket: require(ENV_BUCKET, bucket),
        access_key_id: require(ENV_ACCESS_KEY_ID, access_key_id),
        secret_access_key: require(ENV_SECRET_ACCESS_KEY, secret_access_key),
    };

    if !missing.is_empty() {
        return Err(Error::InvalidInput(format!(
            "R2 configuration is incomplete. Missing: {}",
            missing.join(", ")
        )));
    }

    Ok(Some(config))
}

fn build_s3_client(config: &R2Config) -> Client {
    let credentials = Credentials::new(
        config.access_key_id.clone(),
        config.secret_access_key.clone(),
        None,
        None,
        "fieldsync-r2-storage",
    );

    let sdk_config = aws_sdk_s3::config::Builder::new()
        .region(Region::new("auto"))
        .credentials_provider(credentials)
        .endpoint_url(config.endpoint_url())
        .force_path_style(true)
        .build();

    Client::from_conf(sdk_config)
}

fn storage_error(
    operation: &str,
    bucket: &str,
    object_key: &str,
    error: impl std::fmt::Display,
) -> RemoteError {
    RemoteError::Network(format!("R2 {operation} failed for {bucket}/{object_key}: {error}"))
}

fn normalize_object_key(object_key: &str) -> RemoteResult<String> {
    let object_key = object_key.trim().trim_matches('/').to_string();
    if object_key.is_empty() {
        return Err(RemoteError::InvalidResponse(
            "object key cannot be empty".to_string(),
        ));
    }
    Ok(object_key)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    async fn object_exists(storage: &R2BlobStorage, object_key: &str) -> bool {
        let response = storage
            .client
            .list_objects_v2()
            .bucket(&storage.bucket)
            .prefix(object_key)
            .max_keys(1)
            .send()
            .await
            .unwrap_or_else(|error| panic!("object listing failed: {error}"));

        response
            .contents()
            .iter()
            .filter_map(|object| object.key())
            .any(|candidate| candidate == object_key)
    }

    fn parse_from_map(map: &HashMap<&str, &str>) -> Result<Option<R2Config>> {
        parse_config(|key| map.get(key).map(|value| (*value).to_string()))
    }

    #[test]
    fn parse_config_none_returns_none() {
        let map = HashMap::new();
        assert!(parse_from_map(&map).unwrap().is_none());
    }

    #[test]
    fn parse_config_requires_all_values() {
        let mut map = HashMap::new();
        map.insert(ENV_ACCOUNT_ID, "account");
        map.insert(ENV_BUCKET, "bucket");
        map.insert(ENV_ACCESS_KEY_ID, "  ");

        let err = parse_from_map(&map).unwrap_err();
        match err {
            Error::InvalidInput(message) => {
                assert!(message.contains(ENV_ACCESS_KEY_ID));
                assert!(message.contains(ENV_SECRET_ACCESS_KEY));
                assert!(!message.contains(ENV_BUCKET));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn parse_config_accepts_valid_values() {
        let mut map = HashMap::new();
        map.insert(ENV_ACCOUNT_ID, " account-1 ");
        map.insert(ENV_BUCKET, "bucket-a");
        map.insert(ENV_ACCESS_KEY_ID, "AKID123");
        map.insert(ENV_SECRET_ACCESS_KEY, "SECRET123");

        let config = parse_from_map(&map).unwrap().unwrap();
        assert_eq!(
            config.endpoint_url(),
            "https://account-1.r2.cloudflarestorage.com"
        );
        assert!(!format!("{config:?}").contains("SECRET123"));
    }

    #[test]
    fn normalize_object_key_rejects_empty() {
        assert!(normalize_object_key(" / ").is_err());
        assert_eq!(
            normalize_object_key("/records/r1/a.jpg").unwrap(),
            "records/r1/a.jpg"
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    #[ignore = "Requires local R2 env vars plus network access"]
    async fn r2_put_then_delete_roundtrip() {
        let _ = dotenvy::dotenv();

        let config = R2Config::from_env()
            .expect("R2 env parsing should not error")
            .expect("R2 config should be present");
        let storage = R2BlobStorage::new(&config);

        let path = format!(
            "records/integration/ungrouped/{}-roundtrip.bin",
            crate::util::now_millis()
        );
        let stored = storage
            .put(&path, b"r2-roundtrip-test", "application/octet-stream")
            .await
            .unwrap_or_else(|error| panic!("R2 upload failed: {error}"));
        assert_eq!(stored, path);

        storage
            .delete(&stored)
            .await
            .unwrap_or_else(|error| panic!("R2 delete failed for '{stored}': {error}"));
        assert!(!object_exists(&storage, &stored).await);
    }
}
