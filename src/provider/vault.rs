//! # Vault Secret Store
//!
//! HashiCorp Vault KV v2 client using AppRole authentication.
//!
//! Each storage target path maps to one KV v2 secret:
//! - the token value lives in the secret data under the `token` key
//! - the rotation record lives in the secret's `custom_metadata`
//!
//! Reads of a path that does not exist return `None` rather than an error.

use crate::config::VaultConfig;
use crate::constants::{DEFAULT_HTTP_TIMEOUT_SECS, VAULT_TOKEN_KEY};
use crate::model::{RotationRecord, SecretValue, StorageTarget};
use crate::provider::SecretStore;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, info_span, Instrument};

const VAULT_TOKEN_HEADER: &str = "X-Vault-Token";

/// Vault KV v2 client bound to one mount
pub struct VaultSecretStore {
    http_client: Client,
    address: String,
    mount_path: String,
    client_token: SecretValue,
}

// ============================================================================
// Vault API Request/Response Structures
// ============================================================================

#[derive(Serialize)]
struct AppRoleLoginRequest<'a> {
    role_id: &'a str,
    secret_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    auth: Option<LoginAuth>,
}

#[derive(Debug, Deserialize)]
struct LoginAuth {
    client_token: String,
}

#[derive(Serialize)]
struct WriteDataRequest<'a> {
    data: BTreeMap<&'a str, &'a str>,
}

#[derive(Debug, Deserialize)]
struct ReadDataResponse {
    data: Option<ReadDataBody>,
}

#[derive(Debug, Deserialize)]
struct ReadDataBody {
    data: Option<BTreeMap<String, serde_json::Value>>,
}

#[derive(Serialize)]
struct WriteMetadataRequest {
    custom_metadata: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct ReadMetadataResponse {
    data: Option<ReadMetadataBody>,
}

#[derive(Debug, Deserialize)]
struct ReadMetadataBody {
    #[serde(default)]
    custom_metadata: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct VaultErrorResponse {
    #[serde(default)]
    errors: Vec<String>,
}

impl std::fmt::Debug for VaultSecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultSecretStore")
            .field("address", &self.address)
            .field("mount_path", &self.mount_path)
            .finish_non_exhaustive()
    }
}

fn build_http_client() -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS))
        .build()
        .context("Failed to create HTTP client")
}

async fn error_from_response(response: reqwest::Response, action: &str) -> anyhow::Error {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<VaultErrorResponse>(&body) {
        Ok(parsed) if !parsed.errors.is_empty() => anyhow::anyhow!(
            "Vault error while {action}: HTTP {} ({})",
            status.as_u16(),
            parsed.errors.join("; ")
        ),
        _ => anyhow::anyhow!(
            "Vault error while {action}: HTTP {}: {body}",
            status.as_u16()
        ),
    }
}

impl VaultSecretStore {
    /// Authenticate with AppRole and return a client holding the issued token
    ///
    /// # Errors
    /// Returns an error if the login request fails or Vault returns no auth block
    pub async fn login(config: &VaultConfig) -> Result<Self> {
        let http_client = build_http_client()?;
        let address = config.address.trim_end_matches('/').to_string();
        info!("Authenticating to Vault at {} with AppRole", address);

        let response = http_client
            .post(format!("{address}/v1/auth/approle/login"))
            .json(&AppRoleLoginRequest {
                role_id: &config.role_id,
                secret_id: &config.secret_id,
            })
            .send()
            .await
            .context("Failed to send AppRole login request")?;
        if !response.status().is_success() {
            return Err(error_from_response(response, "logging in with AppRole").await);
        }

        let login: LoginResponse = response
            .json()
            .await
            .context("Failed to parse AppRole login response")?;
        let auth = login
            .auth
            .context("Vault returned no auth information for AppRole login")?;

        Ok(Self {
            http_client,
            address,
            mount_path: config.mount_path.trim_matches('/').to_string(),
            client_token: SecretValue::new(auth.client_token),
        })
    }

    /// Build a client from an already-issued Vault token
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built
    pub fn with_token(address: &str, mount_path: &str, client_token: SecretValue) -> Result<Self> {
        Ok(Self {
            http_client: build_http_client()?,
            address: address.trim_end_matches('/').to_string(),
            mount_path: mount_path.trim_matches('/').to_string(),
            client_token,
        })
    }

    fn data_url(&self, target: &StorageTarget) -> String {
        format!(
            "{}/v1/{}/data/{}",
            self.address,
            self.mount_path,
            target.path.trim_matches('/')
        )
    }

    fn metadata_url(&self, target: &StorageTarget) -> String {
        format!(
            "{}/v1/{}/metadata/{}",
            self.address,
            self.mount_path,
            target.path.trim_matches('/')
        )
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.header(VAULT_TOKEN_HEADER, self.client_token.expose())
    }
}

#[async_trait]
impl SecretStore for VaultSecretStore {
    async fn write_secret(&self, target: &StorageTarget, value: &SecretValue) -> Result<()> {
        let span = info_span!("vault.secret.write", secret.path = %target.path);
        async move {
            let mut data = BTreeMap::new();
            data.insert(VAULT_TOKEN_KEY, value.expose());

            let response = self
                .authorized(self.http_client.post(self.data_url(target)))
                .json(&WriteDataRequest { data })
                .send()
                .await
                .context("Failed to send secret write request")?;
            if !response.status().is_success() {
                return Err(error_from_response(response, &format!("writing {target}")).await);
            }
            debug!("Wrote secret to {}", target);
            Ok(())
        }
        .instrument(span)
        .await
    }

    async fn read_secret(&self, target: &StorageTarget) -> Result<Option<SecretValue>> {
        let response = self
            .authorized(self.http_client.get(self.data_url(target)))
            .send()
            .await
            .context("Failed to send secret read request")?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(error_from_response(response, &format!("reading {target}")).await);
        }

        let body: ReadDataResponse = response
            .json()
            .await
            .context("Failed to parse secret read response")?;
        let value = body
            .data
            .and_then(|d| d.data)
            .and_then(|mut fields| fields.remove(VAULT_TOKEN_KEY))
            .and_then(|v| v.as_str().map(SecretValue::from));
        Ok(value)
    }

    async fn write_record(&self, target: &StorageTarget, record: &RotationRecord) -> Result<()> {
        let span = info_span!("vault.record.write", secret.path = %target.path);
        async move {
            let response = self
                .authorized(self.http_client.post(self.metadata_url(target)))
                .json(&WriteMetadataRequest {
                    custom_metadata: record.to_metadata(),
                })
                .send()
                .await
                .context("Failed to send metadata write request")?;
            if !response.status().is_success() {
                return Err(error_from_response(
                    response,
                    &format!("writing rotation record to {target}"),
                )
                .await);
            }
            debug!(
                "Wrote rotation record for {} to {}",
                record.label, target
            );
            Ok(())
        }
        .instrument(span)
        .await
    }

    async fn read_record(&self, target: &StorageTarget) -> Result<Option<RotationRecord>> {
        let response = self
            .authorized(self.http_client.get(self.metadata_url(target)))
            .send()
            .await
            .context("Failed to send metadata read request")?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(error_from_response(
                response,
                &format!("reading rotation record from {target}"),
            )
            .await);
        }

        let body: ReadMetadataResponse = response
            .json()
            .await
            .context("Failed to parse metadata read response")?;
        let Some(metadata) = body.data.and_then(|d| d.custom_metadata) else {
            return Ok(None);
        };
        let Some(mut record) = RotationRecord::from_metadata(&metadata) else {
            return Ok(None);
        };

        record.current_secret = self
            .read_secret(target)
            .await
            .with_context(|| format!("Failed to read current secret at {target}"))?;
        Ok(Some(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store(server: &MockServer) -> VaultSecretStore {
        VaultSecretStore::with_token(&server.uri(), "secret", SecretValue::new("vault-token"))
            .unwrap()
    }

    #[tokio::test]
    async fn test_login_uses_approle() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/auth/approle/login"))
            .and(body_json(json!({"role_id": "role", "secret_id": "sid"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "auth": {"client_token": "issued-token"}
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/kv/data/app/token"))
            .and(header("x-vault-token", "issued-token"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let config = VaultConfig {
            address: server.uri(),
            role_id: "role".to_string(),
            secret_id: "sid".to_string(),
            mount_path: "kv".to_string(),
        };
        let store = VaultSecretStore::login(&config).await.unwrap();
        let value = store
            .read_secret(&StorageTarget::vault("app/token"))
            .await
            .unwrap();
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn test_login_without_auth_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/auth/approle/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"auth": null})))
            .mount(&server)
            .await;

        let config = VaultConfig {
            address: server.uri(),
            role_id: "role".to_string(),
            secret_id: "sid".to_string(),
            mount_path: "secret".to_string(),
        };
        assert!(VaultSecretStore::login(&config).await.is_err());
    }

    #[tokio::test]
    async fn test_write_and_read_secret() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/secret/data/ci/linode"))
            .and(header("x-vault-token", "vault-token"))
            .and(body_json(json!({"data": {"token": "abc"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"version": 1}})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/secret/data/ci/linode"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"data": {"token": "abc"}, "metadata": {"version": 1}}
            })))
            .mount(&server)
            .await;

        let store = store(&server);
        let target = StorageTarget::vault("ci/linode");
        store
            .write_secret(&target, &SecretValue::new("abc"))
            .await
            .unwrap();
        let value = store.read_secret(&target).await.unwrap().unwrap();
        assert_eq!(value.expose(), "abc");
    }

    #[tokio::test]
    async fn test_write_record_sends_custom_metadata() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/secret/metadata/ci/linode"))
            .and(body_json(json!({
                "custom_metadata": {
                    "label": "t1",
                    "current_linode_id": "9",
                    "last_rotated_at": "2025-03-01T00:00:00Z",
                    "previous_linode_id": "0",
                    "rotation_count": "0"
                }
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let record = RotationRecord {
            label: "t1".to_string(),
            current_id: 9,
            current_secret: Some(SecretValue::new("never-sent")),
            last_rotated_at: Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap(),
            previous_id: None,
            previous_expires_at: None,
            rotation_count: 0,
        };
        store(&server)
            .write_record(&StorageTarget::vault("ci/linode"), &record)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_read_record_fills_current_secret() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/secret/metadata/ci/linode"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {
                    "current_version": 3,
                    "custom_metadata": {
                        "label": "t1",
                        "current_linode_id": "12",
                        "last_rotated_at": "2025-03-01T00:00:00Z",
                        "previous_linode_id": "9",
                        "previous_expires_at": "2025-03-05T00:00:00Z",
                        "rotation_count": "4"
                    }
                }
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/secret/data/ci/linode"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"data": {"token": "current"}}
            })))
            .mount(&server)
            .await;

        let record = store(&server)
            .read_record(&StorageTarget::vault("ci/linode"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.current_id, 12);
        assert_eq!(record.previous_id, Some(9));
        assert_eq!(record.rotation_count, 4);
        assert_eq!(record.current_secret.unwrap().expose(), "current");
    }

    #[tokio::test]
    async fn test_read_record_absent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/secret/metadata/new/path"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"errors": []})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/secret/metadata/plain/path"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"custom_metadata": null}
            })))
            .mount(&server)
            .await;

        let store = store(&server);
        assert!(store
            .read_record(&StorageTarget::vault("new/path"))
            .await
            .unwrap()
            .is_none());
        assert!(store
            .read_record(&StorageTarget::vault("plain/path"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_permission_denied_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/secret/data/ci/linode"))
            .respond_with(
                ResponseTemplate::new(403).set_body_json(json!({"errors": ["permission denied"]})),
            )
            .mount(&server)
            .await;

        let err = store(&server)
            .write_secret(&StorageTarget::vault("ci/linode"), &SecretValue::new("x"))
            .await
            .unwrap_err()
            .to_string();
        assert!(err.contains("HTTP 403"), "{err}");
        assert!(err.contains("permission denied"), "{err}");
    }
}
