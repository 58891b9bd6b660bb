//! # Linode Token Issuer
//!
//! REST client for the Linode personal access token API (`/profile/tokens`).
//!
//! - Bearer authentication with the operator's own `LINODE_TOKEN`
//! - Label lookups use the `X-Filter` header; listing follows pagination
//! - The token value is only present on the create response
//!
//! Linode reports timestamps without a zone suffix (`2025-01-01T00:00:00`);
//! they are UTC. A token created without an expiry never expires; one
//! reported without a creation time sorts as the oldest.

use crate::constants::{DEFAULT_HTTP_TIMEOUT_SECS, LINODE_PAGE_SIZE};
use crate::model::{Credential, CredentialId, SecretValue};
use crate::provider::CredentialIssuer;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, info_span, Instrument};

/// Linode API client scoped to the token endpoints
pub struct LinodeIssuer {
    http_client: Client,
    base_url: String,
    api_token: SecretValue,
}

// ============================================================================
// Linode API Request/Response Structures
// ============================================================================

#[derive(Debug, Serialize)]
struct CreateTokenRequest<'a> {
    label: &'a str,
    scopes: &'a str,
    /// RFC3339, whole seconds
    expiry: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    id: CredentialId,
    #[serde(default)]
    label: String,
    #[serde(default)]
    scopes: String,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    created: Option<String>,
    #[serde(default)]
    expiry: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenPage {
    #[serde(default)]
    data: Vec<TokenResponse>,
    #[serde(default = "first_page")]
    page: u32,
    #[serde(default = "first_page")]
    pages: u32,
}

fn first_page() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
struct LinodeErrorResponse {
    #[serde(default)]
    errors: Vec<LinodeError>,
}

#[derive(Debug, Deserialize)]
struct LinodeError {
    #[serde(default)]
    field: Option<String>,
    reason: String,
}

/// Parse an API timestamp, with or without a zone suffix
fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
        .map(|naive| naive.and_utc())
        .with_context(|| format!("Invalid Linode timestamp: {value}"))
}

impl TokenResponse {
    fn into_credential(self) -> Result<Credential> {
        let created_at = match self.created.as_deref() {
            Some(created) => parse_timestamp(created)?,
            None => DateTime::UNIX_EPOCH,
        };
        let expires_at = match self.expiry.as_deref() {
            Some(expiry) => parse_timestamp(expiry)?,
            None => DateTime::<Utc>::MAX_UTC,
        };
        Ok(Credential {
            id: self.id,
            label: self.label,
            secret: self.token.filter(|t| !t.is_empty()).map(SecretValue::from),
            created_at,
            expires_at,
            scopes: self.scopes,
        })
    }
}

impl std::fmt::Debug for LinodeIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinodeIssuer")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl LinodeIssuer {
    /// Create a client for `base_url` (e.g. `https://api.linode.com/v4`)
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built
    pub fn new(base_url: impl Into<String>, api_token: SecretValue) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        info!("Initializing Linode client for {}", base_url);

        Ok(Self {
            http_client,
            base_url,
            api_token,
        })
    }

    fn tokens_url(&self) -> String {
        format!("{}/profile/tokens", self.base_url)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.bearer_auth(self.api_token.expose())
    }

    /// Turn a non-success response into an error carrying the API's reasons
    async fn error_from_response(response: reqwest::Response, action: &str) -> anyhow::Error {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let reasons = serde_json::from_str::<LinodeErrorResponse>(&body)
            .ok()
            .map(|parsed| {
                parsed
                    .errors
                    .into_iter()
                    .map(|e| match e.field {
                        Some(field) => format!("{field}: {}", e.reason),
                        None => e.reason,
                    })
                    .collect::<Vec<_>>()
                    .join("; ")
            })
            .filter(|joined| !joined.is_empty());

        match reasons {
            Some(reasons) => anyhow::anyhow!(
                "Linode API error while {action}: HTTP {} ({reasons})",
                status.as_u16()
            ),
            None => anyhow::anyhow!(
                "Linode API error while {action}: HTTP {}: {body}",
                status.as_u16()
            ),
        }
    }

    /// Fetch every page of `/profile/tokens`, optionally filtered by label
    async fn list_pages(&self, label: Option<&str>) -> Result<Vec<Credential>> {
        let filter = label
            .map(|l| serde_json::to_string(&serde_json::json!({ "label": l })))
            .transpose()
            .context("Failed to encode label filter")?;

        let mut credentials = Vec::new();
        let mut page = 1u32;
        loop {
            let mut request = self.authorized(self.http_client.get(self.tokens_url())).query(&[
                ("page", page.to_string()),
                ("page_size", LINODE_PAGE_SIZE.to_string()),
            ]);
            if let Some(filter) = &filter {
                request = request.header("X-Filter", filter);
            }

            let response = request
                .send()
                .await
                .context("Failed to send list tokens request")?;
            if !response.status().is_success() {
                return Err(Self::error_from_response(response, "listing tokens").await);
            }

            let body: TokenPage = response
                .json()
                .await
                .context("Failed to parse list tokens response")?;
            debug!(
                "Fetched token page {}/{} ({} tokens)",
                body.page,
                body.pages,
                body.data.len()
            );

            for token in body.data {
                credentials.push(token.into_credential()?);
            }

            if body.page >= body.pages {
                break;
            }
            page = body.page + 1;
        }

        Ok(credentials)
    }
}

#[async_trait]
impl CredentialIssuer for LinodeIssuer {
    async fn find_by_label(&self, label: &str) -> Result<Vec<Credential>> {
        let span = info_span!("linode.tokens.find", token.label = label);
        async move {
            let mut found = self.list_pages(Some(label)).await?;
            // The filter is applied server side; keep exact matches only
            found.retain(|c| c.label == label);
            Ok(found)
        }
        .instrument(span)
        .await
    }

    async fn create(
        &self,
        label: &str,
        scopes: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Credential> {
        let span = info_span!("linode.tokens.create", token.label = label);
        async move {
            let body = CreateTokenRequest {
                label,
                scopes,
                expiry: expires_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            };

            let response = self
                .authorized(self.http_client.post(self.tokens_url()))
                .json(&body)
                .send()
                .await
                .context("Failed to send create token request")?;
            if !response.status().is_success() {
                return Err(Self::error_from_response(response, "creating token").await);
            }

            let token: TokenResponse = response
                .json()
                .await
                .context("Failed to parse create token response")?;
            let credential = token.into_credential()?;
            if credential.secret.is_none() {
                anyhow::bail!(
                    "Linode created token {} but returned no token value",
                    credential.id
                );
            }

            info!("Created Linode token {} ({})", credential.id, label);
            Ok(credential)
        }
        .instrument(span)
        .await
    }

    async fn revoke(&self, id: CredentialId) -> Result<()> {
        let span = info_span!("linode.tokens.revoke", token.id = id);
        async move {
            let response = self
                .authorized(
                    self.http_client
                        .delete(format!("{}/{id}", self.tokens_url())),
                )
                .send()
                .await
                .context("Failed to send revoke token request")?;
            if !response.status().is_success() {
                return Err(Self::error_from_response(response, "revoking token").await);
            }
            info!("Revoked Linode token {}", id);
            Ok(())
        }
        .instrument(span)
        .await
    }

    async fn list(&self) -> Result<Vec<Credential>> {
        self.list_pages(None)
            .instrument(info_span!("linode.tokens.list"))
            .await
    }
}
