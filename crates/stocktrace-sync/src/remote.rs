//! # Remote Store Transport
//!
//! The [`RemoteStore`] trait abstracts the remote endpoint so the engine
//! can be exercised without a network; [`HttpRemote`] is the production
//! implementation speaking PostgREST-style JSON over HTTPS.
//!
//! ## Request Mapping
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │              RemoteStore → HTTP (PostgREST style)                   │
//! │                                                                     │
//! │  find_by_natural_key  GET   /rest/v1/{table}?{col}=eq.{key}&limit=1 │
//! │  insert_row           POST  /rest/v1/{table}                        │
//! │  update_row           PATCH /rest/v1/{table}?{col}=eq.{key}         │
//! │  record_scan          POST  /rest/v1/scans                          │
//! │                                                                     │
//! │  Connect/timeout failure  → SyncError::RemoteUnavailable            │
//! │  Non-2xx response         → SyncError::RemoteRejected               │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::config::RemoteConfig;
use crate::error::{SyncError, SyncResult};
use stocktrace_core::PendingScan;

// =============================================================================
// Tables
// =============================================================================

/// Remote tables the engine reconciles, in push order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteTable {
    Categories,
    Locations,
    Items,
}

impl RemoteTable {
    /// Push order: referenced tables before referencing ones.
    pub const PUSH_ORDER: [RemoteTable; 3] =
        [RemoteTable::Categories, RemoteTable::Locations, RemoteTable::Items];

    /// Endpoint path segment.
    pub fn name(&self) -> &'static str {
        match self {
            RemoteTable::Categories => "categories",
            RemoteTable::Locations => "locations",
            RemoteTable::Items => "items",
        }
    }

    /// Column used to match local rows against remote rows.
    pub fn natural_key_column(&self) -> &'static str {
        match self {
            RemoteTable::Categories => "name",
            RemoteTable::Locations => "code",
            RemoteTable::Items => "code",
        }
    }
}

impl std::fmt::Display for RemoteTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Trait
// =============================================================================

/// Access to the remote store, one call per row.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Looks up a remote row by its natural key. `Ok(None)` means the
    /// row does not exist remotely yet.
    async fn find_by_natural_key(
        &self,
        table: RemoteTable,
        key: &str,
    ) -> SyncResult<Option<Value>>;

    /// Inserts a new remote row.
    async fn insert_row(&self, table: RemoteTable, payload: &Value) -> SyncResult<()>;

    /// Updates the remote row matched by natural key.
    async fn update_row(&self, table: RemoteTable, key: &str, payload: &Value) -> SyncResult<()>;

    /// Records a queued scan event remotely.
    async fn record_scan(&self, scan: &PendingScan) -> SyncResult<()>;
}

// =============================================================================
// HTTP Implementation
// =============================================================================

/// PostgREST-style HTTP client for the remote store.
pub struct HttpRemote {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpRemote {
    /// Builds a client from remote settings.
    ///
    /// Fails with `InvalidConfig` when no base URL is configured.
    pub fn new(config: &RemoteConfig) -> SyncResult<Self> {
        let base_url = config
            .base_url
            .clone()
            .ok_or_else(|| SyncError::InvalidConfig("No remote URL configured".into()))?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.timeout())
            .build()
            .map_err(|e| SyncError::InvalidConfig(e.to_string()))?;

        Ok(HttpRemote {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn endpoint(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn with_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request
                .header("apikey", key)
                .header("Authorization", format!("Bearer {key}")),
            None => request,
        }
    }

    async fn check_status(response: reqwest::Response) -> SyncResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response.text().await.unwrap_or_default();
        Err(SyncError::RemoteRejected {
            status: status.as_u16(),
            message,
        })
    }

    async fn call_rpc(&self, name: &str, args: Value) -> SyncResult<Vec<Value>> {
        let url = format!("{}/rest/v1/rpc/{}", self.base_url, name);
        debug!(rpc = name, "Remote procedure call");

        let response = self
            .with_auth(self.client.post(&url))
            .json(&args)
            .send()
            .await
            .map_err(transport_error)?;

        let response = Self::check_status(response).await?;
        response.json().await.map_err(transport_error)
    }

    /// Fetches one page of remote items (remote-procedure endpoint, for
    /// catalog browsing outside the offline cache).
    pub async fn list_items(&self, page: u32, page_size: u32) -> SyncResult<Vec<Value>> {
        self.call_rpc(
            "list_items",
            serde_json::json!({ "page": page, "page_size": page_size }),
        )
        .await
    }

    /// Full-text item search against the remote catalog.
    pub async fn search_items(&self, query: &str) -> SyncResult<Vec<Value>> {
        self.call_rpc("search_items", serde_json::json!({ "query": query }))
            .await
    }
}

/// Connectivity failures map to `RemoteUnavailable` so callers defer
/// instead of erroring out.
fn transport_error(e: reqwest::Error) -> SyncError {
    if e.is_timeout() || e.is_connect() {
        SyncError::RemoteUnavailable(e.to_string())
    } else {
        SyncError::RemoteUnavailable(format!("request failed: {e}"))
    }
}

#[async_trait]
impl RemoteStore for HttpRemote {
    async fn find_by_natural_key(
        &self,
        table: RemoteTable,
        key: &str,
    ) -> SyncResult<Option<Value>> {
        let url = self.endpoint(table.name());
        debug!(%table, key, "Remote lookup");

        let response = self
            .with_auth(self.client.get(&url))
            .query(&[
                (table.natural_key_column(), format!("eq.{key}")),
                ("limit", "1".to_string()),
            ])
            .send()
            .await
            .map_err(transport_error)?;

        let response = Self::check_status(response).await?;
        let mut rows: Vec<Value> = response.json().await.map_err(transport_error)?;

        if rows.is_empty() {
            Ok(None)
        } else {
            Ok(Some(rows.remove(0)))
        }
    }

    async fn insert_row(&self, table: RemoteTable, payload: &Value) -> SyncResult<()> {
        let url = self.endpoint(table.name());
        debug!(%table, "Remote insert");

        let response = self
            .with_auth(self.client.post(&url))
            .json(payload)
            .send()
            .await
            .map_err(transport_error)?;

        Self::check_status(response).await?;
        Ok(())
    }

    async fn update_row(&self, table: RemoteTable, key: &str, payload: &Value) -> SyncResult<()> {
        let url = self.endpoint(table.name());
        debug!(%table, key, "Remote update");

        let response = self
            .with_auth(self.client.patch(&url))
            .query(&[(table.natural_key_column(), format!("eq.{key}"))])
            .json(payload)
            .send()
            .await
            .map_err(transport_error)?;

        Self::check_status(response).await?;
        Ok(())
    }

    async fn record_scan(&self, scan: &PendingScan) -> SyncResult<()> {
        let url = self.endpoint("scans");
        debug!(code = %scan.code, "Remote scan record");

        let payload = serde_json::json!({
            "code": scan.code,
            "device_id": scan.device_id,
            "scanned_at": scan.scanned_at,
        });

        let response = self
            .with_auth(self.client.post(&url))
            .json(&payload)
            .send()
            .await
            .map_err(transport_error)?;

        Self::check_status(response).await?;
        Ok(())
    }
}

// =============================================================================
// Test Double
// =============================================================================


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_order_references_before_referents() {
        assert_eq!(
            RemoteTable::PUSH_ORDER,
            [RemoteTable::Categories, RemoteTable::Locations, RemoteTable::Items]
        );
    }

    #[test]
    fn natural_keys_per_table() {
        assert_eq!(RemoteTable::Categories.natural_key_column(), "name");
        assert_eq!(RemoteTable::Locations.natural_key_column(), "code");
        assert_eq!(RemoteTable::Items.natural_key_column(), "code");
    }

    #[test]
    fn http_remote_requires_base_url() {
        let config = RemoteConfig::default();
        assert!(matches!(
            HttpRemote::new(&config),
            Err(SyncError::InvalidConfig(_))
        ));
    }
}
