//! Customer sources.
//!
//! The engine never talks to storage itself. These sources fetch the
//! customer collection from wherever it lives and hand out immutable
//! snapshots; a refresh always produces a new snapshot.

use crate::circuit_breaker::{create_upstream_circuit_breaker, UpstreamCircuitBreaker};
use crate::errors::{AppError, ResultExt};
use crate::models::CustomerRecord;
use moka::future::Cache;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// An immutable view of the customer collection.
pub type CustomerSnapshot = Arc<[CustomerRecord]>;

/// Raw row of `crm.customers`: the storage key plus the stored document.
#[derive(Debug, FromRow)]
struct CustomerRow {
    id: String,
    document: Value,
}

/// Reads customer documents from PostgreSQL (`crm.customers`, JSONB).
#[derive(Clone)]
pub struct PgCustomerStore {
    pool: PgPool,
}

impl PgCustomerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Documents that fail to decode are skipped with a warning so one bad
    /// row never hides the rest of the collection.
    pub async fn fetch_all(&self) -> Result<Vec<CustomerRecord>, AppError> {
        let rows = sqlx::query_as::<_, CustomerRow>(
            "SELECT id, document FROM crm.customers ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .context("Loading customer snapshot")?;

        Ok(rows.into_iter().filter_map(decode_row).collect())
    }

    pub async fn fetch_by_id(&self, id: &str) -> Result<Option<CustomerRecord>, AppError> {
        let row = sqlx::query_as::<_, CustomerRow>(
            "SELECT id, document FROM crm.customers WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("Loading customer {}", id))?;

        Ok(row.and_then(decode_row))
    }
}

fn decode_row(row: CustomerRow) -> Option<CustomerRecord> {
    match CustomerRecord::from_document(&row.id, row.document) {
        Ok(record) => Some(record),
        Err(e) => {
            tracing::warn!("Skipping customer {}: undecodable document: {}", row.id, e);
            None
        }
    }
}

/// Reads customers from a remote CRM API (`GET /api/customers`).
#[derive(Clone)]
pub struct RemoteCustomerSource {
    client: Client,
    base_url: String,
    token: String,
    breaker: UpstreamCircuitBreaker,
}

impl RemoteCustomerSource {
    /// Creates a new `RemoteCustomerSource`.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL of the customers API, without trailing slash.
    /// * `token` - Bearer token sent with every request.
    pub fn new(base_url: String, token: String) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create customers client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            breaker: create_upstream_circuit_breaker(),
        })
    }

    pub async fn fetch_all(&self) -> Result<Vec<CustomerRecord>, AppError> {
        let url = format!("{}/api/customers", self.base_url);
        let items: Value = self
            .guarded_get(&url)
            .await?
            .ok_or_else(|| AppError::ExternalApiError("Customers endpoint not found".into()))?;

        let items = match items {
            Value::Array(items) => items,
            _ => {
                return Err(AppError::ExternalApiError(
                    "Customers API did not return an array".into(),
                ))
            }
        };

        Ok(items
            .into_iter()
            .enumerate()
            .filter_map(|(idx, item)| match CustomerRecord::from_document("", item) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!("Skipping remote customer at index {}: {}", idx, e);
                    None
                }
            })
            .collect())
    }

    pub async fn fetch_by_id(&self, id: &str) -> Result<Option<CustomerRecord>, AppError> {
        let mut url = reqwest::Url::parse(&format!("{}/api/customers/", self.base_url))
            .map_err(|e| AppError::ExternalApiError(format!("Failed to build URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| AppError::ExternalApiError("Customers API URL cannot be a base".into()))?
            .pop_if_empty()
            .push(id);

        self.guarded_get(url.as_str()).await
    }

    /// GET through the circuit breaker. A 404 is a successful "absent".
    async fn guarded_get<T: DeserializeOwned>(&self, url: &str) -> Result<Option<T>, AppError> {
        use failsafe::futures::CircuitBreaker;

        match self.breaker.call(self.get_json(url)).await {
            Ok(value) => Ok(value),
            Err(failsafe::Error::Inner(e)) => Err(e),
            Err(failsafe::Error::Rejected) => {
                tracing::warn!("Customers API circuit open, rejecting request to {}", url);
                Err(AppError::ExternalApiError(
                    "Customers API temporarily unavailable (circuit open)".into(),
                ))
            }
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<Option<T>, AppError> {
        tracing::info!("Fetching customers from upstream: {}", url);

        let response = self
            .client
            .get(url)
            .header("Authorization", format!("Bearer {}", self.token))
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Customers API request failed: {}", e)))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ExternalApiError(format!(
                "Customers API returned {}: {}",
                status, error_text
            )));
        }

        let data = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse customers response: {}", e))
        })?;

        Ok(Some(data))
    }
}

/// A fixed collection, loaded once (e.g. from a JSON export).
#[derive(Clone)]
pub struct StaticCustomerSource {
    customers: CustomerSnapshot,
}

impl StaticCustomerSource {
    pub fn new(customers: Vec<CustomerRecord>) -> Self {
        Self {
            customers: customers.into(),
        }
    }

    /// Loads a JSON array of customer documents.
    pub async fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            anyhow::anyhow!("Failed to read customers file {}: {}", path.display(), e)
        })?;
        let value: Value = serde_json::from_str(&raw)?;
        let customers = crate::models::parse_customer_batch(value)
            .map_err(|e| anyhow::anyhow!("Invalid customers file {}: {}", path.display(), e))?;
        tracing::info!("Loaded {} customers from {}", customers.len(), path.display());
        Ok(Self::new(customers))
    }

    pub fn snapshot(&self) -> CustomerSnapshot {
        self.customers.clone()
    }
}

/// The configured customer source.
#[derive(Clone)]
pub enum CustomerStore {
    Postgres(PgCustomerStore),
    Remote(RemoteCustomerSource),
    Static(StaticCustomerSource),
}

impl CustomerStore {
    pub fn kind(&self) -> &'static str {
        match self {
            CustomerStore::Postgres(_) => "postgres",
            CustomerStore::Remote(_) => "remote",
            CustomerStore::Static(_) => "file",
        }
    }

    pub async fn fetch_snapshot(&self) -> Result<CustomerSnapshot, AppError> {
        match self {
            CustomerStore::Postgres(store) => Ok(store.fetch_all().await?.into()),
            CustomerStore::Remote(source) => Ok(source.fetch_all().await?.into()),
            CustomerStore::Static(source) => Ok(source.snapshot()),
        }
    }

    pub async fn fetch_by_id(&self, id: &str) -> Result<Option<CustomerRecord>, AppError> {
        match self {
            CustomerStore::Postgres(store) => store.fetch_by_id(id).await,
            CustomerStore::Remote(source) => source.fetch_by_id(id).await,
            CustomerStore::Static(source) => {
                Ok(source.customers.iter().find(|c| c.id == id).cloned())
            }
        }
    }
}

/// Short-lived cache of the whole collection so that the several views of a
/// dashboard page load share one fetch.
#[derive(Clone)]
pub struct SnapshotCache {
    store: CustomerStore,
    cache: Cache<&'static str, CustomerSnapshot>,
}

impl SnapshotCache {
    const KEY: &'static str = "customers";

    pub fn new(store: CustomerStore, ttl: Duration) -> Self {
        Self {
            store,
            cache: Cache::builder().time_to_live(ttl).max_capacity(1).build(),
        }
    }

    pub fn store(&self) -> &CustomerStore {
        &self.store
    }

    pub async fn snapshot(&self) -> Result<CustomerSnapshot, AppError> {
        let store = self.store.clone();
        self.cache
            .try_get_with(Self::KEY, async move {
                let snapshot = store.fetch_snapshot().await?;
                tracing::info!(
                    "Loaded customer snapshot: {} records from {}",
                    snapshot.len(),
                    store.kind()
                );
                Ok::<_, AppError>(snapshot)
            })
            .await
            .map_err(|e: Arc<AppError>| e.as_ref().clone())
    }

    /// Drops the cached snapshot; the next read fetches a fresh one.
    pub async fn invalidate(&self) {
        self.cache.invalidate(Self::KEY).await;
    }
}
