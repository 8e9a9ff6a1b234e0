use std::marker::PhantomData;
use std::time::Duration;

use async_trait::async_trait;
use qdash_client::ApiClient;
use qdash_core::{ListResult, ServiceError, new_id};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::filter::Facets;
use crate::ingest::{ingest_inspection, ingest_quality_item};
use crate::model::{InspectionRecord, ParentKind, QualityItem};
use crate::status::Tracked;

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// A record kind the dashboard can list and edit.
pub trait Record: Facets + Tracked + Serialize + Clone + Send + Sync + 'static {
    /// Parent kind used for this record's comments and history.
    const KIND: ParentKind;

    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);
    fn set_owner(&mut self, owner: String);

    /// Validate one raw JSON record.
    fn ingest(value: Value) -> Result<Self, ServiceError>;

    /// Short human-readable name, used in history lines.
    fn title(&self) -> &str;
}

impl Record for InspectionRecord {
    const KIND: ParentKind = ParentKind::Inspection;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn set_owner(&mut self, owner: String) {
        self.owner = owner;
    }

    fn ingest(value: Value) -> Result<Self, ServiceError> {
        ingest_inspection(value)
    }

    fn title(&self) -> &str {
        &self.product_name
    }
}

impl Record for QualityItem {
    const KIND: ParentKind = ParentKind::Quality;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn set_owner(&mut self, owner: String) {
        self.owner = owner;
    }

    fn ingest(value: Value) -> Result<Self, ServiceError> {
        ingest_quality_item(value)
    }

    fn title(&self) -> &str {
        &self.title
    }
}

// ---------------------------------------------------------------------------
// RecordRepository
// ---------------------------------------------------------------------------

/// Storage for one record collection.
#[async_trait]
pub trait RecordRepository<R: Record>: Send + Sync + 'static {
    /// The whole collection, newest first.
    async fn list(&self) -> Result<Vec<R>, ServiceError>;

    async fn get(&self, id: &str) -> Result<R, ServiceError>;

    /// Store a new record and return it as stored (with its id).
    async fn create(&self, record: R) -> Result<R, ServiceError>;

    /// Replace an existing record.
    async fn update(&self, record: R) -> Result<R, ServiceError>;

    async fn delete(&self, id: &str) -> Result<(), ServiceError>;
}

// ---------------------------------------------------------------------------
// MemoryRepository
// ---------------------------------------------------------------------------

/// In-process repository. Optionally sleeps before every call to stand in
/// for a slow backend.
pub struct MemoryRepository<R> {
    records: RwLock<Vec<R>>,
    latency: Option<Duration>,
}

impl<R: Record> MemoryRepository<R> {
    pub fn new() -> Self {
        Self::seeded(Vec::new())
    }

    /// Start with `records`, already in newest-first order.
    pub fn seeded(records: Vec<R>) -> Self {
        Self {
            records: RwLock::new(records),
            latency: None,
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    async fn pause(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn not_found(id: &str) -> ServiceError {
        ServiceError::NotFound(format!("{} {id}", R::KIND))
    }
}

impl<R: Record> Default for MemoryRepository<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<R: Record> RecordRepository<R> for MemoryRepository<R> {
    async fn list(&self) -> Result<Vec<R>, ServiceError> {
        self.pause().await;
        Ok(self.records.read().await.clone())
    }

    async fn get(&self, id: &str) -> Result<R, ServiceError> {
        self.pause().await;
        self.records
            .read()
            .await
            .iter()
            .find(|r| r.id() == id)
            .cloned()
            .ok_or_else(|| Self::not_found(id))
    }

    async fn create(&self, mut record: R) -> Result<R, ServiceError> {
        self.pause().await;
        let mut records = self.records.write().await;
        if record.id().is_empty() {
            record.set_id(new_id());
        } else if records.iter().any(|r| r.id() == record.id()) {
            return Err(ServiceError::Conflict(format!(
                "{} {} already exists",
                R::KIND,
                record.id()
            )));
        }
        records.insert(0, record.clone());
        Ok(record)
    }

    async fn update(&self, record: R) -> Result<R, ServiceError> {
        self.pause().await;
        let mut records = self.records.write().await;
        let slot = records
            .iter_mut()
            .find(|r| r.id() == record.id())
            .ok_or_else(|| Self::not_found(record.id()))?;
        *slot = record.clone();
        Ok(record)
    }

    async fn delete(&self, id: &str) -> Result<(), ServiceError> {
        self.pause().await;
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|r| r.id() != id);
        if records.len() == before {
            return Err(Self::not_found(id));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RestRepository
// ---------------------------------------------------------------------------

/// Collection responses come back either as a bare array or wrapped.
#[derive(Deserialize)]
#[serde(untagged)]
enum ListBody {
    Bare(Vec<Value>),
    Wrapped(ListResult<Value>),
}

fn decode_list<R: Record>(body: Value) -> Result<Vec<R>, ServiceError> {
    let values = match serde_json::from_value(body)
        .map_err(|e| ServiceError::Internal(format!("decode: {} list: {e}", R::KIND)))?
    {
        ListBody::Bare(items) | ListBody::Wrapped(ListResult { items, .. }) => items,
    };
    values.into_iter().map(R::ingest).collect()
}

/// A write response that carries the stored record. The backend usually
/// answers `{"message": ...}` instead.
fn echoed<R: Record>(body: Value) -> Option<R> {
    R::ingest(body).ok().filter(|r| !r.id().is_empty())
}

/// The listed record a create most likely produced: same company and
/// title, highest numeric id, newest on ties.
fn newest_match<R: Record>(listed: Vec<R>, sent: &R) -> Option<R> {
    listed
        .into_iter()
        .enumerate()
        .filter(|(_, r)| r.company() == sent.company() && r.title() == sent.title())
        .max_by_key(|(i, r)| (r.id().parse::<u64>().unwrap_or(0), std::cmp::Reverse(*i)))
        .map(|(_, r)| r)
}

/// Repository over the REST backend: `GET|POST {path}`,
/// `GET|PUT|DELETE {path}/{id}`.
///
/// Writes that come back without the record keep the record as sent. A
/// create then lists the collection to learn the id the backend assigned;
/// when no listed record matches, the record is returned with an empty id.
pub struct RestRepository<R> {
    client: ApiClient,
    path: String,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> RestRepository<R> {
    pub fn new(client: ApiClient, path: impl Into<String>) -> Self {
        Self {
            client,
            path: path.into().trim_end_matches('/').to_string(),
            _record: PhantomData,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn item_path(&self, id: &str) -> String {
        format!("{}/{id}", self.path)
    }
}

#[async_trait]
impl<R: Record> RecordRepository<R> for RestRepository<R> {
    async fn list(&self) -> Result<Vec<R>, ServiceError> {
        let body: Value = self.client.get_json(&self.path).await?;
        let records = decode_list(body)?;
        debug!(path = %self.path, count = records.len(), "fetched collection");
        Ok(records)
    }

    async fn get(&self, id: &str) -> Result<R, ServiceError> {
        let body: Value = self.client.get_json(&self.item_path(id)).await?;
        R::ingest(body)
    }

    async fn create(&self, record: R) -> Result<R, ServiceError> {
        let body: Value = self.client.post_json(&self.path, &record).await?;
        if let Some(stored) = echoed::<R>(body) {
            return Ok(stored);
        }
        match newest_match(self.list().await?, &record) {
            Some(stored) => Ok(stored),
            None => {
                warn!(
                    path = %self.path,
                    title = %record.title(),
                    "created record not found in listing"
                );
                Ok(record)
            }
        }
    }

    async fn update(&self, record: R) -> Result<R, ServiceError> {
        let body: Value = self
            .client
            .put_json(&self.item_path(record.id()), &record)
            .await?;
        Ok(echoed::<R>(body).unwrap_or(record))
    }

    async fn delete(&self, id: &str) -> Result<(), ServiceError> {
        self.client.delete(&self.item_path(id)).await?;
        Ok(())
    }
}
