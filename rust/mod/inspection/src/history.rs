use std::sync::Arc;

use async_trait::async_trait;
use qdash_client::ApiClient;
use qdash_core::{ServiceError, new_id, now_rfc3339};
use tokio::sync::RwLock;
use tracing::debug;

use crate::model::{HistoryEntry, ParentRef};

/// Storage for change history. Append-only: there is no update or delete.
#[async_trait]
pub trait HistoryRepository: Send + Sync + 'static {
    async fn append(&self, entry: HistoryEntry) -> Result<HistoryEntry, ServiceError>;

    /// Entries for `parent`, oldest first.
    async fn list(&self, parent: &ParentRef) -> Result<Vec<HistoryEntry>, ServiceError>;
}

#[derive(Default)]
pub struct MemoryHistoryRepository {
    entries: RwLock<Vec<HistoryEntry>>,
}

impl MemoryHistoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryRepository for MemoryHistoryRepository {
    async fn append(&self, entry: HistoryEntry) -> Result<HistoryEntry, ServiceError> {
        self.entries.write().await.push(entry.clone());
        Ok(entry)
    }

    async fn list(&self, parent: &ParentRef) -> Result<Vec<HistoryEntry>, ServiceError> {
        Ok(self
            .entries
            .read()
            .await
            .iter()
            .filter(|e| &e.parent == parent)
            .cloned()
            .collect())
    }
}

/// History endpoint of the REST backend: `GET /api/histories/{type}/{id}`.
///
/// The backend writes history itself when it applies a change, so
/// `append` only hands the entry back.
pub struct RestHistoryRepository {
    client: ApiClient,
}

impl RestHistoryRepository {
    pub const PATH: &'static str = "/api/histories";

    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    fn timeline_path(parent: &ParentRef) -> String {
        format!("{}/{}/{}", Self::PATH, parent.kind, parent.id)
    }
}

#[async_trait]
impl HistoryRepository for RestHistoryRepository {
    async fn append(&self, entry: HistoryEntry) -> Result<HistoryEntry, ServiceError> {
        debug!(parent = %entry.parent, action = %entry.action, "history kept by the backend");
        Ok(entry)
    }

    async fn list(&self, parent: &ParentRef) -> Result<Vec<HistoryEntry>, ServiceError> {
        let entries: Vec<HistoryEntry> =
            self.client.get_json(&Self::timeline_path(parent)).await?;
        Ok(entries)
    }
}

/// Append-only change history, one timeline per parent record.
pub struct HistoryLog {
    repo: Arc<dyn HistoryRepository>,
}

impl Default for HistoryLog {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryLog {
    /// A log kept in process.
    pub fn new() -> Self {
        Self::with_repository(Arc::new(MemoryHistoryRepository::new()))
    }

    pub fn with_repository(repo: Arc<dyn HistoryRepository>) -> Self {
        Self { repo }
    }

    pub async fn append(
        &self,
        parent: ParentRef,
        author: impl Into<String>,
        action: impl Into<String>,
    ) -> Result<HistoryEntry, ServiceError> {
        let entry = HistoryEntry {
            id: new_id(),
            parent,
            author: author.into(),
            action: action.into(),
            timestamp: now_rfc3339(),
        };
        debug!(parent = %entry.parent, action = %entry.action, "history appended");
        self.repo.append(entry).await
    }

    /// Entries for `parent`, oldest first.
    pub async fn list(&self, parent: &ParentRef) -> Result<Vec<HistoryEntry>, ServiceError> {
        self.repo.list(parent).await
    }
}
