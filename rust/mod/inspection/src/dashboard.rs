use std::sync::Arc;

use chrono::NaiveDate;
use qdash_core::{Authorizer, Clock, OwnerOrAdmin, ServiceError, SystemClock};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::comments::CommentStore;
use crate::filter::{Facets, FilterOptions, FilterSpec};
use crate::history::HistoryLog;
use crate::kpi::{KpiSummary, aggregate_kpi};
use crate::load::LoadTracker;
use crate::model::{InspectionRecord, ParentRef};
use crate::stats::{Statistics, StatisticsQuery};
use crate::status::{Classified, classify};
use crate::store::{Record, RecordRepository};

/// One record collection as a screen sees it: a cached snapshot of the
/// repository plus ownership-checked mutations.
///
/// Mutations go to the repository first and are then applied to the cached
/// list directly, so the list reflects them without another fetch.
pub struct Dashboard<R: Record> {
    repo: Arc<dyn RecordRepository<R>>,
    clock: Arc<dyn Clock>,
    authorizer: Arc<dyn Authorizer>,
    history: Arc<HistoryLog>,
    comments: Arc<CommentStore>,
    loads: Arc<LoadTracker>,
    cache: RwLock<Vec<R>>,
}

impl<R: Record> Dashboard<R> {
    pub fn new(repo: Arc<dyn RecordRepository<R>>) -> Self {
        Self {
            repo,
            clock: Arc::new(SystemClock),
            authorizer: Arc::new(OwnerOrAdmin::owner_only()),
            history: Arc::new(HistoryLog::new()),
            comments: Arc::new(CommentStore::new()),
            loads: Arc::new(LoadTracker::default()),
            cache: RwLock::new(Vec::new()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_authorizer(mut self, authorizer: Arc<dyn Authorizer>) -> Self {
        self.authorizer = authorizer;
        self
    }

    pub fn with_history(mut self, history: Arc<HistoryLog>) -> Self {
        self.history = history;
        self
    }

    pub fn with_comments(mut self, comments: Arc<CommentStore>) -> Self {
        self.comments = comments;
        self
    }

    pub fn with_loads(mut self, loads: Arc<LoadTracker>) -> Self {
        self.loads = loads;
        self
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub fn history(&self) -> &Arc<HistoryLog> {
        &self.history
    }

    pub fn comments(&self) -> &Arc<CommentStore> {
        &self.comments
    }

    pub fn loads(&self) -> &Arc<LoadTracker> {
        &self.loads
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Fetch the collection and replace the cached snapshot. Returns the
    /// number of records fetched.
    pub async fn refresh(&self) -> Result<usize, ServiceError> {
        let records = self.loads.track(self.repo.list()).await?;
        let count = records.len();
        *self.cache.write().await = records;
        debug!(kind = %R::KIND, count, "snapshot refreshed");
        Ok(count)
    }

    /// The cached records, newest first.
    pub async fn records(&self) -> Vec<R> {
        self.cache.read().await.clone()
    }

    /// The cached records tagged with today's status.
    pub async fn classified(&self) -> Vec<Classified<R>> {
        classify(self.records().await, self.today())
    }

    pub async fn filtered(&self, spec: &FilterSpec) -> Vec<Classified<R>> {
        let today = self.today();
        self.classified()
            .await
            .into_iter()
            .filter(|r| spec.matches(r, today))
            .collect()
    }

    /// KPI cards for the records passing `spec`.
    pub async fn kpi(&self, spec: &FilterSpec) -> KpiSummary {
        aggregate_kpi(&self.filtered(spec).await)
    }

    /// Records owned by `actor`.
    pub async fn my_records(&self, actor: &str) -> Vec<Classified<R>> {
        self.classified()
            .await
            .into_iter()
            .filter(|r| r.owner() == actor)
            .collect()
    }

    pub async fn options(&self) -> FilterOptions {
        FilterOptions::from_records(self.cache.read().await.iter())
    }

    /// A record by id, from the snapshot when cached.
    pub async fn get(&self, id: &str) -> Result<R, ServiceError> {
        let cached = self.cache.read().await.iter().find(|r| r.id() == id).cloned();
        match cached {
            Some(record) => Ok(record),
            None => self.repo.get(id).await,
        }
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    fn parent(id: &str) -> ParentRef {
        ParentRef::new(R::KIND, id)
    }

    fn describe(id: &str) -> String {
        format!("{} {id}", R::KIND)
    }

    /// Append a history line. A failure is logged, never returned.
    async fn note(&self, id: &str, actor: &str, action: String) {
        if let Err(e) = self.history.append(Self::parent(id), actor, action).await {
            warn!(kind = %R::KIND, id, error = %e, "history append failed");
        }
    }

    /// Store a new record owned by `actor` and put it at the top of the list.
    pub async fn create(&self, actor: &str, mut draft: R) -> Result<R, ServiceError> {
        draft.set_owner(actor.to_string());
        let stored = self.loads.track(self.repo.create(draft)).await?;
        self.cache.write().await.insert(0, stored.clone());
        self.note(stored.id(), actor, format!("created {}", stored.title())).await;
        info!(kind = %R::KIND, id = %stored.id(), actor, "record created");
        Ok(stored)
    }

    /// Replace a record. Only its owner (or the admin) may; the owner
    /// itself never changes.
    pub async fn update(&self, actor: &str, mut record: R) -> Result<R, ServiceError> {
        let id = record.id().to_string();
        let existing = self.get(&id).await?;
        self.authorizer
            .check(actor, existing.owner(), &Self::describe(&id))?;

        record.set_owner(existing.owner().to_string());
        let updated = self.loads.track(self.repo.update(record)).await?;
        {
            let mut cache = self.cache.write().await;
            match cache.iter_mut().find(|r| r.id() == id) {
                Some(slot) => *slot = updated.clone(),
                None => cache.insert(0, updated.clone()),
            }
        }
        self.note(&id, actor, change_summary(&existing, &updated)).await;
        info!(kind = %R::KIND, id = %id, actor, "record updated");
        Ok(updated)
    }

    /// Delete a record together with its comment thread.
    pub async fn delete(&self, actor: &str, id: &str) -> Result<(), ServiceError> {
        let existing = self.get(id).await?;
        self.authorizer
            .check(actor, existing.owner(), &Self::describe(id))?;

        self.loads.track(self.repo.delete(id)).await?;
        self.cache.write().await.retain(|r| r.id() != id);
        let dropped = match self.comments.remove_parent(&Self::parent(id)).await {
            Ok(n) => n,
            Err(e) => {
                warn!(kind = %R::KIND, id, error = %e, "comment thread left behind");
                0
            }
        };
        self.note(id, actor, format!("deleted {}", existing.title())).await;
        info!(kind = %R::KIND, id, actor, comments = dropped, "record deleted");
        Ok(())
    }
}

impl Dashboard<InspectionRecord> {
    /// The statistics screen over the cached inspections.
    pub async fn statistics(&self, query: &StatisticsQuery) -> Statistics {
        let records = self.cache.read().await;
        Statistics::compute(records.as_slice(), query, self.today())
    }
}

/// History line for an edit: which tracked fields moved.
fn change_summary<R: Record>(before: &R, after: &R) -> String {
    let mut changes = Vec::new();
    if before.progress() != after.progress() {
        changes.push(format!("progress {}% -> {}%", before.progress(), after.progress()));
    }
    if before.deadline() != after.deadline() {
        let show = |d: Option<NaiveDate>| d.map_or_else(|| "none".to_string(), |d| d.to_string());
        changes.push(format!(
            "deadline {} -> {}",
            show(before.deadline()),
            show(after.deadline())
        ));
    }
    if changes.is_empty() {
        "updated".to_string()
    } else {
        format!("updated: {}", changes.join(", "))
    }
}
