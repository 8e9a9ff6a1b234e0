//! Inspection-defect and quality-improvement dashboard core.
//!
//! The pure layer turns records into statuses, filtered subsets and KPI
//! series ([`status`], [`filter`], [`kpi`], [`stats`]); [`ingest`] validates
//! raw JSON into the typed [`model`]. The service layer ([`store`],
//! [`dashboard`], [`comments`], [`history`], [`load`]) is async and talks to
//! an injected repository.

pub mod comments;
pub mod dashboard;
pub mod filter;
pub mod history;
pub mod ingest;
pub mod kpi;
pub mod load;
pub mod model;
pub mod stats;
pub mod status;
pub mod store;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use qdash_client::ApiClient;
use qdash_core::{Clock, OwnerOrAdmin, ServiceConfig, ServiceError};
use tracing::warn;

pub use comments::{
    CommentRepository, CommentStore, MemoryCommentRepository, RestCommentRepository,
};
pub use dashboard::Dashboard;
pub use filter::{FilterOptions, FilterSpec, Selection, TimeWindow, apply_filters};
pub use history::{HistoryLog, HistoryRepository, MemoryHistoryRepository, RestHistoryRepository};
pub use kpi::{GroupOptions, GroupPoint, KpiSummary, aggregate_by_group, aggregate_kpi};
pub use load::{LoadState, LoadTracker};
pub use model::{
    Comment, DefectReason, HistoryEntry, InspectionRecord, ParentKind, ParentRef, QualityItem,
    Status,
};
pub use stats::{Statistics, StatisticsQuery};
pub use status::{Classified, classify, derive_status};
pub use store::{MemoryRepository, Record, RecordRepository, RestRepository};

/// Backend collection of inspection records.
pub const INSPECTIONS_PATH: &str = "/api/inspections";

/// Outcome of [`Workspace::refresh`], one result per collection.
#[derive(Debug)]
pub struct Refreshed {
    pub inspections: Result<usize, ServiceError>,
    pub quality: Result<usize, ServiceError>,
}

/// Both dashboards wired to one set of shared services: the comment
/// threads, the history log and the load tracker.
pub struct Workspace {
    inspections: Dashboard<InspectionRecord>,
    quality: Dashboard<QualityItem>,
    comments: Arc<CommentStore>,
    history: Arc<HistoryLog>,
    loads: Arc<LoadTracker>,
}

impl Workspace {
    /// Build from explicit repositories, with comments and history kept in
    /// process.
    pub fn new(
        config: &ServiceConfig,
        clock: Arc<dyn Clock>,
        inspections: Arc<dyn RecordRepository<InspectionRecord>>,
        quality: Arc<dyn RecordRepository<QualityItem>>,
    ) -> Self {
        Self::assemble(
            config,
            clock,
            inspections,
            quality,
            Arc::new(CommentStore::new()),
            Arc::new(HistoryLog::new()),
        )
    }

    /// Build against the REST backend at `client`'s base URL. Quality items
    /// come from `config.quality_path` when set and stay in process
    /// otherwise.
    pub fn rest(config: &ServiceConfig, clock: Arc<dyn Clock>, client: ApiClient) -> Self {
        let inspections =
            RestRepository::<InspectionRecord>::new(client.clone(), INSPECTIONS_PATH);
        let quality: Arc<dyn RecordRepository<QualityItem>> = match &config.quality_path {
            Some(path) => Arc::new(RestRepository::<QualityItem>::new(client.clone(), path)),
            None => Arc::new(MemoryRepository::<QualityItem>::new()),
        };
        let comments = RestCommentRepository::new(client.clone());
        let history = RestHistoryRepository::new(client);
        Self::assemble(
            config,
            clock,
            Arc::new(inspections),
            quality,
            Arc::new(CommentStore::with_repository(Arc::new(comments))),
            Arc::new(HistoryLog::with_repository(Arc::new(history))),
        )
    }

    fn assemble(
        config: &ServiceConfig,
        clock: Arc<dyn Clock>,
        inspections: Arc<dyn RecordRepository<InspectionRecord>>,
        quality: Arc<dyn RecordRepository<QualityItem>>,
        comments: Arc<CommentStore>,
        history: Arc<HistoryLog>,
    ) -> Self {
        let authorizer = Arc::new(OwnerOrAdmin::new(config.admin.clone()));
        let loads = Arc::new(LoadTracker::new(config.cold_start_after()));

        let inspections = Dashboard::new(inspections)
            .with_clock(Arc::clone(&clock))
            .with_authorizer(authorizer.clone())
            .with_comments(Arc::clone(&comments))
            .with_history(Arc::clone(&history))
            .with_loads(Arc::clone(&loads));
        let quality = Dashboard::new(quality)
            .with_clock(clock)
            .with_authorizer(authorizer)
            .with_comments(Arc::clone(&comments))
            .with_history(Arc::clone(&history))
            .with_loads(Arc::clone(&loads));

        Self {
            inspections,
            quality,
            comments,
            history,
            loads,
        }
    }

    pub fn inspections(&self) -> &Dashboard<InspectionRecord> {
        &self.inspections
    }

    pub fn quality(&self) -> &Dashboard<QualityItem> {
        &self.quality
    }

    pub fn comments(&self) -> &Arc<CommentStore> {
        &self.comments
    }

    pub fn history(&self) -> &Arc<HistoryLog> {
        &self.history
    }

    pub fn loads(&self) -> &Arc<LoadTracker> {
        &self.loads
    }

    /// Refresh both collections concurrently. A failing collection keeps
    /// its previous snapshot and does not hold back the other.
    pub async fn refresh(&self) -> Refreshed {
        let (inspections, quality) =
            tokio::join!(self.inspections.refresh(), self.quality.refresh());
        if let Err(e) = &inspections {
            warn!(error = %e, "inspection refresh failed");
        }
        if let Err(e) = &quality {
            warn!(error = %e, "quality refresh failed");
        }
        Refreshed {
            inspections,
            quality,
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::Json;
    use axum::Router;
    use axum::extract::Path;
    use axum::http::StatusCode;
    use axum::routing::{get, put};
    use chrono::NaiveDate;
    use qdash_core::FixedClock;
    use serde_json::{Value, json};

    use super::*;
    use crate::testing::serve;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 9, 15).unwrap()
    }

    #[tokio::test]
    async fn raw_records_to_kpi_cards() {
        let raw = json!([
            {"id": 1, "username": "kim", "company_name": "Acme",
             "progress_percentage": 100, "target_date": "2020-01-01"},
            {"id": 2, "username": "kim", "company_name": "Acme",
             "progress_percentage": 50, "target_date": "2025-09-14"},
            {"id": 3, "username": "kim", "company_name": "Acme",
             "progress_percentage": 50, "target_date": "2025-09-16"}
        ]);
        let records = ingest::ingest_inspections(&raw.to_string()).unwrap();

        let workspace = Workspace::new(
            &ServiceConfig::default(),
            Arc::new(FixedClock(today())),
            Arc::new(MemoryRepository::seeded(records)),
            Arc::new(MemoryRepository::<QualityItem>::new()),
        );
        let refreshed = workspace.refresh().await;
        assert_eq!(refreshed.inspections, Ok(3));
        assert_eq!(refreshed.quality, Ok(0));

        let dash = workspace.inspections();
        let statuses: Vec<_> = dash.classified().await.iter().map(|c| c.status).collect();
        assert_eq!(statuses, [Status::Completed, Status::Delayed, Status::InProgress]);

        let kpi = dash.kpi(&FilterSpec::reset()).await;
        assert_eq!(
            kpi,
            KpiSummary {
                completed: 1,
                in_progress: 1,
                delayed: 1,
                total: 3
            }
        );
    }

    #[tokio::test]
    async fn dashboards_share_services() {
        let config = ServiceConfig {
            admin: Some("test".into()),
            ..ServiceConfig::default()
        };
        let item = QualityItem {
            id: "q1".into(),
            owner: "lee".into(),
            company: "현대모비스".into(),
            title: "브레이크 소음 감소".into(),
            category: Some("소음".into()),
            start_date: None,
            end_date: None,
            progress_percentage: 20,
        };
        let workspace = Workspace::new(
            &config,
            Arc::new(FixedClock(today())),
            Arc::new(MemoryRepository::<InspectionRecord>::new()),
            Arc::new(MemoryRepository::seeded(vec![item.clone()])),
        );
        assert_eq!(workspace.refresh().await.quality, Ok(1));

        let mut edit = item;
        edit.progress_percentage = 60;
        workspace.quality().update("test", edit).await.unwrap();

        let parent = ParentRef::new(ParentKind::Quality, "q1");
        assert_eq!(workspace.history().list(&parent).await.unwrap().len(), 1);
        workspace
            .comments()
            .add(parent.clone(), "lee", "진행 중")
            .await
            .unwrap();
        let thread = workspace.quality().comments().list(&parent).await.unwrap();
        assert_eq!(thread.len(), 1);
        assert_eq!(workspace.loads().current(), LoadState::idle());
    }

    /// Serves inspections, comments and histories the way the backend does.
    /// There is no quality collection.
    fn inspection_backend() -> Router {
        async fn list() -> Json<Value> {
            Json(json!([
                {"id": 3, "username": "kim", "company_name": "Acme", "product_name": "bracket",
                 "inspected_quantity": 100, "defective_quantity": 4,
                 "received_date": "2025-09-10", "target_date": "2025-09-14",
                 "progress_percentage": 50}
            ]))
        }
        async fn edit(Path(_id): Path<u64>) -> Json<Value> {
            Json(json!({"message": "Inspection updated successfully"}))
        }
        async fn thread() -> Json<Value> {
            Json(json!([]))
        }
        async fn timeline(Path((kind, id)): Path<(String, String)>) -> Json<Value> {
            Json(json!([
                {"id": 1, "parent_type": kind, "parent_id": id, "username": "kim",
                 "action": "created bracket", "created_at": "2025-09-10T08:00:00"}
            ]))
        }
        Router::new()
            .route("/api/inspections", get(list))
            .route("/api/inspections/{id}", put(edit))
            .route("/api/comments/{kind}/{id}", get(thread))
            .route("/api/histories/{kind}/{id}", get(timeline))
            .fallback(|| async { (StatusCode::NOT_FOUND, Json(json!({"message": "Not Found"}))) })
    }

    #[tokio::test]
    async fn quality_stays_in_process_without_a_backend_path() {
        let client = serve(inspection_backend()).await;
        let workspace =
            Workspace::rest(&ServiceConfig::default(), Arc::new(FixedClock(today())), client);

        let refreshed = workspace.refresh().await;
        assert_eq!(refreshed.inspections, Ok(1));
        assert_eq!(refreshed.quality, Ok(0));

        let kpi = workspace.inspections().kpi(&FilterSpec::reset()).await;
        assert_eq!(kpi.delayed, 1);

        let parent = ParentRef::new(ParentKind::Inspection, "3");
        let mut edit = workspace.inspections().get("3").await.unwrap();
        edit.progress_percentage = 100;
        let updated = workspace.inspections().update("kim", edit).await.unwrap();
        assert_eq!(updated.progress_percentage, 100);
        assert_eq!(workspace.inspections().kpi(&FilterSpec::reset()).await.completed, 1);

        let timeline = workspace.history().list(&parent).await.unwrap();
        assert_eq!(timeline[0].action, "created bracket");
        assert!(workspace.comments().list(&parent).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn a_missing_quality_collection_does_not_block_inspections() {
        let config = ServiceConfig {
            quality_path: Some("/api/quality".into()),
            ..ServiceConfig::default()
        };
        let client = serve(inspection_backend()).await;
        let workspace = Workspace::rest(&config, Arc::new(FixedClock(today())), client);

        let refreshed = workspace.refresh().await;
        assert_eq!(refreshed.inspections, Ok(1));
        assert_eq!(refreshed.quality, Err(ServiceError::NotFound("Not Found".into())));
        assert_eq!(workspace.inspections().records().await.len(), 1);
        assert!(workspace.quality().records().await.is_empty());
    }
}
