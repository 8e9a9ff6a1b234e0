//! Where report records come from: a JSON file or the REST backend.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;
use anyhow::anyhow;
use qdash_client::{ApiClient, NoAuth, PasswordLogin, StaticToken, TokenSource};
use qdash_core::OwnerOrAdmin;
use qdash_inspection::{
    Dashboard, LoadTracker, MemoryRepository, Record, RecordRepository, RestRepository,
};
use serde_json::Value;
use tracing::debug;

use crate::commands::{Context, SourceArgs};

/// Validate every record of a JSON array file.
pub fn read_records<R: Record>(path: &Path) -> anyhow::Result<Vec<R>> {
    let text = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let values: Vec<Value> = serde_json::from_str(&text)
        .with_context(|| format!("{}: expected a JSON array of records", path.display()))?;
    values
        .into_iter()
        .enumerate()
        .map(|(i, v)| R::ingest(v).with_context(|| format!("{} record {i}", path.display())))
        .collect()
}

/// `--token` wins over `--user`/`--password`; with neither, requests go
/// out anonymously.
pub fn tokens(ctx: &Context, source: &SourceArgs) -> Arc<dyn TokenSource> {
    match (&source.token, &source.user, &source.password) {
        (Some(token), _, _) => Arc::new(StaticToken::new(token.clone())),
        (None, Some(user), Some(password)) => Arc::new(PasswordLogin::new(
            &ctx.config.api_base,
            user.clone(),
            password.clone(),
        )),
        _ => Arc::new(NoAuth),
    }
}

/// Build a dashboard over the chosen source and load its snapshot.
///
/// `backend_path` is the collection path on the backend; `None` means the
/// backend does not serve this kind and only `--input` can supply it.
pub async fn open<R: Record>(
    ctx: &Context,
    source: &SourceArgs,
    backend_path: Option<&str>,
) -> anyhow::Result<Dashboard<R>> {
    let repo: Arc<dyn RecordRepository<R>> = match (&source.input, backend_path) {
        (Some(path), _) => Arc::new(MemoryRepository::seeded(read_records::<R>(path)?)),
        (None, Some(backend_path)) => {
            let client = ApiClient::new(&ctx.config.api_base, tokens(ctx, source));
            Arc::new(RestRepository::<R>::new(client, backend_path))
        }
        (None, None) => {
            return Err(anyhow!(
                "no backend path for {} records: pass --input or set quality_path",
                R::KIND
            ));
        }
    };

    let dash = Dashboard::new(repo)
        .with_clock(Arc::clone(&ctx.clock))
        .with_authorizer(Arc::new(OwnerOrAdmin::new(ctx.config.admin.clone())))
        .with_loads(Arc::new(LoadTracker::new(ctx.config.cold_start_after())));

    if source.input.is_none() {
        // Cold-start notices go to stderr.
        let mut rx = dash.loads().subscribe();
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                if let Some(message) = rx.borrow_and_update().message.clone() {
                    eprintln!("{message}");
                }
            }
        });
    }

    let count = dash
        .refresh()
        .await
        .with_context(|| format!("load {}", R::KIND))?;
    debug!(kind = %R::KIND, count, "records loaded");
    Ok(dash)
}
