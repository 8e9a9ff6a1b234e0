//! Report commands. Each returns the rendered report; `main` prints it.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, ValueEnum};
use qdash_core::{Clock, ServiceConfig};
use qdash_inspection::kpi::{AsInspection, defect_reasons_for_product};
use qdash_inspection::{
    Classified, FilterSpec, GroupOptions, GroupPoint, INSPECTIONS_PATH, InspectionRecord,
    KpiSummary, QualityItem, Record, Selection, Statistics, StatisticsQuery, Status,
    TimeWindow, aggregate_by_group, filter::Facets,
};
use serde::Serialize;

use crate::{source, table};

/// Resolved global options.
pub struct Context {
    pub config: ServiceConfig,
    pub clock: Arc<dyn Clock>,
    pub output: Output,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Output {
    Table,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Kind {
    Inspection,
    Quality,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GroupBy {
    Company,
    Product,
    Reason,
}

#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// Read records from a JSON array file instead of the backend.
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Bearer token for the backend.
    #[arg(long)]
    pub token: Option<String>,

    /// Log in to the backend as this user (with `--password`).
    #[arg(long, requires = "password")]
    pub user: Option<String>,

    #[arg(long, requires = "user")]
    pub password: Option<String>,
}

fn parse_status(value: &str) -> Result<Selection<Status>, String> {
    Selection::<Status>::parse(value)
        .ok_or_else(|| format!("expected all, delayed, inProgress or completed, got {value}"))
}

fn parse_window(value: &str) -> Result<TimeWindow, String> {
    TimeWindow::parse(value).ok_or_else(|| format!("expected all, day, month or year, got {value}"))
}

/// List-screen filters. Omitted and `all` values are wildcards.
#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    #[arg(long)]
    pub owner: Option<String>,
    #[arg(long)]
    pub company: Option<String>,
    #[arg(long)]
    pub product: Option<String>,
    #[arg(long, value_parser = parse_status)]
    pub status: Option<Selection<Status>>,
    #[arg(long, value_parser = parse_window)]
    pub window: Option<TimeWindow>,
}

impl FilterArgs {
    pub fn spec(&self) -> FilterSpec {
        let text = |v: &Option<String>| {
            v.as_deref()
                .map(Selection::<String>::parse)
                .unwrap_or_default()
        };
        FilterSpec {
            owner: text(&self.owner),
            company: text(&self.company),
            product: text(&self.product),
            status: self.status.clone().unwrap_or_default(),
            time_window: self.window.unwrap_or_default(),
        }
    }
}

/// Statistics screen selections.
#[derive(Args, Debug, Clone, Default)]
pub struct StatsArgs {
    #[arg(long, value_parser = parse_window)]
    pub window: Option<TimeWindow>,
    #[arg(long)]
    pub company: Option<String>,
    #[arg(long)]
    pub product: Option<String>,
}

impl StatsArgs {
    pub fn query(&self) -> StatisticsQuery {
        StatisticsQuery::default()
            .with_window(self.window.unwrap_or_default())
            .with_company(self.company.clone())
            .with_product(self.product.clone())
    }
}

fn emit<T: Serialize>(
    ctx: &Context,
    value: &T,
    table: impl FnOnce() -> String,
) -> anyhow::Result<String> {
    match ctx.output {
        Output::Json => Ok(format!("{}\n", serde_json::to_string_pretty(value)?)),
        Output::Table => Ok(table()),
    }
}

fn non_empty(label: &str) -> String {
    if label.is_empty() {
        "(none)".to_string()
    } else {
        label.to_string()
    }
}

// ---------------------------------------------------------------------------
// kpi
// ---------------------------------------------------------------------------

fn kpi_table(kpi: &KpiSummary) -> String {
    let mut rows: Vec<Vec<String>> = kpi
        .chart_series()
        .iter()
        .map(|(status, count)| {
            vec![
                status.as_str().to_string(),
                status.label().to_string(),
                count.to_string(),
                kpi.percent_label(*status),
            ]
        })
        .collect();
    rows.push(vec!["total".into(), String::new(), kpi.total.to_string(), String::new()]);
    table::render(&["STATUS", "LABEL", "COUNT", "SHARE"], &rows)
}

async fn kpi_for<R: Record>(
    ctx: &Context,
    source: &SourceArgs,
    path: Option<&str>,
    filters: &FilterArgs,
) -> anyhow::Result<String> {
    let dash = source::open::<R>(ctx, source, path).await?;
    let kpi = dash.kpi(&filters.spec()).await;
    emit(ctx, &kpi, || kpi_table(&kpi))
}

pub async fn kpi(
    ctx: &Context,
    source: &SourceArgs,
    kind: Kind,
    filters: &FilterArgs,
) -> anyhow::Result<String> {
    match kind {
        Kind::Inspection => {
            kpi_for::<InspectionRecord>(ctx, source, Some(INSPECTIONS_PATH), filters).await
        }
        Kind::Quality => {
            let path = ctx.config.quality_path.as_deref();
            kpi_for::<QualityItem>(ctx, source, path, filters).await
        }
    }
}

// ---------------------------------------------------------------------------
// series
// ---------------------------------------------------------------------------

pub async fn series(
    ctx: &Context,
    source: &SourceArgs,
    by: GroupBy,
    drop_zero: bool,
    filters: &FilterArgs,
) -> anyhow::Result<String> {
    let dash = source::open::<InspectionRecord>(ctx, source, Some(INSPECTIONS_PATH)).await?;
    let records = dash.filtered(&filters.spec()).await;
    let options = GroupOptions { drop_zero };

    let points: Vec<GroupPoint> = match (by, filters.product.as_deref()) {
        (GroupBy::Company, _) => aggregate_by_group(
            &records,
            |c| Some(c.inspection().company.as_str()),
            |c| c.inspection().defective_quantity,
            options,
        ),
        (GroupBy::Product, _) => aggregate_by_group(
            &records,
            |c| c.product(),
            |c| c.inspection().defective_quantity,
            options,
        ),
        (GroupBy::Reason, Some(product)) => defect_reasons_for_product(&records, product),
        (GroupBy::Reason, None) => aggregate_by_group(
            &records,
            |c| c.inspection().defect_reason.as_ref().map(|r| r.label()),
            |c| c.inspection().defective_quantity,
            GroupOptions::drop_zero(),
        ),
    };

    emit(ctx, &points, || {
        let rows: Vec<Vec<String>> = points
            .iter()
            .map(|p| vec![non_empty(&p.label), p.value.to_string()])
            .collect();
        table::render(&["LABEL", "DEFECTS"], &rows)
    })
}

// ---------------------------------------------------------------------------
// list
// ---------------------------------------------------------------------------

fn list_table<R: Record>(records: &[Classified<R>]) -> String {
    let rows: Vec<Vec<String>> = records
        .iter()
        .map(|c| {
            vec![
                c.record.id().to_string(),
                c.owner().to_string(),
                c.company().to_string(),
                non_empty(c.record.title()),
                format!("{}%", c.record.progress()),
                c.record
                    .deadline()
                    .map_or_else(|| "-".to_string(), |d| d.to_string()),
                c.status.label().to_string(),
            ]
        })
        .collect();
    table::render(
        &["ID", "OWNER", "COMPANY", "ITEM", "PROGRESS", "DEADLINE", "STATUS"],
        &rows,
    )
}

async fn list_for<R: Record>(
    ctx: &Context,
    source: &SourceArgs,
    path: Option<&str>,
    filters: &FilterArgs,
) -> anyhow::Result<String> {
    let dash = source::open::<R>(ctx, source, path).await?;
    let records = dash.filtered(&filters.spec()).await;
    emit(ctx, &records, || list_table(&records))
}

pub async fn list(
    ctx: &Context,
    source: &SourceArgs,
    kind: Kind,
    filters: &FilterArgs,
) -> anyhow::Result<String> {
    match kind {
        Kind::Inspection => {
            list_for::<InspectionRecord>(ctx, source, Some(INSPECTIONS_PATH), filters).await
        }
        Kind::Quality => {
            let path = ctx.config.quality_path.as_deref();
            list_for::<QualityItem>(ctx, source, path, filters).await
        }
    }
}

// ---------------------------------------------------------------------------
// stats
// ---------------------------------------------------------------------------

fn stats_table(stats: &Statistics) -> String {
    let mut out = format!("records: {}\n\n", stats.records);
    out.push_str(&kpi_table(&stats.kpi));

    let mut section = |title: &str, points: &[GroupPoint]| {
        if points.is_empty() {
            return;
        }
        let rows: Vec<Vec<String>> = points
            .iter()
            .map(|p| vec![non_empty(&p.label), p.value.to_string()])
            .collect();
        out.push('\n');
        out.push_str(&table::render(&[title, "DEFECTS"], &rows));
    };
    section("COMPANY", &stats.by_company);
    section("PRODUCT", &stats.by_product);
    section("REASON", &stats.reasons_for_product);
    out
}

pub async fn stats(ctx: &Context, source: &SourceArgs, args: &StatsArgs) -> anyhow::Result<String> {
    let dash = source::open::<InspectionRecord>(ctx, source, Some(INSPECTIONS_PATH)).await?;
    let stats = dash.statistics(&args.query()).await;
    emit(ctx, &stats, || stats_table(&stats))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_args_to_spec() {
        let args = FilterArgs {
            owner: Some("kim".into()),
            company: Some("all".into()),
            product: None,
            status: Some(Selection::Only(Status::Completed)),
            window: Some(TimeWindow::Month),
        };
        let spec = args.spec();
        assert_eq!(spec.owner, Selection::Only("kim".into()));
        assert_eq!(spec.company, Selection::All);
        assert_eq!(spec.product, Selection::All);
        assert_eq!(spec.status, Selection::Only(Status::Completed));
        assert_eq!(spec.time_window, TimeWindow::Month);
        assert!(FilterArgs::default().spec().is_identity());
    }

    #[test]
    fn stats_args_keep_product_with_company() {
        let args = StatsArgs {
            window: None,
            company: Some("Acme".into()),
            product: Some("bracket".into()),
        };
        let query = args.query();
        assert_eq!(query.company.as_deref(), Some("Acme"));
        assert_eq!(query.product.as_deref(), Some("bracket"));
    }

    #[test]
    fn value_parsers() {
        assert!(parse_status("inProgress").is_ok());
        assert!(parse_status("done").is_err());
        assert_eq!(parse_window("year"), Ok(TimeWindow::Year));
        assert!(parse_window("week").is_err());
    }

    #[test]
    fn kpi_table_layout() {
        let kpi = KpiSummary {
            completed: 1,
            in_progress: 2,
            delayed: 1,
            total: 4,
        };
        let out = kpi_table(&kpi);
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[1].starts_with("delayed"));
        assert!(lines[2].contains("50.0%"));
        assert!(lines[4].starts_with("total"));
    }
}
