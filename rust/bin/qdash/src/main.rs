//! `qdash`: KPI, chart-series and list reports over inspection and
//! quality-improvement records.
//!
//! Records come from a JSON file (`--input`) or from the REST backend named
//! by the config's `api_base`. Reports go to stdout; logs go to stderr.

mod commands;
mod source;
mod table;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use qdash_core::{Clock, FixedClock, ServiceConfig, SystemClock};

use commands::{Context, FilterArgs, GroupBy, Kind, Output, SourceArgs, StatsArgs};

/// Inspection and quality dashboard reports.
#[derive(Parser, Debug)]
#[command(name = "qdash", about = "Inspection and quality dashboard reports")]
struct Cli {
    /// Path to a TOML config file.
    #[arg(long = "config", global = true)]
    config: Option<PathBuf>,

    /// Config override, e.g. `--set api-base=http://10.0.0.5:5000` or
    /// `--set quality-path=/api/improvements`. Repeatable.
    #[arg(long = "set", global = true, value_name = "KEY=VALUE")]
    overrides: Vec<String>,

    /// Reference date for statuses and time windows (default: today).
    #[arg(long, global = true, value_name = "YYYY-MM-DD")]
    today: Option<NaiveDate>,

    /// Output format.
    #[arg(long = "output", short = 'o', global = true, value_enum, default_value_t = Output::Table)]
    output: Output,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Status counts for the KPI cards.
    Kpi {
        #[command(flatten)]
        source: SourceArgs,
        #[arg(long, value_enum, default_value_t = Kind::Inspection)]
        kind: Kind,
        #[command(flatten)]
        filters: FilterArgs,
    },

    /// Defective quantity per company, product or defect reason.
    Series {
        #[command(flatten)]
        source: SourceArgs,
        /// Group key.
        #[arg(long, value_enum)]
        by: GroupBy,
        /// Leave out groups that sum to zero (always on for reasons).
        #[arg(long)]
        drop_zero: bool,
        #[command(flatten)]
        filters: FilterArgs,
    },

    /// Records with their derived status.
    List {
        #[command(flatten)]
        source: SourceArgs,
        #[arg(long, value_enum, default_value_t = Kind::Inspection)]
        kind: Kind,
        #[command(flatten)]
        filters: FilterArgs,
    },

    /// The statistics screen: KPI plus company, product and reason charts.
    Stats {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        query: StatsArgs,
    },
}

/// Resolve config and clock, then run the selected report.
async fn run(cli: Cli) -> anyhow::Result<String> {
    let mut config = match &cli.config {
        Some(path) => ServiceConfig::load(path)?,
        None => ServiceConfig::default(),
    };
    let overrides: Vec<String> = cli.overrides.iter().map(|kv| format!("--{kv}")).collect();
    config.apply_args(&overrides);

    let clock: Arc<dyn Clock> = match cli.today {
        Some(date) => Arc::new(FixedClock(date)),
        None => Arc::new(SystemClock),
    };
    let ctx = Context {
        config,
        clock,
        output: cli.output,
    };

    match cli.command {
        Commands::Kpi {
            source,
            kind,
            filters,
        } => commands::kpi(&ctx, &source, kind, &filters).await,
        Commands::Series {
            source,
            by,
            drop_zero,
            filters,
        } => commands::series(&ctx, &source, by, drop_zero, &filters).await,
        Commands::List {
            source,
            kind,
            filters,
        } => commands::list(&ctx, &source, kind, &filters).await,
        Commands::Stats { source, query } => commands::stats(&ctx, &source, &query).await,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let report = run(Cli::parse()).await?;
    print!("{report}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const RECORDS: &str = r#"[
        {"id": 1, "username": "kim", "company_name": "Acme", "product_name": "bracket",
         "inspected_quantity": 100, "defective_quantity": 6, "defect_reason": "용접",
         "received_date": "2025-09-01", "target_date": "2020-01-01", "progress_percentage": 100},
        {"id": 2, "username": "lee", "company_name": "Globex", "product_name": "hinge",
         "inspected_quantity": 50, "defective_quantity": 0, "defect_reason": "절곡",
         "received_date": "2025-09-10", "target_date": "2025-09-14", "progress_percentage": 50},
        {"id": 3, "username": "kim", "company_name": "Acme", "product_name": "bracket",
         "inspected_quantity": "80", "defective_quantity": "2", "defect_reason": "가공",
         "received_date": "2024-05-10", "target_date": "2025-09-16", "progress_percentage": "50"}
    ]"#;

    fn input_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(RECORDS.as_bytes()).unwrap();
        file
    }

    async fn report(args: &[&str]) -> anyhow::Result<String> {
        let cli = Cli::try_parse_from(args.iter().copied())?;
        run(cli).await
    }

    #[tokio::test]
    async fn kpi_json() {
        let file = input_file();
        let path = file.path().to_str().unwrap();
        let out = report(&["qdash", "kpi", "--input", path, "--today", "2025-09-15", "-o", "json"])
            .await
            .unwrap();
        let kpi: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(kpi["completed"], 1);
        assert_eq!(kpi["delayed"], 1);
        assert_eq!(kpi["inProgress"], 1);
        assert_eq!(kpi["total"], 3);
    }

    #[tokio::test]
    async fn kpi_table_with_filters() {
        let file = input_file();
        let path = file.path().to_str().unwrap();
        let out = report(&[
            "qdash", "kpi", "--input", path, "--today", "2025-09-15", "--owner", "kim",
            "--window", "year",
        ])
        .await
        .unwrap();
        assert!(out.contains("완료"));
        assert!(out.lines().any(|l| l.starts_with("total") && l.contains('1')));
    }

    #[tokio::test]
    async fn series_by_company_keeps_zero_groups() {
        let file = input_file();
        let path = file.path().to_str().unwrap();
        let out = report(&["qdash", "series", "--input", path, "--by", "company", "-o", "json"])
            .await
            .unwrap();
        let points: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(
            points,
            serde_json::json!([{"label": "Acme", "value": 8}, {"label": "Globex", "value": 0}])
        );

        let out = report(&[
            "qdash", "series", "--input", path, "--by", "company", "--drop-zero", "-o", "json",
        ])
        .await
        .unwrap();
        let points: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(points.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn series_by_reason_for_product() {
        let file = input_file();
        let path = file.path().to_str().unwrap();
        let out = report(&[
            "qdash", "series", "--input", path, "--by", "reason", "--product", "bracket", "-o",
            "json",
        ])
        .await
        .unwrap();
        let points: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(
            points,
            serde_json::json!([{"label": "용접", "value": 6}, {"label": "가공", "value": 2}])
        );
    }

    #[tokio::test]
    async fn list_by_status() {
        let file = input_file();
        let path = file.path().to_str().unwrap();
        let out = report(&[
            "qdash", "list", "--input", path, "--today", "2025-09-15", "--status", "delayed",
            "-o", "json",
        ])
        .await
        .unwrap();
        let rows: serde_json::Value = serde_json::from_str(&out).unwrap();
        let rows = rows.as_array().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], "2");
        assert_eq!(rows[0]["status"], "delayed");

        let table = report(&["qdash", "list", "--input", path, "--today", "2025-09-15"])
            .await
            .unwrap();
        assert!(table.starts_with("ID"));
        assert_eq!(table.lines().count(), 4);
    }

    #[tokio::test]
    async fn stats_report() {
        let file = input_file();
        let path = file.path().to_str().unwrap();
        let out = report(&[
            "qdash", "stats", "--input", path, "--today", "2025-09-15", "--window", "month",
            "--company", "Acme", "-o", "json",
        ])
        .await
        .unwrap();
        let stats: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(stats["records"], 1);
        assert_eq!(stats["productOptions"], serde_json::json!(["bracket"]));
    }

    #[tokio::test]
    async fn config_file_and_overrides() {
        let mut config = tempfile::NamedTempFile::new().unwrap();
        writeln!(config, "admin = \"test\"\ncold_start_ms = 100").unwrap();
        let file = input_file();
        let out = report(&[
            "qdash",
            "kpi",
            "--config",
            config.path().to_str().unwrap(),
            "--set",
            "cold-start-ms=250",
            "--input",
            file.path().to_str().unwrap(),
            "-o",
            "json",
        ])
        .await
        .unwrap();
        assert!(out.contains("\"total\": 3"));
    }

    #[tokio::test]
    async fn bad_input_names_the_record() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br#"[{"owner": "kim", "company": "Acme"}, {"owner": "kim"}]"#)
            .unwrap();
        let err = report(&["qdash", "list", "--input", file.path().to_str().unwrap()])
            .await
            .unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("record 1"));
        assert!(message.contains("company is required"));
    }

    /// A backend that wants kim's bearer token on every listing.
    async fn serve_backend() -> String {
        use axum::Json;
        use axum::http::{HeaderMap, StatusCode};
        use axum::routing::{get, post};
        use serde_json::{Value, json};

        async fn login(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
            if body["username"] == "kim" && body["password"] == "secret" {
                let reply = json!({"message": "Login successful", "token": "kim-token"});
                (StatusCode::OK, Json(reply))
            } else {
                (StatusCode::UNAUTHORIZED, Json(json!({"message": "Invalid credentials"})))
            }
        }

        async fn inspections(headers: HeaderMap) -> (StatusCode, Json<Value>) {
            let authed = headers
                .get("authorization")
                .is_some_and(|v| v.as_bytes() == b"Bearer kim-token");
            if !authed {
                return (StatusCode::UNAUTHORIZED, Json(json!({"message": "Token is invalid!"})));
            }
            (StatusCode::OK, Json(serde_json::from_str(RECORDS).unwrap()))
        }

        let app = axum::Router::new()
            .route("/api/login", post(login))
            .route("/api/inspections", get(inspections));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("api-base=http://{addr}")
    }

    #[tokio::test]
    async fn kpi_from_the_backend_after_login() {
        let base = serve_backend().await;
        let out = report(&[
            "qdash", "kpi", "--set", &base, "--user", "kim", "--password", "secret", "--today",
            "2025-09-15", "-o", "json",
        ])
        .await
        .unwrap();
        let kpi: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(kpi["total"], 3);

        let err = report(&[
            "qdash", "kpi", "--set", &base, "--user", "kim", "--password", "guess",
        ])
        .await
        .unwrap_err();
        assert!(format!("{err:#}").contains("Invalid credentials"));

        let err = report(&["qdash", "kpi", "--set", &base]).await.unwrap_err();
        assert!(format!("{err:#}").contains("Token is invalid!"));
    }

    #[tokio::test]
    async fn quality_needs_a_path_or_a_file() {
        let err = report(&["qdash", "list", "--kind", "quality"])
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("quality_path"));
    }

    #[test]
    fn password_requires_a_user() {
        assert!(Cli::try_parse_from(["qdash", "kpi", "--password", "secret"]).is_err());
        assert!(Cli::try_parse_from(["qdash", "kpi", "--user", "kim"]).is_err());
    }

    #[test]
    fn rejects_unknown_status() {
        let err = Cli::try_parse_from(["qdash", "kpi", "--status", "finished"]).unwrap_err();
        assert!(err.to_string().contains("finished"));
    }
}
