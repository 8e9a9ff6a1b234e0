//! Validation of raw JSON records into typed models.
//!
//! Every front-end variant names the same fields differently
//! (`username`/`manager`, `totalCount`/`inspected_quantity`, ...) and sends
//! numbers as strings about half the time. Records are parsed here once;
//! everything downstream works on [`InspectionRecord`] and [`QualityItem`].

use chrono::NaiveDate;
use qdash_core::ServiceError;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::model::{DefectReason, InspectionRecord, QualityItem};
use crate::status::{clamp_progress, parse_calendar_date};

// ---------------------------------------------------------------------------
// Wire shapes
// ---------------------------------------------------------------------------

/// Backend ids are integers; mock ids are strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Int(i64),
    Text(String),
}

impl RawId {
    fn into_string(self) -> String {
        match self {
            Self::Int(n) => n.to_string(),
            Self::Text(s) => s,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Numeric {
    Int(i64),
    Float(f64),
    Text(String),
}

#[derive(Deserialize)]
struct RawInspection {
    id: Option<RawId>,
    #[serde(alias = "username", alias = "manager")]
    owner: Option<String>,
    #[serde(alias = "company_name")]
    company: Option<String>,
    #[serde(alias = "partName")]
    product_name: Option<String>,
    product_code: Option<String>,
    #[serde(alias = "totalCount")]
    inspected_quantity: Option<Numeric>,
    #[serde(alias = "defectCount")]
    defective_quantity: Option<Numeric>,
    actioned_quantity: Option<Numeric>,
    #[serde(alias = "reason")]
    defect_reason: Option<String>,
    solution: Option<String>,
    #[serde(alias = "receivedDate")]
    received_date: Option<String>,
    #[serde(alias = "dueDate")]
    target_date: Option<String>,
    #[serde(alias = "progress")]
    progress_percentage: Option<Numeric>,
}

#[derive(Deserialize)]
struct RawQuality {
    id: Option<RawId>,
    #[serde(alias = "username", alias = "manager")]
    owner: Option<String>,
    #[serde(alias = "company_name")]
    company: Option<String>,
    #[serde(alias = "improvementItem", alias = "description")]
    title: Option<String>,
    category: Option<String>,
    #[serde(alias = "startDate")]
    start_date: Option<String>,
    #[serde(alias = "endDate")]
    end_date: Option<String>,
    #[serde(alias = "progress")]
    progress_percentage: Option<Numeric>,
}

// ---------------------------------------------------------------------------
// Field helpers
// ---------------------------------------------------------------------------

fn required(field: &str, value: Option<String>) -> Result<String, ServiceError> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ServiceError::Validation(format!("{field} is required"))),
    }
}

fn text(value: Option<String>) -> String {
    value.map(|v| v.trim().to_string()).unwrap_or_default()
}

/// A raw number as i64. Missing and blank values are `None`.
fn number(field: &str, value: Option<Numeric>) -> Result<Option<i64>, ServiceError> {
    let not_a_number = || ServiceError::Validation(format!("{field} must be a number"));
    match value {
        None => Ok(None),
        Some(Numeric::Int(n)) => Ok(Some(n)),
        Some(Numeric::Float(f)) if f.is_finite() => Ok(Some(f.round() as i64)),
        Some(Numeric::Float(_)) => Err(not_a_number()),
        Some(Numeric::Text(s)) => {
            let s = s.trim();
            if s.is_empty() {
                return Ok(None);
            }
            if let Ok(n) = s.parse::<i64>() {
                return Ok(Some(n));
            }
            match s.parse::<f64>() {
                Ok(f) if f.is_finite() => Ok(Some(f.round() as i64)),
                _ => Err(not_a_number()),
            }
        }
    }
}

fn quantity(field: &str, value: Option<Numeric>) -> Result<u64, ServiceError> {
    match number(field, value)? {
        None => Ok(0),
        Some(n) if n < 0 => Err(ServiceError::Validation(format!(
            "{field} must not be negative, got {n}"
        ))),
        Some(n) => Ok(n as u64),
    }
}

fn progress(value: Option<Numeric>) -> Result<u8, ServiceError> {
    Ok(clamp_progress(number("progress_percentage", value)?.unwrap_or(0)))
}

/// A date that does not parse is dropped with a warning. For deadlines the
/// record then reads as in progress.
fn date(field: &str, id: &str, value: Option<String>) -> Option<NaiveDate> {
    let raw = value?;
    if raw.trim().is_empty() {
        return None;
    }
    let parsed = parse_calendar_date(&raw);
    if parsed.is_none() {
        warn!(record = %id, field, value = %raw, "unparseable date, ignoring");
    }
    parsed
}

fn decode<T: for<'de> Deserialize<'de>>(what: &str, value: Value) -> Result<T, ServiceError> {
    serde_json::from_value(value).map_err(|e| ServiceError::Validation(format!("{what}: {e}")))
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Validate one inspection record. Unknown fields, including any stored
/// `status`, are ignored.
pub fn ingest_inspection(value: Value) -> Result<InspectionRecord, ServiceError> {
    let raw: RawInspection = decode("inspection record", value)?;
    let id = raw.id.map(RawId::into_string).unwrap_or_default();

    let record = InspectionRecord {
        owner: required("owner", raw.owner)?,
        company: required("company", raw.company)?,
        product_name: text(raw.product_name),
        product_code: text(raw.product_code),
        inspected_quantity: quantity("inspected_quantity", raw.inspected_quantity)?,
        defective_quantity: quantity("defective_quantity", raw.defective_quantity)?,
        actioned_quantity: quantity("actioned_quantity", raw.actioned_quantity)?,
        defect_reason: raw
            .defect_reason
            .filter(|r| !r.trim().is_empty())
            .map(|r| DefectReason::parse(&r)),
        solution: text(raw.solution),
        received_date: date("received_date", &id, raw.received_date),
        target_date: date("target_date", &id, raw.target_date),
        progress_percentage: progress(raw.progress_percentage)?,
        id,
    };

    if record.defective_quantity > record.inspected_quantity {
        warn!(
            record = %record.id,
            inspected = record.inspected_quantity,
            defective = record.defective_quantity,
            "more defects than inspected units"
        );
    }
    Ok(record)
}

/// Validate one quality-improvement item.
pub fn ingest_quality_item(value: Value) -> Result<QualityItem, ServiceError> {
    let raw: RawQuality = decode("quality item", value)?;
    let id = raw.id.map(RawId::into_string).unwrap_or_default();

    Ok(QualityItem {
        owner: required("owner", raw.owner)?,
        company: required("company", raw.company)?,
        title: text(raw.title),
        category: raw.category.filter(|c| !c.trim().is_empty()),
        start_date: date("start_date", &id, raw.start_date),
        end_date: date("end_date", &id, raw.end_date),
        progress_percentage: progress(raw.progress_percentage)?,
        id,
    })
}

fn ingest_array<T>(
    json: &str,
    ingest: impl Fn(Value) -> Result<T, ServiceError>,
) -> Result<Vec<T>, ServiceError> {
    let values: Vec<Value> = serde_json::from_str(json)
        .map_err(|e| ServiceError::Validation(format!("expected a JSON array of records: {e}")))?;
    values
        .into_iter()
        .enumerate()
        .map(|(i, v)| ingest(v).map_err(|e| ServiceError::Validation(format!("record {i}: {e}"))))
        .collect()
}

/// Validate a JSON array of inspection records, failing on the first bad
/// one with its index.
pub fn ingest_inspections(json: &str) -> Result<Vec<InspectionRecord>, ServiceError> {
    ingest_array(json, ingest_inspection)
}

/// Validate a JSON array of quality items.
pub fn ingest_quality_items(json: &str) -> Result<Vec<QualityItem>, ServiceError> {
    ingest_array(json, ingest_quality_item)
}
