use chrono::NaiveDate;
use qdash_core::ServiceError;
use serde::{Deserialize, Deserializer, Serialize};

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Derived lifecycle state of a record.
///
/// ```text
/// progress == 100            → COMPLETED
/// today > deadline           → DELAYED
/// no deadline / not yet due  → IN PROGRESS
/// ```
///
/// Never stored: always recomputed from progress, deadline and today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Status {
    Completed,
    Delayed,
    InProgress,
}

impl Status {
    /// Every status, in the order the list filters offer them.
    pub const ALL: [Status; 3] = [Status::Delayed, Status::InProgress, Status::Completed];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Delayed => "delayed",
            Self::InProgress => "inProgress",
        }
    }

    /// Display label shown on status tags and KPI cards.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Completed => "완료",
            Self::Delayed => "지연",
            Self::InProgress => "진행중",
        }
    }
}

impl std::str::FromStr for Status {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "completed" => Ok(Self::Completed),
            "delayed" => Ok(Self::Delayed),
            "inProgress" => Ok(Self::InProgress),
            _ => Err(ServiceError::Validation(format!("unknown status {s}"))),
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// DefectReason
// ---------------------------------------------------------------------------

/// Why an inspected lot had defects.
///
/// The fixed set comes from the inspection form; older records carry free
/// text, kept as `Other`. On the wire a reason is its Korean label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DefectReason {
    Bending,
    Shearing,
    Piping,
    Welding,
    Machining,
    OperatorError,
    Other(String),
}

impl DefectReason {
    /// The fixed reasons, in form order.
    pub const KNOWN: [DefectReason; 6] = [
        DefectReason::Bending,
        DefectReason::Shearing,
        DefectReason::Piping,
        DefectReason::Welding,
        DefectReason::Machining,
        DefectReason::OperatorError,
    ];

    /// Parse a Korean label or English name. Unknown text becomes `Other`.
    pub fn parse(s: &str) -> Self {
        let trimmed = s.trim();
        if let Some(known) = Self::KNOWN.iter().find(|r| r.label() == trimmed) {
            return known.clone();
        }
        match trimmed.to_ascii_lowercase().replace(|c: char| c == '_' || c == '-', " ").as_str() {
            "bending" => Self::Bending,
            "shearing" => Self::Shearing,
            "piping" => Self::Piping,
            "welding" => Self::Welding,
            "machining" => Self::Machining,
            "operator error" => Self::OperatorError,
            _ => Self::Other(trimmed.to_string()),
        }
    }

    /// Chart label; the Korean name for fixed reasons.
    pub fn label(&self) -> &str {
        match self {
            Self::Bending => "절곡",
            Self::Shearing => "샤링",
            Self::Piping => "제관",
            Self::Welding => "용접",
            Self::Machining => "가공",
            Self::OperatorError => "작업자 실수",
            Self::Other(text) => text,
        }
    }
}

impl From<String> for DefectReason {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<DefectReason> for String {
    fn from(reason: DefectReason) -> Self {
        reason.label().to_string()
    }
}

impl std::fmt::Display for DefectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// InspectionRecord
// ---------------------------------------------------------------------------

/// A single third-party factory inspection.
///
/// Built by [`crate::ingest`]; every field has already been validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InspectionRecord {
    pub id: String,
    #[serde(rename = "username")]
    pub owner: String,
    #[serde(rename = "company_name")]
    pub company: String,
    pub product_name: String,
    pub product_code: String,

    // --- quantities ---
    pub inspected_quantity: u64,
    pub defective_quantity: u64,
    pub actioned_quantity: u64,

    pub defect_reason: Option<DefectReason>,
    pub solution: String,

    // --- dates ---
    pub received_date: Option<NaiveDate>,
    /// Action deadline.
    pub target_date: Option<NaiveDate>,

    /// 0–100.
    pub progress_percentage: u8,
}

// ---------------------------------------------------------------------------
// QualityItem
// ---------------------------------------------------------------------------

/// A quality-improvement action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QualityItem {
    pub id: String,
    #[serde(rename = "username")]
    pub owner: String,
    #[serde(rename = "company_name")]
    pub company: String,
    /// What is being improved.
    pub title: String,
    pub category: Option<String>,
    pub start_date: Option<NaiveDate>,
    /// Deadline.
    pub end_date: Option<NaiveDate>,
    /// 0–100.
    pub progress_percentage: u8,
}

// ---------------------------------------------------------------------------
// Comments and history
// ---------------------------------------------------------------------------

/// Which kind of record a comment or history entry hangs off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParentKind {
    Inspection,
    Quality,
}

impl ParentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inspection => "inspection",
            Self::Quality => "quality",
        }
    }
}

impl std::fmt::Display for ParentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ids are JSON numbers from the backend and strings everywhere else.
fn id_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Int(i64),
        Text(String),
    }
    Ok(match Id::deserialize(deserializer)? {
        Id::Int(n) => n.to_string(),
        Id::Text(s) => s,
    })
}

/// Parent type + parent id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParentRef {
    #[serde(rename = "parent_type")]
    pub kind: ParentKind,
    #[serde(rename = "parent_id", deserialize_with = "id_text")]
    pub id: String,
}

impl ParentRef {
    pub fn new(kind: ParentKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

impl std::fmt::Display for ParentRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.kind, self.id)
    }
}

/// A comment on a record. Only its author may edit or delete it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    #[serde(deserialize_with = "id_text")]
    pub id: String,
    #[serde(flatten)]
    pub parent: ParentRef,
    #[serde(rename = "username")]
    pub author: String,
    #[serde(rename = "content")]
    pub text: String,
    /// RFC 3339.
    #[serde(default)]
    pub created_at: String,
    /// RFC 3339; equals `created_at` until the first edit.
    #[serde(default)]
    pub updated_at: String,
}

/// One line of a record's change history. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(deserialize_with = "id_text")]
    pub id: String,
    #[serde(flatten)]
    pub parent: ParentRef,
    #[serde(rename = "username")]
    pub author: String,
    pub action: String,
    /// RFC 3339.
    #[serde(default, alias = "created_at")]
    pub timestamp: String,
}
