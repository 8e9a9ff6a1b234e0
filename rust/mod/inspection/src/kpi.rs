use std::collections::HashMap;

use serde::Serialize;

use crate::model::{InspectionRecord, Status};
use crate::status::Classified;

// ---------------------------------------------------------------------------
// Status counts
// ---------------------------------------------------------------------------

/// Anything that already carries a derived status.
pub trait HasStatus {
    fn status(&self) -> Status;
}

impl HasStatus for Status {
    fn status(&self) -> Status {
        *self
    }
}

impl<R> HasStatus for Classified<R> {
    fn status(&self) -> Status {
        self.status
    }
}

impl<T: HasStatus + ?Sized> HasStatus for &T {
    fn status(&self) -> Status {
        (**self).status()
    }
}

/// Summary card counts. `total` is always the sum of the three partitions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiSummary {
    pub completed: usize,
    pub in_progress: usize,
    pub delayed: usize,
    pub total: usize,
}

impl KpiSummary {
    /// Count one more record.
    pub fn add(&mut self, status: Status) {
        match status {
            Status::Completed => self.completed += 1,
            Status::InProgress => self.in_progress += 1,
            Status::Delayed => self.delayed += 1,
        }
        self.total += 1;
    }

    pub fn count(&self, status: Status) -> usize {
        match status {
            Status::Completed => self.completed,
            Status::InProgress => self.in_progress,
            Status::Delayed => self.delayed,
        }
    }

    /// Percentage of all records in `status`; 0 when there are none.
    pub fn share(&self, status: Status) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.count(status) as f64 * 100.0 / self.total as f64
    }

    /// [`share`](Self::share) formatted with one decimal, e.g. `"33.3%"`.
    pub fn percent_label(&self, status: Status) -> String {
        if self.total == 0 {
            return "0%".to_string();
        }
        format!("{:.1}%", self.share(status))
    }

    /// Pie slices in chart order: delayed, in progress, completed.
    pub fn chart_series(&self) -> [(Status, usize); 3] {
        [
            (Status::Delayed, self.delayed),
            (Status::InProgress, self.in_progress),
            (Status::Completed, self.completed),
        ]
    }
}

/// Partition status-tagged items into summary counts.
pub fn aggregate_kpi<I>(items: I) -> KpiSummary
where
    I: IntoIterator,
    I::Item: HasStatus,
{
    let mut summary = KpiSummary::default();
    for item in items {
        summary.add(item.status());
    }
    summary
}

// ---------------------------------------------------------------------------
// Group-by series
// ---------------------------------------------------------------------------

/// Label used for items whose group key is missing.
pub const MISSING_GROUP_LABEL: &str = "";

/// One chart entry: a group and the summed measure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupPoint {
    pub label: String,
    pub value: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GroupOptions {
    /// Remove groups whose summed measure is zero.
    pub drop_zero: bool,
}

impl GroupOptions {
    pub fn keep_zero() -> Self {
        Self { drop_zero: false }
    }

    pub fn drop_zero() -> Self {
        Self { drop_zero: true }
    }
}

/// Sum `measure` per distinct `key`, in first-seen key order.
///
/// A `None` key is a group of its own labelled [`MISSING_GROUP_LABEL`];
/// no item is skipped.
pub fn aggregate_by_group<'a, T, I, K, M>(
    items: I,
    key: K,
    measure: M,
    options: GroupOptions,
) -> Vec<GroupPoint>
where
    T: ?Sized + 'a,
    I: IntoIterator<Item = &'a T>,
    K: Fn(&'a T) -> Option<&'a str>,
    M: Fn(&'a T) -> u64,
{
    let mut points: Vec<GroupPoint> = Vec::new();
    let mut index: HashMap<&'a str, usize> = HashMap::new();

    for item in items {
        let label = key(item).unwrap_or(MISSING_GROUP_LABEL);
        let value = measure(item);
        match index.get(label) {
            Some(&i) => points[i].value = points[i].value.saturating_add(value),
            None => {
                index.insert(label, points.len());
                points.push(GroupPoint {
                    label: label.to_string(),
                    value,
                });
            }
        }
    }

    if options.drop_zero {
        points.retain(|p| p.value > 0);
    }
    points
}

// ---------------------------------------------------------------------------
// Defect charts
// ---------------------------------------------------------------------------

/// Access to the inspection behind a wrapper.
pub trait AsInspection {
    fn inspection(&self) -> &InspectionRecord;
}

impl AsInspection for InspectionRecord {
    fn inspection(&self) -> &InspectionRecord {
        self
    }
}

impl<T: AsInspection + ?Sized> AsInspection for &T {
    fn inspection(&self) -> &InspectionRecord {
        (**self).inspection()
    }
}

impl<R: AsInspection> AsInspection for Classified<R> {
    fn inspection(&self) -> &InspectionRecord {
        self.record.inspection()
    }
}

/// Defective quantity per company. Zero groups are kept.
pub fn defects_by_company<'a, T>(items: impl IntoIterator<Item = &'a T>) -> Vec<GroupPoint>
where
    T: AsInspection + 'a,
{
    aggregate_by_group(
        items,
        |t: &'a T| Some(t.inspection().company.as_str()),
        |t: &'a T| t.inspection().defective_quantity,
        GroupOptions::keep_zero(),
    )
}

/// Defective quantity per product. Zero groups are kept.
pub fn defects_by_product<'a, T>(items: impl IntoIterator<Item = &'a T>) -> Vec<GroupPoint>
where
    T: AsInspection + 'a,
{
    aggregate_by_group(
        items,
        |t: &'a T| Some(t.inspection().product_name.as_str()),
        |t: &'a T| t.inspection().defective_quantity,
        GroupOptions::keep_zero(),
    )
}

/// Defective quantity per reason for one product.
///
/// Reasons with no recorded defects are dropped so they never show up as
/// empty pie slices.
pub fn defect_reasons_for_product<'a, T>(
    items: impl IntoIterator<Item = &'a T>,
    product: &str,
) -> Vec<GroupPoint>
where
    T: AsInspection + 'a,
{
    aggregate_by_group(
        items
            .into_iter()
            .filter(|t| t.inspection().product_name == product),
        |t: &'a T| t.inspection().defect_reason.as_ref().map(|r| r.label()),
        |t: &'a T| t.inspection().defective_quantity,
        GroupOptions::drop_zero(),
    )
}
