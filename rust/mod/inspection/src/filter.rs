use std::borrow::Borrow;
use std::collections::HashSet;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::model::{InspectionRecord, QualityItem, Status};
use crate::status::Classified;

/// The wire value of the wildcard selection.
pub const WILDCARD: &str = "all";

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// One filter field: the `"all"` wildcard or a concrete value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection<T> {
    All,
    Only(T),
}

impl<T> Default for Selection<T> {
    fn default() -> Self {
        Self::All
    }
}

impl<T> Selection<T> {
    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    pub fn as_only(&self) -> Option<&T> {
        match self {
            Self::All => None,
            Self::Only(v) => Some(v),
        }
    }

    /// Whether `value` passes. Exact equality; a missing value only passes
    /// the wildcard.
    pub fn accepts<U>(&self, value: Option<&U>) -> bool
    where
        T: Borrow<U>,
        U: PartialEq + ?Sized,
    {
        match self {
            Self::All => true,
            Self::Only(wanted) => value == Some(<T as Borrow<U>>::borrow(wanted)),
        }
    }
}

impl<T> From<Option<T>> for Selection<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Self::Only(v),
            None => Self::All,
        }
    }
}

impl Selection<String> {
    /// Parse a dropdown value; `"all"` and the empty string are wildcards.
    pub fn parse(value: &str) -> Self {
        if value.is_empty() || value == WILDCARD {
            Self::All
        } else {
            Self::Only(value.to_string())
        }
    }
}

impl Selection<Status> {
    /// Parse a status dropdown value; `None` for an unknown status.
    pub fn parse(value: &str) -> Option<Self> {
        if value.is_empty() || value == WILDCARD {
            return Some(Self::All);
        }
        value.parse::<Status>().ok().map(Self::Only)
    }
}

impl<T: Serialize> Serialize for Selection<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::All => serializer.serialize_str(WILDCARD),
            Self::Only(v) => v.serialize(serializer),
        }
    }
}

#[derive(Deserialize)]
enum Wildcard {
    #[serde(rename = "all")]
    All,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SelectionRepr<T> {
    All(Wildcard),
    Only(T),
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Selection<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let repr = Option::<SelectionRepr<T>>::deserialize(deserializer)?;
        Ok(match repr {
            None | Some(SelectionRepr::All(Wildcard::All)) => Self::All,
            Some(SelectionRepr::Only(v)) => Self::Only(v),
        })
    }
}

// ---------------------------------------------------------------------------
// TimeWindow
// ---------------------------------------------------------------------------

/// Restriction on the received date relative to today.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeWindow {
    #[default]
    All,
    Day,
    Month,
    Year,
}

impl TimeWindow {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "" | "all" => Some(Self::All),
            "day" => Some(Self::Day),
            "month" => Some(Self::Month),
            "year" => Some(Self::Year),
            _ => None,
        }
    }

    /// Compare calendar components of `date` with `today`. Undated records
    /// only pass `All`.
    pub fn contains(&self, date: Option<NaiveDate>, today: NaiveDate) -> bool {
        match (self, date) {
            (Self::All, _) => true,
            (_, None) => false,
            (Self::Day, Some(d)) => d == today,
            (Self::Month, Some(d)) => d.year() == today.year() && d.month() == today.month(),
            (Self::Year, Some(d)) => d.year() == today.year(),
        }
    }
}

// ---------------------------------------------------------------------------
// Facets: the fields filters look at
// ---------------------------------------------------------------------------

pub trait Facets {
    fn owner(&self) -> &str;
    fn company(&self) -> &str;
    /// `None` for record kinds without a product.
    fn product(&self) -> Option<&str>;
    fn received_date(&self) -> Option<NaiveDate>;
}

impl<T: Facets + ?Sized> Facets for &T {
    fn owner(&self) -> &str {
        (**self).owner()
    }

    fn company(&self) -> &str {
        (**self).company()
    }

    fn product(&self) -> Option<&str> {
        (**self).product()
    }

    fn received_date(&self) -> Option<NaiveDate> {
        (**self).received_date()
    }
}

impl<R: Facets> Facets for Classified<R> {
    fn owner(&self) -> &str {
        self.record.owner()
    }

    fn company(&self) -> &str {
        self.record.company()
    }

    fn product(&self) -> Option<&str> {
        self.record.product()
    }

    fn received_date(&self) -> Option<NaiveDate> {
        self.record.received_date()
    }
}

impl Facets for InspectionRecord {
    fn owner(&self) -> &str {
        &self.owner
    }

    fn company(&self) -> &str {
        &self.company
    }

    fn product(&self) -> Option<&str> {
        Some(&self.product_name)
    }

    fn received_date(&self) -> Option<NaiveDate> {
        self.received_date
    }
}

impl Facets for QualityItem {
    fn owner(&self) -> &str {
        &self.owner
    }

    fn company(&self) -> &str {
        &self.company
    }

    fn product(&self) -> Option<&str> {
        None
    }

    /// Quality items are windowed by their start date.
    fn received_date(&self) -> Option<NaiveDate> {
        self.start_date
    }
}

// ---------------------------------------------------------------------------
// FilterSpec
// ---------------------------------------------------------------------------

/// The user's filter selections. Every field defaults to the wildcard.
///
/// Accepts the field names of every list screen (`username`/`manager`,
/// `company_name`, `product_name`/`partName`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSpec {
    #[serde(alias = "username", alias = "manager")]
    pub owner: Selection<String>,
    #[serde(alias = "company_name")]
    pub company: Selection<String>,
    #[serde(alias = "product_name", alias = "partName")]
    pub product: Selection<String>,
    pub status: Selection<Status>,
    #[serde(alias = "timeWindow")]
    pub time_window: TimeWindow,
}

impl FilterSpec {
    /// All wildcards.
    pub fn reset() -> Self {
        Self::default()
    }

    pub fn is_identity(&self) -> bool {
        self.owner.is_all()
            && self.company.is_all()
            && self.product.is_all()
            && self.status.is_all()
            && self.time_window == TimeWindow::All
    }

    /// Set the company and clear the product, which may not exist for the
    /// new company.
    pub fn select_company(&mut self, company: Selection<String>) {
        self.company = company;
        self.product = Selection::All;
    }

    pub fn with_company(mut self, company: Selection<String>) -> Self {
        self.select_company(company);
        self
    }

    /// Whether one status-tagged record passes every field.
    pub fn matches<R: Facets>(&self, item: &Classified<R>, today: NaiveDate) -> bool {
        self.owner.accepts(Some(item.owner()))
            && self.company.accepts(Some(item.company()))
            && self.product.accepts(item.product())
            && self.status.accepts(Some(&item.status))
            && self.time_window.contains(item.received_date(), today)
    }
}

/// Keep the records matching every non-wildcard field, in input order.
pub fn apply_filters<'a, R: Facets>(
    records: &'a [Classified<R>],
    spec: &FilterSpec,
    today: NaiveDate,
) -> Vec<&'a Classified<R>> {
    records.iter().filter(|r| spec.matches(r, today)).collect()
}

// ---------------------------------------------------------------------------
// Dropdown options
// ---------------------------------------------------------------------------

fn distinct<'a>(values: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .into_iter()
        .filter(|v| seen.insert(*v))
        .map(str::to_string)
        .collect()
}

/// Products offered by the product dropdown for the selected company.
///
/// With a company selected: products among that company's records inside
/// `window`. With the wildcard: every product in the collection.
pub fn product_options<'a, T>(
    records: impl IntoIterator<Item = &'a T>,
    company: &Selection<String>,
    window: TimeWindow,
    today: NaiveDate,
) -> Vec<String>
where
    T: Facets + ?Sized + 'a,
{
    let records = records.into_iter();
    match company {
        Selection::All => distinct(records.filter_map(|r| r.product())),
        Selection::Only(_) => distinct(
            records
                .filter(|r| {
                    company.accepts(Some(r.company()))
                        && window.contains(r.received_date(), today)
                })
                .filter_map(|r| r.product()),
        ),
    }
}

/// Contents of the list screen dropdowns, each led by the wildcard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterOptions {
    pub owners: Vec<String>,
    pub companies: Vec<String>,
    pub products: Vec<String>,
    pub statuses: Vec<String>,
}

impl FilterOptions {
    pub fn from_records<'a, T>(records: impl IntoIterator<Item = &'a T>) -> Self
    where
        T: Facets + ?Sized + 'a,
    {
        let records: Vec<&T> = records.into_iter().collect();
        let with_wildcard = |values: Vec<String>| {
            std::iter::once(WILDCARD.to_string())
                .chain(values)
                .collect::<Vec<_>>()
        };
        Self {
            owners: with_wildcard(distinct(records.iter().map(|r| r.owner()))),
            companies: with_wildcard(distinct(records.iter().map(|r| r.company()))),
            products: with_wildcard(distinct(records.iter().filter_map(|r| r.product()))),
            statuses: with_wildcard(Status::ALL.iter().map(|s| s.as_str().to_string()).collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::classify;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 9, 15).unwrap()
    }

    fn record(
        owner: &str,
        company: &str,
        product: &str,
        received: Option<NaiveDate>,
    ) -> InspectionRecord {
        InspectionRecord {
            id: format!("{owner}/{company}/{product}"),
            owner: owner.into(),
            company: company.into(),
            product_name: product.into(),
            product_code: String::new(),
            inspected_quantity: 10,
            defective_quantity: 1,
            actioned_quantity: 0,
            defect_reason: None,
            solution: String::new(),
            received_date: received,
            target_date: None,
            progress_percentage: 10,
        }
    }

    fn sample() -> Vec<InspectionRecord> {
        let d = |y, m, d| NaiveDate::from_ymd_opt(y, m, d);
        vec![
            record("kim", "Acme", "bracket", d(2025, 9, 15)),
            record("lee", "Globex", "hinge", d(2025, 9, 2)),
            record("kim", "Acme", "hinge", d(2025, 3, 1)),
            record("park", "Initech", "panel", d(2024, 9, 15)),
            record("lee", "Acme", "bracket", None),
        ]
    }

    #[test]
    fn wildcard_spec_is_identity() {
        let records = sample();
        let tagged = classify(records.clone(), today());
        let spec = FilterSpec::reset();
        assert!(spec.is_identity());
        let out = apply_filters(&tagged, &spec, today());
        assert_eq!(out.len(), tagged.len());
        for (a, b) in out.iter().zip(tagged.iter()) {
            assert_eq!(*a, b);
        }
    }

    #[test]
    fn exact_company_match() {
        let records = vec![
            record("kim", "Acme", "bracket", None),
            record("kim", "Globex", "bracket", None),
        ];
        let tagged = classify(&records, today());
        let spec = FilterSpec {
            company: Selection::Only("Acme".into()),
            ..Default::default()
        };
        let out = apply_filters(&tagged, &spec, today());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].record.company, "Acme");

        // No partial matching.
        let spec = FilterSpec {
            company: Selection::Only("Acm".into()),
            ..Default::default()
        };
        assert!(apply_filters(&tagged, &spec, today()).is_empty());
    }

    #[test]
    fn fields_combine_with_and() {
        let records = sample();
        let tagged = classify(&records, today());
        let spec = FilterSpec {
            owner: Selection::Only("kim".into()),
            product: Selection::Only("hinge".into()),
            ..Default::default()
        };
        let out = apply_filters(&tagged, &spec, today());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].record.id, "kim/Acme/hinge");
    }

    #[test]
    fn status_filter() {
        let mut records = sample();
        records[0].progress_percentage = 100;
        let tagged = classify(&records, today());
        let spec = FilterSpec {
            status: Selection::Only(Status::Completed),
            ..Default::default()
        };
        let out = apply_filters(&tagged, &spec, today());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].record.id, "kim/Acme/bracket");
    }

    #[test]
    fn time_windows_use_calendar_components() {
        let records = sample();
        let tagged = classify(&records, today());
        let count = |window| {
            let spec = FilterSpec {
                time_window: window,
                ..Default::default()
            };
            apply_filters(&tagged, &spec, today()).len()
        };
        assert_eq!(count(TimeWindow::Day), 1);
        assert_eq!(count(TimeWindow::Month), 2);
        assert_eq!(count(TimeWindow::Year), 3);
        assert_eq!(count(TimeWindow::All), 5);
    }

    #[test]
    fn same_day_last_year_is_not_today() {
        let last_year = NaiveDate::from_ymd_opt(2024, 9, 15);
        assert!(!TimeWindow::Day.contains(last_year, today()));
        assert!(!TimeWindow::Month.contains(last_year, today()));
        assert!(!TimeWindow::Year.contains(None, today()));
    }

    #[test]
    fn changing_company_resets_product() {
        let mut spec = FilterSpec {
            company: Selection::Only("Acme".into()),
            product: Selection::Only("bracket".into()),
            ..Default::default()
        };
        spec.select_company(Selection::Only("Globex".into()));
        assert_eq!(spec.product, Selection::All);
        assert_eq!(spec.company, Selection::Only("Globex".into()));
    }

    #[test]
    fn product_options_follow_company() {
        let records = sample();
        let all = product_options(&records, &Selection::All, TimeWindow::All, today());
        assert_eq!(all, ["bracket", "hinge", "panel"]);

        let acme = product_options(
            &records,
            &Selection::Only("Acme".into()),
            TimeWindow::All,
            today(),
        );
        assert_eq!(acme, ["bracket", "hinge"]);

        let acme_this_month = product_options(
            &records,
            &Selection::Only("Acme".into()),
            TimeWindow::Month,
            today(),
        );
        assert_eq!(acme_this_month, ["bracket"]);
    }

    #[test]
    fn dropdown_options() {
        let records = sample();
        let options = FilterOptions::from_records(&records);
        assert_eq!(options.owners, ["all", "kim", "lee", "park"]);
        assert_eq!(options.companies, ["all", "Acme", "Globex", "Initech"]);
        assert_eq!(options.products, ["all", "bracket", "hinge", "panel"]);
        assert_eq!(options.statuses, ["all", "delayed", "inProgress", "completed"]);
    }

    #[test]
    fn quality_items_have_no_product() {
        let item = QualityItem {
            id: "1".into(),
            owner: "kim".into(),
            company: "LG화학".into(),
            title: "전해액 성분 변경".into(),
            category: None,
            start_date: None,
            end_date: None,
            progress_percentage: 20,
        };
        let tagged = classify([item], today());
        let spec = FilterSpec {
            product: Selection::Only("panel".into()),
            ..Default::default()
        };
        assert!(apply_filters(&tagged, &spec, today()).is_empty());
        assert_eq!(apply_filters(&tagged, &FilterSpec::reset(), today()).len(), 1);
    }

    #[test]
    fn spec_from_list_screen_json() {
        let spec: FilterSpec = serde_json::from_value(serde_json::json!({
            "manager": "kim",
            "company": "all",
            "partName": "bracket",
            "status": "delayed",
        }))
        .unwrap();
        assert_eq!(spec.owner, Selection::Only("kim".into()));
        assert_eq!(spec.company, Selection::All);
        assert_eq!(spec.product, Selection::Only("bracket".into()));
        assert_eq!(spec.status, Selection::Only(Status::Delayed));
        assert_eq!(spec.time_window, TimeWindow::All);

        let json = serde_json::to_value(FilterSpec::reset()).unwrap();
        assert_eq!(json["owner"], "all");
        assert_eq!(json["status"], "all");
        assert_eq!(json["time_window"], "all");
    }

    #[test]
    fn selection_parsing() {
        assert_eq!(Selection::<String>::parse("all"), Selection::All);
        assert_eq!(Selection::<String>::parse(""), Selection::All);
        assert_eq!(Selection::<String>::parse("Acme"), Selection::Only("Acme".into()));
        assert_eq!(
            Selection::<Status>::parse("inProgress"),
            Some(Selection::Only(Status::InProgress))
        );
        assert_eq!(Selection::<Status>::parse("done"), None);
    }
}
