//! The statistics screen: KPI cards plus defect charts over the records
//! left after the time window, company and product selections.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::filter::{Facets, Selection, TimeWindow, product_options};
use crate::kpi::{
    AsInspection, GroupPoint, KpiSummary, aggregate_kpi, defect_reasons_for_product,
    defects_by_company, defects_by_product,
};
use crate::status::Tracked;

/// Selections on the statistics screen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StatisticsQuery {
    pub time_window: TimeWindow,
    pub company: Option<String>,
    pub product: Option<String>,
}

impl StatisticsQuery {
    /// Switch company; the product belongs to the old company, so drop it.
    pub fn with_company(mut self, company: Option<String>) -> Self {
        if self.company != company {
            self.product = None;
        }
        self.company = company;
        self
    }

    pub fn with_product(mut self, product: Option<String>) -> Self {
        self.product = product;
        self
    }

    pub fn with_window(mut self, window: TimeWindow) -> Self {
        self.time_window = window;
        self
    }

    fn company_selection(&self) -> Selection<String> {
        self.company.clone().into()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    /// Records inside the full selection.
    pub records: usize,
    pub kpi: KpiSummary,
    pub by_company: Vec<GroupPoint>,
    pub by_product: Vec<GroupPoint>,
    /// Empty unless a product is selected.
    pub reasons_for_product: Vec<GroupPoint>,
    pub product_options: Vec<String>,
}

impl Statistics {
    pub fn compute<R: AsInspection>(
        records: &[R],
        query: &StatisticsQuery,
        today: NaiveDate,
    ) -> Self {
        let company = query.company_selection();
        let product: Selection<String> = query.product.clone().into();

        let selected: Vec<_> = records
            .iter()
            .map(AsInspection::inspection)
            .filter(|r| query.time_window.contains(r.received_date(), today))
            .filter(|r| company.accepts(Some(r.company())))
            .filter(|r| product.accepts(r.product()))
            .collect();

        let reasons_for_product = match &query.product {
            Some(p) => defect_reasons_for_product(selected.iter().copied(), p),
            None => Vec::new(),
        };

        Self {
            records: selected.len(),
            kpi: aggregate_kpi(selected.iter().map(|r| r.status_on(today))),
            by_company: defects_by_company(selected.iter().copied()),
            by_product: defects_by_product(selected.iter().copied()),
            reasons_for_product,
            product_options: product_options(
                records.iter().map(AsInspection::inspection),
                &company,
                query.time_window,
                today,
            ),
        }
    }
}
