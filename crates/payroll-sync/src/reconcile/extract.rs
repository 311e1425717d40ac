//! Reading burden rows out of the raw payroll export and totalling them per employee.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::burden::{BurdenCategory, CategoryFilter, CategoryMatching};
use crate::cell::Cell;
use crate::Decimal;

/// Where things live in the source export. Columns are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLayout {
    pub employee_column: usize,
    pub category_column: usize,
    pub fx_rate_column: usize,
    pub amount_column: usize,
    pub pay_date_column: usize,
    pub header_rows: usize,
    pub category_filter: CategoryFilter,
    pub category_matching: CategoryMatching,
    /// Multiply each amount by its FX rate before summing.
    pub convert_with_fx_rate: bool,
}

impl Default for SourceLayout {
    fn default() -> Self {
        SourceLayout {
            employee_column: 1,
            category_column: 2,
            fx_rate_column: 3,
            amount_column: 4,
            pay_date_column: 5,
            header_rows: 1,
            category_filter: CategoryFilter::Known,
            category_matching: CategoryMatching::Exact,
            convert_with_fx_rate: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub employee: String,
    pub category: BurdenCategory,
    pub amount: Decimal,
    pub fx_rate: Option<Decimal>,
    pub pay_date: Option<NaiveDate>,
}

impl SourceRecord {
    fn effective_amount(&self, convert_with_fx_rate: bool) -> Decimal {
        match self.fx_rate {
            Some(rate) if convert_with_fx_rate && !rate.is_zero() => self.amount * rate,
            _ => self.amount,
        }
    }
}

/// Per-employee totals by burden category. Missing categories read as zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Aggregate {
    totals: BTreeMap<String, BTreeMap<BurdenCategory, Decimal>>,
}

impl Aggregate {
    pub fn add(&mut self, employee: &str, category: BurdenCategory, amount: Decimal) {
        *self
            .totals
            .entry(employee.to_owned())
            .or_default()
            .entry(category)
            .or_default() += amount;
    }

    pub fn total(&self, employee: &str, category: &BurdenCategory) -> Decimal {
        self.totals
            .get(employee)
            .and_then(|totals| totals.get(category))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    pub fn employees(&self) -> impl Iterator<Item = &str> {
        self.totals.keys().map(String::as_str)
    }

    /// Every category with at least one contribution, in enum order.
    pub fn categories(&self) -> BTreeSet<BurdenCategory> {
        self.totals
            .values()
            .flat_map(|totals| totals.keys().cloned())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    /// The rows that contributed to the aggregate.
    pub records: Vec<SourceRecord>,
    pub aggregate: Aggregate,
}

/// Sum amounts per employee and category.
///
/// `employees` restricts which rows are considered; an empty set considers everyone.
/// Rows with an empty employee name, a zero amount or a category rejected by the layout's
/// filter are ignored. Amounts that don't parse count as zero and are therefore ignored too.
pub fn extract(
    values: &[Vec<Cell>],
    employees: &BTreeSet<String>,
    layout: &SourceLayout,
) -> Extraction {
    let mut extraction = Extraction::default();
    let mut dropped_categories = BTreeSet::new();

    for row in values.iter().skip(layout.header_rows) {
        let employee = cell(row, layout.employee_column);
        if employee.is_empty() {
            continue;
        }
        let employee = employee.to_string();
        if !employees.is_empty() && !employees.contains(&employee) {
            continue;
        }

        let amount = cell(row, layout.amount_column).amount();
        if amount.is_zero() {
            continue;
        }

        let raw_category = cell(row, layout.category_column).to_string();
        let category = BurdenCategory::classify(&raw_category, layout.category_matching);
        if !layout.category_filter.accepts(&category) {
            dropped_categories.insert(raw_category);
            continue;
        }

        let record = SourceRecord {
            employee,
            category,
            amount,
            fx_rate: cell(row, layout.fx_rate_column).as_decimal(),
            pay_date: cell(row, layout.pay_date_column).as_date(),
        };
        extraction.aggregate.add(
            &record.employee,
            record.category.clone(),
            record.effective_amount(layout.convert_with_fx_rate),
        );
        extraction.records.push(record);
    }

    for category in dropped_categories {
        tracing::warn!("Ignoring unrecognized burden category {category:?}");
    }

    extraction
}

pub(crate) fn cell(row: &[Cell], column: usize) -> Cell {
    column
        .checked_sub(1)
        .and_then(|index| row.get(index))
        .cloned()
        .unwrap_or_default()
}
