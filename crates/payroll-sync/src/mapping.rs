//! Binding burden categories to destination columns.

use anyhow::bail;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::burden::BurdenCategory;
use crate::column::{Column, column_number_to_letter};
use crate::workbook::Sheet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MappingChoice {
    /// 1-based destination column.
    Column(usize),
    Skip,
}

/// Category → destination column. Skipped categories have no entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnMapping {
    columns: BTreeMap<BurdenCategory, usize>,
}

impl ColumnMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, category: BurdenCategory, choice: MappingChoice) {
        match choice {
            MappingChoice::Column(column) => {
                self.columns.insert(category, column);
            }
            MappingChoice::Skip => {
                self.columns.remove(&category);
            }
        }
    }

    pub fn with(mut self, category: BurdenCategory, column: usize) -> Self {
        self.set(category, MappingChoice::Column(column));
        self
    }

    pub fn column(&self, category: &BurdenCategory) -> Option<usize> {
        self.columns.get(category).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&BurdenCategory, usize)> {
        self.columns
            .iter()
            .map(|(category, column)| (category, *column))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl FromIterator<(BurdenCategory, usize)> for ColumnMapping {
    fn from_iter<T: IntoIterator<Item = (BurdenCategory, usize)>>(iter: T) -> Self {
        ColumnMapping {
            columns: iter.into_iter().collect(),
        }
    }
}

/// A header cell of the destination, offered as a mapping target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnLabel {
    pub column: usize,
    pub label: String,
}

impl ColumnLabel {
    pub fn letter(&self) -> String {
        column_number_to_letter(self.column)
    }
}

/// The header cells to read column labels from. `last_column: None` means "up to the
/// sheet width".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderRange {
    pub row: usize,
    pub first_column: usize,
    pub last_column: Option<usize>,
}

impl Default for HeaderRange {
    fn default() -> Self {
        HeaderRange {
            row: 1,
            first_column: 3,
            last_column: None,
        }
    }
}

/// Column labels from the header range. Blank header cells are offered by letter.
pub fn discover_columns(sheet: &Sheet, range: &HeaderRange) -> Vec<ColumnLabel> {
    let last = range
        .last_column
        .unwrap_or(sheet.width())
        .min(sheet.width());

    (range.first_column.max(1)..=last)
        .map(|column| {
            let label = sheet
                .cell(range.row, column)
                .map(|cell| cell.to_string().trim().to_owned())
                .unwrap_or_default();
            let label = if label.is_empty() {
                column_number_to_letter(column)
            } else {
                label
            };
            ColumnLabel { column, label }
        })
        .collect()
}

/// What the user is asked: one choice per category, out of the discovered columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingForm {
    pub categories: Vec<BurdenCategory>,
    pub columns: Vec<ColumnLabel>,
}

impl MappingForm {
    /// Interpret one answer: `skip` (or blank), a header label, a column letter or a number.
    pub fn resolve_choice(&self, answer: &str) -> crate::Result<MappingChoice> {
        let answer = answer.trim();
        if answer.is_empty() || answer.eq_ignore_ascii_case("skip") {
            return Ok(MappingChoice::Skip);
        }
        if let Some(label) = self.columns.iter().find(|column| column.label == answer) {
            return Ok(MappingChoice::Column(label.column));
        }
        match answer.parse::<Column>() {
            Ok(column) => Ok(MappingChoice::Column(column.index())),
            Err(_) => bail!("'{answer}' is neither a destination column label nor a column"),
        }
    }

    /// Build a mapping from `category label → answer` pairs. Categories without an answer
    /// are skipped; answers for categories that aren't on the form are an error.
    pub fn resolve<'a>(
        &self,
        answers: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> crate::Result<ColumnMapping> {
        let mut mapping = ColumnMapping::new();
        for (label, answer) in answers {
            let Some(category) = self.categories.iter().find(|c| c.label() == label) else {
                bail!(
                    "'{label}' is not one of the extracted categories ({})",
                    self.category_labels().join(", ")
                );
            };
            mapping.set(category.clone(), self.resolve_choice(answer)?);
        }
        for category in &self.categories {
            if mapping.column(category).is_none() {
                tracing::info!("No column for {category}, skipping");
            }
        }
        Ok(mapping)
    }

    fn category_labels(&self) -> Vec<&str> {
        self.categories.iter().map(BurdenCategory::label).collect()
    }
}
