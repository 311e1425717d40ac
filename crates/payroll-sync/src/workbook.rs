//! Workbooks stored as a directory of CSV files, one file per tab.

use anyhow::{Context, bail};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::cell::Cell;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    #[error("no tab named '{0}'")]
    UnknownTab(String),
    #[error("row {row} is outside of '{tab}' (1..={rows})")]
    InvalidRow { tab: String, row: usize, rows: usize },
    #[error("column {column} is outside of '{tab}' (1..={width})")]
    InvalidColumn {
        tab: String,
        column: usize,
        width: usize,
    },
}

/// Cell-level access to a set of tabs. Rows and columns are 1-based.
pub trait CellStore {
    fn cell(&self, tab: &str, row: usize, column: usize) -> Result<Cell, TableError>;
    fn set_cell(&mut self, tab: &str, row: usize, column: usize, value: Cell)
    -> Result<(), TableError>;
}

/// An in-memory grid. Row 0 of [`Sheet::values`] is the first spreadsheet row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sheet {
    name: String,
    rows: Vec<Vec<Cell>>,
    width: usize,
}

impl Sheet {
    pub fn new(name: impl Into<String>, rows: Vec<Vec<Cell>>) -> Self {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        Sheet {
            name: name.into(),
            rows,
            width,
        }
    }

    pub fn from_csv(name: impl Into<String>, reader: impl std::io::Read) -> crate::Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(Cell::from_raw).collect());
        }
        Ok(Sheet::new(name, rows))
    }

    pub fn write_csv(&self, writer: impl std::io::Write) -> crate::Result<()> {
        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_writer(writer);
        for row in &self.rows {
            writer.write_record(row.iter().map(ToString::to_string))?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// All values, header included.
    pub fn values(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn cell(&self, row: usize, column: usize) -> Result<Cell, TableError> {
        self.check_bounds(row, column)?;
        Ok(self.rows[row - 1]
            .get(column - 1)
            .cloned()
            .unwrap_or_default())
    }

    /// Overwrite an existing cell. Never adds rows or widens the sheet.
    pub fn set_cell(&mut self, row: usize, column: usize, value: Cell) -> Result<(), TableError> {
        self.check_bounds(row, column)?;
        let cells = &mut self.rows[row - 1];
        if cells.len() < column {
            cells.resize(column, Cell::Empty);
        }
        cells[column - 1] = value;
        Ok(())
    }

    fn check_bounds(&self, row: usize, column: usize) -> Result<(), TableError> {
        if row == 0 || row > self.rows.len() {
            return Err(TableError::InvalidRow {
                tab: self.name.clone(),
                row,
                rows: self.rows.len(),
            });
        }
        if column == 0 || column > self.width {
            return Err(TableError::InvalidColumn {
                tab: self.name.clone(),
                column,
                width: self.width,
            });
        }
        Ok(())
    }
}

/// A directory of `<tab>.csv` files. Only the tabs that were asked for are loaded.
#[derive(Debug)]
pub struct Workbook {
    dir: PathBuf,
    sheets: BTreeMap<String, Sheet>,
    modified: BTreeSet<String>,
}

impl Workbook {
    /// Load the given tabs. Fails if the directory or any tab is missing.
    pub fn open(dir: impl AsRef<Path>, tabs: &[String]) -> crate::Result<Self> {
        let dir = dir.as_ref();
        let available = list_tabs(dir)?;

        let mut sheets = BTreeMap::new();
        for tab in tabs {
            if !available.contains(tab) {
                bail!(
                    "workbook {} has no tab '{tab}' (available: {})",
                    dir.display(),
                    available.join(", ")
                );
            }
            let path = tab_path(dir, tab);
            let file = std::fs::File::open(&path)
                .with_context(|| format!("Failed to open {}", path.display()))?;
            let sheet = Sheet::from_csv(tab.clone(), file)
                .with_context(|| format!("Failed to parse {}", path.display()))?;
            sheets.insert(tab.clone(), sheet);
        }

        Ok(Workbook {
            dir: dir.to_owned(),
            sheets,
            modified: BTreeSet::new(),
        })
    }

    pub fn from_sheets(dir: impl Into<PathBuf>, sheets: impl IntoIterator<Item = Sheet>) -> Self {
        Workbook {
            dir: dir.into(),
            sheets: sheets
                .into_iter()
                .map(|sheet| (sheet.name().to_owned(), sheet))
                .collect(),
            modified: BTreeSet::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn sheet(&self, tab: &str) -> Result<&Sheet, TableError> {
        self.sheets
            .get(tab)
            .ok_or_else(|| TableError::UnknownTab(tab.to_owned()))
    }

    pub fn sheets(&self) -> impl Iterator<Item = &Sheet> + Clone {
        self.sheets.values()
    }

    pub fn is_modified(&self) -> bool {
        !self.modified.is_empty()
    }

    /// Write every modified tab back to its CSV file.
    pub fn save(&mut self) -> crate::Result<()> {
        for tab in std::mem::take(&mut self.modified) {
            let sheet = self.sheet(&tab)?;
            let path = tab_path(&self.dir, &tab);
            let file = std::fs::File::create(&path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            sheet.write_csv(file)?;
            tracing::info!("Saved {}", path.display());
        }
        Ok(())
    }
}

impl CellStore for Workbook {
    fn cell(&self, tab: &str, row: usize, column: usize) -> Result<Cell, TableError> {
        self.sheet(tab)?.cell(row, column)
    }

    fn set_cell(
        &mut self,
        tab: &str,
        row: usize,
        column: usize,
        value: Cell,
    ) -> Result<(), TableError> {
        let sheet = self
            .sheets
            .get_mut(tab)
            .ok_or_else(|| TableError::UnknownTab(tab.to_owned()))?;
        sheet.set_cell(row, column, value)?;
        self.modified.insert(tab.to_owned());
        Ok(())
    }
}

/// Tab names of a workbook directory, sorted.
pub fn list_tabs(dir: &Path) -> crate::Result<Vec<String>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read workbook directory: {}", dir.display()))?;

    let mut tabs = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "csv")
            && let Some(stem) = path.file_stem().and_then(|stem| stem.to_str())
        {
            tabs.push(stem.to_owned());
        }
    }
    tabs.sort();
    Ok(tabs)
}

fn tab_path(dir: &Path, tab: &str) -> PathBuf {
    dir.join(format!("{tab}.csv"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Decimal;

    fn sheet() -> Sheet {
        Sheet::from_csv(
            "Germany",
            "Employee,Pay Date,Gross\nAlice,2025-03-28,\nBob,2025-03-28\n".as_bytes(),
        )
        .unwrap()
    }

    #[test]
    fn load_csv() {
        let sheet = sheet();
        assert_eq!(sheet.row_count(), 3);
        assert_eq!(sheet.width(), 3);
        assert_eq!(sheet.cell(2, 1).unwrap(), Cell::Text("Alice".into()));
        assert_eq!(sheet.cell(2, 3).unwrap(), Cell::Empty);
        // short row reads as empty up to the sheet width
        assert_eq!(sheet.cell(3, 3).unwrap(), Cell::Empty);
    }

    #[test]
    fn set_cell_overwrites_in_place() {
        let mut sheet = sheet();
        sheet.set_cell(3, 3, Cell::Number(Decimal::from(150))).unwrap();
        assert_eq!(sheet.cell(3, 3).unwrap(), Cell::Number(Decimal::from(150)));
        assert_eq!(sheet.row_count(), 3);
    }

    #[test]
    fn set_cell_out_of_bounds() {
        let mut sheet = sheet();
        assert_eq!(
            sheet.set_cell(4, 1, Cell::Empty),
            Err(TableError::InvalidRow {
                tab: "Germany".into(),
                row: 4,
                rows: 3
            })
        );
        assert!(matches!(
            sheet.set_cell(2, 0, Cell::Empty),
            Err(TableError::InvalidColumn { column: 0, .. })
        ));
        let err = sheet.set_cell(2, 4, Cell::Empty).unwrap_err();
        assert_eq!(err.to_string(), "column 4 is outside of 'Germany' (1..=3)");
        assert_eq!(sheet.row_count(), 3);
    }

    #[test]
    fn csv_output() {
        let mut sheet = sheet();
        sheet.set_cell(2, 3, Cell::Number(Decimal::new(15050, 2))).unwrap();
        let mut out = Vec::new();
        sheet.write_csv(&mut out).unwrap();
        insta::assert_snapshot!(String::from_utf8(out).unwrap(), @r"
        Employee,Pay Date,Gross
        Alice,2025-03-28,150.50
        Bob,2025-03-28
        ");
    }

    #[test]
    fn workbook_unknown_tab() {
        let mut workbook = Workbook::from_sheets("master", [sheet()]);
        assert_eq!(
            workbook.set_cell("France", 1, 1, Cell::Empty),
            Err(TableError::UnknownTab("France".into()))
        );
        assert!(!workbook.is_modified());
        workbook.set_cell("Germany", 2, 3, Cell::Empty).unwrap();
        assert!(workbook.is_modified());
    }
}
