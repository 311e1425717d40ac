pub mod burden;
pub mod cell;
pub mod column;
pub mod mapping;
pub mod period;
pub mod reconcile;
pub mod session;
pub mod workbook;
pub mod workflow;

pub type Decimal = rust_decimal::Decimal;

pub use anyhow::Result;

pub use burden::{BurdenCategory, CategoryFilter, CategoryMatching};
pub use cell::Cell;
pub use column::{column_letter_to_number, column_number_to_letter};
pub use mapping::{ColumnMapping, MappingChoice, MappingForm};
pub use period::ReportingPeriod;
pub use workbook::{CellStore, Sheet, TableError, Workbook};
