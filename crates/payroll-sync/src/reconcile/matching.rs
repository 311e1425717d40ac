use crate::cell::Cell;
use crate::period::ReportingPeriod;
use crate::reconcile::extract::cell;

/// Where things live in a master tracking tab. Columns are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationLayout {
    pub employee_column: usize,
    pub pay_date_column: usize,
    pub header_rows: usize,
    /// Write to every row of an employee within the period instead of only the first.
    pub allow_multiple_matches: bool,
}

impl Default for DestinationLayout {
    fn default() -> Self {
        DestinationLayout {
            employee_column: 1,
            pay_date_column: 2,
            header_rows: 1,
            allow_multiple_matches: true,
        }
    }
}

fn row_matches(
    row: &[Cell],
    employee: &str,
    period: ReportingPeriod,
    layout: &DestinationLayout,
) -> bool {
    // exact name comparison, no trimming or case folding
    let name_matches = match cell(row, layout.employee_column) {
        Cell::Text(name) => name == employee,
        _ => false,
    };
    if !name_matches {
        return false;
    }

    // dates that don't parse never match
    cell(row, layout.pay_date_column)
        .as_date()
        .is_some_and(|date| period.contains(date))
}

/// 1-based spreadsheet rows of `employee` whose pay date falls into `period`.
///
/// An empty result is not an error; the caller decides what a missing row means.
pub fn find_rows(
    values: &[Vec<Cell>],
    employee: &str,
    period: ReportingPeriod,
    layout: &DestinationLayout,
) -> Vec<usize> {
    values
        .iter()
        .enumerate()
        .skip(layout.header_rows)
        .filter(|(_, row)| row_matches(row, employee, period, layout))
        .map(|(index, _)| index + 1)
        .collect()
}

/// Distinct, non-empty employee names below the header, in first-seen order.
pub fn collect_employees(values: &[Vec<Cell>], layout: &DestinationLayout) -> Vec<String> {
    let mut employees: Vec<String> = Vec::new();
    for row in values.iter().skip(layout.header_rows) {
        let name = cell(row, layout.employee_column);
        if name.is_empty() {
            continue;
        }
        let name = name.to_string();
        if !employees.contains(&name) {
            employees.push(name);
        }
    }
    employees
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn period() -> ReportingPeriod {
        ReportingPeriod::new(2025, 3).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> Cell {
        Cell::Date(NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    fn text(s: &str) -> Cell {
        Cell::from_raw(s)
    }

    fn master() -> Vec<Vec<Cell>> {
        vec![
            vec![text("Employee"), text("Pay Date"), text("Gross")],
            vec![text("Alice"), text("2025-02-28"), Cell::Empty],
            vec![text("Alice"), text("2025-03-28"), Cell::Empty],
            vec![text("Bob"), date(2025, 3, 28), Cell::Empty],
            vec![text("Alice"), date(2025, 3, 14), Cell::Empty],
            vec![text("Alice"), text("2024-03-28"), Cell::Empty],
            vec![text("Carol"), text("next friday"), Cell::Empty],
            vec![text("Alice "), text("2025-03-28"), Cell::Empty],
        ]
    }

    #[test]
    fn finds_rows_within_period() {
        let rows = find_rows(&master(), "Alice", period(), &DestinationLayout::default());
        assert_eq!(rows, [3, 5]);
    }

    #[test]
    fn native_and_text_dates() {
        let rows = find_rows(&master(), "Bob", period(), &DestinationLayout::default());
        assert_eq!(rows, [4]);
    }

    #[test]
    fn never_returns_rows_outside_period() {
        let values = master();
        for employee in ["Alice", "Bob", "Carol"] {
            for row in find_rows(&values, employee, period(), &DestinationLayout::default()) {
                let date = values[row - 1][1].as_date().unwrap();
                assert!(period().contains(date));
            }
        }
    }

    #[test]
    fn unparseable_dates_are_excluded() {
        let rows = find_rows(&master(), "Carol", period(), &DestinationLayout::default());
        assert!(rows.is_empty());
    }

    #[test]
    fn no_match_is_empty() {
        assert!(find_rows(&master(), "Dave", period(), &DestinationLayout::default()).is_empty());
        assert!(find_rows(&[], "Alice", period(), &DestinationLayout::default()).is_empty());
    }

    #[test]
    fn header_is_skipped() {
        let values = vec![vec![text("Alice"), text("2025-03-01")]];
        assert!(find_rows(&values, "Alice", period(), &DestinationLayout::default()).is_empty());

        let layout = DestinationLayout {
            header_rows: 0,
            ..DestinationLayout::default()
        };
        assert_eq!(find_rows(&values, "Alice", period(), &layout), [1]);
    }

    #[test]
    fn custom_columns() {
        let values = vec![
            vec![text("Date"), text("Id"), text("Name")],
            vec![text("03/02/2025"), text("17"), text("Alice")],
        ];
        let layout = DestinationLayout {
            employee_column: 3,
            pay_date_column: 1,
            ..DestinationLayout::default()
        };
        assert_eq!(find_rows(&values, "Alice", period(), &layout), [2]);
    }

    #[test]
    fn collects_distinct_employees() {
        let employees = collect_employees(&master(), &DestinationLayout::default());
        assert_eq!(employees, ["Alice", "Bob", "Carol", "Alice "]);
    }
}
