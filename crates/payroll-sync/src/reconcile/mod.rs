//! Turning extracted burden totals into cell updates on the master workbook.

pub mod extract;
pub mod matching;
pub mod writer;

use std::fmt;

use crate::Decimal;
use crate::burden::BurdenCategory;
use crate::column::a1_address;
use crate::mapping::ColumnMapping;
use crate::period::ReportingPeriod;
use crate::reconcile::extract::Aggregate;
use crate::reconcile::matching::{DestinationLayout, find_rows};
use crate::workbook::Sheet;

/// One cell to overwrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateInstruction {
    pub tab: String,
    pub row: usize,
    pub column: usize,
    pub value: Decimal,
    pub employee: String,
    pub category: BurdenCategory,
}

impl UpdateInstruction {
    pub fn address(&self) -> String {
        a1_address(&self.tab, self.row, self.column)
    }
}

impl fmt::Display for UpdateInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} = {} ({} / {})",
            self.address(),
            self.value,
            self.employee,
            self.category
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    pub instructions: Vec<UpdateInstruction>,
    /// Employees with source data but no destination row in the period.
    pub skipped: Vec<String>,
}

/// Match every employee of `aggregate` against the given tabs and emit one instruction per
/// mapped category per matched row.
///
/// With `allow_multiple_matches` off, each employee gets at most one row across all tabs.
///
/// Mapped categories without source rows are written as zero. Employees without a matching
/// row are skipped, not treated as errors.
pub fn plan_updates<'a>(
    sheets: impl IntoIterator<Item = &'a Sheet> + Clone,
    aggregate: &Aggregate,
    mapping: &ColumnMapping,
    period: ReportingPeriod,
    layout: &DestinationLayout,
) -> Plan {
    let mut plan = Plan::default();

    for employee in aggregate.employees() {
        let mut matched = false;

        for sheet in sheets.clone() {
            let mut rows = find_rows(sheet.values(), employee, period, layout);
            if rows.len() > 1 && !layout.allow_multiple_matches {
                tracing::warn!(
                    "{employee} has {} rows for {period} in '{}', only updating row {}",
                    rows.len(),
                    sheet.name(),
                    rows[0]
                );
                rows.truncate(1);
            }
            if rows.is_empty() {
                continue;
            }
            if matched && !layout.allow_multiple_matches {
                tracing::warn!(
                    "{employee} also has a row for {period} in '{}', only the first match is updated",
                    sheet.name()
                );
                continue;
            }
            matched = true;

            for row in rows {
                for (category, column) in mapping.iter() {
                    plan.instructions.push(UpdateInstruction {
                        tab: sheet.name().to_owned(),
                        row,
                        column,
                        value: aggregate.total(employee, category),
                        employee: employee.to_owned(),
                        category: category.clone(),
                    });
                }
            }
        }

        if !matched {
            tracing::warn!("No destination row for {employee} in {period}, skipping");
            plan.skipped.push(employee.to_owned());
        }
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Cell;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn sheet(name: &str, csv: &str) -> Sheet {
        Sheet::from_csv(name, csv.as_bytes()).unwrap()
    }

    fn period() -> ReportingPeriod {
        ReportingPeriod::new(2025, 3).unwrap()
    }

    fn format_plan(plan: &Plan) -> String {
        let mut output = String::new();
        for instruction in &plan.instructions {
            output.push_str(&instruction.to_string());
            output.push('\n');
        }
        for employee in &plan.skipped {
            output.push_str(&format!("skipped {employee}\n"));
        }
        output
    }

    fn aggregate() -> Aggregate {
        let mut aggregate = Aggregate::default();
        aggregate.add("Alice", BurdenCategory::GrossIncome, dec("100"));
        aggregate.add("Alice", BurdenCategory::GrossIncome, dec("50"));
        aggregate.add("Alice", BurdenCategory::EmployerPension, dec("12.5"));
        aggregate.add("Bob", BurdenCategory::GrossIncome, dec("70"));
        aggregate.add("Zoe", BurdenCategory::GrossIncome, dec("1"));
        aggregate
    }

    fn mapping() -> ColumnMapping {
        ColumnMapping::new()
            .with(BurdenCategory::GrossIncome, 3)
            .with(BurdenCategory::EmployerPension, 4)
            .with(BurdenCategory::PayrollTaxSurcharge, 5)
    }

    const GERMANY: &str = "\
Employee,Pay Date,Gross,Pension,Surcharge
Alice,2025-02-28,,,
Alice,2025-03-28,,,
Bob,2025-03-28,,,
";

    const FRANCE: &str = "\
Employee,Pay Date,Gross,Pension,Surcharge
Bob,2025-03-14,,,
Bob,2025-03-28,,,
";

    #[test]
    fn plan_across_tabs() {
        let sheets = [sheet("Germany", GERMANY), sheet("France", FRANCE)];
        let plan = plan_updates(
            &sheets,
            &aggregate(),
            &mapping(),
            period(),
            &DestinationLayout::default(),
        );

        insta::assert_snapshot!(format_plan(&plan), @r"
        Germany!C3 = 150 (Alice / Gross Income)
        Germany!D3 = 12.5 (Alice / Employer Pension)
        Germany!E3 = 0 (Alice / Payroll Tax Surcharge)
        Germany!C4 = 70 (Bob / Gross Income)
        Germany!D4 = 0 (Bob / Employer Pension)
        Germany!E4 = 0 (Bob / Payroll Tax Surcharge)
        France!C2 = 70 (Bob / Gross Income)
        France!D2 = 0 (Bob / Employer Pension)
        France!E2 = 0 (Bob / Payroll Tax Surcharge)
        France!C3 = 70 (Bob / Gross Income)
        France!D3 = 0 (Bob / Employer Pension)
        France!E3 = 0 (Bob / Payroll Tax Surcharge)
        skipped Zoe
        ");
    }

    #[test]
    fn single_match_when_multiples_disallowed() {
        let sheets = [sheet("France", FRANCE)];
        let layout = DestinationLayout {
            allow_multiple_matches: false,
            ..DestinationLayout::default()
        };
        let mapping = ColumnMapping::new().with(BurdenCategory::GrossIncome, 3);
        let plan = plan_updates(&sheets, &aggregate(), &mapping, period(), &layout);

        insta::assert_snapshot!(format_plan(&plan), @r"
        France!C2 = 70 (Bob / Gross Income)
        skipped Alice
        skipped Zoe
        ");
    }

    #[test]
    fn single_match_across_tabs() {
        let sheets = [sheet("Germany", GERMANY), sheet("France", FRANCE)];
        let layout = DestinationLayout {
            allow_multiple_matches: false,
            ..DestinationLayout::default()
        };
        let mapping = ColumnMapping::new().with(BurdenCategory::GrossIncome, 3);
        let plan = plan_updates(&sheets, &aggregate(), &mapping, period(), &layout);

        insta::assert_snapshot!(format_plan(&plan), @r"
        Germany!C3 = 150 (Alice / Gross Income)
        Germany!C4 = 70 (Bob / Gross Income)
        skipped Zoe
        ");
    }

    #[test]
    fn every_instruction_targets_the_period_and_employee() {
        let sheets = [sheet("Germany", GERMANY), sheet("France", FRANCE)];
        let plan = plan_updates(
            &sheets,
            &aggregate(),
            &mapping(),
            period(),
            &DestinationLayout::default(),
        );
        for instruction in &plan.instructions {
            let sheet = sheets.iter().find(|s| s.name() == instruction.tab).unwrap();
            let row = &sheet.values()[instruction.row - 1];
            assert_eq!(row[0], Cell::Text(instruction.employee.clone()));
            assert!(period().contains(row[1].as_date().unwrap()));
        }
    }

    #[test]
    fn empty_mapping_plans_nothing() {
        let sheets = [sheet("Germany", GERMANY)];
        let plan = plan_updates(
            &sheets,
            &aggregate(),
            &ColumnMapping::new(),
            period(),
            &DestinationLayout::default(),
        );
        assert!(plan.instructions.is_empty());
        assert_eq!(plan.skipped, ["Zoe"]);
    }
}
