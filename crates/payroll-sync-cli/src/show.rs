use std::io::{self, Write};

use anstyle::{AnsiColor, Color, Style};
use payroll_sync::reconcile::Plan;
use payroll_sync::workflow::{Prepared, RunOutcome, RunSummary};

struct Palette {
    ok: Style,
    failed: Style,
    skipped: Style,
    bold: Style,
}

impl Palette {
    fn color() -> Self {
        Palette {
            ok: Style::new().fg_color(Some(Color::Ansi(AnsiColor::Green))),
            failed: Style::new().fg_color(Some(Color::Ansi(AnsiColor::Red))),
            skipped: Style::new().fg_color(Some(Color::Ansi(AnsiColor::Yellow))),
            bold: Style::new().bold(),
        }
    }

    #[cfg(test)]
    fn plain() -> Self {
        Palette {
            ok: Style::new(),
            failed: Style::new(),
            skipped: Style::new(),
            bold: Style::new(),
        }
    }
}

pub fn show_prepared(prepared: &Prepared) -> io::Result<()> {
    write_prepared(&mut io::stdout().lock(), prepared, &Palette::color())
}

pub fn show_outcome(outcome: &RunOutcome) -> io::Result<()> {
    write_outcome(&mut io::stdout().lock(), outcome, &Palette::color())
}

pub fn show_plan(plan: Option<&Plan>) -> io::Result<()> {
    write_plan(&mut io::stdout().lock(), plan, &Palette::color())
}

fn write_prepared(out: &mut impl Write, prepared: &Prepared, palette: &Palette) -> io::Result<()> {
    let Prepared::Staged(pending) = prepared else {
        return writeln!(out, "No tabs selected, nothing staged");
    };
    let Palette { ok, bold, .. } = palette;

    writeln!(out, "{bold}━━━ Staged {} ━━━{bold:#}", pending.period)?;
    writeln!(out, "  tabs: {}", pending.tabs.join(", "))?;
    writeln!(
        out,
        "  {ok}{}{ok:#} employee(s), {ok}{}{ok:#} burden row(s)",
        pending.employees.len(),
        pending.records.len()
    )?;
    writeln!(out, "  categories:")?;
    for category in &pending.form.categories {
        writeln!(out, "    {category}")?;
    }
    let columns: Vec<String> = pending
        .form
        .columns
        .iter()
        .map(|column| format!("{}={}", column.letter(), column.label))
        .collect();
    writeln!(out, "  columns: {}", columns.join(", "))?;
    writeln!(out, "Run `payroll-sync apply` to map and write them.")
}

fn write_summary(out: &mut impl Write, summary: &RunSummary, palette: &Palette) -> io::Result<()> {
    let Palette {
        ok,
        failed,
        skipped,
        bold,
    } = palette;
    let report = &summary.report;

    writeln!(out, "{bold}━━━ Summary {} ━━━{bold:#}", summary.period)?;
    if summary.planned == 0 {
        writeln!(out, "  nothing to write")?;
    } else if report.failed() == 0 {
        writeln!(out, "  {ok}✓ {}{ok:#} cell(s) written", report.succeeded)?;
    } else {
        writeln!(out, "  {ok}{}{ok:#} cell(s) written", report.succeeded)?;
        writeln!(out, "  {failed}{}{failed:#} cell(s) failed", report.failed())?;
        for failure in &report.failures {
            writeln!(out, "    {}: {}", failure.instruction, failure.error)?;
        }
    }
    if !summary.skipped.is_empty() {
        writeln!(
            out,
            "  {skipped}{}{skipped:#} employee(s) without a row in {}: {}",
            summary.skipped.len(),
            summary.period,
            summary.skipped.join(", ")
        )?;
    }
    Ok(())
}

fn write_outcome(out: &mut impl Write, outcome: &RunOutcome, palette: &Palette) -> io::Result<()> {
    match outcome {
        RunOutcome::Applied(summary) => write_summary(out, summary, palette),
        RunOutcome::Cancelled => writeln!(out, "Cancelled, nothing written"),
    }
}

fn write_plan(out: &mut impl Write, plan: Option<&Plan>, palette: &Palette) -> io::Result<()> {
    let Some(plan) = plan else {
        return writeln!(out, "No tabs given and none configured, nothing to plan");
    };
    let Palette { bold, skipped, .. } = palette;

    for instruction in &plan.instructions {
        writeln!(out, "{instruction}")?;
    }
    writeln!(
        out,
        "{bold}{} cell(s) would be written{bold:#}",
        plan.instructions.len()
    )?;
    if !plan.skipped.is_empty() {
        writeln!(
            out,
            "  {skipped}skipped{skipped:#}: {}",
            plan.skipped.join(", ")
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use payroll_sync::burden::BurdenCategory;
    use payroll_sync::reconcile::UpdateInstruction;
    use payroll_sync::reconcile::writer::{WriteError, WriteFailure, WriteReport};
    use payroll_sync::{Decimal, ReportingPeriod, TableError};

    fn render(write: impl FnOnce(&mut Vec<u8>) -> io::Result<()>) -> String {
        let mut out = Vec::new();
        write(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn instruction(column: usize, value: i64) -> UpdateInstruction {
        UpdateInstruction {
            tab: "Germany".into(),
            row: 3,
            column,
            value: Decimal::from(value),
            employee: "Alice".into(),
            category: BurdenCategory::GrossIncome,
        }
    }

    fn summary(failures: Vec<WriteFailure>, skipped: &[&str]) -> RunSummary {
        RunSummary {
            period: ReportingPeriod::new(2025, 3).unwrap(),
            planned: 4,
            skipped: skipped.iter().map(|name| name.to_string()).collect(),
            report: WriteReport {
                succeeded: 3,
                failures,
            },
        }
    }

    #[test]
    fn clean_run() {
        let outcome = RunOutcome::Applied(summary(vec![], &[]));
        insta::assert_snapshot!(render(|out| write_outcome(out, &outcome, &Palette::plain())), @r"
        ━━━ Summary 2025-03 ━━━
          ✓ 3 cell(s) written
        ");
    }

    #[test]
    fn partial_failure() {
        let failure = WriteFailure {
            instruction: instruction(40, 150),
            error: WriteError::Table(TableError::InvalidColumn {
                tab: "Germany".into(),
                column: 40,
                width: 4,
            }),
        };
        let outcome = RunOutcome::Applied(summary(vec![failure], &["Zoe", "Carol"]));
        insta::assert_snapshot!(render(|out| write_outcome(out, &outcome, &Palette::plain())), @r"
        ━━━ Summary 2025-03 ━━━
          3 cell(s) written
          1 cell(s) failed
            Germany!AN3 = 150 (Alice / Gross Income): column 40 is outside of 'Germany' (1..=4)
          2 employee(s) without a row in 2025-03: Zoe, Carol
        ");
    }

    #[test]
    fn cancelled() {
        assert_eq!(
            render(|out| write_outcome(out, &RunOutcome::Cancelled, &Palette::plain())),
            "Cancelled, nothing written\n"
        );
        assert_eq!(
            render(|out| write_prepared(out, &Prepared::Cancelled, &Palette::plain())),
            "No tabs selected, nothing staged\n"
        );
    }

    #[test]
    fn plan() {
        let plan = Plan {
            instructions: vec![instruction(3, 150), instruction(4, 0)],
            skipped: vec!["Zoe".into()],
        };
        insta::assert_snapshot!(render(|out| write_plan(out, Some(&plan), &Palette::plain())), @r"
        Germany!C3 = 150 (Alice / Gross Income)
        Germany!D3 = 0 (Alice / Gross Income)
        2 cell(s) would be written
          skipped: Zoe
        ");
    }
}
