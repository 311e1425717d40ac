use std::io::{BufRead, Write};

use anyhow::Result;
use payroll_sync::workflow::parse_tab_list;

/// Ask on stdin which master tabs to update. An empty answer cancels.
pub fn select_tabs(available: &[String]) -> Result<Option<Vec<String>>> {
    let stdin = std::io::stdin();
    ask_tabs(available, stdin.lock(), std::io::stdout())
}

fn ask_tabs(
    available: &[String],
    mut input: impl BufRead,
    mut output: impl Write,
) -> Result<Option<Vec<String>>> {
    writeln!(output, "Available tabs: {}", available.join(", "))?;
    write!(output, "Tabs to update (comma separated, empty to cancel): ")?;
    output.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    let tabs = parse_tab_list(&line);
    Ok((!tabs.is_empty()).then_some(tabs))
}
