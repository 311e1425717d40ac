mod config;
mod dialog;
mod prompt;
mod show;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{CommandFactory as _, Parser, Subcommand};
use payroll_sync::ReportingPeriod;
use payroll_sync::session::{FileSessionStore, Session};
use payroll_sync::workflow::{self, SESSION_NAMESPACE, parse_tab_list};

use crate::config::Config;

#[derive(Parser)]
#[command(
    name = "payroll-sync",
    about = "Copy aggregated payroll burdens into the per-country tabs of a master workbook"
)]
#[command(disable_help_subcommand = true)]
struct Args {
    /// Config file. Defaults to payroll-sync.toml or .payroll-sync.toml in the working directory.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Reporting period as YYYY-MM. Defaults to the current month.
    #[arg(short, long, global = true)]
    period: Option<ReportingPeriod>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pick master tabs, total the source burdens of their employees and stage the run
    Prepare {
        /// Comma separated tab names. Prompted for when missing.
        #[arg(short, long)]
        tabs: Option<String>,
    },
    /// Map the staged categories to columns, write them and clear the staged run
    Apply {
        /// `CATEGORY=COLUMN` where COLUMN is a header label, letter, number or `skip`.
        /// Opens the mapping dialog when missing.
        #[arg(short, long, value_name = "CATEGORY=COLUMN")]
        map: Vec<String>,
    },
    /// Run everything in one go with the mapping from the config file
    Auto {
        /// Comma separated tab names. Defaults to `master.tabs` from the config file.
        #[arg(short, long)]
        tabs: Option<String>,

        /// Only show what would be written
        #[arg(long)]
        dry_run: bool,
    },
    /// Show the cells `auto` would write, without writing them
    Plan {
        /// Comma separated tab names. Defaults to `master.tabs` from the config file.
        #[arg(short, long)]
        tabs: Option<String>,
    },
    /// Drop a staged run
    Cancel,
}

fn parse_map_arg(arg: &str) -> Result<(&str, &str)> {
    let (category, column) = arg
        .split_once('=')
        .with_context(|| format!("'{arg}' is not of the form CATEGORY=COLUMN"))?;
    Ok((category.trim(), column.trim()))
}

fn tabs_arg(tabs: Option<String>) -> Vec<String> {
    tabs.as_deref().map(parse_tab_list).unwrap_or_default()
}

pub fn run(args: impl IntoIterator<Item = String>) -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "payroll_sync=info".into());
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    clap_complete::CompleteEnv::with_factory(Args::command).complete();

    let args = Args::parse_from(args);

    let (base_dir, config) = match &args.config {
        Some(path) => Config::load_from_file(path)?,
        None => Config::find_and_load()?.unwrap_or_default(),
    };
    let sync = config.sync_config(&base_dir)?;
    let period = args.period.unwrap_or_else(ReportingPeriod::current);

    let mut store = FileSessionStore::for_current_user(config.session_dir(&base_dir));
    tracing::debug!("Session file {}", store.path().display());
    let mut session = Session::new(&mut store, SESSION_NAMESPACE);

    match args.command {
        Commands::Prepare { tabs } => {
            let prepared = workflow::prepare(&sync, period, &mut session, |available| {
                match tabs {
                    Some(tabs) => Ok(Some(parse_tab_list(&tabs))),
                    None => prompt::select_tabs(available),
                }
            })?;
            show::show_prepared(&prepared)?;
        }
        Commands::Apply { map } => {
            let outcome = workflow::apply(&sync, &mut session, |form| {
                if map.is_empty() {
                    return dialog::choose_mapping(form);
                }
                let answers = map
                    .iter()
                    .map(|arg| parse_map_arg(arg))
                    .collect::<Result<Vec<_>>>()?;
                form.resolve(answers).map(Some)
            })?;
            show::show_outcome(&outcome)?;
        }
        Commands::Auto {
            tabs,
            dry_run: true,
        }
        | Commands::Plan { tabs } => {
            let plan = workflow::plan_fixed(&sync, period, tabs_arg(tabs))?;
            show::show_plan(plan.as_ref())?;
        }
        Commands::Auto {
            tabs,
            dry_run: false,
        } => {
            let outcome = workflow::run_fixed(&sync, period, tabs_arg(tabs))?;
            show::show_outcome(&outcome)?;
        }
        Commands::Cancel => {
            if workflow::discard(&mut session)? {
                println!("Staged run cleared");
            } else {
                println!("Nothing staged");
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_args() {
        assert_eq!(
            parse_map_arg("Gross Income = F").unwrap(),
            ("Gross Income", "F")
        );
        assert_eq!(
            parse_map_arg("Employer Pension=skip").unwrap(),
            ("Employer Pension", "skip")
        );
        let err = parse_map_arg("Gross Income").unwrap_err();
        assert_eq!(
            err.to_string(),
            "'Gross Income' is not of the form CATEGORY=COLUMN"
        );
    }

    #[test]
    fn cli() {
        Args::command().debug_assert();

        let args = Args::parse_from([
            "payroll-sync",
            "apply",
            "--map",
            "Gross Income=C",
            "-m",
            "Employer Pension=D",
            "--period",
            "2025-03",
        ]);
        assert_eq!(args.period, Some(ReportingPeriod::new(2025, 3).unwrap()));
        let Commands::Apply { map } = args.command else {
            panic!("expected apply");
        };
        assert_eq!(map, ["Gross Income=C", "Employer Pension=D"]);
    }

    #[test]
    fn tabs() {
        assert_eq!(
            tabs_arg(Some("Germany,France".to_string())),
            ["Germany", "France"]
        );
        assert!(tabs_arg(None).is_empty());
    }
}
