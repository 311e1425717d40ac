//! The reconciliation run, either in two interactive steps (`prepare`, then `apply` once a
//! mapping has been chosen) or in one go with a fixed mapping (`run_fixed`).

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;
use thiserror::Error;

use crate::burden::BurdenCategory;
use crate::mapping::{ColumnMapping, HeaderRange, MappingForm, discover_columns};
use crate::period::ReportingPeriod;
use crate::reconcile::extract::{Aggregate, Extraction, SourceLayout, SourceRecord, extract};
use crate::reconcile::matching::{DestinationLayout, collect_employees};
use crate::reconcile::writer::{WriteOptions, WriteReport, apply_updates};
use crate::reconcile::{Plan, plan_updates};
use crate::session::Session;
use crate::workbook::{Workbook, list_tabs};

pub const SESSION_NAMESPACE: &str = "payroll-sync";

const STATE_KEY: &str = "state";
const PENDING_KEYS: &[&str] = &[
    STATE_KEY,
    "period",
    "tabs",
    "employees",
    "records",
    "aggregate",
    "form",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkflowState {
    Idle,
    TabsSelected,
    EmployeesCollected,
    SourceDataFetched,
    AwaitingMapping,
    MappingReceived,
    Applied,
    /// The staged run was dropped without writing anything.
    Cleared,
    /// The user backed out before anything was staged.
    Cancelled,
}

impl WorkflowState {
    fn can_advance_to(self, next: WorkflowState) -> bool {
        use WorkflowState::*;
        matches!(
            (self, next),
            (Idle, TabsSelected)
                | (TabsSelected, EmployeesCollected)
                | (EmployeesCollected, SourceDataFetched)
                | (SourceDataFetched, AwaitingMapping)
                // fixed mapping, nothing to ask
                | (SourceDataFetched, MappingReceived)
                | (AwaitingMapping, MappingReceived)
                | (AwaitingMapping, Cleared)
                | (MappingReceived, Applied)
                | (Idle, Cancelled)
        )
    }
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("cannot go from {from:?} to {to:?}")]
    IllegalTransition {
        from: WorkflowState,
        to: WorkflowState,
    },
    #[error("nothing is staged, run `prepare` first")]
    NothingStaged,
    #[error("the staged run is incomplete ('{0}' is missing), run `prepare` again")]
    IncompleteStaging(&'static str),
    #[error("no employees found in {}", .0.join(", "))]
    NoEmployees(Vec<String>),
    #[error("the source has no burden rows for the selected employees")]
    NoSourceData,
    #[error("the fixed mapping names '{0}', which is not a tracked burden category")]
    UntrackedCategory(String),
}

#[derive(Debug)]
struct Workflow {
    state: WorkflowState,
}

impl Workflow {
    fn start() -> Self {
        Self::resume(WorkflowState::Idle)
    }

    fn resume(state: WorkflowState) -> Self {
        Workflow { state }
    }

    fn advance(&mut self, next: WorkflowState) -> Result<(), WorkflowError> {
        if !self.state.can_advance_to(next) {
            return Err(WorkflowError::IllegalTransition {
                from: self.state,
                to: next,
            });
        }
        tracing::debug!("{:?} -> {next:?}", self.state);
        self.state = next;
        Ok(())
    }
}

/// Fixed locations of the two workbooks and how to read them.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub source_workbook: PathBuf,
    pub source_sheet: String,
    pub source_layout: SourceLayout,
    pub master_workbook: PathBuf,
    /// Tabs used by the fixed variant when none are given.
    pub master_tabs: Vec<String>,
    pub master_layout: DestinationLayout,
    pub header_range: HeaderRange,
    pub write: WriteOptions,
    pub fixed_mapping: ColumnMapping,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            source_workbook: PathBuf::from("source"),
            source_sheet: "Payroll Burdens".to_string(),
            source_layout: SourceLayout::default(),
            master_workbook: PathBuf::from("master"),
            master_tabs: Vec::new(),
            master_layout: DestinationLayout::default(),
            header_range: HeaderRange::default(),
            write: WriteOptions::default(),
            fixed_mapping: default_fixed_mapping(),
        }
    }
}

impl SyncConfig {
    /// Every category of the fixed mapping must survive extraction, otherwise its column
    /// would be overwritten with zero.
    pub fn validate(&self) -> Result<(), WorkflowError> {
        let filter = self.source_layout.category_filter;
        match self
            .fixed_mapping
            .iter()
            .find(|(category, _)| !filter.accepts(category))
        {
            Some((category, _)) => Err(WorkflowError::UntrackedCategory(category.to_string())),
            None => Ok(()),
        }
    }
}

/// Known burdens in columns C through H of every country tab.
pub fn default_fixed_mapping() -> ColumnMapping {
    BurdenCategory::KNOWN.into_iter().zip(3..).collect()
}

/// Everything `prepare` found, kept in the session until `apply`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRun {
    pub period: ReportingPeriod,
    pub tabs: Vec<String>,
    pub employees: Vec<String>,
    pub records: Vec<SourceRecord>,
    pub aggregate: Aggregate,
    pub form: MappingForm,
}

impl PendingRun {
    fn store(&self, session: &mut Session) -> crate::Result<()> {
        session.set("period", &self.period)?;
        session.set("tabs", &self.tabs)?;
        session.set("employees", &self.employees)?;
        session.set("records", &self.records)?;
        session.set("aggregate", &self.aggregate)?;
        session.set("form", &self.form)?;
        session.set(STATE_KEY, &WorkflowState::AwaitingMapping)
    }

    fn load(session: &Session) -> crate::Result<Option<Self>> {
        match session.get::<WorkflowState>(STATE_KEY)? {
            None => return Ok(None),
            Some(WorkflowState::AwaitingMapping) => {}
            Some(state) => anyhow::bail!("unexpected staged state {state:?}"),
        }

        fn required<T: serde::de::DeserializeOwned>(
            session: &Session,
            key: &'static str,
        ) -> crate::Result<T> {
            session
                .get(key)?
                .ok_or_else(|| WorkflowError::IncompleteStaging(key).into())
        }

        Ok(Some(PendingRun {
            period: required(session, "period")?,
            tabs: required(session, "tabs")?,
            employees: required(session, "employees")?,
            records: required(session, "records")?,
            aggregate: required(session, "aggregate")?,
            form: required(session, "form")?,
        }))
    }
}

#[derive(Debug)]
pub enum Prepared {
    Staged(PendingRun),
    Cancelled,
}

/// What a finished run did, for the summary shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub period: ReportingPeriod,
    pub planned: usize,
    pub skipped: Vec<String>,
    pub report: WriteReport,
}

#[derive(Debug)]
pub enum RunOutcome {
    Applied(RunSummary),
    Cancelled,
}

/// Split a free-text tab answer (`Germany, France`) into distinct tab names.
pub fn parse_tab_list(input: &str) -> Vec<String> {
    let mut tabs: Vec<String> = Vec::new();
    for tab in input.split(',').map(str::trim).filter(|tab| !tab.is_empty()) {
        if !tabs.iter().any(|existing| existing == tab) {
            tabs.push(tab.to_owned());
        }
    }
    tabs
}

struct Gathered {
    tabs: Vec<String>,
    employees: Vec<String>,
    extraction: Extraction,
    master: Workbook,
}

/// TabsSelected → EmployeesCollected → SourceDataFetched
fn gather(
    config: &SyncConfig,
    tabs: Vec<String>,
    workflow: &mut Workflow,
) -> crate::Result<Gathered> {
    workflow.advance(WorkflowState::TabsSelected)?;
    let master = Workbook::open(&config.master_workbook, &tabs)?;

    let mut employees: Vec<String> = Vec::new();
    for tab in &tabs {
        for employee in collect_employees(master.sheet(tab)?.values(), &config.master_layout) {
            if !employees.contains(&employee) {
                employees.push(employee);
            }
        }
    }
    if employees.is_empty() {
        return Err(WorkflowError::NoEmployees(tabs).into());
    }
    tracing::info!("{} employee(s) in {}", employees.len(), tabs.join(", "));
    workflow.advance(WorkflowState::EmployeesCollected)?;

    let source = Workbook::open(
        &config.source_workbook,
        std::slice::from_ref(&config.source_sheet),
    )
    .context("Failed to open source workbook")?;
    let targets: BTreeSet<String> = employees.iter().cloned().collect();
    let extraction = extract(
        source.sheet(&config.source_sheet)?.values(),
        &targets,
        &config.source_layout,
    );
    if extraction.aggregate.is_empty() {
        return Err(WorkflowError::NoSourceData.into());
    }
    tracing::info!(
        "{} burden row(s) for {} employee(s)",
        extraction.records.len(),
        extraction.aggregate.employees().count()
    );
    workflow.advance(WorkflowState::SourceDataFetched)?;

    Ok(Gathered {
        tabs,
        employees,
        extraction,
        master,
    })
}

fn write_updates(
    config: &SyncConfig,
    master: &mut Workbook,
    aggregate: &Aggregate,
    mapping: &ColumnMapping,
    period: ReportingPeriod,
) -> crate::Result<RunSummary> {
    let plan = plan_updates(
        master.sheets(),
        aggregate,
        mapping,
        period,
        &config.master_layout,
    );
    let report = apply_updates(master, &plan.instructions, config.write);
    master.save()?;

    Ok(RunSummary {
        period,
        planned: plan.instructions.len(),
        skipped: plan.skipped,
        report,
    })
}

/// First half of the interactive run: pick tabs, collect employees, total their burdens and
/// stage everything in the session. `select_tabs` receives the available tab names and
/// returns `None` (or an empty list) to cancel.
pub fn prepare(
    config: &SyncConfig,
    period: ReportingPeriod,
    session: &mut Session,
    select_tabs: impl FnOnce(&[String]) -> crate::Result<Option<Vec<String>>>,
) -> crate::Result<Prepared> {
    let mut workflow = Workflow::start();

    let available = list_tabs(&config.master_workbook)?;
    let tabs = select_tabs(&available)?.unwrap_or_default();
    if tabs.is_empty() {
        workflow.advance(WorkflowState::Cancelled)?;
        if discard(session)? {
            tracing::info!("No tabs selected, dropped the previously staged run");
        } else {
            tracing::info!("No tabs selected, nothing staged");
        }
        return Ok(Prepared::Cancelled);
    }

    let gathered = gather(config, tabs, &mut workflow)?;
    let first_tab = gathered.master.sheet(&gathered.tabs[0])?;
    let form = MappingForm {
        categories: gathered.extraction.aggregate.categories().into_iter().collect(),
        columns: discover_columns(first_tab, &config.header_range),
    };

    let pending = PendingRun {
        period,
        tabs: gathered.tabs,
        employees: gathered.employees,
        records: gathered.extraction.records,
        aggregate: gathered.extraction.aggregate,
        form,
    };
    if let Err(e) = pending.store(session) {
        discard(session)?;
        return Err(e);
    }
    workflow.advance(WorkflowState::AwaitingMapping)?;
    tracing::info!(
        "Staged {} burden categories for {period}",
        pending.form.categories.len()
    );

    Ok(Prepared::Staged(pending))
}

/// The staged run, if any, without consuming it.
pub fn staged(session: &Session) -> crate::Result<Option<PendingRun>> {
    PendingRun::load(session)
}

/// Second half of the interactive run. `choose_mapping` is shown the form and returns
/// `None` when the user dismisses it. The session is cleared on every path out of here.
pub fn apply(
    config: &SyncConfig,
    session: &mut Session,
    choose_mapping: impl FnOnce(&MappingForm) -> crate::Result<Option<ColumnMapping>>,
) -> crate::Result<RunOutcome> {
    let guard = session.scoped(PENDING_KEYS);
    let pending = PendingRun::load(&guard)?.ok_or(WorkflowError::NothingStaged)?;
    let mut workflow = Workflow::resume(WorkflowState::AwaitingMapping);

    let Some(mapping) = choose_mapping(&pending.form)? else {
        workflow.advance(WorkflowState::Cleared)?;
        tracing::info!("Mapping dismissed, staged run cleared");
        return Ok(RunOutcome::Cancelled);
    };
    workflow.advance(WorkflowState::MappingReceived)?;

    let mut master = Workbook::open(&config.master_workbook, &pending.tabs)?;
    let summary = write_updates(
        config,
        &mut master,
        &pending.aggregate,
        &mapping,
        pending.period,
    )?;
    workflow.advance(WorkflowState::Applied)?;

    Ok(RunOutcome::Applied(summary))
}

/// Drop a staged run. Returns whether there was one.
pub fn discard(session: &mut Session) -> crate::Result<bool> {
    let was_staged = session.get::<WorkflowState>(STATE_KEY)?.is_some();
    for key in PENDING_KEYS {
        session.delete(key)?;
    }
    Ok(was_staged)
}

fn fixed_tabs(config: &SyncConfig, tabs: Vec<String>) -> Vec<String> {
    if tabs.is_empty() {
        config.master_tabs.clone()
    } else {
        tabs
    }
}

/// The instructions the fixed mapping would produce, without writing anything.
pub fn plan_fixed(
    config: &SyncConfig,
    period: ReportingPeriod,
    tabs: Vec<String>,
) -> crate::Result<Option<Plan>> {
    let tabs = fixed_tabs(config, tabs);
    if tabs.is_empty() {
        return Ok(None);
    }
    config.validate()?;
    let gathered = gather(config, tabs, &mut Workflow::start())?;
    Ok(Some(plan_updates(
        gathered.master.sheets(),
        &gathered.extraction.aggregate,
        &config.fixed_mapping,
        period,
        &config.master_layout,
    )))
}

/// The automatic variant: same pipeline, mapping taken from configuration, no session.
pub fn run_fixed(
    config: &SyncConfig,
    period: ReportingPeriod,
    tabs: Vec<String>,
) -> crate::Result<RunOutcome> {
    let mut workflow = Workflow::start();
    let tabs = fixed_tabs(config, tabs);
    if tabs.is_empty() {
        workflow.advance(WorkflowState::Cancelled)?;
        return Ok(RunOutcome::Cancelled);
    }
    config.validate()?;

    let mut gathered = gather(config, tabs, &mut workflow)?;
    workflow.advance(WorkflowState::MappingReceived)?;
    let summary = write_updates(
        config,
        &mut gathered.master,
        &gathered.extraction.aggregate,
        &config.fixed_mapping,
        period,
    )?;
    workflow.advance(WorkflowState::Applied)?;

    Ok(RunOutcome::Applied(summary))
}
