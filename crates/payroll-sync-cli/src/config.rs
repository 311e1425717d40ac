use anyhow::{Context, Result};
use payroll_sync::burden::{BurdenCategory, CategoryFilter, CategoryMatching};
use payroll_sync::column::Column;
use payroll_sync::mapping::{ColumnMapping, HeaderRange};
use payroll_sync::reconcile::extract::SourceLayout;
use payroll_sync::reconcile::matching::DestinationLayout;
use payroll_sync::reconcile::writer::WriteOptions;
use payroll_sync::workflow::{SyncConfig, default_fixed_mapping};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A column given either as a letter (`"F"`) or as a 1-based number (`6`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawConfigColumn")]
pub struct ConfigColumn(pub Column);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawConfigColumn {
    Number(usize),
    Letter(String),
}

impl TryFrom<RawConfigColumn> for ConfigColumn {
    type Error = String;

    fn try_from(raw: RawConfigColumn) -> Result<Self, Self::Error> {
        match raw {
            RawConfigColumn::Number(0) => Err("columns are 1-based".to_string()),
            RawConfigColumn::Number(number) => Ok(ConfigColumn(Column(number))),
            RawConfigColumn::Letter(letter) => letter.parse().map(ConfigColumn),
        }
    }
}

impl ConfigColumn {
    fn index(self) -> usize {
        self.0.index()
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigSource {
    pub workbook: PathBuf,
    pub sheet: String,
    pub employee_column: ConfigColumn,
    pub category_column: ConfigColumn,
    pub fx_rate_column: ConfigColumn,
    pub amount_column: ConfigColumn,
    pub pay_date_column: ConfigColumn,
    pub header_rows: usize,
    pub categories: CategoryFilter,
    pub category_matching: CategoryMatching,
    pub convert_with_fx_rate: bool,
}

impl Default for ConfigSource {
    fn default() -> Self {
        let layout = SourceLayout::default();
        let defaults = SyncConfig::default();
        ConfigSource {
            workbook: defaults.source_workbook,
            sheet: defaults.source_sheet,
            employee_column: ConfigColumn(Column(layout.employee_column)),
            category_column: ConfigColumn(Column(layout.category_column)),
            fx_rate_column: ConfigColumn(Column(layout.fx_rate_column)),
            amount_column: ConfigColumn(Column(layout.amount_column)),
            pay_date_column: ConfigColumn(Column(layout.pay_date_column)),
            header_rows: layout.header_rows,
            categories: layout.category_filter,
            category_matching: layout.category_matching,
            convert_with_fx_rate: layout.convert_with_fx_rate,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigMaster {
    pub workbook: PathBuf,
    /// Tabs for `auto` and `plan` when `--tabs` is not given.
    pub tabs: Vec<String>,
    pub employee_column: ConfigColumn,
    pub pay_date_column: ConfigColumn,
    pub header_rows: usize,
    pub allow_multiple_matches: bool,
    pub header_row: usize,
    pub first_header_column: ConfigColumn,
    pub last_header_column: Option<ConfigColumn>,
    pub verify_writes: bool,
}

impl Default for ConfigMaster {
    fn default() -> Self {
        let layout = DestinationLayout::default();
        let header = HeaderRange::default();
        ConfigMaster {
            workbook: SyncConfig::default().master_workbook,
            tabs: Vec::new(),
            employee_column: ConfigColumn(Column(layout.employee_column)),
            pay_date_column: ConfigColumn(Column(layout.pay_date_column)),
            header_rows: layout.header_rows,
            allow_multiple_matches: layout.allow_multiple_matches,
            header_row: header.row,
            first_header_column: ConfigColumn(Column(header.first_column)),
            last_header_column: header.last_column.map(|column| ConfigColumn(Column(column))),
            verify_writes: WriteOptions::default().verify,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigSession {
    pub dir: PathBuf,
}

impl Default for ConfigSession {
    fn default() -> Self {
        ConfigSession {
            dir: PathBuf::from(".payroll-sync"),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub source: ConfigSource,
    pub master: ConfigMaster,
    /// Category label to column, used by `auto` and `plan`. Empty means the built-in layout.
    pub mapping: BTreeMap<String, ConfigColumn>,
    pub session: ConfigSession,
}

impl Config {
    pub fn load_from_file(path: &Path) -> Result<(PathBuf, Self)> {
        let base_dir = path.parent().map(ToOwned::to_owned).unwrap_or_default();

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok((base_dir, config))
    }

    pub fn find_and_load() -> Result<Option<(PathBuf, Self)>> {
        let config_locations = [
            Path::new("payroll-sync.toml"),
            Path::new(".payroll-sync.toml"),
        ];

        for location in &config_locations {
            if location.exists() {
                return Self::load_from_file(location).map(Some);
            }
        }

        Ok(None)
    }

    /// Relative paths are resolved against `base_dir`, the directory of the config file.
    pub fn sync_config(&self, base_dir: &Path) -> Result<SyncConfig> {
        let source = &self.source;
        let master = &self.master;

        let fixed_mapping = if self.mapping.is_empty() {
            default_fixed_mapping()
        } else {
            self.mapping
                .iter()
                .map(|(label, column)| {
                    (
                        BurdenCategory::classify(label, source.category_matching),
                        column.index(),
                    )
                })
                .collect::<ColumnMapping>()
        };

        let config = SyncConfig {
            source_workbook: base_dir.join(&source.workbook),
            source_sheet: source.sheet.clone(),
            source_layout: SourceLayout {
                employee_column: source.employee_column.index(),
                category_column: source.category_column.index(),
                fx_rate_column: source.fx_rate_column.index(),
                amount_column: source.amount_column.index(),
                pay_date_column: source.pay_date_column.index(),
                header_rows: source.header_rows,
                category_filter: source.categories,
                category_matching: source.category_matching,
                convert_with_fx_rate: source.convert_with_fx_rate,
            },
            master_workbook: base_dir.join(&master.workbook),
            master_tabs: master.tabs.clone(),
            master_layout: DestinationLayout {
                employee_column: master.employee_column.index(),
                pay_date_column: master.pay_date_column.index(),
                header_rows: master.header_rows,
                allow_multiple_matches: master.allow_multiple_matches,
            },
            header_range: HeaderRange {
                row: master.header_row,
                first_column: master.first_header_column.index(),
                last_column: master.last_header_column.map(ConfigColumn::index),
            },
            write: WriteOptions {
                verify: master.verify_writes,
            },
            fixed_mapping,
        };
        config.validate().context("Invalid [mapping] section")?;
        Ok(config)
    }

    pub fn session_dir(&self, base_dir: &Path) -> PathBuf {
        base_dir.join(&self.session.dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        let sync = config.sync_config(Path::new("/books")).unwrap();
        assert_eq!(sync.source_workbook, Path::new("/books/source"));
        assert_eq!(sync.master_workbook, Path::new("/books/master"));
        assert_eq!(sync.source_sheet, "Payroll Burdens");
        assert_eq!(sync.source_layout, SourceLayout::default());
        assert_eq!(sync.master_layout, DestinationLayout::default());
        assert_eq!(sync.header_range, HeaderRange::default());
        assert_eq!(sync.fixed_mapping, default_fixed_mapping());
        assert_eq!(config.session_dir(Path::new("/books")), Path::new("/books/.payroll-sync"));
    }

    #[test]
    fn full_file() {
        let config: Config = toml::from_str(
            r#"
            [source]
            workbook = "exports/march"
            sheet = "Burdens"
            amount_column = "F"
            fx_rate_column = 7
            categories = "all"
            category_matching = "normalized"
            convert_with_fx_rate = true

            [master]
            workbook = "/srv/master"
            tabs = ["Germany", "France"]
            allow_multiple_matches = false
            last_header_column = "K"
            verify_writes = false

            [mapping]
            "Gross Income" = "C"
            "Employer Pension" = 9

            [session]
            dir = "/tmp/payroll"
            "#,
        )
        .unwrap();
        let sync = config.sync_config(Path::new("books")).unwrap();

        assert_eq!(sync.source_workbook, Path::new("books/exports/march"));
        assert_eq!(sync.master_workbook, Path::new("/srv/master"));
        assert_eq!(sync.source_layout.amount_column, 6);
        assert_eq!(sync.source_layout.fx_rate_column, 7);
        assert_eq!(sync.source_layout.category_filter, CategoryFilter::All);
        assert!(sync.source_layout.convert_with_fx_rate);
        assert_eq!(sync.master_tabs, ["Germany", "France"]);
        assert!(!sync.master_layout.allow_multiple_matches);
        assert_eq!(sync.header_range.last_column, Some(11));
        assert!(!sync.write.verify);
        assert_eq!(
            sync.fixed_mapping,
            ColumnMapping::new()
                .with(BurdenCategory::GrossIncome, 3)
                .with(BurdenCategory::EmployerPension, 9)
        );
        assert_eq!(config.session_dir(Path::new("books")), Path::new("/tmp/payroll"));
    }

    #[test]
    fn misspelled_mapping_label() {
        let config: Config = toml::from_str(
            r#"
            [mapping]
            "Gross Income" = "C"
            "Employer Pensoin" = "D"
            "#,
        )
        .unwrap();
        let err = config.sync_config(Path::new("books")).unwrap_err();
        assert_eq!(
            format!("{err:#}"),
            "Invalid [mapping] section: the fixed mapping names 'Employer Pensoin', which is not a tracked burden category"
        );

        // pass-through categories may be mapped
        let config: Config = toml::from_str(
            r#"
            [source]
            categories = "all"

            [mapping]
            "Bonus" = "K"
            "#,
        )
        .unwrap();
        let sync = config.sync_config(Path::new("books")).unwrap();
        assert_eq!(
            sync.fixed_mapping.column(&BurdenCategory::Other("Bonus".into())),
            Some(11)
        );
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = toml::from_str::<Config>("[master]\ntab = \"Germany\"\n").unwrap_err();
        assert!(err.to_string().contains("unknown field `tab`"));
    }

    #[test]
    fn invalid_columns_are_rejected() {
        assert!(toml::from_str::<Config>("[source]\namount_column = 0\n").is_err());
        assert!(toml::from_str::<Config>("[source]\namount_column = \"F1\"\n").is_err());
    }
}
