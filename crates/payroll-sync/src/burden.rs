//! Payroll burden categories.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BurdenCategory {
    GrossIncome,
    EmployerSocialSecurity,
    EmployerPension,
    EmployerHealthInsurance,
    UnemploymentInsurance,
    PayrollTaxSurcharge,
    /// A category string that isn't one of the known burdens, kept verbatim.
    Other(String),
}

impl BurdenCategory {
    pub const KNOWN: [BurdenCategory; 6] = [
        BurdenCategory::GrossIncome,
        BurdenCategory::EmployerSocialSecurity,
        BurdenCategory::EmployerPension,
        BurdenCategory::EmployerHealthInsurance,
        BurdenCategory::UnemploymentInsurance,
        BurdenCategory::PayrollTaxSurcharge,
    ];

    pub fn label(&self) -> &str {
        match self {
            BurdenCategory::GrossIncome => "Gross Income",
            BurdenCategory::EmployerSocialSecurity => "Employer Social Security",
            BurdenCategory::EmployerPension => "Employer Pension",
            BurdenCategory::EmployerHealthInsurance => "Employer Health Insurance",
            BurdenCategory::UnemploymentInsurance => "Unemployment Insurance",
            BurdenCategory::PayrollTaxSurcharge => "Payroll Tax Surcharge",
            BurdenCategory::Other(label) => label,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, BurdenCategory::Other(_))
    }

    /// Classify a raw category string from the source export.
    pub fn classify(raw: &str, matching: CategoryMatching) -> Self {
        let known = Self::KNOWN.iter().find(|category| match matching {
            CategoryMatching::Exact => category.label() == raw,
            CategoryMatching::Normalized => category.label().eq_ignore_ascii_case(raw.trim()),
        });
        match known {
            Some(category) => category.clone(),
            None => BurdenCategory::Other(raw.to_owned()),
        }
    }
}

impl fmt::Display for BurdenCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// Serialized by label so staged runs and config files stay readable.
impl Serialize for BurdenCategory {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for BurdenCategory {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(BurdenCategory::classify(&label, CategoryMatching::Exact))
    }
}

/// How raw category strings are compared against the known labels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryMatching {
    /// Byte-for-byte equality. `"Gross Income "` is not `Gross Income`.
    #[default]
    Exact,
    /// Ignore surrounding whitespace and ASCII case.
    Normalized,
}

/// Which categories the extractor keeps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryFilter {
    /// Only the known burdens; everything else is logged and dropped.
    #[default]
    Known,
    /// Every distinct category string encountered.
    All,
}

impl CategoryFilter {
    pub fn accepts(self, category: &BurdenCategory) -> bool {
        match self {
            CategoryFilter::Known => category.is_known(),
            CategoryFilter::All => true,
        }
    }
}
