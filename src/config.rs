use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use qif_core::{Dialect, DialectKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid export configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// When an income or expense is written as a split that shows its
/// ancillary amounts.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtraDetailRule {
    /// Unless all four ancillary amounts are recorded.
    #[default]
    AnyAbsent,
    /// When at least one ancillary amount is recorded.
    AnyPresent,
}

/// Categories the ancillary amounts of an income or expense are booked to.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AncillaryCategories {
    pub tax_credit: String,
    pub national_insurance: String,
    pub deemed_benefit: String,
    pub charity_donation: String,
}

impl Default for AncillaryCategories {
    fn default() -> Self {
        AncillaryCategories {
            tax_credit: "Tax:Tax Credit".to_string(),
            national_insurance: "Tax:National Insurance".to_string(),
            deemed_benefit: "Benefit:Deemed".to_string(),
            charity_donation: "Gifts:Charity".to_string(),
        }
    }
}

/// Per-flag changes to a dialect preset.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DialectOverrides {
    pub date_format: Option<String>,
    pub simple_transfer: Option<bool>,
    pub can_trade_zero_units: Option<bool>,
    pub can_xfer_linked: Option<bool>,
    pub can_return_capital: Option<bool>,
    pub use_holding_for_category: Option<bool>,
    pub use_holding_for_tax_credit: Option<bool>,
    pub use_misc_inc_x_for_tax_credit: Option<bool>,
    pub hide_balancing_transfer: Option<bool>,
    pub hide_balancing_split_transfer: Option<bool>,
    pub use_stock_split: Option<bool>,
}

impl DialectOverrides {
    fn apply(&self, mut dialect: Dialect) -> Dialect {
        fn set(flag: &mut bool, value: Option<bool>) {
            if let Some(value) = value {
                *flag = value;
            }
        }
        if let Some(format) = &self.date_format {
            dialect.date_format = format.clone();
        }
        set(&mut dialect.simple_transfer, self.simple_transfer);
        set(&mut dialect.can_trade_zero_units, self.can_trade_zero_units);
        set(&mut dialect.can_xfer_linked, self.can_xfer_linked);
        set(&mut dialect.can_return_capital, self.can_return_capital);
        set(&mut dialect.use_holding_for_category, self.use_holding_for_category);
        set(&mut dialect.use_holding_for_tax_credit, self.use_holding_for_tax_credit);
        set(
            &mut dialect.use_misc_inc_x_for_tax_credit,
            self.use_misc_inc_x_for_tax_credit,
        );
        set(&mut dialect.hide_balancing_transfer, self.hide_balancing_transfer);
        set(
            &mut dialect.hide_balancing_split_transfer,
            self.hide_balancing_split_transfer,
        );
        set(&mut dialect.use_stock_split, self.use_stock_split);
        dialect
    }
}

/// Settings of one export session.
///
/// ```toml
/// dialect = "acemoney"
/// tax_authority = "HMRC"
/// last_price_date = "2024-04-05"
///
/// [overrides]
/// date_format = "%Y-%m-%d"
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub dialect: DialectKind,
    pub overrides: DialectOverrides,
    pub extra_detail: ExtraDetailRule,
    pub tax_authority: String,
    pub charity: String,
    pub categories: AncillaryCategories,
    /// Prices dated after this day are not exported.
    pub last_price_date: Option<NaiveDate>,
    /// Sort every ledger by date before it is written.
    pub chronological: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        ExportConfig {
            dialect: DialectKind::Quicken,
            overrides: DialectOverrides::default(),
            extra_detail: ExtraDetailRule::default(),
            tax_authority: "HMRC".to_string(),
            charity: "Charity".to_string(),
            categories: AncillaryCategories::default(),
            last_price_date: None,
            chronological: true,
        }
    }
}

impl ExportConfig {
    pub fn for_dialect(dialect: DialectKind) -> Self {
        ExportConfig {
            dialect,
            ..ExportConfig::default()
        }
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// The preset with the configured overrides applied.
    pub fn resolved_dialect(&self) -> Dialect {
        self.overrides.apply(Dialect::preset(self.dialect))
    }
}
