use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::date::DEFAULT_DATE_FORMAT;

/// The QIF consumers with a built-in capability profile.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialectKind {
    Quicken,
    AceMoney,
    MoneyDance,
    HomeBank,
    GnuCash,
}

impl DialectKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DialectKind::Quicken => "quicken",
            DialectKind::AceMoney => "acemoney",
            DialectKind::MoneyDance => "moneydance",
            DialectKind::HomeBank => "homebank",
            DialectKind::GnuCash => "gnucash",
        }
    }
}

impl fmt::Display for DialectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DialectKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "quicken" => Ok(DialectKind::Quicken),
            "acemoney" => Ok(DialectKind::AceMoney),
            "moneydance" => Ok(DialectKind::MoneyDance),
            "homebank" => Ok(DialectKind::HomeBank),
            "gnucash" => Ok(DialectKind::GnuCash),
            other => Err(format!("unknown QIF dialect: {other}")),
        }
    }
}

/// Capability profile of a QIF consumer.
///
/// Every flag selects between two record shapes that describe the same
/// economic event; balances and holdings come out identical either way.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Dialect {
    pub name: String,

    /// `strftime` layout of `D` lines.
    pub date_format: String,

    /// Label transfers plainly as "Transfer" instead of
    /// "Transfer to <account>" / "Transfer from <account>".
    pub simple_transfer: bool,

    /// Trades of zero units are accepted.
    pub can_trade_zero_units: bool,

    /// Linked investment actions (`BuyX`, `SellX`, `DivX`, ...) are accepted.
    pub can_xfer_linked: bool,

    /// `RtrnCap` is accepted.
    pub can_return_capital: bool,

    /// Category income/expense against a security passes through the
    /// portfolio's holding account instead of sitting on the trade itself.
    pub use_holding_for_category: bool,

    /// Tax credits on dividends pass through the holding account.
    pub use_holding_for_tax_credit: bool,

    /// Tax credits on reinvested dividends use `MiscIncX`/`MiscExpX`.
    pub use_misc_inc_x_for_tax_credit: bool,

    /// Only the originating side of a plain transfer is written.
    pub hide_balancing_transfer: bool,

    /// The balancing side of a transfer split leg is not written.
    pub hide_balancing_split_transfer: bool,

    /// Stock splits are written as `StkSplit` rather than `ShrsIn`/`ShrsOut`.
    pub use_stock_split: bool,
}

impl Default for Dialect {
    fn default() -> Self {
        Dialect::preset(DialectKind::Quicken)
    }
}

impl Dialect {
    pub fn preset(kind: DialectKind) -> Dialect {
        let base = Dialect {
            name: kind.as_str().to_string(),
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            simple_transfer: false,
            can_trade_zero_units: false,
            can_xfer_linked: true,
            can_return_capital: true,
            use_holding_for_category: false,
            use_holding_for_tax_credit: false,
            use_misc_inc_x_for_tax_credit: false,
            hide_balancing_transfer: false,
            hide_balancing_split_transfer: false,
            use_stock_split: true,
        };
        match kind {
            DialectKind::Quicken => Dialect {
                date_format: "%m/%d/%Y".to_string(),
                use_misc_inc_x_for_tax_credit: true,
                ..base
            },
            DialectKind::AceMoney => Dialect {
                can_trade_zero_units: true,
                use_holding_for_category: true,
                use_holding_for_tax_credit: true,
                hide_balancing_split_transfer: true,
                ..base
            },
            DialectKind::MoneyDance => Dialect {
                can_xfer_linked: false,
                can_return_capital: false,
                use_holding_for_category: true,
                use_stock_split: false,
                ..base
            },
            DialectKind::HomeBank => Dialect {
                simple_transfer: true,
                can_xfer_linked: false,
                can_return_capital: false,
                hide_balancing_transfer: true,
                hide_balancing_split_transfer: true,
                use_stock_split: false,
                ..base
            },
            DialectKind::GnuCash => Dialect {
                date_format: "%Y-%m-%d".to_string(),
                can_trade_zero_units: true,
                ..base
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_are_named() {
        for kind in [
            DialectKind::Quicken,
            DialectKind::AceMoney,
            DialectKind::MoneyDance,
            DialectKind::HomeBank,
            DialectKind::GnuCash,
        ] {
            assert_eq!(Dialect::preset(kind).name, kind.to_string());
            assert_eq!(kind.as_str().parse::<DialectKind>(), Ok(kind));
        }
    }

    #[test]
    fn default_is_quicken() {
        let dialect = Dialect::default();
        assert_eq!(dialect.name, "quicken");
        assert!(dialect.can_xfer_linked);
        assert!(!dialect.can_trade_zero_units);
    }
}
