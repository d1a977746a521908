//! Data model of Quicken Interchange Format files: typed line values, the
//! records built from them, the entities records refer to and the registry
//! that interns those entities for one file.

pub use account::{QifAccount, QifAccountType};
pub use action::InvestmentAction;
pub use amount::{Money, Percentage, Price, Ratio, Units};
pub use category::{QifCategory, QifClass, QifParentCategory};
pub use date::{format_date, parse_date, DEFAULT_DATE_FORMAT};
pub use dialect::{Dialect, DialectKind};
pub use file::{QifAccountEvents, QifFile};
pub use flags::Cleared;
pub use line::{CategoryTarget, Line, LineKind, LineValue, Resolver, ValueError, ValueKind};
pub use line_types::*;
pub use payee::QifPayee;
pub use record::{DatedKind, QifEvent, QifLedgerEntry, QifPortfolioEvent, QifSplit, Record};
pub use security::{QifPrice, QifSecurity, QifSecurityPrices, SecurityType};

pub mod account;
pub mod action;
pub mod amount;
pub mod category;
mod date;
pub mod dialect;
pub mod file;
pub mod flags;
pub mod line;
pub mod line_types;
pub mod payee;
pub mod record;
pub mod security;
