use std::fmt::Debug;
use std::rc::Rc;

use chrono::NaiveDate;
use thiserror::Error;

use super::account::{QifAccount, QifAccountType};
use super::action::InvestmentAction;
use super::amount::{Money, Percentage, Price, Ratio, Units};
use super::category::{QifCategory, QifClass};
use super::date::{format_date, parse_date};
use super::dialect::Dialect;
use super::flags::Cleared;
use super::payee::QifPayee;
use super::security::{QifSecurity, SecurityType};

/// Discriminates the lines of one record type. Each kind owns a single
/// symbol and the kind of value that follows it.
pub trait LineKind: Copy + Eq + Debug + 'static {
    fn symbol(self) -> char;

    fn value_kind(self) -> ValueKind;

    fn from_symbol(symbol: char) -> Option<Self>;
}

/// The scalar codecs a line value can be written and read with.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ValueKind {
    Date,
    Money,
    Text,
    Price,
    Units,
    Ratio,
    Percentage,
    Cleared,
    /// A line whose presence is the whole value (`I`/`E` on categories).
    Flag,
    Action,
    AccountType,
    SecurityType,
    Payee,
    Category,
    Security,
}

/// Target of an `L` or `S` line.
#[derive(Clone, Debug, PartialEq)]
pub enum CategoryTarget {
    /// `Category/Class:Class`
    Category {
        category: Option<Rc<QifCategory>>,
        classes: Vec<Rc<QifClass>>,
    },
    /// `[Account]/Class:Class`
    Transfer {
        account: Option<Rc<QifAccount>>,
        classes: Vec<Rc<QifClass>>,
    },
    /// `Category|[Account]`, used by linked miscellaneous income/expense.
    CategoryTransfer {
        category: Option<Rc<QifCategory>>,
        account: Option<Rc<QifAccount>>,
    },
}

impl CategoryTarget {
    pub fn category(category: Rc<QifCategory>, classes: Vec<Rc<QifClass>>) -> Self {
        CategoryTarget::Category {
            category: Some(category),
            classes,
        }
    }

    pub fn transfer(account: Rc<QifAccount>, classes: Vec<Rc<QifClass>>) -> Self {
        CategoryTarget::Transfer {
            account: Some(account),
            classes,
        }
    }

    pub fn transfer_account(&self) -> Option<&Rc<QifAccount>> {
        match self {
            CategoryTarget::Transfer { account, .. }
            | CategoryTarget::CategoryTransfer { account, .. } => account.as_ref(),
            CategoryTarget::Category { .. } => None,
        }
    }

    pub fn target_category(&self) -> Option<&Rc<QifCategory>> {
        match self {
            CategoryTarget::Category { category, .. }
            | CategoryTarget::CategoryTransfer { category, .. } => category.as_ref(),
            CategoryTarget::Transfer { .. } => None,
        }
    }

    fn render(&self) -> String {
        fn with_classes(base: String, classes: &[Rc<QifClass>]) -> String {
            if classes.is_empty() {
                base
            } else {
                let names: Vec<&str> = classes.iter().map(|c| c.name.as_str()).collect();
                format!("{}/{}", base, names.join(":"))
            }
        }
        let category_name = |c: &Option<Rc<QifCategory>>| {
            c.as_ref().map(|c| c.name.clone()).unwrap_or_default()
        };
        let account_name = |a: &Option<Rc<QifAccount>>| {
            format!("[{}]", a.as_ref().map(|a| a.name.as_str()).unwrap_or_default())
        };
        match self {
            CategoryTarget::Category { category, classes } => {
                with_classes(category_name(category), classes)
            }
            CategoryTarget::Transfer { account, classes } => {
                with_classes(account_name(account), classes)
            }
            CategoryTarget::CategoryTransfer { category, account } => {
                format!("{}|{}", category_name(category), account_name(account))
            }
        }
    }

    fn parse(s: &str, resolver: &dyn Resolver) -> CategoryTarget {
        let s = s.trim();
        if let Some((category, account)) = s.split_once('|') {
            return CategoryTarget::CategoryTransfer {
                category: resolver.category(category.trim()),
                account: resolver.account(strip_brackets(account.trim())),
            };
        }
        // Class names follow the first '/' outside of the account brackets.
        let split_at = if s.starts_with('[') {
            s.find(']').and_then(|end| s[end..].find('/').map(|i| i + end))
        } else {
            s.find('/')
        };
        let (target, classes) = match split_at {
            Some(i) => (&s[..i], &s[i + 1..]),
            None => (s, ""),
        };
        let classes = classes
            .split(':')
            .filter(|name| !name.is_empty())
            .filter_map(|name| resolver.class(name))
            .collect();
        if target.starts_with('[') {
            CategoryTarget::Transfer {
                account: resolver.account(strip_brackets(target)),
                classes,
            }
        } else {
            CategoryTarget::Category {
                category: resolver.category(target),
                classes,
            }
        }
    }
}

fn strip_brackets(s: &str) -> &str {
    s.trim_start_matches('[').trim_end_matches(']')
}

/// A typed line value.
#[derive(Clone, Debug, PartialEq)]
pub enum LineValue {
    Date(NaiveDate),
    Money(Money),
    Text(String),
    Price(Price),
    Units(Units),
    Ratio(Ratio),
    Percentage(Percentage),
    Cleared(Cleared),
    Flag,
    Action(InvestmentAction),
    AccountType(QifAccountType),
    SecurityType(SecurityType),
    Payee(Rc<QifPayee>),
    Category(CategoryTarget),
    Security(Option<Rc<QifSecurity>>),
}

impl LineValue {
    pub fn render(&self, dialect: &Dialect) -> String {
        match self {
            LineValue::Date(date) => format_date(*date, &dialect.date_format),
            LineValue::Money(money) => money.to_string(),
            LineValue::Text(text) => text.clone(),
            LineValue::Price(price) => price.to_string(),
            LineValue::Units(units) => units.to_string(),
            LineValue::Ratio(ratio) => ratio.to_string(),
            LineValue::Percentage(pct) => pct.to_string(),
            LineValue::Cleared(cleared) => cleared.to_string(),
            LineValue::Flag => String::new(),
            LineValue::Action(action) => action.to_string(),
            LineValue::AccountType(ty) => ty.to_string(),
            LineValue::SecurityType(ty) => ty.to_string(),
            LineValue::Payee(payee) => payee.name.clone(),
            LineValue::Category(target) => target.render(),
            LineValue::Security(security) => security
                .as_ref()
                .map(|s| s.name.clone())
                .unwrap_or_default(),
        }
    }

    /// Reads the raw text following a line symbol. Entity references are
    /// looked up through `resolver` and are `None` when not (yet) known.
    pub fn parse(
        kind: ValueKind,
        raw: &str,
        resolver: &dyn Resolver,
    ) -> Result<LineValue, ValueError> {
        let decimal_error = |source| ValueError::Decimal {
            text: raw.to_string(),
            source,
        };
        Ok(match kind {
            ValueKind::Date => {
                let format = resolver.date_format();
                LineValue::Date(parse_date(raw, format).map_err(|source| ValueError::Date {
                    text: raw.to_string(),
                    format: format.to_string(),
                    source,
                })?)
            }
            ValueKind::Money => LineValue::Money(raw.parse().map_err(decimal_error)?),
            ValueKind::Text => LineValue::Text(raw.to_string()),
            ValueKind::Price => LineValue::Price(raw.parse().map_err(decimal_error)?),
            ValueKind::Units => LineValue::Units(raw.parse().map_err(decimal_error)?),
            ValueKind::Ratio => LineValue::Ratio(raw.parse().map_err(decimal_error)?),
            ValueKind::Percentage => LineValue::Percentage(raw.parse().map_err(decimal_error)?),
            ValueKind::Cleared => match Cleared::from_symbol(raw) {
                Some(cleared) => LineValue::Cleared(cleared),
                None => return Err(ValueError::Cleared(raw.to_string())),
            },
            ValueKind::Flag => LineValue::Flag,
            ValueKind::Action => {
                LineValue::Action(raw.parse().map_err(|_| ValueError::Action(raw.to_string()))?)
            }
            ValueKind::AccountType => LineValue::AccountType(
                raw.parse()
                    .map_err(|_| ValueError::AccountType(raw.to_string()))?,
            ),
            ValueKind::SecurityType => LineValue::SecurityType(SecurityType::from(raw.trim())),
            ValueKind::Payee => match resolver.payee(raw) {
                Some(payee) => LineValue::Payee(payee),
                None => LineValue::Text(raw.to_string()),
            },
            ValueKind::Category => LineValue::Category(CategoryTarget::parse(raw, resolver)),
            ValueKind::Security => LineValue::Security(
                resolver
                    .security(raw.trim())
                    .or_else(|| resolver.security_by_symbol(raw.trim())),
            ),
        })
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            LineValue::Date(date) => Some(*date),
            _ => None,
        }
    }

    pub fn as_money(&self) -> Option<Money> {
        match self {
            LineValue::Money(money) => Some(*money),
            _ => None,
        }
    }

    pub fn as_units(&self) -> Option<Units> {
        match self {
            LineValue::Units(units) => Some(*units),
            _ => None,
        }
    }

    pub fn as_price(&self) -> Option<Price> {
        match self {
            LineValue::Price(price) => Some(*price),
            _ => None,
        }
    }

    pub fn as_ratio(&self) -> Option<Ratio> {
        match self {
            LineValue::Ratio(ratio) => Some(*ratio),
            _ => None,
        }
    }

    pub fn as_action(&self) -> Option<InvestmentAction> {
        match self {
            LineValue::Action(action) => Some(*action),
            _ => None,
        }
    }

    pub fn as_category(&self) -> Option<&CategoryTarget> {
        match self {
            LineValue::Category(target) => Some(target),
            _ => None,
        }
    }

    pub fn as_security(&self) -> Option<&Rc<QifSecurity>> {
        match self {
            LineValue::Security(security) => security.as_ref(),
            _ => None,
        }
    }

    /// Text of a text or payee line.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            LineValue::Text(text) => Some(text),
            LineValue::Payee(payee) => Some(&payee.name),
            _ => None,
        }
    }
}

/// One `<symbol><value>` line of a record.
#[derive(Clone, Debug, PartialEq)]
pub struct Line<K> {
    pub kind: K,
    pub value: LineValue,
}

impl<K: LineKind> Line<K> {
    pub fn new(kind: K, value: LineValue) -> Self {
        Line { kind, value }
    }

    pub fn render(&self, dialect: &Dialect) -> String {
        format!("{}{}", self.kind.symbol(), self.value.render(dialect))
    }

    /// Reads one raw line. `Ok(None)` means the symbol is not one of `K`'s,
    /// or the line is a `C` line with a status that is not recognised and
    /// leaves the entry uncleared.
    pub fn parse(
        symbol: char,
        raw: &str,
        resolver: &dyn Resolver,
    ) -> Result<Option<Line<K>>, ValueError> {
        match K::from_symbol(symbol) {
            Some(kind)
                if kind.value_kind() == ValueKind::Cleared
                    && Cleared::from_symbol(raw).is_none() =>
            {
                Ok(None)
            }
            Some(kind) => {
                let value = LineValue::parse(kind.value_kind(), raw, resolver)?;
                Ok(Some(Line { kind, value }))
            }
            None => Ok(None),
        }
    }
}

/// Entity lookups and formatting options needed to read line values.
pub trait Resolver {
    fn date_format(&self) -> &str;

    fn payee(&self, name: &str) -> Option<Rc<QifPayee>>;

    fn account(&self, name: &str) -> Option<Rc<QifAccount>>;

    fn category(&self, name: &str) -> Option<Rc<QifCategory>>;

    fn class(&self, name: &str) -> Option<Rc<QifClass>>;

    fn security(&self, name: &str) -> Option<Rc<QifSecurity>>;

    fn security_by_symbol(&self, symbol: &str) -> Option<Rc<QifSecurity>>;
}

/// A line value that could not be read.
#[derive(Debug, Error)]
pub enum ValueError {
    #[error("invalid number {text:?}")]
    Decimal {
        text: String,
        #[source]
        source: rust_decimal::Error,
    },
    #[error("invalid date {text:?} for layout {format:?}")]
    Date {
        text: String,
        format: String,
        #[source]
        source: chrono::ParseError,
    },
    #[error("invalid cleared flag {0:?}")]
    Cleared(String),
    #[error("unknown investment action {0:?}")]
    Action(String),
    #[error("unknown account type {0:?}")]
    AccountType(String),
    #[error("malformed price line {0:?}")]
    PriceLine(String),
}
