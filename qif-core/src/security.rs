use std::fmt;
use std::rc::Rc;

use chrono::NaiveDate;
use typed_builder::TypedBuilder;

use super::amount::Price;
use super::date::{format_date, parse_date};
use super::line::{LineValue, ValueError};
use super::line_types::SecurityLine;
use super::record::Record;

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum SecurityType {
    Stock,
    MutualFund,
    Bond,
    Option,
    Other(String),
}

impl SecurityType {
    pub fn as_str(&self) -> &str {
        match self {
            SecurityType::Stock => "Stock",
            SecurityType::MutualFund => "Mutual Fund",
            SecurityType::Bond => "Bond",
            SecurityType::Option => "Option",
            SecurityType::Other(other) => other,
        }
    }
}

impl Default for SecurityType {
    fn default() -> Self {
        SecurityType::Stock
    }
}

impl fmt::Display for SecurityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for SecurityType {
    fn from(s: &str) -> Self {
        match s {
            "Stock" => SecurityType::Stock,
            "Mutual Fund" => SecurityType::MutualFund,
            "Bond" => SecurityType::Bond,
            "Option" => SecurityType::Option,
            other => SecurityType::Other(other.to_string()),
        }
    }
}

/// A security listed under `!Type:Security`. Prices refer to it by symbol.
#[derive(Clone, Debug, Eq, PartialEq, Hash, TypedBuilder)]
pub struct QifSecurity {
    #[builder(setter(into))]
    pub name: String,

    #[builder(setter(into))]
    pub symbol: String,

    #[builder(default)]
    pub ty: SecurityType,
}

impl QifSecurity {
    pub fn to_record(&self) -> Record<SecurityLine> {
        let mut record = Record::new();
        record.push(SecurityLine::Name, LineValue::Text(self.name.clone()));
        record.push(SecurityLine::Symbol, LineValue::Text(self.symbol.clone()));
        record.push(SecurityLine::Type, LineValue::SecurityType(self.ty.clone()));
        record
    }

    /// A security without a symbol is listed under its name.
    pub fn from_record(record: &Record<SecurityLine>) -> Option<QifSecurity> {
        let name = record.line(SecurityLine::Name)?.as_text()?.to_string();
        let symbol = record
            .line(SecurityLine::Symbol)
            .and_then(LineValue::as_text)
            .map(str::to_string)
            .unwrap_or_else(|| name.clone());
        let ty = match record.line(SecurityLine::Type) {
            Some(LineValue::SecurityType(ty)) => ty.clone(),
            _ => SecurityType::default(),
        };
        Some(QifSecurity { name, symbol, ty })
    }
}

/// One dated price of a security.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct QifPrice {
    pub date: NaiveDate,
    pub price: Price,
}

impl QifPrice {
    /// `"SYMBOL",price,"date"`
    pub fn render(&self, symbol: &str, date_format: &str) -> String {
        format!(
            "\"{}\",{},\"{}\"",
            symbol,
            self.price,
            format_date(self.date, date_format)
        )
    }

    /// Reads a `!Type:Prices` line into the quoted symbol and the price.
    pub fn parse(line: &str, date_format: &str) -> Result<(String, QifPrice), ValueError> {
        let parts: Vec<&str> = line
            .split(',')
            .map(|part| part.trim().trim_matches('"'))
            .collect();
        let (symbol, price, date) = match parts.as_slice() {
            [symbol, price, date] => (*symbol, *price, *date),
            _ => return Err(ValueError::PriceLine(line.to_string())),
        };
        let price = price.parse().map_err(|source| ValueError::Decimal {
            text: price.to_string(),
            source,
        })?;
        let date = parse_date(date, date_format).map_err(|source| ValueError::Date {
            text: date.to_string(),
            format: date_format.to_string(),
            source,
        })?;
        Ok((symbol.to_string(), QifPrice { date, price }))
    }
}

/// A registered security and the prices exported for it, in date order.
#[derive(Clone, Debug, PartialEq)]
pub struct QifSecurityPrices {
    pub security: Rc<QifSecurity>,
    pub prices: Vec<QifPrice>,
}

impl QifSecurityPrices {
    pub fn new(security: Rc<QifSecurity>) -> Self {
        QifSecurityPrices {
            security,
            prices: Vec::new(),
        }
    }
}
