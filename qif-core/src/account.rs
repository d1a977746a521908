use std::fmt;
use std::str::FromStr;

use typed_builder::TypedBuilder;

use super::line::LineValue;
use super::line_types::AccountLine;
use super::record::Record;

/// Account types understood by QIF consumers. The name doubles as the
/// section header of the account's transactions (`!Type:Bank`).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum QifAccountType {
    Bank,
    Cash,
    CreditCard,
    Investment,
    OtherAsset,
    OtherLiability,
}

impl QifAccountType {
    pub fn as_str(self) -> &'static str {
        match self {
            QifAccountType::Bank => "Bank",
            QifAccountType::Cash => "Cash",
            QifAccountType::CreditCard => "CCard",
            QifAccountType::Investment => "Invst",
            QifAccountType::OtherAsset => "Oth A",
            QifAccountType::OtherLiability => "Oth L",
        }
    }

    pub fn is_investment(self) -> bool {
        self == QifAccountType::Investment
    }
}

impl fmt::Display for QifAccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QifAccountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Bank" => Ok(QifAccountType::Bank),
            "Cash" => Ok(QifAccountType::Cash),
            "CCard" => Ok(QifAccountType::CreditCard),
            "Invst" | "Port" => Ok(QifAccountType::Investment),
            "Oth A" => Ok(QifAccountType::OtherAsset),
            "Oth L" => Ok(QifAccountType::OtherLiability),
            other => Err(format!("unknown account type: {other}")),
        }
    }
}

/// An account with a ledger of its own in the export.
#[derive(Clone, Debug, Eq, PartialEq, Hash, TypedBuilder)]
pub struct QifAccount {
    #[builder(setter(into))]
    pub name: String,

    pub ty: QifAccountType,

    #[builder(default)]
    pub description: Option<String>,
}

impl QifAccount {
    pub fn to_record(&self) -> Record<AccountLine> {
        let mut record = Record::new();
        record.push(AccountLine::Name, LineValue::Text(self.name.clone()));
        record.push(AccountLine::Type, LineValue::AccountType(self.ty));
        if let Some(description) = &self.description {
            record.push(AccountLine::Description, LineValue::Text(description.clone()));
        }
        record
    }

    /// Rebuilds an account definition; `None` without a name. A missing
    /// type reads as a bank account.
    pub fn from_record(record: &Record<AccountLine>) -> Option<QifAccount> {
        let name = record.line(AccountLine::Name)?.as_text()?.to_string();
        let ty = match record.line(AccountLine::Type) {
            Some(LineValue::AccountType(ty)) => *ty,
            _ => QifAccountType::Bank,
        };
        let description = record
            .line(AccountLine::Description)
            .and_then(LineValue::as_text)
            .map(str::to_string);
        Some(QifAccount {
            name,
            ty,
            description,
        })
    }
}
