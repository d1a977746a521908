//! The source ledger being exported.

use std::fmt;
use std::rc::Rc;

use chrono::NaiveDate;
use qif_core::{Money, Price, QifAccountType, SecurityType, Units};
use typed_builder::TypedBuilder;

/// The payee and category a cash account books its spending to when no
/// detail was recorded.
#[derive(Clone, Debug, PartialEq)]
pub struct AutoExpense {
    pub payee: String,
    pub category: Rc<TransactionCategory>,
}

/// An endpoint of a transaction.
#[derive(Clone, Debug, PartialEq)]
pub enum Asset {
    Payee {
        name: String,
        description: Option<String>,
    },
    Cash {
        name: String,
        description: Option<String>,
        parent: Option<String>,
        auto_expense: Option<AutoExpense>,
    },
    Deposit {
        name: String,
        description: Option<String>,
        parent: Option<String>,
    },
    Loan {
        name: String,
        description: Option<String>,
        parent: Option<String>,
    },
    Portfolio {
        name: String,
        description: Option<String>,
        parent: Option<String>,
    },
    Security {
        name: String,
        description: Option<String>,
        parent: Option<String>,
        symbol: String,
        ty: SecurityType,
    },
}

impl Asset {
    pub fn payee(name: impl Into<String>) -> Asset {
        Asset::Payee {
            name: name.into(),
            description: None,
        }
    }

    pub fn cash(name: impl Into<String>, auto_expense: Option<AutoExpense>) -> Asset {
        Asset::Cash {
            name: name.into(),
            description: None,
            parent: None,
            auto_expense,
        }
    }

    pub fn deposit(name: impl Into<String>, parent: Option<&str>) -> Asset {
        Asset::Deposit {
            name: name.into(),
            description: None,
            parent: parent.map(str::to_string),
        }
    }

    pub fn loan(name: impl Into<String>, parent: Option<&str>) -> Asset {
        Asset::Loan {
            name: name.into(),
            description: None,
            parent: parent.map(str::to_string),
        }
    }

    pub fn portfolio(name: impl Into<String>, parent: Option<&str>) -> Asset {
        Asset::Portfolio {
            name: name.into(),
            description: None,
            parent: parent.map(str::to_string),
        }
    }

    pub fn security(name: impl Into<String>, symbol: impl Into<String>) -> Asset {
        Asset::Security {
            name: name.into(),
            description: None,
            parent: None,
            symbol: symbol.into(),
            ty: SecurityType::Stock,
        }
    }

    pub fn with_description(mut self, text: impl Into<String>) -> Asset {
        match &mut self {
            Asset::Payee { description, .. }
            | Asset::Cash { description, .. }
            | Asset::Deposit { description, .. }
            | Asset::Loan { description, .. }
            | Asset::Portfolio { description, .. }
            | Asset::Security { description, .. } => *description = Some(text.into()),
        }
        self
    }

    pub fn name(&self) -> &str {
        match self {
            Asset::Payee { name, .. }
            | Asset::Cash { name, .. }
            | Asset::Deposit { name, .. }
            | Asset::Loan { name, .. }
            | Asset::Portfolio { name, .. }
            | Asset::Security { name, .. } => name,
        }
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            Asset::Payee { description, .. }
            | Asset::Cash { description, .. }
            | Asset::Deposit { description, .. }
            | Asset::Loan { description, .. }
            | Asset::Portfolio { description, .. }
            | Asset::Security { description, .. } => description.as_deref(),
        }
    }

    /// The payee that owns this asset. Payees own themselves.
    pub fn parent(&self) -> Option<&str> {
        match self {
            Asset::Payee { name, .. } => Some(name),
            Asset::Cash { parent, .. }
            | Asset::Deposit { parent, .. }
            | Asset::Loan { parent, .. }
            | Asset::Portfolio { parent, .. }
            | Asset::Security { parent, .. } => parent.as_deref(),
        }
    }

    pub fn auto_expense(&self) -> Option<&AutoExpense> {
        match self {
            Asset::Cash { auto_expense, .. } => auto_expense.as_ref(),
            _ => None,
        }
    }

    pub fn is_payee(&self) -> bool {
        matches!(self, Asset::Payee { .. })
    }

    pub fn is_security(&self) -> bool {
        matches!(self, Asset::Security { .. })
    }

    /// The ledger type of an asset that keeps one; payees and securities
    /// have none.
    pub fn qif_account_type(&self) -> Option<QifAccountType> {
        match self {
            Asset::Payee { .. } | Asset::Security { .. } => None,
            Asset::Cash { .. } => Some(QifAccountType::Cash),
            Asset::Deposit { .. } => Some(QifAccountType::Bank),
            Asset::Loan { .. } => Some(QifAccountType::OtherLiability),
            Asset::Portfolio { .. } => Some(QifAccountType::Investment),
        }
    }

    /// Same asset, compared by name.
    pub fn same_as(&self, other: &Asset) -> bool {
        self.name() == other.name()
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a category means to the classifiers.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum CategoryClass {
    Income,
    Expense,
    Transfer,
    Interest,
    Dividend,
    LoanInterestEarned,
    RentalIncome,
    RoomRentalIncome,
    WriteOff,
    LoanInterestCharged,
    StockSplit,
    StockAdjust,
    StockDeMerger,
    StockTakeOver,
}

impl CategoryClass {
    pub fn is_income(self) -> bool {
        use CategoryClass::*;
        matches!(
            self,
            Income | Interest | Dividend | LoanInterestEarned | RentalIncome | RoomRentalIncome
        )
    }

    /// Income or expense of the entity owning the credit leg.
    pub fn is_owner_income(self) -> bool {
        use CategoryClass::*;
        matches!(self, LoanInterestEarned | RentalIncome | RoomRentalIncome)
    }

    pub fn is_owner_expense(self) -> bool {
        matches!(self, CategoryClass::WriteOff | CategoryClass::LoanInterestCharged)
    }
}

#[derive(Clone, Debug, PartialEq, TypedBuilder)]
pub struct TransactionCategory {
    #[builder(setter(into))]
    pub name: String,

    #[builder(default, setter(strip_option, into))]
    pub description: Option<String>,

    pub class: CategoryClass,

    #[builder(default)]
    pub tax_related: bool,
}

/// A movement of value from `debit` to `credit`.
///
/// Ancillary amounts and unit deltas are magnitudes. `debit_units` leave
/// the debit security, `credit_units` arrive in the credit security.
#[derive(Clone, Debug, PartialEq, TypedBuilder)]
pub struct Transaction {
    #[builder(default)]
    pub id: u32,

    pub date: NaiveDate,

    pub debit: Rc<Asset>,

    pub credit: Rc<Asset>,

    pub category: Rc<TransactionCategory>,

    pub amount: Money,

    #[builder(default, setter(strip_option))]
    pub tax_credit: Option<Money>,

    #[builder(default, setter(strip_option))]
    pub national_insurance: Option<Money>,

    #[builder(default, setter(strip_option))]
    pub deemed_benefit: Option<Money>,

    #[builder(default, setter(strip_option))]
    pub charity_donation: Option<Money>,

    #[builder(default, setter(strip_option))]
    pub debit_units: Option<Units>,

    #[builder(default, setter(strip_option))]
    pub credit_units: Option<Units>,

    #[builder(default, setter(strip_option))]
    pub portfolio: Option<Rc<Asset>>,

    #[builder(default, setter(strip_option))]
    pub third_party: Option<Rc<Asset>>,

    #[builder(default, setter(strip_option, into))]
    pub reference: Option<String>,

    #[builder(default, setter(strip_option, into))]
    pub comment: Option<String>,

    #[builder(default)]
    pub reconciled: bool,

    #[builder(default)]
    pub tags: Vec<String>,

    #[builder(default)]
    pub children: Vec<Transaction>,
}

impl Transaction {
    pub fn class(&self) -> CategoryClass {
        self.category.class
    }

    pub fn tax_credit(&self) -> Money {
        self.tax_credit.unwrap_or(Money::ZERO)
    }

    pub fn charity_donation(&self) -> Money {
        self.charity_donation.unwrap_or(Money::ZERO)
    }

    pub fn debit_units(&self) -> Units {
        self.debit_units.unwrap_or(Units::ZERO)
    }

    pub fn credit_units(&self) -> Units {
        self.credit_units.unwrap_or(Units::ZERO)
    }

    /// Both endpoints are the same asset.
    pub fn is_self_referential(&self) -> bool {
        self.debit.same_as(&self.credit)
    }
}

/// A dated price of a security.
#[derive(Clone, Debug, PartialEq)]
pub struct SecurityPrice {
    pub security: Rc<Asset>,
    pub date: NaiveDate,
    pub price: Price,
}
