use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use chrono::NaiveDate;

use super::account::QifAccount;
use super::category::{QifCategory, QifClass, QifParentCategory, CATEGORY_SEPARATOR};
use super::dialect::Dialect;
use super::line::Resolver;
use super::payee::QifPayee;
use super::record::QifLedgerEntry;
use super::security::{QifPrice, QifSecurity, QifSecurityPrices};

/// A registered account and its ledger, in processing order.
#[derive(Clone, Debug, PartialEq)]
pub struct QifAccountEvents {
    pub account: Rc<QifAccount>,
    pub events: Vec<QifLedgerEntry>,
}

/// The interned contents of one QIF file.
///
/// Every entity is registered once by name; registering a name again hands
/// back the wrapper stored the first time, so records built from it share
/// one `Rc`.
#[derive(Clone, Debug, Default)]
pub struct QifFile {
    dialect: Dialect,
    last_price_date: Option<NaiveDate>,
    accounts: Vec<QifAccountEvents>,
    account_index: HashMap<String, usize>,
    payees: BTreeMap<String, Rc<QifPayee>>,
    securities: Vec<QifSecurityPrices>,
    security_index: HashMap<String, usize>,
    symbol_index: HashMap<String, usize>,
    categories: BTreeMap<String, Rc<QifCategory>>,
    parents: BTreeMap<String, QifParentCategory>,
    classes: BTreeMap<String, Rc<QifClass>>,
}

impl QifFile {
    pub fn new(dialect: Dialect) -> Self {
        QifFile {
            dialect,
            ..QifFile::default()
        }
    }

    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    pub fn last_price_date(&self) -> Option<NaiveDate> {
        self.last_price_date
    }

    /// Prices dated after `date` are left out by [`QifFile::build_prices`].
    pub fn set_last_price_date(&mut self, date: Option<NaiveDate>) {
        self.last_price_date = date;
    }

    pub fn register_account(&mut self, account: QifAccount) -> Rc<QifAccount> {
        if let Some(&i) = self.account_index.get(&account.name) {
            return Rc::clone(&self.accounts[i].account);
        }
        let account = Rc::new(account);
        self.account_index
            .insert(account.name.clone(), self.accounts.len());
        self.accounts.push(QifAccountEvents {
            account: Rc::clone(&account),
            events: Vec::new(),
        });
        account
    }

    pub fn register_payee(&mut self, payee: QifPayee) -> Rc<QifPayee> {
        Rc::clone(
            self.payees
                .entry(payee.name.clone())
                .or_insert_with(|| Rc::new(payee)),
        )
    }

    pub fn register_security(&mut self, security: QifSecurity) -> Rc<QifSecurity> {
        if let Some(&i) = self.security_index.get(&security.name) {
            return Rc::clone(&self.securities[i].security);
        }
        let security = Rc::new(security);
        let i = self.securities.len();
        self.security_index.insert(security.name.clone(), i);
        self.symbol_index.entry(security.symbol.clone()).or_insert(i);
        self.securities
            .push(QifSecurityPrices::new(Rc::clone(&security)));
        security
    }

    /// Registers a category and, first, any enclosing categories of a
    /// multi-level name that are not registered yet. Enclosing categories
    /// inherit the income flag of the category that created them.
    pub fn register_category(&mut self, category: QifCategory) -> Rc<QifCategory> {
        if let Some(existing) = self.categories.get(&category.name) {
            return Rc::clone(existing);
        }
        if let Some(parent) = category.parent_name() {
            if !self.categories.contains_key(parent) {
                self.register_category(
                    QifCategory::builder()
                        .name(parent)
                        .income(category.income)
                        .build(),
                );
            }
        }

        let category = Rc::new(category);
        self.categories
            .insert(category.name.clone(), Rc::clone(&category));
        match top_level_name(&category.name) {
            Some(top) => {
                if let Some(group) = self.parents.get_mut(top) {
                    group.children.push(Rc::clone(&category));
                }
            }
            None => {
                self.parents.insert(
                    category.name.clone(),
                    QifParentCategory::new(Rc::clone(&category)),
                );
            }
        }
        category
    }

    pub fn register_class(&mut self, class: QifClass) -> Rc<QifClass> {
        Rc::clone(
            self.classes
                .entry(class.name.clone())
                .or_insert_with(|| Rc::new(class)),
        )
    }

    /// Registers prices from a list in ascending date order, stopping at the
    /// first price dated after the cutoff. Returns how many were registered.
    pub fn build_prices<I>(&mut self, prices: I) -> usize
    where
        I: IntoIterator<Item = (QifSecurity, QifPrice)>,
    {
        let mut count = 0;
        for (security, price) in prices {
            if matches!(self.last_price_date, Some(cutoff) if price.date > cutoff) {
                break;
            }
            let security = self.register_security(security);
            self.add_price(&security, price);
            count += 1;
        }
        count
    }

    /// Appends a price to a registered security.
    pub fn add_price(&mut self, security: &QifSecurity, price: QifPrice) -> bool {
        match self.security_index.get(&security.name) {
            Some(&i) => {
                self.securities[i].prices.push(price);
                true
            }
            None => false,
        }
    }

    /// Appends an entry to an account's ledger, registering the account on
    /// first use.
    pub fn add_event(&mut self, account: &Rc<QifAccount>, entry: impl Into<QifLedgerEntry>) {
        let i = match self.account_index.get(&account.name) {
            Some(&i) => i,
            None => {
                self.register_account(QifAccount::clone(account));
                self.accounts.len() - 1
            }
        };
        self.accounts[i].events.push(entry.into());
    }

    /// Stable date sort of every ledger.
    pub fn sort_events(&mut self) {
        for ledger in self.accounts.iter_mut() {
            ledger.events.sort_by(QifLedgerEntry::cmp_by_date);
        }
    }

    pub fn events(&self, account: &str) -> Option<&[QifLedgerEntry]> {
        self.account_index
            .get(account)
            .map(|&i| self.accounts[i].events.as_slice())
    }

    pub fn accounts(&self) -> impl Iterator<Item = &QifAccountEvents> {
        self.accounts.iter()
    }

    pub fn payees(&self) -> impl Iterator<Item = &Rc<QifPayee>> {
        self.payees.values()
    }

    pub fn securities(&self) -> impl Iterator<Item = &QifSecurityPrices> {
        self.securities.iter()
    }

    pub fn categories(&self) -> impl Iterator<Item = &Rc<QifCategory>> {
        self.categories.values()
    }

    /// Top-level categories with their subcategories, by name.
    pub fn parent_categories(&self) -> impl Iterator<Item = &QifParentCategory> {
        self.parents.values()
    }

    pub fn classes(&self) -> impl Iterator<Item = &Rc<QifClass>> {
        self.classes.values()
    }

    pub fn has_prices(&self) -> bool {
        self.securities.iter().any(|s| !s.prices.is_empty())
    }
}

impl Resolver for QifFile {
    fn date_format(&self) -> &str {
        &self.dialect.date_format
    }

    fn payee(&self, name: &str) -> Option<Rc<QifPayee>> {
        self.payees.get(name).cloned()
    }

    fn account(&self, name: &str) -> Option<Rc<QifAccount>> {
        self.account_index
            .get(name)
            .map(|&i| Rc::clone(&self.accounts[i].account))
    }

    fn category(&self, name: &str) -> Option<Rc<QifCategory>> {
        self.categories.get(name).cloned()
    }

    fn class(&self, name: &str) -> Option<Rc<QifClass>> {
        self.classes.get(name).cloned()
    }

    fn security(&self, name: &str) -> Option<Rc<QifSecurity>> {
        self.security_index
            .get(name)
            .map(|&i| Rc::clone(&self.securities[i].security))
    }

    fn security_by_symbol(&self, symbol: &str) -> Option<Rc<QifSecurity>> {
        self.symbol_index
            .get(symbol)
            .map(|&i| Rc::clone(&self.securities[i].security))
    }
}

fn top_level_name(name: &str) -> Option<&str> {
    name.split_once(CATEGORY_SEPARATOR).map(|(top, _)| top)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::QifAccountType;
    use crate::action::InvestmentAction;
    use crate::amount::Price;
    use crate::record::{QifEvent, QifPortfolioEvent};
    use rust_decimal_macros::dec;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    fn bank(name: &str) -> QifAccount {
        QifAccount::builder()
            .name(name)
            .ty(QifAccountType::Bank)
            .build()
    }

    #[test]
    fn interning_returns_the_first_wrapper() {
        let mut file = QifFile::default();
        let first = file.register_account(bank("Current"));
        let second = file.register_account(
            QifAccount::builder()
                .name("Current")
                .ty(QifAccountType::Cash)
                .build(),
        );
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(second.ty, QifAccountType::Bank);
        assert_eq!(file.accounts().count(), 1);

        let a = file.register_payee(QifPayee::new("ASDA"));
        let b = file.register_payee(QifPayee::new("ASDA"));
        assert!(Rc::ptr_eq(&a, &b));

        let a = file.register_class(QifClass::new("Holiday"));
        let b = file.register_class(QifClass::new("Holiday"));
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(file.classes().count(), 1);

        let a = file.register_security(QifSecurity::builder().name("Vodafone").symbol("VOD").build());
        let b = file.register_security(QifSecurity::builder().name("Vodafone").symbol("VOD.L").build());
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(file.security_by_symbol("VOD").map(|s| s.name.clone()), Some("Vodafone".into()));
        assert!(file.security_by_symbol("VOD.L").is_none());
    }

    #[test]
    fn categories_create_missing_parents() {
        let mut file = QifFile::default();
        let leaf = file.register_category(QifCategory::builder().name("Shopping:Food:Fresh").build());
        assert_eq!(file.categories().count(), 3);
        assert!(file.category("Shopping:Food").is_some());

        let groups: Vec<_> = file.parent_categories().collect();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].category.name, "Shopping");
        let children: Vec<_> = groups[0].children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(children, vec!["Shopping:Food", "Shopping:Food:Fresh"]);

        let again = file.register_category(QifCategory::builder().name("Shopping:Food:Fresh").build());
        assert!(Rc::ptr_eq(&leaf, &again));
        assert_eq!(file.parent_categories().next().unwrap().children.len(), 2);
    }

    #[test]
    fn prices_stop_at_cutoff() {
        let mut file = QifFile::default();
        file.set_last_price_date(Some(date(3, 31)));
        let vod = QifSecurity::builder().name("Vodafone").symbol("VOD").build();
        let price = |m, d, p| QifPrice {
            date: date(m, d),
            price: Price::new(p),
        };
        let count = file.build_prices(vec![
            (vod.clone(), price(1, 31, dec!(0.70))),
            (vod.clone(), price(3, 31, dec!(0.72))),
            (vod.clone(), price(4, 30, dec!(0.75))),
            (vod.clone(), price(2, 28, dec!(0.71))),
        ]);
        assert_eq!(count, 2);
        let prices = &file.securities().next().unwrap().prices;
        assert_eq!(prices.len(), 2);
        assert_eq!(prices[1].price, Price::new(dec!(0.72)));
    }

    #[test]
    fn events_keep_processing_order_until_sorted() {
        let mut file = QifFile::default();
        let current = file.register_account(bank("Current"));
        file.add_event(&current, QifEvent::dated(date(2, 1)).with_comment(Some("b")));
        file.add_event(&current, QifPortfolioEvent::trade(date(1, 1), InvestmentAction::Buy));
        file.add_event(&current, QifEvent::dated(date(2, 1)).with_comment(Some("c")));
        assert_eq!(file.events("Current").unwrap()[0].date(), Some(date(2, 1)));

        file.sort_events();
        let events = file.events("Current").unwrap();
        assert_eq!(events[0].date(), Some(date(1, 1)));
        assert_eq!(events[1].as_cash().and_then(QifEvent::comment), Some("b"));
        assert_eq!(events[2].as_cash().and_then(QifEvent::comment), Some("c"));
    }

    #[test]
    fn unregistered_account_is_registered_by_add_event() {
        let mut file = QifFile::default();
        let savings = Rc::new(bank("Savings"));
        file.add_event(&savings, QifEvent::dated(date(1, 1)));
        assert_eq!(file.events("Savings").map(<[_]>::len), Some(1));
        assert!(file.account("Savings").is_some());
    }
}
