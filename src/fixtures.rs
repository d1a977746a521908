//! Shared values for the classifier tests.

use std::rc::Rc;

use chrono::NaiveDate;
use qif_core::{
    CategoryTarget, InvestmentAction, Money, Price, QifEvent, QifFile, QifLedgerEntry,
    QifPortfolioEvent, Units,
};
use rust_decimal::Decimal;

use crate::analysis::{MemoryAnalysis, SecurityAnalysis};
use crate::builder::QifBuilder;
use crate::config::ExportConfig;
use crate::error::ExportResult;
use crate::model::{Asset, CategoryClass, Transaction, TransactionCategory};

pub fn date(month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, month, day).unwrap()
}

pub fn money(value: Decimal) -> Money {
    Money::new(value)
}

pub fn units(value: Decimal) -> Units {
    Units::new(value)
}

pub fn price(value: Decimal) -> Price {
    Price::new(value)
}

pub fn category(name: &str, class: CategoryClass) -> Rc<TransactionCategory> {
    Rc::new(TransactionCategory::builder().name(name).class(class).build())
}

pub fn current() -> Rc<Asset> {
    Rc::new(Asset::deposit("Current", Some("Barclays")))
}

pub fn savings() -> Rc<Asset> {
    Rc::new(Asset::deposit("Savings", Some("Barclays")))
}

pub fn isa() -> Rc<Asset> {
    Rc::new(Asset::portfolio("ISA", Some("Broker")))
}

pub fn vodafone() -> Rc<Asset> {
    Rc::new(Asset::security("Vodafone", "VOD"))
}

pub fn transfer(amount: Money) -> Transaction {
    Transaction::builder()
        .date(date(3, 1))
        .debit(current())
        .credit(savings())
        .category(category("Transfer", CategoryClass::Transfer))
        .amount(amount)
        .build()
}

pub fn export_txns(config: ExportConfig, txns: &[Transaction]) -> ExportResult<QifFile> {
    export_with(config, &MemoryAnalysis::new(), txns)
}

pub fn export_with(
    config: ExportConfig,
    analysis: &dyn SecurityAnalysis,
    txns: &[Transaction],
) -> ExportResult<QifFile> {
    let mut builder = QifBuilder::new(config, analysis);
    for txn in txns {
        builder.process_transaction(txn)?;
    }
    Ok(builder.finish())
}

pub fn cash<'f>(file: &'f QifFile, account: &str) -> Vec<&'f QifEvent> {
    file.events(account)
        .unwrap_or_default()
        .iter()
        .filter_map(QifLedgerEntry::as_cash)
        .collect()
}

pub fn trades<'f>(file: &'f QifFile, account: &str) -> Vec<&'f QifPortfolioEvent> {
    file.events(account)
        .unwrap_or_default()
        .iter()
        .filter_map(QifLedgerEntry::as_investment)
        .collect()
}

pub fn actions(file: &QifFile, account: &str) -> Vec<InvestmentAction> {
    trades(file, account)
        .into_iter()
        .filter_map(QifPortfolioEvent::action)
        .collect()
}

pub fn category_name(event: &QifEvent) -> Option<&str> {
    event
        .category_target()
        .and_then(CategoryTarget::target_category)
        .map(|c| c.name.as_str())
}

pub fn transfer_name(event: &QifEvent) -> Option<&str> {
    event
        .category_target()
        .and_then(CategoryTarget::transfer_account)
        .map(|a| a.name.as_str())
}
