use std::rc::Rc;

use qif_core::{
    CategoryTarget, Cleared, Dialect, InvestmentAction, Money, QifAccount, QifAccountType,
    QifCategory, QifClass, QifEvent, QifFile, QifPayee, QifPortfolioEvent, QifPrice, QifSecurity,
    QifSplit,
};
use tracing::{debug, warn};

use crate::analysis::SecurityAnalysis;
use crate::config::{ExportConfig, ExtraDetailRule};
use crate::error::{ExportError, ExportResult};
use crate::model::{Asset, CategoryClass, SecurityPrice, Transaction, TransactionCategory};
use crate::portfolio::PortfolioBuilder;

/// Whether an income or expense is written as a split showing its
/// ancillary amounts.
pub fn has_xtra_detail(txn: &Transaction, rule: ExtraDetailRule) -> bool {
    let ancillaries = [
        txn.tax_credit,
        txn.national_insurance,
        txn.deemed_benefit,
        txn.charity_donation,
    ];
    match rule {
        ExtraDetailRule::AnyAbsent => ancillaries.iter().any(Option::is_none),
        ExtraDetailRule::AnyPresent => ancillaries.iter().any(Option::is_some),
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Flow {
    Income,
    Expense,
}

impl Flow {
    fn signed(self, amount: Money) -> Money {
        match self {
            Flow::Income => amount,
            Flow::Expense => -amount,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Direction {
    To,
    From,
}

/// An ancillary amount and where it is booked.
struct Offset {
    category: Rc<QifCategory>,
    amount: Money,
    memo: String,
}

/// Turns source transactions into QIF records for one export session.
///
/// Each transaction is routed on the kind of its endpoints: anything
/// touching a security goes to the [`PortfolioBuilder`], a payee on the
/// debit side is income, a payee on the credit side is an expense and
/// anything else is a transfer between two ledgers.
pub struct QifBuilder<'a> {
    pub(crate) file: QifFile,
    pub(crate) config: ExportConfig,
    pub(crate) dialect: Dialect,
    pub(crate) analysis: &'a dyn SecurityAnalysis,
}

impl<'a> QifBuilder<'a> {
    pub fn new(config: ExportConfig, analysis: &'a dyn SecurityAnalysis) -> Self {
        let dialect = config.resolved_dialect();
        let mut file = QifFile::new(dialect.clone());
        file.set_last_price_date(config.last_price_date);
        QifBuilder {
            file,
            config,
            dialect,
            analysis,
        }
    }

    pub fn file(&self) -> &QifFile {
        &self.file
    }

    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    /// Ends the session, sorting every ledger by date when configured to.
    pub fn finish(mut self) -> QifFile {
        if self.config.chronological {
            self.file.sort_events();
        }
        self.file
    }

    /// Registers prices up to the configured cutoff. `prices` must be in
    /// ascending date order.
    pub fn build_prices(&mut self, prices: &[SecurityPrice]) -> usize {
        let count = self.file.build_prices(prices.iter().map(|p| {
            (
                qif_security(&p.security),
                QifPrice {
                    date: p.date,
                    price: p.price,
                },
            )
        }));
        if count < prices.len() {
            warn!(
                dropped = prices.len() - count,
                cutoff = ?self.config.last_price_date,
                "prices after the cutoff are not exported"
            );
        }
        count
    }

    /// Writes the records of a transaction. The parent of a split is
    /// written on its own, followed by each of its children.
    pub fn process_transaction(&mut self, txn: &Transaction) -> ExportResult<()> {
        self.process_single(txn)?;
        for child in &txn.children {
            self.process_transaction(child)?;
        }
        Ok(())
    }

    fn process_single(&mut self, txn: &Transaction) -> ExportResult<()> {
        if txn.debit.is_security() || txn.credit.is_security() {
            debug!(id = txn.id, "security transaction");
            return PortfolioBuilder::new(self).process(txn);
        }
        if txn.debit.is_payee() {
            debug!(id = txn.id, payee = txn.debit.name(), "income");
            self.income(txn, &txn.credit, txn.debit.name(), &txn.category)
        } else if txn.credit.is_payee() {
            debug!(id = txn.id, payee = txn.credit.name(), "expense");
            self.expense(txn, &txn.debit, txn.credit.name(), &txn.category)
        } else {
            self.transfer(txn)
        }
    }

    fn income(
        &mut self,
        txn: &Transaction,
        asset: &Asset,
        payee: &str,
        category: &TransactionCategory,
    ) -> ExportResult<()> {
        self.categorised(txn, asset, payee, category, Flow::Income)
    }

    fn expense(
        &mut self,
        txn: &Transaction,
        asset: &Asset,
        payee: &str,
        category: &TransactionCategory,
    ) -> ExportResult<()> {
        self.categorised(txn, asset, payee, category, Flow::Expense)
    }

    fn categorised(
        &mut self,
        txn: &Transaction,
        asset: &Asset,
        payee: &str,
        category: &TransactionCategory,
        flow: Flow,
    ) -> ExportResult<()> {
        let account = self.account(asset)?;
        let classes = self.classes(txn);
        let payee = self.payee(payee);
        let target = CategoryTarget::category(self.category(category), classes.clone());
        let amount = flow.signed(txn.amount);

        let event = if let Some(auto) = asset.auto_expense() {
            debug!(account = asset.name(), "cash auto-expense recovery");
            let auto_target =
                CategoryTarget::category(self.category(&auto.category), classes);
            self.event(txn, Money::ZERO)
                .with_payee(payee)
                .with_split(QifSplit::leg(target, amount, None))
                .with_split(QifSplit::leg(auto_target, -amount, Some(auto.payee.as_str())))
        } else {
            let offsets = if has_xtra_detail(txn, self.config.extra_detail) {
                self.offsets(txn)
            } else {
                Vec::new()
            };
            if offsets.is_empty() {
                self.event(txn, amount)
                    .with_payee(payee)
                    .with_category(target)
            } else {
                let ancillary: Money = offsets.iter().map(|o| o.amount).sum();
                let principal = match flow {
                    Flow::Income => txn.amount + ancillary,
                    Flow::Expense => -(txn.amount - ancillary),
                };
                let mut event = self
                    .event(txn, amount)
                    .with_payee(payee)
                    .with_split(QifSplit::leg(target, principal, None));
                for offset in offsets {
                    event = event.with_split(QifSplit::leg(
                        CategoryTarget::category(offset.category, classes.clone()),
                        -offset.amount,
                        Some(offset.memo.as_str()),
                    ));
                }
                event
            }
        };
        self.add_cash(txn, &account, event);
        Ok(())
    }

    fn offsets(&mut self, txn: &Transaction) -> Vec<Offset> {
        let names = self.config.categories.clone();
        let authority = self.config.tax_authority.clone();
        let charity = self.config.charity.clone();
        [
            (txn.tax_credit, names.tax_credit, &authority),
            (txn.national_insurance, names.national_insurance, &authority),
            (txn.deemed_benefit, names.deemed_benefit, &authority),
            (txn.charity_donation, names.charity_donation, &charity),
        ]
        .into_iter()
        .filter_map(|(amount, category, memo)| {
            amount.map(|amount| Offset {
                category: self.ancillary_category(&category),
                amount,
                memo: memo.clone(),
            })
        })
        .collect()
    }

    fn transfer(&mut self, txn: &Transaction) -> ExportResult<()> {
        if let Some(auto) = txn.credit.auto_expense() {
            debug!(id = txn.id, account = txn.credit.name(), "spending into auto-expense cash");
            return self.expense(txn, &txn.debit, &auto.payee, &auto.category);
        }
        if let Some(auto) = txn.debit.auto_expense() {
            debug!(id = txn.id, account = txn.debit.name(), "recovery from auto-expense cash");
            return self.income(txn, &txn.credit, &auto.payee, &auto.category);
        }

        let class = txn.class();
        if class == CategoryClass::Interest {
            return self.interest(txn);
        }
        if class.is_owner_income() {
            let owner = owner_of(&txn.credit)?;
            debug!(id = txn.id, owner, ?class, "income of the owning payee");
            return self.income(txn, &txn.credit, owner, &txn.category);
        }
        if class.is_owner_expense() {
            let owner = owner_of(&txn.credit)?;
            debug!(id = txn.id, owner, ?class, "expense of the owning payee");
            return self.expense(txn, &txn.debit, owner, &txn.category);
        }

        debug!(id = txn.id, from = txn.debit.name(), to = txn.credit.name(), "transfer");
        let debit = self.account(&txn.debit)?;
        let credit = self.account(&txn.credit)?;
        let classes = self.classes(txn);

        let outgoing = self
            .event(txn, -txn.amount)
            .with_payee_text(self.transfer_label(Direction::To, &credit.name))
            .with_category(CategoryTarget::transfer(Rc::clone(&credit), classes.clone()));
        self.add_cash(txn, &debit, outgoing);

        if !self.dialect.hide_balancing_transfer {
            let incoming = self
                .event(txn, txn.amount)
                .with_payee_text(self.transfer_label(Direction::From, &debit.name))
                .with_category(CategoryTarget::transfer(Rc::clone(&debit), classes));
            self.add_cash(txn, &credit, incoming);
        }
        Ok(())
    }

    /// Interest paid by the owner of the debit account. Interest left in the
    /// paying account is a single line; interest paid elsewhere, or carrying
    /// tax or a donation, is a split in the paying account.
    fn interest(&mut self, txn: &Transaction) -> ExportResult<()> {
        let owner = owner_of(&txn.debit)?;
        let debit = self.account(&txn.debit)?;
        let classes = self.classes(txn);
        let payee = self.payee(owner);
        let target = CategoryTarget::category(self.category(&txn.category), classes.clone());
        let tax_credit = txn.tax_credit();
        let donation = txn.charity_donation();
        let self_referential = txn.is_self_referential();

        if self_referential && tax_credit.is_zero() && donation.is_zero() {
            let event = self
                .event(txn, txn.amount)
                .with_payee(payee)
                .with_category(target);
            self.add_cash(txn, &debit, event);
            return Ok(());
        }

        let total = if self_referential {
            txn.amount
        } else {
            Money::ZERO
        };
        let mut event = self
            .event(txn, total)
            .with_payee(payee)
            .with_split(QifSplit::leg(target, txn.amount + tax_credit + donation, None));
        if !tax_credit.is_zero() {
            let category = self.tax_credit_category();
            event = event.with_split(QifSplit::leg(
                CategoryTarget::category(category, classes.clone()),
                -tax_credit,
                Some(self.config.tax_authority.as_str()),
            ));
        }
        if !donation.is_zero() {
            let name = self.config.categories.charity_donation.clone();
            let category = self.ancillary_category(&name);
            event = event.with_split(QifSplit::leg(
                CategoryTarget::category(category, classes.clone()),
                -donation,
                Some(self.config.charity.as_str()),
            ));
        }

        if self_referential {
            self.add_cash(txn, &debit, event);
            return Ok(());
        }

        let credit = self.account(&txn.credit)?;
        let event = event.with_split(QifSplit::leg(
            CategoryTarget::transfer(Rc::clone(&credit), classes.clone()),
            -txn.amount,
            None,
        ));
        self.add_cash(txn, &debit, event);

        if !self.dialect.hide_balancing_split_transfer {
            let balancing = self
                .event(txn, txn.amount)
                .with_payee_text(self.transfer_label(Direction::From, &debit.name))
                .with_category(CategoryTarget::transfer(Rc::clone(&debit), classes));
            self.add_cash(txn, &credit, balancing);
        }
        Ok(())
    }

    pub(crate) fn account(&mut self, asset: &Asset) -> ExportResult<Rc<QifAccount>> {
        let ty = asset
            .qif_account_type()
            .ok_or_else(|| ExportError::UnsupportedAccountKind {
                asset: asset.name().to_string(),
            })?;
        Ok(self.file.register_account(
            QifAccount::builder()
                .name(asset.name())
                .ty(ty)
                .description(asset.description().map(str::to_string))
                .build(),
        ))
    }

    /// The cash account that income and expenses of a portfolio pass
    /// through when a dialect cannot book them on a trade.
    pub(crate) fn holding_account(&mut self, portfolio: &Asset) -> Rc<QifAccount> {
        self.file.register_account(
            QifAccount::builder()
                .name(format!("{} Holding", portfolio.name()))
                .ty(QifAccountType::Cash)
                .build(),
        )
    }

    pub(crate) fn payee(&mut self, name: &str) -> Rc<QifPayee> {
        self.file.register_payee(QifPayee::new(name))
    }

    pub(crate) fn category(&mut self, category: &TransactionCategory) -> Rc<QifCategory> {
        self.file.register_category(
            QifCategory::builder()
                .name(category.name.as_str())
                .description(category.description.clone())
                .income(category.class.is_income())
                .tax_related(category.tax_related)
                .build(),
        )
    }

    fn ancillary_category(&mut self, name: &str) -> Rc<QifCategory> {
        self.file.register_category(
            QifCategory::builder()
                .name(name)
                .tax_related(true)
                .build(),
        )
    }

    pub(crate) fn tax_credit_category(&mut self) -> Rc<QifCategory> {
        let name = self.config.categories.tax_credit.clone();
        self.ancillary_category(&name)
    }

    pub(crate) fn classes(&mut self, txn: &Transaction) -> Vec<Rc<QifClass>> {
        txn.tags
            .iter()
            .map(|tag| self.file.register_class(QifClass::new(tag.as_str())))
            .collect()
    }

    pub(crate) fn security(&mut self, asset: &Asset) -> Rc<QifSecurity> {
        self.file.register_security(qif_security(asset))
    }

    /// A cash entry carrying the date, amount and bookkeeping details of
    /// `txn`.
    pub(crate) fn event(&self, txn: &Transaction, amount: Money) -> QifEvent {
        QifEvent::dated(txn.date)
            .with_amount(amount)
            .with_cleared(cleared(txn))
            .with_reference(txn.reference.as_deref())
            .with_comment(txn.comment.as_deref())
    }

    /// Adds a cash entry to the ledger of `account`. Investment ledgers
    /// hold no plain cash lines, so there each leg of the entry becomes an
    /// `XIn`/`XOut` when it moves cash to another account and a
    /// `MiscInc`/`MiscExp` otherwise.
    pub(crate) fn add_cash(
        &mut self,
        txn: &Transaction,
        account: &Rc<QifAccount>,
        event: QifEvent,
    ) {
        if !account.ty.is_investment() {
            self.file.add_event(account, event);
            return;
        }
        let legs: Vec<(CategoryTarget, Money, Option<&str>)> = if event.splits().is_empty() {
            event
                .category_target()
                .map(|target| (target.clone(), event.amount().unwrap_or(Money::ZERO), None))
                .into_iter()
                .collect()
        } else {
            event
                .splits()
                .iter()
                .filter_map(|split| {
                    Some((split.leg_target()?.clone(), split.leg_amount()?, split.leg_comment()))
                })
                .collect()
        };
        for (target, amount, memo) in legs {
            let action = match (&target, amount.is_negative()) {
                (CategoryTarget::Transfer { .. }, false) => InvestmentAction::XIn,
                (CategoryTarget::Transfer { .. }, true) => InvestmentAction::XOut,
                (_, false) => InvestmentAction::MiscInc,
                (_, true) => InvestmentAction::MiscExp,
            };
            let mut entry = QifPortfolioEvent::trade(txn.date, action)
                .with_trade_cleared(cleared(txn))
                .with_trade_comment(memo.or(txn.comment.as_deref()))
                .with_trade_amount(amount.abs())
                .with_trade_category(target);
            if let Some(payee) = event.payee_name() {
                entry = entry.with_trade_payee(payee);
            }
            if action.is_linked() {
                entry = entry.with_transfer_amount(amount.abs());
            }
            debug!(account = %account.name, %action, "cash booked in investment ledger");
            self.file.add_event(account, entry);
        }
    }

    pub(crate) fn transfer_label(&self, direction: Direction, other: &str) -> String {
        match (self.dialect.simple_transfer, direction) {
            (true, _) => "Transfer".to_string(),
            (false, Direction::To) => format!("Transfer to {}", other),
            (false, Direction::From) => format!("Transfer from {}", other),
        }
    }
}

pub(crate) fn cleared(txn: &Transaction) -> Option<Cleared> {
    txn.reconciled.then_some(Cleared::Reconciled)
}

fn owner_of(asset: &Asset) -> ExportResult<&str> {
    asset.parent().ok_or_else(|| ExportError::MissingParent {
        asset: asset.name().to_string(),
    })
}

fn qif_security(asset: &Asset) -> QifSecurity {
    match asset {
        Asset::Security { name, symbol, ty, .. } => QifSecurity::builder()
            .name(name.as_str())
            .symbol(symbol.as_str())
            .ty(ty.clone())
            .build(),
        other => QifSecurity::builder()
            .name(other.name())
            .symbol(other.name())
            .build(),
    }
}
