use std::rc::Rc;

use qif_core::{
    CategoryTarget, InvestmentAction, Money, Price, QifAccount, QifPortfolioEvent, QifSecurity,
    QifSplit, Ratio, Units,
};
use tracing::{debug, warn};

use crate::builder::{cleared, Direction, QifBuilder};
use crate::error::{ExportError, ExportResult};
use crate::model::{Asset, CategoryClass, Transaction};

/// A transaction together with the investment ledger it is booked in.
struct Ledger<'t> {
    txn: &'t Transaction,
    portfolio: &'t Asset,
    account: Rc<QifAccount>,
}

/// Writes transactions that move a security, as `!Type:Invst` entries in
/// the ledger of the portfolio holding it.
///
/// Cash that cannot be booked on the trade itself passes through companion
/// entries in the other ledger, or through the portfolio's holding account,
/// depending on what the dialect supports.
pub(crate) struct PortfolioBuilder<'b, 'a> {
    qif: &'b mut QifBuilder<'a>,
}

impl<'b, 'a> PortfolioBuilder<'b, 'a> {
    pub(crate) fn new(qif: &'b mut QifBuilder<'a>) -> Self {
        PortfolioBuilder { qif }
    }

    pub(crate) fn process(mut self, txn: &Transaction) -> ExportResult<()> {
        let portfolio = txn
            .portfolio
            .as_deref()
            .ok_or(ExportError::MissingPortfolio {
                id: txn.id,
                date: txn.date,
            })?;
        let ledger = Ledger {
            txn,
            portfolio,
            account: self.qif.account(portfolio)?,
        };
        let class = txn.class();
        let (debit, credit) = (&*txn.debit, &*txn.credit);
        debug!(id = txn.id, portfolio = portfolio.name(), ?class, "portfolio transaction");

        match (debit.is_security(), credit.is_security()) {
            (false, _) if debit.is_payee() => self.income(&ledger),
            (_, false) if credit.is_payee() => self.expense(&ledger),
            (true, true) if txn.is_self_referential() => match class {
                CategoryClass::StockSplit => self.stock_split(&ledger),
                CategoryClass::Dividend => self.reinvested_dividend(&ledger),
                _ => self.stock_adjust(&ledger),
            },
            (true, true) => match class {
                CategoryClass::StockDeMerger => self.demerger(&ledger),
                CategoryClass::StockTakeOver => self.takeover(&ledger),
                _ => self.exchange(&ledger),
            },
            (true, false) if class == CategoryClass::Dividend => self.dividend(&ledger),
            (true, false) => self.transfer_out(&ledger),
            (false, _) => self.transfer_in(&ledger),
        }
    }

    /// Payee income paid straight into a security.
    fn income(&mut self, l: &Ledger) -> ExportResult<()> {
        let txn = l.txn;
        let security = self.qif.security(&txn.credit);
        let classes = self.qif.classes(txn);
        let category = CategoryTarget::category(self.qif.category(&txn.category), classes.clone());
        let buy = self
            .entry(l, InvestmentAction::Buy)
            .with_security(security)
            .with_trade_payee(txn.debit.name());

        if !self.qif.dialect.use_holding_for_category {
            self.book_trade(l, buy.with_trade_category(category), txn.credit_units(), txn.amount);
            return Ok(());
        }
        let holding = self.qif.holding_account(l.portfolio);
        let portfolio_leg = CategoryTarget::transfer(Rc::clone(&l.account), classes);
        self.book_holding(l, &holding, [(category, txn.amount), (portfolio_leg, -txn.amount)]);
        if !self.qif.dialect.hide_balancing_split_transfer {
            self.book_transfer(l, InvestmentAction::XIn, &holding, txn.amount);
        }
        self.book_trade(l, buy, txn.credit_units(), txn.amount);
        Ok(())
    }

    /// Payee expense settled by selling a security.
    fn expense(&mut self, l: &Ledger) -> ExportResult<()> {
        let txn = l.txn;
        let security = self.qif.security(&txn.debit);
        let classes = self.qif.classes(txn);
        let category = CategoryTarget::category(self.qif.category(&txn.category), classes.clone());
        let sell = self
            .entry(l, InvestmentAction::Sell)
            .with_security(security)
            .with_trade_payee(txn.credit.name());

        if !self.qif.dialect.use_holding_for_category {
            self.book_trade(l, sell.with_trade_category(category), txn.debit_units(), txn.amount);
            return Ok(());
        }
        self.book_trade(l, sell, txn.debit_units(), txn.amount);
        let holding = self.qif.holding_account(l.portfolio);
        if !self.qif.dialect.hide_balancing_split_transfer {
            self.book_transfer(l, InvestmentAction::XOut, &holding, txn.amount);
        }
        let portfolio_leg = CategoryTarget::transfer(Rc::clone(&l.account), classes);
        self.book_holding(l, &holding, [(portfolio_leg, txn.amount), (category, -txn.amount)]);
        Ok(())
    }

    fn stock_split(&mut self, l: &Ledger) -> ExportResult<()> {
        let asset = &*l.txn.credit;
        let (before, after) = self.holding_units(l, asset)?;
        let ratio = Ratio::from_units(before, after).ok_or_else(|| {
            ExportError::InvalidStockSplit {
                security: asset.name().to_string(),
                date: l.txn.date,
            }
        })?;
        let security = self.qif.security(asset);

        if self.qif.dialect.use_stock_split {
            let split = self
                .entry(l, InvestmentAction::StkSplit)
                .with_security(security)
                .with_ratio(ratio);
            self.book(l, split);
            return Ok(());
        }
        let delta = after - before;
        if delta.is_zero() {
            warn!(id = l.txn.id, security = asset.name(), "stock split leaves units unchanged");
            return Ok(());
        }
        let action = if delta.is_positive() {
            InvestmentAction::ShrsIn
        } else {
            InvestmentAction::ShrsOut
        };
        let movement = self.shares(l, action, &security, delta.abs(), Some(asset));
        self.book(l, movement);
        Ok(())
    }

    fn stock_adjust(&mut self, l: &Ledger) -> ExportResult<()> {
        let txn = l.txn;
        let security = self.qif.security(&txn.credit);
        let movements = [
            (InvestmentAction::ShrsIn, txn.credit_units()),
            (InvestmentAction::ShrsOut, txn.debit_units()),
        ];
        if movements.iter().all(|(_, units)| units.is_zero()) {
            warn!(id = txn.id, security = txn.credit.name(), "stock adjustment without units");
        }
        for (action, units) in movements {
            if !units.is_zero() {
                let movement = self.shares(l, action, &security, units, Some(&*txn.credit));
                self.book(l, movement);
            }
        }
        Ok(())
    }

    /// A cash dividend paid by the debit security into the credit account.
    fn dividend(&mut self, l: &Ledger) -> ExportResult<()> {
        let txn = l.txn;
        let security = self.qif.security(&txn.debit);
        let classes = self.qif.classes(txn);
        let tax_credit = txn.tax_credit();
        let destination = if txn.credit.same_as(l.portfolio) {
            None
        } else {
            Some(self.qif.account(&txn.credit)?)
        };
        let linked =
            self.qif.dialect.can_xfer_linked && tax_credit.is_zero() && destination.is_some();

        let dividend = match &destination {
            Some(account) if linked => self
                .entry(l, InvestmentAction::DivX)
                .with_security(Rc::clone(&security))
                .with_trade_amount(txn.amount)
                .with_trade_category(CategoryTarget::transfer(Rc::clone(account), classes.clone()))
                .with_transfer_amount(txn.amount),
            _ => {
                let category = self.qif.category(&txn.category);
                self.entry(l, InvestmentAction::Div)
                    .with_security(Rc::clone(&security))
                    .with_trade_amount(txn.amount + tax_credit)
                    .with_trade_category(CategoryTarget::category(category, classes.clone()))
            }
        };
        self.book(l, dividend);

        if !tax_credit.is_zero() {
            self.book_tax_credit(l, &security, tax_credit);
        }
        if let Some(account) = destination {
            if !linked {
                self.book_transfer(l, InvestmentAction::XOut, &account, txn.amount);
            }
            self.book_companion(l, &account, Direction::From, txn.amount);
        }
        Ok(())
    }

    /// The tax credit of a cash dividend, paid out of the portfolio.
    fn book_tax_credit(&mut self, l: &Ledger, security: &Rc<QifSecurity>, tax_credit: Money) {
        let classes = self.qif.classes(l.txn);
        let tax = CategoryTarget::category(self.qif.tax_credit_category(), classes.clone());
        if self.qif.dialect.use_holding_for_tax_credit {
            let holding = self.qif.holding_account(l.portfolio);
            self.book_transfer(l, InvestmentAction::XOut, &holding, tax_credit);
            let portfolio_leg = CategoryTarget::transfer(Rc::clone(&l.account), classes);
            self.book_holding(l, &holding, [(portfolio_leg, tax_credit), (tax, -tax_credit)]);
        } else {
            let expense = self
                .entry(l, InvestmentAction::MiscExp)
                .with_security(Rc::clone(security))
                .with_trade_amount(tax_credit)
                .with_trade_category(tax);
            self.book(l, expense);
        }
    }

    /// A dividend used to buy more of the paying security. Its tax credit
    /// is notional income offset by a matching tax expense.
    fn reinvested_dividend(&mut self, l: &Ledger) -> ExportResult<()> {
        let txn = l.txn;
        let security = self.qif.security(&txn.credit);
        let classes = self.qif.classes(txn);
        let dividend = self.qif.category(&txn.category);

        let reinvest = self
            .entry(l, InvestmentAction::ReinvDiv)
            .with_security(Rc::clone(&security))
            .with_trade_category(CategoryTarget::category(Rc::clone(&dividend), classes.clone()));
        let reinvest = priced(reinvest, txn.credit_units(), txn.amount);
        self.book(l, reinvest);

        let tax_credit = txn.tax_credit();
        if tax_credit.is_zero() {
            return Ok(());
        }
        let tax = self.qif.tax_credit_category();
        let via_holding = self.qif.dialect.use_holding_for_tax_credit;
        let via_linked = self.qif.dialect.use_misc_inc_x_for_tax_credit;

        if via_holding {
            let holding = self.qif.holding_account(l.portfolio);
            self.book_holding(
                l,
                &holding,
                [
                    (CategoryTarget::category(dividend, classes.clone()), tax_credit),
                    (CategoryTarget::category(tax, classes), -tax_credit),
                ],
            );
        } else if via_linked {
            let holding = self.qif.holding_account(l.portfolio);
            for (action, category) in [
                (InvestmentAction::MiscIncX, dividend),
                (InvestmentAction::MiscExpX, tax),
            ] {
                let entry = self
                    .entry(l, action)
                    .with_security(Rc::clone(&security))
                    .with_trade_amount(tax_credit)
                    .with_trade_category(CategoryTarget::CategoryTransfer {
                        category: Some(category),
                        account: Some(Rc::clone(&holding)),
                    })
                    .with_transfer_amount(tax_credit);
                self.book(l, entry);
            }
        } else {
            for (action, category) in [
                (InvestmentAction::MiscInc, dividend),
                (InvestmentAction::MiscExp, tax),
            ] {
                let entry = self
                    .entry(l, action)
                    .with_security(Rc::clone(&security))
                    .with_trade_amount(tax_credit)
                    .with_trade_category(CategoryTarget::category(category, classes.clone()));
                self.book(l, entry);
            }
        }
        Ok(())
    }

    /// Part of the cost of the debit security moves to a new security.
    fn demerger(&mut self, l: &Ledger) -> ExportResult<()> {
        let txn = l.txn;
        let cost = self.cost_delta(l, &txn.debit)?.abs();
        let source = self.qif.security(&txn.debit);
        let target = self.qif.security(&txn.credit);

        let units = txn.debit_units();
        if units.is_zero() && self.qif.dialect.can_return_capital {
            let capital = self
                .entry(l, InvestmentAction::RtrnCap)
                .with_security(source)
                .with_trade_amount(cost);
            self.book(l, capital);
        } else {
            let sell = self.entry(l, InvestmentAction::Sell).with_security(source);
            self.book_trade(l, sell, units, cost);
        }
        let buy = self.entry(l, InvestmentAction::Buy).with_security(target);
        self.book_trade(l, buy, txn.credit_units(), cost);
        Ok(())
    }

    /// The whole holding of the debit security is exchanged for the credit
    /// security plus cash paid on to a third party.
    fn takeover(&mut self, l: &Ledger) -> ExportResult<()> {
        let txn = l.txn;
        let (held, _) = self.holding_units(l, &txn.debit)?;
        let cost = self.cost_delta(l, &txn.debit)?.abs();
        let source = self.qif.security(&txn.debit);
        let target = self.qif.security(&txn.credit);

        let sell = self.entry(l, InvestmentAction::Sell).with_security(source);
        self.book_trade(l, sell, held, cost + txn.amount);
        let buy = self.entry(l, InvestmentAction::Buy).with_security(target);
        self.book_trade(l, buy, txn.credit_units(), cost);

        if txn.amount.is_zero() {
            return Ok(());
        }
        let third_party = txn
            .third_party
            .as_deref()
            .ok_or(ExportError::MissingThirdParty {
                id: txn.id,
                date: txn.date,
            })?;
        let account = self.qif.account(third_party)?;
        self.book_transfer(l, InvestmentAction::XOut, &account, txn.amount);
        if !self.qif.dialect.can_xfer_linked {
            self.book_companion(l, &account, Direction::From, txn.amount);
        }
        Ok(())
    }

    /// Units of the debit security sold into the credit account. Without
    /// units the proceeds are a return of capital where the dialect has one.
    fn transfer_out(&mut self, l: &Ledger) -> ExportResult<()> {
        let txn = l.txn;
        let security = self.qif.security(&txn.debit);
        let units = txn.debit_units();
        let action = if units.is_zero() && self.qif.dialect.can_return_capital {
            InvestmentAction::RtrnCap
        } else {
            InvestmentAction::Sell
        };

        if txn.credit.same_as(l.portfolio) {
            let disposal = self.entry(l, action).with_security(security);
            self.book_disposal(l, disposal, units, txn.amount);
            return Ok(());
        }
        let account = self.qif.account(&txn.credit)?;
        if self.qif.dialect.can_xfer_linked {
            let classes = self.qif.classes(txn);
            let disposal = self
                .entry(l, action.linked())
                .with_security(security)
                .with_trade_category(CategoryTarget::transfer(Rc::clone(&account), classes))
                .with_transfer_amount(txn.amount);
            self.book_disposal(l, disposal, units, txn.amount);
        } else {
            let disposal = self.entry(l, action).with_security(security);
            self.book_disposal(l, disposal, units, txn.amount);
            self.book_transfer(l, InvestmentAction::XOut, &account, txn.amount);
            self.book_companion(l, &account, Direction::From, txn.amount);
        }
        Ok(())
    }

    /// Cash from the debit account used to buy the credit security.
    fn transfer_in(&mut self, l: &Ledger) -> ExportResult<()> {
        let txn = l.txn;
        let security = self.qif.security(&txn.credit);
        let units = txn.credit_units();

        if txn.debit.same_as(l.portfolio) {
            let buy = self.entry(l, InvestmentAction::Buy).with_security(security);
            self.book_trade(l, buy, units, txn.amount);
            return Ok(());
        }
        let account = self.qif.account(&txn.debit)?;
        if self.qif.dialect.can_xfer_linked {
            let classes = self.qif.classes(txn);
            let buy = self
                .entry(l, InvestmentAction::BuyX)
                .with_security(security)
                .with_trade_category(CategoryTarget::transfer(Rc::clone(&account), classes))
                .with_transfer_amount(txn.amount);
            self.book_trade(l, buy, units, txn.amount);
        } else {
            self.book_companion(l, &account, Direction::To, txn.amount);
            self.book_transfer(l, InvestmentAction::XIn, &account, txn.amount);
            let buy = self.entry(l, InvestmentAction::Buy).with_security(security);
            self.book_trade(l, buy, units, txn.amount);
        }
        Ok(())
    }

    /// One security swapped for another at the same value.
    fn exchange(&mut self, l: &Ledger) -> ExportResult<()> {
        let txn = l.txn;
        let source = self.qif.security(&txn.debit);
        let target = self.qif.security(&txn.credit);
        let sell = self.entry(l, InvestmentAction::Sell).with_security(source);
        self.book_trade(l, sell, txn.debit_units(), txn.amount);
        let buy = self.entry(l, InvestmentAction::Buy).with_security(target);
        self.book_trade(l, buy, txn.credit_units(), txn.amount);
        Ok(())
    }

    fn holding_units(&self, l: &Ledger, security: &Asset) -> ExportResult<(Units, Units)> {
        let analysis = self.qif.analysis;
        let before = analysis
            .units_before(l.portfolio, security, l.txn)
            .ok_or_else(|| missing_valuation(l, "units before", security))?;
        let after = analysis
            .units_after(l.portfolio, security, l.txn)
            .ok_or_else(|| missing_valuation(l, "units after", security))?;
        Ok((before, after))
    }

    fn cost_delta(&self, l: &Ledger, security: &Asset) -> ExportResult<Money> {
        self.qif
            .analysis
            .cost_delta(l.portfolio, security, l.txn)
            .ok_or_else(|| missing_valuation(l, "cost delta", security))
    }

    fn entry(&self, l: &Ledger, action: InvestmentAction) -> QifPortfolioEvent {
        QifPortfolioEvent::trade(l.txn.date, action)
            .with_trade_cleared(cleared(l.txn))
            .with_trade_comment(l.txn.comment.as_deref())
    }

    /// A share movement, priced from the analysis when `asset` is given.
    fn shares(
        &self,
        l: &Ledger,
        action: InvestmentAction,
        security: &Rc<QifSecurity>,
        units: Units,
        asset: Option<&Asset>,
    ) -> QifPortfolioEvent {
        let price = asset.and_then(|asset| self.qif.analysis.price_at(asset, l.txn.date));
        self.entry(l, action)
            .with_security(Rc::clone(security))
            .with_price(price)
            .with_units(units)
    }

    fn book(&mut self, l: &Ledger, entry: QifPortfolioEvent) {
        self.qif.file.add_event(&l.account, entry);
    }

    /// Books a buy or sell of `units` for `amount`. A zero-unit trade in a
    /// dialect that rejects them trades one unit instead, balanced by a
    /// one-unit `ShrsIn` before a sale or `ShrsOut` after a purchase.
    fn book_trade(&mut self, l: &Ledger, trade: QifPortfolioEvent, units: Units, amount: Money) {
        if !units.is_zero() || self.qif.dialect.can_trade_zero_units {
            self.book(l, priced(trade, units, amount));
            return;
        }
        let Some(security) = trade.security().cloned() else {
            self.book(l, priced(trade, units, amount));
            return;
        };
        debug!(id = l.txn.id, security = %security.name, "padding zero-unit trade");
        let selling = matches!(
            trade.action(),
            Some(InvestmentAction::Sell | InvestmentAction::SellX)
        );
        let trade = priced(trade, Units::one(), amount);
        if selling {
            let padding = self.shares(l, InvestmentAction::ShrsIn, &security, Units::one(), None);
            self.book(l, padding);
            self.book(l, trade);
        } else {
            self.book(l, trade);
            let padding = self.shares(l, InvestmentAction::ShrsOut, &security, Units::one(), None);
            self.book(l, padding);
        }
    }

    /// A sale, or a return of capital which carries no units.
    fn book_disposal(&mut self, l: &Ledger, trade: QifPortfolioEvent, units: Units, amount: Money) {
        match trade.action() {
            Some(InvestmentAction::RtrnCap | InvestmentAction::RtrnCapX) => {
                self.book(l, trade.with_trade_amount(amount));
            }
            _ => self.book_trade(l, trade, units, amount),
        }
    }

    /// Cash moved between the portfolio and `account` by an `XIn`/`XOut`.
    fn book_transfer(
        &mut self,
        l: &Ledger,
        action: InvestmentAction,
        account: &Rc<QifAccount>,
        amount: Money,
    ) {
        let classes = self.qif.classes(l.txn);
        let entry = self
            .entry(l, action)
            .with_trade_amount(amount)
            .with_trade_category(CategoryTarget::transfer(Rc::clone(account), classes))
            .with_transfer_amount(amount);
        self.book(l, entry);
    }

    /// The cash-side record in `account` of money moved to or from the
    /// portfolio. `Direction::From` is money arriving in `account`.
    fn book_companion(
        &mut self,
        l: &Ledger,
        account: &Rc<QifAccount>,
        direction: Direction,
        amount: Money,
    ) {
        let classes = self.qif.classes(l.txn);
        let amount = match direction {
            Direction::From => amount,
            Direction::To => -amount,
        };
        let event = self
            .qif
            .event(l.txn, amount)
            .with_payee_text(self.qif.transfer_label(direction, &l.account.name))
            .with_category(CategoryTarget::transfer(Rc::clone(&l.account), classes));
        self.qif.add_cash(l.txn, account, event);
    }

    /// A zero-total entry in the holding account.
    fn book_holding(
        &mut self,
        l: &Ledger,
        holding: &Rc<QifAccount>,
        legs: [(CategoryTarget, Money); 2],
    ) {
        let mut event = self.qif.event(l.txn, Money::ZERO);
        for (target, amount) in legs {
            event = event.with_split(QifSplit::leg(target, amount, None));
        }
        self.qif.file.add_event(holding, event);
    }
}

fn priced(trade: QifPortfolioEvent, units: Units, amount: Money) -> QifPortfolioEvent {
    trade
        .with_price(Price::from_trade(amount, units))
        .with_units(units)
        .with_trade_amount(amount)
}

fn missing_valuation(l: &Ledger, what: &'static str, security: &Asset) -> ExportError {
    ExportError::MissingValuation {
        what,
        security: security.name().to_string(),
        id: l.txn.id,
        date: l.txn.date,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::MemoryAnalysis;
    use crate::config::ExportConfig;
    use crate::fixtures::*;
    use qif_core::DialectKind;
    use rust_decimal_macros::dec;
    use qif_core::InvestmentAction::*;

    fn quicken() -> ExportConfig {
        ExportConfig::default()
    }

    fn moneydance() -> ExportConfig {
        ExportConfig::for_dialect(DialectKind::MoneyDance)
    }

    fn security_txn(
        debit: Rc<Asset>,
        credit: Rc<Asset>,
        class: CategoryClass,
        amount: Money,
    ) -> Transaction {
        Transaction::builder()
            .id(7)
            .date(date(5, 1))
            .debit(debit)
            .credit(credit)
            .category(category("Investments", class))
            .amount(amount)
            .portfolio(isa())
            .build()
    }

    fn split_analysis(txn: &Transaction, before: Units, after: Units) -> MemoryAnalysis {
        let mut analysis = MemoryAnalysis::new();
        analysis.set_units(&isa(), &vodafone(), txn, before, after);
        analysis
    }

    #[test]
    fn stock_split_ratio_reproduces_units() -> anyhow::Result<()> {
        let txn = security_txn(vodafone(), vodafone(), CategoryClass::StockSplit, Money::ZERO);
        let analysis = split_analysis(&txn, units(dec!(100)), units(dec!(250)));

        let file = export_with(quicken(), &analysis, &[txn.clone()])?;
        let split = trades(&file, "ISA")[0];
        assert_eq!(split.action(), Some(StkSplit));
        let ratio = split.ratio().unwrap();
        assert_eq!(ratio, Ratio::new(dec!(25)));
        assert_eq!(ratio.apply(units(dec!(100))), units(dec!(250)));

        let file = export_with(moneydance(), &analysis, &[txn])?;
        let movement = trades(&file, "ISA")[0];
        assert_eq!(movement.action(), Some(ShrsIn));
        assert_eq!(movement.units(), Some(units(dec!(150))));
        Ok(())
    }

    #[test]
    fn reverse_split_with_recurring_ratio() -> anyhow::Result<()> {
        let txn = security_txn(vodafone(), vodafone(), CategoryClass::StockSplit, Money::ZERO);
        let analysis = split_analysis(&txn, units(dec!(300)), units(dec!(100)));

        let file = export_with(quicken(), &analysis, &[txn])?;
        let ratio = trades(&file, "ISA")[0].ratio().unwrap();
        assert_eq!(ratio.to_string(), "3.333333");
        assert_eq!(ratio.apply(units(dec!(300))), units(dec!(100)));
        Ok(())
    }

    #[test]
    fn stock_split_needs_units() {
        let txn = security_txn(vodafone(), vodafone(), CategoryClass::StockSplit, Money::ZERO);
        assert!(matches!(
            export_txns(quicken(), &[txn.clone()]),
            Err(ExportError::MissingValuation { what: "units before", .. })
        ));

        let analysis = split_analysis(&txn, Units::ZERO, units(dec!(10)));
        assert!(matches!(
            export_with(quicken(), &analysis, &[txn]),
            Err(ExportError::InvalidStockSplit { .. })
        ));
    }

    #[test]
    fn security_outside_portfolio_is_an_error() {
        let mut txn = security_txn(current(), vodafone(), CategoryClass::Transfer, money(dec!(100)));
        txn.portfolio = None;
        assert!(matches!(
            export_txns(quicken(), &[txn]),
            Err(ExportError::MissingPortfolio { id: 7, .. })
        ));
    }

    #[test]
    fn stock_adjustment() -> anyhow::Result<()> {
        let mut txn = security_txn(vodafone(), vodafone(), CategoryClass::StockAdjust, Money::ZERO);
        txn.credit_units = Some(units(dec!(3)));
        let mut analysis = MemoryAnalysis::new();
        analysis.add_price(&vodafone(), date(4, 30), price(dec!(0.71)));

        let file = export_with(quicken(), &analysis, &[txn])?;
        let movement = trades(&file, "ISA")[0];
        assert_eq!(movement.action(), Some(ShrsIn));
        assert_eq!(movement.units(), Some(units(dec!(3))));
        assert_eq!(movement.price(), Some(price(dec!(0.71))));
        Ok(())
    }

    #[test]
    fn zero_unit_sale_padding() -> anyhow::Result<()> {
        let txn = security_txn(vodafone(), current(), CategoryClass::Transfer, money(dec!(40)));

        let file = export_txns(moneydance(), &[txn.clone()])?;
        assert_eq!(actions(&file, "ISA"), vec![ShrsIn, Sell, XOut]);
        assert_eq!(trades(&file, "ISA")[1].units(), Some(Units::one()));
        assert_eq!(trades(&file, "ISA")[1].price(), Some(price(dec!(40))));
        let companion = cash(&file, "Current");
        assert_eq!(companion[0].amount(), Some(money(dec!(40))));
        assert_eq!(companion[0].payee_name(), Some("Transfer from ISA"));

        let mut config = moneydance();
        config.overrides.can_trade_zero_units = Some(true);
        let file = export_txns(config, &[txn])?;
        assert_eq!(actions(&file, "ISA"), vec![Sell, XOut]);
        assert_eq!(trades(&file, "ISA")[0].units(), Some(Units::ZERO));
        Ok(())
    }

    #[test]
    fn zero_unit_purchase_padding() -> anyhow::Result<()> {
        let txn = security_txn(isa(), vodafone(), CategoryClass::Transfer, money(dec!(10)));
        let file = export_txns(moneydance(), &[txn])?;
        assert_eq!(actions(&file, "ISA"), vec![Buy, ShrsOut]);
        Ok(())
    }

    #[test]
    fn linked_transfers() -> anyhow::Result<()> {
        let mut sale = security_txn(vodafone(), current(), CategoryClass::Transfer, money(dec!(72)));
        sale.debit_units = Some(units(dec!(100)));
        let mut purchase = security_txn(current(), vodafone(), CategoryClass::Transfer, money(dec!(36)));
        purchase.id = 8;
        purchase.credit_units = Some(units(dec!(50)));

        let file = export_txns(quicken(), &[sale, purchase])?;
        let entries = trades(&file, "ISA");
        assert_eq!(actions(&file, "ISA"), vec![SellX, BuyX]);
        assert_eq!(entries[0].price(), Some(price(dec!(0.72))));
        assert_eq!(
            entries[0].trade_target().and_then(CategoryTarget::transfer_account).map(|a| a.name.as_str()),
            Some("Current")
        );
        assert_eq!(entries[1].transfer_amount(), Some(money(dec!(36))));
        assert!(cash(&file, "Current").is_empty());
        Ok(())
    }

    #[test]
    fn companion_in_another_portfolio() -> anyhow::Result<()> {
        let sipp = Rc::new(Asset::portfolio("SIPP", Some("Broker")));
        let mut txn = security_txn(vodafone(), sipp, CategoryClass::Transfer, money(dec!(40)));
        txn.debit_units = Some(units(dec!(10)));
        let file = export_txns(moneydance(), &[txn])?;
        assert_eq!(actions(&file, "ISA"), vec![Sell, XOut]);
        assert!(cash(&file, "SIPP").is_empty());
        assert_eq!(actions(&file, "SIPP"), vec![XIn]);
        assert_eq!(trades(&file, "SIPP")[0].transfer_amount(), Some(money(dec!(40))));
        Ok(())
    }

    #[test]
    fn unlinked_transfer_in() -> anyhow::Result<()> {
        let mut txn = security_txn(current(), vodafone(), CategoryClass::Transfer, money(dec!(36)));
        txn.credit_units = Some(units(dec!(50)));
        let file = export_txns(moneydance(), &[txn])?;
        assert_eq!(actions(&file, "ISA"), vec![XIn, Buy]);
        let companion = cash(&file, "Current");
        assert_eq!(companion[0].amount(), Some(money(dec!(-36))));
        assert_eq!(companion[0].payee_name(), Some("Transfer to ISA"));
        assert_eq!(transfer_name(companion[0]), Some("ISA"));
        Ok(())
    }

    #[test]
    fn return_of_capital() -> anyhow::Result<()> {
        let txn = security_txn(vodafone(), current(), CategoryClass::Transfer, money(dec!(15)));
        let file = export_txns(quicken(), &[txn])?;
        assert_eq!(actions(&file, "ISA"), vec![RtrnCapX]);
        assert_eq!(trades(&file, "ISA")[0].trade_amount(), Some(money(dec!(15))));
        Ok(())
    }

    #[test]
    fn linked_dividend() -> anyhow::Result<()> {
        let txn = security_txn(vodafone(), current(), CategoryClass::Dividend, money(dec!(25)));
        let file = export_txns(quicken(), &[txn])?;
        assert_eq!(actions(&file, "ISA"), vec![DivX]);
        let companion = cash(&file, "Current");
        assert_eq!(companion.len(), 1);
        assert_eq!(companion[0].amount(), Some(money(dec!(25))));
        assert_eq!(companion[0].payee_name(), Some("Transfer from ISA"));
        Ok(())
    }

    #[test]
    fn dividend_with_tax_credit() -> anyhow::Result<()> {
        let mut txn = security_txn(vodafone(), current(), CategoryClass::Dividend, money(dec!(90)));
        txn.tax_credit = Some(money(dec!(10)));

        let file = export_txns(quicken(), &[txn.clone()])?;
        let entries = trades(&file, "ISA");
        assert_eq!(actions(&file, "ISA"), vec![Div, MiscExp, XOut]);
        assert_eq!(entries[0].trade_amount(), Some(money(dec!(100))));
        assert_eq!(entries[1].trade_amount(), Some(money(dec!(10))));
        assert_eq!(entries[2].trade_amount(), Some(money(dec!(90))));
        assert_eq!(cash(&file, "Current")[0].amount(), Some(money(dec!(90))));

        let file = export_txns(ExportConfig::for_dialect(DialectKind::AceMoney), &[txn])?;
        assert_eq!(actions(&file, "ISA"), vec![Div, XOut, XOut]);
        let holding = cash(&file, "ISA Holding");
        assert_eq!(holding[0].amount(), Some(Money::ZERO));
        assert_eq!(holding[0].split_total(), Money::ZERO);
        assert_eq!(holding[0].splits()[1].leg_amount(), Some(money(dec!(-10))));
        Ok(())
    }

    #[test]
    fn dividend_kept_in_portfolio() -> anyhow::Result<()> {
        let txn = security_txn(vodafone(), isa(), CategoryClass::Dividend, money(dec!(25)));
        let file = export_txns(quicken(), &[txn])?;
        assert_eq!(actions(&file, "ISA"), vec![Div]);
        assert_eq!(file.accounts().count(), 1);
        Ok(())
    }

    #[test]
    fn reinvested_dividend_tax_credit() -> anyhow::Result<()> {
        let mut txn = security_txn(vodafone(), vodafone(), CategoryClass::Dividend, money(dec!(36)));
        txn.credit_units = Some(units(dec!(50)));
        txn.tax_credit = Some(money(dec!(4)));

        let file = export_txns(quicken(), &[txn.clone()])?;
        assert_eq!(actions(&file, "ISA"), vec![ReinvDiv, MiscIncX, MiscExpX]);
        let income = trades(&file, "ISA")[1];
        assert_eq!(
            income.trade_target().and_then(CategoryTarget::transfer_account).map(|a| a.name.as_str()),
            Some("ISA Holding")
        );
        assert_eq!(
            income.trade_target().and_then(CategoryTarget::target_category).map(|c| c.name.as_str()),
            Some("Investments")
        );

        let file = export_txns(ExportConfig::for_dialect(DialectKind::GnuCash), &[txn.clone()])?;
        assert_eq!(actions(&file, "ISA"), vec![ReinvDiv, MiscInc, MiscExp]);

        let file = export_txns(ExportConfig::for_dialect(DialectKind::AceMoney), &[txn])?;
        assert_eq!(actions(&file, "ISA"), vec![ReinvDiv]);
        assert_eq!(cash(&file, "ISA Holding")[0].splits().len(), 2);
        Ok(())
    }

    #[test]
    fn demerger() -> anyhow::Result<()> {
        let newco = Rc::new(Asset::security("Newco", "NEW"));
        let mut txn = security_txn(vodafone(), Rc::clone(&newco), CategoryClass::StockDeMerger, Money::ZERO);
        txn.credit_units = Some(units(dec!(10)));
        let mut analysis = MemoryAnalysis::new();
        analysis.set_cost_delta(&isa(), &vodafone(), &txn, money(dec!(-40)));

        let file = export_with(quicken(), &analysis, &[txn.clone()])?;
        let entries = trades(&file, "ISA");
        assert_eq!(actions(&file, "ISA"), vec![RtrnCap, Buy]);
        assert_eq!(entries[0].trade_amount(), Some(money(dec!(40))));
        assert_eq!(entries[1].price(), Some(price(dec!(4))));

        let file = export_with(moneydance(), &analysis, &[txn])?;
        assert_eq!(actions(&file, "ISA"), vec![ShrsIn, Sell, Buy]);
        Ok(())
    }

    #[test]
    fn takeover() -> anyhow::Result<()> {
        let bidco = Rc::new(Asset::security("Bidco", "BID"));
        let mut txn = security_txn(vodafone(), Rc::clone(&bidco), CategoryClass::StockTakeOver, money(dec!(200)));
        txn.credit_units = Some(units(dec!(25)));
        txn.third_party = Some(current());
        let mut analysis = MemoryAnalysis::new();
        analysis
            .set_units(&isa(), &vodafone(), &txn, units(dec!(100)), Units::ZERO)
            .set_cost_delta(&isa(), &vodafone(), &txn, money(dec!(-500)));

        let file = export_with(quicken(), &analysis, &[txn.clone()])?;
        let entries = trades(&file, "ISA");
        assert_eq!(actions(&file, "ISA"), vec![Sell, Buy, XOut]);
        assert_eq!(entries[0].units(), Some(units(dec!(100))));
        assert_eq!(entries[0].trade_amount(), Some(money(dec!(700))));
        assert_eq!(entries[1].trade_amount(), Some(money(dec!(500))));
        assert!(cash(&file, "Current").is_empty());

        let file = export_with(moneydance(), &analysis, &[txn.clone()])?;
        assert_eq!(cash(&file, "Current")[0].amount(), Some(money(dec!(200))));

        txn.third_party = None;
        assert!(matches!(
            export_with(quicken(), &analysis, &[txn]),
            Err(ExportError::MissingThirdParty { .. })
        ));
        Ok(())
    }

    #[test]
    fn zero_unit_demerger_and_takeover_without_padding() -> anyhow::Result<()> {
        let mut config = moneydance();
        config.overrides.can_trade_zero_units = Some(true);

        let newco = Rc::new(Asset::security("Newco", "NEW"));
        let mut demerger = security_txn(vodafone(), newco, CategoryClass::StockDeMerger, Money::ZERO);
        demerger.credit_units = Some(units(dec!(10)));
        let mut analysis = MemoryAnalysis::new();
        analysis.set_cost_delta(&isa(), &vodafone(), &demerger, money(dec!(-40)));
        let file = export_with(config.clone(), &analysis, &[demerger])?;
        assert_eq!(actions(&file, "ISA"), vec![Sell, Buy]);
        assert_eq!(trades(&file, "ISA")[0].units(), Some(Units::ZERO));

        let bidco = Rc::new(Asset::security("Bidco", "BID"));
        let mut takeover = security_txn(vodafone(), bidco, CategoryClass::StockTakeOver, money(dec!(200)));
        takeover.third_party = Some(current());
        let mut analysis = MemoryAnalysis::new();
        analysis
            .set_units(&isa(), &vodafone(), &takeover, units(dec!(100)), Units::ZERO)
            .set_cost_delta(&isa(), &vodafone(), &takeover, money(dec!(-500)));
        let file = export_with(config, &analysis, &[takeover.clone()])?;
        assert_eq!(actions(&file, "ISA"), vec![Sell, Buy, XOut]);
        assert_eq!(trades(&file, "ISA")[1].units(), Some(Units::ZERO));

        let file = export_with(moneydance(), &analysis, &[takeover])?;
        assert_eq!(actions(&file, "ISA"), vec![Sell, Buy, ShrsOut, XOut]);
        Ok(())
    }

    #[test]
    fn exchange() -> anyhow::Result<()> {
        let fund = Rc::new(Asset::security("Tracker", "TRK"));
        let mut txn = security_txn(vodafone(), fund, CategoryClass::Transfer, money(dec!(300)));
        txn.debit_units = Some(units(dec!(400)));
        txn.credit_units = Some(units(dec!(3)));
        let file = export_txns(quicken(), &[txn])?;
        assert_eq!(actions(&file, "ISA"), vec![Sell, Buy]);
        assert_eq!(trades(&file, "ISA")[1].price(), Some(price(dec!(100))));
        Ok(())
    }

    #[test]
    fn payee_income_into_security() -> anyhow::Result<()> {
        let mut txn = security_txn(
            Rc::new(Asset::payee("Employer")),
            vodafone(),
            CategoryClass::Income,
            money(dec!(50)),
        );
        txn.credit_units = Some(units(dec!(70)));

        let file = export_txns(quicken(), &[txn.clone()])?;
        let buy = trades(&file, "ISA")[0];
        assert_eq!(buy.action(), Some(Buy));
        assert_eq!(
            buy.trade_target().and_then(CategoryTarget::target_category).map(|c| c.name.as_str()),
            Some("Investments")
        );

        let file = export_txns(moneydance(), &[txn])?;
        assert_eq!(actions(&file, "ISA"), vec![XIn, Buy]);
        let holding = cash(&file, "ISA Holding")[0];
        assert_eq!(holding.splits()[0].leg_amount(), Some(money(dec!(50))));
        assert_eq!(holding.split_total(), Money::ZERO);
        Ok(())
    }

    #[test]
    fn payee_expense_from_security() -> anyhow::Result<()> {
        let mut txn = security_txn(
            vodafone(),
            Rc::new(Asset::payee("Broker")),
            CategoryClass::Expense,
            money(dec!(5)),
        );
        txn.debit_units = Some(units(dec!(7)));
        let file = export_txns(ExportConfig::for_dialect(DialectKind::AceMoney), &[txn])?;
        assert_eq!(actions(&file, "ISA"), vec![Sell]);
        let holding = cash(&file, "ISA Holding");
        assert_eq!(holding.len(), 1);
        assert_eq!(holding[0].splits()[1].leg_amount(), Some(money(dec!(-5))));
        Ok(())
    }
}
