use std::cmp::Ordering;
use std::rc::Rc;

use chrono::NaiveDate;

use super::action::InvestmentAction;
use super::amount::{Money, Price, Ratio, Units};
use super::flags::Cleared;
use super::line::{CategoryTarget, Line, LineKind, LineValue};
use super::line_types::{EventLine, PortfolioLine, SplitLine};
use super::payee::QifPayee;
use super::security::QifSecurity;

/// An ordered sequence of typed lines, plus the split sub-records of a
/// ledger entry. Lines are kept in insertion order and are never merged:
/// pushing the same kind twice writes it twice.
#[derive(Clone, Debug, PartialEq)]
pub struct Record<K> {
    lines: Vec<Line<K>>,
    splits: Vec<Record<SplitLine>>,
}

impl<K: LineKind> Default for Record<K> {
    fn default() -> Self {
        Record {
            lines: Vec::new(),
            splits: Vec::new(),
        }
    }
}

impl<K: LineKind> Record<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: K, value: LineValue) {
        self.lines.push(Line::new(kind, value));
    }

    pub fn push_line(&mut self, line: Line<K>) {
        self.lines.push(line);
    }

    pub fn push_split(&mut self, split: QifSplit) {
        self.splits.push(split);
    }

    /// The first line of the given kind.
    pub fn line(&self, kind: K) -> Option<&LineValue> {
        self.lines
            .iter()
            .find(|line| line.kind == kind)
            .map(|line| &line.value)
    }

    pub fn lines(&self) -> &[Line<K>] {
        &self.lines
    }

    pub fn splits(&self) -> &[QifSplit] {
        &self.splits
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty() && self.splits.is_empty()
    }

    fn with(mut self, kind: K, value: LineValue) -> Self {
        self.push(kind, value);
        self
    }
}

/// Line kinds of records that sit in an account ledger.
pub trait DatedKind: LineKind {
    const DATE: Self;
    const CLEARED: Self;
}

impl DatedKind for EventLine {
    const DATE: Self = EventLine::Date;
    const CLEARED: Self = EventLine::Cleared;
}

impl DatedKind for PortfolioLine {
    const DATE: Self = PortfolioLine::Date;
    const CLEARED: Self = PortfolioLine::Cleared;
}

impl<K: DatedKind> Record<K> {
    pub fn date(&self) -> Option<NaiveDate> {
        self.line(K::DATE).and_then(LineValue::as_date)
    }

    pub fn is_cleared(&self) -> bool {
        self.line(K::CLEARED).is_some()
    }

    /// Orders ledger entries by date alone; entries on the same date are
    /// equal and keep their relative order under a stable sort.
    pub fn cmp_by_date(&self, other: &Self) -> Ordering {
        self.date().cmp(&other.date())
    }
}

/// A cash ledger entry.
pub type QifEvent = Record<EventLine>;

/// A split line of a cash ledger entry.
pub type QifSplit = Record<SplitLine>;

/// An investment ledger entry.
pub type QifPortfolioEvent = Record<PortfolioLine>;

impl Record<EventLine> {
    pub fn dated(date: NaiveDate) -> Self {
        Record::new().with(EventLine::Date, LineValue::Date(date))
    }

    pub fn with_amount(self, amount: Money) -> Self {
        self.with(EventLine::Amount, LineValue::Money(amount))
    }

    pub fn with_payee(self, payee: Rc<QifPayee>) -> Self {
        self.with(EventLine::Payee, LineValue::Payee(payee))
    }

    /// A free-text payee, such as a transfer label.
    pub fn with_payee_text(self, text: impl Into<String>) -> Self {
        self.with(EventLine::Payee, LineValue::Text(text.into()))
    }

    pub fn with_category(self, target: CategoryTarget) -> Self {
        self.with(EventLine::Category, LineValue::Category(target))
    }

    pub fn with_reference(self, reference: Option<&str>) -> Self {
        match reference {
            Some(reference) => self.with(EventLine::Reference, LineValue::Text(reference.into())),
            None => self,
        }
    }

    pub fn with_comment(self, comment: Option<&str>) -> Self {
        match comment {
            Some(comment) => self.with(EventLine::Comment, LineValue::Text(comment.into())),
            None => self,
        }
    }

    pub fn with_cleared(self, cleared: Option<Cleared>) -> Self {
        match cleared {
            Some(cleared) => self.with(EventLine::Cleared, LineValue::Cleared(cleared)),
            None => self,
        }
    }

    pub fn with_split(mut self, split: QifSplit) -> Self {
        self.push_split(split);
        self
    }

    pub fn amount(&self) -> Option<Money> {
        self.line(EventLine::Amount).and_then(LineValue::as_money)
    }

    pub fn payee_name(&self) -> Option<&str> {
        self.line(EventLine::Payee).and_then(LineValue::as_text)
    }

    pub fn comment(&self) -> Option<&str> {
        self.line(EventLine::Comment).and_then(LineValue::as_text)
    }

    pub fn category_target(&self) -> Option<&CategoryTarget> {
        self.line(EventLine::Category).and_then(LineValue::as_category)
    }

    /// Sum of the split amounts.
    pub fn split_total(&self) -> Money {
        self.splits().iter().filter_map(QifSplit::leg_amount).sum()
    }
}

impl Record<SplitLine> {
    pub fn leg(target: CategoryTarget, amount: Money, comment: Option<&str>) -> Self {
        let split = Record::new()
            .with(SplitLine::Category, LineValue::Category(target))
            .with(SplitLine::Amount, LineValue::Money(amount));
        match comment {
            Some(comment) => split.with(SplitLine::Comment, LineValue::Text(comment.into())),
            None => split,
        }
    }

    pub fn leg_amount(&self) -> Option<Money> {
        self.line(SplitLine::Amount).and_then(LineValue::as_money)
    }

    pub fn leg_target(&self) -> Option<&CategoryTarget> {
        self.line(SplitLine::Category).and_then(LineValue::as_category)
    }

    pub fn leg_comment(&self) -> Option<&str> {
        self.line(SplitLine::Comment).and_then(LineValue::as_text)
    }
}

impl Record<PortfolioLine> {
    pub fn trade(date: NaiveDate, action: InvestmentAction) -> Self {
        Record::new()
            .with(PortfolioLine::Date, LineValue::Date(date))
            .with(PortfolioLine::Action, LineValue::Action(action))
    }

    pub fn with_security(self, security: Rc<QifSecurity>) -> Self {
        self.with(PortfolioLine::Security, LineValue::Security(Some(security)))
    }

    pub fn with_price(self, price: Option<Price>) -> Self {
        match price {
            Some(price) => self.with(PortfolioLine::Price, LineValue::Price(price)),
            None => self,
        }
    }

    pub fn with_units(self, units: Units) -> Self {
        self.with(PortfolioLine::Quantity, LineValue::Units(units))
    }

    pub fn with_ratio(self, ratio: Ratio) -> Self {
        self.with(PortfolioLine::SplitRatio, LineValue::Ratio(ratio))
    }

    pub fn with_trade_amount(self, amount: Money) -> Self {
        self.with(PortfolioLine::Amount, LineValue::Money(amount))
    }

    pub fn with_trade_payee(self, text: impl Into<String>) -> Self {
        self.with(PortfolioLine::Payee, LineValue::Text(text.into()))
    }

    pub fn with_trade_comment(self, comment: Option<&str>) -> Self {
        match comment {
            Some(comment) => self.with(PortfolioLine::Comment, LineValue::Text(comment.into())),
            None => self,
        }
    }

    pub fn with_trade_cleared(self, cleared: Option<Cleared>) -> Self {
        match cleared {
            Some(cleared) => self.with(PortfolioLine::Cleared, LineValue::Cleared(cleared)),
            None => self,
        }
    }

    pub fn with_trade_category(self, target: CategoryTarget) -> Self {
        self.with(PortfolioLine::Category, LineValue::Category(target))
    }

    pub fn with_transfer_amount(self, amount: Money) -> Self {
        self.with(PortfolioLine::TransferAmount, LineValue::Money(amount))
    }

    pub fn action(&self) -> Option<InvestmentAction> {
        self.line(PortfolioLine::Action).and_then(LineValue::as_action)
    }

    pub fn security(&self) -> Option<&Rc<QifSecurity>> {
        self.line(PortfolioLine::Security).and_then(LineValue::as_security)
    }

    pub fn units(&self) -> Option<Units> {
        self.line(PortfolioLine::Quantity).and_then(LineValue::as_units)
    }

    pub fn ratio(&self) -> Option<Ratio> {
        self.line(PortfolioLine::SplitRatio).and_then(LineValue::as_ratio)
    }

    pub fn price(&self) -> Option<Price> {
        self.line(PortfolioLine::Price).and_then(LineValue::as_price)
    }

    pub fn trade_amount(&self) -> Option<Money> {
        self.line(PortfolioLine::Amount).and_then(LineValue::as_money)
    }

    pub fn commission(&self) -> Option<Money> {
        self.line(PortfolioLine::Commission).and_then(LineValue::as_money)
    }

    pub fn transfer_amount(&self) -> Option<Money> {
        self.line(PortfolioLine::TransferAmount).and_then(LineValue::as_money)
    }

    pub fn trade_target(&self) -> Option<&CategoryTarget> {
        self.line(PortfolioLine::Category).and_then(LineValue::as_category)
    }

    /// `StkSplit` entries read their `Q` line as a split ratio.
    pub fn normalise_split_ratio(&mut self) {
        if self.action() != Some(InvestmentAction::StkSplit) {
            return;
        }
        for line in self.lines.iter_mut() {
            if let (PortfolioLine::Quantity, LineValue::Units(units)) = (line.kind, &line.value) {
                let ratio = Ratio::new(units.value());
                *line = Line::new(PortfolioLine::SplitRatio, LineValue::Ratio(ratio));
            }
        }
    }
}

/// An entry of an account ledger.
#[derive(Clone, Debug, PartialEq)]
pub enum QifLedgerEntry {
    Cash(QifEvent),
    Investment(QifPortfolioEvent),
}

impl QifLedgerEntry {
    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            QifLedgerEntry::Cash(event) => event.date(),
            QifLedgerEntry::Investment(event) => event.date(),
        }
    }

    pub fn is_cleared(&self) -> bool {
        match self {
            QifLedgerEntry::Cash(event) => event.is_cleared(),
            QifLedgerEntry::Investment(event) => event.is_cleared(),
        }
    }

    pub fn cmp_by_date(&self, other: &Self) -> Ordering {
        self.date().cmp(&other.date())
    }

    pub fn as_cash(&self) -> Option<&QifEvent> {
        match self {
            QifLedgerEntry::Cash(event) => Some(event),
            QifLedgerEntry::Investment(_) => None,
        }
    }

    pub fn as_investment(&self) -> Option<&QifPortfolioEvent> {
        match self {
            QifLedgerEntry::Investment(event) => Some(event),
            QifLedgerEntry::Cash(_) => None,
        }
    }
}

impl From<QifEvent> for QifLedgerEntry {
    fn from(event: QifEvent) -> Self {
        QifLedgerEntry::Cash(event)
    }
}

impl From<QifPortfolioEvent> for QifLedgerEntry {
    fn from(event: QifPortfolioEvent) -> Self {
        QifLedgerEntry::Investment(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::QifCategory;
    use rust_decimal_macros::dec;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn lines_are_not_deduplicated() {
        let mut event = QifEvent::dated(date(1));
        event.push(EventLine::Comment, LineValue::Text("one".into()));
        event.push(EventLine::Comment, LineValue::Text("two".into()));
        assert_eq!(event.lines().len(), 3);
        assert_eq!(event.comment(), Some("one"));
    }

    #[test]
    fn splits_sum_to_total() {
        let salary = Rc::new(QifCategory::builder().name("Salary").income(true).build());
        let tax = Rc::new(QifCategory::builder().name("Tax").build());
        let event = QifEvent::dated(date(1))
            .with_amount(Money::new(dec!(800)))
            .with_split(QifSplit::leg(
                CategoryTarget::category(salary, vec![]),
                Money::new(dec!(1000)),
                None,
            ))
            .with_split(QifSplit::leg(
                CategoryTarget::category(tax, vec![]),
                Money::new(dec!(-200)),
                Some("HMRC"),
            ));
        assert_eq!(event.split_total(), event.amount().unwrap());
        assert_eq!(event.splits()[1].leg_comment(), Some("HMRC"));
    }

    #[test]
    fn ledger_entries_order_by_date_only() {
        let mut entries: Vec<QifLedgerEntry> = vec![
            QifEvent::dated(date(3)).with_comment(Some("late")).into(),
            QifPortfolioEvent::trade(date(1), InvestmentAction::Buy).into(),
            QifEvent::dated(date(1)).with_comment(Some("early")).into(),
        ];
        entries.sort_by(QifLedgerEntry::cmp_by_date);
        assert!(entries[0].as_investment().is_some());
        assert_eq!(entries[1].as_cash().and_then(QifEvent::comment), Some("early"));
        assert_eq!(entries[2].date(), Some(date(3)));
    }

    #[test]
    fn split_ratio_is_recovered() {
        let mut event = QifPortfolioEvent::trade(date(2), InvestmentAction::StkSplit)
            .with_units(Units::new(dec!(20)));
        event.normalise_split_ratio();
        assert_eq!(event.ratio(), Some(Ratio::new(dec!(20))));
        assert_eq!(event.units(), None);
    }
}
