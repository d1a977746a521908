use std::collections::HashMap;

use chrono::NaiveDate;
use qif_core::{Money, Price, Units};

use crate::model::{Asset, Transaction};

/// Valuation data the portfolio classifier needs about securities.
pub trait SecurityAnalysis {
    /// The latest known price on or before `date`.
    fn price_at(&self, security: &Asset, date: NaiveDate) -> Option<Price>;

    /// Units of `security` held in `portfolio` just before `txn`.
    fn units_before(&self, portfolio: &Asset, security: &Asset, txn: &Transaction) -> Option<Units>;

    /// Units of `security` held in `portfolio` just after `txn`.
    fn units_after(&self, portfolio: &Asset, security: &Asset, txn: &Transaction) -> Option<Units>;

    /// Change in the cost basis of `security` caused by `txn`.
    fn cost_delta(&self, portfolio: &Asset, security: &Asset, txn: &Transaction) -> Option<Money>;
}

type HoldingKey = (String, String, u32);

#[derive(Clone, Copy, Debug, PartialEq)]
struct Holding {
    before: Units,
    after: Units,
}

/// A [`SecurityAnalysis`] over values recorded up front, keyed by
/// portfolio, security and transaction id.
#[derive(Clone, Debug, Default)]
pub struct MemoryAnalysis {
    prices: HashMap<String, Vec<(NaiveDate, Price)>>,
    holdings: HashMap<HoldingKey, Holding>,
    cost_deltas: HashMap<HoldingKey, Money>,
}

impl MemoryAnalysis {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_price(&mut self, security: &Asset, date: NaiveDate, price: Price) -> &mut Self {
        let prices = self.prices.entry(security.name().to_string()).or_default();
        let at = prices.partition_point(|(d, _)| *d <= date);
        prices.insert(at, (date, price));
        self
    }

    pub fn set_units(
        &mut self,
        portfolio: &Asset,
        security: &Asset,
        txn: &Transaction,
        before: Units,
        after: Units,
    ) -> &mut Self {
        self.holdings
            .insert(key(portfolio, security, txn), Holding { before, after });
        self
    }

    pub fn set_cost_delta(
        &mut self,
        portfolio: &Asset,
        security: &Asset,
        txn: &Transaction,
        delta: Money,
    ) -> &mut Self {
        self.cost_deltas.insert(key(portfolio, security, txn), delta);
        self
    }
}

fn key(portfolio: &Asset, security: &Asset, txn: &Transaction) -> HoldingKey {
    (portfolio.name().to_string(), security.name().to_string(), txn.id)
}

impl SecurityAnalysis for MemoryAnalysis {
    fn price_at(&self, security: &Asset, date: NaiveDate) -> Option<Price> {
        let prices = self.prices.get(security.name())?;
        let at = prices.partition_point(|(d, _)| *d <= date);
        at.checked_sub(1).map(|i| prices[i].1)
    }

    fn units_before(&self, portfolio: &Asset, security: &Asset, txn: &Transaction) -> Option<Units> {
        self.holdings
            .get(&key(portfolio, security, txn))
            .map(|h| h.before)
    }

    fn units_after(&self, portfolio: &Asset, security: &Asset, txn: &Transaction) -> Option<Units> {
        self.holdings
            .get(&key(portfolio, security, txn))
            .map(|h| h.after)
    }

    fn cost_delta(&self, portfolio: &Asset, security: &Asset, txn: &Transaction) -> Option<Money> {
        self.cost_deltas.get(&key(portfolio, security, txn)).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{date, price};
    use rust_decimal_macros::dec;

    #[test]
    fn price_at_uses_latest_earlier_price() {
        let vod = Asset::security("Vodafone", "VOD");
        let mut analysis = MemoryAnalysis::new();
        analysis
            .add_price(&vod, date(3, 1), price(dec!(0.72)))
            .add_price(&vod, date(1, 1), price(dec!(0.70)));

        assert_eq!(analysis.price_at(&vod, date(2, 15)), Some(price(dec!(0.70))));
        assert_eq!(analysis.price_at(&vod, date(3, 1)), Some(price(dec!(0.72))));
        assert_eq!(analysis.price_at(&vod, date(12, 31)), Some(price(dec!(0.72))));
        assert_eq!(analysis.price_at(&vod, NaiveDate::from_ymd_opt(2023, 12, 31).unwrap()), None);
    }
}
