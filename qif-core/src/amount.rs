use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Neg, Sub};
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};

macro_rules! decimal_value {
    ($(#[$meta:meta])* $name:ident, $render:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
        pub struct $name(Decimal);

        impl $name {
            pub const ZERO: $name = $name(Decimal::ZERO);

            pub fn new(value: Decimal) -> Self {
                $name(value)
            }

            pub fn value(self) -> Decimal {
                self.0
            }

            pub fn is_zero(self) -> bool {
                self.0.is_zero()
            }

            pub fn is_positive(self) -> bool {
                self.0.is_sign_positive() && !self.0.is_zero()
            }

            pub fn is_negative(self) -> bool {
                self.0.is_sign_negative() && !self.0.is_zero()
            }

            pub fn abs(self) -> Self {
                $name(self.0.abs())
            }
        }

        impl From<Decimal> for $name {
            fn from(value: Decimal) -> Self {
                $name(value)
            }
        }

        impl Add for $name {
            type Output = $name;
            fn add(self, rhs: $name) -> $name {
                $name(self.0 + rhs.0)
            }
        }

        impl Sub for $name {
            type Output = $name;
            fn sub(self, rhs: $name) -> $name {
                $name(self.0 - rhs.0)
            }
        }

        impl Neg for $name {
            type Output = $name;
            fn neg(self) -> $name {
                $name(-self.0)
            }
        }

        impl Sum for $name {
            fn sum<I: Iterator<Item = $name>>(iter: I) -> $name {
                iter.fold($name::ZERO, Add::add)
            }
        }

        impl<'a> Sum<&'a $name> for $name {
            fn sum<I: Iterator<Item = &'a $name>>(iter: I) -> $name {
                iter.copied().sum()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let render: fn(Decimal, &mut fmt::Formatter<'_>) -> fmt::Result = $render;
                render(self.0, f)
            }
        }

        impl FromStr for $name {
            type Err = rust_decimal::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                parse_decimal(s).map($name)
            }
        }
    };
}

decimal_value!(
    /// A monetary amount, always rendered with two decimal places.
    Money,
    |d, f| write!(
        f,
        "{:.2}",
        d.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    )
);

decimal_value!(
    /// A number of units of a security.
    Units,
    |d, f| write!(f, "{}", d.normalize())
);

decimal_value!(
    /// The price of a single unit of a security.
    Price,
    |d, f| write!(f, "{}", d.round_dp(6).normalize())
);

decimal_value!(
    /// A stock split ratio, stored in the QIF convention of ten times the
    /// real ratio (a 2-for-1 split is `20`).
    Ratio,
    |d, f| write!(f, "{}", d.round_dp(6).normalize())
);

decimal_value!(
    /// The share of a split line, as a percentage.
    Percentage,
    |d, f| write!(f, "{}%", d.normalize())
);

impl Price {
    /// Per-unit price of a trade, absent when no units changed hands.
    pub fn from_trade(amount: Money, units: Units) -> Option<Price> {
        if units.is_zero() {
            None
        } else {
            Some(Price((amount.value() / units.value()).abs()))
        }
    }
}

impl Ratio {
    const SCALE: Decimal = Decimal::TEN;
    /// Places kept when a ratio is applied to a unit count.
    const UNITS_DP: u32 = 12;

    /// Ratio that turns `before` units into `after` units, or `None` when
    /// there were no units to split.
    pub fn from_units(before: Units, after: Units) -> Option<Ratio> {
        if before.is_zero() {
            None
        } else {
            Some(Ratio(after.value() / before.value() * Self::SCALE))
        }
    }

    pub fn apply(self, units: Units) -> Units {
        Units(
            (units.value() * self.0 / Self::SCALE)
                .round_dp(Self::UNITS_DP)
                .normalize(),
        )
    }
}

impl Units {
    pub fn one() -> Units {
        Units(Decimal::ONE)
    }
}

fn parse_decimal(s: &str) -> Result<Decimal, rust_decimal::Error> {
    let cleaned: String = s
        .trim()
        .trim_end_matches('%')
        .chars()
        .filter(|c| *c != ',')
        .collect();
    Decimal::from_str(&cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn money_renders_two_places() {
        assert_eq!(Money::new(dec!(-21.9)).to_string(), "-21.90");
        assert_eq!(Money::new(dec!(2000)).to_string(), "2000.00");
        assert_eq!(Money::new(dec!(0.005)).to_string(), "0.01");
    }

    #[test]
    fn arithmetic_returns_new_values() {
        let a = Money::new(dec!(10.00));
        let b = -a;
        assert_eq!(a, Money::new(dec!(10.00)));
        assert_eq!(b + a, Money::ZERO);
        assert_eq!(a - Money::new(dec!(2.50)), Money::new(dec!(7.50)));
        let total: Money = vec![a, b, a].iter().sum();
        assert_eq!(total, a);
    }

    #[test]
    fn parse_strips_grouping() {
        assert_eq!("1,234.50".parse::<Money>().unwrap(), Money::new(dec!(1234.50)));
        assert_eq!("25%".parse::<Percentage>().unwrap(), Percentage::new(dec!(25)));
        assert!("12.3x".parse::<Money>().is_err());
    }

    #[test]
    fn split_ratio_round_trips_units() {
        let before = Units::new(dec!(150));
        let after = Units::new(dec!(450));
        let ratio = Ratio::from_units(before, after).unwrap();
        assert_eq!(ratio.to_string(), "30");
        assert_eq!(ratio.apply(before), after);
        assert!(Ratio::from_units(Units::ZERO, after).is_none());
    }

    #[test]
    fn recurring_split_ratio_reproduces_units() {
        let ratio = Ratio::from_units(Units::new(dec!(3)), Units::new(dec!(2))).unwrap();
        assert_eq!(ratio.apply(Units::new(dec!(3))), Units::new(dec!(2)));
        assert_eq!(ratio.to_string(), "6.666667");

        let reverse = Ratio::from_units(Units::new(dec!(300)), Units::new(dec!(100))).unwrap();
        assert_eq!(reverse.apply(Units::new(dec!(300))), Units::new(dec!(100)));
        assert_eq!(reverse.to_string(), "3.333333");
    }

    #[test]
    fn trade_price() {
        let price = Price::from_trade(Money::new(dec!(-250)), Units::new(dec!(100))).unwrap();
        assert_eq!(price, Price::new(dec!(2.5)));
        assert!(Price::from_trade(Money::new(dec!(1)), Units::ZERO).is_none());
    }
}
