//! Line kinds of every QIF record type.

use std::fmt;

use super::line::{LineKind, ValueKind};

macro_rules! line_kind {
    (
        $(#[$meta:meta])*
        $name:ident {
            $($(#[$vmeta:meta])* $variant:ident = ($symbol:literal, $value:ident)),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];
        }

        impl LineKind for $name {
            fn symbol(self) -> char {
                match self {
                    $($name::$variant => $symbol),+
                }
            }

            fn value_kind(self) -> ValueKind {
                match self {
                    $($name::$variant => ValueKind::$value),+
                }
            }

            fn from_symbol(symbol: char) -> Option<Self> {
                // First declared kind wins when two kinds share a symbol.
                Self::ALL.iter().copied().find(|kind| kind.symbol() == symbol)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.symbol())
            }
        }
    };
}

line_kind!(
    /// Lines of an account definition under `!Account`.
    AccountLine {
        Name = ('N', Text),
        Type = ('T', AccountType),
        Description = ('D', Text),
    }
);

line_kind!(
    /// Lines of a category under `!Type:Cat`.
    CategoryLine {
        Name = ('N', Text),
        Description = ('D', Text),
        Income = ('I', Flag),
        Expense = ('E', Flag),
        Tax = ('T', Flag),
    }
);

line_kind!(
    /// Lines of a class under `!Type:Class`.
    ClassLine {
        Name = ('N', Text),
        Description = ('D', Text),
    }
);

line_kind!(
    /// Lines of a security under `!Type:Security`.
    SecurityLine {
        Name = ('N', Text),
        Symbol = ('S', Text),
        Type = ('T', SecurityType),
    }
);

line_kind!(
    /// Lines of a cash ledger entry (`!Type:Bank`, `!Type:Cash`, ...).
    EventLine {
        Date = ('D', Date),
        Amount = ('T', Money),
        Cleared = ('C', Cleared),
        Reference = ('N', Text),
        Payee = ('P', Payee),
        Comment = ('M', Text),
        Category = ('L', Category),
    }
);

line_kind!(
    /// Lines of a split inside a cash ledger entry.
    SplitLine {
        Category = ('S', Category),
        Comment = ('E', Text),
        Amount = ('$', Money),
        Percentage = ('%', Percentage),
    }
);

line_kind!(
    /// Lines of an investment ledger entry (`!Type:Invst`).
    PortfolioLine {
        Date = ('D', Date),
        Action = ('N', Action),
        Security = ('Y', Security),
        Price = ('I', Price),
        Quantity = ('Q', Units),
        /// `StkSplit` entries reuse the `Q` line for the split ratio.
        SplitRatio = ('Q', Ratio),
        Amount = ('T', Money),
        Cleared = ('C', Cleared),
        Payee = ('P', Payee),
        Comment = ('M', Text),
        Commission = ('O', Money),
        Category = ('L', Category),
        TransferAmount = ('$', Money),
    }
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbols_resolve_back_to_kinds() {
        for kind in EventLine::ALL {
            assert_eq!(EventLine::from_symbol(kind.symbol()), Some(*kind));
        }
        assert_eq!(PortfolioLine::from_symbol('Q'), Some(PortfolioLine::Quantity));
        assert_eq!(PortfolioLine::SplitRatio.value_kind(), ValueKind::Ratio);
        assert_eq!(SplitLine::from_symbol('L'), None);
    }
}
