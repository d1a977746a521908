use std::fmt;
use std::str::FromStr;

/// Action of an investment (`!Type:Invst`) entry, carried by its `N` line.
///
/// The `X` variants are linked: the cash side of the action is moved to or
/// from the account named on the `L` line in the same entry.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum InvestmentAction {
    Buy,
    BuyX,
    Sell,
    SellX,
    Div,
    DivX,
    ReinvDiv,
    MiscInc,
    MiscIncX,
    MiscExp,
    MiscExpX,
    RtrnCap,
    RtrnCapX,
    ShrsIn,
    ShrsOut,
    StkSplit,
    XIn,
    XOut,
}

impl InvestmentAction {
    const ALL: [InvestmentAction; 18] = [
        InvestmentAction::Buy,
        InvestmentAction::BuyX,
        InvestmentAction::Sell,
        InvestmentAction::SellX,
        InvestmentAction::Div,
        InvestmentAction::DivX,
        InvestmentAction::ReinvDiv,
        InvestmentAction::MiscInc,
        InvestmentAction::MiscIncX,
        InvestmentAction::MiscExp,
        InvestmentAction::MiscExpX,
        InvestmentAction::RtrnCap,
        InvestmentAction::RtrnCapX,
        InvestmentAction::ShrsIn,
        InvestmentAction::ShrsOut,
        InvestmentAction::StkSplit,
        InvestmentAction::XIn,
        InvestmentAction::XOut,
    ];

    pub fn as_str(self) -> &'static str {
        use InvestmentAction::*;
        match self {
            Buy => "Buy",
            BuyX => "BuyX",
            Sell => "Sell",
            SellX => "SellX",
            Div => "Div",
            DivX => "DivX",
            ReinvDiv => "ReinvDiv",
            MiscInc => "MiscInc",
            MiscIncX => "MiscIncX",
            MiscExp => "MiscExp",
            MiscExpX => "MiscExpX",
            RtrnCap => "RtrnCap",
            RtrnCapX => "RtrnCapX",
            ShrsIn => "ShrsIn",
            ShrsOut => "ShrsOut",
            StkSplit => "StkSplit",
            XIn => "XIn",
            XOut => "XOut",
        }
    }

    /// The linked counterpart of a plain cash-moving action.
    pub fn linked(self) -> InvestmentAction {
        use InvestmentAction::*;
        match self {
            Buy => BuyX,
            Sell => SellX,
            Div => DivX,
            MiscInc => MiscIncX,
            MiscExp => MiscExpX,
            RtrnCap => RtrnCapX,
            other => other,
        }
    }

    pub fn is_linked(self) -> bool {
        use InvestmentAction::*;
        matches!(
            self,
            BuyX | SellX | DivX | MiscIncX | MiscExpX | RtrnCapX | XIn | XOut
        )
    }
}

impl fmt::Display for InvestmentAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvestmentAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        InvestmentAction::ALL
            .iter()
            .copied()
            .find(|action| action.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown investment action: {s}"))
    }
}

#[test]
fn test_action_names() {
    assert_eq!("buyx".parse::<InvestmentAction>(), Ok(InvestmentAction::BuyX));
    assert_eq!(InvestmentAction::Sell.linked(), InvestmentAction::SellX);
    assert_eq!(InvestmentAction::ShrsIn.linked(), InvestmentAction::ShrsIn);
    assert!("Reinvest".parse::<InvestmentAction>().is_err());
}
