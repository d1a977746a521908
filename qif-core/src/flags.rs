use std::fmt;

/// Reconciliation state carried by the `C` line of a ledger entry. An entry
/// without a `C` line is uncleared.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Cleared {
    Cleared,
    Reconciled,
}

impl Cleared {
    pub fn symbol(self) -> &'static str {
        match self {
            Cleared::Cleared => "*",
            Cleared::Reconciled => "X",
        }
    }

    /// Reads the value of a `C` line, `None` for a status it does not know.
    pub fn from_symbol(s: &str) -> Option<Cleared> {
        match s.trim() {
            "*" | "c" => Some(Cleared::Cleared),
            "X" | "x" | "R" => Some(Cleared::Reconciled),
            _ => None,
        }
    }
}

impl fmt::Display for Cleared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}
