use typed_builder::TypedBuilder;

/// A counterparty named on the `P` line of ledger entries.
#[derive(Clone, Debug, Eq, PartialEq, Hash, TypedBuilder)]
pub struct QifPayee {
    #[builder(setter(into))]
    pub name: String,
}

impl QifPayee {
    pub fn new(name: impl Into<String>) -> Self {
        QifPayee { name: name.into() }
    }
}
