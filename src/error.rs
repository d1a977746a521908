use chrono::NaiveDate;
use qif_render::BasicRendererError;
use thiserror::Error;

/// Result alias for export operations.
pub type ExportResult<T> = Result<T, ExportError>;

/// A transaction that cannot be expressed in QIF with the data at hand.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("no {what} for {security} in transaction {id} on {date}")]
    MissingValuation {
        what: &'static str,
        security: String,
        id: u32,
        date: NaiveDate,
    },
    #[error("transaction {id} on {date} moves a security outside of any portfolio")]
    MissingPortfolio { id: u32, date: NaiveDate },
    #[error("transaction {id} on {date} pays cash to no third party")]
    MissingThirdParty { id: u32, date: NaiveDate },
    #[error("{asset} has no owning payee")]
    MissingParent { asset: String },
    #[error("{asset} cannot keep a QIF ledger")]
    UnsupportedAccountKind { asset: String },
    #[error("stock split of {security} on {date} with no units held")]
    InvalidStockSplit { security: String, date: NaiveDate },
    #[error(transparent)]
    Render(#[from] BasicRendererError),
}
