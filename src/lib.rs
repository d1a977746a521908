//! Export of a double-entry personal-finance ledger to the Quicken
//! Interchange Format.
//!
//! Transactions are classified by a [`QifBuilder`] into the ledger entries
//! of a [`QifFile`], shaped by the capabilities of the target application's
//! [`Dialect`]. The finished file is written with `qif_render`.
//!
//! ```no_run
//! use qif::{export, ExportConfig, MemoryAnalysis};
//!
//! let config = ExportConfig::load("export.toml")?;
//! let mut out = std::io::stdout();
//! export(&mut out, &[], &[], config, &MemoryAnalysis::new())?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::io::Write;

use tracing::debug;

pub mod analysis;
pub mod builder;
pub mod config;
pub mod error;
pub mod model;
mod portfolio;

#[cfg(test)]
mod fixtures;

pub use analysis::{MemoryAnalysis, SecurityAnalysis};
pub use builder::{has_xtra_detail, QifBuilder};
pub use config::{AncillaryCategories, ConfigError, DialectOverrides, ExportConfig, ExtraDetailRule};
pub use error::{ExportError, ExportResult};
pub use model::{
    Asset, AutoExpense, CategoryClass, SecurityPrice, Transaction, TransactionCategory,
};
pub use qif_core::{Dialect, DialectKind, QifFile};

/// Classifies every transaction and registers the prices, returning the
/// finished file.
pub fn build(
    transactions: &[Transaction],
    prices: &[SecurityPrice],
    config: ExportConfig,
    analysis: &dyn SecurityAnalysis,
) -> ExportResult<QifFile> {
    let mut builder = QifBuilder::new(config, analysis);
    for txn in transactions {
        builder.process_transaction(txn)?;
    }
    let count = builder.build_prices(prices);
    debug!(transactions = transactions.len(), prices = count, "export built");
    Ok(builder.finish())
}

/// Builds the file and writes it to `w`.
pub fn export<W: Write>(
    w: &mut W,
    transactions: &[Transaction],
    prices: &[SecurityPrice],
    config: ExportConfig,
    analysis: &dyn SecurityAnalysis,
) -> ExportResult<QifFile> {
    let file = build(transactions, prices, config, analysis)?;
    qif_render::render(w, &file)?;
    Ok(file)
}
