use qif_core::*;
use std::{io, io::Write};
use thiserror::Error;


/// Writes QIF text with the date layout of its dialect.
#[derive(Clone, Eq, PartialEq, Default, Debug)]
pub struct BasicRenderer {
    dialect: Dialect,
}

impl BasicRenderer {
    pub fn new(dialect: Dialect) -> Self {
        BasicRenderer { dialect }
    }
}

/// Renders a whole file with the dialect it was built for.
pub fn render<W: Write>(w: &mut W, file: &QifFile) -> Result<(), BasicRendererError> {
    BasicRenderer::new(file.dialect().clone()).render(file, w)
}

#[derive(Error, Debug)]
pub enum BasicRendererError {
    #[error("an io error occurred")]
    Io(#[from] io::Error),
}

pub trait Renderer<T, W: Write> {
    type Error;
    fn render(&self, renderable: T, write: &mut W) -> Result<(), Self::Error>;
}

const END_OF_RECORD: &str = "^";

/// File layout: the account list, classes, the category tree, securities,
/// one section per account ledger and finally the price list.
impl<'a, W: Write> Renderer<&'a QifFile, W> for BasicRenderer {
    type Error = BasicRendererError;
    fn render(&self, file: &'a QifFile, write: &mut W) -> Result<(), Self::Error> {
        writeln!(write, "!Option:AutoSwitch")?;
        writeln!(write, "!Account")?;
        for ledger in file.accounts() {
            self.render(&*ledger.account, write)?;
        }
        writeln!(write, "!Clear:AutoSwitch")?;

        if file.classes().next().is_some() {
            writeln!(write, "!Type:Class")?;
            for class in file.classes() {
                self.render(&**class, write)?;
            }
        }

        if file.categories().next().is_some() {
            writeln!(write, "!Type:Cat")?;
            for group in file.parent_categories() {
                self.render(group, write)?;
            }
        }

        if file.securities().next().is_some() {
            writeln!(write, "!Type:Security")?;
            for prices in file.securities() {
                self.render(&*prices.security, write)?;
            }
        }

        for ledger in file.accounts().filter(|ledger| !ledger.events.is_empty()) {
            self.render(ledger, write)?;
        }

        if file.has_prices() {
            writeln!(write, "!Type:Prices")?;
            for prices in file.securities() {
                self.render(prices, write)?;
            }
        }
        Ok(())
    }
}

impl<'a, W: Write> Renderer<&'a QifAccountEvents, W> for BasicRenderer {
    type Error = BasicRendererError;
    fn render(&self, ledger: &'a QifAccountEvents, write: &mut W) -> Result<(), Self::Error> {
        writeln!(write, "!Account")?;
        self.render(&*ledger.account, write)?;
        writeln!(write, "!Type:{}", ledger.account.ty)?;
        for entry in &ledger.events {
            self.render(entry, write)?;
        }
        Ok(())
    }
}

impl<'a, W: Write> Renderer<&'a QifLedgerEntry, W> for BasicRenderer {
    type Error = BasicRendererError;
    fn render(&self, entry: &'a QifLedgerEntry, write: &mut W) -> Result<(), Self::Error> {
        match entry {
            QifLedgerEntry::Cash(event) => self.render(event, write),
            QifLedgerEntry::Investment(event) => self.render(event, write),
        }
    }
}

impl<'a, K: LineKind, W: Write> Renderer<&'a Record<K>, W> for BasicRenderer {
    type Error = BasicRendererError;
    fn render(&self, record: &'a Record<K>, write: &mut W) -> Result<(), Self::Error> {
        render_lines(self, write, record.lines())?;
        for split in record.splits() {
            render_lines(self, write, split.lines())?;
        }
        writeln!(write, "{}", END_OF_RECORD)?;
        Ok(())
    }
}

fn render_lines<K: LineKind, W: Write>(
    renderer: &BasicRenderer,
    w: &mut W,
    lines: &[Line<K>],
) -> Result<(), BasicRendererError> {
    for line in lines {
        writeln!(w, "{}", line.render(&renderer.dialect))?;
    }
    Ok(())
}

impl<'a, W: Write> Renderer<&'a QifAccount, W> for BasicRenderer {
    type Error = BasicRendererError;
    fn render(&self, account: &'a QifAccount, write: &mut W) -> Result<(), Self::Error> {
        self.render(&account.to_record(), write)
    }
}

impl<'a, W: Write> Renderer<&'a QifClass, W> for BasicRenderer {
    type Error = BasicRendererError;
    fn render(&self, class: &'a QifClass, write: &mut W) -> Result<(), Self::Error> {
        self.render(&class.to_record(), write)
    }
}

impl<'a, W: Write> Renderer<&'a QifCategory, W> for BasicRenderer {
    type Error = BasicRendererError;
    fn render(&self, category: &'a QifCategory, write: &mut W) -> Result<(), Self::Error> {
        self.render(&category.to_record(), write)
    }
}

impl<'a, W: Write> Renderer<&'a QifParentCategory, W> for BasicRenderer {
    type Error = BasicRendererError;
    fn render(&self, group: &'a QifParentCategory, write: &mut W) -> Result<(), Self::Error> {
        self.render(&*group.category, write)?;
        for child in &group.children {
            self.render(&**child, write)?;
        }
        Ok(())
    }
}

impl<'a, W: Write> Renderer<&'a QifSecurity, W> for BasicRenderer {
    type Error = BasicRendererError;
    fn render(&self, security: &'a QifSecurity, write: &mut W) -> Result<(), Self::Error> {
        self.render(&security.to_record(), write)
    }
}

impl<'a, W: Write> Renderer<&'a QifSecurityPrices, W> for BasicRenderer {
    type Error = BasicRendererError;
    fn render(&self, prices: &'a QifSecurityPrices, write: &mut W) -> Result<(), Self::Error> {
        for price in &prices.prices {
            writeln!(
                write,
                "{}",
                price.render(&prices.security.symbol, &self.dialect.date_format)
            )?;
            writeln!(write, "{}", END_OF_RECORD)?;
        }
        Ok(())
    }
}
