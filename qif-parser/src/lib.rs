use std::collections::HashMap;
use std::rc::Rc;

use lazy_static::lazy_static;
use pest::iterators::Pair;
use pest::Parser;
use pest::Span;
use pest_derive::Parser as PestParser;
use tracing::{debug, trace, warn};

use qif_core as qc;
use qc::{Line, LineKind, Record, Resolver};

use error::{ParseError, ParseResult};

pub mod error;

#[derive(PestParser)]
#[grammar = "qif.pest"]
pub struct QifParser;

/// What the records following a `!` header describe.
#[derive(Clone, Copy, Debug, PartialEq)]
enum Section {
    AutoSwitch,
    ClearAutoSwitch,
    Account,
    Cash(qc::QifAccountType),
    Investment,
    Category,
    Class,
    Security,
    Prices,
    Unsupported,
}

lazy_static! {
    static ref SECTIONS: HashMap<&'static str, Section> = {
        use qc::QifAccountType::*;
        let mut sections = HashMap::new();
        sections.insert("option:autoswitch", Section::AutoSwitch);
        sections.insert("clear:autoswitch", Section::ClearAutoSwitch);
        sections.insert("account", Section::Account);
        sections.insert("type:bank", Section::Cash(Bank));
        sections.insert("type:cash", Section::Cash(Cash));
        sections.insert("type:ccard", Section::Cash(CreditCard));
        sections.insert("type:oth a", Section::Cash(OtherAsset));
        sections.insert("type:oth l", Section::Cash(OtherLiability));
        sections.insert("type:invst", Section::Investment);
        sections.insert("type:port", Section::Investment);
        sections.insert("type:cat", Section::Category);
        sections.insert("type:class", Section::Class);
        sections.insert("type:security", Section::Security);
        sections.insert("type:prices", Section::Prices);
        sections
    };
}

/// One `<symbol><value>` line as written.
#[derive(Debug)]
struct RawLine<'i> {
    symbol: char,
    value: &'i str,
    span: Span<'i>,
}

impl<'i> RawLine<'i> {
    fn parse<K: LineKind>(&self, resolver: &dyn Resolver) -> ParseResult<Option<Line<K>>> {
        Line::parse(self.symbol, self.value, resolver)
            .map_err(|err| ParseError::invalid_value(err, &self.span))
    }
}

#[derive(Debug)]
struct ParseState {
    file: qc::QifFile,
    section: Section,
    auto_switch: bool,
    current_account: Option<Rc<qc::QifAccount>>,
}

impl ParseState {
    fn new(dialect: qc::Dialect) -> Self {
        ParseState {
            file: qc::QifFile::new(dialect),
            section: Section::Unsupported,
            auto_switch: false,
            current_account: None,
        }
    }

    fn enter_section(&mut self, name: &str) {
        let key = name.trim().to_ascii_lowercase();
        let section = SECTIONS.get(key.as_str()).copied().unwrap_or_else(|| {
            trace!(section = %name.trim(), "skipping unsupported section");
            Section::Unsupported
        });
        match section {
            Section::AutoSwitch => self.auto_switch = true,
            Section::ClearAutoSwitch => self.auto_switch = false,
            _ => {}
        }
        debug!(?section, auto_switch = self.auto_switch, "entering section");
        self.section = section;
    }

    /// The account that ledger entries of the current section belong to.
    /// Entries before any account definition go to an account named after
    /// the section type.
    fn ledger_account(&mut self, ty: qc::QifAccountType) -> Rc<qc::QifAccount> {
        match &self.current_account {
            Some(account) => Rc::clone(account),
            None => {
                let account = self.file.register_account(
                    qc::QifAccount::builder().name(ty.as_str()).ty(ty).build(),
                );
                self.current_account = Some(Rc::clone(&account));
                account
            }
        }
    }

    fn record(&mut self, lines: Vec<RawLine>) -> ParseResult<()> {
        if lines.is_empty() {
            return Ok(());
        }
        match self.section {
            Section::Account | Section::AutoSwitch => {
                let record = record::<qc::AccountLine>(&lines, &self.file)?;
                match qc::QifAccount::from_record(&record) {
                    Some(account) => {
                        let account = self.file.register_account(account);
                        // An account list only declares accounts; a lone
                        // account header also selects the ledger that follows.
                        if !self.auto_switch {
                            self.current_account = Some(account);
                        }
                    }
                    None => warn!("skipping account without a name"),
                }
            }
            Section::Category => {
                let record = record::<qc::CategoryLine>(&lines, &self.file)?;
                match qc::QifCategory::from_record(&record) {
                    Some(category) => {
                        self.file.register_category(category);
                    }
                    None => warn!("skipping category without a name"),
                }
            }
            Section::Class => {
                let record = record::<qc::ClassLine>(&lines, &self.file)?;
                match qc::QifClass::from_record(&record) {
                    Some(class) => {
                        self.file.register_class(class);
                    }
                    None => warn!("skipping class without a name"),
                }
            }
            Section::Security => {
                let record = record::<qc::SecurityLine>(&lines, &self.file)?;
                match qc::QifSecurity::from_record(&record) {
                    Some(security) => {
                        self.file.register_security(security);
                    }
                    None => warn!("skipping security without a name"),
                }
            }
            Section::Prices => {
                for line in &lines {
                    self.price(line)?;
                }
            }
            Section::Cash(ty) => {
                let account = self.ledger_account(ty);
                let event = cash_event(&lines, &self.file)?;
                self.file.add_event(&account, event);
            }
            Section::Investment => {
                let account = self.ledger_account(qc::QifAccountType::Investment);
                let mut event = record::<qc::PortfolioLine>(&lines, &self.file)?;
                event.normalise_split_ratio();
                self.file.add_event(&account, event);
            }
            Section::ClearAutoSwitch | Section::Unsupported => {
                trace!(lines = lines.len(), "skipping record");
            }
        }
        Ok(())
    }

    fn price(&mut self, line: &RawLine) -> ParseResult<()> {
        let text = format!("{}{}", line.symbol, line.value);
        let (symbol, price) = qc::QifPrice::parse(&text, self.file.date_format())
            .map_err(|err| ParseError::invalid_value(err, &line.span))?;
        let security = self
            .file
            .security_by_symbol(&symbol)
            .or_else(|| self.file.security(&symbol));
        match security {
            Some(security) => {
                self.file.add_price(&security, price);
            }
            None => warn!(%symbol, "skipping price of unknown security"),
        }
        Ok(())
    }
}

/// Reads a QIF file. Records are interned into a fresh [`qc::QifFile`] in
/// the order they appear; a reference to an entity that has not been
/// declared by then reads as unresolved.
pub fn parse(input: &str, dialect: &qc::Dialect) -> ParseResult<qc::QifFile> {
    let parsed = QifParser::parse(Rule::file, input)?
        .next()
        .ok_or_else(|| ParseError::invalid_state("non-empty parse result", None))?;

    let mut state = ParseState::new(dialect.clone());

    for pair in parsed.into_inner() {
        match pair.as_rule() {
            Rule::EOI => break,
            Rule::header => {
                let name = pair
                    .into_inner()
                    .next()
                    .ok_or_else(|| ParseError::invalid_state("section name", None))?;
                state.enter_section(name.as_str());
            }
            Rule::record => {
                let lines = pair
                    .into_inner()
                    .map(raw_line)
                    .collect::<ParseResult<Vec<_>>>()?;
                state.record(lines)?;
            }
            _ => {
                return Err(ParseError::invalid_state(
                    "section header or record",
                    Some(&pair.as_span()),
                ))
            }
        }
    }

    Ok(state.file)
}

fn raw_line(pair: Pair<Rule>) -> ParseResult<RawLine> {
    let span = pair.as_span();
    let mut inner = pair.into_inner();
    let symbol = inner
        .next()
        .and_then(|p| p.as_str().chars().next())
        .ok_or_else(|| ParseError::invalid_state("line symbol", Some(&span)))?;
    let value = inner.next().map(|p| p.as_str()).unwrap_or("");
    Ok(RawLine {
        symbol,
        value,
        span,
    })
}

fn record<K: LineKind>(lines: &[RawLine], resolver: &dyn Resolver) -> ParseResult<Record<K>> {
    let mut record = Record::new();
    for line in lines {
        match line.parse::<K>(resolver)? {
            Some(parsed) => record.push_line(parsed),
            None => trace!(symbol = %line.symbol, "skipping unknown line"),
        }
    }
    Ok(record)
}

/// A cash entry. An `S` line opens a split; `E`, `$` and `%` lines belong
/// to the open split.
fn cash_event(lines: &[RawLine], resolver: &dyn Resolver) -> ParseResult<qc::QifEvent> {
    let mut event = qc::QifEvent::new();
    let mut split: Option<qc::QifSplit> = None;

    for line in lines {
        if line.symbol == 'S' {
            if let Some(done) = split.take() {
                event.push_split(done);
            }
            split = Some(qc::QifSplit::new());
        }
        match split.as_mut() {
            Some(current) if matches!(line.symbol, 'S' | 'E' | '$' | '%') => {
                if let Some(parsed) = line.parse::<qc::SplitLine>(resolver)? {
                    current.push_line(parsed);
                }
            }
            _ => match line.parse::<qc::EventLine>(resolver)? {
                Some(parsed) => event.push_line(parsed),
                None => trace!(symbol = %line.symbol, "skipping unknown line"),
            },
        }
    }
    if let Some(done) = split {
        event.push_split(done);
    }
    Ok(event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParseErrorKind;
    use chrono::NaiveDate;
    use indoc::indoc;
    use qc::{CategoryTarget, InvestmentAction, Money, Ratio, Units};
    use rust_decimal_macros::dec;

    macro_rules! parse_ok {
        ( $rule:ident, $input:expr ) => {
            assert_eq!(
                QifParser::parse(Rule::$rule, $input)
                    .unwrap()
                    .as_str(),
                $input
            );
        };
        ( $rule:ident, $input:expr, $output:expr ) => {
            assert_eq!(
                QifParser::parse(Rule::$rule, $input)
                    .unwrap()
                    .as_str(),
                $output
            );
        };
    }

    macro_rules! parse_fail {
        ( $rule:ident, $input:expr ) => {
            assert!(QifParser::parse(Rule::$rule, $input).is_err());
        };
    }

    #[test]
    fn header() {
        parse_ok!(header, "!Type:Bank\n");
        parse_ok!(header, "!Type:Oth A\n");
        parse_ok!(header, "!Account");
        parse_ok!(header_name, "Option:AutoSwitch");

        parse_fail!(header, "Type:Bank\n");
        parse_fail!(header, "!\n");
    }

    #[test]
    fn field_line() {
        parse_ok!(field_line, "D01/03/2024\n");
        parse_ok!(field_line, "T-1,234.56");
        parse_ok!(field_line, "I\n");
        parse_ok!(field_line, "\"VOD\",0.72,\"01/03/2024\"\n");

        parse_fail!(field_line, "^\n");
        parse_fail!(field_line, "!Type:Bank\n");
        parse_fail!(field_line, "\n");
    }

    #[test]
    fn record() {
        parse_ok!(record, "D01/03/2024\nT1.00\n^\n");
        parse_ok!(record, "D01/03/2024\n\nT1.00\n^");
        parse_ok!(record, "^\n");
        parse_ok!(record, "NCurrent\nTBank\n", "NCurrent\nTBank\n");
        parse_ok!(record, "NCurrent\n!Type:Bank\n", "NCurrent\n");

        parse_fail!(record, "!Type:Bank\n");
    }

    #[test]
    fn file() {
        parse_ok!(file, "");
        parse_ok!(file, "\n\n");
        parse_ok!(file, "!Type:Bank\nD01/03/2024\n^\n");
        parse_ok!(file, "!Type:Bank\r\nD01/03/2024\r\n^\r\n");
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    const SAMPLE: &str = indoc! {"
        !Option:AutoSwitch
        !Account
        NCurrent
        TBank
        ^
        NShares
        TInvst
        ^
        !Clear:AutoSwitch
        !Type:Class
        NHoliday
        ^
        !Type:Cat
        NSalary
        I
        ^
        NShopping:Food
        E
        ^
        !Type:Security
        NVodafone
        SVOD
        TStock
        ^
        !Account
        NCurrent
        TBank
        ^
        !Type:Bank
        D03/01/2024
        T-21.95
        PASDA
        LShopping:Food/Holiday
        ^
        D03/02/2024
        T800.00
        CX
        PEmployer
        LSalary
        SSalary
        $1000.00
        SShopping:Food
        EHMRC
        $-200.00
        ^
        !Account
        NShares
        TInvst
        ^
        !Type:Invst
        D03/05/2024
        NBuy
        YVodafone
        I0.72
        Q100
        T72.00
        O1.50
        L[Current]
        ^
        D03/06/2024
        NStkSplit
        YVOD
        Q20
        ^
        !Type:Prices
        \"VOD\",0.72,\"03/05/2024\"
        ^
        !Type:Memorized
        KC
        T1.00
        ^
    "};

    #[test]
    fn registry_is_populated() {
        let file = parse(SAMPLE, &qc::Dialect::default()).unwrap();
        let accounts: Vec<_> = file.accounts().map(|a| a.account.name.as_str()).collect();
        assert_eq!(accounts, vec!["Current", "Shares"]);
        assert_eq!(
            file.account("Shares").map(|a| a.ty),
            Some(qc::QifAccountType::Investment)
        );
        assert_eq!(file.categories().count(), 3);
        assert!(file.category("Shopping").is_some());
        assert!(file.category("Salary").map(|c| c.income).unwrap_or(false));
        assert_eq!(file.classes().count(), 1);

        let vodafone = file.securities().next().unwrap();
        assert_eq!(vodafone.security.symbol, "VOD");
        assert_eq!(vodafone.prices.len(), 1);
        assert_eq!(vodafone.prices[0].date, date(5));
    }

    #[test]
    fn cash_events_with_splits() {
        let file = parse(SAMPLE, &qc::Dialect::default()).unwrap();
        let events = file.events("Current").unwrap();
        assert_eq!(events.len(), 2);

        let asda = events[0].as_cash().unwrap();
        assert_eq!(asda.date(), Some(date(1)));
        assert_eq!(asda.amount(), Some(Money::new(dec!(-21.95))));
        assert_eq!(asda.payee_name(), Some("ASDA"));
        match asda.category_target() {
            Some(CategoryTarget::Category { category, classes }) => {
                assert_eq!(category.as_ref().map(|c| c.name.as_str()), Some("Shopping:Food"));
                assert_eq!(classes.len(), 1);
                assert_eq!(classes[0].name, "Holiday");
            }
            other => panic!("unexpected category {:?}", other),
        }

        let salary = events[1].as_cash().unwrap();
        assert!(salary.is_cleared());
        assert_eq!(salary.splits().len(), 2);
        assert_eq!(salary.split_total(), Money::new(dec!(800)));
        assert_eq!(salary.splits()[1].leg_comment(), Some("HMRC"));
    }

    #[test]
    fn investment_events() {
        let file = parse(SAMPLE, &qc::Dialect::default()).unwrap();
        let events = file.events("Shares").unwrap();
        assert_eq!(events.len(), 2);

        let buy = events[0].as_investment().unwrap();
        assert_eq!(buy.action(), Some(InvestmentAction::Buy));
        assert_eq!(buy.security().map(|s| s.name.as_str()), Some("Vodafone"));
        assert_eq!(buy.units(), Some(Units::new(dec!(100))));
        assert_eq!(buy.commission(), Some(Money::new(dec!(1.50))));
        assert_eq!(
            buy.trade_target()
                .and_then(CategoryTarget::transfer_account)
                .map(|a| a.name.as_str()),
            Some("Current")
        );

        let split = events[1].as_investment().unwrap();
        assert_eq!(split.security().map(|s| s.symbol.as_str()), Some("VOD"));
        assert_eq!(split.ratio(), Some(Ratio::new(dec!(20))));
    }

    #[test]
    fn unknown_lines_and_unresolved_references() {
        let input = indoc! {"
            !Type:Bank
            D03/01/2024
            Zignored
            T1.00
            LNowhere
            ^
        "};
        let file = parse(input, &qc::Dialect::default()).unwrap();
        let events = file.events("Bank").unwrap();
        let event = events[0].as_cash().unwrap();
        assert_eq!(event.lines().len(), 3);
        assert_eq!(event.category_target().and_then(CategoryTarget::target_category), None);
    }

    #[test]
    fn unknown_cleared_status_is_uncleared() {
        let input = indoc! {"
            !Type:Bank
            D03/01/2024
            C?
            T1.00
            ^
            D03/02/2024
            C*
            T2.00
            ^
        "};
        let file = parse(input, &qc::Dialect::default()).unwrap();
        let events = file.events("Bank").unwrap();
        let unknown = events[0].as_cash().unwrap();
        assert!(!unknown.is_cleared());
        assert_eq!(unknown.amount(), Some(Money::new(dec!(1))));
        assert!(events[1].is_cleared());
    }

    #[test]
    fn bad_values_are_located() {
        let err = parse("!Type:Bank\nDnot a date\n^\n", &qc::Dialect::default()).unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::InvalidValue { .. }));
        assert_eq!(err.location, (2, 1));

        let err = parse("!Type:Bank\nD03/01/2024\nT12x\n^\n", &qc::Dialect::default()).unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::DecimalError { .. }));
        assert_eq!(err.location, (3, 1));
        let message = err.to_string();
        assert!(message.starts_with("invalid number \"12x\""));
        assert!(message.ends_with("at line 3 column 1"));
    }

    #[test]
    fn dialect_date_format() {
        let dialect = qc::Dialect::preset(qc::DialectKind::GnuCash);
        let file = parse("!Type:Cash\nD2024-03-01\nT5.00\n^\n", &dialect).unwrap();
        assert_eq!(file.events("Cash").unwrap()[0].date(), Some(date(1)));
    }
}
