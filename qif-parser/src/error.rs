use std::error::Error;
use std::fmt;

use pest::Span;
use qif_core::ValueError;

use super::Rule;

pub type ParseResult<T> = Result<T, ParseError>;

#[derive(Clone, Debug, PartialEq)]
pub enum ParseErrorKind {
    /// An error was encountered while converting string to a numeric representation.
    DecimalError { message: String },
    /// A line value (date, flag, action, ...) could not be read.
    InvalidValue { message: String },
    /// Input is invalid in some way.
    InvalidInput { message: String },
    /// Parser has reached an invalid state (most likely a bug in the parser).
    InvalidParserState { message: String },
}

#[derive(Debug)]
pub struct ParseError {
    /// The type of error.
    pub kind: ParseErrorKind,
    /// The (line, column) location of the error in the input.
    pub location: (usize, usize),
    source: Option<Box<dyn Error + 'static + Send + Sync>>,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ParseErrorKind::DecimalError { message } | ParseErrorKind::InvalidValue { message } => {
                f.write_str(message)?
            }
            ParseErrorKind::InvalidInput { message } => write!(f, "invalid input: {}", message)?,
            ParseErrorKind::InvalidParserState { message } => write!(
                f,
                "parser reached an invalid state (this is a bug), expected {}",
                message
            )?,
        }
        write!(f, " at line {} column {}", self.location.0, self.location.1)
    }
}

impl Error for ParseError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn Error + 'static))
    }
}

impl ParseError {
    fn new(
        kind: ParseErrorKind,
        location: (usize, usize),
        source: Option<Box<dyn Error + 'static + Send + Sync>>,
    ) -> ParseError {
        ParseError {
            kind,
            location,
            source,
        }
    }

    /// The walk over the parse tree met something the grammar rules out.
    pub(crate) fn invalid_state<T: ToString>(expected: T, span: Option<&Span>) -> ParseError {
        let location = span.map_or((0, 0), |span| span.start_pos().line_col());
        ParseError::new(
            ParseErrorKind::InvalidParserState {
                message: expected.to_string(),
            },
            location,
            None,
        )
    }

    /// A line whose value could not be read, such as `Dnot a date`.
    pub(crate) fn invalid_value(err: ValueError, span: &Span) -> ParseError {
        let message = format!("{} in line {:?}", err, span.as_str().trim_end());
        let kind = match &err {
            ValueError::Decimal { .. } => ParseErrorKind::DecimalError { message },
            _ => ParseErrorKind::InvalidValue { message },
        };
        ParseError::new(kind, span.start_pos().line_col(), Some(Box::new(err)))
    }
}

impl From<pest::error::Error<Rule>> for ParseError {
    fn from(err: pest::error::Error<Rule>) -> Self {
        let err = err.renamed_rules(|rule| {
            match *rule {
                Rule::EOI => "end of input",
                Rule::file => "QIF file",
                Rule::header => "section header",
                Rule::header_name => "section name",
                Rule::record => "record",
                Rule::field_line => "record line",
                Rule::symbol => "line symbol",
                Rule::value => "line value",
                #[allow(unreachable_patterns)]
                _ => "QIF text",
            }
            .to_string()
        });
        let location = match &err.line_col {
            pest::error::LineColLocation::Pos(ref p) => *p,
            pest::error::LineColLocation::Span(ref p, _) => *p,
        };
        ParseError::new(
            ParseErrorKind::InvalidInput {
                message: err.to_string(),
            },
            location,
            Some(Box::new(err)),
        )
    }
}
