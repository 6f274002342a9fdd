use crate::util::Position;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq)]
/// A source location attached to grammar construction errors.
pub struct Location {
    pub file_name: Option<String>,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone)]
/// An error raised while assembling or normalizing a grammar.
pub struct GrammarError {
    message: String,
    location: Option<Location>,
}

#[derive(Debug, Clone)]
/// A single unresolved shift/reduce or reduce/reduce conflict found during
/// table construction.
pub struct Conflict {
    pub state: usize,
    pub terminal: String,
    pub message: String,
}

#[derive(Debug)]
/// An error raised while binding a parser to a grammar.
pub enum ParserInitError {
    SrConflicts(Vec<Conflict>),
    RrConflicts(Vec<Conflict>),
    Grammar(GrammarError),
    Actions(String),
}

#[derive(Debug, Clone)]
/// An error raised when no viable token or action exists for the input.
pub struct SyntaxError {
    pub position: usize,
    pub location: Position,
    pub layout_content: String,
    pub expected: Vec<String>,
    pub excerpt: String,
}

#[derive(Debug, Clone)]
/// An error raised when lexical disambiguation ends with more than one
/// equally ranked token.
pub struct DisambiguationError {
    pub position: usize,
    pub location: Position,
    pub candidates: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
/// An error returned when the driver fails to consume the input.
pub enum ParseError {
    Syntax(SyntaxError),
    Disambiguation(DisambiguationError),
}

impl Location {
    pub fn new(line: usize, column: usize) -> Self {
        Self {
            file_name: None,
            line,
            column,
        }
    }
}

impl Display for Location {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.file_name {
            Some(name) => write!(f, "{}:{},{}", name, self.line, self.column),
            None => write!(f, "{},{}", self.line, self.column),
        }
    }
}

impl GrammarError {
    pub fn new(message: String) -> Self {
        Self {
            message,
            location: None,
        }
    }

    pub fn with_location(message: String, location: Location) -> Self {
        Self {
            message,
            location: Some(location),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }
}

impl Display for GrammarError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.location {
            Some(location) => write!(f, "GrammarError at {}: {}", location, self.message),
            None => write!(f, "GrammarError: {}", self.message),
        }
    }
}

impl std::error::Error for GrammarError {}

impl Conflict {
    pub fn new(state: usize, terminal: String, message: String) -> Self {
        Self {
            state,
            terminal,
            message,
        }
    }
}

impl Display for Conflict {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "In state {} on token \"{}\": {}",
            self.state, self.terminal, self.message
        )
    }
}

impl ParserInitError {
    pub fn conflicts(&self) -> &[Conflict] {
        match self {
            ParserInitError::SrConflicts(conflicts) | ParserInitError::RrConflicts(conflicts) => {
                conflicts
            }
            _ => &[],
        }
    }
}

impl Display for ParserInitError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ParserInitError::SrConflicts(conflicts) => {
                writeln!(f, "{} shift/reduce conflict(s):", conflicts.len())?;
                for conflict in conflicts {
                    writeln!(f, "{}", conflict)?;
                }
                Ok(())
            }
            ParserInitError::RrConflicts(conflicts) => {
                writeln!(f, "{} reduce/reduce conflict(s):", conflicts.len())?;
                for conflict in conflicts {
                    writeln!(f, "{}", conflict)?;
                }
                Ok(())
            }
            ParserInitError::Grammar(err) => write!(f, "{}", err),
            ParserInitError::Actions(message) => write!(f, "ParserInitError: {}", message),
        }
    }
}

impl std::error::Error for ParserInitError {}

impl From<GrammarError> for ParserInitError {
    fn from(err: GrammarError) -> Self {
        ParserInitError::Grammar(err)
    }
}

impl Display for SyntaxError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "SyntaxError at {}: \"{}\" => Expected: {}",
            self.location,
            self.excerpt,
            if self.expected.is_empty() {
                "nothing".to_string()
            } else {
                self.expected.join(" or ")
            }
        )
    }
}

impl Display for DisambiguationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let candidates = self
            .candidates
            .iter()
            .map(|(terminal, matched)| format!("{}({})", terminal, matched))
            .collect::<Vec<_>>()
            .join(", ");
        write!(
            f,
            "Can not disambiguate tokens at {}: {}",
            self.location, candidates
        )
    }
}

impl ParseError {
    pub fn position(&self) -> usize {
        match self {
            ParseError::Syntax(err) => err.position,
            ParseError::Disambiguation(err) => err.position,
        }
    }

    pub fn is_disambiguation(&self) -> bool {
        matches!(self, ParseError::Disambiguation(_))
    }
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::Syntax(err) => write!(f, "{}", err),
            ParseError::Disambiguation(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for ParseError {}
