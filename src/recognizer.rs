use crate::error::GrammarError;
use regex::{Regex, RegexBuilder};
use std::fmt::{Debug, Formatter};
use std::rc::Rc;

/// A user supplied recognizer callable. It receives the whole input and a
/// position and returns the exact slice it consumed, rooted at the position.
pub type CustomRecognizerFn = Rc<dyn Fn(&str, usize) -> Option<String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Flags applied when compiling pattern recognizers.
pub struct RegexFlags {
    pub multi_line: bool,
    pub dot_matches_new_line: bool,
}

impl Default for RegexFlags {
    fn default() -> Self {
        Self {
            multi_line: true,
            dot_matches_new_line: false,
        }
    }
}

#[derive(Clone)]
/// A low level pattern matcher bound to a terminal symbol.
///
/// Recognizers are only consulted by the scanner. Each variant matches
/// anchored at the given position and returns the consumed slice so the
/// scanner can advance by its exact length.
pub enum Recognizer {
    StringMatch {
        value: String,
        ignore_case: bool,
    },
    Pattern {
        regex: Regex,
        source: String,
        ignore_case: bool,
    },
    Custom {
        name: String,
        callable: CustomRecognizerFn,
    },
    /// Matches the empty string at the end of the input.
    Eof,
    /// Internal end marker of the augmented start production.
    Stop,
    /// Matches the empty string, always.
    Empty,
}

impl Recognizer {
    pub fn string(value: &str, ignore_case: bool) -> Self {
        Recognizer::StringMatch {
            value: value.to_string(),
            ignore_case,
        }
    }

    pub fn regex(pattern: &str, flags: RegexFlags, ignore_case: bool) -> Result<Self, GrammarError> {
        // The pattern is anchored with \A so it can only match rooted at the
        // scan position, independent of the multi-line flag.
        let anchored = format!(r"\A(?:{})", pattern);
        let regex = RegexBuilder::new(&anchored)
            .multi_line(flags.multi_line)
            .dot_matches_new_line(flags.dot_matches_new_line)
            .case_insensitive(ignore_case)
            .build()
            .map_err(|err| {
                GrammarError::new(format!("Regex compile error in /{}/: {}", pattern, err))
            })?;
        Ok(Recognizer::Pattern {
            regex,
            source: pattern.to_string(),
            ignore_case,
        })
    }

    pub fn custom(name: &str, callable: CustomRecognizerFn) -> Self {
        Recognizer::Custom {
            name: name.to_string(),
            callable,
        }
    }

    /// Match at the given position. String and pattern recognizers never
    /// return an empty slice; custom recognizers may.
    pub fn recognize(&self, input: &str, position: usize) -> Option<String> {
        match self {
            Recognizer::StringMatch { value, ignore_case } => {
                let end = position + value.len();
                if end > input.len() || !input.is_char_boundary(end) {
                    return None;
                }
                let candidate = &input[position..end];
                let matched = if *ignore_case {
                    candidate.eq_ignore_ascii_case(value)
                } else {
                    candidate == value
                };
                if matched {
                    Some(candidate.to_string())
                } else {
                    None
                }
            }
            Recognizer::Pattern { regex, .. } => regex
                .find(&input[position..])
                .filter(|m| !m.as_str().is_empty())
                .map(|m| m.as_str().to_string()),
            Recognizer::Custom { callable, .. } => callable(input, position),
            Recognizer::Eof | Recognizer::Stop => {
                if position == input.len() {
                    Some(String::new())
                } else {
                    None
                }
            }
            Recognizer::Empty => Some(String::new()),
        }
    }

    /// Whether this recognizer matches a literal string. Used by the scanner
    /// for the most-specific-match rule and by the keyword rewriting.
    pub fn is_string(&self) -> bool {
        matches!(self, Recognizer::StringMatch { .. })
    }

    pub fn string_value(&self) -> Option<&str> {
        match self {
            Recognizer::StringMatch { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn pattern_source(&self) -> Option<&str> {
        match self {
            Recognizer::Pattern { source, .. } => Some(source),
            _ => None,
        }
    }

    /// A stable description entering the grammar fingerprint.
    pub fn signature(&self) -> String {
        match self {
            Recognizer::StringMatch { value, ignore_case } => {
                format!("str:{}:{}", ignore_case, value)
            }
            Recognizer::Pattern {
                source, ignore_case, ..
            } => format!("re:{}:{}", ignore_case, source),
            Recognizer::Custom { name, .. } => format!("ext:{}", name),
            Recognizer::Eof => "eof".to_string(),
            Recognizer::Stop => "stop".to_string(),
            Recognizer::Empty => "empty".to_string(),
        }
    }
}

impl Debug for Recognizer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Recognizer::StringMatch { value, .. } => write!(f, "\"{}\"", value),
            Recognizer::Pattern { source, .. } => write!(f, "/{}/", source),
            Recognizer::Custom { name, .. } => write!(f, "<{}>", name),
            Recognizer::Eof => write!(f, "<EOF>"),
            Recognizer::Stop => write!(f, "<STOP>"),
            Recognizer::Empty => write!(f, "<EMPTY>"),
        }
    }
}
