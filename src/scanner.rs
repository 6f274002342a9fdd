//! Token recognition against the expected-terminal set of an LR state, with
//! the lexical disambiguation ladder and the custom recognition hook.

use crate::error::{DisambiguationError, ParseError, SyntaxError};
use crate::grammar::Grammar;
use crate::symbol::{SymbolId, EOF, STOP};
use crate::table::LrState;
use crate::util::Code;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Eq)]
/// A recognized token: the terminal symbol, the consumed string and its
/// span. The span length always equals the value length.
pub struct Token {
    pub symbol: SymbolId,
    pub value: String,
    pub start: usize,
    pub end: usize,
}

impl Token {
    pub fn new(symbol: SymbolId, value: String, start: usize) -> Self {
        let end = start + value.len();
        Self {
            symbol,
            value,
            start,
            end,
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// The scanning context handed to custom token recognition and dynamic
/// disambiguation callbacks.
pub struct ScanInput<'i> {
    pub input: &'i str,
    pub position: usize,
    pub expected: &'i [SymbolId],
    pub grammar: &'i Grammar,
}

/// User hook replacing or augmenting default recognition. It receives the
/// scan context and a closure performing the default recognition, and
/// returns the tokens to use.
pub type CustomTokenRecognition =
    Rc<dyn Fn(&ScanInput, &mut dyn FnMut() -> Vec<Token>) -> Vec<Token>>;

/// User callback picking one of several tied tokens involving `dynamic`
/// terminals. Returns the index of the winner.
pub type DynamicDisambiguation = Rc<dyn Fn(&ScanInput, &[Token]) -> Option<usize>>;

pub(crate) struct Scanner {
    pub grammar: Rc<Grammar>,
    pub custom: Option<CustomTokenRecognition>,
    pub dynamic: Option<DynamicDisambiguation>,
    /// In layout-prefix mode STOP terminates the sub-parse at any position,
    /// not only at the end of the input.
    pub stop_anywhere: bool,
}

impl Scanner {
    pub fn new(grammar: Rc<Grammar>) -> Self {
        Self {
            grammar,
            custom: None,
            dynamic: None,
            stop_anywhere: false,
        }
    }

    fn recognize_default(&self, input: &str, position: usize, state: &LrState) -> Vec<Token> {
        let mut tokens: Vec<Token> = Vec::new();
        for symbol_id in &state.expected {
            if *symbol_id == EOF || *symbol_id == STOP {
                continue;
            }
            let symbol = self.grammar.symbol(*symbol_id);
            let recognizer = match &symbol.recognizer {
                Some(recognizer) => recognizer,
                None => continue,
            };
            if let Some(matched) = recognizer.recognize(input, position) {
                let token = Token::new(*symbol_id, matched, position);
                if !token.is_empty() && state.finish.contains(symbol_id) {
                    return vec![token];
                }
                tokens.push(token);
            }
        }
        tokens
    }

    /// Default recognition filtered through the custom recognition hook.
    pub fn scan_tokens(&self, input: &str, position: usize, state: &LrState) -> Vec<Token> {
        match &self.custom {
            Some(custom) => {
                let scan = ScanInput {
                    input,
                    position,
                    expected: &state.expected,
                    grammar: &self.grammar,
                };
                let mut default = || self.recognize_default(input, position, state);
                custom(&scan, &mut default)
            }
            None => self.recognize_default(input, position, state),
        }
    }

    /// The zero-length end tokens: EOF at the end of the input, STOP at the
    /// end or, for a layout sub-parse, anywhere.
    pub fn end_tokens(&self, input: &str, position: usize, state: &LrState) -> Vec<Token> {
        let mut tokens = Vec::new();
        let at_end = position == input.len();
        if at_end && state.actions.contains_key(&EOF) {
            tokens.push(Token::new(EOF, String::new(), position));
        }
        if (at_end || self.stop_anywhere) && state.actions.contains_key(&STOP) {
            tokens.push(Token::new(STOP, String::new(), position));
        }
        tokens
    }

    /// Reduce a token set to exactly one: finish is handled during
    /// recognition, then highest priority, most specific (string/keyword),
    /// longest match, `prefer`, the dynamic callback, and finally a
    /// disambiguation error.
    pub fn disambiguate(
        &self,
        code: &Code,
        position: usize,
        state: &LrState,
        mut tokens: Vec<Token>,
    ) -> Result<Token, ParseError> {
        if tokens.len() == 1 {
            return Ok(tokens.pop().unwrap());
        }

        let max_priority = tokens
            .iter()
            .map(|token| self.grammar.symbol(token.symbol).priority)
            .max()
            .unwrap_or_default();
        tokens.retain(|token| self.grammar.symbol(token.symbol).priority == max_priority);

        if tokens
            .iter()
            .any(|token| self.grammar.symbol(token.symbol).is_specific_match())
        {
            tokens.retain(|token| self.grammar.symbol(token.symbol).is_specific_match());
        }

        let max_len = tokens.iter().map(Token::len).max().unwrap_or_default();
        tokens.retain(|token| token.len() == max_len);

        if tokens
            .iter()
            .any(|token| self.grammar.symbol(token.symbol).prefer)
        {
            tokens.retain(|token| self.grammar.symbol(token.symbol).prefer);
        }

        if tokens.len() > 1
            && tokens
                .iter()
                .any(|token| self.grammar.symbol(token.symbol).dynamic)
        {
            if let Some(dynamic) = &self.dynamic {
                let scan = ScanInput {
                    input: code.value,
                    position,
                    expected: &state.expected,
                    grammar: &self.grammar,
                };
                if let Some(index) = dynamic(&scan, &tokens) {
                    if index < tokens.len() {
                        return Ok(tokens.swap_remove(index));
                    }
                }
            }
        }

        if tokens.len() == 1 {
            return Ok(tokens.pop().unwrap());
        }

        Err(ParseError::Disambiguation(DisambiguationError {
            position,
            location: code.obtain_position(position),
            candidates: tokens
                .into_iter()
                .map(|token| {
                    (
                        self.grammar.name_of(token.symbol).to_string(),
                        token.value,
                    )
                })
                .collect(),
        }))
    }

    /// The same ladder without the dynamic step and without erroring; used
    /// by the GLR driver when `lexical_disambiguation` is enabled.
    pub fn lexical_filter(&self, mut tokens: Vec<Token>) -> Vec<Token> {
        if tokens.len() <= 1 {
            return tokens;
        }
        let max_priority = tokens
            .iter()
            .map(|token| self.grammar.symbol(token.symbol).priority)
            .max()
            .unwrap_or_default();
        tokens.retain(|token| self.grammar.symbol(token.symbol).priority == max_priority);
        if tokens
            .iter()
            .any(|token| self.grammar.symbol(token.symbol).is_specific_match())
        {
            tokens.retain(|token| self.grammar.symbol(token.symbol).is_specific_match());
        }
        let max_len = tokens.iter().map(Token::len).max().unwrap_or_default();
        tokens.retain(|token| token.len() == max_len);
        if tokens
            .iter()
            .any(|token| self.grammar.symbol(token.symbol).prefer)
        {
            tokens.retain(|token| self.grammar.symbol(token.symbol).prefer);
        }
        tokens
    }

    pub fn syntax_error(
        &self,
        code: &Code,
        position: usize,
        layout_content: &str,
        state: &LrState,
    ) -> ParseError {
        ParseError::Syntax(SyntaxError {
            position,
            location: code.obtain_position(position),
            layout_content: layout_content.to_string(),
            expected: state
                .expected
                .iter()
                .map(|id| self.grammar.name_of(*id).to_string())
                .collect(),
            excerpt: code.context_excerpt(position),
        })
    }
}
