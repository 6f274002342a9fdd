use crate::grammar::ProdId;
use crate::recognizer::Recognizer;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};

/// Index of a grammar symbol in the symbol arena.
#[derive(
    Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct SymbolId(pub(crate) usize);

// The reserved sentinels occupy fixed slots in every symbol arena.
pub const EMPTY: SymbolId = SymbolId(0);
pub const EOF: SymbolId = SymbolId(1);
pub const STOP: SymbolId = SymbolId(2);
pub const AUGMENTED: SymbolId = SymbolId(3);

pub const DEFAULT_PRIORITY: u32 = 10;
pub const AUGMENTED_NAME: &str = "S'";
pub const INTERNAL_START_NAME: &str = "__start";
pub const LAYOUT_NAME: &str = "LAYOUT";
pub const KEYWORD_NAME: &str = "KEYWORD";
pub const RESERVED_SYMBOL_NAMES: [&str; 4] = ["EOF", "STOP", "EMPTY", INTERNAL_START_NAME];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Terminal,
    NonTerminal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Associativity used for shift/reduce disambiguation.
pub enum Assoc {
    None,
    Left,
    Right,
}

/// A grammar symbol held in the symbol arena of a [Grammar](crate::Grammar).
///
/// Terminals carry a recognizer together with the lexical disambiguation
/// flags; nonterminals record the ids of their alternative productions.
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub action_name: Option<String>,
    pub priority: u32,
    pub recognizer: Option<Recognizer>,
    pub finish: Option<bool>,
    pub prefer: bool,
    pub dynamic: bool,
    pub keyword: bool,
    pub productions: Vec<ProdId>,
    pub user_meta: HashMap<String, String>,
}

impl Symbol {
    pub fn terminal(name: &str, recognizer: Option<Recognizer>) -> Self {
        Self {
            name: name.to_string(),
            kind: SymbolKind::Terminal,
            action_name: None,
            priority: DEFAULT_PRIORITY,
            recognizer,
            finish: None,
            prefer: false,
            dynamic: false,
            keyword: false,
            productions: Vec::new(),
            user_meta: HashMap::new(),
        }
    }

    pub fn nonterminal(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: SymbolKind::NonTerminal,
            action_name: None,
            priority: DEFAULT_PRIORITY,
            recognizer: None,
            finish: None,
            prefer: false,
            dynamic: false,
            keyword: false,
            productions: Vec::new(),
            user_meta: HashMap::new(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.kind == SymbolKind::Terminal
    }

    pub fn is_nonterminal(&self) -> bool {
        self.kind == SymbolKind::NonTerminal
    }

    /// Whether scanning should treat a match of this terminal as maximally
    /// specific (literal strings and keyword rewritten literals).
    pub fn is_specific_match(&self) -> bool {
        self.keyword
            || self
                .recognizer
                .as_ref()
                .map_or(false, |recognizer| recognizer.is_string())
    }

    pub fn add_user_meta(&mut self, name: &str, value: &str) {
        self.user_meta.insert(name.to_string(), value.to_string());
    }

    pub fn get_user_meta(&self, name: &str) -> Option<&str> {
        self.user_meta.get(name).map(String::as_str)
    }
}

impl Display for Symbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl SymbolId {
    pub fn index(&self) -> usize {
        self.0
    }
}
