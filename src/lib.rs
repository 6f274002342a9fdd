//! Language LR (lang_lr) is a library to construct deterministic bottom-up
//! (LR) and generalized (GLR) parsers from context-free grammars written
//! directly in Rust code.
//!
//! # Overview
//! A grammar is assembled programmatically with [GrammarBuilder]: rules map
//! nonterminal names to alternatives, alternatives are lists of symbol
//! references (with `?`, `*`, `+` multiplicity sugar), and terminals carry
//! string or regex recognizers. Building normalizes the grammar into arenas
//! of symbols and globally numbered productions and prepends the augmented
//! start production. A [Parser] computes the SLR or LALR automaton, reports
//! shift/reduce and reduce/reduce conflicts, and drives a deterministic
//! shift/reduce loop with semantic action dispatch. A [GlrParser] drives the
//! same tables over a graph structured stack, following every viable action
//! and packing ambiguous derivations into a shared parse [Forest].
//!
//! # Example
//! ```
//! use lang_lr::{Action, GrammarBuilder, Parser, ParserOptions, TermSpec, Value};
//!
//! let (grammar, start) = GrammarBuilder::new()
//!     .rule("List", [vec!["word+[comma]"]])
//!     .terminal("word", TermSpec::regex(r"\w+"))
//!     .terminal("comma", TermSpec::string(","))
//!     .start("List")
//!     .build()
//!     .unwrap();
//!
//! let mut actions = lang_lr::ActionRegistry::new();
//! actions.insert(
//!     start,
//!     Action::nonterm(|_, mut nodes: Vec<Value>| nodes.remove(0)),
//! );
//! actions.insert(
//!     "List".to_string(),
//!     Action::nonterm(|_, mut nodes: Vec<Value>| nodes.remove(0)),
//! );
//!
//! let parser = Parser::<()>::with_options(
//!     std::rc::Rc::new(grammar),
//!     ParserOptions::default().actions(actions),
//! )
//! .unwrap();
//!
//! let value = parser.parse("one, two, three").unwrap();
//! assert_eq!(
//!     value,
//!     Value::List(vec!["one".into(), "two".into(), "three".into()])
//! );
//! ```
//!
//! Layout (whitespace and comments) can be described as a `LAYOUT`
//! sub-grammar consumed between tokens, a `KEYWORD` terminal forces word
//! boundary matching for matching literals, and built tables can be cached
//! on disk keyed by a stable grammar fingerprint.

mod actions;
mod analysis;
mod error;
pub mod examples;
mod glr;
mod grammar;
mod parser;
mod recognizer;
mod scanner;
mod symbol;
mod table;
mod util;

pub use actions::{
    alt, builtin_by_name, Action, ActionRegistry, BuiltinAction, ProdActionFn, TermActionFn, Value,
};
pub use analysis::Analysis;
pub use error::{
    Conflict, DisambiguationError, GrammarError, Location, ParseError, ParserInitError,
    SyntaxError,
};
pub use glr::{Forest, GlrParser, SppfAlternative, SppfNode};
pub use grammar::{
    Alt, Grammar, GrammarBuilder, GrammarOptions, Multiplicity, ProdId, Production, SymRef,
    TermSpec,
};
pub use parser::{Context, Parser, ParserOptions, TreeNode};
pub use recognizer::{CustomRecognizerFn, Recognizer, RegexFlags};
pub use scanner::{CustomTokenRecognition, DynamicDisambiguation, ScanInput, Token};
pub use symbol::{Assoc, Symbol, SymbolId, SymbolKind, DEFAULT_PRIORITY};
pub use table::{
    cache::{load_table, store_table},
    Item, LrState, LrTable, StateId, TableAction, TableKind,
};
pub use util::{Code, Position};
