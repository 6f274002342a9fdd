//! Grammar model: symbol and production arenas plus the [GrammarBuilder]
//! which normalizes user rules into a canonical production set.

mod builder;


use crate::error::GrammarError;
use crate::recognizer::{CustomRecognizerFn, RegexFlags};
use crate::symbol::{Assoc, Symbol, SymbolId, DEFAULT_PRIORITY};
use once_cell::unsync::OnceCell;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::fmt::Write;
use std::hash::{Hash, Hasher};

pub use builder::GrammarBuilder;

/// Index of a production in the production arena.
#[derive(
    Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ProdId(pub(crate) usize);

impl ProdId {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Multiplicity of a right hand side reference.
pub enum Multiplicity {
    One,
    Optional,
    OneOrMore,
    ZeroOrMore,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A by-name reference to a grammar symbol inside an alternative, possibly
/// carrying a multiplicity suffix and a separator.
pub struct SymRef {
    pub name: String,
    pub multiplicity: Multiplicity,
    pub separator: Option<String>,
}

#[derive(Debug, Clone)]
/// One alternative of a rule: an ordered reference list plus the conflict
/// resolution attributes of the resulting production.
pub struct Alt {
    pub refs: Vec<SymRef>,
    pub assoc: Assoc,
    pub priority: u32,
    pub nops: bool,
    pub nopse: bool,
}

#[derive(Clone)]
/// Terminal declaration handed to the builder.
pub struct TermSpec {
    pub(crate) kind: TermKind,
    pub(crate) priority: u32,
    pub(crate) prefer: bool,
    pub(crate) finish: Option<bool>,
    pub(crate) dynamic: bool,
}

#[derive(Clone)]
pub(crate) enum TermKind {
    String(String),
    Regex(String),
    External,
}

#[derive(Debug, Clone, Copy)]
/// Grammar wide options applied while building recognizers.
pub struct GrammarOptions {
    pub ignore_case: bool,
    pub re_flags: RegexFlags,
    pub debug: bool,
}

impl Default for GrammarOptions {
    fn default() -> Self {
        Self {
            ignore_case: false,
            re_flags: RegexFlags::default(),
            debug: false,
        }
    }
}

/// A production of the normalized grammar.
pub struct Production {
    pub id: ProdId,
    pub symbol: SymbolId,
    pub rhs: Vec<SymbolId>,
    pub assoc: Assoc,
    pub priority: u32,
    pub nops: bool,
    pub nopse: bool,
    /// Zero based ordinal of this alternative within its left hand symbol.
    pub alt_idx: usize,
}

/// A normalized, immutable grammar: the symbol arena, the globally numbered
/// production list and the augmented start/layout anchors.
pub struct Grammar {
    pub(crate) symbols: Vec<Symbol>,
    pub(crate) productions: Vec<Production>,
    pub(crate) by_name: HashMap<String, SymbolId>,
    /// The synthesized `__start` nonterminal.
    pub(crate) start: SymbolId,
    /// The production `__layout_start: LAYOUT STOP`, when LAYOUT is declared.
    pub(crate) layout_prod: Option<ProdId>,
    pub(crate) options: GrammarOptions,
    fingerprint: OnceCell<u64>,
}

impl Grammar {
    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.0]
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn production(&self, id: ProdId) -> &Production {
        &self.productions[id.0]
    }

    pub fn productions(&self) -> &[Production] {
        &self.productions
    }

    pub fn name_of(&self, id: SymbolId) -> &str {
        &self.symbols[id.0].name
    }

    /// The synthesized start nonterminal (`__start`).
    pub fn start_symbol(&self) -> SymbolId {
        self.start
    }

    pub fn layout_production(&self) -> Option<ProdId> {
        self.layout_prod
    }

    pub fn options(&self) -> &GrammarOptions {
        &self.options
    }

    pub fn get_symbol(&self, name: &str) -> Option<SymbolId> {
        self.by_name.get(name).copied()
    }

    /// Returns the terminal with the given name.
    pub fn get_terminal(&self, name: &str) -> Option<SymbolId> {
        self.get_symbol(name)
            .filter(|id| self.symbol(*id).is_terminal())
    }

    /// Returns the nonterminal with the given name.
    pub fn get_nonterminal(&self, name: &str) -> Option<SymbolId> {
        self.get_symbol(name)
            .filter(|id| self.symbol(*id).is_nonterminal())
    }

    /// Number of alternative productions of a nonterminal.
    pub fn alternatives_of(&self, id: SymbolId) -> usize {
        self.symbol(id).productions.len()
    }

    /// Renders a production as `lhs = rhs ...`, the form used in conflict
    /// reports and debug output.
    pub fn production_str(&self, id: ProdId) -> String {
        let production = self.production(id);
        if production.rhs.is_empty() {
            format!("{} = <EMPTY>", self.name_of(production.symbol))
        } else {
            format!(
                "{} = {}",
                self.name_of(production.symbol),
                production
                    .rhs
                    .iter()
                    .map(|id| self.name_of(*id))
                    .collect::<Vec<_>>()
                    .join(" ")
            )
        }
    }

    pub fn write_productions(&self, writer: &mut dyn Write) -> std::fmt::Result {
        for production in &self.productions {
            writeln!(
                writer,
                "{}: {}",
                production.id.0,
                self.production_str(production.id)
            )?;
        }
        Ok(())
    }

    pub fn to_grammar_string(&self) -> Result<String, std::fmt::Error> {
        let mut writer = String::new();
        self.write_productions(&mut writer)?;
        Ok(writer)
    }

    /// A stable hash of the normalized grammar: the symbol table with
    /// recognizer signatures and flags, the production list and the grammar
    /// options. Symbols enter by name, sorted, so an already normalized
    /// grammar re-built from its own productions fingerprints identically.
    /// Used to key the persisted table cache.
    pub fn fingerprint(&self) -> u64 {
        *self.fingerprint.get_or_init(|| {
            let mut hasher = DefaultHasher::new();
            self.options.ignore_case.hash(&mut hasher);
            self.options.re_flags.multi_line.hash(&mut hasher);
            self.options.re_flags.dot_matches_new_line.hash(&mut hasher);

            let mut descriptors: Vec<String> = self
                .symbols
                .iter()
                .map(|symbol| {
                    format!(
                        "{}:{}:{}:{}:{}:{}:{}",
                        symbol.name,
                        symbol.is_terminal(),
                        symbol.priority,
                        symbol.prefer,
                        symbol.dynamic,
                        symbol.keyword,
                        symbol
                            .recognizer
                            .as_ref()
                            .map(|recognizer| recognizer.signature())
                            .unwrap_or_default(),
                    )
                })
                .collect();
            descriptors.sort();
            descriptors.hash(&mut hasher);

            for production in &self.productions {
                self.name_of(production.symbol).hash(&mut hasher);
                for id in &production.rhs {
                    self.name_of(*id).hash(&mut hasher);
                }
                production.assoc.hash(&mut hasher);
                production.priority.hash(&mut hasher);
                production.nops.hash(&mut hasher);
                production.nopse.hash(&mut hasher);
            }
            hasher.finish()
        })
    }

    pub(crate) fn new(
        symbols: Vec<Symbol>,
        productions: Vec<Production>,
        by_name: HashMap<String, SymbolId>,
        start: SymbolId,
        layout_prod: Option<ProdId>,
        options: GrammarOptions,
    ) -> Self {
        Self {
            symbols,
            productions,
            by_name,
            start,
            layout_prod,
            options,
            fingerprint: OnceCell::new(),
        }
    }
}

impl SymRef {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            multiplicity: Multiplicity::One,
            separator: None,
        }
    }

    pub fn with_multiplicity(mut self, multiplicity: Multiplicity) -> Self {
        self.multiplicity = multiplicity;
        self
    }

    pub fn with_separator(mut self, separator: &str) -> Self {
        self.separator = Some(separator.to_string());
        self
    }

    /// Parses the reference sugar: `X`, `X?`, `X*`, `X+`, `X*[sep]`,
    /// `X+[sep]`. A bare punctuation name such as `+` stays a plain
    /// reference.
    pub fn parse(reference: &str) -> Self {
        let (body, separator) = match reference.strip_suffix(']') {
            Some(stripped) => match stripped.rfind('[') {
                Some(open) => (&stripped[..open], Some(stripped[open + 1..].to_string())),
                None => (reference, None),
            },
            None => (reference, None),
        };
        let (name, multiplicity) = match body.char_indices().last() {
            Some((last, '?')) if last > 0 => (&body[..last], Multiplicity::Optional),
            Some((last, '*')) if last > 0 => (&body[..last], Multiplicity::ZeroOrMore),
            Some((last, '+')) if last > 0 => (&body[..last], Multiplicity::OneOrMore),
            _ => (body, Multiplicity::One),
        };
        Self {
            name: name.to_string(),
            multiplicity,
            separator,
        }
    }

    /// The name of the nonterminal synthesized for this reference.
    pub(crate) fn multiplicity_name(&self) -> String {
        multiplicity_name(&self.name, self.multiplicity, self.separator.as_deref())
    }
}

pub(crate) fn multiplicity_name(
    name: &str,
    multiplicity: Multiplicity,
    separator: Option<&str>,
) -> String {
    let tag = match multiplicity {
        Multiplicity::One => return name.to_string(),
        Multiplicity::Optional => "opt",
        Multiplicity::OneOrMore => "1",
        Multiplicity::ZeroOrMore => "0",
    };
    match separator {
        Some(separator) => format!("{}_{}_{}", name, tag, separator),
        None => format!("{}_{}", name, tag),
    }
}

impl From<&str> for SymRef {
    fn from(reference: &str) -> Self {
        SymRef::parse(reference)
    }
}

impl Alt {
    pub fn new<I, R>(refs: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<SymRef>,
    {
        Self {
            refs: refs.into_iter().map(Into::into).collect(),
            assoc: Assoc::None,
            priority: DEFAULT_PRIORITY,
            nops: false,
            nopse: false,
        }
    }

    pub fn left(mut self) -> Self {
        self.assoc = Assoc::Left;
        self
    }

    pub fn right(mut self) -> Self {
        self.assoc = Assoc::Right;
        self
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    pub fn nops(mut self) -> Self {
        self.nops = true;
        self
    }

    pub fn nopse(mut self) -> Self {
        self.nopse = true;
        self
    }
}

impl<'r> From<Vec<&'r str>> for Alt {
    fn from(refs: Vec<&'r str>) -> Self {
        Alt::new(refs)
    }
}

impl<'r> From<&[&'r str]> for Alt {
    fn from(refs: &[&'r str]) -> Self {
        Alt::new(refs.iter().copied())
    }
}

impl<'r, const N: usize> From<[&'r str; N]> for Alt {
    fn from(refs: [&'r str; N]) -> Self {
        Alt::new(refs)
    }
}

impl TermSpec {
    pub fn string(value: &str) -> Self {
        Self {
            kind: TermKind::String(value.to_string()),
            priority: DEFAULT_PRIORITY,
            prefer: false,
            finish: None,
            dynamic: false,
        }
    }

    pub fn regex(pattern: &str) -> Self {
        Self {
            kind: TermKind::Regex(pattern.to_string()),
            priority: DEFAULT_PRIORITY,
            prefer: false,
            finish: None,
            dynamic: false,
        }
    }

    /// A terminal without a declared recognizer; one must be supplied via
    /// [GrammarBuilder::recognizer].
    pub fn external() -> Self {
        Self {
            kind: TermKind::External,
            priority: DEFAULT_PRIORITY,
            prefer: false,
            finish: None,
            dynamic: false,
        }
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    pub fn prefer(mut self) -> Self {
        self.prefer = true;
        self
    }

    pub fn finish(mut self, finish: bool) -> Self {
        self.finish = Some(finish);
        self
    }

    pub fn dynamic(mut self) -> Self {
        self.dynamic = true;
        self
    }
}

/// Convenience constructor mirroring the plain production/terminal mapping
/// interface: nonterminal alternatives given as reference name lists and
/// terminals as `(kind, value)` specs.
pub fn check_symbol_name(name: &str) -> Result<(), GrammarError> {
    if crate::symbol::RESERVED_SYMBOL_NAMES.contains(&name) {
        return Err(GrammarError::new(format!(
            "Rule name \"{}\" is reserved.",
            name
        )));
    }
    if name.contains('.') {
        return Err(GrammarError::new(format!(
            "Using dot in name \"{}\" is not allowed.",
            name
        )));
    }
    Ok(())
}

pub(crate) type Recognizers = HashMap<String, CustomRecognizerFn>;
