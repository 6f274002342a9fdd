use super::{
    check_symbol_name, multiplicity_name, Alt, Grammar, GrammarOptions, Multiplicity, ProdId,
    Production, Recognizers, SymRef, TermKind, TermSpec,
};
use crate::error::GrammarError;
use crate::recognizer::{CustomRecognizerFn, Recognizer, RegexFlags};
use crate::symbol::{
    Symbol, SymbolId, SymbolKind, AUGMENTED_NAME, INTERNAL_START_NAME, KEYWORD_NAME, LAYOUT_NAME,
};
use std::collections::HashMap;

/// Assembles a [Grammar] from programmatic rule and terminal declarations.
///
/// Rules map a nonterminal name to its alternatives; each alternative is an
/// ordered list of references (`"X"`, `"X?"`, `"X*[sep]"`, ...). Building
/// collects and unifies symbols, desugars multiplicities into synthesized
/// nonterminals, resolves every reference in two passes, prepends the
/// augmented start production and enumerates the result.
///
/// # Example
/// ```
/// use lang_lr::{GrammarBuilder, TermSpec};
///
/// let (grammar, start) = GrammarBuilder::new()
///     .rule("List", [vec!["Item+[comma]"]])
///     .rule("Item", [vec!["word"]])
///     .terminal("word", TermSpec::regex(r"\w+"))
///     .terminal("comma", TermSpec::string(","))
///     .start("List")
///     .build()
///     .unwrap();
/// assert_eq!(start, "__start");
/// assert!(grammar.get_nonterminal("Item_1_comma").is_some());
/// ```
pub struct GrammarBuilder {
    rules: Vec<(String, Vec<Alt>)>,
    terminals: Vec<(String, TermSpec)>,
    start: Option<String>,
    recognizers: Recognizers,
    action_names: HashMap<String, String>,
    options: GrammarOptions,
}

struct RawProd {
    lhs: SymbolId,
    refs: Vec<SymRef>,
    resolved: Vec<Option<SymbolId>>,
    assoc: crate::symbol::Assoc,
    priority: u32,
    nops: bool,
    nopse: bool,
}

impl RawProd {
    fn new(lhs: SymbolId, alt: Alt) -> Self {
        let resolved = vec![None; alt.refs.len()];
        Self {
            lhs,
            refs: alt.refs,
            resolved,
            assoc: alt.assoc,
            priority: alt.priority,
            nops: alt.nops,
            nopse: alt.nopse,
        }
    }
}

impl GrammarBuilder {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            terminals: Vec::new(),
            start: None,
            recognizers: HashMap::new(),
            action_names: HashMap::new(),
            options: GrammarOptions::default(),
        }
    }

    /// Declare a nonterminal rule. Multiple declarations of the same name are
    /// unified into one symbol with the alternatives appended.
    pub fn rule<I, A>(mut self, name: &str, alternatives: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Alt>,
    {
        let alternatives: Vec<Alt> = alternatives.into_iter().map(Into::into).collect();
        match self.rules.iter_mut().find(|(rule, _)| rule == name) {
            Some((_, existing)) => existing.extend(alternatives),
            None => self.rules.push((name.to_string(), alternatives)),
        }
        self
    }

    pub fn terminal(mut self, name: &str, spec: TermSpec) -> Self {
        self.terminals.push((name.to_string(), spec));
        self
    }

    pub fn start(mut self, name: &str) -> Self {
        self.start = Some(name.to_string());
        self
    }

    /// Supply a recognizer for an `external` terminal (or override a declared
    /// one).
    pub fn recognizer(mut self, name: &str, callable: CustomRecognizerFn) -> Self {
        self.recognizers.insert(name.to_string(), callable);
        self
    }

    /// Attach an action name to a symbol, resolved against the action
    /// registry and the built-in actions when the parser is constructed.
    pub fn bind_action(mut self, symbol: &str, action: &str) -> Self {
        self.action_names
            .insert(symbol.to_string(), action.to_string());
        self
    }

    pub fn ignore_case(mut self, ignore_case: bool) -> Self {
        self.options.ignore_case = ignore_case;
        self
    }

    pub fn re_flags(mut self, re_flags: RegexFlags) -> Self {
        self.options.re_flags = re_flags;
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.options.debug = debug;
        self
    }

    /// Normalize and freeze the grammar. Returns the grammar together with
    /// the name of the synthesized start nonterminal.
    pub fn build(self) -> Result<(Grammar, String), GrammarError> {
        let GrammarBuilder {
            rules,
            terminals,
            start,
            recognizers,
            action_names,
            options,
        } = self;

        let mut symbols: Vec<Symbol> = Vec::new();
        let mut by_name: HashMap<String, SymbolId> = HashMap::new();

        let add_symbol =
            |symbols: &mut Vec<Symbol>, by_name: &mut HashMap<String, SymbolId>, symbol: Symbol| {
                let id = SymbolId(symbols.len());
                by_name.insert(symbol.name.clone(), id);
                symbols.push(symbol);
                id
            };

        // Reserved sentinels at fixed arena slots.
        add_symbol(
            &mut symbols,
            &mut by_name,
            Symbol::terminal("EMPTY", Some(Recognizer::Empty)),
        );
        add_symbol(
            &mut symbols,
            &mut by_name,
            Symbol::terminal("EOF", Some(Recognizer::Eof)),
        );
        add_symbol(
            &mut symbols,
            &mut by_name,
            Symbol::terminal("STOP", Some(Recognizer::Stop)),
        );
        let augmented = SymbolId(symbols.len());
        symbols.push(Symbol::nonterminal(AUGMENTED_NAME));

        // Terminals: check name uniqueness in both name and string
        // recognition value.
        let mut by_string_rec: HashMap<String, String> = HashMap::new();
        for (name, spec) in &terminals {
            check_symbol_name(name)?;
            if by_name.contains_key(name) {
                return Err(GrammarError::new(format!(
                    "Multiple definitions of terminal rule \"{}\".",
                    name
                )));
            }
            let recognizer = match &spec.kind {
                TermKind::String(value) => {
                    if let Some(existing) = by_string_rec.get(value) {
                        return Err(GrammarError::new(format!(
                            "Terminals \"{}\" and \"{}\" match the same string.",
                            name, existing
                        )));
                    }
                    by_string_rec.insert(value.clone(), name.clone());
                    Some(Recognizer::string(value, options.ignore_case))
                }
                TermKind::Regex(pattern) => Some(Recognizer::regex(
                    pattern,
                    options.re_flags,
                    options.ignore_case,
                )?),
                TermKind::External => None,
            };
            let mut symbol = Symbol::terminal(name, recognizer);
            symbol.priority = spec.priority;
            symbol.prefer = spec.prefer;
            symbol.finish = spec.finish;
            symbol.dynamic = spec.dynamic;
            add_symbol(&mut symbols, &mut by_name, symbol);
        }

        // Nonterminals.
        for (name, _) in &rules {
            check_symbol_name(name)?;
            if let Some(existing) = by_name.get(name) {
                if symbols[existing.0].is_terminal() {
                    return Err(GrammarError::new(format!(
                        "Rule \"{}\" already defined as terminal.",
                        name
                    )));
                }
            }
            add_symbol(&mut symbols, &mut by_name, Symbol::nonterminal(name));
        }

        // Start symbol and augmentation.
        let start_name = start.ok_or_else(|| {
            GrammarError::new("Grammar start symbol is not provided.".to_string())
        })?;
        if by_name.get(&start_name).is_none() {
            return Err(GrammarError::new(format!(
                "Undefined start symbol \"{}\".",
                start_name
            )));
        }
        let internal_start = add_symbol(
            &mut symbols,
            &mut by_name,
            Symbol::nonterminal(INTERNAL_START_NAME),
        );

        let mut raw: Vec<RawProd> = Vec::new();
        raw.push(RawProd::new(
            augmented,
            Alt::new([INTERNAL_START_NAME, "STOP"]),
        ));
        raw.push(RawProd::new(
            internal_start,
            Alt::new([start_name.as_str(), "EOF"]),
        ));
        for (name, alternatives) in rules {
            let lhs = by_name[&name];
            for alt in alternatives {
                raw.push(RawProd::new(lhs, alt));
            }
        }

        // Two pass resolution so that references to symbols synthesized for
        // multiplicities (e.g. an explicit `Item_1_comma`) resolve as well.
        for first_pass in [true, false] {
            let mut index = 0;
            while index < raw.len() {
                for ref_idx in 0..raw[index].refs.len() {
                    if raw[index].resolved[ref_idx].is_some() {
                        continue;
                    }
                    let reference = raw[index].refs[ref_idx].clone();
                    let resolved = resolve_ref(
                        &reference,
                        first_pass,
                        &mut symbols,
                        &mut by_name,
                        &mut raw,
                    )?;
                    raw[index].resolved[ref_idx] = resolved;
                }
                index += 1;
            }
        }

        // Assemble the production arena; EMPTY references are dropped so an
        // EMPTY-only alternative becomes the empty production.
        let mut productions: Vec<Production> = Vec::new();
        let mut alt_counters: HashMap<SymbolId, usize> = HashMap::new();
        for prod in raw {
            let rhs: Vec<SymbolId> = prod
                .resolved
                .into_iter()
                .map(|id| id.expect("unresolved reference after second pass"))
                .filter(|id| *id != crate::symbol::EMPTY)
                .collect();
            let id = ProdId(productions.len());
            let alt_idx = *alt_counters
                .entry(prod.lhs)
                .and_modify(|count| *count += 1)
                .or_insert(0);
            symbols[prod.lhs.0].productions.push(id);
            productions.push(Production {
                id,
                symbol: prod.lhs,
                rhs,
                assoc: prod.assoc,
                priority: prod.priority,
                nops: prod.nops,
                nopse: prod.nopse,
                alt_idx,
            });
        }

        // Secondary start anchor for the layout sub-grammar.
        let mut layout_prod = None;
        if let Some(layout) = by_name.get(LAYOUT_NAME).copied() {
            if symbols[layout.0].is_nonterminal() {
                let layout_start = add_symbol(
                    &mut symbols,
                    &mut by_name,
                    Symbol::nonterminal("__layout_start"),
                );
                let id = ProdId(productions.len());
                symbols[layout_start.0].productions.push(id);
                productions.push(Production {
                    id,
                    symbol: layout_start,
                    rhs: vec![layout, crate::symbol::STOP],
                    assoc: crate::symbol::Assoc::None,
                    priority: crate::symbol::DEFAULT_PRIORITY,
                    nops: false,
                    nopse: false,
                    alt_idx: 0,
                });
                layout_prod = Some(id);
            }
        }

        // Bound action names may target synthesized symbols as well, so they
        // are applied once the symbol set is complete.
        for (name, action) in &action_names {
            match by_name.get(name) {
                Some(id) => symbols[id.0].action_name = Some(action.clone()),
                None => {
                    return Err(GrammarError::new(format!(
                        "Action \"{}\" given for unknown symbol \"{}\".",
                        action, name
                    )))
                }
            }
        }

        fix_keyword_terminals(&mut symbols, &by_name, &options)?;
        connect_recognizers(&mut symbols, &by_name, recognizers)?;

        let grammar = Grammar::new(
            symbols,
            productions,
            by_name,
            internal_start,
            layout_prod,
            options,
        );
        if grammar.options.debug {
            println!("*** GRAMMAR ***");
            print!("{}", grammar.to_grammar_string().unwrap_or_default());
        }
        Ok((grammar, INTERNAL_START_NAME.to_string()))
    }
}

impl Default for GrammarBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn resolve_ref(
    reference: &SymRef,
    first_pass: bool,
    symbols: &mut Vec<Symbol>,
    by_name: &mut HashMap<String, SymbolId>,
    raw: &mut Vec<RawProd>,
) -> Result<Option<SymbolId>, GrammarError> {
    let base = match by_name.get(&reference.name).copied() {
        Some(id) => id,
        None => {
            if first_pass {
                return Ok(None);
            }
            return Err(GrammarError::new(format!(
                "Reference to undefined symbol \"{}\".",
                reference.name
            )));
        }
    };

    if reference.multiplicity == Multiplicity::One {
        return Ok(Some(base));
    }

    if reference.multiplicity == Multiplicity::Optional && reference.separator.is_some() {
        return Err(GrammarError::new(format!(
            "Repetition modifier not allowed for optional (?) for symbol \"{}\".",
            reference.name
        )));
    }

    if let Some(separator) = &reference.separator {
        if by_name.get(separator).is_none() {
            if first_pass {
                return Ok(None);
            }
            return Err(GrammarError::new(format!(
                "Reference to undefined symbol \"{}\".",
                separator
            )));
        }
    }

    let target_name = reference.multiplicity_name();
    if let Some(existing) = by_name.get(&target_name).copied() {
        return Ok(Some(existing));
    }
    Ok(Some(make_multiplicity_symbol(
        reference, symbols, by_name, raw,
    )))
}

/// Creates the nonterminals for `?`, `+` and `*` references together with
/// their canonical productions and built-in action bindings.
fn make_multiplicity_symbol(
    reference: &SymRef,
    symbols: &mut Vec<Symbol>,
    by_name: &mut HashMap<String, SymbolId>,
    raw: &mut Vec<RawProd>,
) -> SymbolId {
    let separator = reference.separator.as_deref();
    let add = |symbols: &mut Vec<Symbol>,
               by_name: &mut HashMap<String, SymbolId>,
               name: String,
               action: &str| {
        let id = SymbolId(symbols.len());
        let mut symbol = Symbol::nonterminal(&name);
        symbol.action_name = Some(action.to_string());
        by_name.insert(name, id);
        symbols.push(symbol);
        id
    };

    match reference.multiplicity {
        Multiplicity::Optional => {
            let name = multiplicity_name(&reference.name, Multiplicity::Optional, None);
            let id = add(symbols, by_name, name, "optional");
            raw.push(RawProd::new(id, Alt::new([reference.name.as_str()])));
            raw.push(RawProd::new(id, Alt::new(["EMPTY"])));
            id
        }
        Multiplicity::OneOrMore | Multiplicity::ZeroOrMore => {
            let one_name = multiplicity_name(&reference.name, Multiplicity::OneOrMore, separator);
            let one = match by_name.get(&one_name).copied() {
                Some(existing) => existing,
                None => {
                    let action = if separator.is_some() {
                        "collect_sep"
                    } else {
                        "collect"
                    };
                    let id = add(symbols, by_name, one_name.clone(), action);
                    match separator {
                        Some(separator) => raw.push(RawProd::new(
                            id,
                            Alt::new([one_name.as_str(), separator, reference.name.as_str()]),
                        )),
                        None => raw.push(RawProd::new(
                            id,
                            Alt::new([one_name.as_str(), reference.name.as_str()]),
                        )),
                    }
                    raw.push(RawProd::new(id, Alt::new([reference.name.as_str()])));
                    id
                }
            };
            if reference.multiplicity == Multiplicity::OneOrMore {
                return one;
            }
            let zero_name = multiplicity_name(&reference.name, Multiplicity::ZeroOrMore, separator);
            let zero = add(symbols, by_name, zero_name.clone(), "collect_or_empty");
            raw.push(RawProd::new(zero, Alt::new([one_name.as_str()])));
            // The empty alternative opts out of the prefer-shifts strategy.
            raw.push(RawProd::new(zero, Alt::new(["EMPTY"]).nops()));
            zero
        }
        Multiplicity::One => unreachable!("plain references are resolved directly"),
    }
}

/// If a KEYWORD terminal with a regex recognizer is declared, every string
/// recognizer whose literal fully matches the KEYWORD pattern is rewritten to
/// a word-boundary regex and flagged as a keyword.
fn fix_keyword_terminals(
    symbols: &mut [Symbol],
    by_name: &HashMap<String, SymbolId>,
    options: &GrammarOptions,
) -> Result<(), GrammarError> {
    let keyword = match by_name.get(KEYWORD_NAME) {
        Some(id) if symbols[id.0].is_terminal() => *id,
        _ => return Ok(()),
    };
    let keyword_rec = match &symbols[keyword.0].recognizer {
        Some(recognizer @ Recognizer::Pattern { .. }) => recognizer.clone(),
        _ => {
            return Err(GrammarError::new(
                "KEYWORD rule must have a regex recognizer defined.".to_string(),
            ))
        }
    };

    for symbol in symbols.iter_mut() {
        if !symbol.is_terminal() {
            continue;
        }
        let (literal, ignore_case) = match &symbol.recognizer {
            Some(Recognizer::StringMatch { value, ignore_case }) => {
                (value.clone(), *ignore_case)
            }
            _ => continue,
        };
        if keyword_rec.recognize(&literal, 0).as_deref() == Some(literal.as_str()) {
            symbol.recognizer = Some(Recognizer::regex(
                &format!(r"\b{}\b", regex::escape(&literal)),
                options.re_flags,
                ignore_case,
            )?);
            symbol.keyword = true;
        }
    }
    Ok(())
}

/// Connect user supplied recognizers, overriding declared ones, and verify
/// that every terminal ends up with a recognizer.
fn connect_recognizers(
    symbols: &mut [Symbol],
    by_name: &HashMap<String, SymbolId>,
    recognizers: Recognizers,
) -> Result<(), GrammarError> {
    for (name, callable) in recognizers {
        let id = match by_name.get(&name) {
            Some(id) => *id,
            None => {
                return Err(GrammarError::new(format!(
                    "Recognizer given for unknown terminal \"{}\".",
                    name
                )))
            }
        };
        if !symbols[id.0].is_terminal() {
            return Err(GrammarError::new(format!(
                "Recognizer given for non-terminal \"{}\".",
                name
            )));
        }
        symbols[id.0].recognizer = Some(Recognizer::custom(&name, callable));
    }

    for symbol in symbols.iter() {
        if symbol.kind == SymbolKind::Terminal && symbol.recognizer.is_none() {
            return Err(GrammarError::new(format!(
                "Terminal \"{}\" has no recognizer defined.",
                symbol.name
            )));
        }
    }
    Ok(())
}
