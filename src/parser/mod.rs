//! The deterministic LR driver: a shift/reduce loop over the action/GOTO
//! table with semantic action dispatch, optional tree building and layout
//! handling through a secondary parser bound to the LAYOUT sub-grammar.

mod tree;

#[cfg(test)]
mod __tests__;

pub use tree::TreeNode;

use crate::actions::{
    resolve_actions, run_tree_actions, ActionRegistry, Dispatch, ProdDispatch, TermDispatch, Value,
};
use crate::analysis::Analysis;
use crate::error::{ParseError, ParserInitError, SyntaxError};
use crate::grammar::{Grammar, ProdId};
use crate::scanner::{CustomTokenRecognition, DynamicDisambiguation, Scanner, Token};
use crate::symbol::SymbolId;
use crate::table::{build_table, LrTable, StateId, TableAction, TableKind, TableSettings};
use crate::util::Code;
use std::collections::HashSet;
use std::rc::Rc;

/// The context handed to semantic actions. Positions and layout refer to the
/// symbol currently being shifted or reduced; `extra` is a user owned slot
/// threaded through the whole parse.
pub struct Context<U> {
    pub input: Rc<str>,
    pub symbol: Option<SymbolId>,
    pub production: Option<ProdId>,
    pub start_position: usize,
    pub end_position: usize,
    pub layout_content: String,
    pub extra: U,
    /// The current tree node when actions run over a built tree.
    pub node: Option<Rc<TreeNode>>,
}

impl<U: Default> Context<U> {
    pub fn new(input: &str) -> Self {
        Self {
            input: Rc::from(input),
            symbol: None,
            production: None,
            start_position: 0,
            end_position: 0,
            layout_content: String::new(),
            extra: U::default(),
            node: None,
        }
    }
}

/// Options for [Parser] and [GlrParser](crate::GlrParser) construction.
pub struct ParserOptions<U> {
    pub actions: ActionRegistry<U>,
    pub layout_actions: ActionRegistry<U>,
    pub build_tree: bool,
    pub call_actions_during_tree_build: bool,
    /// Defaults to on for the deterministic parser and off for GLR.
    pub prefer_shifts: Option<bool>,
    /// Defaults to on for the deterministic parser and off for GLR.
    pub prefer_shifts_over_empty: Option<bool>,
    pub tables: TableKind,
    /// Characters skipped between tokens when no LAYOUT nonterminal is
    /// declared. Set empty to disable implicit whitespace skipping.
    pub ws: String,
    pub custom_token_recognition: Option<CustomTokenRecognition>,
    pub dynamic_disambiguation: Option<DynamicDisambiguation>,
    /// GLR only: apply the lexical disambiguation ladder to scanned tokens.
    pub lexical_disambiguation: bool,
    pub debug: bool,
}

impl<U> Default for ParserOptions<U> {
    fn default() -> Self {
        Self {
            actions: ActionRegistry::new(),
            layout_actions: ActionRegistry::new(),
            build_tree: false,
            call_actions_during_tree_build: false,
            prefer_shifts: None,
            prefer_shifts_over_empty: None,
            tables: TableKind::Lalr,
            ws: " \t\n\r".to_string(),
            custom_token_recognition: None,
            dynamic_disambiguation: None,
            lexical_disambiguation: false,
            debug: false,
        }
    }
}

impl<U> ParserOptions<U> {
    pub fn actions(mut self, actions: ActionRegistry<U>) -> Self {
        self.actions = actions;
        self
    }

    pub fn layout_actions(mut self, actions: ActionRegistry<U>) -> Self {
        self.layout_actions = actions;
        self
    }

    pub fn build_tree(mut self, build_tree: bool) -> Self {
        self.build_tree = build_tree;
        self
    }

    pub fn call_actions_during_tree_build(mut self, call: bool) -> Self {
        self.call_actions_during_tree_build = call;
        self
    }

    pub fn prefer_shifts(mut self, prefer_shifts: bool) -> Self {
        self.prefer_shifts = Some(prefer_shifts);
        self
    }

    pub fn prefer_shifts_over_empty(mut self, prefer: bool) -> Self {
        self.prefer_shifts_over_empty = Some(prefer);
        self
    }

    pub fn tables(mut self, tables: TableKind) -> Self {
        self.tables = tables;
        self
    }

    pub fn ws(mut self, ws: &str) -> Self {
        self.ws = ws.to_string();
        self
    }

    pub fn custom_token_recognition(mut self, hook: CustomTokenRecognition) -> Self {
        self.custom_token_recognition = Some(hook);
        self
    }

    pub fn dynamic_disambiguation(mut self, hook: DynamicDisambiguation) -> Self {
        self.dynamic_disambiguation = Some(hook);
        self
    }

    pub fn lexical_disambiguation(mut self, enabled: bool) -> Self {
        self.lexical_disambiguation = enabled;
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

struct Frame {
    state: StateId,
    value: Value,
    node: Option<Rc<TreeNode>>,
    start: usize,
    end: usize,
    layout: String,
}

/// The deterministic LR parser: binds a grammar, its table, a scanner and
/// the resolved semantic actions.
pub struct Parser<U = ()> {
    grammar: Rc<Grammar>,
    table: Rc<LrTable>,
    scanner: Scanner,
    dispatch: Dispatch<U>,
    layout: Option<Box<Parser<U>>>,
    build_tree: bool,
    call_actions_during_tree_build: bool,
    ws: String,
    debug: bool,
    /// Set on the secondary parser consuming layout prefixes.
    layout_mode: bool,
}

impl<U: Default> Parser<U> {
    pub fn new(grammar: Rc<Grammar>) -> Result<Self, ParserInitError> {
        Self::with_options(grammar, ParserOptions::default())
    }

    pub fn with_options(
        grammar: Rc<Grammar>,
        options: ParserOptions<U>,
    ) -> Result<Self, ParserInitError> {
        let analysis = Analysis::compute(&grammar);
        let settings = TableSettings {
            kind: options.tables,
            prefer_shifts: options.prefer_shifts.unwrap_or(true),
            prefer_shifts_over_empty: options.prefer_shifts_over_empty.unwrap_or(true),
            deterministic: true,
        };
        let table = build_table(&grammar, &analysis, ProdId(0), &settings)?;
        let dispatch = resolve_actions(&grammar, &options.actions)?;

        let layout =
            make_layout_parser(&grammar, &analysis, options.tables, options.layout_actions)?;

        let mut scanner = Scanner::new(grammar.clone());
        scanner.custom = options.custom_token_recognition;
        scanner.dynamic = options.dynamic_disambiguation;

        if options.debug {
            let table_dump = table.to_debug_string(&grammar);
            println!("*** STATES ***");
            print!("{}", table_dump);
        }

        Ok(Self {
            grammar,
            table: Rc::new(table),
            scanner,
            dispatch,
            layout,
            build_tree: options.build_tree,
            call_actions_during_tree_build: options.call_actions_during_tree_build,
            ws: options.ws,
            debug: options.debug,
            layout_mode: false,
        })
    }

    pub fn grammar(&self) -> &Rc<Grammar> {
        &self.grammar
    }

    pub fn table(&self) -> &LrTable {
        &self.table
    }

    /// Parse the input and return the semantic value of the start symbol,
    /// or the built tree as a [Value::Node] in `build_tree` mode.
    pub fn parse(&self, input: &str) -> Result<Value, ParseError> {
        let mut context = Context::new(input);
        self.parse_with_context(input, &mut context)
    }

    /// Parse with a caller provided context, giving access to `extra` after
    /// the parse.
    pub fn parse_with_context(
        &self,
        input: &str,
        context: &mut Context<U>,
    ) -> Result<Value, ParseError> {
        let code = Code::new(input);
        let (value, _) = self.drive(&code, 0, context, self.build_tree)?;
        Ok(value)
    }

    /// Parse the input into a concrete tree regardless of the `build_tree`
    /// option.
    pub fn parse_tree(&self, input: &str) -> Result<Rc<TreeNode>, ParseError> {
        let code = Code::new(input);
        let mut context = Context::new(input);
        let (value, _) = self.drive(&code, 0, &mut context, true)?;
        match value {
            Value::Node(node) => Ok(node),
            _ => unreachable!("tree mode always produces a node"),
        }
    }

    /// Walk a built tree depth first and invoke the bound actions exactly as
    /// during a non-tree parse, restoring positions and layout from the node
    /// records.
    pub fn call_actions(&self, tree: &Rc<TreeNode>, context: &mut Context<U>) -> Value {
        run_tree_actions(&self.dispatch, tree, context)
    }

    fn apply_term_action(&self, symbol: SymbolId, context: &mut Context<U>, matched: &str) -> Value {
        match &self.dispatch.term[symbol.index()] {
            TermDispatch::Matched => Value::Str(matched.to_string()),
            TermDispatch::Nothing => Value::None,
            TermDispatch::User(action) => action(context, matched),
        }
    }

    fn apply_prod_action(
        &self,
        production: ProdId,
        context: &mut Context<U>,
        children: Vec<Value>,
    ) -> Value {
        match &self.dispatch.prod[production.index()] {
            ProdDispatch::Default => crate::actions::default_reduce(children),
            ProdDispatch::Builtin(builtin) => builtin.apply(children),
            ProdDispatch::User(action) => action(context, children),
        }
    }

    /// Layout sub-parse: the longest prefix the layout grammar derives at
    /// this position, or `None` when it derives nothing.
    pub(crate) fn parse_prefix(&self, code: &Code, position: usize) -> Option<usize> {
        let mut context = Context::new(code.value);
        match self.drive(code, position, &mut context, false) {
            Ok((_, end)) => Some(end),
            Err(_) => None,
        }
    }

    fn skip_layout(&self, code: &Code, position: usize) -> (String, usize) {
        if self.layout_mode {
            return (String::new(), position);
        }
        skip_layout_with(&self.layout, &self.ws, code, position)
    }

    pub(crate) fn drive(
        &self,
        code: &Code,
        start: usize,
        context: &mut Context<U>,
        build_tree: bool,
    ) -> Result<(Value, usize), ParseError> {
        let mut stack: Vec<Frame> = vec![Frame {
            state: self.table.start_state(),
            value: Value::None,
            node: None,
            start,
            end: start,
            layout: String::new(),
        }];
        let mut position = start;
        // Guards against non-advancing cycles through zero-length tokens.
        let mut empty_guard: HashSet<(usize, usize)> = HashSet::new();
        let mut layout_cache: Option<(usize, String, usize)> = None;

        loop {
            let state_id = stack.last().expect("stack is never empty").state;
            let state = self.table.state(state_id);

            let (layout, token_pos) = match &layout_cache {
                Some((at, layout, end)) if *at == position => (layout.clone(), *end),
                _ => {
                    let (layout, end) = self.skip_layout(code, position);
                    layout_cache = Some((position, layout.clone(), end));
                    (layout, end)
                }
            };

            let mut tokens = self.scanner.scan_tokens(code.value, token_pos, state);
            // Zero-length matches cannot make progress at the end of the
            // input, so the end markers take precedence there.
            if tokens.is_empty()
                || (token_pos == code.value.len() && tokens.iter().all(Token::is_empty))
            {
                let ends = self.scanner.end_tokens(code.value, token_pos, state);
                if !ends.is_empty() {
                    tokens = ends;
                }
            }
            if tokens.is_empty() {
                return Err(self.scanner.syntax_error(code, token_pos, &layout, state));
            }
            let token = self.scanner.disambiguate(code, token_pos, state, tokens)?;

            let action = match state.actions.get(&token.symbol) {
                Some(row) => row[0],
                None => {
                    return Err(self.scanner.syntax_error(code, token_pos, &layout, state))
                }
            };

            match action {
                TableAction::Accept => {
                    let top = stack.pop().expect("accept with an empty stack");
                    if self.debug {
                        println!("accept at {}", code.obtain_position(token_pos));
                    }
                    let value = if build_tree {
                        Value::Node(top.node.expect("tree mode frame without node"))
                    } else {
                        top.value
                    };
                    return Ok((value, token_pos));
                }
                TableAction::Shift(next) => {
                    if token.is_empty() {
                        if !empty_guard.insert((next.index(), token_pos)) {
                            return Err(ParseError::Syntax(SyntaxError {
                                position: token_pos,
                                location: code.obtain_position(token_pos),
                                layout_content: layout.clone(),
                                expected: state
                                    .expected
                                    .iter()
                                    .map(|id| self.grammar.name_of(*id).to_string())
                                    .collect(),
                                excerpt: code.context_excerpt(token_pos),
                            }));
                        }
                    } else {
                        empty_guard.clear();
                    }

                    if self.debug {
                        println!(
                            "shift {}[{:?}] at {}",
                            self.grammar.name_of(token.symbol),
                            token.value,
                            code.obtain_position(token.start)
                        );
                    }

                    context.symbol = Some(token.symbol);
                    context.production = None;
                    context.start_position = token.start;
                    context.end_position = token.end;
                    context.layout_content = layout.clone();
                    context.node = None;

                    let node = if build_tree {
                        Some(Rc::new(TreeNode::Term {
                            symbol: token.symbol,
                            name: self.grammar.name_of(token.symbol).to_string(),
                            value: token.value.clone(),
                            start: token.start,
                            end: token.end,
                            layout: layout.clone(),
                        }))
                    } else {
                        None
                    };
                    let value = if build_tree {
                        if self.call_actions_during_tree_build {
                            self.apply_term_action(token.symbol, context, &token.value);
                        }
                        Value::None
                    } else {
                        self.apply_term_action(token.symbol, context, &token.value)
                    };

                    stack.push(Frame {
                        state: next,
                        value,
                        node,
                        start: token.start,
                        end: token.end,
                        layout,
                    });
                    position = token.end;
                }
                TableAction::Reduce(prod_id) => {
                    let production = self.grammar.production(prod_id);
                    let count = production.rhs.len();
                    let frames = stack.split_off(stack.len() - count);
                    let (red_start, red_end, red_layout) = if count > 0 {
                        (
                            frames[0].start,
                            frames[count - 1].end,
                            frames[0].layout.clone(),
                        )
                    } else {
                        (token_pos, token_pos, String::new())
                    };

                    if self.debug {
                        println!("reduce by {}", self.grammar.production_str(prod_id));
                    }

                    context.symbol = Some(production.symbol);
                    context.production = Some(prod_id);
                    context.start_position = red_start;
                    context.end_position = red_end;
                    context.layout_content = red_layout.clone();
                    context.node = None;

                    let (value, node) = if build_tree {
                        let children: Vec<Rc<TreeNode>> = frames
                            .iter()
                            .map(|frame| {
                                frame
                                    .node
                                    .clone()
                                    .expect("tree mode frame without node")
                            })
                            .collect();
                        let node = Rc::new(TreeNode::NonTerm {
                            symbol: production.symbol,
                            name: self.grammar.name_of(production.symbol).to_string(),
                            production: prod_id,
                            children: children.clone(),
                            start: red_start,
                            end: red_end,
                            layout: red_layout.clone(),
                        });
                        if self.call_actions_during_tree_build {
                            context.node = Some(node.clone());
                            let child_values =
                                children.iter().map(|child| Value::Node(child.clone())).collect();
                            self.apply_prod_action(prod_id, context, child_values);
                            context.node = None;
                        }
                        (Value::None, Some(node))
                    } else {
                        let children: Vec<Value> =
                            frames.into_iter().map(|frame| frame.value).collect();
                        let value = self.apply_prod_action(prod_id, context, children);
                        (value, None)
                    };

                    let prev_state = stack.last().expect("reduce below stack bottom").state;
                    let goto = *self
                        .table
                        .state(prev_state)
                        .gotos
                        .get(&production.symbol)
                        .expect("GOTO must exist for a reduced nonterminal");
                    stack.push(Frame {
                        state: goto,
                        value,
                        node,
                        start: red_start,
                        end: red_end,
                        layout: red_layout,
                    });
                }
            }
        }
    }
}

/// Builds the secondary deterministic parser bound to the layout start
/// production, shared by both drivers.
pub(crate) fn make_layout_parser<U: Default>(
    grammar: &Rc<Grammar>,
    analysis: &Analysis,
    kind: TableKind,
    layout_actions: ActionRegistry<U>,
) -> Result<Option<Box<Parser<U>>>, ParserInitError> {
    let layout_prod = match grammar.layout_production() {
        Some(layout_prod) => layout_prod,
        None => return Ok(None),
    };
    let settings = TableSettings {
        kind,
        prefer_shifts: true,
        prefer_shifts_over_empty: true,
        deterministic: true,
    };
    let table = build_table(grammar, analysis, layout_prod, &settings)?;
    let dispatch = resolve_actions(grammar, &layout_actions)?;
    let mut scanner = Scanner::new(grammar.clone());
    scanner.stop_anywhere = true;
    Ok(Some(Box::new(Parser {
        grammar: grammar.clone(),
        table: Rc::new(table),
        scanner,
        dispatch,
        layout: None,
        build_tree: false,
        call_actions_during_tree_build: false,
        ws: String::new(),
        debug: false,
        layout_mode: true,
    })))
}

/// Consume layout at the given position: through the layout sub-parser when
/// one exists, otherwise by skipping the implicit whitespace characters.
pub(crate) fn skip_layout_with<U: Default>(
    layout: &Option<Box<Parser<U>>>,
    ws: &str,
    code: &Code,
    position: usize,
) -> (String, usize) {
    if let Some(layout_parser) = layout {
        return match layout_parser.parse_prefix(code, position) {
            Some(end) if end > position => (code.value[position..end].to_string(), end),
            _ => (String::new(), position),
        };
    }
    if ws.is_empty() {
        return (String::new(), position);
    }
    let mut end = position;
    for (offset, ch) in code.value[position..].char_indices() {
        if !ws.contains(ch) {
            break;
        }
        end = position + offset + ch.len_utf8();
    }
    (code.value[position..end].to_string(), end)
}
