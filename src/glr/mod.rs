//! Generalized LR driver: explores every viable derivation in parallel over
//! a graph structured stack and packs the results into a shared parse
//! forest.

mod forest;


pub use forest::{Forest, SppfAlternative, SppfNode};

use crate::actions::{resolve_actions, run_tree_actions, Dispatch, Value};
use crate::analysis::Analysis;
use crate::error::{ParseError, ParserInitError, SyntaxError};
use crate::grammar::{Grammar, ProdId};
use crate::parser::{make_layout_parser, skip_layout_with, Context, Parser, ParserOptions, TreeNode};
use crate::scanner::{Scanner, Token};
use crate::symbol::SymbolId;
use crate::table::{build_table, LrTable, StateId, TableAction, TableSettings};
use crate::util::Code;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::rc::Rc;

/// An edge of the graph structured stack; carries the forest node derived
/// for the symbol between the two stack tops.
struct GssEdge {
    target: usize,
    sppf: Rc<SppfNode>,
}

/// A vertex of the graph structured stack: an automaton state at an input
/// position. Vertices are unique per (position, state) so stacks share both
/// prefixes and suffixes.
struct GssNode {
    state: StateId,
    position: usize,
    edges: Vec<GssEdge>,
}

type ReductionWork = (usize, ProdId);

/// The generalized parser. Unlike [Parser] it tolerates conflicting tables:
/// every enabled action is followed, heads agreeing on (state, position) are
/// merged, and ambiguous derivations pack into one forest node.
pub struct GlrParser<U = ()> {
    grammar: Rc<Grammar>,
    table: Rc<LrTable>,
    scanner: Scanner,
    dispatch: Dispatch<U>,
    layout: Option<Box<Parser<U>>>,
    ws: String,
    lexical_disambiguation: bool,
    debug: bool,
}

impl<U: Default> GlrParser<U> {
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
            prefer_shifts: options.prefer_shifts.unwrap_or(false),
            prefer_shifts_over_empty: options.prefer_shifts_over_empty.unwrap_or(false),
            deterministic: false,
        };
        let table = build_table(&grammar, &analysis, ProdId(0), &settings)?;
        let dispatch = resolve_actions(&grammar, &options.actions)?;
        let layout =
            make_layout_parser(&grammar, &analysis, options.tables, options.layout_actions)?;

        let mut scanner = Scanner::new(grammar.clone());
        scanner.custom = options.custom_token_recognition;
        scanner.dynamic = options.dynamic_disambiguation;

        Ok(Self {
            grammar,
            table: Rc::new(table),
            scanner,
            dispatch,
            layout,
            ws: options.ws,
            lexical_disambiguation: options.lexical_disambiguation,
            debug: options.debug,
        })
    }

    pub fn grammar(&self) -> &Rc<Grammar> {
        &self.grammar
    }

    /// Parse the input into a shared packed parse forest.
    pub fn parse(&self, input: &str) -> Result<Forest, ParseError> {
        let code = Code::new(input);

        let mut nodes: Vec<GssNode> = vec![GssNode {
            state: self.table.start_state(),
            position: 0,
            edges: Vec::new(),
        }];
        let mut node_index: HashMap<(usize, StateId), usize> = HashMap::new();
        node_index.insert((0, self.table.start_state()), 0);

        let mut pending: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        pending.insert(0, vec![0]);

        let mut nt_cache: HashMap<(SymbolId, usize, usize), Rc<SppfNode>> = HashMap::new();
        let mut term_cache: HashMap<(SymbolId, usize, usize), Rc<SppfNode>> = HashMap::new();
        let mut results: Vec<Rc<SppfNode>> = Vec::new();

        let mut furthest_pos = 0usize;
        let mut furthest_expected: BTreeSet<String> = BTreeSet::new();
        let mut furthest_layout = String::new();

        while let Some((&position, _)) = pending.iter().next() {
            let batch = pending.remove(&position).unwrap_or_default();
            let (layout, token_pos) = skip_layout_with(&self.layout, &self.ws, &code, position);

            let mut tokens_cache: HashMap<StateId, Rc<Vec<Token>>> = HashMap::new();
            let mut active: Vec<usize> = Vec::new();
            for node in batch {
                if !active.contains(&node) {
                    active.push(node);
                }
            }

            // Reducer: all enabled reductions to fixed point. A new edge on
            // an existing vertex re-runs the frontier's reductions; the
            // forest drops derivations that are already packed.
            let mut queue: VecDeque<ReductionWork> = VecDeque::new();
            let mut done: HashSet<ReductionWork> = HashSet::new();
            for index in 0..active.len() {
                let node = active[index];
                let tokens = self.tokens_at(&code, token_pos, nodes[node].state, &mut tokens_cache);
                self.enqueue_reductions(&nodes, node, &tokens, &mut queue, &mut done);
            }

            while let Some((node, prod_id)) = queue.pop_front() {
                let production = self.grammar.production(prod_id);
                let count = production.rhs.len();
                for (children, end_node) in reduce_paths(&nodes, node, count) {
                    let target_state = match self
                        .table
                        .state(nodes[end_node].state)
                        .gotos
                        .get(&production.symbol)
                    {
                        Some(target) => *target,
                        None => continue,
                    };

                    let span_start = children
                        .first()
                        .map(|child| child.start())
                        .unwrap_or(nodes[end_node].position);
                    let span_end = children
                        .last()
                        .map(|child| child.end())
                        .unwrap_or(nodes[end_node].position);
                    let sppf = nt_cache
                        .entry((production.symbol, span_start, span_end))
                        .or_insert_with(|| {
                            Rc::new(SppfNode::NonTerm {
                                symbol: production.symbol,
                                name: self.grammar.name_of(production.symbol).to_string(),
                                start: span_start,
                                end: span_end,
                                alternatives: RefCell::new(Vec::new()),
                            })
                        })
                        .clone();
                    sppf.add_alternative(prod_id, children);

                    if self.debug {
                        println!(
                            "reduce by {} to state {} at {}",
                            self.grammar.production_str(prod_id),
                            target_state.index(),
                            position
                        );
                    }

                    let key = (position, target_state);
                    match node_index.get(&key).copied() {
                        None => {
                            let new_node = nodes.len();
                            nodes.push(GssNode {
                                state: target_state,
                                position,
                                edges: vec![GssEdge {
                                    target: end_node,
                                    sppf: sppf.clone(),
                                }],
                            });
                            node_index.insert(key, new_node);
                            active.push(new_node);
                            let tokens = self.tokens_at(
                                &code,
                                token_pos,
                                target_state,
                                &mut tokens_cache,
                            );
                            self.enqueue_reductions(
                                &nodes, new_node, &tokens, &mut queue, &mut done,
                            );
                        }
                        Some(existing) => {
                            let edge_exists = nodes[existing].edges.iter().any(|edge| {
                                edge.target == end_node && Rc::ptr_eq(&edge.sppf, &sppf)
                            });
                            if !edge_exists {
                                nodes[existing].edges.push(GssEdge {
                                    target: end_node,
                                    sppf: sppf.clone(),
                                });
                                if !active.contains(&existing) {
                                    active.push(existing);
                                }
                                // The new edge may extend pop paths of any
                                // head at this frontier, so the frontier's
                                // reductions run again; already packed
                                // derivations are dropped by the forest.
                                done.clear();
                                for index in 0..active.len() {
                                    let head = active[index];
                                    let tokens = self.tokens_at(
                                        &code,
                                        token_pos,
                                        nodes[head].state,
                                        &mut tokens_cache,
                                    );
                                    self.enqueue_reductions(
                                        &nodes, head, &tokens, &mut queue, &mut done,
                                    );
                                }
                            }
                        }
                    }
                }
            }

            // Shift phase: all heads advance on their viable tokens; heads
            // agreeing on the resulting (position, state) merge.
            for &node in &active {
                let state_id = nodes[node].state;
                let tokens = self.tokens_at(&code, token_pos, state_id, &mut tokens_cache);

                if token_pos > furthest_pos {
                    furthest_pos = token_pos;
                    furthest_expected.clear();
                    furthest_layout = layout.clone();
                }
                if token_pos == furthest_pos {
                    furthest_expected.extend(
                        self.table
                            .state(state_id)
                            .expected
                            .iter()
                            .map(|id| self.grammar.name_of(*id).to_string()),
                    );
                }

                for token in tokens.iter() {
                    let row = match self.table.state(state_id).actions.get(&token.symbol) {
                        Some(row) => row,
                        None => continue,
                    };
                    for action in row {
                        match action {
                            TableAction::Shift(target_state) => {
                                let term = term_cache
                                    .entry((token.symbol, token.start, token.end))
                                    .or_insert_with(|| {
                                        Rc::new(SppfNode::Term {
                                            symbol: token.symbol,
                                            name: self
                                                .grammar
                                                .name_of(token.symbol)
                                                .to_string(),
                                            value: token.value.clone(),
                                            start: token.start,
                                            end: token.end,
                                            layout: layout.clone(),
                                        })
                                    })
                                    .clone();
                                if self.debug {
                                    println!(
                                        "shift {}[{:?}] to state {}",
                                        self.grammar.name_of(token.symbol),
                                        token.value,
                                        target_state.index()
                                    );
                                }
                                let key = (token.end, *target_state);
                                match node_index.get(&key).copied() {
                                    None => {
                                        let new_node = nodes.len();
                                        nodes.push(GssNode {
                                            state: *target_state,
                                            position: token.end,
                                            edges: vec![GssEdge {
                                                target: node,
                                                sppf: term,
                                            }],
                                        });
                                        node_index.insert(key, new_node);
                                        let slot = pending.entry(token.end).or_default();
                                        slot.push(new_node);
                                    }
                                    Some(existing) => {
                                        let edge_exists =
                                            nodes[existing].edges.iter().any(|edge| {
                                                edge.target == node
                                                    && Rc::ptr_eq(&edge.sppf, &term)
                                            });
                                        if !edge_exists {
                                            nodes[existing].edges.push(GssEdge {
                                                target: node,
                                                sppf: term,
                                            });
                                            let slot = pending.entry(token.end).or_default();
                                            if !slot.contains(&existing) {
                                                slot.push(existing);
                                            }
                                        }
                                    }
                                }
                            }
                            TableAction::Accept => {
                                for edge in &nodes[node].edges {
                                    if !results
                                        .iter()
                                        .any(|root| Rc::ptr_eq(root, &edge.sppf))
                                    {
                                        results.push(edge.sppf.clone());
                                    }
                                }
                            }
                            TableAction::Reduce(_) => {}
                        }
                    }
                }
            }
        }

        if results.is_empty() {
            return Err(ParseError::Syntax(SyntaxError {
                position: furthest_pos,
                location: code.obtain_position(furthest_pos),
                layout_content: furthest_layout,
                expected: furthest_expected.into_iter().collect(),
                excerpt: code.context_excerpt(furthest_pos),
            }));
        }
        Ok(Forest { roots: results })
    }

    /// Parse and enumerate up to `limit` distinct trees.
    pub fn parse_trees(&self, input: &str, limit: usize) -> Result<Vec<Rc<TreeNode>>, ParseError> {
        Ok(self.parse(input)?.trees(limit))
    }

    /// Parse and evaluate the bound actions over every distinct derivation,
    /// in the order trees are enumerated from the forest.
    pub fn parse_values(&self, input: &str) -> Result<Vec<Value>, ParseError> {
        let forest = self.parse(input)?;
        let values = forest
            .trees(usize::MAX)
            .iter()
            .map(|tree| {
                let mut context = Context::new(input);
                run_tree_actions(&self.dispatch, tree, &mut context)
            })
            .collect();
        Ok(values)
    }

    fn tokens_at(
        &self,
        code: &Code,
        token_pos: usize,
        state_id: StateId,
        cache: &mut HashMap<StateId, Rc<Vec<Token>>>,
    ) -> Rc<Vec<Token>> {
        if let Some(tokens) = cache.get(&state_id) {
            return tokens.clone();
        }
        let state = self.table.state(state_id);
        let mut tokens = self.scanner.scan_tokens(code.value, token_pos, state);
        if self.lexical_disambiguation {
            tokens = self.scanner.lexical_filter(tokens);
            // End markers are fed to a head only when nothing else matches.
            if tokens.is_empty() {
                tokens.extend(self.scanner.end_tokens(code.value, token_pos, state));
            }
        } else {
            tokens.extend(self.scanner.end_tokens(code.value, token_pos, state));
        }
        let tokens = Rc::new(tokens);
        cache.insert(state_id, tokens.clone());
        tokens
    }

    fn enqueue_reductions(
        &self,
        nodes: &[GssNode],
        node: usize,
        tokens: &[Token],
        queue: &mut VecDeque<ReductionWork>,
        done: &mut HashSet<ReductionWork>,
    ) {
        let state = self.table.state(nodes[node].state);
        for token in tokens {
            let row = match state.actions.get(&token.symbol) {
                Some(row) => row,
                None => continue,
            };
            for action in row {
                if let TableAction::Reduce(prod_id) = action {
                    let work = (node, *prod_id);
                    if done.insert(work) {
                        queue.push_back(work);
                    }
                }
            }
        }
    }
}

/// All pop paths of the given length starting at `from`. Returns the
/// collected child forest nodes in grammar order together with the vertex
/// below the popped frames.
fn reduce_paths(nodes: &[GssNode], from: usize, len: usize) -> Vec<(Vec<Rc<SppfNode>>, usize)> {
    if len == 0 {
        return vec![(Vec::new(), from)];
    }
    let mut paths = Vec::new();
    for edge_index in 0..nodes[from].edges.len() {
        let target = nodes[from].edges[edge_index].target;
        let sppf = nodes[from].edges[edge_index].sppf.clone();
        for (mut children, end_node) in reduce_paths(nodes, target, len - 1) {
            children.push(sppf.clone());
            paths.push((children, end_node));
        }
    }
    paths
}
