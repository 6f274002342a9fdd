//! LR automaton and parse table construction: canonical item set collection
//! (SLR, or LALR through LR(1) items with Pager style state compression),
//! conflict resolution and the action/GOTO tables driving both parsers.

pub mod cache;


use crate::analysis::Analysis;
use crate::error::{Conflict, ParserInitError};
use crate::grammar::{Grammar, ProdId};
use crate::symbol::{Assoc, SymbolId, STOP};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::fmt::Write;

#[derive(
    Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct StateId(pub(crate) usize);

impl StateId {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(
    Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
/// An LR item: a production with a dot position. Lookaheads are kept aside in
/// the item set maps.
pub struct Item {
    pub production: ProdId,
    pub dot: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableAction {
    Shift(StateId),
    Reduce(ProdId),
    Accept,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableKind {
    Slr,
    Lalr,
}

type ItemSet = BTreeMap<Item, BTreeSet<SymbolId>>;

/// One state of the automaton: kernel for identity, closure for debugging,
/// and the resolved action/GOTO rows.
pub struct LrState {
    pub id: StateId,
    pub kernel: Vec<(Item, Vec<SymbolId>)>,
    pub closure: Vec<(Item, Vec<SymbolId>)>,
    pub actions: HashMap<SymbolId, Vec<TableAction>>,
    pub gotos: HashMap<SymbolId, StateId>,
    /// Terminals that may legally appear in this state, in scan order
    /// (priority, then string matches, then arena order).
    pub expected: Vec<SymbolId>,
    /// Terminals whose match short-circuits scanning in this state.
    pub finish: BTreeSet<SymbolId>,
}

pub struct LrTable {
    pub kind: TableKind,
    pub states: Vec<LrState>,
}

pub(crate) struct TableSettings {
    pub kind: TableKind,
    pub prefer_shifts: bool,
    pub prefer_shifts_over_empty: bool,
    /// A deterministic table reports residual conflicts as errors; a GLR
    /// table keeps all remaining actions.
    pub deterministic: bool,
}

impl LrTable {
    pub fn state(&self, id: StateId) -> &LrState {
        &self.states[id.0]
    }

    pub fn start_state(&self) -> StateId {
        StateId(0)
    }

    /// Renders every state with kernel and closure items, actions and gotos.
    pub fn to_debug_string(&self, grammar: &Grammar) -> String {
        let mut out = String::new();
        for state in &self.states {
            let _ = writeln!(out, "State {}", state.id.0);
            for (item, lookaheads) in &state.closure {
                let production = grammar.production(item.production);
                let mut rhs: Vec<&str> =
                    production.rhs.iter().map(|id| grammar.name_of(*id)).collect();
                rhs.insert(item.dot.min(rhs.len()), ".");
                let _ = writeln!(
                    out,
                    "    {} = {} {{{}}}",
                    grammar.name_of(production.symbol),
                    rhs.join(" "),
                    lookaheads
                        .iter()
                        .map(|id| grammar.name_of(*id))
                        .collect::<Vec<_>>()
                        .join(", ")
                );
            }
            for (symbol, actions) in &state.actions {
                for action in actions {
                    let _ = writeln!(
                        out,
                        "    on {} -> {:?}",
                        grammar.name_of(*symbol),
                        action
                    );
                }
            }
            for (symbol, target) in &state.gotos {
                let _ = writeln!(out, "    goto {} -> {}", grammar.name_of(*symbol), target.0);
            }
        }
        out
    }
}

struct StateBuild {
    kernel: ItemSet,
    transitions: BTreeMap<SymbolId, StateId>,
}

/// Builds the automaton anchored at `start_prod` (the augmented start or the
/// layout start production).
pub(crate) fn build_table(
    grammar: &Grammar,
    analysis: &Analysis,
    start_prod: ProdId,
    settings: &TableSettings,
) -> Result<LrTable, ParserInitError> {
    analysis.check_productive(grammar)?;

    let lalr = settings.kind == TableKind::Lalr;

    let mut start_kernel: ItemSet = BTreeMap::new();
    let mut start_la = BTreeSet::new();
    start_la.insert(crate::symbol::EOF);
    start_kernel.insert(
        Item {
            production: start_prod,
            dot: 0,
        },
        start_la,
    );

    let mut states: Vec<StateBuild> = vec![StateBuild {
        kernel: start_kernel,
        transitions: BTreeMap::new(),
    }];
    let mut by_core: HashMap<Vec<Item>, Vec<usize>> = HashMap::new();
    by_core.insert(core_of(&states[0].kernel), vec![0]);

    let mut worklist: VecDeque<usize> = VecDeque::new();
    worklist.push_back(0);
    let mut queued = vec![true];

    while let Some(current) = worklist.pop_front() {
        queued[current] = false;
        let closure = close(grammar, analysis, &states[current].kernel, lalr);

        // Partition closure items by the symbol after the dot.
        let mut goto_kernels: BTreeMap<SymbolId, ItemSet> = BTreeMap::new();
        for (item, lookaheads) in &closure {
            let production = grammar.production(item.production);
            if item.dot >= production.rhs.len() {
                continue;
            }
            let next = production.rhs[item.dot];
            goto_kernels
                .entry(next)
                .or_default()
                .entry(Item {
                    production: item.production,
                    dot: item.dot + 1,
                })
                .or_default()
                .extend(lookaheads.iter().copied());
        }

        for (symbol, kernel) in goto_kernels {
            if let Some(target) = states[current].transitions.get(&symbol).copied() {
                // Known transition: only propagate lookahead growth.
                if lalr && merge_lookaheads(&mut states[target.0].kernel, &kernel) {
                    if !queued[target.0] {
                        worklist.push_back(target.0);
                        queued[target.0] = true;
                    }
                }
                continue;
            }

            let core = core_of(&kernel);
            let mut target: Option<usize> = None;
            if let Some(candidates) = by_core.get(&core) {
                for candidate in candidates {
                    if !lalr || compatible(&states[*candidate].kernel, &kernel) {
                        target = Some(*candidate);
                        break;
                    }
                }
            }

            let target = match target {
                Some(found) => {
                    if merge_lookaheads(&mut states[found].kernel, &kernel) && !queued[found] {
                        worklist.push_back(found);
                        queued[found] = true;
                    }
                    found
                }
                None => {
                    let id = states.len();
                    by_core.entry(core).or_default().push(id);
                    states.push(StateBuild {
                        kernel,
                        transitions: BTreeMap::new(),
                    });
                    queued.push(true);
                    worklist.push_back(id);
                    id
                }
            };
            states[current]
                .transitions
                .insert(symbol, StateId(target));
        }
    }

    assemble(grammar, analysis, start_prod, settings, states)
}

/// LR closure: items `[A -> a . B b, L]` spawn `[B -> . g, FIRST(b L)]` for
/// every production of B, to fixed point. In SLR mode lookaheads stay empty.
fn close(grammar: &Grammar, analysis: &Analysis, kernel: &ItemSet, lalr: bool) -> ItemSet {
    let mut closure: ItemSet = kernel.clone();
    let mut worklist: VecDeque<Item> = closure.keys().copied().collect();

    while let Some(item) = worklist.pop_front() {
        let production = grammar.production(item.production);
        if item.dot >= production.rhs.len() {
            continue;
        }
        let next = production.rhs[item.dot];
        if !grammar.symbol(next).is_nonterminal() {
            continue;
        }
        let lookaheads = if lalr {
            analysis.first_of(&production.rhs[item.dot + 1..], &closure[&item])
        } else {
            BTreeSet::new()
        };
        for alternative in &grammar.symbol(next).productions {
            let new_item = Item {
                production: *alternative,
                dot: 0,
            };
            let is_new = !closure.contains_key(&new_item);
            let entry = closure.entry(new_item).or_default();
            let before = entry.len();
            entry.extend(lookaheads.iter().copied());
            if is_new || entry.len() != before {
                worklist.push_back(new_item);
            }
        }
    }
    closure
}

fn core_of(kernel: &ItemSet) -> Vec<Item> {
    kernel.keys().copied().collect()
}

fn merge_lookaheads(into: &mut ItemSet, from: &ItemSet) -> bool {
    let mut changed = false;
    for (item, lookaheads) in from {
        let entry = into.entry(*item).or_default();
        let before = entry.len();
        entry.extend(lookaheads.iter().copied());
        changed |= entry.len() != before;
    }
    changed
}

/// Pager's weak compatibility test on two same-core kernels: merging is
/// refused when it would cross-join lookaheads of items that are disjoint in
/// both originals, which is what introduces spurious reduce/reduce conflicts.
fn compatible(existing: &ItemSet, incoming: &ItemSet) -> bool {
    let items: Vec<&Item> = existing.keys().collect();
    for (index, left) in items.iter().enumerate() {
        for right in &items[index + 1..] {
            let e_left = &existing[*left];
            let e_right = &existing[*right];
            let i_left = &incoming[*left];
            let i_right = &incoming[*right];
            let cross = !e_left.is_disjoint(i_right) || !e_right.is_disjoint(i_left);
            if cross && e_left.is_disjoint(e_right) && i_left.is_disjoint(i_right) {
                return false;
            }
        }
    }
    true
}

fn assemble(
    grammar: &Grammar,
    analysis: &Analysis,
    start_prod: ProdId,
    settings: &TableSettings,
    builds: Vec<StateBuild>,
) -> Result<LrTable, ParserInitError> {
    let lalr = settings.kind == TableKind::Lalr;
    let mut lr_states: Vec<LrState> = Vec::with_capacity(builds.len());
    let mut sr_conflicts: Vec<Conflict> = Vec::new();
    let mut rr_conflicts: Vec<Conflict> = Vec::new();

    for (index, build) in builds.iter().enumerate() {
        let closure = close(grammar, analysis, &build.kernel, lalr);

        let mut raw_actions: BTreeMap<SymbolId, Vec<TableAction>> = BTreeMap::new();
        let mut gotos: HashMap<SymbolId, StateId> = HashMap::new();

        for (item, lookaheads) in &closure {
            let production = grammar.production(item.production);
            if item.dot < production.rhs.len() {
                let next = production.rhs[item.dot];
                if grammar.symbol(next).is_terminal() {
                    let action = if item.production == start_prod && next == STOP {
                        TableAction::Accept
                    } else {
                        TableAction::Shift(build.transitions[&next])
                    };
                    let row = raw_actions.entry(next).or_default();
                    if !row.contains(&action) {
                        row.push(action);
                    }
                } else {
                    gotos.insert(next, build.transitions[&next]);
                }
            } else {
                if item.production == start_prod {
                    continue;
                }
                let reduce_on: Vec<SymbolId> = if lalr {
                    lookaheads.iter().copied().collect()
                } else {
                    analysis.follow(production.symbol).iter().copied().collect()
                };
                for terminal in reduce_on {
                    let row = raw_actions.entry(terminal).or_default();
                    let action = TableAction::Reduce(item.production);
                    if !row.contains(&action) {
                        row.push(action);
                    }
                }
            }
        }

        let mut actions: HashMap<SymbolId, Vec<TableAction>> = HashMap::new();
        for (terminal, row) in raw_actions {
            let resolved = resolve_row(
                grammar,
                settings,
                index,
                terminal,
                row,
                &mut sr_conflicts,
                &mut rr_conflicts,
            );
            if !resolved.is_empty() {
                actions.insert(terminal, resolved);
            }
        }

        let mut expected: Vec<SymbolId> = actions.keys().copied().collect();
        expected.sort_by_key(|id| {
            let symbol = grammar.symbol(*id);
            (
                std::cmp::Reverse(symbol.priority),
                !symbol.is_specific_match(),
                id.index(),
            )
        });

        let mut finish: BTreeSet<SymbolId> = BTreeSet::new();
        for id in &expected {
            if grammar.symbol(*id).finish == Some(true) {
                finish.insert(*id);
            }
        }
        if expected.len() == 1 && grammar.symbol(expected[0]).finish != Some(false) {
            finish.insert(expected[0]);
        }

        lr_states.push(LrState {
            id: StateId(index),
            kernel: build
                .kernel
                .iter()
                .map(|(item, la)| (*item, la.iter().copied().collect()))
                .collect(),
            closure: closure
                .iter()
                .map(|(item, la)| (*item, la.iter().copied().collect()))
                .collect(),
            actions,
            gotos,
            expected,
            finish,
        });
    }

    if settings.deterministic {
        if !sr_conflicts.is_empty() {
            return Err(ParserInitError::SrConflicts(sr_conflicts));
        }
        if !rr_conflicts.is_empty() {
            return Err(ParserInitError::RrConflicts(rr_conflicts));
        }
    }

    Ok(LrTable {
        kind: settings.kind,
        states: lr_states,
    })
}

/// Applies the disambiguation ladder to one (state, terminal) action row:
/// operator priorities, associativity, prefer-shifts, prefer-shifts over
/// empty reductions. Whatever remains ambiguous is recorded as a conflict.
fn resolve_row(
    grammar: &Grammar,
    settings: &TableSettings,
    state: usize,
    terminal: SymbolId,
    row: Vec<TableAction>,
    sr_conflicts: &mut Vec<Conflict>,
    rr_conflicts: &mut Vec<Conflict>,
) -> Vec<TableAction> {
    let mut shift: Option<TableAction> = None;
    let mut reduces: Vec<ProdId> = Vec::new();
    for action in row {
        match action {
            TableAction::Shift(_) | TableAction::Accept => shift = Some(action),
            TableAction::Reduce(production) => reduces.push(production),
        }
    }

    let terminal_priority = grammar.symbol(terminal).priority;

    if shift.is_some() {
        let mut kept: Vec<ProdId> = Vec::new();
        for reduce in reduces {
            let production = grammar.production(reduce);
            if production.priority > terminal_priority {
                shift = None;
                kept.push(reduce);
            } else if production.priority < terminal_priority {
                // shift wins, drop the reduction
            } else {
                match production.assoc {
                    Assoc::Left => {
                        shift = None;
                        kept.push(reduce);
                    }
                    Assoc::Right => {}
                    Assoc::None => kept.push(reduce),
                }
            }
        }
        reduces = kept;
    }

    if shift.is_some() && !reduces.is_empty() && settings.prefer_shifts {
        reduces.retain(|reduce| grammar.production(*reduce).nops);
    }
    if shift.is_some() && !reduces.is_empty() && settings.prefer_shifts_over_empty {
        reduces.retain(|reduce| {
            let production = grammar.production(*reduce);
            !production.rhs.is_empty() || production.nopse
        });
    }

    if let Some(shift_action) = shift {
        for reduce in &reduces {
            sr_conflicts.push(Conflict::new(
                state,
                grammar.name_of(terminal).to_string(),
                format!(
                    "Shift/Reduce conflict: shift \"{}\" or reduce by \"{}\".",
                    grammar.name_of(terminal),
                    grammar.production_str(*reduce)
                ),
            ));
        }
        let mut resolved = vec![shift_action];
        resolved.extend(reduces.into_iter().map(TableAction::Reduce));
        resolved
    } else {
        if reduces.len() > 1 {
            let rendered = reduces
                .iter()
                .map(|reduce| format!("\"{}\"", grammar.production_str(*reduce)))
                .collect::<Vec<_>>()
                .join(" and ");
            rr_conflicts.push(Conflict::new(
                state,
                grammar.name_of(terminal).to_string(),
                format!("Reduce/Reduce conflict between {}.", rendered),
            ));
        }
        reduces.into_iter().map(TableAction::Reduce).collect()
    }
}
