//! Fixed point computation of the NULLABLE, FIRST and FOLLOW sets used by
//! the table builder.

use crate::error::GrammarError;
use crate::grammar::Grammar;
use crate::symbol::SymbolId;
use std::collections::BTreeSet;

pub struct Analysis {
    pub nullable: Vec<bool>,
    pub first: Vec<BTreeSet<SymbolId>>,
    pub follow: Vec<BTreeSet<SymbolId>>,
}

impl Analysis {
    pub fn compute(grammar: &Grammar) -> Self {
        let count = grammar.symbols().len();
        let mut nullable = vec![false; count];
        let mut first: Vec<BTreeSet<SymbolId>> = vec![BTreeSet::new(); count];
        let mut follow: Vec<BTreeSet<SymbolId>> = vec![BTreeSet::new(); count];

        for (index, symbol) in grammar.symbols().iter().enumerate() {
            if symbol.is_terminal() {
                first[index].insert(SymbolId(index));
            }
        }

        let mut changed = true;
        while changed {
            changed = false;
            for production in grammar.productions() {
                if !nullable[production.symbol.index()]
                    && production.rhs.iter().all(|id| nullable[id.index()])
                {
                    nullable[production.symbol.index()] = true;
                    changed = true;
                }
            }
        }

        changed = true;
        while changed {
            changed = false;
            for production in grammar.productions() {
                let lhs = production.symbol.index();
                for id in &production.rhs {
                    let additions: Vec<SymbolId> = first[id.index()]
                        .iter()
                        .copied()
                        .filter(|sym| !first[lhs].contains(sym))
                        .collect();
                    if !additions.is_empty() {
                        first[lhs].extend(additions);
                        changed = true;
                    }
                    if !nullable[id.index()] {
                        break;
                    }
                }
            }
        }

        changed = true;
        while changed {
            changed = false;
            for production in grammar.productions() {
                let lhs = production.symbol.index();
                for (position, id) in production.rhs.iter().enumerate() {
                    let mut tail_nullable = true;
                    let mut additions: BTreeSet<SymbolId> = BTreeSet::new();
                    for follower in &production.rhs[position + 1..] {
                        additions.extend(first[follower.index()].iter().copied());
                        if !nullable[follower.index()] {
                            tail_nullable = false;
                            break;
                        }
                    }
                    if tail_nullable {
                        additions.extend(follow[lhs].iter().copied());
                    }
                    let target = id.index();
                    let new: Vec<SymbolId> = additions
                        .into_iter()
                        .filter(|sym| !follow[target].contains(sym))
                        .collect();
                    if !new.is_empty() {
                        follow[target].extend(new);
                        changed = true;
                    }
                }
            }
        }

        Self {
            nullable,
            first,
            follow,
        }
    }

    pub fn is_nullable(&self, id: SymbolId) -> bool {
        self.nullable[id.index()]
    }

    pub fn first(&self, id: SymbolId) -> &BTreeSet<SymbolId> {
        &self.first[id.index()]
    }

    pub fn follow(&self, id: SymbolId) -> &BTreeSet<SymbolId> {
        &self.follow[id.index()]
    }

    /// FIRST of a sentential suffix followed by a lookahead tail. Used for
    /// LR(1) closure.
    pub fn first_of(&self, seq: &[SymbolId], tail: &BTreeSet<SymbolId>) -> BTreeSet<SymbolId> {
        let mut result = BTreeSet::new();
        for id in seq {
            result.extend(self.first[id.index()].iter().copied());
            if !self.nullable[id.index()] {
                return result;
            }
        }
        result.extend(tail.iter().copied());
        result
    }

    /// A nonterminal with an empty FIRST set that is not nullable can never
    /// derive a terminal string.
    pub fn check_productive(&self, grammar: &Grammar) -> Result<(), GrammarError> {
        for (index, symbol) in grammar.symbols().iter().enumerate() {
            if symbol.is_nonterminal() && self.first[index].is_empty() && !self.nullable[index] {
                return Err(GrammarError::new(format!(
                    "First set empty for grammar symbol \"{}\". \
                     An infinite recursion on the grammar symbol.",
                    symbol.name
                )));
            }
        }
        Ok(())
    }
}
