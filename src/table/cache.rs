//! Versioned on-disk cache for built LR tables, keyed by the fingerprint of
//! the normalized grammar. A record that fails any of the magic, version or
//! fingerprint checks is treated as absent so the table is rebuilt.

use super::{Item, LrState, LrTable, StateId, TableAction, TableKind};
use crate::grammar::Grammar;
use crate::symbol::SymbolId;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

pub const CACHE_MAGIC: &str = "LRPT";
pub const CACHE_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct CachedState {
    kernel: Vec<(Item, Vec<SymbolId>)>,
    closure: Vec<(Item, Vec<SymbolId>)>,
    actions: Vec<(SymbolId, Vec<TableAction>)>,
    gotos: Vec<(SymbolId, StateId)>,
    expected: Vec<SymbolId>,
    finish: Vec<SymbolId>,
}

#[derive(Serialize, Deserialize)]
struct CachedProduction {
    symbol: SymbolId,
    rhs_len: usize,
    alt_idx: usize,
}

#[derive(Serialize, Deserialize)]
struct CachedTable {
    magic: String,
    version: u32,
    kind: TableKind,
    fingerprint: u64,
    states: Vec<CachedState>,
    productions: Vec<CachedProduction>,
}

/// Persist a built table for the given grammar.
pub fn store_table(table: &LrTable, grammar: &Grammar, path: &Path) -> io::Result<()> {
    let record = CachedTable {
        magic: CACHE_MAGIC.to_string(),
        version: CACHE_VERSION,
        kind: table.kind,
        fingerprint: grammar.fingerprint(),
        states: table
            .states
            .iter()
            .map(|state| CachedState {
                kernel: state.kernel.clone(),
                closure: state.closure.clone(),
                actions: state
                    .actions
                    .iter()
                    .map(|(symbol, actions)| (*symbol, actions.clone()))
                    .collect(),
                gotos: state.gotos.iter().map(|(symbol, id)| (*symbol, *id)).collect(),
                expected: state.expected.clone(),
                finish: state.finish.iter().copied().collect(),
            })
            .collect(),
        productions: grammar
            .productions()
            .iter()
            .map(|production| CachedProduction {
                symbol: production.symbol,
                rhs_len: production.rhs.len(),
                alt_idx: production.alt_idx,
            })
            .collect(),
    };
    let payload = serde_json::to_string(&record)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
    fs::write(path, payload)
}

/// Load a cached table for the grammar. Returns `Ok(None)` when the cache is
/// missing, unreadable as a record, or stale for this grammar.
pub fn load_table(grammar: &Grammar, path: &Path) -> io::Result<Option<LrTable>> {
    let payload = match fs::read_to_string(path) {
        Ok(payload) => payload,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err),
    };
    let record: CachedTable = match serde_json::from_str(&payload) {
        Ok(record) => record,
        Err(_) => return Ok(None),
    };
    if record.magic != CACHE_MAGIC
        || record.version != CACHE_VERSION
        || record.fingerprint != grammar.fingerprint()
    {
        return Ok(None);
    }
    if record.productions.len() != grammar.productions().len()
        || record
            .productions
            .iter()
            .zip(grammar.productions())
            .any(|(cached, production)| {
                cached.symbol != production.symbol
                    || cached.rhs_len != production.rhs.len()
                    || cached.alt_idx != production.alt_idx
            })
    {
        return Ok(None);
    }

    let states = record
        .states
        .into_iter()
        .enumerate()
        .map(|(index, state)| LrState {
            id: StateId(index),
            kernel: state.kernel,
            closure: state.closure,
            actions: state.actions.into_iter().collect(),
            gotos: state.gotos.into_iter().collect(),
            expected: state.expected,
            finish: state.finish.into_iter().collect(),
        })
        .collect();

    Ok(Some(LrTable {
        kind: record.kind,
        states,
    }))
}
