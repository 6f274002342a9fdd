//! Semantic values and actions: the dynamic [Value] produced by parses, the
//! built-in reduction actions bound during multiplicity desugaring, and the
//! name-keyed registry users supply to the parsers.

use crate::error::ParserInitError;
use crate::grammar::Grammar;
use crate::parser::{Context, TreeNode};
use crate::symbol::{SymbolKind, EMPTY, EOF, STOP};
use std::any::Any;
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::rc::Rc;

#[derive(Clone)]
/// A dynamically typed semantic value.
///
/// Default actions produce `Str` for terminals, `List` for nonterminals and
/// `None` for the reserved symbols; user actions may return anything,
/// including an opaque `Ext` payload.
pub enum Value {
    None,
    Str(String),
    Num(f64),
    Bool(bool),
    List(Vec<Value>),
    Node(Rc<TreeNode>),
    Ext(Rc<dyn Any>),
}

impl Value {
    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn as_num(&self) -> Option<f64> {
        match self {
            Value::Num(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<&Rc<TreeNode>> {
        match self {
            Value::Node(node) => Some(node),
            _ => None,
        }
    }

    /// Coerces into a list: lists pass through, `None` becomes empty and any
    /// other value becomes a singleton.
    pub fn into_list(self) -> Vec<Value> {
        match self {
            Value::List(values) => values,
            Value::None => Vec::new(),
            other => vec![other],
        }
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Str(value) => write!(f, "{:?}", value),
            Value::Num(value) => write!(f, "{}", value),
            Value::Bool(value) => write!(f, "{}", value),
            Value::List(values) => f.debug_list().entries(values).finish(),
            Value::Node(node) => write!(f, "Node({})", node.name()),
            Value::Ext(_) => write!(f, "Ext(..)"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Str(left), Value::Str(right)) => left == right,
            (Value::Num(left), Value::Num(right)) => left == right,
            (Value::Bool(left), Value::Bool(right)) => left == right,
            (Value::List(left), Value::List(right)) => left == right,
            (Value::Node(left), Value::Node(right)) => Rc::ptr_eq(left, right),
            (Value::Ext(left), Value::Ext(right)) => Rc::ptr_eq(left, right),
            _ => false,
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Num(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(values: Vec<Value>) -> Self {
        Value::List(values)
    }
}

/// Reduction action bound to a nonterminal: receives the parse context and
/// the semantic values of the right hand side.
pub type ProdActionFn<U> = Rc<dyn Fn(&mut Context<U>, Vec<Value>) -> Value>;
/// Action bound to a terminal: receives the parse context and the matched
/// string.
pub type TermActionFn<U> = Rc<dyn Fn(&mut Context<U>, &str) -> Value>;

/// A user supplied action for one symbol name.
pub enum Action<U> {
    NonTerm(ProdActionFn<U>),
    /// One action per alternative, indexed by the production's alternative
    /// ordinal. The length must match the alternative count.
    PerAlternative(Vec<ProdActionFn<U>>),
    Term(TermActionFn<U>),
}

impl<U> Action<U> {
    pub fn nonterm<F>(action: F) -> Self
    where
        F: Fn(&mut Context<U>, Vec<Value>) -> Value + 'static,
    {
        Action::NonTerm(Rc::new(action))
    }

    pub fn per_alternative(actions: Vec<ProdActionFn<U>>) -> Self {
        Action::PerAlternative(actions)
    }

    pub fn term<F>(action: F) -> Self
    where
        F: Fn(&mut Context<U>, &str) -> Value + 'static,
    {
        Action::Term(Rc::new(action))
    }
}

/// Wraps a plain closure as one entry of a [Action::PerAlternative] list.
pub fn alt<U, F>(action: F) -> ProdActionFn<U>
where
    F: Fn(&mut Context<U>, Vec<Value>) -> Value + 'static,
{
    Rc::new(action)
}

pub type ActionRegistry<U> = HashMap<String, Action<U>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// The common actions resolvable by name, used both by the desugared
/// multiplicity productions and directly from user grammars.
pub enum BuiltinAction {
    Collect,
    CollectOptional,
    CollectSep,
    CollectSepOptional,
    CollectRight,
    CollectRightOptional,
    CollectRightSep,
    CollectRightSepOptional,
    /// `X_0`: pass the inner collected list or produce the empty list.
    CollectOrEmpty,
    Optional,
    PassSingle,
    PassInner,
    PassNone,
}

pub fn builtin_by_name(name: &str) -> Option<BuiltinAction> {
    Some(match name {
        "collect" => BuiltinAction::Collect,
        "collect_optional" => BuiltinAction::CollectOptional,
        "collect_sep" => BuiltinAction::CollectSep,
        "collect_sep_optional" => BuiltinAction::CollectSepOptional,
        "collect_right" => BuiltinAction::CollectRight,
        "collect_right_optional" => BuiltinAction::CollectRightOptional,
        "collect_right_sep" => BuiltinAction::CollectRightSep,
        "collect_right_sep_optional" => BuiltinAction::CollectRightSepOptional,
        "collect_or_empty" => BuiltinAction::CollectOrEmpty,
        "optional" => BuiltinAction::Optional,
        "pass_single" => BuiltinAction::PassSingle,
        "pass_inner" => BuiltinAction::PassInner,
        "pass_none" => BuiltinAction::PassNone,
        _ => return None,
    })
}

impl BuiltinAction {
    /// The collect family dispatches on arity, so one action serves both
    /// alternatives of its desugared rule.
    pub fn apply(&self, children: Vec<Value>) -> Value {
        let arity = children.len();
        let mut children = children.into_iter();
        match self {
            BuiltinAction::Collect | BuiltinAction::CollectOptional => match arity {
                2 => {
                    let mut list = children.next().unwrap().into_list();
                    list.push(children.next().unwrap());
                    Value::List(list)
                }
                1 => Value::List(vec![children.next().unwrap()]),
                _ => Value::List(Vec::new()),
            },
            BuiltinAction::CollectSep | BuiltinAction::CollectSepOptional => match arity {
                3 => {
                    let mut list = children.next().unwrap().into_list();
                    let _separator = children.next();
                    list.push(children.next().unwrap());
                    Value::List(list)
                }
                1 => Value::List(vec![children.next().unwrap()]),
                _ => Value::List(Vec::new()),
            },
            BuiltinAction::CollectRight | BuiltinAction::CollectRightOptional => match arity {
                2 => {
                    let head = children.next().unwrap();
                    let mut list = vec![head];
                    list.extend(children.next().unwrap().into_list());
                    Value::List(list)
                }
                1 => Value::List(vec![children.next().unwrap()]),
                _ => Value::List(Vec::new()),
            },
            BuiltinAction::CollectRightSep | BuiltinAction::CollectRightSepOptional => {
                match arity {
                    3 => {
                        let head = children.next().unwrap();
                        let _separator = children.next();
                        let mut list = vec![head];
                        list.extend(children.next().unwrap().into_list());
                        Value::List(list)
                    }
                    1 => Value::List(vec![children.next().unwrap()]),
                    _ => Value::List(Vec::new()),
                }
            }
            BuiltinAction::CollectOrEmpty => match arity {
                1 => children.next().unwrap(),
                _ => Value::List(Vec::new()),
            },
            BuiltinAction::Optional => match arity {
                1 => children.next().unwrap(),
                _ => Value::None,
            },
            BuiltinAction::PassSingle => children.next().unwrap_or(Value::None),
            BuiltinAction::PassInner => match arity {
                0 => Value::None,
                1 => children.next().unwrap(),
                _ => children.nth(1).unwrap(),
            },
            BuiltinAction::PassNone => Value::None,
        }
    }
}

/// Action bound to one production after registry resolution.
pub(crate) enum ProdDispatch<U> {
    /// A single child passes through; anything else becomes a list of the
    /// child values.
    Default,
    Builtin(BuiltinAction),
    User(ProdActionFn<U>),
}

impl<U> Clone for ProdDispatch<U> {
    fn clone(&self) -> Self {
        match self {
            ProdDispatch::Default => ProdDispatch::Default,
            ProdDispatch::Builtin(builtin) => ProdDispatch::Builtin(*builtin),
            ProdDispatch::User(action) => ProdDispatch::User(action.clone()),
        }
    }
}

/// Action bound to one terminal after registry resolution.
pub(crate) enum TermDispatch<U> {
    /// The matched string.
    Matched,
    /// Reserved symbols produce no value.
    Nothing,
    User(TermActionFn<U>),
}

impl<U> Clone for TermDispatch<U> {
    fn clone(&self) -> Self {
        match self {
            TermDispatch::Matched => TermDispatch::Matched,
            TermDispatch::Nothing => TermDispatch::Nothing,
            TermDispatch::User(action) => TermDispatch::User(action.clone()),
        }
    }
}

/// Per-production and per-terminal action tables resolved once at parser
/// construction.
pub(crate) struct Dispatch<U> {
    pub prod: Vec<ProdDispatch<U>>,
    pub term: Vec<TermDispatch<U>>,
}

impl<U> Clone for Dispatch<U> {
    fn clone(&self) -> Self {
        Self {
            prod: self.prod.clone(),
            term: self.term.clone(),
        }
    }
}

/// The reduction behavior of symbols with no bound action.
pub(crate) fn default_reduce(mut children: Vec<Value>) -> Value {
    if children.len() == 1 {
        children.pop().unwrap()
    } else {
        Value::List(children)
    }
}

/// Applies the resolved actions over a built tree, depth first, restoring
/// positions and layout from the node records. Used by `call_actions` on the
/// deterministic parser and for evaluating enumerated GLR trees.
pub(crate) fn run_tree_actions<U>(
    dispatch: &Dispatch<U>,
    tree: &Rc<TreeNode>,
    context: &mut Context<U>,
) -> Value {
    match &**tree {
        TreeNode::Term {
            symbol,
            value,
            start,
            end,
            layout,
            ..
        } => {
            context.symbol = Some(*symbol);
            context.production = None;
            context.start_position = *start;
            context.end_position = *end;
            context.layout_content = layout.clone();
            context.node = Some(tree.clone());
            match &dispatch.term[symbol.index()] {
                TermDispatch::Matched => Value::Str(value.clone()),
                TermDispatch::Nothing => Value::None,
                TermDispatch::User(action) => action(context, value),
            }
        }
        TreeNode::NonTerm {
            symbol,
            production,
            children,
            start,
            end,
            layout,
            ..
        } => {
            let values: Vec<Value> = children
                .iter()
                .map(|child| run_tree_actions(dispatch, child, context))
                .collect();
            context.symbol = Some(*symbol);
            context.production = Some(*production);
            context.start_position = *start;
            context.end_position = *end;
            context.layout_content = layout.clone();
            context.node = Some(tree.clone());
            match &dispatch.prod[production.index()] {
                ProdDispatch::Default => default_reduce(values),
                ProdDispatch::Builtin(builtin) => builtin.apply(values),
                ProdDispatch::User(action) => action(context, values),
            }
        }
    }
}

/// Resolves actions per symbol, most specific source first: a registry entry
/// under the symbol name, then a registry entry under the symbol's action
/// name, then the built-in actions by action name.
pub(crate) fn resolve_actions<U>(
    grammar: &Grammar,
    registry: &ActionRegistry<U>,
) -> Result<Dispatch<U>, ParserInitError> {
    let mut prod: Vec<ProdDispatch<U>> = vec![ProdDispatch::Default; grammar.productions().len()];
    let mut term: Vec<TermDispatch<U>> = vec![TermDispatch::Matched; grammar.symbols().len()];

    for (index, symbol) in grammar.symbols().iter().enumerate() {
        let id = crate::symbol::SymbolId(index);
        if symbol.kind == SymbolKind::Terminal {
            if id == EMPTY || id == EOF || id == STOP {
                term[index] = TermDispatch::Nothing;
            }
            let entry = registry
                .get(&symbol.name)
                .or_else(|| symbol.action_name.as_ref().and_then(|name| registry.get(name)));
            match entry {
                Some(Action::Term(action)) => term[index] = TermDispatch::User(action.clone()),
                Some(Action::PerAlternative(_)) => {
                    return Err(ParserInitError::Actions(format!(
                        "Cannot use a list of actions for terminal \"{}\".",
                        symbol.name
                    )))
                }
                Some(Action::NonTerm(_)) => {
                    return Err(ParserInitError::Actions(format!(
                        "Nonterminal action given for terminal \"{}\".",
                        symbol.name
                    )))
                }
                None => {}
            }
            continue;
        }

        let entry = registry
            .get(&symbol.name)
            .or_else(|| symbol.action_name.as_ref().and_then(|name| registry.get(name)));
        match entry {
            Some(Action::NonTerm(action)) => {
                for production in &symbol.productions {
                    prod[production.index()] = ProdDispatch::User(action.clone());
                }
            }
            Some(Action::PerAlternative(actions)) => {
                if actions.len() != symbol.productions.len() {
                    return Err(ParserInitError::Actions(format!(
                        "Length of list of actions must match the number of \
                         productions for non-terminal \"{}\".",
                        symbol.name
                    )));
                }
                for (production, action) in symbol.productions.iter().zip(actions) {
                    prod[production.index()] = ProdDispatch::User(action.clone());
                }
            }
            Some(Action::Term(_)) => {
                return Err(ParserInitError::Actions(format!(
                    "Terminal action given for non-terminal \"{}\".",
                    symbol.name
                )))
            }
            None => {
                if let Some(builtin) = symbol
                    .action_name
                    .as_deref()
                    .and_then(builtin_by_name)
                {
                    for production in &symbol.productions {
                        prod[production.index()] = ProdDispatch::Builtin(builtin);
                    }
                }
            }
        }
    }

    Ok(Dispatch { prod, term })
}
