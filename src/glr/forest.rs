use crate::grammar::ProdId;
use crate::parser::TreeNode;
use crate::symbol::SymbolId;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// A node of the shared packed parse forest. Nonterminal nodes are unique
/// per (symbol, span); ambiguous derivations of the same span live side by
/// side as alternatives of one node.
#[derive(Debug)]
pub enum SppfNode {
    Term {
        symbol: SymbolId,
        name: String,
        value: String,
        start: usize,
        end: usize,
        layout: String,
    },
    NonTerm {
        symbol: SymbolId,
        name: String,
        start: usize,
        end: usize,
        alternatives: RefCell<Vec<SppfAlternative>>,
    },
}

/// One derivation packed under a nonterminal forest node.
#[derive(Debug)]
pub struct SppfAlternative {
    pub production: ProdId,
    pub children: Vec<Rc<SppfNode>>,
}

impl SppfNode {
    pub fn symbol(&self) -> SymbolId {
        match self {
            SppfNode::Term { symbol, .. } | SppfNode::NonTerm { symbol, .. } => *symbol,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            SppfNode::Term { name, .. } | SppfNode::NonTerm { name, .. } => name,
        }
    }

    pub fn start(&self) -> usize {
        match self {
            SppfNode::Term { start, .. } | SppfNode::NonTerm { start, .. } => *start,
        }
    }

    pub fn end(&self) -> usize {
        match self {
            SppfNode::Term { end, .. } | SppfNode::NonTerm { end, .. } => *end,
        }
    }

    /// Whether this node packs more than one derivation.
    pub fn is_ambiguous(&self) -> bool {
        match self {
            SppfNode::Term { .. } => false,
            SppfNode::NonTerm { alternatives, .. } => alternatives.borrow().len() > 1,
        }
    }

    /// Registers a derivation unless an identical one (same production and
    /// shared children) is already packed.
    pub(crate) fn add_alternative(&self, production: ProdId, children: Vec<Rc<SppfNode>>) {
        let alternatives = match self {
            SppfNode::NonTerm { alternatives, .. } => alternatives,
            SppfNode::Term { .. } => return,
        };
        let mut alternatives = alternatives.borrow_mut();
        let exists = alternatives.iter().any(|alternative| {
            alternative.production == production
                && alternative.children.len() == children.len()
                && alternative
                    .children
                    .iter()
                    .zip(&children)
                    .all(|(left, right)| Rc::ptr_eq(left, right))
        });
        if !exists {
            alternatives.push(SppfAlternative {
                production,
                children,
            });
        }
    }
}

/// The result of a generalized parse: a DAG of forest nodes rooted at the
/// start symbol derivations.
#[derive(Debug)]
pub struct Forest {
    pub(crate) roots: Vec<Rc<SppfNode>>,
}

impl Forest {
    pub fn roots(&self) -> &[Rc<SppfNode>] {
        &self.roots
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// The number of distinct finite derivations packed in the forest.
    pub fn solutions(&self) -> usize {
        let mut memo: HashMap<*const SppfNode, Option<usize>> = HashMap::new();
        self.roots
            .iter()
            .map(|root| count_node(root, &mut memo))
            .sum()
    }

    /// Enumerate up to `limit` distinct trees from the forest.
    pub fn trees(&self, limit: usize) -> Vec<Rc<TreeNode>> {
        let mut trees: Vec<Rc<TreeNode>> = Vec::new();
        let mut in_progress: HashSet<*const SppfNode> = HashSet::new();
        for root in &self.roots {
            if trees.len() >= limit {
                break;
            }
            let remaining = limit - trees.len();
            trees.extend(enumerate_node(root, remaining, &mut in_progress));
        }
        trees
    }
}

/// Derivation count of one forest node. A cycle (an empty derivation
/// re-entering itself) contributes no finite tree and counts as zero.
fn count_node(node: &Rc<SppfNode>, memo: &mut HashMap<*const SppfNode, Option<usize>>) -> usize {
    let key = Rc::as_ptr(node);
    match memo.get(&key) {
        Some(Some(count)) => return *count,
        Some(None) => return 0,
        None => {}
    }
    memo.insert(key, None);
    let count = match &**node {
        SppfNode::Term { .. } => 1,
        SppfNode::NonTerm { alternatives, .. } => alternatives
            .borrow()
            .iter()
            .map(|alternative| {
                alternative
                    .children
                    .iter()
                    .map(|child| count_node(child, memo))
                    .product::<usize>()
            })
            .sum(),
    };
    memo.insert(key, Some(count));
    count
}

fn enumerate_node(
    node: &Rc<SppfNode>,
    limit: usize,
    in_progress: &mut HashSet<*const SppfNode>,
) -> Vec<Rc<TreeNode>> {
    if limit == 0 {
        return Vec::new();
    }
    match &**node {
        SppfNode::Term {
            symbol,
            name,
            value,
            start,
            end,
            layout,
        } => vec![Rc::new(TreeNode::Term {
            symbol: *symbol,
            name: name.clone(),
            value: value.clone(),
            start: *start,
            end: *end,
            layout: layout.clone(),
        })],
        SppfNode::NonTerm {
            symbol,
            name,
            start,
            end,
            alternatives,
        } => {
            let key = Rc::as_ptr(node);
            if !in_progress.insert(key) {
                return Vec::new();
            }
            let mut trees: Vec<Rc<TreeNode>> = Vec::new();
            for alternative in alternatives.borrow().iter() {
                if trees.len() >= limit {
                    break;
                }
                let remaining = limit - trees.len();
                let combinations =
                    enumerate_children(&alternative.children, remaining, in_progress);
                for children in combinations {
                    let layout = children
                        .first()
                        .map(|child| child.layout().to_string())
                        .unwrap_or_default();
                    trees.push(Rc::new(TreeNode::NonTerm {
                        symbol: *symbol,
                        name: name.clone(),
                        production: alternative.production,
                        children,
                        start: *start,
                        end: *end,
                        layout,
                    }));
                }
            }
            in_progress.remove(&key);
            trees
        }
    }
}

/// Cartesian product of the children enumerations, bounded by `limit`.
fn enumerate_children(
    children: &[Rc<SppfNode>],
    limit: usize,
    in_progress: &mut HashSet<*const SppfNode>,
) -> Vec<Vec<Rc<TreeNode>>> {
    let mut combinations: Vec<Vec<Rc<TreeNode>>> = vec![Vec::new()];
    for child in children {
        let options = enumerate_node(child, limit, in_progress);
        if options.is_empty() {
            return Vec::new();
        }
        let mut extended = Vec::new();
        'outer: for combination in combinations {
            for option in &options {
                let mut next = combination.clone();
                next.push(option.clone());
                extended.push(next);
                if extended.len() >= limit {
                    break 'outer;
                }
            }
        }
        combinations = extended;
    }
    combinations
}
