use crate::grammar::ProdId;
use crate::symbol::SymbolId;
use ptree::TreeItem;
use std::borrow::Cow;
use std::rc::Rc;

#[derive(Debug, Clone)]
/// A concrete parse tree node produced in `build_tree` mode and by forest
/// enumeration. Nodes record their span and the layout that preceded them so
/// actions replayed over the tree observe the same context as during
/// parsing.
pub enum TreeNode {
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
        production: ProdId,
        children: Vec<Rc<TreeNode>>,
        start: usize,
        end: usize,
        layout: String,
    },
}

impl TreeNode {
    pub fn name(&self) -> &str {
        match self {
            TreeNode::Term { name, .. } | TreeNode::NonTerm { name, .. } => name,
        }
    }

    pub fn symbol(&self) -> SymbolId {
        match self {
            TreeNode::Term { symbol, .. } | TreeNode::NonTerm { symbol, .. } => *symbol,
        }
    }

    pub fn start(&self) -> usize {
        match self {
            TreeNode::Term { start, .. } | TreeNode::NonTerm { start, .. } => *start,
        }
    }

    pub fn end(&self) -> usize {
        match self {
            TreeNode::Term { end, .. } | TreeNode::NonTerm { end, .. } => *end,
        }
    }

    pub fn layout(&self) -> &str {
        match self {
            TreeNode::Term { layout, .. } | TreeNode::NonTerm { layout, .. } => layout,
        }
    }

    /// The matched string of a terminal node.
    pub fn value(&self) -> Option<&str> {
        match self {
            TreeNode::Term { value, .. } => Some(value),
            TreeNode::NonTerm { .. } => None,
        }
    }

    pub fn production(&self) -> Option<ProdId> {
        match self {
            TreeNode::NonTerm { production, .. } => Some(*production),
            TreeNode::Term { .. } => None,
        }
    }

    pub fn children(&self) -> &[Rc<TreeNode>] {
        match self {
            TreeNode::NonTerm { children, .. } => children,
            TreeNode::Term { .. } => &[],
        }
    }

    pub fn is_term(&self) -> bool {
        matches!(self, TreeNode::Term { .. })
    }

    /// Depth first search for the first node with the given symbol name.
    pub fn find(&self, name: &str) -> Option<&TreeNode> {
        if self.name() == name {
            return Some(self);
        }
        self.children().iter().find_map(|child| child.find(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// All nodes matching the predicate, in depth first order.
    pub fn collect_nodes<'t, F: Fn(&TreeNode) -> bool>(&'t self, predicate: &F) -> Vec<&'t TreeNode> {
        let mut found = Vec::new();
        self.walk(&mut found, &|node, found| {
            if predicate(node) {
                found.push(node);
            }
        });
        found
    }

    fn walk<'t, R, F: Fn(&'t Self, &mut R)>(&'t self, result: &mut R, visit: &F) {
        visit(self, result);
        for child in self.children() {
            child.walk(result, visit);
        }
    }

    pub fn print(&self) -> Result<(), std::io::Error> {
        ptree::print_tree(self)
    }
}

impl TreeItem for TreeNode {
    type Child = Self;

    fn write_self<W: std::io::Write>(&self, f: &mut W, _: &ptree::Style) -> std::io::Result<()> {
        match self {
            TreeNode::Term { name, value, start, end, .. } => {
                write!(f, "{}[{:?}] # {}-{}", name, value, start, end)
            }
            TreeNode::NonTerm { name, start, end, .. } => {
                write!(f, "{} # {}-{}", name, start, end)
            }
        }
    }

    fn children(&self) -> Cow<[Self::Child]> {
        Cow::Owned(
            self.children()
                .iter()
                .map(|child| (**child).clone())
                .collect(),
        )
    }
}
