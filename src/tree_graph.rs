use comfy_table::{Cell, CellAlignment, Table};
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

/// Which child an edge leads to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Side {
    Left,
    Right,
}

/// Where rows with a missing split value are sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NaDirection {
    Left,
    Right,
}

impl NaDirection {
    pub fn side(self) -> Side {
        match self {
            NaDirection::Left => Side::Left,
            NaDirection::Right => Side::Right,
        }
    }
}

/// The decision made at a node.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Numeric split: rows with `column < threshold` go left.
    Split { column: String, threshold: f32 },
    /// Categorical split: the edges carry the level sets.
    Categorical { column: String },
    Leaf,
}

/// A decision or leaf node of one tree.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    /// Pre-order number, unique within the subgraph.
    pub number: usize,
    /// Number of edges between the root and this node.
    pub depth: usize,
    pub kind: NodeKind,
    /// Leaf value, or the node's mean prediction for split nodes.
    pub prediction: Option<f32>,
    pub weight: Option<f32>,
    pub squared_error: Option<f32>,
    pub na_direction: Option<NaDirection>,
}

/// The condition that routes a row along an edge.
#[derive(Debug, Clone, PartialEq)]
pub enum EdgeCondition {
    Less,
    GreaterOrEqual,
    Levels(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TreeEdge {
    pub side: Side,
    pub condition: EdgeCondition,
    /// Missing values follow this edge.
    pub includes_na: bool,
}

/// One decision tree as a directed graph. Edges point from parent to child.
#[derive(Debug, Clone)]
pub struct TreeSubgraph {
    pub number: usize,
    pub name: String,
    pub(crate) graph: DiGraph<TreeNode, TreeEdge>,
    root: Option<NodeIndex>,
}

impl TreeSubgraph {
    /// Create an empty subgraph.
    pub fn new(number: usize, name: impl Into<String>) -> Self {
        TreeSubgraph {
            number,
            name: name.into(),
            graph: DiGraph::new(),
            root: None,
        }
    }

    fn blank_node(&self, depth: usize, kind: NodeKind) -> TreeNode {
        TreeNode {
            number: self.graph.node_count(),
            depth,
            kind,
            prediction: None,
            weight: None,
            squared_error: None,
            na_direction: None,
        }
    }

    /// Add the root node, replacing any previous root.
    pub fn add_root(&mut self, kind: NodeKind) -> NodeIndex {
        let node = self.blank_node(0, kind);
        let idx = self.graph.add_node(node);
        self.root = Some(idx);
        idx
    }

    /// Add a fresh child below `parent`.
    ///
    /// Children are always new nodes, so the graph stays a tree.
    pub fn add_child(&mut self, parent: NodeIndex, edge: TreeEdge, kind: NodeKind) -> NodeIndex {
        let depth = self.graph[parent].depth + 1;
        let node = self.blank_node(depth, kind);
        let idx = self.graph.add_node(node);
        self.graph.add_edge(parent, idx, edge);
        idx
    }

    pub fn root(&self) -> Option<NodeIndex> {
        self.root
    }

    pub fn node(&self, idx: NodeIndex) -> &TreeNode {
        &self.graph[idx]
    }

    pub fn node_mut(&mut self, idx: NodeIndex) -> &mut TreeNode {
        &mut self.graph[idx]
    }

    /// Children of a node, left before right.
    pub fn children(&self, idx: NodeIndex) -> Vec<(NodeIndex, &TreeEdge)> {
        let mut out: Vec<(NodeIndex, &TreeEdge)> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| (e.target(), e.weight()))
            .collect();
        out.sort_by_key(|(_, edge)| edge.side);
        out
    }

    pub fn is_leaf(&self, idx: NodeIndex) -> bool {
        self.graph
            .neighbors_directed(idx, Direction::Outgoing)
            .next()
            .is_none()
    }

    /// Pre-order depth-first enumeration, left subtree first.
    pub fn dfs(&self) -> Vec<NodeIndex> {
        let mut order = Vec::with_capacity(self.graph.node_count());
        let mut stack: Vec<NodeIndex> = self.root.into_iter().collect();
        while let Some(idx) = stack.pop() {
            order.push(idx);
            for (child, _) in self.children(idx).into_iter().rev() {
                stack.push(child);
            }
        }
        order
    }

    /// Depth of the deepest node, or `None` for an empty tree.
    pub fn max_depth(&self) -> Option<usize> {
        self.graph.node_weights().map(|n| n.depth).max()
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }
}

/// A set of trees converted from a model, one subgraph per tree.
#[derive(Debug, Clone, Default)]
pub struct TreeGraph {
    pub subgraphs: Vec<TreeSubgraph>,
}

fn fmt_opt(value: Option<f32>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

impl TreeGraph {
    pub fn new() -> Self {
        TreeGraph::default()
    }

    pub fn push(&mut self, subgraph: TreeSubgraph) {
        self.subgraphs.push(subgraph);
    }

    pub fn len(&self) -> usize {
        self.subgraphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subgraphs.is_empty()
    }

    /// Unformatted node listing of every subgraph, for debugging conversions.
    pub fn raw_dump(&self) -> String {
        let mut out = String::new();
        for sg in &self.subgraphs {
            out.push_str(&format!(
                "subgraph {} \"{}\" ({} nodes)\n",
                sg.number,
                sg.name,
                sg.len()
            ));

            let mut table = Table::new();
            table.set_header(vec![
                "NODE", "DEPTH", "KIND", "COLUMN", "THRESHOLD", "PRED", "WEIGHT", "SE", "NA",
                "LEFT", "RIGHT",
            ]);

            for idx in sg.dfs() {
                let node = sg.node(idx);
                let (kind, column, threshold) = match &node.kind {
                    NodeKind::Split { column, threshold } => {
                        ("split", column.as_str(), threshold.to_string())
                    }
                    NodeKind::Categorical { column } => {
                        ("categorical", column.as_str(), String::new())
                    }
                    NodeKind::Leaf => ("leaf", "", String::new()),
                };
                let mut left = String::new();
                let mut right = String::new();
                for (child, edge) in sg.children(idx) {
                    let number = sg.node(child).number.to_string();
                    match edge.side {
                        Side::Left => left = number,
                        Side::Right => right = number,
                    }
                }
                let na = match node.na_direction {
                    Some(NaDirection::Left) => "left",
                    Some(NaDirection::Right) => "right",
                    None => "",
                };

                table.add_row(vec![
                    Cell::new(node.number).set_alignment(CellAlignment::Right),
                    Cell::new(node.depth).set_alignment(CellAlignment::Right),
                    Cell::new(kind),
                    Cell::new(column),
                    Cell::new(threshold).set_alignment(CellAlignment::Right),
                    Cell::new(fmt_opt(node.prediction)).set_alignment(CellAlignment::Right),
                    Cell::new(fmt_opt(node.weight)).set_alignment(CellAlignment::Right),
                    Cell::new(fmt_opt(node.squared_error)).set_alignment(CellAlignment::Right),
                    Cell::new(na),
                    Cell::new(left),
                    Cell::new(right),
                ]);
            }

            out.push_str(&table.to_string());
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    fn less(includes_na: bool) -> TreeEdge {
        TreeEdge {
            side: Side::Left,
            condition: EdgeCondition::Less,
            includes_na,
        }
    }

    fn greater_eq(includes_na: bool) -> TreeEdge {
        TreeEdge {
            side: Side::Right,
            condition: EdgeCondition::GreaterOrEqual,
            includes_na,
        }
    }

    fn split(column: &str, threshold: f32) -> NodeKind {
        NodeKind::Split {
            column: column.into(),
            threshold,
        }
    }

    /// A complete binary tree of the given depth, splitting on `x`.
    pub(crate) fn complete_tree(number: usize, depth: usize) -> TreeSubgraph {
        let mut sg = TreeSubgraph::new(number, format!("Tree {number}"));
        let root = if depth == 0 {
            sg.add_root(NodeKind::Leaf)
        } else {
            sg.add_root(split("x", 0.5))
        };
        let mut frontier = vec![root];
        for level in 1..=depth {
            let kind = |t: f32| {
                if level == depth {
                    NodeKind::Leaf
                } else {
                    split("x", t)
                }
            };
            let mut next = Vec::new();
            for parent in frontier {
                let l = sg.add_child(parent, less(false), kind(0.25));
                let r = sg.add_child(parent, greater_eq(true), kind(0.75));
                next.push(l);
                next.push(r);
            }
            frontier = next;
        }
        for idx in sg.dfs() {
            let n = sg.node_mut(idx);
            n.prediction = Some(n.number as f32 * 0.1);
            n.weight = Some(10.0);
        }
        sg
    }

    #[test]
    fn test_empty_subgraph() {
        let sg = TreeSubgraph::new(0, "Tree 0");
        assert!(sg.is_empty());
        assert_eq!(sg.root(), None);
        assert_eq!(sg.max_depth(), None);
        assert!(sg.dfs().is_empty());
    }

    #[test]
    fn test_children_ordered_left_first() {
        let mut sg = TreeSubgraph::new(0, "Tree 0");
        let root = sg.add_root(split("age", 30.0));
        // Insert the right child first.
        let r = sg.add_child(root, greater_eq(false), NodeKind::Leaf);
        let l = sg.add_child(root, less(true), NodeKind::Leaf);

        let children = sg.children(root);
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].0, l);
        assert_eq!(children[0].1.side, Side::Left);
        assert_eq!(children[1].0, r);
        assert!(sg.is_leaf(l));
        assert!(!sg.is_leaf(root));
    }

    #[test]
    fn test_dfs_is_preorder() {
        let sg = complete_tree(0, 2);
        let numbers: Vec<usize> = sg.dfs().into_iter().map(|i| sg.node(i).number).collect();
        // Breadth-first insertion: root=0, level1=1,2, level2=3,4 (under 1), 5,6 (under 2).
        assert_eq!(numbers, vec![0, 1, 3, 4, 2, 5, 6]);
    }

    #[test]
    fn test_depths() {
        let sg = complete_tree(0, 3);
        assert_eq!(sg.len(), 15);
        assert_eq!(sg.max_depth(), Some(3));
        let root = sg.root().unwrap();
        assert_eq!(sg.node(root).depth, 0);
        for idx in sg.dfs() {
            for (child, _) in sg.children(idx) {
                assert_eq!(sg.node(child).depth, sg.node(idx).depth + 1);
            }
        }
    }

    #[test]
    fn test_acyclic() {
        let sg = complete_tree(0, 4);
        assert!(!petgraph::algo::is_cyclic_directed(&sg.graph));
    }

    #[test]
    fn test_raw_dump_lists_every_node() {
        let mut g = TreeGraph::new();
        g.push(complete_tree(0, 1));
        g.push(complete_tree(1, 0));
        let dump = g.raw_dump();
        assert!(dump.contains("subgraph 0 \"Tree 0\" (3 nodes)"));
        assert!(dump.contains("subgraph 1 \"Tree 1\" (1 nodes)"));
        assert!(dump.contains("THRESHOLD"));
        assert!(dump.contains("split"));
        assert!(dump.contains("leaf"));
    }
}
