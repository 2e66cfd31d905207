//! DOT (Graphviz) rendering of converted trees.

use std::io::{self, Write};

use petgraph::graph::NodeIndex;

use crate::options::PrintOptions;
use crate::request::RenderRequest;
use crate::tree_graph::{EdgeCondition, NaDirection, NodeKind, TreeGraph, TreeSubgraph};

/// Escape a string for use inside a double-quoted DOT label.
pub fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

fn dot_name(sg: &TreeSubgraph, idx: NodeIndex) -> String {
    format!("SG_{}_Node_{}", sg.number, sg.node(idx).number)
}

/// Pre-order walk that never descends below `limit` edges from the root.
fn bounded_walk(sg: &TreeSubgraph, limit: usize) -> Vec<NodeIndex> {
    let mut order = Vec::new();
    let mut stack: Vec<NodeIndex> = sg.root().into_iter().collect();
    while let Some(idx) = stack.pop() {
        order.push(idx);
        if sg.node(idx).depth < limit {
            for (child, _) in sg.children(idx).into_iter().rev() {
                stack.push(child);
            }
        }
    }
    order
}

struct Emitter<'a> {
    request: &'a RenderRequest,
    options: &'a PrintOptions,
}

impl Emitter<'_> {
    fn limit(&self) -> usize {
        self.request.max_levels_per_edge as usize
    }

    fn num(&self, value: f32) -> String {
        self.options.round(value).to_string()
    }

    fn truncated(&self, sg: &TreeSubgraph, idx: NodeIndex) -> bool {
        sg.node(idx).depth >= self.limit() && !sg.is_leaf(idx)
    }

    fn node_label(&self, sg: &TreeSubgraph, idx: NodeIndex) -> String {
        let node = sg.node(idx);
        let mut label = match &node.kind {
            NodeKind::Split { column, threshold } => {
                format!("{} < {}", escape(column), self.num(*threshold))
            }
            NodeKind::Categorical { column } => escape(column),
            NodeKind::Leaf => node.prediction.map(|p| self.num(p)).unwrap_or_default(),
        };

        if self.truncated(sg, idx) {
            label.push_str("\\n...");
        }

        if self.request.detail {
            label.push_str(&format!("\\n\\nN{}\\n", node.number));
            if node.kind != NodeKind::Leaf {
                if let Some(p) = node.prediction {
                    label.push_str(&format!("\\nPred: {}", self.num(p)));
                }
            }
            if let Some(se) = node.squared_error {
                label.push_str(&format!("\\nSE: {}", self.num(se)));
            }
            if let Some(w) = node.weight {
                label.push_str(&format!("\\nW: {}", self.num(w)));
            }
            match node.na_direction {
                Some(NaDirection::Left) => label.push_str("\\nNA: left"),
                Some(NaDirection::Right) => label.push_str("\\nNA: right"),
                None => {}
            }
        }

        label
    }

    fn write_node<W: Write + ?Sized>(
        &self,
        out: &mut W,
        sg: &TreeSubgraph,
        idx: NodeIndex,
    ) -> io::Result<()> {
        let mut attrs = Vec::new();
        if !sg.is_leaf(idx) {
            attrs.push("shape=box".to_string());
        }
        if self.truncated(sg, idx) {
            attrs.push("style=dashed".to_string());
        }
        attrs.push(format!("fontsize={}", self.options.font_size));
        attrs.push(format!("label=\"{}\"", self.node_label(sg, idx)));
        writeln!(out, "\"{}\" [{}]", dot_name(sg, idx), attrs.join(", "))
    }

    fn write_edges<W: Write + ?Sized>(
        &self,
        out: &mut W,
        sg: &TreeSubgraph,
        idx: NodeIndex,
    ) -> io::Result<()> {
        if sg.node(idx).depth >= self.limit() {
            return Ok(());
        }
        for (child, edge) in sg.children(idx) {
            let mut parts: Vec<String> = match &edge.condition {
                EdgeCondition::Less => vec!["<".into()],
                EdgeCondition::GreaterOrEqual => vec![">=".into()],
                EdgeCondition::Levels(levels) => levels.iter().map(|l| escape(l)).collect(),
            };
            if edge.includes_na {
                parts.push("[NA]".into());
            }
            writeln!(
                out,
                "\"{}\" -> \"{}\" [fontsize={}, label=\"{}\"]",
                dot_name(sg, idx),
                dot_name(sg, child),
                self.options.font_size,
                parts.join("\\n")
            )?;
        }
        Ok(())
    }

    fn write_subgraph<W: Write + ?Sized>(&self, out: &mut W, sg: &TreeSubgraph) -> io::Result<()> {
        let visible = bounded_walk(sg, self.limit());
        let deepest = visible.iter().map(|&i| sg.node(i).depth).max();

        writeln!(out)?;
        writeln!(out, "subgraph cluster_{} {{", sg.number)?;
        writeln!(out, "/* Nodes */")?;
        if let Some(deepest) = deepest {
            for level in 0..=deepest {
                writeln!(out)?;
                writeln!(out, "/* Level {level} */")?;
                writeln!(out, "{{")?;
                for &idx in visible.iter().filter(|&&i| sg.node(i).depth == level) {
                    self.write_node(out, sg, idx)?;
                }
                writeln!(out, "}}")?;
            }
        }

        writeln!(out)?;
        writeln!(out, "/* Edges */")?;
        for &idx in &visible {
            self.write_edges(out, sg, idx)?;
        }

        writeln!(out)?;
        writeln!(out, "fontsize={}", self.options.font_size)?;
        let title = self.request.title.as_deref().unwrap_or(&sg.name);
        writeln!(out, "label=\"{}\"", escape(title))?;
        writeln!(out, "}}")
    }
}

/// Write `graph` as a DOT document, one cluster per tree.
pub fn write_dot<W: Write + ?Sized>(
    out: &mut W,
    graph: &TreeGraph,
    request: &RenderRequest,
    options: &PrintOptions,
) -> io::Result<()> {
    let emitter = Emitter { request, options };

    writeln!(out, "/*")?;
    writeln!(out, "Generated by forestdot {}", env!("CARGO_PKG_VERSION"))?;
    writeln!(out)?;
    writeln!(out, "$ dot -Tpng file.gv -o file.png")?;
    writeln!(out, "*/")?;
    writeln!(out)?;
    writeln!(out, "digraph G {{")?;
    for sg in &graph.subgraphs {
        emitter.write_subgraph(out, sg)?;
    }
    writeln!(out)?;
    writeln!(out, "}}")?;
    out.flush()
}

/// Write the raw node listing of `graph`.
pub fn write_raw<W: Write + ?Sized>(out: &mut W, graph: &TreeGraph) -> io::Result<()> {
    out.write_all(graph.raw_dump().as_bytes())?;
    out.flush()
}

/// Render `graph` as a DOT string.
pub fn to_dot(
    graph: &TreeGraph,
    request: &RenderRequest,
    options: &PrintOptions,
) -> io::Result<String> {
    let mut buf = Vec::new();
    write_dot(&mut buf, graph, request, options)?;
    String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}
