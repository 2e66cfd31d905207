use std::path::Path;

use petgraph::graph::NodeIndex;
use serde::Deserialize;

use crate::request::TreeSelection;
use crate::tree_graph::{
    EdgeCondition, NaDirection, NodeKind, Side, TreeEdge, TreeGraph, TreeSubgraph,
};

/// Algorithms whose models are made of decision trees.
pub const TREE_ALGOS: &[&str] = &["drf", "gbm", "xgboost", "isolation_forest"];

/// A training column. Categorical columns carry their level names.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(default)]
    pub domain: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NaSpec {
    Left,
    Right,
}

impl From<NaSpec> for NaDirection {
    fn from(na: NaSpec) -> Self {
        match na {
            NaSpec::Left => NaDirection::Left,
            NaSpec::Right => NaDirection::Right,
        }
    }
}

/// A serialized tree node, as stored in the model document.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeSpec {
    Split {
        column: usize,
        threshold: f32,
        #[serde(default)]
        na: Option<NaSpec>,
        #[serde(default)]
        prediction: Option<f32>,
        #[serde(default)]
        weight: Option<f32>,
        #[serde(default)]
        squared_error: Option<f32>,
        left: Box<NodeSpec>,
        right: Box<NodeSpec>,
    },
    Categorical {
        column: usize,
        /// Level indices routed to the left child; the rest go right.
        left_levels: Vec<usize>,
        #[serde(default)]
        na: Option<NaSpec>,
        #[serde(default)]
        prediction: Option<f32>,
        #[serde(default)]
        weight: Option<f32>,
        #[serde(default)]
        squared_error: Option<f32>,
        left: Box<NodeSpec>,
        right: Box<NodeSpec>,
    },
    Leaf {
        value: f32,
        #[serde(default)]
        weight: Option<f32>,
        #[serde(default)]
        squared_error: Option<f32>,
    },
}

impl NodeSpec {
    fn children(&self) -> Option<(&NodeSpec, &NodeSpec)> {
        match self {
            NodeSpec::Split { left, right, .. } | NodeSpec::Categorical { left, right, .. } => {
                Some((left.as_ref(), right.as_ref()))
            }
            NodeSpec::Leaf { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TreeSpec {
    /// Response class this tree predicts, for multinomial models.
    #[serde(default)]
    pub class: Option<String>,
    pub root: NodeSpec,
}

#[derive(Debug, Deserialize)]
struct ModelDocument {
    algo: String,
    #[serde(default)]
    model_id: Option<String>,
    #[serde(default)]
    columns: Vec<ColumnSpec>,
    #[serde(default)]
    trees: Vec<TreeSpec>,
}

/// Something that can turn its trees into a [`TreeGraph`].
pub trait TreeGraphConverter {
    fn tree_count(&self) -> usize;

    /// Convert the selected trees. `internal` labels columns and categorical
    /// levels by index instead of by name.
    fn convert(&self, selection: TreeSelection, internal: bool) -> crate::Result<TreeGraph>;
}

/// A tree ensemble (DRF, GBM, XGBoost, isolation forest).
#[derive(Debug, Clone, PartialEq)]
pub struct TreeEnsemble {
    pub algo: String,
    pub model_id: Option<String>,
    pub columns: Vec<ColumnSpec>,
    pub trees: Vec<TreeSpec>,
}

/// A model family without trees, kept only to report it as unsupported.
#[derive(Debug, Clone, PartialEq)]
pub struct OtherModel {
    pub algo: String,
    pub model_id: Option<String>,
}

/// A loaded model.
#[derive(Debug, Clone, PartialEq)]
pub enum Model {
    Trees(TreeEnsemble),
    Other(OtherModel),
}

impl Model {
    pub fn algo(&self) -> &str {
        match self {
            Model::Trees(m) => &m.algo,
            Model::Other(m) => &m.algo,
        }
    }

    pub fn model_id(&self) -> Option<&str> {
        match self {
            Model::Trees(m) => m.model_id.as_deref(),
            Model::Other(m) => m.model_id.as_deref(),
        }
    }

    /// The tree conversion capability, if this model has one.
    pub fn as_tree_converter(&self) -> Option<&dyn TreeGraphConverter> {
        match self {
            Model::Trees(m) => Some(m),
            Model::Other(_) => None,
        }
    }
}

/// Load a model document from a JSON file.
pub fn load(path: &Path) -> crate::Result<Model> {
    let load_err = |reason: String| crate::Error::ModelLoad {
        path: path.to_path_buf(),
        reason,
    };
    let content = std::fs::read_to_string(path).map_err(|e| load_err(e.to_string()))?;
    let model = parse_model(&content).map_err(load_err)?;
    tracing::info!(
        path = %path.display(),
        algo = model.algo(),
        model_id = model.model_id().unwrap_or(""),
        "loaded model"
    );
    Ok(model)
}

/// Parse and validate a model document.
pub fn parse_model(content: &str) -> Result<Model, String> {
    let doc: ModelDocument = serde_json::from_str(content).map_err(|e| e.to_string())?;
    let algo = doc.algo.to_ascii_lowercase();

    if !TREE_ALGOS.contains(&algo.as_str()) {
        return Ok(Model::Other(OtherModel {
            algo,
            model_id: doc.model_id,
        }));
    }

    for (i, tree) in doc.trees.iter().enumerate() {
        validate_tree(&tree.root, &doc.columns).map_err(|e| format!("tree {i}: {e}"))?;
    }

    Ok(Model::Trees(TreeEnsemble {
        algo,
        model_id: doc.model_id,
        columns: doc.columns,
        trees: doc.trees,
    }))
}

fn column_at<'a>(columns: &'a [ColumnSpec], index: usize) -> Result<&'a ColumnSpec, String> {
    columns.get(index).ok_or_else(|| {
        format!(
            "column index {index} out of range ({} columns)",
            columns.len()
        )
    })
}

fn validate_tree(root: &NodeSpec, columns: &[ColumnSpec]) -> Result<(), String> {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        match node {
            NodeSpec::Split { column, .. } => {
                column_at(columns, *column)?;
            }
            NodeSpec::Categorical {
                column,
                left_levels,
                ..
            } => {
                let col = column_at(columns, *column)?;
                let domain = col
                    .domain
                    .as_ref()
                    .ok_or_else(|| format!("categorical split on '{}' without domain", col.name))?;
                if let Some(bad) = left_levels.iter().find(|&&l| l >= domain.len()) {
                    return Err(format!(
                        "level {bad} out of range for '{}' ({} levels)",
                        col.name,
                        domain.len()
                    ));
                }
            }
            NodeSpec::Leaf { .. } => {}
        }
        if let Some((left, right)) = node.children() {
            stack.push(right);
            stack.push(left);
        }
    }
    Ok(())
}

impl TreeEnsemble {
    fn column_label(&self, index: usize, internal: bool) -> String {
        if internal {
            format!("#{index}")
        } else {
            self.columns[index].name.clone()
        }
    }

    fn level_labels(&self, column: usize, levels: &[usize], internal: bool) -> Vec<String> {
        if internal {
            levels.iter().map(|l| l.to_string()).collect()
        } else {
            let domain = self.columns[column].domain.as_deref().unwrap_or_default();
            levels.iter().map(|&l| domain[l].clone()).collect()
        }
    }

    /// Level indices not routed left, in domain order.
    fn right_levels(&self, column: usize, left_levels: &[usize]) -> Vec<usize> {
        let n = self.columns[column].domain.as_ref().map_or(0, Vec::len);
        (0..n).filter(|l| !left_levels.contains(l)).collect()
    }

    fn subgraph_name(&self, index: usize) -> String {
        match &self.trees[index].class {
            Some(class) => format!("Tree {index}, Class {class}"),
            None => format!("Tree {index}"),
        }
    }

    fn build_subgraph(&self, index: usize, internal: bool) -> TreeSubgraph {
        let mut sg = TreeSubgraph::new(index, self.subgraph_name(index));
        let mut stack: Vec<(&NodeSpec, Option<(NodeIndex, TreeEdge)>)> =
            vec![(&self.trees[index].root, None)];

        while let Some((spec, parent)) = stack.pop() {
            let kind = match spec {
                NodeSpec::Split {
                    column, threshold, ..
                } => NodeKind::Split {
                    column: self.column_label(*column, internal),
                    threshold: *threshold,
                },
                NodeSpec::Categorical { column, .. } => NodeKind::Categorical {
                    column: self.column_label(*column, internal),
                },
                NodeSpec::Leaf { .. } => NodeKind::Leaf,
            };
            let idx = match parent {
                Some((parent, edge)) => sg.add_child(parent, edge, kind),
                None => sg.add_root(kind),
            };

            let node = sg.node_mut(idx);
            let na = match spec {
                NodeSpec::Split {
                    na,
                    prediction,
                    weight,
                    squared_error,
                    ..
                }
                | NodeSpec::Categorical {
                    na,
                    prediction,
                    weight,
                    squared_error,
                    ..
                } => {
                    node.prediction = *prediction;
                    node.weight = *weight;
                    node.squared_error = *squared_error;
                    node.na_direction = na.map(NaDirection::from);
                    node.na_direction
                }
                NodeSpec::Leaf {
                    value,
                    weight,
                    squared_error,
                } => {
                    node.prediction = Some(*value);
                    node.weight = *weight;
                    node.squared_error = *squared_error;
                    None
                }
            };
            let na_side = na.map(NaDirection::side);

            let (left_cond, right_cond) = match spec {
                NodeSpec::Split { .. } => (EdgeCondition::Less, EdgeCondition::GreaterOrEqual),
                NodeSpec::Categorical {
                    column,
                    left_levels,
                    ..
                } => {
                    let right_levels = self.right_levels(*column, left_levels);
                    (
                        EdgeCondition::Levels(self.level_labels(*column, left_levels, internal)),
                        EdgeCondition::Levels(self.level_labels(*column, &right_levels, internal)),
                    )
                }
                NodeSpec::Leaf { .. } => continue,
            };

            if let Some((left, right)) = spec.children() {
                // Right is pushed first so the left subtree is numbered first.
                stack.push((
                    right,
                    Some((
                        idx,
                        TreeEdge {
                            side: Side::Right,
                            condition: right_cond,
                            includes_na: na_side == Some(Side::Right),
                        },
                    )),
                ));
                stack.push((
                    left,
                    Some((
                        idx,
                        TreeEdge {
                            side: Side::Left,
                            condition: left_cond,
                            includes_na: na_side == Some(Side::Left),
                        },
                    )),
                ));
            }
        }

        sg
    }
}

impl TreeGraphConverter for TreeEnsemble {
    fn tree_count(&self) -> usize {
        self.trees.len()
    }

    fn convert(&self, selection: TreeSelection, internal: bool) -> crate::Result<TreeGraph> {
        let indices: Vec<usize> = match selection {
            TreeSelection::All => (0..self.trees.len()).collect(),
            TreeSelection::Single(index) if index < self.trees.len() => vec![index],
            TreeSelection::Single(index) => {
                return Err(crate::Error::TreeOutOfRange {
                    index,
                    count: self.trees.len(),
                });
            }
        };

        let mut graph = TreeGraph::new();
        for index in indices {
            graph.push(self.build_subgraph(index, internal));
        }
        tracing::debug!(
            algo = %self.algo,
            selection = %selection,
            internal,
            subgraphs = graph.len(),
            "converted trees"
        );
        Ok(graph)
    }
}
