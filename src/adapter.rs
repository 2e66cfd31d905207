//! Bridges a loaded model to the tree graph the emitter walks.

use crate::model::Model;
use crate::options::PrintOptions;
use crate::request::RenderRequest;
use crate::tree_graph::TreeGraph;

/// Convert the trees selected by `request`.
///
/// Fails with [`crate::Error::UnsupportedModel`] when the model has no
/// trees to convert. `options.internal` is passed through untouched.
pub fn tree_graph(
    model: &Model,
    request: &RenderRequest,
    options: &PrintOptions,
) -> crate::Result<TreeGraph> {
    let converter = model
        .as_tree_converter()
        .ok_or_else(|| crate::Error::UnsupportedModel(model.algo().to_string()))?;
    tracing::debug!(
        trees = converter.tree_count(),
        selection = %request.tree,
        "converting model"
    );
    converter.convert(request.tree, options.internal)
}
