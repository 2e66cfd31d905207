pub mod adapter;
pub mod dot;
pub mod exitcode;
pub mod model;
pub mod options;
pub mod request;
pub mod router;
pub mod tree_graph;

#[cfg(feature = "cli")]
pub mod cli;

use std::path::PathBuf;

/// Library-wide error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to load model {}: {reason}", .path.display())]
    ModelLoad { path: PathBuf, reason: String },

    #[error("unsupported model type: {0}")]
    UnsupportedModel(String),

    #[error("tree {index} out of range (model has {count} trees)")]
    TreeOutOfRange { index: usize, count: usize },

    #[error("render failed: {0}")]
    Render(String),

    #[error("{0}")]
    Usage(String),

    #[error("{0}")]
    Validation(String),
}

impl Error {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Usage(_)
            | Error::Validation(_)
            | Error::UnsupportedModel(_)
            | Error::ModelLoad { .. } => exitcode::USAGE,
            Error::Io(_) | Error::Render(_) | Error::TreeOutOfRange { .. } => exitcode::RUNTIME,
        }
    }

    /// Whether the usage text should accompany this error.
    pub fn wants_usage(&self) -> bool {
        matches!(
            self,
            Error::Usage(_) | Error::Validation(_) | Error::ModelLoad { .. }
        )
    }
}

/// Library-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Convert the requested trees of `model` and write them to `target`.
///
/// With `request.raw` the raw node listing goes to stdout first, never into
/// the DOT sink.
pub fn render_model(
    model: &model::Model,
    request: &request::RenderRequest,
    options: &options::PrintOptions,
    target: &router::OutputTarget,
    router: &router::Router<'_>,
) -> Result<router::Emitted> {
    let graph = adapter::tree_graph(model, request, options)?;
    if request.raw {
        dot::write_raw(&mut std::io::stdout().lock(), &graph)?;
    }
    router.route(target, |out| dot::write_dot(out, &graph, request, options))
}
