use std::fmt;
use std::str::FromStr;

/// Default cap on the number of edges printed below a root.
pub const DEFAULT_MAX_LEVELS_PER_EDGE: u32 = 10;

/// Which trees of the ensemble to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TreeSelection {
    /// Every tree, one subgraph each.
    #[default]
    All,
    /// A single tree by index.
    Single(usize),
}

impl FromStr for TreeSelection {
    type Err = String;

    /// Parse a `--tree` argument. `-1` selects every tree.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || format!("invalid --tree argument ({s})");
        let n: i64 = s.trim().parse().map_err(|_| invalid())?;
        match n {
            -1 => Ok(TreeSelection::All),
            n if n >= 0 => usize::try_from(n)
                .map(TreeSelection::Single)
                .map_err(|_| invalid()),
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for TreeSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeSelection::All => f.write_str("all"),
            TreeSelection::Single(i) => write!(f, "{i}"),
        }
    }
}

/// What to render, built once from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    pub tree: TreeSelection,
    /// Maximum number of edges between a root and any printed node.
    pub max_levels_per_edge: u32,
    /// Overrides the per-tree cluster label.
    pub title: Option<String>,
    /// Add node numbers and statistics to labels.
    pub detail: bool,
    /// Dump the converted graph to stdout before the DOT text.
    pub raw: bool,
}

impl Default for RenderRequest {
    fn default() -> Self {
        RenderRequest {
            tree: TreeSelection::All,
            max_levels_per_edge: DEFAULT_MAX_LEVELS_PER_EDGE,
            title: None,
            detail: false,
            raw: false,
        }
    }
}
