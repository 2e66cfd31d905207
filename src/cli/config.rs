use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::options::DEFAULT_FONT_SIZE;
use crate::request::DEFAULT_MAX_LEVELS_PER_EDGE;

/// forestdot configuration, merged from multiple sources via figment.
///
/// Precedence (highest wins):
/// 1. CLI flags (applied by the caller)
/// 2. Environment variables (`FORESTDOT_*`)
/// 3. Project-level `.forestdot.toml`
/// 4. User-level `~/.config/forestdot/config.toml`
/// 5. Defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Graphviz program used for `--direct`.
    #[serde(default = "default_dot")]
    pub dot: PathBuf,

    /// Directory for the temp DOT file; the system temp dir when unset.
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,

    /// Font size when `--fontsize` is not given.
    #[serde(default = "default_font_size")]
    pub font_size: u32,

    /// Level cap when `--levels` is not given.
    #[serde(default = "default_levels")]
    pub levels: u32,
}

fn default_dot() -> PathBuf {
    PathBuf::from("dot")
}

fn default_font_size() -> u32 {
    DEFAULT_FONT_SIZE
}

fn default_levels() -> u32 {
    DEFAULT_MAX_LEVELS_PER_EDGE
}

impl Default for Config {
    fn default() -> Self {
        Config {
            dot: default_dot(),
            temp_dir: None,
            font_size: default_font_size(),
            levels: default_levels(),
        }
    }
}

impl Config {
    /// Reject values the command line would not accept either.
    pub fn validate(&self) -> crate::Result<()> {
        if self.font_size == 0 {
            return Err(crate::Error::Validation(
                "config: font_size must be greater than 0".into(),
            ));
        }
        if self.levels == 0 {
            return Err(crate::Error::Validation(
                "config: levels must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

fn figment(project_root: Option<&Path>, home: Option<&Path>) -> Figment {
    let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

    // User-level config: ~/.config/forestdot/config.toml
    if let Some(home) = home {
        let user_config = home.join(".config").join("forestdot").join("config.toml");
        figment = figment.merge(Toml::file(user_config));
    }

    // Project-level config: <root>/.forestdot.toml
    if let Some(root) = project_root {
        figment = figment.merge(Toml::file(root.join(".forestdot.toml")));
    }

    // Environment variables: FORESTDOT_DOT, FORESTDOT_TEMP_DIR, etc.
    figment.merge(Env::prefixed("FORESTDOT_"))
}

fn extract(figment: Figment) -> Config {
    figment.extract().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "ignoring invalid configuration");
        Config::default()
    })
}

/// Load configuration by merging all sources.
pub fn load(project_root: Option<&Path>) -> Config {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    extract(figment(project_root, home.as_deref()))
}
