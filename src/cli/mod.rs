use clap::error::ErrorKind;
use clap::{Arg, Command, CommandFactory, Parser};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use crate::exitcode;
use crate::model::{self, Model};
use crate::options::PrintOptions;
use crate::request::{RenderRequest, TreeSelection};
use crate::router::{Emitted, GraphvizRenderer, OutputTarget, Router};

pub mod config;
pub mod output;

const AFTER_HELP: &str = "\
Example:

    forestdot --tree 0 -i model.json -o model.gv -f 20 -d 3
    dot -Tpng model.gv -o model.png

    forestdot --tree 0 -i model.json --direct model.png";

/// A model loaded when its `--input` argument was reached.
#[derive(Debug, Clone)]
pub struct LoadedModel {
    pub path: PathBuf,
    pub model: Model,
}

impl LoadedModel {
    pub fn load(path: impl Into<PathBuf>) -> crate::Result<Self> {
        let path = path.into();
        let model = model::load(&path)?;
        Ok(LoadedModel { path, model })
    }
}

/// Why the command line was rejected.
#[derive(Debug)]
pub enum ArgsError {
    /// clap rejected an argument, or help/version was asked for.
    Clap(clap::Error),
    /// An `--input` model failed to load.
    Model(crate::Error),
}

#[derive(Parser, Debug)]
#[command(
    name = "forestdot",
    version,
    about = "Emit a human-consumable graph of a tree model for use with dot (graphviz)",
    long_about = "Emit a human-consumable graph of a tree model for use with dot (graphviz).\n\
                  The supported model types are DRF, GBM, XGBoost and isolation forest.",
    after_help = AFTER_HELP,
    args_override_self = true
)]
pub struct Cli {
    /// Tree number to print, -1 for every tree [default: all]
    #[arg(long, value_name = "N", allow_negative_numbers = true)]
    pub tree: Option<TreeSelection>,

    /// Number of levels per edge to print [default: 10]
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    pub levels: Option<u32>,

    /// Force the title of the tree graph
    #[arg(long, allow_hyphen_values = true)]
    pub title: Option<String>,

    /// Print additional detail such as node numbers
    #[arg(long)]
    pub detail: bool,

    /// Input model file
    #[arg(short = 'i', long, value_name = "FILE", allow_hyphen_values = true)]
    pub input: Option<PathBuf>,

    /// Output DOT file [default: stdout]
    #[arg(short = 'o', long, value_name = "FILE", allow_hyphen_values = true)]
    pub output: Option<PathBuf>,

    /// Round all numerical values to this many decimal places
    #[arg(short = 'd', long = "decimalplaces", value_name = "N")]
    pub decimal_places: Option<u32>,

    /// Font size of all labels [default: 14]
    #[arg(
        short = 'f',
        long = "fontsize",
        value_name = "N",
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub font_size: Option<u32>,

    /// Dump the converted trees to stdout before the DOT text
    #[arg(long)]
    pub raw: bool,

    /// Label splits with the model's internal column and level indices
    #[arg(long)]
    pub internal: bool,

    /// Render a PNG image instead of writing DOT
    #[arg(long, value_name = "FILE", allow_hyphen_values = true)]
    pub direct: Option<PathBuf>,

    /// The last `--input` model, loaded during [`parse_in_order`].
    #[arg(skip)]
    pub model: Option<LoadedModel>,
}

/// Everything one run needs, fixed before any output is written.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub model: LoadedModel,
    pub request: RenderRequest,
    pub options: PrintOptions,
    pub target: OutputTarget,
}

impl Cli {
    /// Validate the parsed arguments and fill unset values from `config`.
    pub fn into_invocation(self, config: &config::Config) -> crate::Result<Invocation> {
        config.validate()?;
        let path = self
            .input
            .ok_or_else(|| crate::Error::Validation("Must specify -i".into()))?;
        let model = match self.model {
            Some(loaded) if loaded.path == path => loaded,
            _ => LoadedModel::load(path)?,
        };

        let request = RenderRequest {
            tree: self.tree.unwrap_or_default(),
            max_levels_per_edge: self.levels.unwrap_or(config.levels),
            title: self.title,
            detail: self.detail,
            raw: self.raw,
        };
        let options = PrintOptions::new(
            self.decimal_places,
            self.font_size.unwrap_or(config.font_size),
            self.internal,
        );
        let target = OutputTarget::select(self.output, self.direct);

        Ok(Invocation {
            model,
            request,
            options,
            target,
        })
    }
}

/// Parse `args`, loading each `--input` model as its argument is reached.
///
/// Arguments are handled strictly left to right: everything ahead of an
/// `--input` is checked by clap before that model loads, and a model that
/// fails to load stops parsing before any later argument is looked at.
pub fn parse_in_order<I, T>(args: I) -> Result<Cli, ArgsError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
    let mut cmd = Cli::command();
    cmd.build();

    let mut loaded = None;
    for (start, path) in input_values(&cmd, &args) {
        Cli::try_parse_from(&args[..start]).map_err(ArgsError::Clap)?;
        loaded = Some(LoadedModel::load(path).map_err(ArgsError::Model)?);
    }
    let mut cli = Cli::try_parse_from(&args).map_err(ArgsError::Clap)?;
    cli.model = loaded;
    Ok(cli)
}

/// Every `--input` value in `args`, with the index of the token that starts it.
///
/// Walks the tokens the way clap splits them and stops at the first one it
/// does not recognise, which clap then reports.
fn input_values(cmd: &Command, args: &[OsString]) -> Vec<(usize, PathBuf)> {
    let mut found = Vec::new();
    let mut i = 1;
    while let Some(token) = args.get(i).and_then(|t| t.to_str()) {
        let start = i;
        i += 1;
        let Some((arg, inline)) = recognise(cmd, token) else {
            break;
        };
        if !arg.get_action().takes_values() {
            continue;
        }
        let value = match inline {
            Some(value) => PathBuf::from(value),
            None => match args.get(i) {
                Some(value) => {
                    i += 1;
                    PathBuf::from(value)
                }
                None => break,
            },
        };
        if arg.get_id() == "input" {
            found.push((start, value));
        }
    }
    found
}

/// The argument `token` names, and the value attached to it if any.
fn recognise<'c, 't>(cmd: &'c Command, token: &'t str) -> Option<(&'c Arg, Option<&'t str>)> {
    if let Some(long) = token.strip_prefix("--") {
        let (name, inline) = match long.split_once('=') {
            Some((name, value)) => (name, Some(value)),
            None => (long, None),
        };
        return cmd
            .get_arguments()
            .find(|a| a.get_long() == Some(name))
            .map(|a| (a, inline));
    }

    // A short cluster such as `-hV` or `-imodel.json`.
    let shorts = token.strip_prefix('-')?;
    for (at, c) in shorts.char_indices() {
        let arg = cmd.get_arguments().find(|a| a.get_short() == Some(c))?;
        let rest = &shorts[at + c.len_utf8()..];
        if arg.get_action().takes_values() || rest.is_empty() {
            let rest = rest.strip_prefix('=').unwrap_or(rest);
            return Some((arg, (!rest.is_empty()).then_some(rest)));
        }
    }
    None
}

/// Run one invocation against the configured renderer.
pub fn execute(invocation: &Invocation, config: &config::Config) -> crate::Result<Emitted> {
    tracing::debug!(
        model = %invocation.model.path.display(),
        request = ?invocation.request,
        options = ?invocation.options,
        target = ?invocation.target,
        "executing"
    );
    let renderer = GraphvizRenderer::new(config.dot.clone());
    let router = Router::new(&renderer).with_temp_dir(config.temp_dir.clone());
    crate::render_model(
        &invocation.model.model,
        &invocation.request,
        &invocation.options,
        &invocation.target,
        &router,
    )
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_env("FORESTDOT_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

pub fn run() {
    init_logging();

    let cli = match parse_in_order(std::env::args_os()) {
        Ok(cli) => cli,
        Err(ArgsError::Clap(e)) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => e.exit(),
            _ => {
                let err = crate::Error::Usage(e.to_string().trim_end().to_string());
                output::report(&err);
                std::process::exit(err.exit_code());
            }
        },
        Err(ArgsError::Model(e)) => {
            output::report(&e);
            std::process::exit(e.exit_code());
        }
    };

    let config = config::load(Some(Path::new(".")));
    let result = cli
        .into_invocation(&config)
        .and_then(|invocation| execute(&invocation, &config));

    match result {
        Ok(emitted) => {
            if let Some(path) = emitted.dot_path {
                tracing::info!(path = %path.display(), "DOT written");
            }
            std::process::exit(exitcode::OK);
        }
        Err(e) => {
            output::report(&e);
            std::process::exit(e.exit_code());
        }
    }
}
