//! Output destinations for the DOT text, and PNG rendering through Graphviz.

use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;

/// Where the DOT text goes. Exactly one target is active per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    /// Standard output.
    Console,
    /// A DOT file at the given path.
    NamedFile(PathBuf),
    /// A fresh temp DOT file, rendered afterwards to a PNG at `image`.
    TempFileThenImage { image: PathBuf },
}

impl OutputTarget {
    /// Pick the target for the `--output` and `--direct` paths.
    ///
    /// An image path always goes through a temp file, even when an output
    /// path is also given. The output path is then ignored.
    pub fn select(output: Option<PathBuf>, image: Option<PathBuf>) -> Self {
        match (output, image) {
            (output, Some(image)) => {
                if let Some(output) = output {
                    tracing::warn!(
                        output = %output.display(),
                        image = %image.display(),
                        "--output is ignored when --direct is given"
                    );
                }
                OutputTarget::TempFileThenImage { image }
            }
            (Some(path), None) => OutputTarget::NamedFile(path),
            (None, None) => OutputTarget::Console,
        }
    }
}

/// What a routed run left on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Emitted {
    pub dot_path: Option<PathBuf>,
    pub image_path: Option<PathBuf>,
}

/// Turns DOT text into a raster image.
pub trait Renderer {
    /// Parse DOT from `dot` and write a PNG to `image`.
    fn render_png(&self, dot: &mut dyn Read, image: &Path) -> crate::Result<()>;
}

/// Renders with the Graphviz `dot` program, which parses its own input.
#[derive(Debug, Clone)]
pub struct GraphvizRenderer {
    program: PathBuf,
}

impl GraphvizRenderer {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        GraphvizRenderer {
            program: program.into(),
        }
    }
}

impl Default for GraphvizRenderer {
    fn default() -> Self {
        GraphvizRenderer::new("dot")
    }
}

impl Renderer for GraphvizRenderer {
    fn render_png(&self, dot: &mut dyn Read, image: &Path) -> crate::Result<()> {
        tracing::debug!(
            program = %self.program.display(),
            image = %image.display(),
            "running renderer"
        );
        let mut child = Command::new(&self.program)
            .arg("-Tpng")
            .arg("-o")
            .arg(image)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                crate::Error::Render(format!("cannot run {}: {e}", self.program.display()))
            })?;

        // Drain stderr on its own thread while stdin is fed.
        let stdin = child.stdin.take();
        let stderr = child.stderr.take();
        let (copied, diagnostics) = thread::scope(|s| {
            let reader = s.spawn(move || {
                let mut buf = Vec::new();
                if let Some(mut stderr) = stderr {
                    stderr.read_to_end(&mut buf)?;
                }
                Ok::<_, io::Error>(buf)
            });
            let copied = match stdin {
                Some(mut stdin) => io::copy(dot, &mut stdin).map(|_| ()),
                None => Ok(()),
            };
            (copied, reader.join())
        });
        let status = child.wait()?;
        let diagnostics = match diagnostics {
            Ok(read) => read?,
            Err(_) => return Err(crate::Error::Render("stderr reader panicked".into())),
        };

        if !status.success() {
            let stderr = String::from_utf8_lossy(&diagnostics);
            return Err(crate::Error::Render(format!(
                "{} exited with {}: {}",
                self.program.display(),
                status,
                stderr.trim()
            )));
        }
        copied?;
        Ok(())
    }
}

fn with_path(path: &Path) -> impl FnOnce(io::Error) -> io::Error + '_ {
    move |e| io::Error::new(e.kind(), format!("{}: {e}", path.display()))
}

/// Opens the chosen sink, hands it to a writer, and renders images.
pub struct Router<'a> {
    renderer: &'a dyn Renderer,
    temp_dir: Option<PathBuf>,
}

impl<'a> Router<'a> {
    pub fn new(renderer: &'a dyn Renderer) -> Self {
        Router {
            renderer,
            temp_dir: None,
        }
    }

    /// Create temp files in `dir` instead of the system temp directory.
    pub fn with_temp_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.temp_dir = dir;
        self
    }

    /// Create a temp DOT file that outlives this process.
    fn create_temp(&self) -> io::Result<(File, PathBuf)> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("forestdot-").suffix(".gv");
        let temp = match &self.temp_dir {
            Some(dir) => builder.tempfile_in(dir).map_err(with_path(dir))?,
            None => builder.tempfile()?,
        };
        temp.keep().map_err(|e| e.error)
    }

    fn write_file<F>(file: File, path: &Path, write: F) -> crate::Result<()>
    where
        F: FnOnce(&mut dyn Write) -> io::Result<()>,
    {
        let mut out = BufWriter::new(file);
        write(&mut out).map_err(with_path(path))?;
        out.flush().map_err(with_path(path))?;
        Ok(())
    }

    /// Send the DOT text produced by `write` to `target`.
    pub fn route<F>(&self, target: &OutputTarget, write: F) -> crate::Result<Emitted>
    where
        F: FnOnce(&mut dyn Write) -> io::Result<()>,
    {
        match target {
            OutputTarget::Console => {
                let stdout = io::stdout();
                let mut lock = stdout.lock();
                write(&mut lock)?;
                Ok(Emitted::default())
            }
            OutputTarget::NamedFile(path) => {
                let file = File::create(path).map_err(with_path(path))?;
                Self::write_file(file, path, write)?;
                tracing::info!(path = %path.display(), "wrote DOT file");
                Ok(Emitted {
                    dot_path: Some(path.clone()),
                    image_path: None,
                })
            }
            OutputTarget::TempFileThenImage { image } => {
                let (file, temp) = self.create_temp()?;
                tracing::info!(path = %temp.display(), "writing DOT to temp file");
                Self::write_file(file, &temp, write)?;

                let mut reader = File::open(&temp).map_err(with_path(&temp))?;
                self.renderer.render_png(&mut reader, image)?;
                tracing::info!(image = %image.display(), "rendered PNG");
                Ok(Emitted {
                    dot_path: Some(temp),
                    image_path: Some(image.clone()),
                })
            }
        }
    }
}
