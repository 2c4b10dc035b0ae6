//! Turning TikZ source into a PNG preview.
//!
//! The source is wrapped in a standalone LaTeX document, compiled to PDF by
//! an external compiler and the first page is rasterized by an external
//! converter. Every render gets its own scratch directory which is removed
//! when the call returns, whatever the outcome. Child processes are spawned
//! with `kill_on_drop`, so a timed out or cancelled render does not leave
//! them running.

use crate::extract::has_environment;
use async_trait::async_trait;
use config::{RenderConfig, ToolCommand};
use std::fmt;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, warn};

const PREAMBLE: &str = "\\documentclass[tikz,border=10pt]{standalone}\n\\usepackage{tikz}\n\\begin{document}\n";
const POSTAMBLE: &str = "\n\\end{document}\n";

const JOB_NAME: &str = "diagram";

/// Upper bound on diagnostic text carried in a [`RenderError`]
const MAX_DETAIL_CHARS: usize = 4000;

/// Wrap TikZ source in a minimal standalone document.
///
/// Bare drawing commands are placed inside a `tikzpicture` environment.
pub fn wrap_document(tikz_source: &str) -> String {
    let body = tikz_source.trim();
    let mut doc = String::with_capacity(PREAMBLE.len() + body.len() + 64);
    doc.push_str(PREAMBLE);
    if has_environment(body) {
        doc.push_str(body);
    } else {
        doc.push_str("\\begin{tikzpicture}\n");
        doc.push_str(body);
        doc.push_str("\n\\end{tikzpicture}");
    }
    doc.push_str(POSTAMBLE);
    doc
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderRequest {
    pub tikz_source: String,
}

impl RenderRequest {
    pub fn new(tikz_source: impl Into<String>) -> Self {
        Self {
            tikz_source: tikz_source.into(),
        }
    }
}

/// Rasterized first page, held in memory as PNG.
#[derive(Clone, PartialEq, Eq)]
pub struct RenderedImage {
    pub png: Arc<[u8]>,
    pub width: u32,
    pub height: u32,
}

impl fmt::Debug for RenderedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderedImage")
            .field("png_bytes", &self.png.len())
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RenderErrorKind {
    CompileFailure,
    ToolchainMissing,
    ConversionFailure,
    Timeout,
}

impl fmt::Display for RenderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RenderErrorKind::CompileFailure => "LaTeX compilation failed",
            RenderErrorKind::ToolchainMissing => "LaTeX toolchain not found",
            RenderErrorKind::ConversionFailure => "PDF conversion failed",
            RenderErrorKind::Timeout => "rendering timed out",
        };
        f.write_str(label)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{kind}: {detail}")]
pub struct RenderError {
    pub kind: RenderErrorKind,
    pub detail: String,
}

impl RenderError {
    pub fn new(kind: RenderErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, request: RenderRequest) -> Result<RenderedImage, RenderError>;
}

/// Renderer backed by a LaTeX compiler and a PDF rasterizer on the host.
pub struct LatexRenderer {
    config: RenderConfig,
}

impl LatexRenderer {
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }

    fn scratch_dir(&self) -> Result<TempDir, RenderError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("tikz-render-");
        let dir = match &self.config.scratch_dir {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        };
        dir.map_err(|e| {
            RenderError::new(
                RenderErrorKind::CompileFailure,
                format!("could not create scratch directory: {}", e),
            )
        })
    }

    async fn compile(&self, dir: &Path) -> Result<(), RenderError> {
        let tex = dir.join(format!("{}.tex", JOB_NAME));
        let tex = tex.to_string_lossy();
        let outdir = dir.to_string_lossy();
        let args = self
            .config
            .compiler
            .expand_args(&[("tex", tex.as_ref()), ("outdir", outdir.as_ref())]);

        let output = run_tool(
            &self.config.compiler,
            args,
            dir,
            self.config.timeout,
            RenderErrorKind::CompileFailure,
        )
        .await?;

        if !output.status.success() {
            let log = tokio::fs::read_to_string(dir.join(format!("{}.log", JOB_NAME)))
                .await
                .ok();
            return Err(RenderError::new(
                RenderErrorKind::CompileFailure,
                failure_detail(&self.config.compiler.program, output.status, log.as_deref(), &output),
            ));
        }
        Ok(())
    }

    async fn rasterize(&self, dir: &Path, pdf: &Path) -> Result<RenderedImage, RenderError> {
        let out_stem = dir.join(JOB_NAME);
        let pdf_arg = pdf.to_string_lossy();
        let out_arg = out_stem.to_string_lossy();
        let outdir = dir.to_string_lossy();
        let dpi = self.config.dpi.to_string();
        let args = self.config.rasterizer.expand_args(&[
            ("pdf", pdf_arg.as_ref()),
            ("out", out_arg.as_ref()),
            ("dpi", dpi.as_str()),
            ("outdir", outdir.as_ref()),
        ]);

        let output = run_tool(
            &self.config.rasterizer,
            args,
            dir,
            self.config.timeout,
            RenderErrorKind::ConversionFailure,
        )
        .await?;

        if !output.status.success() {
            return Err(RenderError::new(
                RenderErrorKind::ConversionFailure,
                failure_detail(&self.config.rasterizer.program, output.status, None, &output),
            ));
        }

        let png_path = out_stem.with_extension("png");
        let png = match tokio::fs::read(&png_path).await {
            Ok(bytes) if !bytes.is_empty() => bytes,
            _ => {
                return Err(RenderError::new(
                    RenderErrorKind::ConversionFailure,
                    "converter produced no page image",
                ))
            }
        };

        let decoded = image::load_from_memory_with_format(&png, image::ImageFormat::Png)
            .map_err(|e| {
                RenderError::new(
                    RenderErrorKind::ConversionFailure,
                    format!("converter output is not a valid PNG: {}", e),
                )
            })?;
        if decoded.width() == 0 || decoded.height() == 0 {
            return Err(RenderError::new(
                RenderErrorKind::ConversionFailure,
                "converter produced an empty image",
            ));
        }

        Ok(RenderedImage {
            width: decoded.width(),
            height: decoded.height(),
            png: png.into(),
        })
    }
}

#[async_trait]
impl Renderer for LatexRenderer {
    async fn render(&self, request: RenderRequest) -> Result<RenderedImage, RenderError> {
        let scratch = self.scratch_dir()?;
        let dir = scratch.path();
        debug!("Rendering in {:?}", dir);

        let tex = dir.join(format!("{}.tex", JOB_NAME));
        tokio::fs::write(&tex, wrap_document(&request.tikz_source))
            .await
            .map_err(|e| {
                RenderError::new(
                    RenderErrorKind::CompileFailure,
                    format!("could not write {:?}: {}", tex, e),
                )
            })?;

        self.compile(dir).await?;

        let pdf = dir.join(format!("{}.pdf", JOB_NAME));
        if !tokio::fs::try_exists(&pdf).await.unwrap_or(false) {
            return Err(RenderError::new(
                RenderErrorKind::CompileFailure,
                format!("{} exited successfully but produced no PDF", self.config.compiler.program),
            ));
        }

        let image = self.rasterize(dir, &pdf).await?;
        info!("Rendered {}x{} preview ({} bytes)", image.width, image.height, image.png.len());

        if let Err(e) = scratch.close() {
            warn!("Failed to remove scratch directory: {}", e);
        }
        Ok(image)
    }
}

/// Run one external tool to completion, bounded by `timeout`.
///
/// A missing executable is reported as `ToolchainMissing`; any other spawn
/// problem is reported with `spawn_failure` as its kind.
async fn run_tool(
    tool: &ToolCommand,
    args: Vec<String>,
    cwd: &Path,
    timeout: Duration,
    spawn_failure: RenderErrorKind,
) -> Result<std::process::Output, RenderError> {
    debug!(program = %tool.program, ?args, "Running tool");

    let child = Command::new(&tool.program)
        .args(&args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => RenderError::new(
                RenderErrorKind::ToolchainMissing,
                format!("`{}` was not found; is a TeX distribution installed and on PATH?", tool.program),
            ),
            _ => RenderError::new(spawn_failure, format!("could not start `{}`: {}", tool.program, e)),
        })?;

    // Dropping the wait future on timeout drops the child, which kills it
    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => Err(RenderError::new(
            spawn_failure,
            format!("failed waiting for `{}`: {}", tool.program, e),
        )),
        Err(_) => {
            warn!(program = %tool.program, ?timeout, "Tool timed out");
            Err(RenderError::new(
                RenderErrorKind::Timeout,
                format!("`{}` did not finish within {:?}", tool.program, timeout),
            ))
        }
    }
}

/// Exit status plus the tail of whatever diagnostics the tool left behind.
fn failure_detail(
    program: &str,
    status: ExitStatus,
    log: Option<&str>,
    output: &std::process::Output,
) -> String {
    let mut text = String::new();
    if let Some(log) = log {
        text.push_str(log);
    }
    for stream in [&output.stdout, &output.stderr] {
        let s = String::from_utf8_lossy(stream);
        if !s.trim().is_empty() && !text.contains(s.trim()) {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(&s);
        }
    }
    format!("{} exited with {}\n{}", program, status, tail(&text, MAX_DETAIL_CHARS))
}

fn tail(text: &str, max_chars: usize) -> &str {
    let text = text.trim_end();
    let count = text.chars().count();
    if count <= max_chars {
        return text;
    }
    let skip = count - max_chars;
    let start = text.char_indices().nth(skip).map(|(i, _)| i).unwrap_or(0);
    &text[start..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_document_keeps_environment() {
        let source = "\\begin{tikzpicture}\n\\draw (0,0) circle (1);\n\\end{tikzpicture}";
        let doc = wrap_document(source);
        assert!(doc.starts_with("\\documentclass[tikz,border=10pt]{standalone}"));
        assert!(doc.contains("\\usepackage{tikz}"));
        assert_eq!(doc.matches("\\begin{tikzpicture}").count(), 1);
        assert!(doc.contains(source));
        assert!(doc.trim_end().ends_with("\\end{document}"));
    }

    #[test]
    fn test_wrap_document_adds_environment() {
        let doc = wrap_document("\\draw (0,0) -- (1,1);");
        assert!(doc.contains("\\begin{tikzpicture}\n\\draw (0,0) -- (1,1);\n\\end{tikzpicture}"));
    }

    #[test]
    fn test_tail_keeps_end() {
        assert_eq!(tail("abcdef", 3), "def");
        assert_eq!(tail("abc\n\n", 10), "abc");
        assert_eq!(tail("ééé", 2), "éé");
    }

    #[test]
    fn test_error_display() {
        let err = RenderError::new(RenderErrorKind::Timeout, "`pdflatex` did not finish");
        assert_eq!(err.to_string(), "rendering timed out: `pdflatex` did not finish");
    }

    #[cfg(unix)]
    mod process {
        use super::*;
        use std::path::PathBuf;

        fn sh(script: &str, extra: &[&str]) -> ToolCommand {
            let mut args = vec!["-c", script, "sh"];
            args.extend_from_slice(extra);
            ToolCommand::new("sh", &args)
        }

        fn renderer(root: &Path, compiler: ToolCommand, rasterizer: ToolCommand) -> LatexRenderer {
            LatexRenderer::new(RenderConfig {
                compiler,
                rasterizer,
                timeout: Duration::from_secs(10),
                dpi: 72,
                scratch_dir: Some(root.to_path_buf()),
            })
        }

        fn entries(dir: &Path) -> usize {
            std::fs::read_dir(dir).unwrap().count()
        }

        fn fixture_png(dir: &Path) -> PathBuf {
            let path = dir.join("fixture.png");
            image::RgbaImage::from_pixel(4, 3, image::Rgba([255, 0, 0, 255]))
                .save(&path)
                .unwrap();
            path
        }

        /// Writes a fake PDF into the output directory, as a real compiler would
        fn fake_compiler() -> ToolCommand {
            sh("printf '%%PDF-1.4' > \"$1/diagram.pdf\"", &["{outdir}"])
        }

        #[tokio::test]
        async fn test_compile_failure_leaves_no_files() {
            let root = tempfile::tempdir().unwrap();
            let compiler = sh(
                "echo '! Missing } inserted.' > \"$1/diagram.log\"; echo 'pdflatex says no' >&2; exit 1",
                &["{outdir}"],
            );
            let r = renderer(root.path(), compiler, ToolCommand::pdftoppm());

            let err = r
                .render(RenderRequest::new("\\draw (0,0) -- (1,1);{"))
                .await
                .unwrap_err();

            assert_eq!(err.kind, RenderErrorKind::CompileFailure);
            assert!(err.detail.contains("Missing } inserted"), "{}", err.detail);
            assert!(err.detail.contains("pdflatex says no"), "{}", err.detail);
            assert_eq!(entries(root.path()), 0);
        }

        #[tokio::test]
        async fn test_compile_success_without_pdf_is_compile_failure() {
            let root = tempfile::tempdir().unwrap();
            let r = renderer(root.path(), sh("exit 0", &[]), ToolCommand::pdftoppm());

            let err = r.render(RenderRequest::new("x")).await.unwrap_err();
            assert_eq!(err.kind, RenderErrorKind::CompileFailure);
            assert_eq!(entries(root.path()), 0);
        }

        #[tokio::test]
        async fn test_missing_compiler_is_toolchain_missing() {
            let root = tempfile::tempdir().unwrap();
            let r = renderer(
                root.path(),
                ToolCommand::new("definitely-not-a-real-pdflatex", &["{tex}"]),
                ToolCommand::pdftoppm(),
            );

            let err = r.render(RenderRequest::new("x")).await.unwrap_err();
            assert_eq!(err.kind, RenderErrorKind::ToolchainMissing);
            assert_eq!(entries(root.path()), 0);
        }

        #[tokio::test]
        async fn test_slow_compiler_times_out() {
            let root = tempfile::tempdir().unwrap();
            let mut r = renderer(root.path(), sh("sleep 5", &[]), ToolCommand::pdftoppm());
            r.config.timeout = Duration::from_millis(200);

            let started = std::time::Instant::now();
            let err = r.render(RenderRequest::new("x")).await.unwrap_err();

            assert_eq!(err.kind, RenderErrorKind::Timeout);
            assert!(started.elapsed() < Duration::from_secs(4));
            assert_eq!(entries(root.path()), 0);
        }

        /// Running and not yet a zombie
        fn running(pid: &str) -> bool {
            std::process::Command::new("ps")
                .args(["-o", "stat=", "-p", pid])
                .output()
                .map(|out| {
                    let stat = String::from_utf8_lossy(&out.stdout);
                    let stat = stat.trim();
                    !stat.is_empty() && !stat.starts_with('Z')
                })
                .unwrap_or(false)
        }

        #[tokio::test]
        async fn test_cancelled_render_kills_compiler_and_cleans_up() {
            let root = tempfile::tempdir().unwrap();
            let fixtures = tempfile::tempdir().unwrap();
            let pidfile = fixtures.path().join("compiler.pid");
            let compiler = sh(
                "echo $$ > \"$1\"; exec sleep 30",
                &[pidfile.to_str().unwrap()],
            );
            let r = Arc::new(renderer(root.path(), compiler, ToolCommand::pdftoppm()));

            let started = std::time::Instant::now();
            let task = {
                let r = r.clone();
                tokio::spawn(async move { r.render(RenderRequest::new("x")).await })
            };

            let mut pid = String::new();
            while pid.is_empty() {
                assert!(started.elapsed() < Duration::from_secs(5), "compiler never started");
                tokio::time::sleep(Duration::from_millis(20)).await;
                pid = std::fs::read_to_string(&pidfile).unwrap_or_default().trim().to_string();
            }
            assert!(running(&pid));
            assert_eq!(entries(root.path()), 1);

            task.abort();
            assert!(task.await.unwrap_err().is_cancelled());

            // SIGKILL delivery is asynchronous
            let deadline = std::time::Instant::now() + Duration::from_secs(2);
            while running(&pid) && std::time::Instant::now() < deadline {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            assert!(!running(&pid), "compiler {} outlived the render", pid);
            assert_eq!(entries(root.path()), 0);
            assert!(started.elapsed() < Duration::from_secs(10));
        }

        #[tokio::test]
        async fn test_successful_render_returns_image() {
            let root = tempfile::tempdir().unwrap();
            let fixtures = tempfile::tempdir().unwrap();
            let png = fixture_png(fixtures.path());
            let rasterizer = sh(
                "cp \"$1\" \"$2.png\"",
                &[png.to_str().unwrap(), "{out}"],
            );
            let r = renderer(root.path(), fake_compiler(), rasterizer);

            let image = r
                .render(RenderRequest::new("\\draw (0,0) circle (1);"))
                .await
                .unwrap();

            assert!(!image.png.is_empty());
            assert_eq!((image.width, image.height), (4, 3));
            assert_eq!(entries(root.path()), 0);
        }

        #[tokio::test]
        async fn test_rasterizer_without_output_is_conversion_failure() {
            let root = tempfile::tempdir().unwrap();
            let r = renderer(root.path(), fake_compiler(), sh("exit 0", &[]));

            let err = r.render(RenderRequest::new("x")).await.unwrap_err();
            assert_eq!(err.kind, RenderErrorKind::ConversionFailure);
            assert_eq!(entries(root.path()), 0);
        }

        #[tokio::test]
        async fn test_rasterizer_garbage_is_conversion_failure() {
            let root = tempfile::tempdir().unwrap();
            let r = renderer(
                root.path(),
                fake_compiler(),
                sh("echo 'not a png' > \"$1.png\"", &["{out}"]),
            );

            let err = r.render(RenderRequest::new("x")).await.unwrap_err();
            assert_eq!(err.kind, RenderErrorKind::ConversionFailure);
        }

        #[tokio::test]
        async fn test_rasterizer_exit_code_is_conversion_failure() {
            let root = tempfile::tempdir().unwrap();
            let r = renderer(
                root.path(),
                fake_compiler(),
                sh("echo 'Syntax Error: bad pdf' >&2; exit 99", &[]),
            );

            let err = r.render(RenderRequest::new("x")).await.unwrap_err();
            assert_eq!(err.kind, RenderErrorKind::ConversionFailure);
            assert!(err.detail.contains("bad pdf"));
        }
    }
}
