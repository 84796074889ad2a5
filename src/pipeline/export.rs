//! Export: pathway graph → DOT source, SVG and high-resolution PNG.
//!
//! DOT is written by hand; SVG and PNG are rendered by piping the DOT source
//! through the Graphviz `dot` executable (`tokio::process`). The PNG variant
//! gets a `dpi` attribute injected first.
//!
//! An empty graph never reaches Graphviz: it exports as a DOT file with no
//! nodes, a fixed "No pathway to display" SVG, and a small blank PNG.

use crate::config::ReconstructionConfig;
use crate::error::PathwayError;
use crate::pipeline::graph::{NodeKind, PathwayGraph};
use image::{ImageFormat, Rgb, RgbImage};
use std::fmt::Write as _;
use std::io::{Cursor, Write as _};
use std::path::Path;
use std::process::Stdio;
use std::str::FromStr;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Fill colour of reaction nodes.
pub const REACTION_FILL: &str = "#fff9c4";
/// Fill colour of metabolite nodes.
pub const METABOLITE_FILL: &str = "#e1f5fe";

/// SVG served for an empty graph.
pub const EMPTY_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="400" height="120" viewBox="0 0 400 120"><rect width="400" height="120" fill="#ffffff"/><text x="200" y="64" font-family="Helvetica, Arial, sans-serif" font-size="16" fill="#666666" text-anchor="middle">No pathway to display</text></svg>"##;

const EMPTY_PNG_SIZE: (u32, u32) = (400, 120);

/// Downloadable graph formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Png,
    Svg,
    Dot,
}

impl ExportFormat {
    /// Attachment filename offered to the browser.
    pub fn file_name(self) -> &'static str {
        match self {
            ExportFormat::Png => "pathway_graph_highres.png",
            ExportFormat::Svg => "pathway_graph.svg",
            ExportFormat::Dot => "pathway_graph.dot",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ExportFormat::Png => "image/png",
            ExportFormat::Svg => "image/svg+xml",
            ExportFormat::Dot => "text/vnd.graphviz; charset=utf-8",
        }
    }

    /// Graphviz `-T` output type.
    fn graphviz_type(self) -> &'static str {
        match self {
            ExportFormat::Png => "png",
            ExportFormat::Svg => "svg",
            ExportFormat::Dot => "dot",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = PathwayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(ExportFormat::Png),
            "svg" => Ok(ExportFormat::Svg),
            "dot" | "gv" => Ok(ExportFormat::Dot),
            other => Err(PathwayError::ExportFailed {
                format: other.to_string(),
                detail: "unsupported format (expected png, svg or dot)".to_string(),
            }),
        }
    }
}

// ── DOT ──────────────────────────────────────────────────────────────────

/// Serialise the graph as Graphviz DOT: node declarations, then edges.
pub fn to_dot(graph: &PathwayGraph) -> String {
    let mut dot = String::from("digraph MetabolicPathway {\n");
    dot.push_str("  rankdir=LR;\n");
    dot.push_str("  nodesep=0.6;\n");
    dot.push_str("  ranksep=0.8;\n");
    dot.push_str("  splines=ortho;\n");
    dot.push_str("  overlap=false;\n");
    dot.push_str("  node [fontname=\"Helvetica\", fontsize=10];\n");
    dot.push_str("  edge [fontname=\"Helvetica\", fontsize=9];\n");

    for node in graph.nodes() {
        let label = escape_label(&node.label);
        let _ = match node.kind {
            NodeKind::Reaction => writeln!(
                dot,
                "  {} [shape=ellipse, style=filled, fillcolor=\"{REACTION_FILL}\", label=\"{label}\", fontsize=8];",
                node.id
            ),
            NodeKind::Metabolite => writeln!(
                dot,
                "  {} [shape=box, style=filled, fillcolor=\"{METABOLITE_FILL}\", label=\"{label}\"];",
                node.id
            ),
        };
    }
    for (from, to, _) in graph.edges() {
        let _ = writeln!(dot, "  {} -> {};", from.id, to.id);
    }

    dot.push('}');
    dot.push('\n');
    dot
}

/// Inject a graph-level `dpi` attribute right after the opening brace.
pub fn with_dpi(dot: &str, dpi: u32) -> String {
    dot.replacen('{', &format!("{{\n  dpi={dpi};"), 1)
}

fn escape_label(label: &str) -> String {
    label
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

// ── Rendering ────────────────────────────────────────────────────────────

/// Render the graph in `format`.
///
/// # Errors
/// [`PathwayError::ExportFailed`] when `dot` is missing or exits non-zero.
pub async fn export(
    graph: &PathwayGraph,
    format: ExportFormat,
    config: &ReconstructionConfig,
) -> Result<Vec<u8>, PathwayError> {
    if graph.is_empty() {
        debug!("Empty graph: serving {:?} placeholder", format);
        return placeholder(format);
    }

    let dot = to_dot(graph);
    match format {
        ExportFormat::Dot => Ok(dot.into_bytes()),
        ExportFormat::Svg => run_graphviz(&dot, format, &config.dot_binary).await,
        ExportFormat::Png => {
            let dot = with_dpi(&dot, config.export_dpi);
            run_graphviz(&dot, format, &config.dot_binary).await
        }
    }
}

/// Placeholder bytes for an empty graph.
pub fn placeholder(format: ExportFormat) -> Result<Vec<u8>, PathwayError> {
    match format {
        ExportFormat::Dot => Ok(to_dot(&PathwayGraph::default()).into_bytes()),
        ExportFormat::Svg => Ok(EMPTY_SVG.as_bytes().to_vec()),
        ExportFormat::Png => {
            let (w, h) = EMPTY_PNG_SIZE;
            let img = RgbImage::from_pixel(w, h, Rgb([255, 255, 255]));
            let mut buf = Cursor::new(Vec::new());
            img.write_to(&mut buf, ImageFormat::Png)
                .map_err(|e| PathwayError::ExportFailed {
                    format: "png".into(),
                    detail: e.to_string(),
                })?;
            Ok(buf.into_inner())
        }
    }
}

async fn run_graphviz(
    dot: &str,
    format: ExportFormat,
    binary: &Path,
) -> Result<Vec<u8>, PathwayError> {
    let fail = |detail: String| PathwayError::ExportFailed {
        format: format.graphviz_type().to_string(),
        detail,
    };

    let mut child = tokio::process::Command::new(binary)
        .arg(format!("-T{}", format.graphviz_type()))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| fail(format!("could not start '{}': {e}", binary.display())))?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| fail("stdin unavailable".into()))?;
    let input = dot.as_bytes().to_vec();
    let writer = tokio::spawn(async move {
        let res = stdin.write_all(&input).await;
        drop(stdin);
        res
    });

    let output = child
        .wait_with_output()
        .await
        .map_err(|e| fail(format!("graphviz did not finish: {e}")))?;
    match writer.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(fail(format!("writing DOT to graphviz: {e}"))),
        Err(e) => return Err(fail(format!("writer task: {e}"))),
    }

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        warn!("graphviz exited with {}: {}", output.status, stderr.trim());
        return Err(fail(format!("graphviz exited with {}", output.status)));
    }
    if output.stdout.is_empty() {
        return Err(fail("graphviz produced no output".into()));
    }

    debug!(
        "graphviz rendered {} ({} bytes)",
        format.graphviz_type(),
        output.stdout.len()
    );
    Ok(output.stdout)
}

/// True when the configured `dot` binary can be executed.
pub async fn graphviz_available(config: &ReconstructionConfig) -> bool {
    tokio::process::Command::new(&config.dot_binary)
        .arg("-V")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Export the graph and write it to `path`.
///
/// Writes to a temporary file in the target directory and renames it into
/// place, so a reader never sees a partial file.
pub async fn export_to_file(
    graph: &PathwayGraph,
    format: ExportFormat,
    path: impl AsRef<Path>,
    config: &ReconstructionConfig,
) -> Result<usize, PathwayError> {
    let bytes = export(graph, format, config).await?;
    let path = path.as_ref().to_path_buf();
    let len = bytes.len();

    let target = path.clone();
    tokio::task::spawn_blocking(move || -> Result<(), PathwayError> {
        let write_err = |source: std::io::Error| PathwayError::OutputWriteFailed {
            path: target.clone(),
            source,
        };
        let parent = match target.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => std::path::PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent).map_err(write_err)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&parent).map_err(write_err)?;
        tmp.write_all(&bytes).map_err(write_err)?;
        tmp.persist(&target).map_err(|e| write_err(e.error))?;
        Ok(())
    })
    .await
    .map_err(|e| PathwayError::Internal(format!("export writer panicked: {e}")))??;

    info!("Wrote {} ({} bytes)", path.display(), len);
    Ok(len)
}
