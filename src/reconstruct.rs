//! Reconstruction entry points: documents in, parsed model and graph out.
//!
//! One pass is one model request. The model's answer is parsed best-effort
//! and the graph rebuilt from scratch, so the result is always internally
//! consistent even when the parser found nothing.

use crate::config::ReconstructionConfig;
use crate::error::PathwayError;
use crate::output::{Reconstruction, ReconstructionStats};
use crate::pipeline::graph::PathwayGraph;
use crate::pipeline::intake::{self, Document};
use crate::pipeline::parse;
use crate::pipeline::request::{resolve_provider, ExtractionRequest};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Reconstruct a pathway from accepted documents.
///
/// # Errors
/// Returns `Err(PathwayError)` only when the model could not be asked or did
/// not answer: no documents, provider not configured, API failure, or an
/// empty response. A response the parser cannot use is *not* an error; see
/// [`Reconstruction::diagnostic`].
pub async fn reconstruct(
    documents: &[Document],
    config: &ReconstructionConfig,
) -> Result<Reconstruction, PathwayError> {
    let total_start = Instant::now();
    if documents.is_empty() {
        return Err(PathwayError::NoDocuments);
    }

    // ── Step 1: Provider ─────────────────────────────────────────────────
    let provider = resolve_provider(config)?;

    // ── Step 2: Request ──────────────────────────────────────────────────
    let request = ExtractionRequest::new(documents, config);
    let total_bytes: usize = documents.iter().map(Document::len).sum();
    info!(
        "Reconstructing from {} document(s), {} bytes, via {}",
        documents.len(),
        total_bytes,
        provider.name()
    );

    let llm_start = Instant::now();
    let response = provider.extract(&request).await?;
    let llm_duration_ms = llm_start.elapsed().as_millis() as u64;
    debug!(
        "Model answered in {} ms ({} chars)",
        llm_duration_ms,
        response.text.len()
    );

    // ── Step 3: Parse ────────────────────────────────────────────────────
    let parsed = parse::parse_response(&response.text);
    if let Some(ref diag) = parsed.diagnostic {
        warn!("Response could not be parsed: {}", diag);
    }

    // ── Step 4: Graph ────────────────────────────────────────────────────
    let graph = PathwayGraph::build(&parsed.model.reactions, &config.graph);

    let stats = ReconstructionStats {
        documents: documents.len(),
        total_bytes,
        input_tokens: response.input_tokens,
        output_tokens: response.output_tokens,
        records: parsed.model.records().len(),
        reactions: parsed.model.reactions.len(),
        graph_nodes: graph.node_count(),
        graph_edges: graph.edge_count(),
        llm_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };
    info!(
        "Reconstruction complete: {} reactions, {} records, graph {} nodes / {} edges",
        stats.reactions, stats.records, stats.graph_nodes, stats.graph_edges
    );

    Ok(Reconstruction {
        model: parsed.model,
        explanation: parsed.explanation,
        raw_text: response.text,
        diagnostic: parsed.diagnostic,
        graph,
        stats,
    })
}

/// Read local PDFs and reconstruct from them.
pub async fn reconstruct_paths(
    paths: &[PathBuf],
    config: &ReconstructionConfig,
) -> Result<Reconstruction, PathwayError> {
    let documents = intake::read_paths(paths, config.max_upload_bytes).await?;
    reconstruct(&documents, config).await
}

/// Synchronous wrapper around [`reconstruct`].
///
/// Creates a temporary tokio runtime internally.
pub fn reconstruct_sync(
    documents: &[Document],
    config: &ReconstructionConfig,
) -> Result<Reconstruction, PathwayError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| PathwayError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(reconstruct(documents, config))
}
