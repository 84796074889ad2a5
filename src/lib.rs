//! # pathway-recon
//!
//! Reconstruct metabolic pathways from scientific papers.
//!
//! One or more PDFs go to Gemini as inline documents together with an
//! extraction prompt. The answer (a JSON pathway model followed by a prose
//! explanation) is parsed leniently into typed records, turned into a
//! bipartite metabolite/reaction graph, and served through a small dashboard
//! with an evidence viewer that highlights the supporting quotes in the PDFs.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDFs
//!  │
//!  ├─ 1. Intake    validate uploads (size, %PDF- magic)
//!  ├─ 2. Request   inline documents + prompt → Gemini generateContent
//!  ├─ 3. Parse     locate JSON, read records, keep the explanation
//!  ├─ 4. Graph     bipartite DiGraph, common cofactors hidden
//!  ├─ 5. Export    DOT / SVG / PNG via Graphviz
//!  └─ 6. Evidence  fuzzy-match quotes against pdfium word boxes
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pathway_recon::{reconstruct_paths, ReconstructionConfig};
//! use std::path::PathBuf;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Key read from GOOGLE_API_KEY (or .env)
//!     let config = ReconstructionConfig::from_env()?;
//!     let result = reconstruct_paths(&[PathBuf::from("paper.pdf")], &config).await?;
//!     println!("{}", result.explanation);
//!     eprintln!("{} reactions, {} graph nodes",
//!         result.stats.reactions,
//!         result.stats.graph_nodes);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pathway-recon` binary (clap + anyhow + tracing-subscriber) |
//!
//! ## External tools
//!
//! SVG and PNG export shell out to Graphviz `dot`. Evidence highlighting binds
//! the pdfium shared library at runtime. Both are optional: without them the
//! dashboard still shows the model, the tables and DOT downloads.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod prompts;
pub mod reconstruct;
pub mod web;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ReconstructionConfig, ReconstructionConfigBuilder, ServerConfig};
pub use error::{DocumentError, PathwayError};
pub use output::{
    Annotation, Certainty, DocumentEvidence, Enzyme, ExtractedRecord, Metabolite,
    ParseDiagnostic, ParsedResponse, PathwayModel, Reaction, ReactionKind, Reconstruction,
    ReconstructionStats, Regulation, RegulationEffect, RegulationEvent, RegulatorEntry,
    SourceRef,
};
pub use pipeline::export::ExportFormat;
pub use pipeline::graph::{GraphOptions, PathwayGraph};
pub use pipeline::intake::Document;
pub use pipeline::request::{ExtractionProvider, ExtractionRequest, GeminiProvider, ModelResponse};
pub use reconstruct::{reconstruct, reconstruct_paths, reconstruct_sync};
pub use web::serve;
