//! Pipeline stages for pathway reconstruction.
//!
//! Each submodule implements exactly one step, so each is testable on its
//! own and the web layer can call the steps it needs in isolation.
//!
//! ## Data Flow
//!
//! ```text
//! intake ──▶ request ──▶ parse ──▶ graph ──▶ export
//! (PDFs)     (Gemini)    (JSON)    (petgraph) (DOT/SVG/PNG)
//!   │
//!   └──────▶ evidence (pdfium words + fuzzy quote match)
//! ```
//!
//! 1. [`intake`]   — validate uploaded bytes as PDFs
//! 2. [`request`]  — one `generateContent` call with every PDF inline; the
//!    only stage with network I/O
//! 3. [`parse`]    — best-effort JSON location and shape matching
//! 4. [`graph`]    — bipartite metabolite/reaction graph
//! 5. [`export`]   — DOT text, Graphviz-rendered SVG and PNG
//! 6. [`evidence`] — highlight boxes for the viewer; runs in
//!    `spawn_blocking` because pdfium is not async-safe

pub mod evidence;
pub mod export;
pub mod graph;
pub mod intake;
pub mod parse;
pub mod request;
