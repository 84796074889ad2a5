//! Output types: the typed records parsed from the model and the result of a
//! reconstruction pass.

use crate::error::DocumentError;
use crate::pipeline::graph::PathwayGraph;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ── Reaction attributes ──────────────────────────────────────────────────

/// Whether the paper states a reaction as fact or only proposes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Certainty {
    #[default]
    Confirmed,
    Hypothetical,
}

impl Certainty {
    /// Lenient parse: anything other than "hypothetical" counts as confirmed.
    pub fn from_model_text(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("hypothetical") {
            Certainty::Hypothetical
        } else {
            Certainty::Confirmed
        }
    }

    /// Highlight colour used for this reaction's evidence in the PDF viewer.
    pub fn highlight_color(self) -> &'static str {
        match self {
            Certainty::Confirmed => "rgba(255, 255, 0, 0.4)",
            Certainty::Hypothetical => "rgba(255, 165, 0, 0.5)",
        }
    }
}

impl fmt::Display for Certainty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Certainty::Confirmed => f.write_str("Confirmed"),
            Certainty::Hypothetical => f.write_str("Hypothetical"),
        }
    }
}

/// Metabolic conversion or membrane transport.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ReactionKind {
    #[default]
    Metabolic,
    Transport,
    /// Whatever else the model wrote, kept verbatim.
    Other(String),
}

impl From<String> for ReactionKind {
    fn from(s: String) -> Self {
        let t = s.trim();
        if t.is_empty() || t.eq_ignore_ascii_case("metabolic") {
            ReactionKind::Metabolic
        } else if t.eq_ignore_ascii_case("transport") {
            ReactionKind::Transport
        } else {
            ReactionKind::Other(t.to_string())
        }
    }
}

impl From<ReactionKind> for String {
    fn from(k: ReactionKind) -> Self {
        k.to_string()
    }
}

impl fmt::Display for ReactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReactionKind::Metabolic => f.write_str("Metabolic"),
            ReactionKind::Transport => f.write_str("Transport"),
            ReactionKind::Other(s) => f.write_str(s),
        }
    }
}

/// One inhibitor or activator of a reaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegulatorEntry {
    pub regulator: String,
    /// Free-text description of the effect, when the model gave one.
    pub effect: Option<String>,
}

impl fmt::Display for RegulatorEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.effect {
            Some(effect) => write!(f, "{} ({})", self.regulator, effect),
            None => f.write_str(&self.regulator),
        }
    }
}

/// Regulation of a single reaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Regulation {
    pub inhibitors: Vec<RegulatorEntry>,
    pub activators: Vec<RegulatorEntry>,
    /// Set when the model described regulation as a plain string.
    pub note: Option<String>,
}

impl Regulation {
    pub fn is_empty(&self) -> bool {
        self.inhibitors.is_empty() && self.activators.is_empty() && self.note.is_none()
    }

    /// Full listing for the supplementary reactions table.
    pub fn summary(&self) -> String {
        if let Some(note) = &self.note {
            return note.clone();
        }
        let mut parts = Vec::new();
        if !self.inhibitors.is_empty() {
            parts.push(format!("Inhibitors: {}", join_entries(&self.inhibitors)));
        }
        if !self.activators.is_empty() {
            parts.push(format!("Activators: {}", join_entries(&self.activators)));
        }
        parts.join("; ")
    }

    /// Compact counts for the reaction cards: "Inhibitors: 2, Activators: 1".
    pub fn short_summary(&self) -> String {
        if let Some(note) = &self.note {
            return note.clone();
        }
        let mut parts = Vec::new();
        if !self.inhibitors.is_empty() {
            parts.push(format!("Inhibitors: {}", self.inhibitors.len()));
        }
        if !self.activators.is_empty() {
            parts.push(format!("Activators: {}", self.activators.len()));
        }
        if parts.is_empty() {
            "None".to_string()
        } else {
            parts.join(", ")
        }
    }
}

fn join_entries(entries: &[RegulatorEntry]) -> String {
    entries
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

// ── Records ──────────────────────────────────────────────────────────────

/// A pointer from a record back into the uploaded documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    /// Index of the document in upload order, once located.
    pub document: Option<usize>,
    /// 1-indexed page, once located.
    pub page: Option<usize>,
    pub snippet: String,
}

/// A reaction as returned by the model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reaction {
    /// Model-supplied identifier, or `R{n}` (1-indexed) when it gave none.
    pub id: String,
    pub kind: ReactionKind,
    pub certainty: Certainty,
    pub organ: Option<String>,
    pub organism: Option<String>,
    pub primary_source: Option<String>,
    pub substrates: Vec<String>,
    pub products: Vec<String>,
    pub enzymes: Vec<String>,
    pub cofactors: Vec<String>,
    pub reversible: Option<bool>,
    pub regulation: Regulation,
    pub compartment: Option<String>,
    pub evidence: Vec<String>,
}

impl Reaction {
    /// Enzyme label: names joined with ", ", or "Unknown".
    pub fn enzyme_label(&self) -> String {
        if self.enzymes.is_empty() {
            "Unknown".to_string()
        } else {
            self.enzymes.join(", ")
        }
    }

    /// "A + B ➝ C" equation line for the cards.
    pub fn equation(&self) -> String {
        format!(
            "{} \u{279D} {}",
            self.substrates.join(" + "),
            self.products.join(" + ")
        )
    }

    /// One reference per evidence quote, not yet located in any document.
    pub fn sources(&self) -> Vec<SourceRef> {
        self.evidence
            .iter()
            .map(|q| SourceRef {
                document: None,
                page: None,
                snippet: q.clone(),
            })
            .collect()
    }
}

/// A metabolite entry from the model's `metabolites` list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metabolite {
    pub name: String,
    /// Any further fields the model sent, stringified.
    pub attributes: BTreeMap<String, String>,
}

/// An enzyme entry from the model's `enzymes` list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Enzyme {
    pub name: String,
    pub attributes: BTreeMap<String, String>,
}

/// Inhibition or activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegulationEffect {
    Inhibition,
    Activation,
}

/// One regulator acting on one reaction, flattened out of [`Regulation`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegulationEvent {
    pub regulator: String,
    pub effect: RegulationEffect,
    pub note: Option<String>,
    /// Id of the regulated reaction.
    pub reaction_id: String,
}

/// One typed record produced by the response parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "record", rename_all = "snake_case")]
pub enum ExtractedRecord {
    Reaction(Reaction),
    Metabolite(Metabolite),
    Enzyme(Enzyme),
    RegulationEvent(RegulationEvent),
}

impl ExtractedRecord {
    /// Name or identifier of the record.
    pub fn name(&self) -> &str {
        match self {
            ExtractedRecord::Reaction(r) => &r.id,
            ExtractedRecord::Metabolite(m) => &m.name,
            ExtractedRecord::Enzyme(e) => &e.name,
            ExtractedRecord::RegulationEvent(ev) => &ev.regulator,
        }
    }

    /// References into the source documents. Only reactions carry quotes.
    pub fn sources(&self) -> Vec<SourceRef> {
        match self {
            ExtractedRecord::Reaction(r) => r.sources(),
            _ => Vec::new(),
        }
    }
}

/// The typed view of the model's JSON pathway object.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PathwayModel {
    pub reactions: Vec<Reaction>,
    pub metabolites: Vec<Metabolite>,
    pub enzymes: Vec<Enzyme>,
    /// The JSON exactly as parsed, for the raw-data panel.
    pub raw: serde_json::Value,
}

impl PathwayModel {
    /// Regulation events of every reaction, in reaction order.
    pub fn regulation_events(&self) -> Vec<RegulationEvent> {
        let mut events = Vec::new();
        for rxn in &self.reactions {
            let inhibitors = rxn
                .regulation
                .inhibitors
                .iter()
                .map(|e| (e, RegulationEffect::Inhibition));
            let activators = rxn
                .regulation
                .activators
                .iter()
                .map(|e| (e, RegulationEffect::Activation));
            for (entry, effect) in inhibitors.chain(activators) {
                events.push(RegulationEvent {
                    regulator: entry.regulator.clone(),
                    effect,
                    note: entry.effect.clone(),
                    reaction_id: rxn.id.clone(),
                });
            }
        }
        events
    }

    /// Every record: reactions, metabolites, enzymes, then regulation events.
    pub fn records(&self) -> Vec<ExtractedRecord> {
        self.reactions
            .iter()
            .cloned()
            .map(ExtractedRecord::Reaction)
            .chain(self.metabolites.iter().cloned().map(ExtractedRecord::Metabolite))
            .chain(self.enzymes.iter().cloned().map(ExtractedRecord::Enzyme))
            .chain(
                self.regulation_events()
                    .into_iter()
                    .map(ExtractedRecord::RegulationEvent),
            )
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.reactions.is_empty() && self.metabolites.is_empty() && self.enzymes.is_empty()
    }
}

/// Why the parser produced nothing from an otherwise successful response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParseDiagnostic {
    /// Neither a fenced block nor a `{ … }` span was present.
    NoJsonFound,
    /// A JSON span was found but `serde_json` rejected it.
    InvalidJson { detail: String },
    /// Valid JSON, but not an object.
    NotAnObject,
}

impl fmt::Display for ParseDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseDiagnostic::NoJsonFound => f.write_str("No JSON block found in response."),
            ParseDiagnostic::InvalidJson { detail } => write!(f, "JSON Parsing Error: {detail}"),
            ParseDiagnostic::NotAnObject => {
                f.write_str("The JSON in the response is not a pathway object.")
            }
        }
    }
}

/// Output of the response parser.
#[derive(Debug, Clone, Default)]
pub struct ParsedResponse {
    pub model: PathwayModel,
    /// Plain-language explanation with the JSON block and headings removed.
    pub explanation: String,
    pub diagnostic: Option<ParseDiagnostic>,
}

// ── Reconstruction result ────────────────────────────────────────────────

/// Counters for one reconstruction pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconstructionStats {
    pub documents: usize,
    pub total_bytes: usize,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub records: usize,
    pub reactions: usize,
    pub graph_nodes: usize,
    pub graph_edges: usize,
    pub llm_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Everything one extraction pass produced.
#[derive(Debug, Clone)]
pub struct Reconstruction {
    pub model: PathwayModel,
    pub explanation: String,
    /// The model's full text, for the debug panel.
    pub raw_text: String,
    pub diagnostic: Option<ParseDiagnostic>,
    pub graph: PathwayGraph,
    pub stats: ReconstructionStats,
}

// ── Evidence ─────────────────────────────────────────────────────────────

/// One highlighted word in a PDF page.
///
/// Coordinates are PDF points with a top-left origin, ready to be scaled by
/// the viewer's render scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    /// 1-indexed.
    pub page: usize,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub color: String,
    pub quote: String,
}

/// Evidence highlights found in one uploaded document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentEvidence {
    pub filename: String,
    pub annotations: Vec<Annotation>,
    pub error: Option<DocumentError>,
}

impl DocumentEvidence {
    /// First page on which `quote` was highlighted.
    pub fn page_of(&self, quote: &str) -> Option<usize> {
        self.annotations
            .iter()
            .find(|a| a.quote == quote)
            .map(|a| a.page)
    }

    /// `source` pinned to this document, if its snippet was highlighted here.
    pub fn locate(&self, document: usize, source: &SourceRef) -> Option<SourceRef> {
        self.page_of(&source.snippet).map(|page| SourceRef {
            document: Some(document),
            page: Some(page),
            snippet: source.snippet.clone(),
        })
    }
}

/// Pin `source` to the first document whose evidence highlights it.
///
/// `evidence` pairs each located document with its upload index. A snippet
/// found nowhere comes back unchanged.
pub fn locate_source<'a>(
    source: SourceRef,
    evidence: impl IntoIterator<Item = (usize, &'a DocumentEvidence)>,
) -> SourceRef {
    evidence
        .into_iter()
        .find_map(|(index, ev)| ev.locate(index, &source))
        .unwrap_or(source)
}
