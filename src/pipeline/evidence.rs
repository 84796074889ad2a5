//! Evidence location: find each reaction's quotes inside the uploaded PDFs.
//!
//! Words and their boxes come from each page's text layer via pdfium. For
//! every quote, word windows of roughly the quote's length are compared with
//! the quote using a normalised edit-distance similarity; the best window on a
//! page at or above the threshold becomes one [`Annotation`] per word, so a
//! highlight follows the text across line breaks.
//!
//! Matching works on plain [`PageWords`] so it can be exercised without
//! pdfium. The pdfium part runs in `spawn_blocking` since pdfium is
//! CPU-bound and not async-safe.

use crate::config::ReconstructionConfig;
use crate::error::{DocumentError, PathwayError};
use crate::output::{Annotation, DocumentEvidence, PathwayModel};
use crate::pipeline::intake::Document;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Quotes shorter than this (after whitespace collapse) are not searched.
pub const MIN_QUOTE_CHARS: usize = 5;

/// A word on a page, in PDF points with a top-left origin.
#[derive(Debug, Clone, PartialEq)]
pub struct Word {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Words of one page.
#[derive(Debug, Clone, Default)]
pub struct PageWords {
    /// 1-indexed.
    pub page: usize,
    pub words: Vec<Word>,
}

/// One quote to highlight.
#[derive(Debug, Clone, PartialEq)]
pub struct EvidenceItem {
    pub quote: String,
    pub color: String,
    pub reaction_id: String,
}

/// Every evidence quote of every reaction, coloured by certainty.
pub fn evidence_items(model: &PathwayModel) -> Vec<EvidenceItem> {
    model
        .reactions
        .iter()
        .flat_map(|rxn| {
            rxn.evidence.iter().map(move |quote| EvidenceItem {
                quote: quote.clone(),
                color: rxn.certainty.highlight_color().to_string(),
                reaction_id: rxn.id.clone(),
            })
        })
        .collect()
}

// ── Matching ─────────────────────────────────────────────────────────────

/// Collapse runs of whitespace to one space and trim.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Similarity of two strings on a 0–100 scale.
pub fn similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(a, b) * 100.0
}

/// Best-matching word range `[start, end)` for `quote` on one page.
///
/// `quote` must already be collapsed and lowercased. A window is scored only
/// when its length allows the threshold: the edit distance is at least the
/// length difference, so `score <= 100 * (1 - gap / longer)`.
fn best_window(lowered: &[String], quote: &str, threshold: f64) -> Option<(usize, usize)> {
    let n = quote.split(' ').count();
    let quote_len = quote.chars().count();
    let max_distance_ratio = 1.0 - threshold / 100.0;

    // chars[i] = characters in lowered[..i]
    let mut chars = vec![0usize; lowered.len() + 1];
    for (i, w) in lowered.iter().enumerate() {
        chars[i + 1] = chars[i] + w.chars().count();
    }

    let mut best: Option<(f64, usize, usize)> = None;
    for start in 0..lowered.len() {
        for size in n.saturating_sub(2).max(1)..=n + 4 {
            let end = start + size;
            if end > lowered.len() {
                break;
            }
            let window_len = chars[end] - chars[start] + size - 1;
            let gap = window_len.abs_diff(quote_len) as f64;
            let longer = window_len.max(quote_len) as f64;
            if gap > longer * max_distance_ratio + 1e-9 {
                continue;
            }
            let score = similarity(quote, &lowered[start..end].join(" "));
            if best.map_or(true, |(s, _, _)| score > s) {
                best = Some((score, start, end));
            }
        }
    }

    best.filter(|(score, _, _)| *score >= threshold)
        .map(|(_, start, end)| (start, end))
}

/// Locate every evidence item on the given pages.
///
/// A quote can match on several pages; each page contributes its own best
/// window.
pub fn find_annotations(pages: &[PageWords], items: &[EvidenceItem], threshold: u8) -> Vec<Annotation> {
    let threshold = f64::from(threshold);
    let mut annotations = Vec::new();

    for page in pages {
        if page.words.is_empty() {
            continue;
        }
        let lowered: Vec<String> = page.words.iter().map(|w| w.text.to_lowercase()).collect();

        for item in items {
            let quote = collapse_whitespace(&item.quote);
            if quote.chars().count() < MIN_QUOTE_CHARS {
                continue;
            }
            let quote_lower = quote.to_lowercase();
            let Some((start, end)) = best_window(&lowered, &quote_lower, threshold)
            else {
                continue;
            };
            annotations.extend(page.words[start..end].iter().map(|w| Annotation {
                page: page.page,
                x: w.x,
                y: w.y,
                width: w.width,
                height: w.height,
                color: item.color.clone(),
                quote: item.quote.clone(),
            }));
        }
    }
    annotations
}

// ── pdfium ───────────────────────────────────────────────────────────────

/// Bind pdfium: `PDFIUM_LIB_PATH` (file or directory), the working
/// directory, then the system library.
pub fn bind_pdfium() -> Result<Pdfium, PathwayError> {
    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Ok(env_path) = std::env::var("PDFIUM_LIB_PATH") {
        let p = PathBuf::from(env_path);
        if p.is_dir() {
            candidates.push(Pdfium::pdfium_platform_library_name_at_path(&p));
        } else {
            candidates.push(p);
        }
    }
    candidates.push(Pdfium::pdfium_platform_library_name_at_path("./"));

    for path in &candidates {
        if path.exists() {
            match Pdfium::bind_to_library(path) {
                Ok(bindings) => return Ok(Pdfium::new(bindings)),
                Err(e) => debug!("pdfium bind failed at {}: {}", path.display(), e),
            }
        }
    }

    Pdfium::bind_to_system_library()
        .map(Pdfium::new)
        .map_err(|e| PathwayError::PdfiumBindingFailed(e.to_string()))
}

/// Read the words of every page of a PDF.
///
/// Pages whose text layer cannot be read are reported and skipped.
pub fn extract_words(
    pdfium: &Pdfium,
    filename: &str,
    bytes: &[u8],
) -> Result<(Vec<PageWords>, Vec<DocumentError>), DocumentError> {
    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| DocumentError::TextLayerUnavailable {
            filename: filename.to_string(),
            detail: e.to_string(),
        })?;

    let mut pages = Vec::new();
    let mut errors = Vec::new();
    for (idx, page) in document.pages().iter().enumerate() {
        let page_no = idx + 1;
        let page_height = page.height().value;
        let text = match page.text() {
            Ok(t) => t,
            Err(e) => {
                errors.push(DocumentError::PageUnreadable {
                    filename: filename.to_string(),
                    page: page_no,
                    detail: e.to_string(),
                });
                continue;
            }
        };

        let mut builder = WordBuilder::new(page_height);
        for ch in text.chars().iter() {
            let Some(c) = ch.unicode_char() else {
                builder.finish();
                continue;
            };
            match ch.loose_bounds() {
                Ok(rect) => builder.push(
                    c,
                    rect.left().value,
                    rect.right().value,
                    rect.top().value,
                    rect.bottom().value,
                ),
                Err(_) => builder.finish(),
            }
        }
        pages.push(PageWords {
            page: page_no,
            words: builder.into_words(),
        });
    }
    Ok((pages, errors))
}

/// Groups characters into words, splitting on whitespace and line changes.
struct WordBuilder {
    page_height: f32,
    words: Vec<Word>,
    text: String,
    left: f32,
    right: f32,
    top: f32,
    bottom: f32,
}

impl WordBuilder {
    fn new(page_height: f32) -> Self {
        Self {
            page_height,
            words: Vec::new(),
            text: String::new(),
            left: 0.0,
            right: 0.0,
            top: 0.0,
            bottom: 0.0,
        }
    }

    /// Add a character; bounds are PDF user space (bottom-left origin).
    fn push(&mut self, c: char, left: f32, right: f32, top: f32, bottom: f32) {
        if c.is_whitespace() || c.is_control() {
            self.finish();
            return;
        }
        if !self.text.is_empty() {
            let line_height = (self.top - self.bottom).max(1.0);
            let centre = (top + bottom) / 2.0;
            let current = (self.top + self.bottom) / 2.0;
            if (centre - current).abs() > line_height * 0.6 {
                self.finish();
            }
        }
        if self.text.is_empty() {
            self.left = left;
            self.right = right;
            self.top = top;
            self.bottom = bottom;
        } else {
            self.left = self.left.min(left);
            self.right = self.right.max(right);
            self.top = self.top.max(top);
            self.bottom = self.bottom.min(bottom);
        }
        self.text.push(c);
    }

    fn finish(&mut self) {
        if self.text.is_empty() {
            return;
        }
        self.words.push(Word {
            text: std::mem::take(&mut self.text),
            x: self.left,
            y: self.page_height - self.top,
            width: self.right - self.left,
            height: self.top - self.bottom,
        });
    }

    fn into_words(mut self) -> Vec<Word> {
        self.finish();
        self.words
    }
}

/// Locate the model's evidence in every uploaded document.
///
/// Never fails: a document whose text layer cannot be read (or a missing
/// pdfium library) yields an entry with `error` set and whatever
/// annotations were found before the failure.
pub async fn locate_evidence(
    documents: &[Document],
    model: &PathwayModel,
    config: &ReconstructionConfig,
) -> Vec<DocumentEvidence> {
    let items = evidence_items(model);
    let threshold = config.fuzzy_threshold;
    let docs: Vec<(String, Arc<[u8]>)> = documents
        .iter()
        .map(|d| (d.filename().to_string(), d.shared_bytes()))
        .collect();
    let names: Vec<String> = docs.iter().map(|(n, _)| n.clone()).collect();

    let result = tokio::task::spawn_blocking(move || locate_blocking(&docs, &items, threshold)).await;

    match result {
        Ok(evidence) => evidence,
        Err(e) => {
            warn!("Evidence task panicked: {}", e);
            names
                .into_iter()
                .map(|filename| DocumentEvidence {
                    error: Some(DocumentError::TextLayerUnavailable {
                        filename: filename.clone(),
                        detail: format!("evidence task failed: {e}"),
                    }),
                    filename,
                    annotations: Vec::new(),
                })
                .collect()
        }
    }
}

fn locate_blocking(
    docs: &[(String, Arc<[u8]>)],
    items: &[EvidenceItem],
    threshold: u8,
) -> Vec<DocumentEvidence> {
    let pdfium = match bind_pdfium() {
        Ok(p) => p,
        Err(e) => {
            warn!("{}", e);
            return docs
                .iter()
                .map(|(filename, _)| DocumentEvidence {
                    filename: filename.clone(),
                    annotations: Vec::new(),
                    error: Some(DocumentError::TextLayerUnavailable {
                        filename: filename.clone(),
                        detail: e.to_string(),
                    }),
                })
                .collect();
        }
    };

    docs.iter()
        .map(|(filename, bytes)| match extract_words(&pdfium, filename, bytes) {
            Ok((pages, mut errors)) => {
                let annotations = find_annotations(&pages, items, threshold);
                info!(
                    "{}: {} highlight box(es) on {} page(s)",
                    filename,
                    annotations.len(),
                    pages.len()
                );
                for err in &errors {
                    warn!("{}", err);
                }
                DocumentEvidence {
                    filename: filename.clone(),
                    annotations,
                    error: if errors.is_empty() {
                        None
                    } else {
                        Some(errors.remove(0))
                    },
                }
            }
            Err(err) => {
                warn!("{}", err);
                DocumentEvidence {
                    filename: filename.clone(),
                    annotations: Vec::new(),
                    error: Some(err),
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{Certainty, Reaction};

    fn page(no: usize, text: &str) -> PageWords {
        let words = text
            .split_whitespace()
            .enumerate()
            .map(|(i, w)| Word {
                text: w.to_string(),
                x: 10.0 * i as f32,
                y: 100.0,
                width: 8.0,
                height: 12.0,
            })
            .collect();
        PageWords { page: no, words }
    }

    fn item(quote: &str) -> EvidenceItem {
        EvidenceItem {
            quote: quote.to_string(),
            color: Certainty::Confirmed.highlight_color().to_string(),
            reaction_id: "R1".to_string(),
        }
    }

    #[test]
    fn exact_quote_found_on_the_right_page() {
        let pages = vec![
            page(1, "Introduction to the study of hepatic metabolism in mice."),
            page(
                2,
                "In hepatocytes, hexokinase phosphorylates glucose to glucose-6-phosphate, trapping it.",
            ),
        ];
        let anns = find_annotations(
            &pages,
            &[item("hexokinase phosphorylates glucose to glucose-6-phosphate")],
            85,
        );
        assert_eq!(anns.len(), 5);
        assert!(anns.iter().all(|a| a.page == 2));
        assert_eq!(anns[0].x, 20.0);
        assert_eq!(anns[0].color, "rgba(255, 255, 0, 0.4)");
    }

    #[test]
    fn whitespace_and_case_differences_still_match() {
        let pages = vec![page(1, "Pyruvate Is Carboxylated by pyruvate carboxylase in mitochondria")];
        let anns = find_annotations(
            &pages,
            &[item("pyruvate is carboxylated\n  by pyruvate carboxylase")],
            85,
        );
        assert_eq!(anns.len(), 6);
    }

    #[test]
    fn near_miss_from_hyphenation_matches() {
        let pages = vec![page(1, "the enzyme lactate dehydro- genase converts pyruvate to lactate")];
        let anns = find_annotations(
            &pages,
            &[item("lactate dehydrogenase converts pyruvate to lactate")],
            85,
        );
        assert!(!anns.is_empty());
    }

    #[test]
    fn short_quotes_are_skipped() {
        let pages = vec![page(1, "ATP ADP NAD")];
        assert!(find_annotations(&pages, &[item(" ATP ")], 0).is_empty());
    }

    #[test]
    fn unrelated_quote_below_threshold() {
        let pages = vec![page(1, "Fatty acids undergo beta oxidation in mitochondria.")];
        let anns = find_annotations(&pages, &[item("glycogen is broken down by phosphorylase")], 85);
        assert!(anns.is_empty());
    }

    #[test]
    fn longer_window_just_above_threshold_matches() {
        let quote = "hexokinase phosphorylates glucose to glucose-6-phosphate in the cytosol \
                     of liver cells after a meal";
        assert_eq!(quote.len(), 99);
        let words: Vec<&str> = quote.split(' ').collect();
        let text = format!(
            "{} xxxxxxxxxxxxxxxx {}",
            words[..5].join(" "),
            words[5..].join(" ")
        );
        assert_eq!(text.len(), 116);
        assert!(similarity(quote, &text) >= 85.0);

        let anns = find_annotations(&[page(1, &text)], &[item(quote)], 85);
        assert_eq!(anns.len(), 15);
    }

    #[test]
    fn words_split_by_the_text_layer_still_match() {
        let pages = vec![page(
            1,
            "In muscle phospho fructo kinase cata lyses the com mitted step of glycolysis",
        )];
        let anns = find_annotations(
            &pages,
            &[item("phosphofructokinase catalyses the committed step")],
            85,
        );
        assert_eq!(anns.len(), 9);
        assert_eq!(anns[0].x, 20.0);
    }

    #[test]
    fn evidence_items_carry_certainty_colour() {
        let model = PathwayModel {
            reactions: vec![
                Reaction {
                    id: "R1".into(),
                    evidence: vec!["quote one".into(), "quote two".into()],
                    ..Default::default()
                },
                Reaction {
                    id: "R2".into(),
                    certainty: Certainty::Hypothetical,
                    evidence: vec!["quote three".into()],
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        let items = evidence_items(&model);
        assert_eq!(items.len(), 3);
        assert_eq!(items[2].color, "rgba(255, 165, 0, 0.5)");
        assert_eq!(items[2].reaction_id, "R2");
    }

    #[test]
    fn word_builder_splits_and_flips_y() {
        let mut b = WordBuilder::new(800.0);
        for (i, c) in "ab cd".chars().enumerate() {
            let x = i as f32 * 5.0;
            b.push(c, x, x + 4.0, 700.0, 688.0);
        }
        // next line
        b.push('e', 0.0, 4.0, 680.0, 668.0);
        let words = b.into_words();
        assert_eq!(
            words.iter().map(|w| w.text.as_str()).collect::<Vec<_>>(),
            vec!["ab", "cd", "e"]
        );
        assert_eq!(words[0].y, 100.0);
        assert_eq!(words[0].width, 9.0);
        assert_eq!(words[0].height, 12.0);
    }

    #[tokio::test]
    async fn unreadable_pdf_is_a_document_error_not_a_failure() {
        let doc = Document::from_upload("broken.pdf", b"%PDF-1.4\nnot really".to_vec(), 1024).unwrap();
        let model = PathwayModel::default();
        let evidence = locate_evidence(&[doc], &model, &ReconstructionConfig::default()).await;
        assert_eq!(evidence.len(), 1);
        assert_eq!(evidence[0].filename, "broken.pdf");
        assert!(evidence[0].annotations.is_empty());
        assert!(evidence[0].error.is_some());
    }
}
