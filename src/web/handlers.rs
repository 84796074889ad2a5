//! Dashboard handlers.

use crate::output::{
    locate_source, DocumentEvidence, ExtractedRecord, Reaction, Reconstruction, SourceRef,
};
use crate::pipeline::evidence::locate_evidence;
use crate::pipeline::export::{export, ExportFormat};
use crate::pipeline::intake;
use crate::reconstruct::reconstruct;
use crate::web::error::WebError;
use crate::web::session::{Session, SessionId, SESSION_COOKIE};
use crate::web::state::{AppState, SharedState};
use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, Path, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Json;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use minijinja::context;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, warn};
use uuid::Uuid;

// ── View models ──────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct Notice {
    level: &'static str,
    message: String,
}

impl Notice {
    fn error(message: impl Into<String>) -> Self {
        Self {
            level: "error",
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct DocumentRow {
    index: usize,
    filename: String,
    size_kb: String,
}

#[derive(Debug, Serialize)]
struct Citation {
    number: usize,
    quote: String,
    page: Option<usize>,
}

#[derive(Debug, Serialize)]
struct ReactionCard {
    id: String,
    enzyme: String,
    kind: String,
    certainty: String,
    hypothetical: bool,
    color: &'static str,
    organ: String,
    organism: String,
    equation: String,
    substrates: String,
    products: String,
    cofactors: String,
    reversible: String,
    compartment: String,
    regulation: String,
    regulation_full: String,
    primary_source: Option<String>,
    citations: Vec<Citation>,
}

impl ReactionCard {
    /// `evidence` is the viewed document's located evidence and its index.
    fn new(rxn: &Reaction, evidence: Option<(usize, &DocumentEvidence)>) -> Self {
        let or_unknown = |v: &Option<String>| v.clone().unwrap_or_else(|| "Unknown".to_string());
        Self {
            id: rxn.id.clone(),
            enzyme: rxn.enzyme_label(),
            kind: rxn.kind.to_string(),
            certainty: rxn.certainty.to_string(),
            hypothetical: rxn.certainty == crate::output::Certainty::Hypothetical,
            color: rxn.certainty.highlight_color(),
            organ: or_unknown(&rxn.organ),
            organism: or_unknown(&rxn.organism),
            equation: rxn.equation(),
            substrates: rxn.substrates.join(", "),
            products: rxn.products.join(", "),
            cofactors: rxn.cofactors.join(", "),
            reversible: match rxn.reversible {
                Some(true) => "reversible".to_string(),
                Some(false) => "irreversible".to_string(),
                None => "unknown".to_string(),
            },
            compartment: rxn.compartment.clone().unwrap_or_default(),
            regulation: rxn.regulation.short_summary(),
            regulation_full: rxn.regulation.summary(),
            primary_source: rxn.primary_source.clone(),
            citations: rxn
                .sources()
                .into_iter()
                .enumerate()
                .map(|(i, source)| {
                    let source = locate_source(source, evidence);
                    Citation {
                        number: i + 1,
                        quote: source.snippet,
                        page: source.page,
                    }
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
struct EntityRow {
    name: String,
    attributes: String,
}

fn entity_rows<'a>(
    items: impl Iterator<Item = (&'a String, &'a std::collections::BTreeMap<String, String>)>,
) -> Vec<EntityRow> {
    items
        .map(|(name, attrs)| EntityRow {
            name: name.clone(),
            attributes: attrs
                .iter()
                .map(|(k, v)| format!("{k}: {v}"))
                .collect::<Vec<_>>()
                .join("; "),
        })
        .collect()
}

/// JSON for embedding inside a `<script>` element.
fn script_json(value: &impl Serialize) -> String {
    serde_json::to_string(value)
        .unwrap_or_else(|_| "null".to_string())
        .replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace('&', "\\u0026")
}

// ── Sessions ─────────────────────────────────────────────────────────────

fn session_id(jar: &CookieJar) -> Option<SessionId> {
    jar.get(SESSION_COOKIE)
        .and_then(|c| Uuid::parse_str(c.value()).ok())
}

fn with_session_cookie(jar: CookieJar, id: SessionId) -> CookieJar {
    jar.add(
        Cookie::build((SESSION_COOKIE, id.to_string()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax),
    )
}

fn existing_session(state: &AppState, jar: &CookieJar) -> Result<Arc<AsyncMutex<Session>>, WebError> {
    session_id(jar)
        .and_then(|id| state.sessions.get(id))
        .ok_or_else(|| WebError::not_found("No analysis in this session. Upload PDFs first."))
}

// ── Rendering ────────────────────────────────────────────────────────────

fn render_dashboard(state: &AppState, session: &Session, notice: Option<Notice>) -> Result<String, WebError> {
    let documents: Vec<DocumentRow> = session
        .documents
        .iter()
        .enumerate()
        .map(|(index, d)| DocumentRow {
            index,
            filename: d.filename().to_string(),
            size_kb: format!("{:.1}", d.len() as f64 / 1024.0),
        })
        .collect();

    let result = session.reconstruction.as_ref().map(|r| result_context(r));
    let setup_hint = (state.config.api_key.is_none() && state.config.provider.is_none())
        .then_some(crate::config::API_KEY_ENV);

    let tmpl = state
        .templates
        .get_template("dashboard.html")
        .map_err(|e| WebError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    tmpl.render(context! {
        model_name => state.config.model,
        documents => documents,
        notice => notice,
        result => result,
        setup_hint => setup_hint,
    })
    .map_err(|e| {
        warn!("dashboard render failed: {}", e);
        WebError::new(StatusCode::INTERNAL_SERVER_ERROR, crate::web::error::INTERNAL_FAILURE)
    })
}

fn result_context(r: &Reconstruction) -> Value {
    let reactions: Vec<ReactionCard> = r
        .model
        .reactions
        .iter()
        .map(|rxn| ReactionCard::new(rxn, None))
        .collect();
    let metabolites = entity_rows(r.model.metabolites.iter().map(|m| (&m.name, &m.attributes)));
    let enzymes = entity_rows(r.model.enzymes.iter().map(|e| (&e.name, &e.attributes)));
    let raw_json = serde_json::to_string_pretty(&r.model.raw).unwrap_or_default();

    json!({
        "explanation": r.explanation,
        "diagnostic": r.diagnostic.as_ref().map(ToString::to_string),
        "raw_text": r.raw_text,
        "raw_json": raw_json,
        "reactions": reactions,
        "metabolites": metabolites,
        "enzymes": enzymes,
        "stats": r.stats,
        "graph": r.graph.stats(),
        "graph_empty": r.graph.is_empty(),
    })
}

fn html_with_status(status: StatusCode, body: String) -> Response {
    (status, Html(body)).into_response()
}

// ── Handlers ─────────────────────────────────────────────────────────────

/// `GET /`
///
/// Only reads the session. Visitors without one see the empty upload form;
/// the session is created by the first analysis.
pub async fn dashboard(State(state): State<SharedState>, jar: CookieJar) -> Response {
    let rendered = match session_id(&jar).and_then(|id| state.sessions.get(id)) {
        Some(session) => {
            let guard = session.lock().await;
            render_dashboard(&state, &guard, None)
        }
        None => render_dashboard(&state, &Session::default(), None),
    };
    match rendered {
        Ok(body) => Html(body).into_response(),
        Err(e) => e.into_response(),
    }
}

/// `POST /analyze`: accept the upload set and run one reconstruction.
pub async fn analyze(
    State(state): State<SharedState>,
    jar: CookieJar,
    multipart: Multipart,
) -> Response {
    let (id, session) = state.sessions.get_or_create(session_id(&jar));
    let jar = with_session_cookie(jar, id);

    let accepted = match read_files(multipart).await {
        Ok(files) => intake::accept_uploads(files, state.config.max_upload_bytes).map_err(WebError::from),
        Err(e) => Err(e),
    };

    let mut guard = session.lock().await;
    let documents = match accepted {
        Ok(docs) => docs,
        Err(e) => {
            info!("Upload rejected: {}", e.message);
            let body = render_dashboard(&state, &guard, Some(Notice::error(e.message.clone())));
            return match body {
                Ok(body) => (jar, html_with_status(e.status, body)).into_response(),
                Err(render_err) => (jar, render_err).into_response(),
            };
        }
    };

    guard.replace_documents(documents);
    match reconstruct(&guard.documents, &state.config).await {
        Ok(result) => {
            guard.reconstruction = Some(result);
            (jar, Redirect::to("/")).into_response()
        }
        Err(e) => {
            let web = WebError::from(&e);
            match render_dashboard(&state, &guard, Some(Notice::error(web.message.clone()))) {
                Ok(body) => (jar, html_with_status(web.status, body)).into_response(),
                Err(render_err) => (jar, render_err).into_response(),
            }
        }
    }
}

async fn read_files(mut multipart: Multipart) -> Result<Vec<(String, Vec<u8>)>, WebError> {
    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("files") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(multipart_error)?;
        // An empty file input still submits one nameless, empty part.
        if filename.is_empty() && bytes.is_empty() {
            continue;
        }
        files.push((filename, bytes.to_vec()));
    }
    Ok(files)
}

fn multipart_error(e: MultipartError) -> WebError {
    let status = e.status();
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        WebError::new(status, "The upload is larger than the server accepts.")
    } else {
        WebError::new(status, e.body_text())
    }
}

/// `GET /viewer/{index}`: reaction cards beside the highlighted PDF.
pub async fn viewer(
    State(state): State<SharedState>,
    jar: CookieJar,
    Path(index): Path<usize>,
) -> Result<Html<String>, WebError> {
    let session = existing_session(&state, &jar)?;
    let mut guard = session.lock().await;
    let doc = guard
        .documents
        .get(index)
        .cloned()
        .ok_or_else(|| WebError::not_found(format!("No document #{index} in this session.")))?;
    if guard.reconstruction.is_none() {
        return Err(WebError::not_found("Run an analysis first."));
    }

    if guard.evidence.len() != guard.documents.len() {
        let n = guard.documents.len();
        guard.evidence.resize(n, None);
    }
    if guard.evidence[index].is_none() {
        let located = match guard.reconstruction.as_ref() {
            Some(r) => locate_evidence(std::slice::from_ref(&doc), &r.model, &state.config).await,
            None => Vec::new(),
        };
        guard.evidence[index] = Some(located.into_iter().next().unwrap_or_else(|| DocumentEvidence {
            filename: doc.filename().to_string(),
            ..Default::default()
        }));
    }

    let evidence = guard.evidence[index].as_ref();
    let reactions: Vec<ReactionCard> = guard
        .reconstruction
        .as_ref()
        .map(|r| {
            r.model
                .reactions
                .iter()
                .map(|rxn| ReactionCard::new(rxn, evidence.map(|ev| (index, ev))))
                .collect()
        })
        .unwrap_or_default();
    let annotations = evidence.map(|e| e.annotations.as_slice()).unwrap_or(&[]);
    let documents: Vec<DocumentRow> = guard
        .documents
        .iter()
        .enumerate()
        .map(|(i, d)| DocumentRow {
            index: i,
            filename: d.filename().to_string(),
            size_kb: format!("{:.1}", d.len() as f64 / 1024.0),
        })
        .collect();

    let pdf_url = format!("/documents/{index}/pdf");

    let tmpl = state
        .templates
        .get_template("viewer.html")
        .map_err(|e| WebError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    let body = tmpl
        .render(context! {
            model_name => state.config.model,
            index => index,
            filename => doc.filename(),
            documents => documents,
            reactions => reactions,
            highlight_count => annotations.len(),
            annotations_json => script_json(&annotations),
            doc_error => evidence.and_then(|e| e.error.as_ref()).map(ToString::to_string),
            pdf_url_json => script_json(&pdf_url),
        })
        .map_err(|e| {
            warn!("viewer render failed: {}", e);
            WebError::new(StatusCode::INTERNAL_SERVER_ERROR, crate::web::error::INTERNAL_FAILURE)
        })?;
    Ok(Html(body))
}

/// `GET /documents/{index}/pdf`: the uploaded bytes, for pdf.js.
pub async fn document_pdf(
    State(state): State<SharedState>,
    jar: CookieJar,
    Path(index): Path<usize>,
) -> Result<Response, WebError> {
    let session = existing_session(&state, &jar)?;
    let guard = session.lock().await;
    let doc = guard
        .documents
        .get(index)
        .ok_or_else(|| WebError::not_found(format!("No document #{index} in this session.")))?;
    let disposition = format!(
        "inline; filename=\"{}\"",
        doc.filename().replace(['"', '\\'], "_")
    );
    Ok((
        [
            (CONTENT_TYPE, "application/pdf".to_string()),
            (CONTENT_DISPOSITION, disposition),
        ],
        doc.bytes().to_vec(),
    )
        .into_response())
}

/// `GET /export/{format}`: download the graph as PNG, SVG or DOT.
pub async fn export_graph(
    State(state): State<SharedState>,
    jar: CookieJar,
    Path(format): Path<String>,
) -> Result<Response, WebError> {
    let format: ExportFormat = format
        .parse()
        .map_err(|_| WebError::not_found(format!("Unknown export format '{format}'.")))?;
    let session = existing_session(&state, &jar)?;
    let graph = {
        let guard = session.lock().await;
        guard
            .reconstruction
            .as_ref()
            .map(|r| r.graph.clone())
            .ok_or_else(|| WebError::not_found("Run an analysis first."))?
    };

    let bytes = export(&graph, format, &state.config).await?;
    Ok((
        [
            (CONTENT_TYPE, format.mime_type().to_string()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", format.file_name()),
            ),
        ],
        bytes,
    )
        .into_response())
}

/// `GET /api/model`: the session's reconstruction as JSON.
pub async fn api_model(
    State(state): State<SharedState>,
    jar: CookieJar,
) -> Result<Json<Value>, WebError> {
    let session = existing_session(&state, &jar)?;
    let guard = session.lock().await;
    let r = guard
        .reconstruction
        .as_ref()
        .ok_or_else(|| WebError::not_found("Run an analysis first."))?;

    // Quotes are pinned to a page only once their document's viewer has run.
    let located: Vec<(usize, &DocumentEvidence)> = guard
        .evidence
        .iter()
        .enumerate()
        .filter_map(|(i, ev)| ev.as_ref().map(|ev| (i, ev)))
        .collect();
    let records = r.model.records();
    let sources: Vec<SourceRef> = records
        .iter()
        .flat_map(ExtractedRecord::sources)
        .map(|source| locate_source(source, located.iter().copied()))
        .collect();

    Ok(Json(json!({
        "documents": guard.documents.iter().map(|d| d.filename()).collect::<Vec<_>>(),
        "model": r.model,
        "records": records,
        "sources": sources,
        "explanation": r.explanation,
        "diagnostic": r.diagnostic,
        "stats": r.stats,
        "graph": r.graph.stats(),
    })))
}

/// `GET /healthz`
pub async fn healthz(State(state): State<SharedState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "sessions": state.sessions.len(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_json_cannot_close_the_script_tag() {
        let s = script_json(&json!({"quote": "</script><b>&"}));
        assert!(!s.contains("</script>"));
        assert!(s.contains("\\u003c/script\\u003e"));
        let back: Value = serde_json::from_str(&s).unwrap();
        assert_eq!(back["quote"], "</script><b>&");
    }

    #[test]
    fn reaction_card_fills_unknowns() {
        let rxn = Reaction {
            id: "R7".into(),
            substrates: vec!["A".into()],
            products: vec!["B".into()],
            evidence: vec!["a quote".into()],
            ..Default::default()
        };
        let card = ReactionCard::new(&rxn, None);
        assert_eq!(card.organ, "Unknown");
        assert_eq!(card.enzyme, "Unknown");
        assert_eq!(card.reversible, "unknown");
        assert_eq!(card.regulation, "None");
        assert_eq!(card.citations.len(), 1);
        assert_eq!(card.citations[0].number, 1);
        assert!(card.citations[0].page.is_none());
    }

    #[test]
    fn reaction_card_cites_the_page_of_located_quotes() {
        let rxn = Reaction {
            id: "R1".into(),
            evidence: vec!["hexokinase phosphorylates glucose".into(), "not in the paper".into()],
            ..Default::default()
        };
        let evidence = DocumentEvidence {
            filename: "paper.pdf".into(),
            annotations: vec![crate::output::Annotation {
                page: 4,
                x: 10.0,
                y: 20.0,
                width: 30.0,
                height: 12.0,
                color: "yellow".into(),
                quote: "hexokinase phosphorylates glucose".into(),
            }],
            error: None,
        };
        let card = ReactionCard::new(&rxn, Some((2, &evidence)));
        assert_eq!(card.citations[0].page, Some(4));
        assert_eq!(card.citations[0].quote, "hexokinase phosphorylates glucose");
        assert_eq!(card.citations[1].page, None);
    }
}
