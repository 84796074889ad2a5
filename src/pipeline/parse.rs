//! Response parsing: turn the model's free text into a typed [`PathwayModel`].
//!
//! The model is asked for a fenced JSON block followed by a plain-language
//! explanation. Neither is guaranteed, so parsing is best-effort:
//!
//! 1. Locate the JSON: the first ```` ``` ```` fence (labelled `json` or
//!    not), else the span from the first `{` to the last `}`.
//! 2. Parse it with `serde_json`. A failure here yields an empty model and a
//!    [`ParseDiagnostic`]; it is never an error.
//! 3. Shape-match each element of `reactions`, `metabolites` and `enzymes`.
//!    Elements that do not look like the expected shape are skipped.
//!
//! The explanation is the whole text with the JSON fence and the prompt's
//! deliverable headings removed.

use crate::output::{
    Certainty, Enzyme, Metabolite, ParseDiagnostic, ParsedResponse, PathwayModel, ReactionKind,
    Reaction, Regulation, RegulatorEntry,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, warn};

static RE_FENCED_JSON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)```(?:json)?\s*(.*?)```").unwrap());

/// Parse the model's answer. Never fails; see [`ParsedResponse::diagnostic`].
pub fn parse_response(text: &str) -> ParsedResponse {
    let explanation = clean_explanation(text);

    let Some(json_text) = locate_json(text) else {
        warn!("No JSON block found in model response ({} chars)", text.len());
        return ParsedResponse {
            explanation,
            diagnostic: Some(ParseDiagnostic::NoJsonFound),
            ..Default::default()
        };
    };

    let value: Value = match serde_json::from_str(json_text) {
        Ok(v) => v,
        Err(e) => {
            warn!("Model JSON did not parse: {}", e);
            return ParsedResponse {
                explanation,
                diagnostic: Some(ParseDiagnostic::InvalidJson {
                    detail: e.to_string(),
                }),
                ..Default::default()
            };
        }
    };

    if !value.is_object() {
        warn!("Model JSON is not an object");
        return ParsedResponse {
            explanation,
            diagnostic: Some(ParseDiagnostic::NotAnObject),
            ..Default::default()
        };
    }

    let model = model_from_value(value);
    debug!(
        "Parsed {} reactions, {} metabolites, {} enzymes",
        model.reactions.len(),
        model.metabolites.len(),
        model.enzymes.len()
    );
    ParsedResponse {
        model,
        explanation,
        diagnostic: None,
    }
}

/// Find the JSON text inside a response.
pub fn locate_json(text: &str) -> Option<&str> {
    if let Some(caps) = RE_FENCED_JSON.captures(text) {
        return caps.get(1).map(|m| m.as_str().trim());
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

// ── Explanation cleanup ──────────────────────────────────────────────────

static RE_JSON_BLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)```json\s*.*?```").unwrap());
static RE_FINAL_DELIVERABLES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)#+\s*Final Deliverables\s*").unwrap());
static RE_JSON_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\d+\.\s*\*\*JSON metabolic pathway model\*\*\s*").unwrap());
static RE_EXPLANATION_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\d+\.\s*\*\*Plain-language explanation\*\*[^\n]*\n?").unwrap());
static RE_EXPLANATION_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)#+\s*Plain-Language Explanation[^\n]*\n?").unwrap());

/// Strip the JSON block and the prompt's deliverable headings.
pub fn clean_explanation(text: &str) -> String {
    let s = RE_JSON_BLOCK.replace_all(text, "");
    let s = RE_FINAL_DELIVERABLES.replace_all(&s, "");
    let s = RE_JSON_HEADING.replace_all(&s, "");
    let s = RE_EXPLANATION_ITEM.replace_all(&s, "");
    let s = RE_EXPLANATION_HEADING.replace_all(&s, "");
    s.trim().to_string()
}

// ── Shape matching ───────────────────────────────────────────────────────

/// Build the typed model from a parsed JSON object.
pub fn model_from_value(value: Value) -> PathwayModel {
    let reactions = array(&value, "reactions")
        .iter()
        .enumerate()
        .filter_map(|(i, v)| {
            let r = reaction(i, v);
            if r.is_none() {
                debug!("Skipping reaction #{}: not an object", i + 1);
            }
            r
        })
        .collect();

    let metabolites = array(&value, "metabolites")
        .iter()
        .filter_map(named_entity)
        .map(|(name, attributes)| Metabolite { name, attributes })
        .collect();

    let enzymes = array(&value, "enzymes")
        .iter()
        .filter_map(named_entity)
        .map(|(name, attributes)| Enzyme { name, attributes })
        .collect();

    PathwayModel {
        reactions,
        metabolites,
        enzymes,
        raw: value,
    }
}

fn array<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn reaction(index: usize, value: &Value) -> Option<Reaction> {
    let obj = value.as_object()?;

    let id = text(obj.get("id")).unwrap_or_else(|| format!("R{}", index + 1));
    Some(Reaction {
        id,
        kind: ReactionKind::from(text(obj.get("type")).unwrap_or_default()),
        certainty: text(obj.get("certainty"))
            .map(|c| Certainty::from_model_text(&c))
            .unwrap_or_default(),
        organ: text(obj.get("organ")),
        organism: text(obj.get("organism")),
        primary_source: text(obj.get("primary_source")),
        substrates: string_list(obj.get("substrates")),
        products: string_list(obj.get("products")),
        enzymes: string_list(obj.get("enzyme").or_else(|| obj.get("enzymes"))),
        cofactors: string_list(obj.get("cofactors")),
        reversible: obj.get("reversible").and_then(reversibility),
        regulation: obj.get("regulation").map(regulation).unwrap_or_default(),
        compartment: text(obj.get("compartment")),
        evidence: string_list(obj.get("evidence")),
    })
}

/// Non-empty string, or a number/bool rendered as text.
fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// A string or a list of strings, as a list. Non-string elements are dropped.
fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(|v| text(Some(v))).collect(),
        Some(v @ Value::String(_)) => text(Some(v)).into_iter().collect(),
        _ => Vec::new(),
    }
}

fn reversibility(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "reversible" | "true" | "yes" => Some(true),
            "irreversible" | "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn regulation(value: &Value) -> Regulation {
    match value {
        Value::Object(obj) => Regulation {
            inhibitors: regulators(obj.get("inhibitors")),
            activators: regulators(obj.get("activators")),
            note: None,
        },
        Value::String(_) => Regulation {
            note: text(Some(value)),
            ..Default::default()
        },
        _ => Regulation::default(),
    }
}

/// Each entry is a bare name or `{regulator, effect}`.
fn regulators(value: Option<&Value>) -> Vec<RegulatorEntry> {
    let items = match value {
        Some(Value::Array(items)) => items.as_slice(),
        Some(v @ Value::String(_)) => std::slice::from_ref(v),
        _ => return Vec::new(),
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::Object(obj) => Some(RegulatorEntry {
                regulator: text(obj.get("regulator").or_else(|| obj.get("name")))?,
                effect: text(obj.get("effect")),
            }),
            other => text(Some(other)).map(|regulator| RegulatorEntry {
                regulator,
                effect: None,
            }),
        })
        .collect()
}

/// A metabolite or enzyme entry: a bare name, or an object with `name`.
fn named_entity(value: &Value) -> Option<(String, BTreeMap<String, String>)> {
    match value {
        Value::String(_) => text(Some(value)).map(|n| (n, BTreeMap::new())),
        Value::Object(obj) => {
            let name = text(obj.get("name").or_else(|| obj.get("id")))?;
            Some((name, attributes(obj)))
        }
        _ => None,
    }
}

fn attributes(obj: &Map<String, Value>) -> BTreeMap<String, String> {
    obj.iter()
        .filter(|(k, _)| k.as_str() != "name")
        .filter_map(|(k, v)| {
            let rendered = match v {
                Value::Null => return None,
                Value::String(s) => s.clone(),
                Value::Array(items) => items
                    .iter()
                    .map(|i| match i {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(", "),
                other => other.to_string(),
            };
            Some((k.clone(), rendered))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::ExtractedRecord;

    const RESPONSE: &str = r#"### Final Deliverables

1. **JSON metabolic pathway model**

```json
{
  "metabolites": ["glucose", {"name": "pyruvate", "compartment": "cytosol"}, 42],
  "enzymes": [{"name": "hexokinase", "ec": "2.7.1.1"}],
  "reactions": [
    {
      "id": "R1",
      "type": "Metabolic",
      "certainty": "Confirmed",
      "organ": "Liver",
      "organism": "Human",
      "primary_source": null,
      "substrates": ["glucose", "ATP"],
      "products": ["glucose-6-phosphate", "ADP"],
      "enzyme": "hexokinase",
      "cofactors": ["Mg2+"],
      "reversible": false,
      "regulation": {
        "inhibitors": ["glucose-6-phosphate", {"regulator": "citrate", "effect": "allosteric"}],
        "activators": []
      },
      "compartment": "cytosol",
      "evidence": ["Hexokinase phosphorylates glucose in the liver."]
    },
    {
      "type": "Transport",
      "certainty": "Hypothetical",
      "substrates": ["pyruvate"],
      "products": ["pyruvate"],
      "enzyme": ["MPC1", "MPC2"],
      "regulation": "Not described",
      "reversible": "reversible"
    },
    "not a reaction"
  ]
}
```

2. **Plain-language explanation** (short summary)
Glucose is trapped in the cell by phosphorylation."#;

    #[test]
    fn well_formed_response_yields_expected_records() {
        let parsed = parse_response(RESPONSE);
        assert!(parsed.diagnostic.is_none());
        let m = &parsed.model;
        assert_eq!(m.reactions.len(), 2);
        assert_eq!(m.metabolites.len(), 2);
        assert_eq!(m.enzymes.len(), 1);
        // 2 reactions + 2 metabolites + 1 enzyme + 2 regulation events
        assert_eq!(m.records().len(), 7);
        assert!(matches!(m.records()[0], ExtractedRecord::Reaction(_)));
    }

    #[test]
    fn reaction_fields_are_shape_matched() {
        let parsed = parse_response(RESPONSE);
        let r1 = &parsed.model.reactions[0];
        assert_eq!(r1.id, "R1");
        assert_eq!(r1.organ.as_deref(), Some("Liver"));
        assert!(r1.primary_source.is_none());
        assert_eq!(r1.enzymes, vec!["hexokinase"]);
        assert_eq!(r1.reversible, Some(false));
        assert_eq!(r1.regulation.inhibitors.len(), 2);
        assert_eq!(r1.regulation.inhibitors[1].effect.as_deref(), Some("allosteric"));

        let r2 = &parsed.model.reactions[1];
        assert_eq!(r2.id, "R2");
        assert_eq!(r2.kind, ReactionKind::Transport);
        assert_eq!(r2.certainty, Certainty::Hypothetical);
        assert_eq!(r2.enzymes, vec!["MPC1", "MPC2"]);
        assert_eq!(r2.regulation.note.as_deref(), Some("Not described"));
        assert_eq!(r2.reversible, Some(true));
    }

    #[test]
    fn entity_attributes_are_kept_as_strings() {
        let parsed = parse_response(RESPONSE);
        let pyruvate = &parsed.model.metabolites[1];
        assert_eq!(pyruvate.name, "pyruvate");
        assert_eq!(pyruvate.attributes.get("compartment").map(String::as_str), Some("cytosol"));
        assert_eq!(
            parsed.model.enzymes[0].attributes.get("ec").map(String::as_str),
            Some("2.7.1.1")
        );
    }

    #[test]
    fn explanation_drops_json_and_headings() {
        let parsed = parse_response(RESPONSE);
        assert_eq!(
            parsed.explanation,
            "Glucose is trapped in the cell by phosphorylation."
        );
    }

    #[test]
    fn explanation_headings_match_in_any_case() {
        let text = "### final deliverables\n\n\
                    1. **json METABOLIC pathway model**\n\
                    ```JSON\n{\"reactions\": []}\n```\n\n\
                    2. **plain-language explanation** (short summary)\n\
                    Lactate is exported from muscle.";
        let parsed = parse_response(text);
        assert!(parsed.diagnostic.is_none());
        assert_eq!(parsed.explanation, "Lactate is exported from muscle.");
    }

    #[test]
    fn unfenced_json_falls_back_to_braces() {
        let text = r#"Here you go: {"reactions": [{"substrates": ["A"], "products": ["B"]}]} done"#;
        let parsed = parse_response(text);
        assert!(parsed.diagnostic.is_none());
        assert_eq!(parsed.model.reactions.len(), 1);
        assert_eq!(parsed.model.reactions[0].id, "R1");
    }

    #[test]
    fn unlabelled_fence_is_accepted() {
        let text = "```\n{\"reactions\": []}\n```";
        assert_eq!(locate_json(text), Some("{\"reactions\": []}"));
    }

    #[test]
    fn missing_json_gives_diagnostic_not_error() {
        let parsed = parse_response("The documents do not describe a pathway.");
        assert_eq!(parsed.diagnostic, Some(ParseDiagnostic::NoJsonFound));
        assert!(parsed.model.is_empty());
        assert_eq!(parsed.explanation, "The documents do not describe a pathway.");
    }

    #[test]
    fn broken_json_gives_invalid_json() {
        let parsed = parse_response("```json\n{\"reactions\": [\n```");
        assert!(matches!(
            parsed.diagnostic,
            Some(ParseDiagnostic::InvalidJson { .. })
        ));
        assert!(parsed.model.records().is_empty());
    }

    #[test]
    fn json_array_is_not_an_object() {
        let parsed = parse_response("```json\n[1, 2]\n```");
        assert_eq!(parsed.diagnostic, Some(ParseDiagnostic::NotAnObject));
    }

    #[test]
    fn wrong_typed_fields_are_tolerated() {
        let text = r#"{"reactions": [{"substrates": "A", "products": 5, "evidence": [1, "quote"]}], "metabolites": {"x": 1}}"#;
        let parsed = parse_response(text);
        let r = &parsed.model.reactions[0];
        assert_eq!(r.substrates, vec!["A"]);
        assert!(r.products.is_empty());
        assert_eq!(r.evidence, vec!["1", "quote"]);
        assert!(parsed.model.metabolites.is_empty());
    }
}
