//! The extraction prompt sent with every upload set.
//!
//! Callers can override it via [`crate::config::ReconstructionConfig::prompt`];
//! the constant here is used only when no override is provided. The response
//! parser relies on two things the prompt asks for: a fenced JSON block with
//! a `reactions` array, and the "Final Deliverables" headings it strips from
//! the explanation.

/// Default instruction prompt, appended after the PDF parts.
pub const EXTRACTION_PROMPT: &str = r#"## Metabolic Pathway Reconstruction Prompt

**Task**
You are an expert in systems biology and bioinformatics.
Your job is to extract and reconstruct a metabolic pathway ONLY from the contents of the uploaded PDF(s).
Synthesize information from ALL provided documents to build a comprehensive model.
Do not use outside knowledge; if the documents lack information, say so explicitly.

**Goal**
Output a structured pathway model that captures:
- metabolites
- enzymes
- reaction directionality
- cofactors
- regulators (feedback, inhibition, activation)
- compartments (if stated)
- **organ/tissue context**
- **organism/model context**
- **reaction type (metabolic vs transport)**
- **certainty status (confirmed vs hypothetical)**
- **primary source (if evidence is secondary)**

---

### Extraction Procedure

**Step 1: Identify biochemical entities**
Extract all relevant biological elements mentioned in the documents:
- metabolites / intermediates
- enzymes
- transporters
- coenzymes
- reaction intermediates

Keep all names exactly as written in the documents.
If multiple names or synonyms are listed, include them.

---

**Step 2: List metabolic reactions**
For each reaction mentioned, identify:

- Substrate(s)
- Product(s)
- Enzyme(s)
- Required cofactors (e.g., ATP, NADH, FAD, etc.)
- Directionality ("reversible" or "irreversible")
- Any pathway branching
- **Organ/Tissue**: Where does this reaction occur? (e.g., Liver, Gut, Kidney). If unknown, use "Unknown".
- **Organism**: In what organism or model was this found? (e.g., Human, Mouse, Rat, Microbial).
- **Type**: Is this a "Metabolic" reaction or a "Transport" reaction?
- **Certainty**: Is this reaction "Confirmed" (stated as fact) or "Hypothetical" (suggested, proposed, hypothesized)?
- **Primary Source**: If the text cites another paper for this reaction (e.g., "as shown by Smith et al."), extract that citation here. If it appears to be a primary finding of this text or no citation is given, leave null.

**CRITICAL: Ordering**
Organize the reactions in a logical, physiological order, starting from **Ingestion/Uptake** -> **Metabolism** -> **Excretion/Secretion**.

Represent each reaction as a structured object.

---

**Step 3: Extract regulatory information**
If present in the text, identify:
- inhibitors
- activators
- transcriptional/gene-level regulators
- allosteric feedback mechanisms

If regulation is not described, leave these fields empty.

---

**Step 4: Build the JSON Pathway Model**

Output a structured JSON representation like this:

```json
{
  "metabolites": [],
  "enzymes": [],
  "reactions": [
    {
      "id": "",
      "type": "Metabolic",
      "certainty": "Confirmed",
      "organ": "Liver",
      "organism": "Human",
      "primary_source": "Smith et al. 2020",
      "substrates": [],
      "products": [],
      "enzyme": "",
      "cofactors": [],
      "reversible": null,
      "regulation": {
        "inhibitors": [],
        "activators": []
      },
      "compartment": "",
      "evidence": ["exact quote 1", "exact quote 2"]
    }
  ]
}
```

### Rules for JSON

- Use exact names from the documents
- If something is unknown, write `"unknown"` or `null`
- If multiple interpretations exist, list them all
- Do **not** insert external biological knowledge or inferred steps
- `"type"` is "Metabolic" or "Transport"; `"certainty"` is "Confirmed" or "Hypothetical"; `"primary_source"` may be null
- **"evidence"**: This field is MANDATORY for each reaction. You MUST extract at least 1-2 EXACT string quotes from the text that support this specific reaction. **CRITICAL**: The quotes must be EXACT substrings found in the documents.

---

### Step 5: Evidence Citations

For each reaction, quote or summarize the specific line(s) or section(s) from the documents that justify its inclusion.
If no clear citation exists, state that explicitly.

---

### Final Deliverables

1. **JSON metabolic pathway model**
2. **Plain-language explanation** (short summary) that describes:
   - pathway purpose
   - the sequence and logic of reactions
   - key regulatory bottlenecks and control points
   - any ambiguous or incomplete sections

---

### Output Rules

- Base all information ONLY on content found in the documents
- If information is incomplete or missing, describe what data would be needed to complete the reconstruction
- If the pathway includes alternatives, branching, or cycles, represent them clearly in structure and text
- Use clear, unambiguous terminology everywhere

---

### Additional Notes

- Do not invent metabolites or reactions that are not explicitly in the documents
- Keep reporting precise and limited to what is visible
- If diagrams appear without labels, describe what can be interpreted and what cannot"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_requests_fenced_json_with_reactions() {
        assert!(EXTRACTION_PROMPT.contains("```json"));
        assert!(EXTRACTION_PROMPT.contains("\"reactions\""));
        assert!(EXTRACTION_PROMPT.contains("\"evidence\""));
    }

    #[test]
    fn prompt_names_the_headings_the_parser_strips() {
        assert!(EXTRACTION_PROMPT.contains("### Final Deliverables"));
        assert!(EXTRACTION_PROMPT.contains("**JSON metabolic pathway model**"));
        assert!(EXTRACTION_PROMPT.contains("**Plain-language explanation**"));
    }
}
