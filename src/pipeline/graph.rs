//! Graph building: reactions → bipartite metabolite/reaction graph.
//!
//! Every reaction with at least one substrate and one product becomes a
//! reaction node. Substrates point into it, it points at its products.
//! Metabolite nodes are keyed by their cleaned name, so a metabolite that
//! appears in several reactions is one node. That is the only
//! de-duplication: repeated edges are kept.
//!
//! The graph is rebuilt from scratch on every extraction and never edited.

use crate::output::Reaction;
use once_cell::sync::Lazy;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Small molecules hidden from the graph when `hide_cofactors` is on.
pub const COMMON_COFACTORS: &[&str] = &[
    "h2o",
    "water",
    "h+",
    "proton",
    "o2",
    "oxygen",
    "co2",
    "atp",
    "adp",
    "amp",
    "nad+",
    "nadh",
    "nadp+",
    "nadph",
    "pi",
    "phosphate",
    "ppi",
    "coa",
    "coenzyme a",
];

/// Options for [`PathwayGraph::build`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphOptions {
    /// Drop [`COMMON_COFACTORS`] so hub molecules don't tangle the layout.
    pub hide_cofactors: bool,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self {
            hide_cofactors: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    Metabolite,
    Reaction,
}

/// A node of the pathway graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathwayNode {
    pub kind: NodeKind,
    /// Stable DOT identifier (`met_{n}` or `rxn_{n}`).
    pub id: String,
    pub label: String,
}

/// Substrate edges run metabolite → reaction; product edges reaction → metabolite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeRole {
    Substrate,
    Product,
}

/// Node and edge counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub metabolites: usize,
    pub reactions: usize,
    pub edges: usize,
}

/// Bipartite metabolic pathway graph.
#[derive(Debug, Clone, Default)]
pub struct PathwayGraph {
    graph: DiGraph<PathwayNode, EdgeRole>,
    metabolite_index: HashMap<String, NodeIndex>,
}

impl PathwayGraph {
    /// Build the graph for a list of reactions.
    pub fn build(reactions: &[Reaction], options: &GraphOptions) -> Self {
        let mut g = Self::default();
        let mut skipped = 0usize;

        for (i, rxn) in reactions.iter().enumerate() {
            if !has_entries(&rxn.substrates) || !has_entries(&rxn.products) {
                skipped += 1;
                continue;
            }

            let rxn_node = g.graph.add_node(PathwayNode {
                kind: NodeKind::Reaction,
                id: format!("rxn_{i}"),
                label: reaction_label(rxn),
            });

            for name in visible_names(&rxn.substrates, options) {
                let met = g.metabolite(name);
                g.graph.add_edge(met, rxn_node, EdgeRole::Substrate);
            }
            for name in visible_names(&rxn.products, options) {
                let met = g.metabolite(name);
                g.graph.add_edge(rxn_node, met, EdgeRole::Product);
            }
        }

        let stats = g.stats();
        debug!(
            "Graph: {} metabolites, {} reactions, {} edges ({} reactions skipped)",
            stats.metabolites, stats.reactions, stats.edges, skipped
        );
        g
    }

    fn metabolite(&mut self, name: String) -> NodeIndex {
        if let Some(&idx) = self.metabolite_index.get(&name) {
            return idx;
        }
        let idx = self.graph.add_node(PathwayNode {
            kind: NodeKind::Metabolite,
            id: format!("met_{}", self.metabolite_index.len()),
            label: name.clone(),
        });
        self.metabolite_index.insert(name, idx);
        idx
    }

    pub fn stats(&self) -> GraphStats {
        let reactions = self
            .graph
            .node_weights()
            .filter(|n| n.kind == NodeKind::Reaction)
            .count();
        GraphStats {
            metabolites: self.graph.node_count() - reactions,
            reactions,
            edges: self.graph.edge_count(),
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &PathwayNode> {
        self.graph.node_weights()
    }

    /// Edges as `(from, to, role)` in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = (&PathwayNode, &PathwayNode, EdgeRole)> {
        self.graph.edge_references().map(|e| {
            (
                &self.graph[e.source()],
                &self.graph[e.target()],
                *e.weight(),
            )
        })
    }

    /// Look up a metabolite node by cleaned name.
    pub fn metabolite_node(&self, name: &str) -> Option<&PathwayNode> {
        self.metabolite_index.get(name).map(|&idx| &self.graph[idx])
    }
}

fn has_entries(names: &[String]) -> bool {
    names.iter().any(|n| !n.trim().is_empty())
}

fn visible_names<'a>(
    names: &'a [String],
    options: &'a GraphOptions,
) -> impl Iterator<Item = String> + 'a {
    names
        .iter()
        .map(|n| clean_name(n))
        .filter(|n| !n.is_empty())
        .filter(move |n| !(options.hide_cofactors && is_common_cofactor(n)))
}

/// Enzyme names without the trailing " activity", or "unknown".
pub fn reaction_label(rxn: &Reaction) -> String {
    let label = rxn
        .enzymes
        .iter()
        .map(|e| e.replace(" activity", ""))
        .collect::<Vec<_>>()
        .join(", ");
    if label.trim().is_empty() {
        "unknown".to_string()
    } else {
        label
    }
}

static RE_LOCANT_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+[.,]\d+-").unwrap());
static RE_SYNTHETIC_NOTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\(.*?synthetic.*?\)").unwrap());

/// Strip a leading locant prefix (`1,3-`) and "(… synthetic …)" notes.
pub fn clean_name(name: &str) -> String {
    let s = RE_LOCANT_PREFIX.replace(name.trim(), "");
    let s = RE_SYNTHETIC_NOTE.replace_all(&s, "");
    s.trim().to_string()
}

pub fn is_common_cofactor(name: &str) -> bool {
    let lower = name.trim().to_lowercase();
    COMMON_COFACTORS.contains(&lower.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rxn(subs: &[&str], prods: &[&str], enzymes: &[&str]) -> Reaction {
        Reaction {
            substrates: subs.iter().map(|s| s.to_string()).collect(),
            products: prods.iter().map(|s| s.to_string()).collect(),
            enzymes: enzymes.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    fn all_visible() -> GraphOptions {
        GraphOptions {
            hide_cofactors: false,
        }
    }

    #[test]
    fn counts_match_distinct_metabolites_and_relations() {
        let reactions = vec![
            rxn(&["glucose", "ATP"], &["G6P", "ADP"], &["hexokinase"]),
            rxn(&["G6P"], &["F6P"], &["PGI"]),
            rxn(&["F6P", "ATP"], &["F16BP", "ADP"], &[]),
        ];
        let g = PathwayGraph::build(&reactions, &all_visible());
        // glucose, ATP, G6P, ADP, F6P, F16BP + 3 reactions
        assert_eq!(g.node_count(), 9);
        assert_eq!(g.edge_count(), 10);
        assert_eq!(
            g.stats(),
            GraphStats {
                metabolites: 6,
                reactions: 3,
                edges: 10
            }
        );
    }

    #[test]
    fn duplicate_relations_keep_both_edges() {
        let reactions = vec![rxn(&["A", "A"], &["B"], &[])];
        let g = PathwayGraph::build(&reactions, &all_visible());
        assert_eq!(g.node_count(), 3);
        assert_eq!(g.edge_count(), 3);
    }

    #[test]
    fn reactions_missing_a_side_are_skipped() {
        let reactions = vec![rxn(&["A"], &[], &[]), rxn(&[], &["B"], &[]), rxn(&[" "], &["B"], &[])];
        let g = PathwayGraph::build(&reactions, &all_visible());
        assert!(g.is_empty());
    }

    #[test]
    fn cofactors_hidden_by_default() {
        let reactions = vec![rxn(&["glucose", "ATP"], &["G6P", "ADP", "H+"], &[])];
        let g = PathwayGraph::build(&reactions, &GraphOptions::default());
        assert_eq!(g.stats().metabolites, 2);
        assert_eq!(g.edge_count(), 2);
        assert!(g.metabolite_node("ATP").is_none());
    }

    #[test]
    fn edges_are_bipartite() {
        let g = PathwayGraph::build(&[rxn(&["A"], &["B"], &["E1"])], &all_visible());
        for (from, to, role) in g.edges() {
            assert_ne!(from.kind, to.kind);
            match role {
                EdgeRole::Substrate => assert_eq!(to.kind, NodeKind::Reaction),
                EdgeRole::Product => assert_eq!(from.kind, NodeKind::Reaction),
            }
        }
    }

    #[test]
    fn names_are_cleaned_before_identity() {
        assert_eq!(clean_name("1,3-bisphosphoglycerate"), "bisphosphoglycerate");
        assert_eq!(clean_name("2.5-diketone"), "diketone");
        assert_eq!(clean_name("Lactate (Synthetic analogue)"), "Lactate");
        let reactions = vec![
            rxn(&["Lactate (synthetic)"], &["pyruvate"], &[]),
            rxn(&["Lactate"], &["alanine"], &[]),
        ];
        let g = PathwayGraph::build(&reactions, &all_visible());
        assert_eq!(g.stats().metabolites, 3);
    }

    #[test]
    fn reaction_labels_drop_activity_suffix() {
        let r = rxn(&["A"], &["B"], &["kinase activity", "PFK1"]);
        assert_eq!(reaction_label(&r), "kinase, PFK1");
        assert_eq!(reaction_label(&rxn(&["A"], &["B"], &[])), "unknown");
    }
}
