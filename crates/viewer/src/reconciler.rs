//! Client Graph Reconciler
//!
//! Mirrors the server's node stream into a renderer. Each node is painted by
//! category, derived from the number of distinct edges touching it and its
//! value:
//!
//! | endpoints | value | category    |
//! |-----------|-------|-------------|
//! | <= 2      | any   | Unconfirmed |
//! | > 2       | > 0   | Value       |
//! | > 2       | 0     | Empty       |
//!
//! Parents may arrive after their children. They are created as provisional
//! placeholders with value 0 and filled in when the real node shows up.
//! Confirmations never reach viewers, so categories never reflect them.

use crate::{
    format::format_magnitude,
    render::{Color, Renderer},
};
use std::collections::{HashMap, HashSet};
use tangle_core::Tip;

/// Visual category of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Unconfirmed,
    Value,
    Empty,
}

impl Category {
    pub fn color(self) -> Color {
        match self {
            Category::Unconfirmed => Color::UNCONFIRMED,
            Category::Value => Color::VALUE,
            Category::Empty => Color::EMPTY,
        }
    }
}

#[derive(Debug, Clone)]
struct GraphNode {
    value: f64,
    /// Only referenced as a parent so far
    provisional: bool,
    /// Distinct edges incident on this node
    degree: usize,
}

impl GraphNode {
    fn category(&self) -> Category {
        if self.degree <= 2 {
            Category::Unconfirmed
        } else if self.value > 0.0 {
            Category::Value
        } else {
            Category::Empty
        }
    }
}

/// Keeps the rendered graph consistent with the received nodes
pub struct GraphReconciler<R: Renderer> {
    renderer: R,
    nodes: HashMap<String, GraphNode>,
    /// Directed `(child, parent)` pairs; duplicates are ignored
    edges: HashSet<(String, String)>,
    hovered: Option<String>,
}

impl<R: Renderer> GraphReconciler<R> {
    pub fn new(renderer: R) -> Self {
        Self {
            renderer,
            nodes: HashMap::new(),
            edges: HashSet::new(),
            hovered: None,
        }
    }

    /// Add a node and its two parent edges, then repaint all three nodes
    pub fn add_tip(&mut self, tip: &Tip) {
        self.upsert(&tip.h, Some(tip.v));
        self.upsert(&tip.t, None);
        self.upsert(&tip.b, None);

        self.add_edge(&tip.h, &tip.t);
        self.add_edge(&tip.h, &tip.b);

        self.recompute(&tip.t);
        self.recompute(&tip.b);
        self.recompute(&tip.h);
    }

    pub fn add_tips(&mut self, tips: &[Tip]) {
        for tip in tips {
            self.add_tip(tip);
        }
    }

    /// Paint the hover colour on `hash`, restoring any previously hovered
    /// node first. Returns the hover label.
    pub fn hover(&mut self, hash: &str) -> Option<String> {
        let value = self.nodes.get(hash)?.value;

        if let Some(previous) = self.hovered.take() {
            self.recompute(&previous);
        }
        self.renderer.set_color(hash, Color::HOVER);
        self.hovered = Some(hash.to_string());

        Some(format!("{} {}", format_magnitude(value, ""), hash))
    }

    /// Restore the category colour of `hash`
    pub fn unhover(&mut self, hash: &str) {
        if self.hovered.as_deref() == Some(hash) {
            self.hovered = None;
        }
        self.recompute(hash);
    }

    pub fn category_of(&self, hash: &str) -> Option<Category> {
        self.nodes.get(hash).map(GraphNode::category)
    }

    pub fn degree(&self, hash: &str) -> usize {
        self.nodes.get(hash).map_or(0, |node| node.degree)
    }

    pub fn value_of(&self, hash: &str) -> Option<f64> {
        self.nodes.get(hash).map(|node| node.value)
    }

    pub fn is_provisional(&self, hash: &str) -> bool {
        self.nodes.get(hash).is_some_and(|node| node.provisional)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// `value` is `None` for a parent reference
    fn upsert(&mut self, hash: &str, value: Option<f64>) {
        match self.nodes.get_mut(hash) {
            Some(node) => {
                if let Some(value) = value {
                    node.value = value;
                    node.provisional = false;
                }
            }
            None => {
                self.nodes.insert(
                    hash.to_string(),
                    GraphNode {
                        value: value.unwrap_or(0.0),
                        provisional: value.is_none(),
                        degree: 0,
                    },
                );
                self.renderer.add_node(hash);
            }
        }
    }

    fn add_edge(&mut self, from: &str, to: &str) {
        if !self.edges.insert((from.to_string(), to.to_string())) {
            return;
        }

        // A self-loop counts once
        if let Some(node) = self.nodes.get_mut(from) {
            node.degree += 1;
        }
        if from != to {
            if let Some(node) = self.nodes.get_mut(to) {
                node.degree += 1;
            }
        }
        self.renderer.add_link(from, to, Color::LINE);
    }

    fn recompute(&mut self, hash: &str) {
        if self.hovered.as_deref() == Some(hash) {
            return;
        }
        if let Some(node) = self.nodes.get(hash) {
            self.renderer.set_color(hash, node.category().color());
        }
    }
}
