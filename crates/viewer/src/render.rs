//! Rendering collaborator
//!
//! The reconciler only ever adds nodes, adds links and paints nodes, so a
//! rendering engine needs to expose nothing else.

use std::collections::HashMap;

/// RGBA colour, `0xRRGGBBAA`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color(pub u32);

impl Color {
    pub const VALUE: Color = Color(0x00aa97ff);
    pub const EMPTY: Color = Color(0x6340bbff);
    pub const UNCONFIRMED: Color = Color(0x3e4040ff);
    pub const LINE: Color = Color(0x2e2e2eff);
    pub const HOVER: Color = Color(0xffffffff);
}

/// Node/edge/colour mutation API of a graph renderer
pub trait Renderer {
    /// Add a node; adding an existing node is a no-op
    fn add_node(&mut self, hash: &str);

    /// Add a directed link between two existing nodes
    fn add_link(&mut self, from: &str, to: &str, color: Color);

    fn set_color(&mut self, hash: &str, color: Color);
}

/// Renderer that keeps the drawn graph in memory
#[derive(Debug, Default)]
pub struct HeadlessRenderer {
    colors: HashMap<String, Color>,
    links: Vec<(String, String, Color)>,
    repaints: u64,
}

impl HeadlessRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn color_of(&self, hash: &str) -> Option<Color> {
        self.colors.get(hash).copied()
    }

    pub fn node_count(&self) -> usize {
        self.colors.len()
    }

    pub fn links(&self) -> &[(String, String, Color)] {
        &self.links
    }

    /// Number of colour changes applied so far
    pub fn repaints(&self) -> u64 {
        self.repaints
    }
}

impl Renderer for HeadlessRenderer {
    fn add_node(&mut self, hash: &str) {
        self.colors
            .entry(hash.to_string())
            .or_insert(Color::UNCONFIRMED);
    }

    fn add_link(&mut self, from: &str, to: &str, color: Color) {
        self.links.push((from.to_string(), to.to_string(), color));
    }

    fn set_color(&mut self, hash: &str, color: Color) {
        if let Some(current) = self.colors.get_mut(hash) {
            if *current != color {
                tracing::trace!("Node {:.12} {:08x} -> {:08x}", hash, current.0, color.0);
                *current = color;
                self.repaints += 1;
            }
        }
    }
}
