use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::geometry::Pose;
use crate::model::core::{Connection, Platform, Sobject, SobjectId, content_hash};

/// Rooted tree of sobjects produced by layout resolution.
///
/// Nodes hold ids, not sobject values: the tree is pure structure and the
/// layout stays the single owner of sobject state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Assembly {
    pub sobject_id: SobjectId,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parts: Vec<Assembly>,
}

impl Assembly {
    pub fn leaf(sobject_id: impl Into<SobjectId>) -> Self {
        Self {
            sobject_id: sobject_id.into(),
            parts: Vec::new(),
        }
    }

    pub fn with_parts(sobject_id: impl Into<SobjectId>, parts: Vec<Assembly>) -> Self {
        Self {
            sobject_id: sobject_id.into(),
            parts,
        }
    }

    /// Nodes of this subtree in breadth-first order, root first.
    pub fn walk(&self) -> impl Iterator<Item = &Assembly> {
        let mut queue = VecDeque::from([self]);
        std::iter::from_fn(move || {
            let node = queue.pop_front()?;
            queue.extend(node.parts.iter());
            Some(node)
        })
    }

    pub fn contains(&self, sobject_id: &str) -> bool {
        self.walk().any(|node| node.sobject_id == sobject_id)
    }

    /// Number of sobjects in this subtree.
    pub fn sobject_count(&self) -> usize {
        self.walk().count()
    }
}

/// Traversal strategy for layout resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayoutStrategy {
    /// Grow assemblies outward from the seeded roots, closest edges first.
    #[default]
    BreadthFirst,
    /// Declared but not implemented; resolution rejects it as unsupported.
    DepthFirst,
}

impl fmt::Display for LayoutStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutStrategy::BreadthFirst => f.write_str("breadth-first"),
            LayoutStrategy::DepthFirst => f.write_str("depth-first"),
        }
    }
}

/// A design to resolve: placed sobjects, declared connections, optional
/// pre-supplied partial assemblies, and the traversal strategy.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Layout {
    pub sobjects: Vec<Sobject>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub connections: Vec<Connection>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assemblies: Vec<Assembly>,
    #[serde(default)]
    pub strategy: LayoutStrategy,
}

impl Layout {
    pub fn new(sobjects: Vec<Sobject>, connections: Vec<Connection>) -> Self {
        Self {
            sobjects,
            connections,
            assemblies: Vec::new(),
            strategy: LayoutStrategy::default(),
        }
    }

    /// Pre-supplied partial assemblies, in seeding order.
    pub fn with_assemblies(mut self, assemblies: Vec<Assembly>) -> Self {
        self.assemblies = assemblies;
        self
    }

    pub fn with_strategy(mut self, strategy: LayoutStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn sobject(&self, id: &str) -> Option<&Sobject> {
        self.sobjects.iter().find(|sobject| sobject.id == id)
    }

    /// Stable identity-by-value over the canonical serialized form.
    pub fn content_hash(&self) -> Result<blake3::Hash> {
        content_hash(self)
    }
}

/// Platform-specific geometry payload produced by a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Representation {
    pub platform: Platform,
    pub body: String,
}

impl Representation {
    pub fn new(platform: impl Into<Platform>, body: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
            body: body.into(),
        }
    }

    pub fn empty(platform: impl Into<Platform>) -> Self {
        Self::new(platform, "")
    }
}

/// Fully resolved output for one sobject: where it sits and what to draw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub sobject_id: SobjectId,
    pub pose: Pose,
    pub representation: Representation,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> Assembly {
        Assembly::with_parts(
            "base",
            vec![
                Assembly::with_parts("left", vec![Assembly::leaf("left-cap")]),
                Assembly::leaf("right"),
            ],
        )
    }

    #[test]
    fn walk_visits_breadth_first() {
        let tree = sample_tree();
        let order: Vec<&str> = tree.walk().map(|node| node.sobject_id.as_str()).collect();
        assert_eq!(order, ["base", "left", "right", "left-cap"]);
    }

    #[test]
    fn contains_finds_nested_nodes() {
        let tree = sample_tree();
        assert!(tree.contains("left-cap"));
        assert!(!tree.contains("missing"));
        assert_eq!(tree.sobject_count(), 4);
    }

    #[test]
    fn strategy_displays_kebab_case() {
        assert_eq!(LayoutStrategy::BreadthFirst.to_string(), "breadth-first");
        assert_eq!(LayoutStrategy::DepthFirst.to_string(), "depth-first");
    }

    #[test]
    fn layout_lookup_by_id() {
        let layout = Layout::new(vec![Sobject::new("base", Pose::identity())], Vec::new());
        assert!(layout.sobject("base").is_some());
        assert!(layout.sobject("other").is_none());
    }
}
