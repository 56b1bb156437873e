use std::collections::{HashMap, VecDeque};

use crate::error::{AssemblyError, Result};
use crate::model::{Layout, SobjectId};

/// Index of a node in a [`LayoutGraph`] arena.
pub type NodeIndex = usize;

/// Index of an edge in a [`LayoutGraph`] arena.
pub type EdgeIndex = usize;

/// One edge yielded by [`LayoutGraph::edge_bfs`], oriented away from the
/// frontier node it was discovered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeVisit {
    pub parent: NodeIndex,
    pub child: NodeIndex,
    pub edge: EdgeIndex,
    /// Position of the backing connection in the layout's declaration order.
    pub connection: usize,
}

#[derive(Debug)]
struct GraphEdge {
    a: NodeIndex,
    b: NodeIndex,
    connection: usize,
}

/// Undirected multigraph over a layout's sobjects and connections.
///
/// Arena representation: nodes in declaration order, edges in declaration
/// order, adjacency lists of edge indices per node. Traversals are
/// deterministic for a fixed input order.
#[derive(Debug)]
pub struct LayoutGraph {
    nodes: Vec<SobjectId>,
    index: HashMap<SobjectId, NodeIndex>,
    edges: Vec<GraphEdge>,
    adjacency: Vec<Vec<EdgeIndex>>,
}

impl LayoutGraph {
    /// Builds the graph and validates connection endpoints: self-loops fail
    /// with `SelfConnection`, endpoints naming undeclared sobjects with
    /// `UnknownSobject`. Duplicate sobject declarations keep the first.
    pub fn from_layout(layout: &Layout) -> Result<Self> {
        let mut nodes = Vec::with_capacity(layout.sobjects.len());
        let mut index = HashMap::with_capacity(layout.sobjects.len());
        for sobject in &layout.sobjects {
            if index.contains_key(&sobject.id) {
                continue;
            }
            index.insert(sobject.id.clone(), nodes.len());
            nodes.push(sobject.id.clone());
        }

        let mut edges = Vec::with_capacity(layout.connections.len());
        let mut adjacency = vec![Vec::new(); nodes.len()];
        for (connection_idx, connection) in layout.connections.iter().enumerate() {
            let from = &connection.attractor.sobject_id;
            let to = &connection.attracted.sobject_id;
            if from == to {
                return Err(AssemblyError::SelfConnection(from.clone()));
            }
            let a = *index
                .get(from)
                .ok_or_else(|| AssemblyError::UnknownSobject(from.clone()))?;
            let b = *index
                .get(to)
                .ok_or_else(|| AssemblyError::UnknownSobject(to.clone()))?;
            let edge = edges.len();
            edges.push(GraphEdge {
                a,
                b,
                connection: connection_idx,
            });
            adjacency[a].push(edge);
            adjacency[b].push(edge);
        }

        Ok(Self {
            nodes,
            index,
            edges,
            adjacency,
        })
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node_id(&self, node: NodeIndex) -> &SobjectId {
        &self.nodes[node]
    }

    pub fn node_index(&self, id: &str) -> Option<NodeIndex> {
        self.index.get(id).copied()
    }

    /// Connected components, ordered by first declared node; nodes within a
    /// component in breadth-first discovery order.
    pub fn connected_components(&self) -> Vec<Vec<NodeIndex>> {
        let mut seen = vec![false; self.nodes.len()];
        let mut components = Vec::new();
        for start in 0..self.nodes.len() {
            if seen[start] {
                continue;
            }
            seen[start] = true;
            let mut component = vec![start];
            let mut frontier = VecDeque::from([start]);
            while let Some(node) = frontier.pop_front() {
                for &edge in &self.adjacency[node] {
                    let other = self.other_end(edge, node);
                    if !seen[other] {
                        seen[other] = true;
                        component.push(other);
                        frontier.push_back(other);
                    }
                }
            }
            components.push(component);
        }
        components
    }

    /// Breadth-first edge traversal from multiple sources: pop a frontier
    /// node, yield its not-yet-visited incident edges in declaration order
    /// (oriented away from it), push each far endpoint. Every edge reachable
    /// from the sources is yielded exactly once; edges into already-seen
    /// nodes are still yielded, which is what lets callers decide ties.
    pub fn edge_bfs(&self, sources: &[NodeIndex]) -> EdgeBfs<'_> {
        EdgeBfs {
            graph: self,
            frontier: sources.iter().copied().collect(),
            visited: vec![false; self.edges.len()],
            current: None,
        }
    }

    fn other_end(&self, edge: EdgeIndex, node: NodeIndex) -> NodeIndex {
        let e = &self.edges[edge];
        if e.a == node { e.b } else { e.a }
    }
}

/// Iterator state for [`LayoutGraph::edge_bfs`].
pub struct EdgeBfs<'a> {
    graph: &'a LayoutGraph,
    frontier: VecDeque<NodeIndex>,
    visited: Vec<bool>,
    current: Option<(NodeIndex, usize)>,
}

impl Iterator for EdgeBfs<'_> {
    type Item = EdgeVisit;

    fn next(&mut self) -> Option<EdgeVisit> {
        loop {
            if let Some((node, position)) = self.current {
                let adjacency = &self.graph.adjacency[node];
                for (offset, &edge) in adjacency[position..].iter().enumerate() {
                    if self.visited[edge] {
                        continue;
                    }
                    self.visited[edge] = true;
                    let child = self.graph.other_end(edge, node);
                    self.frontier.push_back(child);
                    self.current = Some((node, position + offset + 1));
                    return Some(EdgeVisit {
                        parent: node,
                        child,
                        edge,
                        connection: self.graph.edges[edge].connection,
                    });
                }
                self.current = None;
            }
            let node = self.frontier.pop_front()?;
            self.current = Some((node, 0));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Pose;
    use crate::model::{Connection, Sobject};

    fn layout_of(ids: &[&str], pairs: &[(&str, &str)]) -> Layout {
        let sobjects = ids
            .iter()
            .map(|id| Sobject::new(*id, Pose::identity()))
            .collect();
        let connections = pairs
            .iter()
            .map(|(a, b)| Connection::simple(*a, *b).unwrap())
            .collect();
        Layout::new(sobjects, connections)
    }

    fn visits_as_ids(graph: &LayoutGraph, sources: &[NodeIndex]) -> Vec<(String, String)> {
        graph
            .edge_bfs(sources)
            .map(|visit| {
                (
                    graph.node_id(visit.parent).clone(),
                    graph.node_id(visit.child).clone(),
                )
            })
            .collect()
    }

    #[test]
    fn edge_bfs_visits_edges_level_by_level() {
        let layout = layout_of(
            &["1", "1a", "1b", "1a1", "1b1", "a", "b", "1ab"],
            &[
                ("1", "1a"),
                ("1", "1b"),
                ("1a", "1a1"),
                ("1b", "1b1"),
                ("1a1", "a"),
                ("1b1", "b"),
                ("1a", "1ab"),
                ("1b", "1ab"),
            ],
        );
        let graph = LayoutGraph::from_layout(&layout).unwrap();
        let root = graph.node_index("1").unwrap();
        let order = visits_as_ids(&graph, &[root]);
        let expected: Vec<(String, String)> = [
            ("1", "1a"),
            ("1", "1b"),
            ("1a", "1a1"),
            ("1a", "1ab"),
            ("1b", "1b1"),
            ("1b", "1ab"),
            ("1a1", "a"),
            ("1b1", "b"),
        ]
        .iter()
        .map(|(a, b)| ((*a).to_string(), (*b).to_string()))
        .collect();
        assert_eq!(order, expected);
    }

    #[test]
    fn cycles_yield_each_edge_once() {
        let layout = layout_of(
            &["x", "y", "z"],
            &[("x", "y"), ("y", "z"), ("z", "x")],
        );
        let graph = LayoutGraph::from_layout(&layout).unwrap();
        let source = graph.node_index("x").unwrap();
        let visits: Vec<_> = graph.edge_bfs(&[source]).collect();
        assert_eq!(visits.len(), 3);
        let mut edges: Vec<_> = visits.iter().map(|v| v.edge).collect();
        edges.sort_unstable();
        assert_eq!(edges, vec![0, 1, 2]);
    }

    #[test]
    fn parallel_edges_are_distinct() {
        let layout = layout_of(&["x", "y"], &[("x", "y"), ("x", "y")]);
        let graph = LayoutGraph::from_layout(&layout).unwrap();
        let source = graph.node_index("x").unwrap();
        let visits: Vec<_> = graph.edge_bfs(&[source]).collect();
        assert_eq!(visits.len(), 2);
        assert_eq!(visits[0].connection, 0);
        assert_eq!(visits[1].connection, 1);
    }

    #[test]
    fn components_follow_declaration_order() {
        let layout = layout_of(
            &["m", "n", "o", "p", "lone"],
            &[("o", "p"), ("m", "n")],
        );
        let graph = LayoutGraph::from_layout(&layout).unwrap();
        let components: Vec<Vec<String>> = graph
            .connected_components()
            .into_iter()
            .map(|component| {
                component
                    .into_iter()
                    .map(|node| graph.node_id(node).clone())
                    .collect()
            })
            .collect();
        assert_eq!(
            components,
            vec![
                vec!["m".to_string(), "n".to_string()],
                vec!["o".to_string(), "p".to_string()],
                vec!["lone".to_string()],
            ]
        );
    }

    #[test]
    fn self_loops_are_rejected() {
        let mut layout = layout_of(&["x", "y"], &[("x", "y")]);
        layout.connections[0].attracted.sobject_id = "x".to_string();
        let result = LayoutGraph::from_layout(&layout);
        assert!(matches!(result, Err(AssemblyError::SelfConnection(id)) if id == "x"));
    }

    #[test]
    fn unknown_endpoints_are_rejected() {
        let layout = layout_of(&["x"], &[("x", "ghost")]);
        let result = LayoutGraph::from_layout(&layout);
        assert!(matches!(result, Err(AssemblyError::UnknownSobject(id)) if id == "ghost"));
    }

    #[test]
    fn duplicate_declarations_keep_the_first() {
        let layout = layout_of(&["x", "x", "y"], &[("x", "y")]);
        let graph = LayoutGraph::from_layout(&layout).unwrap();
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.node_index("x"), Some(0));
    }
}
