use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::error::{AssemblyError, Result};
use crate::graph::{LayoutGraph, NodeIndex};
use crate::logging::{LogLevel, Logger, event_with_fields, json_kv, json_str};
use crate::metrics::ResolveMetrics;
use crate::model::{Assembly, Layout, LayoutStrategy};

const LOG_TARGET: &str = "kitbash::assembler";

/// Turns layouts into forests of rooted assembly trees.
///
/// Stateless between calls apart from the optional logger and metrics
/// handles, so one assembler can serve many layouts.
#[derive(Default)]
pub struct Assembler {
    logger: Option<Logger>,
    metrics: Option<Arc<Mutex<ResolveMetrics>>>,
}

/// Output tree under construction. Nodes link children by arena slot, so a
/// sobject can be linked at most once and the result is acyclic by
/// construction.
struct ArenaNode {
    node: NodeIndex,
    parts: Vec<usize>,
}

impl Assembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Mutex<ResolveMetrics>>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Resolves a layout into its assembly forest.
    ///
    /// Pre-supplied assemblies are seeded first, in input order, with the
    /// first assignment winning any double claim (a warning, never an
    /// error). The remaining structure grows by breadth-first edge traversal
    /// from the seeded roots: the first parent to reach an unassigned
    /// sobject keeps it. Sobjects never reached become singleton roots.
    /// Every sobject of the layout ends up in exactly one tree of the
    /// returned forest, and identical inputs yield identical forests.
    pub fn layout_to_assemblies(&self, layout: &Layout) -> Result<Vec<Assembly>> {
        if layout.strategy != LayoutStrategy::BreadthFirst {
            return Err(AssemblyError::UnsupportedStrategy(layout.strategy));
        }
        let graph = LayoutGraph::from_layout(layout)?;

        let mut arena: Vec<ArenaNode> = Vec::with_capacity(graph.node_count());
        let mut assigned: Vec<Option<usize>> = vec![None; graph.node_count()];
        let mut is_root = vec![true; graph.node_count()];
        let mut conflicts = 0usize;

        // Seed the pre-supplied subtrees breadth-first, parents before parts.
        let mut sources = Vec::with_capacity(layout.assemblies.len());
        let mut queue: VecDeque<(&Assembly, Option<usize>)> = VecDeque::new();
        for assembly in &layout.assemblies {
            let root = graph
                .node_index(&assembly.sobject_id)
                .ok_or_else(|| AssemblyError::UnknownSobject(assembly.sobject_id.clone()))?;
            sources.push(root);
            queue.push_back((assembly, None));
        }
        while let Some((subtree, parent)) = queue.pop_front() {
            let node = graph
                .node_index(&subtree.sobject_id)
                .ok_or_else(|| AssemblyError::UnknownSobject(subtree.sobject_id.clone()))?;
            if assigned[node].is_some() {
                conflicts += 1;
                self.log(
                    LogLevel::Warn,
                    "conflicting_preassignment",
                    [json_str("sobject", subtree.sobject_id.clone())],
                );
                self.record(ResolveMetrics::record_conflict);
                continue;
            }
            let slot = arena.len();
            arena.push(ArenaNode {
                node,
                parts: Vec::new(),
            });
            assigned[node] = Some(slot);
            if let Some(parent_slot) = parent {
                arena[parent_slot].parts.push(slot);
                is_root[node] = false;
            }
            for part in &subtree.parts {
                queue.push_back((part, Some(slot)));
            }
        }

        // Grow the forest outward from the seeds; the first parent to reach
        // an unassigned sobject appends it as a leaf.
        for visit in graph.edge_bfs(&sources) {
            if assigned[visit.child].is_some() {
                continue;
            }
            let Some(parent_slot) = assigned[visit.parent] else {
                continue;
            };
            let slot = arena.len();
            arena.push(ArenaNode {
                node: visit.child,
                parts: Vec::new(),
            });
            assigned[visit.child] = Some(slot);
            arena[parent_slot].parts.push(slot);
            is_root[visit.child] = false;
        }

        // Roots in declaration order; untouched sobjects stay singletons.
        let mut forest = Vec::new();
        for node in 0..graph.node_count() {
            if !is_root[node] {
                continue;
            }
            let assembly = match assigned[node] {
                Some(slot) => materialize(&graph, &arena, slot),
                None => Assembly::leaf(graph.node_id(node).clone()),
            };
            forest.push(assembly);
        }

        self.record(|metrics| {
            metrics.record_layout();
            metrics.record_placements(graph.node_count());
        });
        self.log(
            LogLevel::Info,
            "layout_resolved",
            [
                json_kv("sobjects", graph.node_count()),
                json_kv("roots", forest.len()),
                json_kv("conflicts", conflicts),
            ],
        );

        Ok(forest)
    }

    fn log<I>(&self, level: LogLevel, message: &str, fields: I)
    where
        I: IntoIterator<Item = (String, serde_json::Value)>,
    {
        if let Some(logger) = self.logger.as_ref() {
            let _ = logger.log_event(event_with_fields(level, LOG_TARGET, message, fields));
        }
    }

    fn record(&self, update: impl FnOnce(&mut ResolveMetrics)) {
        if let Some(metrics) = self.metrics.as_ref() {
            if let Ok(mut guard) = metrics.lock() {
                update(&mut guard);
            }
        }
    }
}

fn materialize(graph: &LayoutGraph, arena: &[ArenaNode], slot: usize) -> Assembly {
    let node = &arena[slot];
    let parts = node
        .parts
        .iter()
        .map(|&part| materialize(graph, arena, part))
        .collect();
    Assembly::with_parts(graph.node_id(node.node).clone(), parts)
}
