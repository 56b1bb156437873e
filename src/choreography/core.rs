use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use crate::connect::connect;
use crate::error::{AssemblyError, Result};
use crate::geometry::{Pose, Vector};
use crate::logging::{LogLevel, Logger, event_with_fields, json_kv, json_str};
use crate::metrics::ResolveMetrics;
use crate::model::{Assembly, Connection, Element, Sobject, SobjectId};
use crate::provider::GeometryProvider;

const LOG_TARGET: &str = "kitbash::choreography";

/// One tree edge, resolved to the connection that places it.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainLink {
    pub parent: SobjectId,
    pub child: SobjectId,
    /// Index into the connection list the chain was built against.
    pub connection: usize,
    /// The declared ends run child-to-parent; apply the connection reversed.
    pub reversed: bool,
}

/// Decomposes an assembly tree into its root-to-leaf chains, in parts order.
///
/// Each tree edge is matched to the first declared connection running
/// parent-to-child; failing that, the first running child-to-parent is used
/// reversed. An edge with no declared connection at all is an error.
pub fn chains(assembly: &Assembly, connections: &[Connection]) -> Result<Vec<Vec<ChainLink>>> {
    let mut out = Vec::new();
    let mut prefix = Vec::new();
    collect_chains(assembly, connections, &mut prefix, &mut out)?;
    Ok(out)
}

fn collect_chains(
    node: &Assembly,
    connections: &[Connection],
    prefix: &mut Vec<ChainLink>,
    out: &mut Vec<Vec<ChainLink>>,
) -> Result<()> {
    if node.parts.is_empty() {
        if !prefix.is_empty() {
            out.push(prefix.clone());
        }
        return Ok(());
    }
    for part in &node.parts {
        prefix.push(find_connection(
            &node.sobject_id,
            &part.sobject_id,
            connections,
        )?);
        collect_chains(part, connections, prefix, out)?;
        prefix.pop();
    }
    Ok(())
}

fn find_connection(parent: &str, child: &str, connections: &[Connection]) -> Result<ChainLink> {
    let link = |connection: usize, reversed: bool| ChainLink {
        parent: parent.to_string(),
        child: child.to_string(),
        connection,
        reversed,
    };
    if let Some(index) = connections.iter().position(|connection| {
        connection.attractor.sobject_id == parent && connection.attracted.sobject_id == child
    }) {
        return Ok(link(index, false));
    }
    if let Some(index) = connections.iter().position(|connection| {
        connection.attractor.sobject_id == child && connection.attracted.sobject_id == parent
    }) {
        return Ok(link(index, true));
    }
    Err(AssemblyError::MissingConnection {
        attractor: parent.to_string(),
        attracted: child.to_string(),
    })
}

/// Computes absolute poses for every sobject of one assembly tree.
///
/// Chains are walked independently with a per-chain drift displacement.
/// Every link connects the declared poses of its two ends, so chains sharing
/// a prefix recompute the shared links to the same values.
pub struct Choreography {
    update_points_of_view: bool,
    logger: Option<Logger>,
    metrics: Option<Arc<Mutex<ResolveMetrics>>>,
}

impl Default for Choreography {
    fn default() -> Self {
        Self {
            update_points_of_view: true,
            logger: None,
            metrics: None,
        }
    }
}

impl Choreography {
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggles drift correction. On (the default), each placed part feeds
    /// the gap between its declared and computed position back into the
    /// chain so downstream parts keep their declared relative arrangement.
    pub fn with_update_points_of_view(mut self, enabled: bool) -> Self {
        self.update_points_of_view = enabled;
        self
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Mutex<ResolveMetrics>>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Resolves the absolute pose of every sobject in `assembly`.
    ///
    /// The root keeps its declared pose. Each chain is then walked root to
    /// leaf, placing every child by its connection to the parent. The result
    /// maps every tree node, roots included.
    pub fn resolve_poses(
        &self,
        assembly: &Assembly,
        sobjects: &[Sobject],
        connections: &[Connection],
        provider: &dyn GeometryProvider,
    ) -> Result<BTreeMap<SobjectId, Pose>> {
        let index = sobject_index(sobjects);
        let root = declared(&index, &assembly.sobject_id)?;

        let mut poses = BTreeMap::new();
        poses.insert(root.id.clone(), root.pose);

        let mut placed = 0usize;
        for chain in chains(assembly, connections)? {
            let mut displacement = Vector::zeros();
            for link in &chain {
                let parent = declared(&index, &link.parent)?;
                let child = declared(&index, &link.child)?;
                let oriented = if link.reversed {
                    connections[link.connection].reversed()
                } else {
                    connections[link.connection].clone()
                };
                let result = connect(&oriented, parent, child, provider)?;
                poses.insert(
                    child.id.clone(),
                    result
                        .attracted_pose
                        .with_point_of_view(result.attracted_pose.point_of_view() + displacement),
                );
                if self.update_points_of_view {
                    displacement +=
                        child.pose.point_of_view() - result.attracted_pose.point_of_view();
                }
                placed += 1;
            }
        }

        self.record(|metrics| metrics.record_connections(placed));
        self.log(
            LogLevel::Debug,
            "poses_resolved",
            [
                json_str("root", assembly.sobject_id.clone()),
                json_kv("sobjects", poses.len()),
                json_kv("connections", placed),
            ],
        );

        Ok(poses)
    }

    /// Resolves poses, then pairs each sobject with its geometry for
    /// `target_platform`. Elements come back in sobject-id order.
    pub fn assembly_to_elements(
        &self,
        assembly: &Assembly,
        sobjects: &[Sobject],
        connections: &[Connection],
        provider: &dyn GeometryProvider,
        target_platform: &str,
    ) -> Result<Vec<Element>> {
        let poses = self.resolve_poses(assembly, sobjects, connections, provider)?;
        let index = sobject_index(sobjects);
        let mut elements = Vec::with_capacity(poses.len());
        for (sobject_id, pose) in poses {
            let sobject = declared(&index, &sobject_id)?;
            let representation = provider.request_geometry(&sobject.parameters, target_platform)?;
            elements.push(Element {
                sobject_id,
                pose,
                representation,
            });
        }
        Ok(elements)
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

/// Index by id; duplicate declarations keep the first, as in
/// [`crate::graph::LayoutGraph::from_layout`].
fn sobject_index(sobjects: &[Sobject]) -> HashMap<&str, &Sobject> {
    let mut index = HashMap::with_capacity(sobjects.len());
    for sobject in sobjects {
        index.entry(sobject.id.as_str()).or_insert(sobject);
    }
    index
}

fn declared<'a>(index: &HashMap<&str, &'a Sobject>, id: &SobjectId) -> Result<&'a Sobject> {
    index
        .get(id.as_str())
        .copied()
        .ok_or_else(|| AssemblyError::UnknownSobject(id.clone()))
}
