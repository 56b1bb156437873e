use std::collections::{BTreeMap, HashMap, HashSet};

use blake3::Hash;

use crate::error::Result;
use crate::geometry::Pose;
use crate::model::{SobjectId, content_hash};

/// Last known pose for one sobject.
#[derive(Debug, Clone)]
struct PoseState {
    pose: Pose,
    hash: Hash,
}

/// Registry mapping sobjects to their last resolved poses.
///
/// Downstream consumers sync after every resolution and re-export only the
/// entries that actually moved. Change detection hashes each pose's
/// canonical serialized bytes, so float noise below the serialization
/// precision never counts as a move.
#[derive(Debug, Default)]
pub struct PoseRegistry {
    entries: HashMap<SobjectId, PoseState>,
    dirty: HashSet<SobjectId>,
}

impl PoseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upserts the freshly resolved poses and drops entries whose sobjects
    /// are gone. An entry turns dirty when it is new or its hash changed.
    pub fn sync_poses(&mut self, resolved: &BTreeMap<SobjectId, Pose>) -> Result<()> {
        use std::collections::hash_map::Entry;

        let mut newly_dirty = Vec::new();

        for (id, pose) in resolved {
            let hash = content_hash(pose)?;
            match self.entries.entry(id.clone()) {
                Entry::Occupied(mut entry) => {
                    let state = entry.get_mut();
                    if state.hash != hash {
                        state.pose = *pose;
                        state.hash = hash;
                        newly_dirty.push(id.clone());
                    }
                }
                Entry::Vacant(vacant) => {
                    vacant.insert(PoseState { pose: *pose, hash });
                    newly_dirty.push(id.clone());
                }
            }
        }

        // Drop sobjects no longer present.
        let to_remove: Vec<_> = self
            .entries
            .keys()
            .filter(|id| !resolved.contains_key(*id))
            .cloned()
            .collect();
        for id in to_remove {
            self.entries.remove(&id);
            self.dirty.remove(&id);
        }

        for id in newly_dirty {
            self.dirty.insert(id);
        }
        Ok(())
    }

    /// Drains the dirty set in sobject-id order.
    pub fn take_dirty(&mut self) -> Vec<(SobjectId, Pose)> {
        let mut ids: Vec<_> = self.dirty.drain().collect();
        ids.sort_unstable();
        ids.into_iter()
            .filter_map(|id| {
                self.entries
                    .get(&id)
                    .map(|state| state.pose)
                    .map(|pose| (id, pose))
            })
            .collect()
    }

    pub fn pose_of(&self, id: &str) -> Option<Pose> {
        self.entries.get(id).map(|state| state.pose)
    }

    pub fn has_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;

    fn pose_at(x: f64) -> Pose {
        Pose::new(Point::new(x, 0.0, 0.0), [1.0, 0.0, 0.0, 0.0]).unwrap()
    }

    fn resolved(entries: &[(&str, f64)]) -> BTreeMap<SobjectId, Pose> {
        entries
            .iter()
            .map(|(id, x)| ((*id).to_string(), pose_at(*x)))
            .collect()
    }

    #[test]
    fn new_ids_come_back_dirty() {
        let mut registry = PoseRegistry::new();
        registry.sync_poses(&resolved(&[("beam", 1.0)])).unwrap();
        let dirty = registry.take_dirty();
        assert_eq!(dirty.len(), 1);
        assert_eq!(dirty[0].0, "beam");
        assert!(!registry.has_dirty());
    }

    #[test]
    fn unchanged_poses_are_not_reflagged() {
        let mut registry = PoseRegistry::new();
        let poses = resolved(&[("beam", 1.0)]);
        registry.sync_poses(&poses).unwrap();
        registry.take_dirty();

        registry.sync_poses(&poses).unwrap();
        assert!(registry.take_dirty().is_empty());
    }

    #[test]
    fn moved_poses_are_flagged() {
        let mut registry = PoseRegistry::new();
        registry.sync_poses(&resolved(&[("beam", 1.0)])).unwrap();
        registry.take_dirty();

        registry.sync_poses(&resolved(&[("beam", 2.0)])).unwrap();
        let dirty = registry.take_dirty();
        assert_eq!(dirty.len(), 1);
        assert_eq!(dirty[0].1.point_of_view(), Point::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn removed_ids_are_dropped() {
        let mut registry = PoseRegistry::new();
        registry
            .sync_poses(&resolved(&[("beam", 1.0), ("panel", 2.0)]))
            .unwrap();
        registry.take_dirty();

        registry.sync_poses(&resolved(&[("beam", 1.0)])).unwrap();
        assert!(registry.pose_of("panel").is_none());
        assert!(!registry.has_dirty());
    }

    #[test]
    fn dirty_entries_drain_in_id_order() {
        let mut registry = PoseRegistry::new();
        registry
            .sync_poses(&resolved(&[("z", 1.0), ("a", 2.0), ("m", 3.0)]))
            .unwrap();
        let ids: Vec<_> = registry
            .take_dirty()
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(ids, vec!["a", "m", "z"]);
    }
}
