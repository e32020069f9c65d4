use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Frame paths grouped by pose name. Pose insertion order is the row order of
/// every sheet built from the set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoseFrameSet {
    poses: IndexMap<String, Vec<String>>,
}

impl PoseFrameSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a pose, keeping its original position when replaced.
    pub fn insert(&mut self, pose: impl Into<String>, frames: Vec<String>) {
        self.poses.insert(pose.into(), frames);
    }

    pub fn get(&self, pose: &str) -> Option<&[String]> {
        self.poses.get(pose).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.poses
            .iter()
            .map(|(pose, frames)| (pose.as_str(), frames.as_slice()))
    }

    /// Poses that have at least one frame, in order.
    pub fn non_empty(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.iter().filter(|(_, frames)| !frames.is_empty())
    }

    pub fn first_non_empty(&self) -> Option<(&str, &[String])> {
        self.non_empty().next()
    }

    pub fn len(&self) -> usize {
        self.poses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }

    pub fn frame_count(&self) -> usize {
        self.poses.values().map(Vec::len).sum()
    }

    /// Every frame in pose order, then frame order.
    pub fn flatten(&self) -> Vec<String> {
        self.poses.values().flatten().cloned().collect()
    }
}

impl<P: Into<String>> FromIterator<(P, Vec<String>)> for PoseFrameSet {
    fn from_iter<I: IntoIterator<Item = (P, Vec<String>)>>(iter: I) -> Self {
        Self {
            poses: iter
                .into_iter()
                .map(|(pose, frames)| (pose.into(), frames))
                .collect(),
        }
    }
}

/// Rewrites a path with forward slashes regardless of the host separator.
pub fn to_posix(path: impl AsRef<Path>) -> String {
    path.as_ref().to_string_lossy().replace('\\', "/")
}

/// Groups a flat frame list by pose, reading names shaped like
/// `<basename>_<pose>_<index>.<ext>`. Names that do not parse land in the
/// `"pose"` group. Each group is sorted.
pub fn group_frames_by_pose(paths: &[String], basename: &str) -> PoseFrameSet {
    let prefix = format!("{basename}_");
    let mut groups: IndexMap<String, Vec<String>> = IndexMap::new();

    for path in paths {
        let stem = Path::new(path)
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();

        let pose = stem
            .strip_prefix(&prefix)
            .and_then(|rest| rest.rsplit_once('_'))
            .map(|(pose, _index)| pose)
            .filter(|pose| !pose.is_empty())
            .unwrap_or("pose");

        groups
            .entry(pose.to_string())
            .or_default()
            .push(path.clone());
    }

    for frames in groups.values_mut() {
        frames.sort();
    }
    PoseFrameSet { poses: groups }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn keeps_insertion_order_and_skips_empty_poses() {
        let set: PoseFrameSet = vec![
            ("walk", paths(&["w1.png"])),
            ("idle", Vec::new()),
            ("attack", paths(&["a1.png", "a2.png"])),
        ]
        .into_iter()
        .collect();

        let order: Vec<&str> = set.iter().map(|(pose, _)| pose).collect();
        assert_eq!(order, ["walk", "idle", "attack"]);

        let non_empty: Vec<&str> = set.non_empty().map(|(pose, _)| pose).collect();
        assert_eq!(non_empty, ["walk", "attack"]);
        assert_eq!(set.frame_count(), 3);
        assert_eq!(set.flatten(), paths(&["w1.png", "a1.png", "a2.png"]));
    }

    #[test]
    fn groups_flat_lists_by_pose() {
        let set = group_frames_by_pose(
            &paths(&[
                "out/knight_attack_02.png",
                "out/knight_idle_01.png",
                "out/knight_attack_01.png",
                "out/knight_heavy_slash_01.png",
                "out/other.png",
            ]),
            "knight",
        );

        assert_eq!(
            set.get("attack").unwrap(),
            ["out/knight_attack_01.png", "out/knight_attack_02.png"]
        );
        assert_eq!(set.get("idle").unwrap(), ["out/knight_idle_01.png"]);
        assert_eq!(
            set.get("heavy_slash").unwrap(),
            ["out/knight_heavy_slash_01.png"]
        );
        assert_eq!(set.get("pose").unwrap(), ["out/other.png"]);
    }

    #[test]
    fn posix_paths_use_forward_slashes() {
        assert_eq!(to_posix("assets\\outputs\\a.png"), "assets/outputs/a.png");
    }
}
