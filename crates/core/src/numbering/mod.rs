//! Canonical frame numbering and the on-disk renames that follow from it.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::LazyLock,
};

use indexmap::IndexMap;
use regex::Regex;
use serde::Serialize;

use crate::frames::{to_posix, PoseFrameSet};

/// Extension given to frames whose name carries none.
pub const DEFAULT_EXTENSION: &str = ".png";

static NUMBERED_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<prefix>.*?_)(?P<num>\d+)(?P<suffix>\.[A-Za-z0-9]+)$")
        .expect("numbered frame pattern is valid")
});

/// Old path to new path, only for frames whose canonical name changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RenamePlan {
    entries: IndexMap<String, String>,
}

impl RenamePlan {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, old: &str) -> Option<&str> {
        self.entries.get(old).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(old, new)| (old.as_str(), new.as_str()))
    }

    fn moves_away(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }
}

/// Renumbers every pose independently from `start_index`, zero padded to
/// `pad_width` digits, keeping each pose's frame order. Touches nothing on
/// disk.
pub fn normalize_frame_numbers(
    frames: &PoseFrameSet,
    start_index: u32,
    pad_width: usize,
) -> (PoseFrameSet, RenamePlan) {
    let mut plan = RenamePlan::default();
    let normalized: PoseFrameSet = frames
        .iter()
        .map(|(pose, paths)| {
            let renamed: Vec<String> = paths
                .iter()
                .zip(start_index..)
                .map(|(path, index)| {
                    let current = to_posix(path);
                    let canonical = canonical_path(&current, index, pad_width);
                    if canonical != current {
                        plan.entries.insert(current, canonical.clone());
                    }
                    canonical
                })
                .collect();
            (pose, renamed)
        })
        .collect();

    (normalized, plan)
}

fn canonical_path(path: &str, index: u32, pad_width: usize) -> String {
    let (parent, name) = match path.rsplit_once('/') {
        Some((parent, name)) => (Some(parent), name),
        None => (None, path),
    };
    let number = format!("{index:0pad_width$}");

    let new_name = match NUMBERED_NAME.captures(name) {
        Some(caps) => format!("{}{number}{}", &caps["prefix"], &caps["suffix"]),
        None => {
            let (stem, ext) = match name.rfind('.') {
                Some(dot) if dot > 0 => (&name[..dot], &name[dot..]),
                _ => (name, DEFAULT_EXTENSION),
            };
            format!("{stem}_{number}{ext}")
        }
    };

    match parent {
        Some(parent) => format!("{parent}/{new_name}"),
        None => new_name,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    MissingSource,
    DestinationExists,
    Io,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRename {
    pub from: String,
    pub to: String,
    pub reason: SkipReason,
}

/// Outcome of [`apply_renames`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenameReport {
    pub applied: Vec<(String, String)>,
    pub skipped: Vec<SkippedRename>,
}

impl RenameReport {
    fn skip(&mut self, from: &str, to: &str, reason: SkipReason) {
        tracing::warn!(from, to, ?reason, "rename skipped");
        self.skipped.push(SkippedRename {
            from: from.to_string(),
            to: to.to_string(),
            reason,
        });
    }
}

/// Applies a plan best-effort. Every move goes through a temporary name next
/// to the source first, so plans that swap names between frames are safe. An
/// entry whose destination exists and is not moved away by the same plan is
/// refused. A skipped entry always leaves its source where it was.
pub fn apply_renames(plan: &RenamePlan) -> RenameReport {
    let mut report = RenameReport::default();
    let mut staged: Vec<(&str, &str, PathBuf)> = Vec::new();

    for (slot, (from, to)) in plan.iter().enumerate() {
        let source = Path::new(from);
        if !source.exists() {
            report.skip(from, to, SkipReason::MissingSource);
            continue;
        }
        if Path::new(to).exists() && !plan.moves_away(to) {
            report.skip(from, to, SkipReason::DestinationExists);
            continue;
        }

        let temp = staging_path(source, slot);
        match fs::rename(source, &temp) {
            Ok(()) => staged.push((from, to, temp)),
            Err(err) => {
                tracing::debug!(from, %err, "could not stage rename");
                report.skip(from, to, SkipReason::Io);
            }
        }
    }

    for (from, to, temp) in staged {
        let target = Path::new(to);
        if target.exists() {
            restore(&temp, from);
            report.skip(from, to, SkipReason::DestinationExists);
            continue;
        }

        let moved = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
            _ => Ok(()),
        }
        .and_then(|()| fs::rename(&temp, target));

        match moved {
            Ok(()) => {
                tracing::debug!(from, to, "renamed frame");
                report.applied.push((from.to_string(), to.to_string()));
            }
            Err(err) => {
                tracing::debug!(from, to, %err, "could not finish rename");
                restore(&temp, from);
                report.skip(from, to, SkipReason::Io);
            }
        }
    }

    report
}

fn staging_path(source: &Path, slot: usize) -> PathBuf {
    let name = source
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    source.with_file_name(format!(".{name}.{}-{slot}.renaming", std::process::id()))
}

fn restore(temp: &Path, original: &str) {
    if let Err(err) = fs::rename(temp, original) {
        tracing::error!(
            temp = %temp.display(),
            original,
            %err,
            "could not move staged frame back"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(pose: &str, paths: &[String]) -> PoseFrameSet {
        let mut frames = PoseFrameSet::new();
        frames.insert(pose, paths.to_vec());
        frames
    }

    fn touch(dir: &Path, name: &str, contents: &str) -> String {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        to_posix(path)
    }

    #[test]
    fn renumbers_digit_runs_in_place() {
        let frames = set("walk", &["x_05.png".into(), "x_07.png".into()]);
        let (normalized, plan) = normalize_frame_numbers(&frames, 1, 2);

        assert_eq!(normalized.get("walk").unwrap(), ["x_01.png", "x_02.png"]);
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.get("x_05.png"), Some("x_01.png"));
        assert_eq!(plan.get("x_07.png"), Some("x_02.png"));
    }

    #[test]
    fn appends_an_index_to_unnumbered_names() {
        let frames = set(
            "idle",
            &[
                "out\\hero.png".into(),
                "out/hero_idle_01.png".into(),
                "out/noext".into(),
            ],
        );
        let (normalized, plan) = normalize_frame_numbers(&frames, 0, 3);

        assert_eq!(
            normalized.get("idle").unwrap(),
            ["out/hero_000.png", "out/hero_idle_001.png", "out/noext_002.png"]
        );
        assert_eq!(plan.len(), 3);
    }

    #[test]
    fn indices_are_contiguous_per_pose() {
        let mut frames = PoseFrameSet::new();
        frames.insert("a", vec!["a_9.png".into(), "a_3.png".into(), "a_3.png".into()]);
        frames.insert("b", vec!["b_40.png".into()]);
        let (normalized, _) = normalize_frame_numbers(&frames, 5, 2);

        assert_eq!(normalized.get("a").unwrap(), ["a_05.png", "a_06.png", "a_07.png"]);
        assert_eq!(normalized.get("b").unwrap(), ["b_05.png"]);
    }

    #[test]
    fn leaves_canonical_names_out_of_the_plan() {
        let frames = set("walk", &["x_01.png".into(), "x_05.png".into()]);
        let (_, plan) = normalize_frame_numbers(&frames, 1, 2);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.get("x_05.png"), Some("x_02.png"));
    }

    #[test]
    fn applying_twice_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let paths = vec![
            touch(dir.path(), "hero_walk_3.png", "first"),
            touch(dir.path(), "hero_walk_9.png", "second"),
        ];
        let frames = set("walk", &paths);

        let (normalized, plan) = normalize_frame_numbers(&frames, 1, 2);
        let report = apply_renames(&plan);
        assert_eq!(report.applied.len(), 2);
        assert!(report.skipped.is_empty());

        let renamed = normalized.get("walk").unwrap();
        assert_eq!(fs::read_to_string(&renamed[0]).unwrap(), "first");
        assert_eq!(fs::read_to_string(&renamed[1]).unwrap(), "second");
        assert!(!Path::new(&paths[0]).exists());

        let (again, second_plan) = normalize_frame_numbers(&normalized, 1, 2);
        assert!(second_plan.is_empty());
        assert_eq!(again, normalized);
    }

    #[test]
    fn swaps_names_without_losing_files() {
        let dir = tempfile::tempdir().unwrap();
        let second = touch(dir.path(), "s_02.png", "was two");
        let first = touch(dir.path(), "s_01.png", "was one");
        let frames = set("spin", &[second.clone(), first.clone()]);

        let (_, plan) = normalize_frame_numbers(&frames, 1, 2);
        let report = apply_renames(&plan);

        assert_eq!(report.applied.len(), 2);
        assert_eq!(fs::read_to_string(&first).unwrap(), "was two");
        assert_eq!(fs::read_to_string(&second).unwrap(), "was one");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn missing_sources_and_foreign_destinations_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let keep = touch(dir.path(), "k_07.png", "keep me");
        let occupied = touch(dir.path(), "k_01.png", "someone else");
        let ghost = to_posix(dir.path().join("g_04.png"));

        let mut frames = PoseFrameSet::new();
        frames.insert("k", vec![keep.clone()]);
        frames.insert("g", vec![ghost]);
        let (_, plan) = normalize_frame_numbers(&frames, 1, 2);
        let report = apply_renames(&plan);

        assert!(report.applied.is_empty());
        let reasons: Vec<SkipReason> = report.skipped.iter().map(|s| s.reason).collect();
        assert_eq!(reasons, [SkipReason::DestinationExists, SkipReason::MissingSource]);
        assert_eq!(fs::read_to_string(&keep).unwrap(), "keep me");
        assert_eq!(fs::read_to_string(&occupied).unwrap(), "someone else");
    }

    #[test]
    fn creates_missing_destination_directories() {
        let dir = tempfile::tempdir().unwrap();
        let from = touch(dir.path(), "a_3.png", "moved");
        let to = to_posix(dir.path().join("nested/deeper/a_01.png"));

        let mut plan = RenamePlan::default();
        plan.entries.insert(from.clone(), to.clone());
        let report = apply_renames(&plan);

        assert_eq!(report.applied, [(from, to.clone())]);
        assert_eq!(fs::read_to_string(&to).unwrap(), "moved");
    }
}
