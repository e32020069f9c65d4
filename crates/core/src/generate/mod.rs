use std::path::Path;

use image::{imageops, imageops::FilterType, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::{
    frames::{to_posix, PoseFrameSet},
    layout::CellSize,
    raster, Result, SpriteError,
};

/// A pose and how many frames to produce for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoseSpec {
    pub name: String,
    pub frames: u32,
}

impl PoseSpec {
    pub fn new(name: impl Into<String>, frames: u32) -> Self {
        Self {
            name: name.into(),
            frames,
        }
    }
}

/// Produces the art for one frame of one pose.
pub trait FrameGenerator {
    fn generate(&self, source: &RgbaImage, pose: &str, frame_index: u32) -> Result<RgbaImage>;
}

/// Repeats the source for every frame, optionally resized (nearest) first.
#[derive(Debug, Default, Clone, Copy)]
pub struct DuplicateGenerator {
    pub frame_size: Option<CellSize>,
}

impl FrameGenerator for DuplicateGenerator {
    fn generate(&self, source: &RgbaImage, _pose: &str, _frame_index: u32) -> Result<RgbaImage> {
        Ok(match self.frame_size.filter(|size| !size.is_empty()) {
            Some(size) => imageops::resize(source, size.width, size.height, FilterType::Nearest),
            None => source.clone(),
        })
    }
}

/// Writes `<basename>_<pose>_<NN>.png` for every requested frame of every
/// pose and returns the frame set that points at them. The pose part of the
/// file name is lowercased; the set keeps the caller's pose names.
pub fn materialize_frames(
    source: &Path,
    poses: &[PoseSpec],
    out_dir: &Path,
    basename: &str,
    generator: &dyn FrameGenerator,
) -> Result<PoseFrameSet> {
    if !source.is_file() {
        return Err(SpriteError::SourceNotFound(source.to_path_buf()));
    }
    let image = raster::load_rgba(source)?;
    std::fs::create_dir_all(out_dir)?;

    let mut frames = PoseFrameSet::new();
    for pose in poses {
        let slug = pose.name.to_lowercase();
        let mut paths = Vec::with_capacity(pose.frames as usize);
        for index in 1..=pose.frames {
            let frame = generator.generate(&image, &pose.name, index)?;
            let path = out_dir.join(format!("{basename}_{slug}_{index:02}.png"));
            frame.save(&path)?;
            paths.push(to_posix(&path));
        }
        tracing::debug!(pose = %pose.name, frames = pose.frames, "materialized pose frames");
        frames.insert(pose.name.clone(), paths);
    }
    Ok(frames)
}
