use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::{frames::PoseFrameSet, raster, raster::LoadedFrame, Result, SpriteError};

/// Pixel dimensions of one sheet cell (or one animation frame).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellSize {
    #[serde(rename = "w")]
    pub width: u32,
    #[serde(rename = "h")]
    pub height: u32,
}

impl CellSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn of(image: &RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Component-wise maximum.
    pub fn union(self, other: Self) -> Self {
        Self {
            width: self.width.max(other.width),
            height: self.height.max(other.height),
        }
    }
}

/// Cell size taken from the first frame of the first non-empty pose, after an
/// optional trim.
pub fn infer_cell_size(frames: &PoseFrameSet, autotrim: bool) -> Result<CellSize> {
    let (pose, paths) = frames
        .first_non_empty()
        .ok_or(SpriteError::NoPlaceableFrames)?;
    let first = &paths[0];
    tracing::debug!(pose, frame = %first, "inferring cell size from representative frame");

    let image = raster::load_rgba(first)?;
    let image = if autotrim { raster::trim(image) } else { image };
    Ok(CellSize::of(&image))
}

/// Smallest cell that holds every loaded frame of every row uncropped.
pub fn max_cell_size(rows: &[(String, Vec<LoadedFrame>)]) -> Option<CellSize> {
    rows.iter()
        .flat_map(|(_, frames)| frames.iter())
        .map(LoadedFrame::size)
        .reduce(CellSize::union)
}
