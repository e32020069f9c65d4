use std::{
    fs,
    path::{Path, PathBuf},
};

use image::{
    codecs::gif::{GifEncoder, Repeat},
    imageops::{self, FilterType},
    Delay, Frame, RgbaImage,
};
use serde::{Deserialize, Serialize};

use crate::{layout::CellSize, raster, sheet::ensure_parent, Result};

/// NeuQuant sampling factor handed to the encoder: 1 is slowest and most
/// accurate, 30 is fastest.
const PALETTE_SPEED: i32 = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GifOptions {
    pub fps: u32,
    pub autotrim: bool,
    /// Every frame is resized to this when set; otherwise frames are centered
    /// on a canvas as large as the largest frame.
    pub frame_size: Option<CellSize>,
}

impl Default for GifOptions {
    fn default() -> Self {
        Self {
            fps: 8,
            autotrim: true,
            frame_size: None,
        }
    }
}

/// Writes a looping GIF of `frames` to `out_path`.
///
/// An empty (or entirely unreadable) frame list writes nothing and returns
/// `Ok(None)`.
pub fn build_gif(frames: &[String], out_path: &Path, options: &GifOptions) -> Result<Option<PathBuf>> {
    let loaded = raster::load_frames(frames, options.autotrim);
    if loaded.is_empty() {
        tracing::debug!(gif = %out_path.display(), "no frames, gif not written");
        return Ok(None);
    }

    let images: Vec<RgbaImage> = match options.frame_size.filter(|size| !size.is_empty()) {
        Some(size) => loaded
            .into_iter()
            .map(|frame| imageops::resize(&frame.image, size.width, size.height, FilterType::Nearest))
            .collect(),
        None => {
            let canvas = loaded
                .iter()
                .map(|frame| frame.size())
                .fold(CellSize::new(1, 1), CellSize::union);
            loaded
                .into_iter()
                .map(|frame| raster::pad_to_cell(frame.image, canvas))
                .collect()
        }
    };

    ensure_parent(out_path)?;
    let fps = options.fps.max(1);
    let delay = Delay::from_numer_denom_ms(1000, fps);
    let count = images.len();

    // The trailer is written when the encoder drops, so encode in memory and
    // write the finished file in one go.
    let mut bytes = Vec::new();
    {
        let mut encoder = GifEncoder::new_with_speed(&mut bytes, PALETTE_SPEED);
        encoder.set_repeat(Repeat::Infinite)?;
        for image in images {
            encoder.encode_frame(Frame::from_parts(image, 0, 0, delay))?;
        }
    }
    fs::write(out_path, &bytes)?;

    tracing::info!(gif = %out_path.display(), frames = count, fps, "animation written");
    Ok(Some(out_path.to_path_buf()))
}
