//! Frame loading and the small set of pixel operations shared by the sheet
//! and animation builders.

use std::path::Path;

use image::{imageops, imageops::FilterType, Rgba, RgbaImage};

use crate::{layout::CellSize, Result};

/// A frame that decoded successfully, together with the path it came from.
#[derive(Debug, Clone)]
pub struct LoadedFrame {
    pub path: String,
    pub image: RgbaImage,
}

impl LoadedFrame {
    pub fn size(&self) -> CellSize {
        CellSize::of(&self.image)
    }
}

/// Decodes `path` into an RGBA buffer.
pub fn load_rgba(path: impl AsRef<Path>) -> Result<RgbaImage> {
    let image = image::open(path.as_ref())?;
    Ok(image.to_rgba8())
}

/// Like [`load_rgba`], but a missing or undecodable file yields `None`.
pub fn try_load_rgba(path: &str) -> Option<RgbaImage> {
    if !Path::new(path).is_file() {
        tracing::warn!(path, "frame is missing, skipping");
        return None;
    }
    match load_rgba(path) {
        Ok(image) => Some(image),
        Err(err) => {
            tracing::warn!(path, %err, "frame is unreadable, skipping");
            None
        }
    }
}

/// Loads every readable frame in order, optionally trimming each one.
pub fn load_frames(paths: &[String], autotrim: bool) -> Vec<LoadedFrame> {
    paths
        .iter()
        .filter_map(|path| {
            let image = try_load_rgba(path)?;
            let image = if autotrim { trim(image) } else { image };
            Some(LoadedFrame {
                path: path.clone(),
                image,
            })
        })
        .collect()
}

/// Bounding box `(x, y, w, h)` of every pixel with non-zero alpha, or `None`
/// when the buffer is fully transparent. Colour under zero alpha is ignored.
pub fn content_bounds(image: &RgbaImage) -> Option<(u32, u32, u32, u32)> {
    let mut min_x = u32::MAX;
    let mut min_y = u32::MAX;
    let mut max_x = 0;
    let mut max_y = 0;
    let mut found = false;

    for (x, y, pixel) in image.enumerate_pixels() {
        if pixel.0[3] == 0 {
            continue;
        }
        found = true;
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
    }

    found.then(|| (min_x, min_y, max_x - min_x + 1, max_y - min_y + 1))
}

/// Crops transparent borders. A fully transparent buffer comes back as is.
pub fn trim(image: RgbaImage) -> RgbaImage {
    match content_bounds(&image) {
        Some((x, y, w, h)) if (w, h) != image.dimensions() => {
            imageops::crop_imm(&image, x, y, w, h).to_image()
        }
        _ => image,
    }
}

/// Shrinks an oversized buffer with nearest-neighbour sampling so it fits
/// inside `cell`. Never upsizes.
pub fn shrink_to_fit(image: RgbaImage, cell: CellSize) -> RgbaImage {
    let (w, h) = image.dimensions();
    if w <= cell.width && h <= cell.height {
        return image;
    }
    imageops::resize(
        &image,
        w.min(cell.width),
        h.min(cell.height),
        FilterType::Nearest,
    )
}

/// Offset that centers an image of `size` inside `cell`.
pub fn center_offset(size: CellSize, cell: CellSize) -> (u32, u32) {
    (
        cell.width.saturating_sub(size.width) / 2,
        cell.height.saturating_sub(size.height) / 2,
    )
}

/// Places the (possibly shrunk) buffer centered on a transparent canvas of
/// exactly `cell`.
pub fn pad_to_cell(image: RgbaImage, cell: CellSize) -> RgbaImage {
    let image = shrink_to_fit(image, cell);
    let (x, y) = center_offset(CellSize::of(&image), cell);
    let mut canvas = blank(cell);
    imageops::replace(&mut canvas, &image, i64::from(x), i64::from(y));
    canvas
}

pub fn blank(size: CellSize) -> RgbaImage {
    RgbaImage::from_pixel(size.width, size.height, Rgba([0, 0, 0, 0]))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Transparent `w`x`h` buffer with an opaque `bw`x`bh` block at `(bx, by)`.
    pub(crate) fn sprite(w: u32, h: u32, bx: u32, by: u32, bw: u32, bh: u32) -> RgbaImage {
        let mut image = RgbaImage::new(w, h);
        for y in by..by + bh {
            for x in bx..bx + bw {
                image.put_pixel(x, y, Rgba([200, 40, 40, 255]));
            }
        }
        image
    }

    #[test]
    fn trim_crops_to_visible_pixels() {
        let trimmed = trim(sprite(10, 8, 2, 3, 4, 2));
        assert_eq!(trimmed.dimensions(), (4, 2));
        assert_eq!(trimmed.get_pixel(0, 0).0[3], 255);
    }

    #[test]
    fn trim_ignores_colour_under_zero_alpha() {
        let mut image = RgbaImage::from_pixel(10, 10, Rgba([255, 255, 255, 0]));
        for (x, y) in [(4, 4), (5, 4), (4, 5), (5, 5)] {
            image.put_pixel(x, y, Rgba([10, 20, 30, 255]));
        }

        assert_eq!(content_bounds(&image), Some((4, 4, 2, 2)));
        assert_eq!(trim(image).dimensions(), (2, 2));
        assert_eq!(
            content_bounds(&RgbaImage::from_pixel(3, 3, Rgba([255, 0, 0, 0]))),
            None
        );
    }

    #[test]
    fn trim_leaves_blank_buffers_alone() {
        let trimmed = trim(RgbaImage::new(5, 7));
        assert_eq!(trimmed.dimensions(), (5, 7));
    }

    #[test]
    fn pad_centers_small_images() {
        let padded = pad_to_cell(sprite(2, 2, 0, 0, 2, 2), CellSize::new(6, 4));
        assert_eq!(padded.dimensions(), (6, 4));
        assert_eq!(padded.get_pixel(2, 1).0[3], 255);
        assert_eq!(padded.get_pixel(3, 2).0[3], 255);
        assert_eq!(padded.get_pixel(0, 0).0[3], 0);
        assert_eq!(padded.get_pixel(4, 1).0[3], 0);
    }

    #[test]
    fn pad_shrinks_oversized_images_without_upscaling() {
        let padded = pad_to_cell(sprite(12, 3, 0, 0, 12, 3), CellSize::new(4, 4));
        assert_eq!(padded.dimensions(), (4, 4));
        // 3 rows tall fits already, so only the width shrinks.
        assert_eq!(padded.get_pixel(0, 0).0[3], 255);
        assert_eq!(padded.get_pixel(3, 2).0[3], 255);
        assert_eq!(padded.get_pixel(0, 3).0[3], 0);

        let untouched = shrink_to_fit(sprite(2, 2, 0, 0, 2, 2), CellSize::new(8, 8));
        assert_eq!(untouched.dimensions(), (2, 2));
    }

    #[test]
    fn loader_skips_missing_and_corrupt_files() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.png");
        sprite(4, 4, 1, 1, 2, 2).save(&good).unwrap();
        let corrupt = dir.path().join("corrupt.png");
        std::fs::write(&corrupt, b"not a png").unwrap();
        let missing = dir.path().join("missing.png");

        let paths: Vec<String> = [&missing, &good, &corrupt]
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();

        let frames = load_frames(&paths, true);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].path, paths[1]);
        assert_eq!(frames[0].size(), CellSize::new(2, 2));
    }
}
