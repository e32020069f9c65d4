//! Sprite sheet compositing: one row per pose, frames left to right.

mod atlas;

use std::path::{Path, PathBuf};

use image::imageops;
use serde::{Deserialize, Serialize};

pub use atlas::{AtlasDocument, AtlasFrame, AtlasMeta, Pivot, Rect};

use crate::{
    frames::{to_posix, PoseFrameSet},
    layout::{self, CellSize},
    raster::{self, LoadedFrame},
    Result, SpriteError,
};

/// Layout options for [`build_sheet`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetOptions {
    /// Requested column count. Rows longer than this widen the sheet.
    pub columns: u32,
    /// Center every frame in a cell of `cell` size instead of pinning it to
    /// the cell's top-left corner.
    pub fixed_cell: bool,
    pub cell: Option<CellSize>,
    pub autotrim: bool,
}

impl Default for SheetOptions {
    fn default() -> Self {
        Self {
            columns: 3,
            fixed_cell: false,
            cell: None,
            autotrim: true,
        }
    }
}

/// Artifacts written by [`build_sheet`].
#[derive(Debug, Clone)]
pub struct SheetOutput {
    pub sheet_path: PathBuf,
    pub atlas_path: PathBuf,
    pub atlas: AtlasDocument,
}

/// Where the atlas for a sheet lives: same stem, `.json` extension.
pub fn atlas_path_for(sheet_path: &Path) -> PathBuf {
    sheet_path.with_extension("json")
}

/// Composites every readable frame onto one canvas, writes it to
/// `sheet_path`, and writes the matching atlas next to it.
///
/// Returns `Ok(None)` without writing anything when no frame could be loaded.
pub fn build_sheet(
    frames: &PoseFrameSet,
    sheet_path: &Path,
    options: &SheetOptions,
) -> Result<Option<SheetOutput>> {
    let rows = load_rows(frames, options.autotrim);
    let Some(fitted) = layout::max_cell_size(&rows) else {
        tracing::warn!(sheet = %sheet_path.display(), "no placeable frames, sheet not built");
        return Ok(None);
    };

    let cell = match (options.fixed_cell, options.cell) {
        (true, Some(cell)) => cell,
        _ => fitted,
    };
    if cell.is_empty() {
        return Err(SpriteError::invalid(format!(
            "cell size {}x{} has no area",
            cell.width, cell.height
        )));
    }

    let longest = rows.iter().map(|(_, frames)| frames.len()).max().unwrap_or(0) as u32;
    let mut columns = options.columns.max(1);
    if longest > columns {
        tracing::warn!(
            requested = columns,
            longest,
            "a pose has more frames than requested columns, widening sheet"
        );
        columns = longest;
    }

    let mut canvas = raster::blank(CellSize::new(
        canvas_extent(columns, cell.width, 0)?,
        canvas_extent(rows.len() as u32, cell.height, 0)?,
    ));
    let mut records = Vec::with_capacity(rows.iter().map(|(_, f)| f.len()).sum());

    for (row, (pose, loaded)) in rows.into_iter().enumerate() {
        for (column, frame) in loaded.into_iter().enumerate() {
            let source_size = frame.size();
            let image = raster::shrink_to_fit(frame.image, cell);
            let placed = CellSize::of(&image);
            let (offset_x, offset_y) = if options.fixed_cell {
                raster::center_offset(placed, cell)
            } else {
                (0, 0)
            };

            let x = column as u32 * cell.width;
            let y = row as u32 * cell.height;
            imageops::overlay(
                &mut canvas,
                &image,
                i64::from(x + offset_x),
                i64::from(y + offset_y),
            );

            records.push(AtlasFrame {
                filename: file_name(&frame.path),
                pose: pose.clone(),
                index: column as u32 + 1,
                frame: Rect::new(x, y, cell.width, cell.height),
                rotated: false,
                trimmed: options.fixed_cell,
                sprite_source_size: Rect::new(offset_x, offset_y, placed.width, placed.height),
                source_size,
                pivot: Pivot::default(),
                src: to_posix(&frame.path),
            });
        }
    }

    ensure_parent(sheet_path)?;
    canvas.save(sheet_path)?;

    let atlas = AtlasDocument {
        meta: AtlasMeta {
            image: file_name(&sheet_path.to_string_lossy()),
            size: CellSize::of(&canvas),
            cell,
            fixed_cell: options.fixed_cell,
            columns,
        },
        frames: records,
    };
    let atlas_path = atlas_path_for(sheet_path);
    atlas.write(&atlas_path)?;

    tracing::info!(
        sheet = %sheet_path.display(),
        width = atlas.meta.size.width,
        height = atlas.meta.size.height,
        frames = atlas.frames.len(),
        "sprite sheet written"
    );

    Ok(Some(SheetOutput {
        sheet_path: sheet_path.to_path_buf(),
        atlas_path,
        atlas,
    }))
}

/// Older sheet layout kept for callers that want spacing between cells and
/// no atlas. Frames are always centered in their cell; the cell is either
/// `cell` or the size of the first frame of the first non-empty pose.
pub fn build_padded_sheet(
    frames: &PoseFrameSet,
    sheet_path: &Path,
    cell: Option<CellSize>,
    padding: u32,
    autotrim: bool,
) -> Result<PathBuf> {
    let cell = match cell {
        Some(cell) => cell,
        None => layout::infer_cell_size(frames, autotrim)?,
    };
    if cell.is_empty() {
        return Err(SpriteError::invalid("cell size has no area"));
    }

    let rows = load_rows(frames, autotrim);
    if rows.is_empty() {
        return Err(SpriteError::NoPlaceableFrames);
    }
    let columns = rows.iter().map(|(_, frames)| frames.len()).max().unwrap_or(1) as u32;
    let row_count = rows.len() as u32;

    let mut sheet = raster::blank(CellSize::new(
        canvas_extent(columns, cell.width, padding)?,
        canvas_extent(row_count, cell.height, padding)?,
    ));

    for (row, (_, loaded)) in rows.into_iter().enumerate() {
        for (column, frame) in loaded.into_iter().enumerate() {
            let tile = raster::pad_to_cell(frame.image, cell);
            let x = column as u32 * (cell.width + padding);
            let y = row as u32 * (cell.height + padding);
            imageops::replace(&mut sheet, &tile, i64::from(x), i64::from(y));
        }
    }

    ensure_parent(sheet_path)?;
    sheet.save(sheet_path)?;
    tracing::info!(sheet = %sheet_path.display(), padding, "padded sprite sheet written");
    Ok(sheet_path.to_path_buf())
}

/// Length of `count` cells of `cell` pixels with `padding` between them.
fn canvas_extent(count: u32, cell: u32, padding: u32) -> Result<u32> {
    count
        .checked_mul(cell)
        .and_then(|cells| {
            count
                .saturating_sub(1)
                .checked_mul(padding)
                .and_then(|gaps| cells.checked_add(gaps))
        })
        .ok_or_else(|| {
            SpriteError::invalid(format!(
                "{count} cells of {cell}px with {padding}px padding do not fit a canvas"
            ))
        })
}

fn load_rows(frames: &PoseFrameSet, autotrim: bool) -> Vec<(String, Vec<LoadedFrame>)> {
    frames
        .non_empty()
        .filter_map(|(pose, paths)| {
            let loaded = raster::load_frames(paths, autotrim);
            if loaded.is_empty() {
                tracing::warn!(pose, "no readable frames, pose dropped from sheet");
                return None;
            }
            Some((pose.to_string(), loaded))
        })
        .collect()
}

fn file_name(path: &str) -> String {
    let posix = to_posix(path);
    match posix.rsplit_once('/') {
        Some((_, name)) => name.to_string(),
        None => posix,
    }
}

pub(crate) fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}
