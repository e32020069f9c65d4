use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use serde::{Deserialize, Serialize};

use crate::{layout::CellSize, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    pub fn right(&self) -> u32 {
        self.x + self.w
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.h
    }

    pub fn overlaps(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pivot {
    pub x: f32,
    pub y: f32,
}

impl Default for Pivot {
    fn default() -> Self {
        Self { x: 0.5, y: 0.5 }
    }
}

/// Sheet-level block of the atlas document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtlasMeta {
    /// File name of the sheet image the frames point into.
    pub image: String,
    pub size: CellSize,
    pub cell: CellSize,
    pub fixed_cell: bool,
    pub columns: u32,
}

/// Placement of a single frame on the sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtlasFrame {
    pub filename: String,
    pub pose: String,
    /// 1-based position of the frame within its pose.
    pub index: u32,
    /// Cell-aligned destination rectangle.
    pub frame: Rect,
    pub rotated: bool,
    pub trimmed: bool,
    /// Visible part of the frame relative to the cell's top-left corner.
    #[serde(rename = "spriteSourceSize")]
    pub sprite_source_size: Rect,
    #[serde(rename = "sourceSize")]
    pub source_size: CellSize,
    pub pivot: Pivot,
    pub src: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtlasDocument {
    pub meta: AtlasMeta,
    pub frames: Vec<AtlasFrame>,
}

impl AtlasDocument {
    pub fn write(&self, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adjacent_rects_do_not_overlap() {
        let a = Rect::new(0, 0, 8, 8);
        assert!(!a.overlaps(&Rect::new(8, 0, 8, 8)));
        assert!(!a.overlaps(&Rect::new(0, 8, 8, 8)));
        assert!(a.overlaps(&Rect::new(7, 7, 8, 8)));
    }

    #[test]
    fn serializes_with_atlas_field_names() {
        let frame = AtlasFrame {
            filename: "hero_idle_01.png".into(),
            pose: "idle".into(),
            index: 1,
            frame: Rect::new(0, 0, 16, 16),
            rotated: false,
            trimmed: true,
            sprite_source_size: Rect::new(2, 1, 12, 14),
            source_size: CellSize::new(12, 14),
            pivot: Pivot::default(),
            src: "out/hero_idle_01.png".into(),
        };

        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(value["spriteSourceSize"]["x"], 2);
        assert_eq!(value["sourceSize"]["w"], 12);
        assert_eq!(value["pivot"]["y"], 0.5);
        assert_eq!(value["rotated"], false);
    }

    fn small_document() -> AtlasDocument {
        AtlasDocument {
            meta: AtlasMeta {
                image: "hero_sheet.png".into(),
                size: CellSize::new(16, 8),
                cell: CellSize::new(8, 8),
                fixed_cell: false,
                columns: 2,
            },
            frames: Vec::new(),
        }
    }

    #[test]
    fn written_document_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hero_sheet.json");
        let doc = small_document();

        doc.write(&path).unwrap();
        assert_eq!(AtlasDocument::read(&path).unwrap(), doc);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn buffered_write_failures_are_reported() {
        let full = Path::new("/dev/full");
        if !full.exists() {
            return;
        }
        assert!(small_document().write(full).is_err());
    }
}
