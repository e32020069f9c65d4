//! Boundary to the image-edit collaborator.
//!
//! Editors may fail however they like; [`run_edit`] turns every failure into
//! an [`EditInfo`] that points back at the untouched source so a pipeline run
//! can carry on.

use std::path::{Path, PathBuf};

use image::{Rgba, RgbaImage};
use serde::Serialize;

use crate::{frames::to_posix, raster, sheet::ensure_parent, Result};

/// Result of a successful edit.
#[derive(Debug, Clone)]
pub struct EditedImage {
    pub path: PathBuf,
    /// Free-form remark from the editor, e.g. why a fallback was used.
    pub note: Option<String>,
}

pub trait ImageEditor {
    /// Short identifier reported as `used_model`.
    fn name(&self) -> &str;

    /// Applies `instruction` to `image`, writing the result under `out_dir`.
    fn edit(&self, image: &Path, instruction: &str, out_dir: &Path) -> Result<EditedImage>;
}

/// What the pipeline reports about its edit stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EditInfo {
    pub used_model: String,
    pub edited_path: String,
    pub instruction: String,
    pub reason: Option<String>,
}

impl EditInfo {
    pub fn failed(&self) -> bool {
        self.used_model == FAILED_MODEL
    }
}

const FAILED_MODEL: &str = "none";

/// Runs one edit attempt. Never fails: on error the original image is
/// reported as the edited path and the error text lands in `reason`.
pub fn run_edit(editor: &dyn ImageEditor, image: &Path, instruction: &str, out_dir: &Path) -> EditInfo {
    match editor.edit(image, instruction, out_dir) {
        Ok(edited) => {
            tracing::info!(editor = editor.name(), edited = %edited.path.display(), "image edited");
            EditInfo {
                used_model: editor.name().to_string(),
                edited_path: to_posix(&edited.path),
                instruction: instruction.to_string(),
                reason: edited.note,
            }
        }
        Err(err) => {
            tracing::warn!(editor = editor.name(), %err, "edit failed, keeping original image");
            EditInfo {
                used_model: FAILED_MODEL.to_string(),
                edited_path: to_posix(image),
                instruction: instruction.to_string(),
                reason: Some(format!("{}: {err}", editor.name())),
            }
        }
    }
}

/// Editor used when no model is wired in. Copies the source forward as
/// `edited_<stem>.png` with a dark badge in the lower-left corner so its
/// output is easy to tell apart from a real edit.
#[derive(Debug, Default, Clone, Copy)]
pub struct StubEditor;

const BADGE: (u32, u32) = (24, 10);
const BADGE_MARGIN: u32 = 6;

impl ImageEditor for StubEditor {
    fn name(&self) -> &str {
        "stub"
    }

    fn edit(&self, image: &Path, _instruction: &str, out_dir: &Path) -> Result<EditedImage> {
        let mut canvas = raster::load_rgba(image)?;
        stamp_badge(&mut canvas);

        let stem = image
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        let path = out_dir.join(format!("edited_{stem}.png"));
        ensure_parent(&path)?;
        canvas.save(&path)?;

        Ok(EditedImage {
            path,
            note: Some("stub".to_string()),
        })
    }
}

fn stamp_badge(canvas: &mut RgbaImage) {
    let (width, height) = canvas.dimensions();
    let x0 = BADGE_MARGIN.min(width);
    let y1 = height.saturating_sub(BADGE_MARGIN);
    let y0 = y1.saturating_sub(BADGE.1);
    let x1 = (x0 + BADGE.0).min(width);
    let shade = Rgba([0, 0, 0, 128]);

    for y in y0..y1 {
        for x in x0..x1 {
            let pixel = canvas.get_pixel_mut(x, y);
            for channel in 0..3 {
                pixel.0[channel] = pixel.0[channel] / 2 + shade.0[channel] / 2;
            }
            pixel.0[3] = pixel.0[3].max(shade.0[3]);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{raster::tests::sprite, SpriteError};

    /// Editor that always fails, standing in for an unreachable model.
    pub(crate) struct BrokenEditor;

    impl ImageEditor for BrokenEditor {
        fn name(&self) -> &str {
            "broken"
        }

        fn edit(&self, _image: &Path, _instruction: &str, _out_dir: &Path) -> Result<EditedImage> {
            Err(SpriteError::msg("model unreachable"))
        }
    }

    #[test]
    fn failures_fall_back_to_the_source() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("knight.png");

        let info = run_edit(&BrokenEditor, &source, "add a cape", dir.path());
        assert!(info.failed());
        assert_eq!(info.edited_path, to_posix(&source));
        assert!(info.reason.unwrap().contains("model unreachable"));
    }

    #[test]
    fn stub_copies_forward_with_a_badge() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("knight.png");
        sprite(40, 40, 0, 0, 40, 40).save(&source).unwrap();
        let out_dir = dir.path().join("outputs");

        let info = run_edit(&StubEditor, &source, "add a cape", &out_dir);
        assert_eq!(info.used_model, "stub");
        assert_eq!(info.reason.as_deref(), Some("stub"));
        assert!(info.edited_path.ends_with("outputs/edited_knight.png"));

        let edited = raster::load_rgba(&info.edited_path).unwrap();
        assert_eq!(edited.dimensions(), (40, 40));
        assert_eq!(edited.get_pixel(0, 0), &Rgba([200, 40, 40, 255]));
        assert_eq!(edited.get_pixel(10, 30), &Rgba([100, 20, 20, 255]));
    }

    #[test]
    fn stub_reports_missing_sources_as_failures() {
        let dir = tempfile::tempdir().unwrap();
        let info = run_edit(&StubEditor, &dir.path().join("nope.png"), "x", dir.path());
        assert!(info.failed());
        assert!(info.reason.is_some());
    }
}
