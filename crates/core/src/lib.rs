//! Core library for the sprite animation pipeline.
//!
//! Each module owns one stage of turning a source image into animation
//! artifacts: frame loading and trimming, cell sizing, frame numbering,
//! sheet and atlas compositing, GIF assembly, and the orchestrating pipeline
//! that sequences them.

pub mod animation;
pub mod config;
pub mod edit;
pub mod error;
pub mod frames;
pub mod generate;
pub mod layout;
pub mod numbering;
pub mod pipeline;
pub mod raster;
pub mod sheet;

pub use animation::{build_gif, GifOptions};
pub use config::{AnimationConfig, AppConfig, NumberingConfig, OutputConfig, SheetConfig};
pub use edit::{run_edit, EditInfo, EditedImage, ImageEditor, StubEditor};
pub use error::{Result, SpriteError};
pub use frames::{group_frames_by_pose, PoseFrameSet};
pub use generate::{materialize_frames, DuplicateGenerator, FrameGenerator, PoseSpec};
pub use layout::CellSize;
pub use numbering::{apply_renames, normalize_frame_numbers, RenamePlan, RenameReport};
pub use pipeline::{AnimationPipeline, AnimationPipelineJob, PipelineRequest, PipelineResponse};
pub use sheet::{build_padded_sheet, build_sheet, AtlasDocument, SheetOptions, SheetOutput};
