//! Edit, fan out, normalize, sheet, GIF: one synchronous pass per request.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{
    animation::{self, GifOptions},
    config::AppConfig,
    edit::{self, EditInfo, ImageEditor, StubEditor},
    frames::{to_posix, PoseFrameSet},
    generate::{self, DuplicateGenerator, FrameGenerator, PoseSpec},
    layout::CellSize,
    numbering::{self, RenameReport},
    sheet::{self, SheetOptions, SheetOutput},
    Result, SpriteError,
};

/// Caller input for one pipeline run. Unset options fall back to the
/// pipeline's [`AppConfig`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineRequest {
    pub image_path: PathBuf,
    pub instruction: Option<String>,
    pub poses: Vec<PoseSpec>,
    pub fps: Option<u32>,
    pub sheet_columns: Option<u32>,
    pub out_dir: Option<PathBuf>,
    pub basename: Option<String>,
    pub normalize: Option<bool>,
    pub fixed_cell: Option<bool>,
    pub cell: Option<CellSize>,
    pub autotrim: Option<bool>,
    pub frame_size: Option<CellSize>,
    /// Pose used for the GIF. Defaults to the first pose with frames.
    pub gif_pose: Option<String>,
}

/// Transient state of one run, threaded through every stage.
#[derive(Debug, Clone)]
pub struct AnimationPipelineJob {
    pub job_id: String,
    pub source: PathBuf,
    pub instruction: Option<String>,
    pub poses: Vec<PoseSpec>,
    pub out_dir: PathBuf,
    pub basename: String,
    pub working_source: PathBuf,
    pub edit: Option<EditInfo>,
    pub frames: PoseFrameSet,
    pub renames: Option<RenameReport>,
    pub sheet: Option<SheetOutput>,
    pub gif_pose: Option<String>,
    pub gif: Option<PathBuf>,
    pub warnings: Vec<String>,
}

impl AnimationPipelineJob {
    fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(job_id = %self.job_id, "{message}");
        self.warnings.push(message);
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RenameSummary {
    pub applied: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArtifactUrls {
    pub frames: IndexMap<String, Vec<String>>,
    pub sprite_sheet: String,
    pub atlas: String,
    pub gif: Option<String>,
}

/// Everything a caller gets back from a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResponse {
    pub job_id: String,
    pub basename: String,
    pub frames: PoseFrameSet,
    pub sprite_sheet: String,
    pub atlas: String,
    pub gif: Option<String>,
    pub gif_pose: Option<String>,
    pub edit: Option<EditInfo>,
    pub renames: Option<RenameSummary>,
    pub warnings: Vec<String>,
    pub urls: ArtifactUrls,
}

pub struct AnimationPipeline {
    config: AppConfig,
    editor: Box<dyn ImageEditor>,
    generator: Option<Box<dyn FrameGenerator>>,
}

impl AnimationPipeline {
    /// Pipeline with the stub editor and duplicating frame generator.
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            editor: Box::new(StubEditor),
            generator: None,
        }
    }

    pub fn with_editor(mut self, editor: Box<dyn ImageEditor>) -> Self {
        self.editor = editor;
        self
    }

    pub fn with_generator(mut self, generator: Box<dyn FrameGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn run(&self, request: &PipelineRequest) -> Result<PipelineResponse> {
        let mut job = self.validate(request)?;
        let span = tracing::info_span!("pipeline", job_id = %job.job_id);
        let _enter = span.enter();
        tracing::info!(source = %job.source.display(), poses = job.poses.len(), "pipeline started");

        self.edit(&mut job);
        self.materialize(&mut job, request)?;
        if request.normalize.unwrap_or(self.config.numbering.normalize) {
            self.normalize(&mut job);
        }
        self.build_sheet(&mut job, request)?;
        self.build_gif(&mut job, request)?;

        tracing::info!("pipeline finished");
        Ok(self.respond(job))
    }

    /// Checks the request before anything touches the filesystem, except for
    /// the final existence check on the source image.
    fn validate(&self, request: &PipelineRequest) -> Result<AnimationPipelineJob> {
        if request.poses.is_empty() {
            return Err(SpriteError::invalid("at least one pose is required"));
        }
        let mut seen = HashSet::new();
        for pose in &request.poses {
            let name = pose.name.trim();
            if name.is_empty() {
                return Err(SpriteError::invalid("pose names must not be empty"));
            }
            if name.contains(['/', '\\']) {
                return Err(SpriteError::invalid(format!("pose `{name}` contains a path separator")));
            }
            if pose.frames == 0 {
                return Err(SpriteError::invalid(format!(
                    "pose `{name}` must request at least one frame"
                )));
            }
            if !seen.insert(name.to_lowercase()) {
                return Err(SpriteError::invalid(format!("pose `{name}` is listed twice")));
            }
        }
        if let Some(gif_pose) = &request.gif_pose {
            if !request.poses.iter().any(|pose| pose.name.trim() == gif_pose) {
                return Err(SpriteError::invalid(format!("gif pose `{gif_pose}` is not requested")));
            }
        }
        if let Some(basename) = &request.basename {
            if basename.trim().is_empty() || basename.contains(['/', '\\']) {
                return Err(SpriteError::invalid(format!("invalid basename `{basename}`")));
            }
        }

        let source = PathBuf::from(to_posix(&request.image_path));
        if !source.is_file() {
            return Err(SpriteError::SourceNotFound(source));
        }

        let basename = match &request.basename {
            Some(basename) => basename.trim().to_string(),
            None => source
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .filter(|stem| !stem.is_empty())
                .ok_or_else(|| SpriteError::invalid("cannot derive a basename from the image path"))?,
        };
        let out_dir = request
            .out_dir
            .clone()
            .unwrap_or_else(|| self.config.output.root.clone());
        let instruction = request
            .instruction
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_string);
        let poses = request
            .poses
            .iter()
            .map(|pose| PoseSpec::new(pose.name.trim(), pose.frames))
            .collect();

        Ok(AnimationPipelineJob {
            job_id: job_id(&basename),
            working_source: source.clone(),
            source,
            instruction,
            poses,
            out_dir,
            basename,
            edit: None,
            frames: PoseFrameSet::new(),
            renames: None,
            sheet: None,
            gif_pose: None,
            gif: None,
            warnings: Vec::new(),
        })
    }

    fn edit(&self, job: &mut AnimationPipelineJob) {
        let Some(instruction) = job.instruction.clone() else {
            return;
        };
        let info = edit::run_edit(self.editor.as_ref(), &job.source, &instruction, &job.out_dir);
        if info.failed() {
            job.warn(format!(
                "edit failed, using original image: {}",
                info.reason.as_deref().unwrap_or("unknown")
            ));
        } else {
            job.working_source = PathBuf::from(&info.edited_path);
        }
        job.edit = Some(info);
    }

    fn frame_size(&self, request: &PipelineRequest) -> Option<CellSize> {
        request.frame_size.or(self.config.animation.frame_size)
    }

    fn materialize(&self, job: &mut AnimationPipelineJob, request: &PipelineRequest) -> Result<()> {
        let fallback = DuplicateGenerator {
            frame_size: self.frame_size(request),
        };
        let generator: &dyn FrameGenerator = match &self.generator {
            Some(generator) => generator.as_ref(),
            None => &fallback,
        };
        job.frames = generate::materialize_frames(
            &job.working_source,
            &job.poses,
            &job.out_dir,
            &job.basename,
            generator,
        )?;
        tracing::info!(frames = job.frames.frame_count(), "frames materialized");
        Ok(())
    }

    /// Renumbers frames on disk. Frames whose rename was skipped keep their
    /// old path.
    fn normalize(&self, job: &mut AnimationPipelineJob) {
        let numbering = &self.config.numbering;
        let (normalized, plan) =
            numbering::normalize_frame_numbers(&job.frames, numbering.start_index, numbering.pad_width);
        if plan.is_empty() {
            job.frames = normalized;
            job.renames = Some(RenameReport::default());
            return;
        }

        let report = numbering::apply_renames(&plan);
        let skipped: HashSet<&str> = report.skipped.iter().map(|s| s.from.as_str()).collect();
        let original: Vec<(String, Vec<String>)> = job
            .frames
            .iter()
            .map(|(pose, paths)| (pose.to_string(), paths.to_vec()))
            .collect();
        job.frames = original
            .into_iter()
            .map(|(pose, paths)| {
                let resolved: Vec<String> = paths
                    .into_iter()
                    .zip(normalized.get(&pose).unwrap_or_default())
                    .map(|(old, new)| {
                        let old = to_posix(old);
                        if skipped.contains(old.as_str()) {
                            old
                        } else {
                            new.clone()
                        }
                    })
                    .collect();
                (pose, resolved)
            })
            .collect();

        for skip in &report.skipped {
            let message = format!("kept {} (rename to {} skipped: {:?})", skip.from, skip.to, skip.reason);
            job.warn(message);
        }
        tracing::info!(applied = report.applied.len(), skipped = report.skipped.len(), "frames normalized");
        job.renames = Some(report);
    }

    fn build_sheet(&self, job: &mut AnimationPipelineJob, request: &PipelineRequest) -> Result<()> {
        let options = SheetOptions {
            columns: request.sheet_columns.unwrap_or(self.config.sheet.columns),
            fixed_cell: request.fixed_cell.unwrap_or(self.config.sheet.fixed_cell),
            cell: request.cell.or(self.config.sheet.cell),
            autotrim: request.autotrim.unwrap_or(self.config.sheet.autotrim),
        };
        let sheet_path = job.out_dir.join(format!("{}_sheet.png", job.basename));
        let output = sheet::build_sheet(&job.frames, &sheet_path, &options)?
            .ok_or(SpriteError::NoPlaceableFrames)?;
        job.sheet = Some(output);
        Ok(())
    }

    fn build_gif(&self, job: &mut AnimationPipelineJob, request: &PipelineRequest) -> Result<()> {
        let chosen = match &request.gif_pose {
            Some(pose) => job
                .frames
                .get(pose)
                .filter(|frames| !frames.is_empty())
                .map(|frames| (pose.clone(), frames.to_vec())),
            None => job
                .frames
                .first_non_empty()
                .map(|(pose, frames)| (pose.to_string(), frames.to_vec())),
        };
        let Some((pose, frames)) = chosen else {
            job.warn("no pose has frames, gif not written");
            return Ok(());
        };

        let options = GifOptions {
            fps: request.fps.unwrap_or(self.config.animation.fps),
            autotrim: request.autotrim.unwrap_or(self.config.animation.autotrim),
            frame_size: self.frame_size(request),
        };
        let gif_path = job.out_dir.join(format!("{}.gif", job.basename));
        job.gif = animation::build_gif(&frames, &gif_path, &options)?;
        if job.gif.is_none() {
            job.warn(format!("pose `{pose}` has no readable frames, gif not written"));
        }
        job.gif_pose = Some(pose);
        Ok(())
    }

    fn respond(&self, job: AnimationPipelineJob) -> PipelineResponse {
        let output = &self.config.output;
        let url = |path: &str| artifact_url(&output.root, &output.url_prefix, path);

        // build_sheet either stores a sheet or fails the run.
        let (sprite_sheet, atlas) = job
            .sheet
            .as_ref()
            .map(|sheet| (to_posix(&sheet.sheet_path), to_posix(&sheet.atlas_path)))
            .unwrap_or_default();
        let gif = job.gif.as_ref().map(|path| to_posix(path));

        let urls = ArtifactUrls {
            frames: job
                .frames
                .iter()
                .map(|(pose, paths)| (pose.to_string(), paths.iter().map(|p| url(p.as_str())).collect()))
                .collect(),
            sprite_sheet: url(sprite_sheet.as_str()),
            atlas: url(atlas.as_str()),
            gif: gif.as_deref().map(url),
        };

        PipelineResponse {
            job_id: job.job_id,
            basename: job.basename,
            frames: job.frames,
            sprite_sheet,
            atlas,
            gif,
            gif_pose: job.gif_pose,
            edit: job.edit,
            renames: job.renames.map(|report| RenameSummary {
                applied: report.applied.len(),
                skipped: report.skipped.len(),
            }),
            warnings: job.warnings,
            urls,
        }
    }
}

fn job_id(basename: &str) -> String {
    let seconds = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default();
    format!("poses-{seconds}-{basename}")
}

/// `<prefix>/<path relative to root>`, or the path itself when it lives
/// outside the output root.
pub fn artifact_url(root: &Path, prefix: &str, path: &str) -> String {
    let root = to_posix(root);
    let root = root.trim_end_matches('/');
    let relative = path
        .strip_prefix(root)
        .filter(|rest| rest.starts_with('/'))
        .map(|rest| rest.trim_start_matches('/'));
    match relative {
        Some(rest) => format!("{}/{rest}", prefix.trim_end_matches('/')),
        None => path.to_string(),
    }
}
