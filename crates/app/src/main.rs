use std::{path::PathBuf, process::ExitCode};

use clap::{Args, Parser, Subcommand};
use sprite_anim_core::{
    frames::to_posix, numbering, AnimationPipeline, AppConfig, CellSize, GifOptions,
    PipelineRequest, PoseSpec, SheetOptions, SpriteError,
};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();
    let result = load_config(cli.config.as_ref()).and_then(|config| match cli.command {
        Commands::Pipeline(args) => run_pipeline(config, args),
        Commands::Sheet(args) => run_sheet(config, args),
        Commands::Gif(args) => run_gif(config, args),
        Commands::Normalize(args) => run_normalize(config, args),
    });

    match result {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(err) => report_error(&err),
    }
}

fn load_config(path: Option<&PathBuf>) -> sprite_anim_core::Result<AppConfig> {
    match path {
        Some(path) => AppConfig::load(path),
        None => Ok(AppConfig::default()),
    }
}

fn run_pipeline(config: AppConfig, args: PipelineArgs) -> sprite_anim_core::Result<String> {
    tracing::info!(image = %args.image.display(), "running animation pipeline");

    let request = PipelineRequest {
        image_path: args.image,
        instruction: args.instruction,
        poses: args.poses,
        fps: args.fps,
        sheet_columns: args.columns,
        out_dir: args.out_dir,
        basename: args.basename,
        normalize: args.no_normalize.then_some(false),
        fixed_cell: args.fixed_cell.then_some(true),
        cell: args.cell,
        autotrim: args.no_autotrim.then_some(false),
        frame_size: args.frame_size,
        gif_pose: args.gif_pose,
    };
    let response = AnimationPipeline::new(config).run(&request)?;
    Ok(serde_json::to_string_pretty(&response)?)
}

fn run_sheet(config: AppConfig, args: SheetArgs) -> sprite_anim_core::Result<String> {
    let frames = sprite_anim_core::group_frames_by_pose(&posix_all(&args.frames), &args.basename);
    let out_dir = args.out_dir.unwrap_or(config.output.root);
    let sheet_path = out_dir.join(format!("{}_sheet.png", args.basename));
    let autotrim = !args.no_autotrim && config.sheet.autotrim;

    if let Some(padding) = sheet_padding(args.padding, config.sheet.padding) {
        let path = sprite_anim_core::build_padded_sheet(
            &frames,
            &sheet_path,
            args.cell.or(config.sheet.cell),
            padding,
            autotrim,
        )?;
        return Ok(serde_json::to_string_pretty(&serde_json::json!({
            "sprite_sheet": to_posix(path),
            "poses": frames,
        }))?);
    }

    let options = SheetOptions {
        columns: args.columns.unwrap_or(config.sheet.columns),
        fixed_cell: args.fixed_cell || config.sheet.fixed_cell,
        cell: args.cell.or(config.sheet.cell),
        autotrim,
    };
    let output = sprite_anim_core::build_sheet(&frames, &sheet_path, &options)?
        .ok_or(SpriteError::NoPlaceableFrames)?;
    Ok(serde_json::to_string_pretty(&serde_json::json!({
        "sprite_sheet": to_posix(&output.sheet_path),
        "atlas": to_posix(&output.atlas_path),
        "meta": output.atlas.meta,
    }))?)
}

fn run_gif(config: AppConfig, args: GifArgs) -> sprite_anim_core::Result<String> {
    let options = GifOptions {
        fps: args.fps.unwrap_or(config.animation.fps),
        autotrim: !args.no_autotrim && config.animation.autotrim,
        frame_size: args.frame_size.or(config.animation.frame_size),
    };
    let written = sprite_anim_core::build_gif(&posix_all(&args.frames), &args.output, &options)?;
    Ok(serde_json::to_string_pretty(&serde_json::json!({
        "gif": written.map(|path| to_posix(path)),
    }))?)
}

fn run_normalize(config: AppConfig, args: NormalizeArgs) -> sprite_anim_core::Result<String> {
    let frames = sprite_anim_core::group_frames_by_pose(&posix_all(&args.frames), &args.basename);
    let start = args.start.unwrap_or(config.numbering.start_index);
    let pad = args.pad.unwrap_or(config.numbering.pad_width);
    let (normalized, plan) = numbering::normalize_frame_numbers(&frames, start, pad);

    let report = args.apply.then(|| numbering::apply_renames(&plan));
    Ok(serde_json::to_string_pretty(&serde_json::json!({
        "frames": normalized,
        "plan": plan,
        "report": report,
    }))?)
}

/// Padding selecting the padded layout: the flag wins, and a non-zero
/// configured padding applies when the flag is absent.
fn sheet_padding(flag: Option<u32>, configured: u32) -> Option<u32> {
    flag.or((configured > 0).then_some(configured))
}

fn posix_all(paths: &[PathBuf]) -> Vec<String> {
    paths.iter().map(|path| to_posix(path)).collect()
}

/// Prints the failure as JSON on stderr. Client errors exit with 2.
fn report_error(err: &SpriteError) -> ExitCode {
    let kind = if err.is_client_error() { "client" } else { "internal" };
    tracing::error!(%err, kind, "command failed");
    eprintln!(
        "{}",
        serde_json::json!({ "error": { "kind": kind, "detail": err.to_string() } })
    );
    if err.is_client_error() {
        ExitCode::from(2)
    } else {
        ExitCode::FAILURE
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

fn parse_pose(value: &str) -> Result<PoseSpec, String> {
    match value.split_once('=') {
        Some((name, count)) => {
            let frames = count
                .trim()
                .parse()
                .map_err(|_| format!("invalid frame count in `{value}`"))?;
            Ok(PoseSpec::new(name.trim(), frames))
        }
        None => Ok(PoseSpec::new(value.trim(), 1)),
    }
}

fn parse_size(value: &str) -> Result<CellSize, String> {
    let (w, h) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got `{value}`"))?;
    let width = w.trim().parse().map_err(|_| format!("invalid width in `{value}`"))?;
    let height = h.trim().parse().map_err(|_| format!("invalid height in `{value}`"))?;
    Ok(CellSize::new(width, height))
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Sprite sheet and animation builder", long_about = None)]
struct Cli {
    /// JSON configuration file; defaults apply to anything it leaves out.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Edit an image, fan it out into pose frames, and build the sheet and GIF.
    Pipeline(PipelineArgs),
    /// Build a sprite sheet from frames named `<basename>_<pose>_<NN>.<ext>`.
    Sheet(SheetArgs),
    /// Build a looping GIF from an ordered frame list.
    Gif(GifArgs),
    /// Renumber frames per pose, optionally renaming them on disk.
    Normalize(NormalizeArgs),
}

#[derive(Args, Debug)]
struct PipelineArgs {
    /// Source image.
    image: PathBuf,
    /// Edit instruction handed to the image editor.
    #[arg(short, long)]
    instruction: Option<String>,
    /// Pose to generate, as `name=frames` (frames defaults to 1).
    #[arg(short, long = "pose", value_parser = parse_pose, required = true)]
    poses: Vec<PoseSpec>,
    #[arg(long)]
    fps: Option<u32>,
    #[arg(long)]
    columns: Option<u32>,
    #[arg(short, long)]
    out_dir: Option<PathBuf>,
    #[arg(short, long)]
    basename: Option<String>,
    /// Pose rendered into the GIF.
    #[arg(long)]
    gif_pose: Option<String>,
    #[arg(long)]
    fixed_cell: bool,
    /// Cell size as WIDTHxHEIGHT, used with --fixed-cell.
    #[arg(long, value_parser = parse_size)]
    cell: Option<CellSize>,
    /// Size generated frames are resized to, as WIDTHxHEIGHT.
    #[arg(long, value_parser = parse_size)]
    frame_size: Option<CellSize>,
    #[arg(long)]
    no_autotrim: bool,
    #[arg(long)]
    no_normalize: bool,
}

#[derive(Args, Debug)]
struct SheetArgs {
    #[arg(required = true)]
    frames: Vec<PathBuf>,
    #[arg(short, long)]
    basename: String,
    #[arg(short, long)]
    out_dir: Option<PathBuf>,
    #[arg(long)]
    columns: Option<u32>,
    #[arg(long)]
    fixed_cell: bool,
    #[arg(long, value_parser = parse_size)]
    cell: Option<CellSize>,
    /// Use the padded layout with this many pixels between cells (no atlas).
    /// Falls back to a non-zero `sheet.padding` from the config.
    #[arg(long)]
    padding: Option<u32>,
    #[arg(long)]
    no_autotrim: bool,
}

#[derive(Args, Debug)]
struct GifArgs {
    #[arg(required = true)]
    frames: Vec<PathBuf>,
    #[arg(short, long)]
    output: PathBuf,
    #[arg(long)]
    fps: Option<u32>,
    #[arg(long, value_parser = parse_size)]
    frame_size: Option<CellSize>,
    #[arg(long)]
    no_autotrim: bool,
}

#[derive(Args, Debug)]
struct NormalizeArgs {
    #[arg(required = true)]
    frames: Vec<PathBuf>,
    #[arg(short, long)]
    basename: String,
    #[arg(long)]
    start: Option<u32>,
    #[arg(long)]
    pad: Option<usize>,
    /// Rename files on disk instead of only printing the plan.
    #[arg(long)]
    apply: bool,
}
