use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "maskframe", version)]
struct Cli {
    /// Log debug details to stderr (RUST_LOG overrides this).
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Composite a mask onto every frame and write a GIF.
    Apply(ApplyArgs),
    /// Run a JSON job file.
    Run(RunArgs),
    /// Write one previewed frame (mask drawn over it) as a PNG.
    Preview(PreviewArgs),
    /// Print what a canvas file decodes to.
    Info(InfoArgs),
}

#[derive(Parser, Debug)]
struct ApplyArgs {
    /// Canvas: gif, png, jpg/jpeg, or a video (mp4, mov, m4v, mkv; needs `media-ffmpeg`).
    #[arg(long)]
    canvas: PathBuf,

    /// Mask image; its alpha channel drives the composite.
    #[arg(long)]
    mask: PathBuf,

    /// Output GIF path.
    #[arg(long)]
    out: PathBuf,

    #[arg(long, value_enum, default_value_t = ModeChoice::Cutout)]
    mode: ModeChoice,

    /// Mirror the mask horizontally.
    #[arg(long)]
    flip: bool,

    /// Output width in pixels.
    #[arg(long)]
    width: Option<u32>,

    /// Output height in pixels (ignored unless --no-lock-aspect is given).
    #[arg(long)]
    height: Option<u32>,

    /// Allow width and height to change independently.
    #[arg(long)]
    no_lock_aspect: bool,

    /// Stretch the mask vertically by this many pixels (negative shrinks).
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    stretch: i64,

    /// Delay between frames in milliseconds (10..=1000).
    #[arg(long, default_value_t = maskframe::DEFAULT_DELAY_MS)]
    delay_ms: u32,

    /// Frames sampled per second from video canvases (1..=60).
    #[arg(long, default_value_t = maskframe::DEFAULT_VIDEO_FPS)]
    video_fps: u32,

    /// Keep each decoded frame's own delay instead of --delay-ms.
    #[arg(long)]
    keep_source_timing: bool,
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Input job JSON.
    #[arg(long = "in")]
    in_path: PathBuf,
}

#[derive(Parser, Debug)]
struct PreviewArgs {
    #[arg(long)]
    canvas: PathBuf,

    #[arg(long)]
    mask: Option<PathBuf>,

    #[arg(long)]
    flip: bool,

    /// Frame index (0-based).
    #[arg(long, default_value_t = 0)]
    frame: usize,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct InfoArgs {
    #[arg(long = "in")]
    in_path: PathBuf,

    #[arg(long, default_value_t = maskframe::DEFAULT_VIDEO_FPS)]
    video_fps: u32,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ModeChoice {
    Overlay,
    Cutout,
}

impl From<ModeChoice> for maskframe::CompositeMode {
    fn from(m: ModeChoice) -> Self {
        match m {
            ModeChoice::Overlay => maskframe::CompositeMode::Overlay,
            ModeChoice::Cutout => maskframe::CompositeMode::Cutout,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.cmd {
        Command::Apply(args) => cmd_apply(args),
        Command::Run(args) => cmd_run(args),
        Command::Preview(args) => cmd_preview(args),
        Command::Info(args) => cmd_info(args),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "maskframe=debug"
    } else {
        "maskframe=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn cmd_apply(args: ApplyArgs) -> anyhow::Result<()> {
    let mut job = maskframe::Job::new(&args.canvas, &args.mask, &args.out);
    job.mode = args.mode.into();
    job.flip = args.flip;
    job.lock_aspect = !args.no_lock_aspect;
    job.mask_stretch = args.stretch;
    job.delay_ms = args.delay_ms;
    job.video_fps = args.video_fps;
    job.keep_source_timing = args.keep_source_timing;
    job.size = resolve_size(args.width, args.height, job.lock_aspect)?;

    run(&job)
}

fn cmd_run(args: RunArgs) -> anyhow::Result<()> {
    let job = maskframe::Job::from_path(&args.in_path)
        .with_context(|| format!("load job '{}'", args.in_path.display()))?;
    run(&job)
}

fn run(job: &maskframe::Job) -> anyhow::Result<()> {
    let report = maskframe::run_job(job)?;
    eprintln!(
        "wrote {} ({} frames, {})",
        report.out.display(),
        report.frames,
        report.size
    );
    Ok(())
}

fn cmd_preview(args: PreviewArgs) -> anyhow::Result<()> {
    let mut session = maskframe::Session::default();
    session.set_flip(args.flip);
    session.load_canvas(&args.canvas)?;
    if let Some(mask) = &args.mask {
        session.load_mask(mask)?;
    }

    let frame = session
        .preview(args.frame)
        .with_context(|| format!("frame {} is out of range", args.frame))?;

    maskframe::ensure_parent_dir(&args.out)?;
    frame
        .save_with_format(&args.out, image::ImageFormat::Png)
        .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_info(args: InfoArgs) -> anyhow::Result<()> {
    let mut session = maskframe::Session::default();
    session.set_video_fps(args.video_fps)?;
    session.load_canvas(&args.in_path)?;
    let canvas = session.canvas().context("canvas missing after load")?;
    let seq = &canvas.frames;

    let path = canvas.path.as_deref().unwrap_or(&args.in_path);
    println!("file:   {}", display_name(path));
    println!("kind:   {:?}", canvas.kind);
    println!("frames: {}", seq.len());
    println!("size:   {}", seq.size());
    let delays = seq.delays_ms();
    let total: u64 = delays.iter().map(|&d| u64::from(d)).sum();
    println!("delays: {delays:?} ms (total {total} ms)");
    Ok(())
}

fn resolve_size(
    width: Option<u32>,
    height: Option<u32>,
    locked: bool,
) -> anyhow::Result<Option<maskframe::Size>> {
    match (width, height) {
        (None, None) => Ok(None),
        // The height is derived from the width when the aspect ratio is locked.
        (Some(w), _) if locked => Ok(Some(maskframe::Size::new(w, 1)?)),
        (Some(w), Some(h)) => Ok(Some(maskframe::Size::new(w, h)?)),
        (Some(_), None) => anyhow::bail!("--no-lock-aspect needs both --width and --height"),
        (None, Some(_)) => anyhow::bail!("--height needs --width"),
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
