use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::Context as _;

use crate::{
    foundation::{
        core::{
            CompositeMode, DEFAULT_DELAY_MS, DEFAULT_VIDEO_FPS, FrameDelay, MAX_GIF_DIM,
            SampleRate, Size,
        },
        error::{MaskframeError, MaskframeResult},
    },
    session::{Session, Settings},
};

/// A batch run described in JSON: which canvas, which mask, how to combine them and where the GIF
/// goes.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Job {
    pub canvas: PathBuf,
    pub mask: PathBuf,
    pub out: PathBuf,
    #[serde(default)]
    pub mode: CompositeMode,
    #[serde(default)]
    pub flip: bool,
    /// Output frame size; the decoded size is kept when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<Size>,
    #[serde(default = "default_true")]
    pub lock_aspect: bool,
    /// Extra vertical mask stretch in pixels, applied after sizing.
    #[serde(default)]
    pub mask_stretch: i64,
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u32,
    #[serde(default = "default_video_fps")]
    pub video_fps: u32,
    #[serde(default)]
    pub keep_source_timing: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobReport {
    pub frames: usize,
    pub size: Size,
    pub out: PathBuf,
}

fn default_true() -> bool {
    true
}

fn default_delay_ms() -> u32 {
    DEFAULT_DELAY_MS
}

fn default_video_fps() -> u32 {
    DEFAULT_VIDEO_FPS
}

impl Job {
    pub fn new(
        canvas: impl Into<PathBuf>,
        mask: impl Into<PathBuf>,
        out: impl Into<PathBuf>,
    ) -> Self {
        Self {
            canvas: canvas.into(),
            mask: mask.into(),
            out: out.into(),
            mode: CompositeMode::default(),
            flip: false,
            size: None,
            lock_aspect: true,
            mask_stretch: 0,
            delay_ms: DEFAULT_DELAY_MS,
            video_fps: DEFAULT_VIDEO_FPS,
            keep_source_timing: false,
        }
    }

    /// Read a job file; relative paths inside it are resolved against the file's directory.
    pub fn from_path(path: &Path) -> MaskframeResult<Self> {
        let f = File::open(path).with_context(|| format!("open job '{}'", path.display()))?;
        let job: Job = serde_json::from_reader(BufReader::new(f))
            .map_err(|e| MaskframeError::serde(format!("job '{}': {e}", path.display())))?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Ok(job.resolve(base))
    }

    pub fn from_json(json: &str) -> MaskframeResult<Self> {
        serde_json::from_str(json).map_err(|e| MaskframeError::serde(format!("job: {e}")))
    }

    pub fn resolve(mut self, base: &Path) -> Self {
        for p in [&mut self.canvas, &mut self.mask, &mut self.out] {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        }
        self
    }

    pub fn validate(&self) -> MaskframeResult<()> {
        for (name, p) in [("canvas", &self.canvas), ("mask", &self.mask), ("out", &self.out)] {
            if p.as_os_str().is_empty() {
                return Err(MaskframeError::validation(format!(
                    "job '{name}' path is empty"
                )));
            }
        }
        if let Some(size) = self.size {
            Size::new(size.width, size.height)?.check_gif_limit()?;
        }
        if self.mask_stretch.unsigned_abs() > u64::from(MAX_GIF_DIM) {
            return Err(MaskframeError::validation(format!(
                "mask_stretch must be within +/-{MAX_GIF_DIM}, got {}",
                self.mask_stretch
            )));
        }
        FrameDelay::from_ms(self.delay_ms)?;
        SampleRate::new(self.video_fps)?;
        Ok(())
    }

    pub fn settings(&self) -> MaskframeResult<Settings> {
        Ok(Settings {
            mode: self.mode,
            flip: self.flip,
            aspect_locked: self.lock_aspect,
            delay: FrameDelay::from_ms(self.delay_ms)?,
            video_fps: SampleRate::new(self.video_fps)?,
            keep_source_timing: self.keep_source_timing,
        })
    }
}

/// Load, size, stretch, composite and export in one go.
#[tracing::instrument(
    skip(job),
    fields(canvas = %job.canvas.display(), out = %job.out.display())
)]
pub fn run_job(job: &Job) -> MaskframeResult<JobReport> {
    job.validate()?;

    let mut session = Session::new(job.settings()?);
    session.load_canvas(&job.canvas)?;
    session.load_mask(&job.mask)?;

    if let Some(size) = job.size {
        session.set_dimensions(size.width, size.height)?;
    }
    if job.mask_stretch != 0 {
        session.stretch_mask(job.mask_stretch)?;
    }

    session.apply()?;
    session.export(&job.out)?;

    let frames = session
        .frames()
        .ok_or_else(|| MaskframeError::validation("canvas vanished during job"))?;
    Ok(JobReport {
        frames: frames.len(),
        size: frames.size(),
        out: job.out.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_job_gets_defaults() {
        let job = Job::from_json(r#"{ "canvas": "a.gif", "mask": "m.png", "out": "o.gif" }"#)
            .unwrap();
        assert_eq!(job, Job::new("a.gif", "m.png", "o.gif"));
        job.validate().unwrap();
        let settings = job.settings().unwrap();
        assert_eq!(settings.mode, CompositeMode::Cutout);
        assert!(settings.aspect_locked);
        assert_eq!(settings.delay.as_ms(), 100);
    }

    #[test]
    fn full_job_parses() {
        let json = r#"{
            "canvas": "a.gif", "mask": "m.png", "out": "o.gif",
            "mode": "overlay", "flip": true,
            "size": { "width": 64, "height": 32 },
            "lock_aspect": false, "mask_stretch": -4,
            "delay_ms": 40, "video_fps": 12, "keep_source_timing": true
        }"#;
        let job = Job::from_json(json).unwrap();
        assert_eq!(job.mode, CompositeMode::Overlay);
        assert_eq!(job.size, Some(Size::at_least_one(64, 32)));
        assert_eq!(job.mask_stretch, -4);
        job.validate().unwrap();
    }

    #[test]
    fn unknown_fields_and_bad_ranges_are_rejected() {
        assert!(Job::from_json(r#"{ "canvas": "a", "mask": "b", "out": "c", "x": 1 }"#).is_err());

        let mut job = Job::new("a.gif", "m.png", "o.gif");
        job.delay_ms = 5;
        assert!(job.validate().is_err());

        let mut job = Job::new("a.gif", "m.png", "o.gif");
        job.video_fps = 0;
        assert!(job.validate().is_err());

        let mut job = Job::new("a.gif", "m.png", "o.gif");
        job.size = Some(Size {
            width: 0,
            height: 4,
        });
        assert!(job.validate().is_err());

        assert!(Job::new("", "m.png", "o.gif").validate().is_err());
    }

    #[test]
    fn sizes_past_the_gif_limit_fail_validation() {
        let mut job = Job::new("a.gif", "m.png", "o.gif");
        job.size = Some(Size::at_least_one(70_000, 70_000));
        assert!(job.validate().is_err());

        job.size = Some(Size::at_least_one(MAX_GIF_DIM, 16));
        job.validate().unwrap();

        job.mask_stretch = 4_000_000_000;
        assert!(job.validate().is_err());
        job.mask_stretch = -4_000_000_000;
        assert!(job.validate().is_err());
        job.mask_stretch = -i64::from(MAX_GIF_DIM);
        job.validate().unwrap();
    }

    #[test]
    fn resolve_only_touches_relative_paths() {
        let abs = if cfg!(windows) { "C:\\x\\m.png" } else { "/x/m.png" };
        let job = Job::new("a.gif", abs, "out/o.gif").resolve(Path::new("jobs"));
        assert_eq!(job.canvas, PathBuf::from("jobs").join("a.gif"));
        assert_eq!(job.mask, PathBuf::from(abs));
        assert_eq!(job.out, PathBuf::from("jobs").join("out/o.gif"));
    }
}
