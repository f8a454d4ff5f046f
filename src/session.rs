//! Headless editing session.
//!
//! A [`Session`] owns the loaded canvas, the mask and the editing settings, and exposes every
//! editing action as a method. Front-ends (the CLI, job files, or an interactive UI) only translate
//! their input into these calls.

use std::{
    io::Write,
    path::{Path, PathBuf},
};

use image::RgbaImage;

use crate::{
    assets::decode::{self, SourceFrame, SourceKind},
    composite,
    encode_gif::{self, GifExportConfig, Timing},
    foundation::{
        core::{CompositeMode, FrameDelay, PREVIEW_MAX, SampleRate, Size},
        error::{MaskframeError, MaskframeResult},
    },
    mask::MaskState,
    sequence::{self, FrameSequence},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Settings {
    pub mode: CompositeMode,
    pub flip: bool,
    pub aspect_locked: bool,
    pub delay: FrameDelay,
    pub video_fps: SampleRate,
    pub keep_source_timing: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mode: CompositeMode::default(),
            flip: false,
            aspect_locked: true,
            delay: FrameDelay::default(),
            video_fps: SampleRate::default(),
            keep_source_timing: false,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Canvas {
    pub path: Option<PathBuf>,
    pub kind: SourceKind,
    pub frames: FrameSequence,
}

#[derive(Clone, Copy, Debug)]
struct ResizeDrag {
    initial_frame: Size,
    initial_mask: Size,
    target: Size,
}

/// One step of preview playback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlaybackTick {
    pub frame: usize,
    pub delay_ms: u32,
}

#[derive(Debug, Default)]
pub struct Session {
    canvas: Option<Canvas>,
    mask: Option<MaskState>,
    settings: Settings,
    current: usize,
    drag: Option<ResizeDrag>,
}

impl Session {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn canvas(&self) -> Option<&Canvas> {
        self.canvas.as_ref()
    }

    pub fn frames(&self) -> Option<&FrameSequence> {
        self.canvas.as_ref().map(|c| &c.frames)
    }

    pub fn mask(&self) -> Option<&MaskState> {
        self.mask.as_ref()
    }

    pub fn current_frame(&self) -> usize {
        self.current
    }

    pub fn set_current_frame(&mut self, index: usize) -> MaskframeResult<()> {
        let len = self.require_frames()?.len();
        if index >= len {
            return Err(MaskframeError::validation(format!(
                "frame index {index} out of range (len {len})"
            )));
        }
        self.current = index;
        Ok(())
    }

    /// Decode a canvas file and make it the working canvas.
    #[tracing::instrument(skip(self))]
    pub fn load_canvas(&mut self, path: &Path) -> MaskframeResult<()> {
        let decoded = decode::load_frames(path, self.settings.video_fps)?;
        self.set_canvas_frames(decoded.frames, decoded.kind)?;
        if let Some(canvas) = self.canvas.as_mut() {
            canvas.path = Some(path.to_path_buf());
        }
        Ok(())
    }

    /// Use already decoded frames as the working canvas.
    pub fn set_canvas_frames(
        &mut self,
        frames: Vec<SourceFrame>,
        kind: SourceKind,
    ) -> MaskframeResult<()> {
        let frames = FrameSequence::new(frames)?;
        let size = frames.size();
        tracing::info!(frames = frames.len(), size = %size, "canvas loaded");

        self.canvas = Some(Canvas {
            path: None,
            kind,
            frames,
        });
        self.current = 0;
        self.drag = None;
        if let Some(mask) = self.mask.as_mut() {
            mask.fit_to(size);
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub fn load_mask(&mut self, path: &Path) -> MaskframeResult<()> {
        let img = decode::load_mask(path)?;
        self.set_mask_image(img);
        Ok(())
    }

    /// Install a mask, fitted to the current frame when a canvas is loaded.
    pub fn set_mask_image(&mut self, img: RgbaImage) {
        let mut mask = MaskState::new(img);
        if let Some(frame) = self.frames().and_then(|f| f.frame(self.current)) {
            mask.fit_to(Size::of(frame));
        }
        tracing::debug!(size = %mask.size(), "mask loaded");
        self.mask = Some(mask);
    }

    /// Forget the canvas and the mask.
    pub fn remove_canvas(&mut self) {
        self.canvas = None;
        self.mask = None;
        self.current = 0;
        self.drag = None;
    }

    pub fn remove_mask(&mut self) {
        self.mask = None;
    }

    /// Return to the decoded frames; the mask follows the canvas width and keeps its stretch.
    pub fn reset_canvas(&mut self) -> MaskframeResult<()> {
        let canvas = self.require_canvas_mut()?;
        canvas.frames.reset();
        let width = canvas.frames.size().width;
        if let Some(mask) = self.mask.as_mut() {
            mask.reset_to_width(width);
        }
        self.drag = None;
        Ok(())
    }

    /// Resize every frame from the originals. With the aspect ratio locked, `height` is derived
    /// from `width`. Returns the size actually applied.
    pub fn set_dimensions(&mut self, width: u32, height: u32) -> MaskframeResult<Size> {
        let locked = self.settings.aspect_locked;
        let frames = self.require_frames()?;
        let height = if locked {
            frames.locked_height(width)
        } else {
            height
        };
        let size = Size::new(width, height)?.check_gif_limit()?;

        // The mask goes first so a rejected mask size leaves the frames untouched.
        if let Some(mask) = self.mask.as_mut() {
            mask.rescale_to_width(size.width)?;
        }
        self.require_canvas_mut()?.frames.resize_all(size);
        Ok(size)
    }

    /// Vertically stretch the mask by `dy` pixels.
    pub fn stretch_mask(&mut self, dy: i64) -> MaskframeResult<Size> {
        let mask = self
            .mask
            .as_mut()
            .ok_or_else(|| MaskframeError::validation("no mask loaded"))?;
        mask.stretch_by(dy)?;
        Ok(mask.size())
    }

    pub fn begin_resize(&mut self) -> MaskframeResult<()> {
        let frame = self
            .require_frames()?
            .frame(self.current)
            .map(Size::of)
            .ok_or_else(|| MaskframeError::validation("current frame is out of range"))?;
        let initial_mask = self.mask.as_ref().map_or(frame, MaskState::size);
        self.drag = Some(ResizeDrag {
            initial_frame: frame,
            initial_mask,
            target: frame,
        });
        Ok(())
    }

    /// Live update of a resize drag: only the current frame is resampled.
    pub fn update_resize(&mut self, dx: i64, dy: i64) -> MaskframeResult<Size> {
        let mut drag = self
            .drag
            .ok_or_else(|| MaskframeError::validation("no resize in progress"))?;
        let locked = self.settings.aspect_locked;
        let target = sequence::drag_target(drag.initial_frame, dx, dy, locked)?;

        if let Some(mask) = self.mask.as_mut() {
            let wr = f64::from(target.width) / f64::from(drag.initial_frame.width);
            let hr = f64::from(target.height) / f64::from(drag.initial_frame.height);
            mask.scale_from(drag.initial_mask, wr, hr)?;
        }

        let current = self.current;
        self.require_canvas_mut()?
            .frames
            .resize_one(current, target)?;

        drag.target = target;
        self.drag = Some(drag);
        Ok(target)
    }

    /// Finish a resize drag by resampling every frame to the drag target.
    pub fn commit_resize(&mut self) -> MaskframeResult<Size> {
        let drag = self
            .drag
            .take()
            .ok_or_else(|| MaskframeError::validation("no resize in progress"))?;
        self.require_canvas_mut()?.frames.resize_all(drag.target);
        tracing::debug!(size = %drag.target, "resize committed");
        Ok(drag.target)
    }

    pub fn set_mode(&mut self, mode: CompositeMode) {
        self.settings.mode = mode;
    }

    pub fn set_flip(&mut self, flip: bool) {
        self.settings.flip = flip;
    }

    pub fn set_aspect_locked(&mut self, locked: bool) {
        self.settings.aspect_locked = locked;
    }

    pub fn set_keep_source_timing(&mut self, keep: bool) {
        self.settings.keep_source_timing = keep;
    }

    pub fn set_delay_ms(&mut self, ms: u32) -> MaskframeResult<()> {
        self.settings.delay = FrameDelay::from_ms(ms)?;
        Ok(())
    }

    /// Sample rate for video canvases; applies to the next `load_canvas`.
    pub fn set_video_fps(&mut self, fps: u32) -> MaskframeResult<()> {
        self.settings.video_fps = SampleRate::new(fps)?;
        Ok(())
    }

    pub fn can_apply(&self) -> bool {
        self.canvas.is_some() && self.mask.is_some()
    }

    /// Composite the mask onto every frame with the current mode.
    pub fn apply(&mut self) -> MaskframeResult<()> {
        let mask = self
            .mask
            .as_ref()
            .ok_or_else(|| MaskframeError::validation("apply needs a mask"))?;
        let canvas = self
            .canvas
            .as_mut()
            .ok_or_else(|| MaskframeError::validation("apply needs a canvas"))?;
        composite::apply_to_frames(
            canvas.frames.frames_mut(),
            mask,
            self.settings.mode,
            self.settings.flip,
        )
    }

    /// Frame `index` with the working mask drawn over it, scaled down to the preview bounds.
    pub fn preview(&self, index: usize) -> Option<RgbaImage> {
        let mut frame = self.frames()?.frame(index)?.clone();
        if let Some(mask) = self.mask.as_ref() {
            composite::paste_over(&mut frame, &mask.preview_mask(self.settings.flip));
        }
        Some(sequence::fit_within(&frame, PREVIEW_MAX))
    }

    /// Return the frame to show next and how long to show it, then advance (wrapping).
    pub fn advance_playback(&mut self) -> Option<PlaybackTick> {
        let frames = self.frames()?;
        let len = frames.len();
        if len == 0 {
            return None;
        }
        let frame = self.current.min(len - 1);
        let delay_ms = if self.settings.keep_source_timing {
            frames.originals()[frame].delay_ms
        } else {
            self.settings.delay.as_ms()
        };
        self.current = (frame + 1) % len;
        Some(PlaybackTick { frame, delay_ms })
    }

    pub fn export_config(&self) -> MaskframeResult<GifExportConfig> {
        let size = self.require_frames()?.size();
        let timing = if self.settings.keep_source_timing {
            Timing::Source
        } else {
            Timing::Uniform(self.settings.delay)
        };
        Ok(GifExportConfig::new(size).with_timing(timing))
    }

    /// Write the working frames as a looping GIF.
    pub fn export(&self, path: &Path) -> MaskframeResult<()> {
        let frames = self.require_frames()?;
        let config = self.export_config()?;
        encode_gif::write_gif(path, frames.frames(), &frames.delays_ms(), &config)
    }

    pub fn export_to<W: Write>(&self, out: W) -> MaskframeResult<W> {
        let frames = self.require_frames()?;
        let config = self.export_config()?;
        encode_gif::encode_gif(out, frames.frames(), &frames.delays_ms(), &config)
    }

    fn require_frames(&self) -> MaskframeResult<&FrameSequence> {
        self.frames()
            .ok_or_else(|| MaskframeError::validation("no canvas loaded"))
    }

    fn require_canvas_mut(&mut self) -> MaskframeResult<&mut Canvas> {
        self.canvas
            .as_mut()
            .ok_or_else(|| MaskframeError::validation("no canvas loaded"))
    }
}
