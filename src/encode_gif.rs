use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use anyhow::Context as _;
use image::RgbaImage;

use crate::foundation::{
    core::{FrameDelay, RESAMPLE_FILTER, Size, centis_from_ms},
    error::{MaskframeError, MaskframeResult},
};

/// NeuQuant sampling speed passed to the GIF quantiser (1 = best, 30 = fastest).
const QUANTIZE_SPEED: i32 = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Timing {
    /// Every frame shows for the same delay.
    Uniform(FrameDelay),
    /// Each frame keeps the delay it was decoded with.
    Source,
}

#[derive(Clone, Debug)]
pub struct GifExportConfig {
    pub size: Size,
    pub timing: Timing,
    pub repeat_forever: bool,
}

impl GifExportConfig {
    pub fn new(size: Size) -> Self {
        Self {
            size,
            timing: Timing::Uniform(FrameDelay::default()),
            repeat_forever: true,
        }
    }

    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    pub fn validate(&self) -> MaskframeResult<()> {
        Size::new(self.size.width, self.size.height)?;
        gif_dims(self.size)?;
        Ok(())
    }

    fn delay_centis(&self, source_delay_ms: u32) -> u16 {
        match self.timing {
            Timing::Uniform(d) => d.as_centis(),
            Timing::Source => centis_from_ms(source_delay_ms),
        }
    }
}

pub fn ensure_parent_dir(path: &Path) -> MaskframeResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

pub struct GifWriter<W: Write> {
    encoder: gif::Encoder<W>,
    size: Size,
    frames_written: usize,
}

impl<W: Write> GifWriter<W> {
    pub fn new(out: W, size: Size, repeat_forever: bool) -> MaskframeResult<Self> {
        let (w, h) = gif_dims(size)?;
        let mut encoder = gif::Encoder::new(out, w, h, &[])
            .map_err(|e| MaskframeError::encode(format!("failed to start gif stream: {e}")))?;
        let repeat = if repeat_forever {
            gif::Repeat::Infinite
        } else {
            gif::Repeat::Finite(0)
        };
        encoder
            .set_repeat(repeat)
            .map_err(|e| MaskframeError::encode(format!("failed to set gif repeat: {e}")))?;

        Ok(Self {
            encoder,
            size,
            frames_written: 0,
        })
    }

    /// Quantise and append one frame; `delay_centis` is in hundredths of a second.
    pub fn write_frame(&mut self, frame: &RgbaImage, delay_centis: u16) -> MaskframeResult<()> {
        if Size::of(frame) != self.size {
            return Err(MaskframeError::validation(format!(
                "frame size mismatch: got {}, expected {}",
                Size::of(frame),
                self.size
            )));
        }

        let (w, h) = gif_dims(self.size)?;
        let mut pixels = frame.as_raw().clone();
        let mut out = gif::Frame::from_rgba_speed(w, h, &mut pixels, QUANTIZE_SPEED);
        out.delay = delay_centis.max(1);
        out.dispose = gif::DisposalMethod::Background;

        self.encoder.write_frame(&out).map_err(|e| {
            MaskframeError::encode(format!(
                "failed to write gif frame {}: {e}",
                self.frames_written
            ))
        })?;
        self.frames_written += 1;
        Ok(())
    }

    pub fn frames_written(&self) -> usize {
        self.frames_written
    }

    pub fn finish(self) -> MaskframeResult<W> {
        self.encoder
            .into_inner()
            .map_err(|e| MaskframeError::encode(format!("failed to finish gif stream: {e}")))
    }
}

/// Encode `frames` as a GIF into `out`. Frames whose size differs from `config.size` are
/// resampled first.
pub fn encode_gif<W: Write>(
    out: W,
    frames: &[RgbaImage],
    delays_ms: &[u32],
    config: &GifExportConfig,
) -> MaskframeResult<W> {
    config.validate()?;
    if frames.is_empty() {
        return Err(MaskframeError::validation("cannot encode a gif without frames"));
    }

    let mut writer = GifWriter::new(out, config.size, config.repeat_forever)?;
    for (idx, frame) in frames.iter().enumerate() {
        let delay = config.delay_centis(delays_ms.get(idx).copied().unwrap_or(0));
        if Size::of(frame) == config.size {
            writer.write_frame(frame, delay)?;
        } else {
            let resized = image::imageops::resize(
                frame,
                config.size.width,
                config.size.height,
                RESAMPLE_FILTER,
            );
            writer.write_frame(&resized, delay)?;
        }
    }
    tracing::debug!(frames = writer.frames_written(), "encoded gif");
    writer.finish()
}

#[tracing::instrument(
    skip(frames, delays_ms, config),
    fields(count = frames.len(), size = %config.size)
)]
pub fn write_gif(
    path: &Path,
    frames: &[RgbaImage],
    delays_ms: &[u32],
    config: &GifExportConfig,
) -> MaskframeResult<()> {
    ensure_parent_dir(path)?;
    let f = File::create(path).with_context(|| format!("create gif '{}'", path.display()))?;
    let mut w = encode_gif(BufWriter::new(f), frames, delays_ms, config)?;
    w.flush()
        .with_context(|| format!("flush gif '{}'", path.display()))?;
    tracing::info!(path = %path.display(), "wrote gif");
    Ok(())
}

fn gif_dims(size: Size) -> MaskframeResult<(u16, u16)> {
    let size = size.check_gif_limit()?;
    Ok((size.width as u16, size.height as u16))
}
