use std::{fs::File, io::BufReader, path::Path};

use anyhow::Context as _;
use image::{DynamicImage, RgbaImage};

use crate::{
    assets::media,
    foundation::{
        core::{DEFAULT_DELAY_MS, SampleRate},
        error::{MaskframeError, MaskframeResult},
    },
};

/// How a canvas file is turned into frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKind {
    Animated,
    Still,
    Video,
}

/// One decoded canvas frame, always straight RGBA8.
#[derive(Clone, Debug)]
pub struct SourceFrame {
    pub image: RgbaImage,
    pub delay_ms: u32,
}

impl SourceFrame {
    pub fn new(image: RgbaImage, delay_ms: u32) -> Self {
        Self { image, delay_ms }
    }
}

/// A decoded canvas file and the kind it turned out to be.
#[derive(Clone, Debug)]
pub struct DecodedCanvas {
    pub kind: SourceKind,
    pub frames: Vec<SourceFrame>,
}

fn kind_from_extension(path: &Path) -> MaskframeResult<SourceKind> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "gif" => Ok(SourceKind::Animated),
        "png" | "jpg" | "jpeg" => Ok(SourceKind::Still),
        "mp4" | "mov" | "m4v" | "mkv" => Ok(SourceKind::Video),
        _ => Err(MaskframeError::validation(format!(
            "unsupported canvas file '{}' (expected gif, png, jpg, jpeg, mp4, mov, m4v or mkv)",
            path.display()
        ))),
    }
}

/// Decode a canvas into RGBA8 frames. An animated PNG is reported as [`SourceKind::Animated`].
#[tracing::instrument]
pub fn load_frames(path: &Path, video_fps: SampleRate) -> MaskframeResult<DecodedCanvas> {
    let (kind, frames) = match kind_from_extension(path)? {
        SourceKind::Animated => (SourceKind::Animated, load_gif_frames(path)?),
        SourceKind::Still if is_png(path) => load_png_frames(path)?,
        SourceKind::Still => (SourceKind::Still, vec![load_still(path)?]),
        SourceKind::Video => (
            SourceKind::Video,
            media::sample_video_frames(path, video_fps)?,
        ),
    };

    if frames.is_empty() {
        return Err(MaskframeError::decode(format!(
            "'{}' contains no frames",
            path.display()
        )));
    }

    tracing::debug!(?kind, frames = frames.len(), "decoded canvas");
    Ok(DecodedCanvas { kind, frames })
}

/// Decode a mask image of any supported format into RGBA8.
pub fn load_mask(path: &Path) -> MaskframeResult<RgbaImage> {
    let img = image::ImageReader::open(path)
        .with_context(|| format!("open mask '{}'", path.display()))?
        .with_guessed_format()
        .with_context(|| format!("sniff mask format '{}'", path.display()))?
        .decode()
        .map_err(|e| MaskframeError::decode(format!("mask '{}': {e}", path.display())))?;
    Ok(img.to_rgba8())
}

fn load_gif_frames(path: &Path) -> MaskframeResult<Vec<SourceFrame>> {
    let reader = open_buffered(path)?;
    let decoder = image::codecs::gif::GifDecoder::new(reader)
        .map_err(|e| MaskframeError::decode(format!("gif '{}': {e}", path.display())))?;
    collect_frames(decoder, path)
}

fn load_png_frames(path: &Path) -> MaskframeResult<(SourceKind, Vec<SourceFrame>)> {
    let reader = open_buffered(path)?;
    let decoder = image::codecs::png::PngDecoder::new(reader)
        .map_err(|e| MaskframeError::decode(format!("png '{}': {e}", path.display())))?;
    let is_apng = decoder
        .is_apng()
        .map_err(|e| MaskframeError::decode(format!("png '{}': {e}", path.display())))?;
    if !is_apng {
        let img = DynamicImage::from_decoder(decoder)
            .map_err(|e| MaskframeError::decode(format!("png '{}': {e}", path.display())))?;
        let frame = SourceFrame::new(img.to_rgba8(), DEFAULT_DELAY_MS);
        return Ok((SourceKind::Still, vec![frame]));
    }

    let apng = decoder
        .apng()
        .map_err(|e| MaskframeError::decode(format!("apng '{}': {e}", path.display())))?;
    Ok((SourceKind::Animated, collect_frames(apng, path)?))
}

fn load_still(path: &Path) -> MaskframeResult<SourceFrame> {
    let img = image::ImageReader::open(path)
        .with_context(|| format!("open canvas '{}'", path.display()))?
        .with_guessed_format()
        .with_context(|| format!("sniff canvas format '{}'", path.display()))?
        .decode()
        .map_err(|e| MaskframeError::decode(format!("image '{}': {e}", path.display())))?;
    Ok(SourceFrame::new(img.to_rgba8(), DEFAULT_DELAY_MS))
}

fn collect_frames<'a, D: image::AnimationDecoder<'a>>(
    decoder: D,
    path: &Path,
) -> MaskframeResult<Vec<SourceFrame>> {
    let mut out = Vec::new();
    for frame in decoder.into_frames() {
        let frame = frame.map_err(|e| {
            MaskframeError::decode(format!("frame {} of '{}': {e}", out.len(), path.display()))
        })?;
        let (num, den) = frame.delay().numer_denom_ms();
        let delay_ms = if den == 0 { DEFAULT_DELAY_MS } else { num / den };
        out.push(SourceFrame::new(frame.into_buffer(), delay_ms));
    }
    Ok(out)
}

fn open_buffered(path: &Path) -> MaskframeResult<BufReader<File>> {
    let f = File::open(path).with_context(|| format!("open canvas '{}'", path.display()))?;
    Ok(BufReader::new(f))
}

fn is_png(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("png"))
}
