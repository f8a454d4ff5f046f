use std::path::{Path, PathBuf};

use crate::{
    assets::decode::SourceFrame,
    foundation::{
        core::SampleRate,
        error::{MaskframeError, MaskframeResult},
    },
};

#[derive(Clone, Debug)]
pub struct VideoSourceInfo {
    pub source_path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub fps_num: u32,
    pub fps_den: u32,
    pub duration_sec: f64,
}

impl VideoSourceInfo {
    pub fn source_fps(&self) -> f64 {
        if self.fps_den == 0 {
            0.0
        } else {
            f64::from(self.fps_num) / f64::from(self.fps_den)
        }
    }

    /// Number of frames a full sample at `rate` is expected to produce.
    pub fn expected_samples(&self, rate: SampleRate) -> u64 {
        (self.duration_sec * f64::from(rate.fps())).floor().max(0.0) as u64
    }
}

pub fn is_ffmpeg_on_path() -> bool {
    tool_on_path("ffmpeg") && tool_on_path("ffprobe")
}

fn tool_on_path(tool: &str) -> bool {
    std::process::Command::new(tool)
        .arg("-version")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(feature = "media-ffmpeg")]
pub fn probe_video(source_path: &Path) -> MaskframeResult<VideoSourceInfo> {
    #[derive(serde::Deserialize)]
    struct ProbeStream {
        codec_type: Option<String>,
        width: Option<u32>,
        height: Option<u32>,
        r_frame_rate: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeFormat {
        duration: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeOut {
        streams: Vec<ProbeStream>,
        format: Option<ProbeFormat>,
    }

    let out = std::process::Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
        ])
        .arg(source_path)
        .output()
        .map_err(|e| missing_tool("ffprobe", e))?;
    if !out.status.success() {
        return Err(MaskframeError::media(format!(
            "ffprobe failed for '{}': {}",
            source_path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    let parsed: ProbeOut = serde_json::from_slice(&out.stdout)
        .map_err(|e| MaskframeError::serde(format!("ffprobe json parse failed: {e}")))?;
    let video_stream = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| {
            MaskframeError::media(format!(
                "no video stream found in '{}'",
                source_path.display()
            ))
        })?;
    let width = video_stream
        .width
        .ok_or_else(|| MaskframeError::media("missing video width from ffprobe"))?;
    let height = video_stream
        .height
        .ok_or_else(|| MaskframeError::media("missing video height from ffprobe"))?;

    let (fps_num, fps_den) = parse_ff_ratio(video_stream.r_frame_rate.as_deref().unwrap_or("0/1"))
        .ok_or_else(|| MaskframeError::media("invalid video r_frame_rate"))?;
    let duration_sec = parsed
        .format
        .as_ref()
        .and_then(|f| f.duration.as_ref())
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(0.0);

    Ok(VideoSourceInfo {
        source_path: source_path.to_path_buf(),
        width,
        height,
        fps_num,
        fps_den,
        duration_sec,
    })
}

#[cfg(not(feature = "media-ffmpeg"))]
pub fn probe_video(_source_path: &Path) -> MaskframeResult<VideoSourceInfo> {
    Err(MaskframeError::media(
        "video canvases require the 'media-ffmpeg' feature",
    ))
}

/// Resample a video to `rate` frames per second and return every sampled frame as RGBA8.
#[cfg(feature = "media-ffmpeg")]
#[tracing::instrument]
pub fn sample_video_frames(
    source_path: &Path,
    rate: SampleRate,
) -> MaskframeResult<Vec<SourceFrame>> {
    let info = probe_video(source_path)?;
    tracing::debug!(
        width = info.width,
        height = info.height,
        source_fps = info.source_fps(),
        expected = info.expected_samples(rate),
        "sampling video"
    );

    let out = std::process::Command::new("ffmpeg")
        .args(["-v", "error", "-i"])
        .arg(source_path)
        .args([
            "-vf",
            &format!("fps={}", rate.fps()),
            "-an",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "pipe:1",
        ])
        .output()
        .map_err(|e| missing_tool("ffmpeg", e))?;

    if !out.status.success() {
        return Err(MaskframeError::media(format!(
            "ffmpeg video decode failed for '{}': {}",
            source_path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    split_rgba_frames(out.stdout, info.width, info.height, rate.frame_delay_ms())
}

#[cfg(not(feature = "media-ffmpeg"))]
pub fn sample_video_frames(
    _source_path: &Path,
    _rate: SampleRate,
) -> MaskframeResult<Vec<SourceFrame>> {
    Err(MaskframeError::media(
        "video canvases require the 'media-ffmpeg' feature",
    ))
}

/// Split a tightly packed stream of RGBA8 frames into individual images.
pub fn split_rgba_frames(
    raw: Vec<u8>,
    width: u32,
    height: u32,
    delay_ms: u32,
) -> MaskframeResult<Vec<SourceFrame>> {
    let frame_len = width as usize * height as usize * 4;
    if frame_len == 0 {
        return Err(MaskframeError::media(
            "decoded video frame size is zero (invalid source dimensions)",
        ));
    }
    if !raw.len().is_multiple_of(frame_len) {
        return Err(MaskframeError::media(format!(
            "decoded video stream has invalid size: got {} bytes, expected multiples of {frame_len}",
            raw.len()
        )));
    }

    let mut frames = Vec::with_capacity(raw.len() / frame_len);
    for chunk in raw.chunks_exact(frame_len) {
        let image = image::RgbaImage::from_raw(width, height, chunk.to_vec())
            .ok_or_else(|| MaskframeError::media("rgba frame buffer size mismatch"))?;
        frames.push(SourceFrame::new(image, delay_ms));
    }
    Ok(frames)
}

#[cfg(feature = "media-ffmpeg")]
fn missing_tool(tool: &str, e: std::io::Error) -> MaskframeError {
    if e.kind() == std::io::ErrorKind::NotFound {
        MaskframeError::media(format!(
            "{tool} was not found; install FFmpeg and make sure it is on PATH"
        ))
    } else {
        MaskframeError::media(format!("failed to run {tool}: {e}"))
    }
}

#[cfg(feature = "media-ffmpeg")]
fn parse_ff_ratio(s: &str) -> Option<(u32, u32)> {
    let mut parts = s.split('/');
    let a = parts.next()?.parse::<u32>().ok()?;
    let b = parts.next()?.parse::<u32>().ok()?;
    if b == 0 {
        return None;
    }
    Some((a, b))
}
