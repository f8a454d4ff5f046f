use image::imageops::FilterType;

use crate::foundation::error::{MaskframeError, MaskframeResult};

/// Resampling filter used for every frame and mask resize.
pub const RESAMPLE_FILTER: FilterType = FilterType::Lanczos3;

/// Bounds a preview frame is downscaled into.
pub const PREVIEW_MAX: Size = Size {
    width: 1280,
    height: 720,
};

/// Largest width or height a GIF logical screen can describe.
pub const MAX_GIF_DIM: u32 = u16::MAX as u32;

pub const DEFAULT_DELAY_MS: u32 = 100;
pub const MIN_DELAY_MS: u32 = 10;
pub const MAX_DELAY_MS: u32 = 1000;

pub const DEFAULT_VIDEO_FPS: u32 = 5;
pub const MIN_VIDEO_FPS: u32 = 1;
pub const MAX_VIDEO_FPS: u32 = 60;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn new(width: u32, height: u32) -> MaskframeResult<Self> {
        if width == 0 || height == 0 {
            return Err(MaskframeError::validation(format!(
                "size must be non-zero, got {width}x{height}"
            )));
        }
        Ok(Self { width, height })
    }

    /// Size with both axes clamped to at least one pixel.
    pub fn at_least_one(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
        }
    }

    pub fn of(img: &image::RgbaImage) -> Self {
        let (width, height) = img.dimensions();
        Self { width, height }
    }

    /// Reject sizes the GIF encoder cannot describe, before anything is allocated at them.
    pub fn check_gif_limit(self) -> MaskframeResult<Self> {
        if self.width > MAX_GIF_DIM || self.height > MAX_GIF_DIM {
            return Err(MaskframeError::validation(format!(
                "gif dimensions are limited to {MAX_GIF_DIM}x{MAX_GIF_DIM}, got {self}"
            )));
        }
        Ok(self)
    }

    /// Height over width.
    pub fn aspect(self) -> f64 {
        f64::from(self.height) / f64::from(self.width)
    }
}

impl std::fmt::Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositeMode {
    /// Alpha-paste the mask over the frame.
    Overlay,
    /// Clear frame pixels where the mask is opaque.
    #[default]
    Cutout,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct FrameDelay(u32);

impl FrameDelay {
    pub fn from_ms(ms: u32) -> MaskframeResult<Self> {
        if !(MIN_DELAY_MS..=MAX_DELAY_MS).contains(&ms) {
            return Err(MaskframeError::validation(format!(
                "frame delay must be within {MIN_DELAY_MS}..={MAX_DELAY_MS} ms, got {ms}"
            )));
        }
        Ok(Self(ms))
    }

    pub fn as_ms(self) -> u32 {
        self.0
    }

    /// GIF delays are stored in hundredths of a second.
    pub fn as_centis(self) -> u16 {
        centis_from_ms(self.0)
    }
}

impl Default for FrameDelay {
    fn default() -> Self {
        Self(DEFAULT_DELAY_MS)
    }
}

impl TryFrom<u32> for FrameDelay {
    type Error = MaskframeError;

    fn try_from(ms: u32) -> MaskframeResult<Self> {
        Self::from_ms(ms)
    }
}

impl From<FrameDelay> for u32 {
    fn from(d: FrameDelay) -> Self {
        d.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct SampleRate(u32);

impl SampleRate {
    pub fn new(fps: u32) -> MaskframeResult<Self> {
        if !(MIN_VIDEO_FPS..=MAX_VIDEO_FPS).contains(&fps) {
            return Err(MaskframeError::validation(format!(
                "video sample rate must be within {MIN_VIDEO_FPS}..={MAX_VIDEO_FPS} fps, got {fps}"
            )));
        }
        Ok(Self(fps))
    }

    pub fn fps(self) -> u32 {
        self.0
    }

    pub fn frame_delay_ms(self) -> u32 {
        1000 / self.0
    }
}

impl Default for SampleRate {
    fn default() -> Self {
        Self(DEFAULT_VIDEO_FPS)
    }
}

impl TryFrom<u32> for SampleRate {
    type Error = MaskframeError;

    fn try_from(fps: u32) -> MaskframeResult<Self> {
        Self::new(fps)
    }
}

impl From<SampleRate> for u32 {
    fn from(r: SampleRate) -> Self {
        r.0
    }
}

pub(crate) fn centis_from_ms(ms: u32) -> u16 {
    let centis = (ms + 5) / 10;
    centis.clamp(1, u32::from(u16::MAX)) as u16
}
