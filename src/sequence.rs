use image::{RgbaImage, imageops};
use rayon::prelude::*;

use crate::{
    assets::decode::SourceFrame,
    foundation::{
        core::{RESAMPLE_FILTER, Size},
        error::{MaskframeError, MaskframeResult},
    },
};

/// Decoded canvas frames plus the working copies edits are applied to.
///
/// Resizes always resample from the decoded originals, never from a previous working copy.
#[derive(Clone, Debug)]
pub struct FrameSequence {
    originals: Vec<SourceFrame>,
    frames: Vec<RgbaImage>,
    size: Size,
    source_size: Size,
}

impl FrameSequence {
    pub fn new(originals: Vec<SourceFrame>) -> MaskframeResult<Self> {
        let first = originals
            .first()
            .ok_or_else(|| MaskframeError::validation("frame sequence must not be empty"))?;
        let source_size = Size::new(first.image.width(), first.image.height())?;
        let frames = originals.iter().map(|f| f.image.clone()).collect();
        Ok(Self {
            originals,
            frames,
            size: source_size,
            source_size,
        })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn source_size(&self) -> Size {
        self.source_size
    }

    pub fn frames(&self) -> &[RgbaImage] {
        &self.frames
    }

    pub fn frames_mut(&mut self) -> &mut [RgbaImage] {
        &mut self.frames
    }

    pub fn frame(&self, index: usize) -> Option<&RgbaImage> {
        self.frames.get(index)
    }

    pub fn originals(&self) -> &[SourceFrame] {
        &self.originals
    }

    pub fn delays_ms(&self) -> Vec<u32> {
        self.originals.iter().map(|f| f.delay_ms).collect()
    }

    /// Resample every frame from its original to `size`.
    #[tracing::instrument(skip(self), fields(count = self.originals.len()))]
    pub fn resize_all(&mut self, size: Size) {
        self.frames = self
            .originals
            .par_iter()
            .map(|f| imageops::resize(&f.image, size.width, size.height, RESAMPLE_FILTER))
            .collect();
        self.size = size;
    }

    /// Resample a single frame, used while a resize drag is in progress.
    pub fn resize_one(&mut self, index: usize, size: Size) -> MaskframeResult<()> {
        let original = self.originals.get(index).ok_or_else(|| {
            MaskframeError::validation(format!(
                "frame index {index} out of range (len {})",
                self.originals.len()
            ))
        })?;
        self.frames[index] =
            imageops::resize(&original.image, size.width, size.height, RESAMPLE_FILTER);
        Ok(())
    }

    /// Drop all edits and go back to the decoded frames.
    pub fn reset(&mut self) {
        self.frames = self.originals.iter().map(|f| f.image.clone()).collect();
        self.size = self.source_size;
    }

    /// Height that keeps the source aspect ratio at `width`.
    pub fn locked_height(&self, width: u32) -> u32 {
        ((f64::from(width) * self.source_size.aspect()).trunc() as u32).max(1)
    }
}

/// Target size of a frame-resize drag that started at `initial`.
///
/// With the aspect ratio locked, the axis that moved furthest drives a uniform scale factor
/// (horizontal wins ties). Targets past the GIF limit are rejected.
pub fn drag_target(initial: Size, dx: i64, dy: i64, locked: bool) -> MaskframeResult<Size> {
    let target = if locked {
        let delta = if dy.unsigned_abs() > dx.unsigned_abs() { dy } else { dx };
        let factor = 1.0 + delta as f64 / f64::from(initial.width);
        let width = (f64::from(initial.width) * factor).trunc();
        let height = (f64::from(initial.height) * factor).trunc();
        Size::at_least_one(clamp_dim(width), clamp_dim(height))
    } else {
        let width = i64::from(initial.width).saturating_add(dx);
        let height = i64::from(initial.height).saturating_add(dy);
        Size::at_least_one(clamp_dim(width as f64), clamp_dim(height as f64))
    };
    target.check_gif_limit()
}

/// Downscale `img` to fit within `bounds`, keeping its aspect ratio.
pub fn fit_within(img: &RgbaImage, bounds: Size) -> RgbaImage {
    let (w, h) = img.dimensions();
    if w <= bounds.width && h <= bounds.height {
        return img.clone();
    }
    let sx = f64::from(bounds.width) / f64::from(w);
    let sy = f64::from(bounds.height) / f64::from(h);
    let scale = sx.min(sy);
    let nw = ((f64::from(w) * scale).trunc() as u32).max(1);
    let nh = ((f64::from(h) * scale).trunc() as u32).max(1);
    imageops::resize(img, nw, nh, RESAMPLE_FILTER)
}

fn clamp_dim(v: f64) -> u32 {
    v.clamp(0.0, f64::from(u32::MAX)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq(w: u32, h: u32, n: usize) -> FrameSequence {
        let frames = (0..n)
            .map(|i| {
                SourceFrame::new(
                    RgbaImage::from_pixel(w, h, image::Rgba([i as u8, 0, 0, 255])),
                    40,
                )
            })
            .collect();
        FrameSequence::new(frames).unwrap()
    }

    #[test]
    fn empty_sequence_is_rejected() {
        assert!(FrameSequence::new(Vec::new()).is_err());
    }

    #[test]
    fn resize_all_keeps_order_and_reset_restores() {
        let mut s = seq(8, 4, 5);
        s.resize_all(Size::at_least_one(4, 2));
        assert_eq!(s.size(), Size::at_least_one(4, 2));
        for (i, f) in s.frames().iter().enumerate() {
            assert_eq!(f.dimensions(), (4, 2));
            assert_eq!(f.get_pixel(0, 0).0[0], i as u8);
        }

        s.reset();
        assert_eq!(s.size(), Size::at_least_one(8, 4));
        assert_eq!(s.frame(4).unwrap().dimensions(), (8, 4));
        assert_eq!(s.delays_ms(), vec![40; 5]);
    }

    #[test]
    fn resize_one_checks_bounds() {
        let mut s = seq(4, 4, 2);
        s.resize_one(1, Size::at_least_one(2, 2)).unwrap();
        assert_eq!(s.frame(1).unwrap().dimensions(), (2, 2));
        assert_eq!(s.frame(0).unwrap().dimensions(), (4, 4));
        assert!(s.resize_one(2, Size::at_least_one(2, 2)).is_err());
    }

    #[test]
    fn locked_height_follows_source_aspect() {
        let s = seq(200, 100, 1);
        assert_eq!(s.locked_height(101), 50);
        assert_eq!(s.locked_height(1), 1);
    }

    #[test]
    fn locked_drag_uses_dominant_axis() {
        let initial = Size::at_least_one(64, 32);
        assert_eq!(
            drag_target(initial, 8, -32, true).unwrap(),
            Size::at_least_one(32, 16)
        );
        assert_eq!(
            drag_target(initial, 16, 16, true).unwrap(),
            Size::at_least_one(80, 40)
        );
        assert_eq!(
            drag_target(initial, -500, 0, true).unwrap(),
            Size::at_least_one(1, 1)
        );
    }

    #[test]
    fn unlocked_drag_moves_axes_independently() {
        let initial = Size::at_least_one(100, 50);
        assert_eq!(
            drag_target(initial, 5, -10, false).unwrap(),
            Size::at_least_one(105, 40)
        );
        assert_eq!(
            drag_target(initial, -200, -200, false).unwrap(),
            Size::at_least_one(1, 1)
        );
    }

    #[test]
    fn drag_past_gif_limit_is_rejected() {
        let initial = Size::at_least_one(64, 32);
        assert!(drag_target(initial, 70_000, 0, false).is_err());
        assert!(drag_target(initial, 0, i64::MAX, false).is_err());
        // 64 * (1 + 64_000 / 64) overflows the width limit.
        assert!(drag_target(initial, 64_000, 0, true).is_err());
    }

    #[test]
    fn fit_within_only_downscales() {
        let small = RgbaImage::new(10, 10);
        assert_eq!(fit_within(&small, Size::at_least_one(20, 20)).dimensions(), (10, 10));

        let wide = RgbaImage::new(2560, 720);
        assert_eq!(
            fit_within(&wide, Size::at_least_one(1280, 720)).dimensions(),
            (1280, 360)
        );
    }
}
