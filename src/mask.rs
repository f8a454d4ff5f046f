//! Mask geometry.
//!
//! A [`MaskState`] keeps the decoded mask untouched and derives a working copy from it on every
//! change, so repeated stretches never accumulate resampling loss.

use image::{RgbaImage, imageops};

use crate::foundation::{
    core::{MAX_GIF_DIM, RESAMPLE_FILTER, Size},
    error::MaskframeResult,
};

#[derive(Clone, Debug)]
pub struct MaskState {
    original: RgbaImage,
    resized: RgbaImage,
    height_scale: f64,
}

impl MaskState {
    pub fn new(original: RgbaImage) -> Self {
        Self {
            resized: original.clone(),
            original,
            height_scale: 1.0,
        }
    }

    pub fn original(&self) -> &RgbaImage {
        &self.original
    }

    pub fn resized(&self) -> &RgbaImage {
        &self.resized
    }

    pub fn original_size(&self) -> Size {
        Size::of(&self.original)
    }

    pub fn size(&self) -> Size {
        Size::of(&self.resized)
    }

    /// Working height divided by the original height.
    pub fn height_scale(&self) -> f64 {
        self.height_scale
    }

    /// Vertical stretch relative to the original aspect ratio (1.0 means undistorted).
    pub fn stretch_factor(&self) -> f64 {
        self.size().aspect() / self.original_size().aspect()
    }

    /// Resample the mask to exactly `size`.
    pub fn fit_to(&mut self, size: Size) {
        self.resample(Size::at_least_one(size.width, size.height));
    }

    /// Grow or shrink the working height by `dy` pixels, keeping the width.
    ///
    /// Heights past the GIF limit are rejected and leave the mask unchanged.
    pub fn stretch_by(&mut self, dy: i64) -> MaskframeResult<()> {
        let current = self.size();
        let height = i64::from(current.height)
            .saturating_add(dy)
            .clamp(1, i64::from(MAX_GIF_DIM) + 1) as u32;
        self.checked_resample(Size::at_least_one(current.width, height))
    }

    /// Match a new canvas width while keeping the current vertical stretch.
    pub fn rescale_to_width(&mut self, width: u32) -> MaskframeResult<()> {
        let stretch = self.stretch_factor();
        let base_height = (f64::from(width) * self.original_size().aspect()).trunc();
        let height = clamp_dim(base_height * stretch);
        self.checked_resample(Size::at_least_one(width, height))
    }

    /// Match the canvas width and reapply the stored height scale.
    pub fn reset_to_width(&mut self, width: u32) {
        let height = (f64::from(self.original.height()) * self.height_scale).trunc() as u32;
        let scale = self.height_scale;
        self.resample(Size::at_least_one(width, height));
        self.height_scale = scale;
    }

    /// Scale an earlier working size by independent ratios.
    pub fn scale_from(
        &mut self,
        initial: Size,
        width_ratio: f64,
        height_ratio: f64,
    ) -> MaskframeResult<()> {
        let width = clamp_dim(f64::from(initial.width) * width_ratio);
        let height = clamp_dim(f64::from(initial.height) * height_ratio);
        self.checked_resample(Size::at_least_one(width, height))
    }

    /// The mask used when compositing onto a frame `frame_width` pixels wide.
    ///
    /// The working mask is scaled to the frame width with its aspect ratio intact, then mirrored
    /// when `flip` is set.
    pub fn prepared_for(&self, frame_width: u32, flip: bool) -> RgbaImage {
        let width = frame_width.max(1);
        let height = (f64::from(width) * self.size().aspect()).trunc() as u32;
        let scaled = imageops::resize(&self.resized, width, height.max(1), RESAMPLE_FILTER);
        if flip {
            imageops::flip_horizontal(&scaled)
        } else {
            scaled
        }
    }

    /// The working mask as drawn in a preview, without any extra resampling.
    pub fn preview_mask(&self, flip: bool) -> RgbaImage {
        if flip {
            imageops::flip_horizontal(&self.resized)
        } else {
            self.resized.clone()
        }
    }

    fn checked_resample(&mut self, size: Size) -> MaskframeResult<()> {
        self.resample(size.check_gif_limit()?);
        Ok(())
    }

    fn resample(&mut self, size: Size) {
        self.resized = imageops::resize(&self.original, size.width, size.height, RESAMPLE_FILTER);
        self.height_scale = f64::from(size.height) / f64::from(self.original.height().max(1));
    }
}

fn clamp_dim(v: f64) -> u32 {
    v.trunc().clamp(0.0, f64::from(u32::MAX)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask(w: u32, h: u32) -> MaskState {
        MaskState::new(RgbaImage::from_pixel(w, h, image::Rgba([255, 0, 0, 255])))
    }

    #[test]
    fn stretch_keeps_width_and_tracks_scale() {
        let mut m = mask(10, 20);
        m.stretch_by(10).unwrap();
        assert_eq!(m.size(), Size::at_least_one(10, 30));
        assert!((m.height_scale() - 1.5).abs() < 1e-9);

        m.stretch_by(-1000).unwrap();
        assert_eq!(m.size().height, 1);
    }

    #[test]
    fn rescale_to_width_preserves_stretch() {
        let mut m = mask(10, 20);
        m.stretch_by(20).unwrap(); // 10x40, stretch 2.0
        m.rescale_to_width(5).unwrap();
        assert_eq!(m.size(), Size::at_least_one(5, 20));
        assert!((m.stretch_factor() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn reset_to_width_reapplies_height_scale() {
        let mut m = mask(10, 20);
        m.stretch_by(10).unwrap(); // scale 1.5
        m.fit_to(Size::at_least_one(40, 40));
        m.stretch_by(-10).unwrap();
        let scale = m.height_scale();
        m.reset_to_width(8);
        assert_eq!(m.size().width, 8);
        assert_eq!(m.size().height, (20.0 * scale) as u32);
        assert!((m.height_scale() - scale).abs() < 1e-9);
    }

    #[test]
    fn oversized_stretch_is_rejected_without_resampling() {
        let mut m = mask(10, 6);
        assert!(m.stretch_by(4_000_000_000).is_err());
        assert!(m.stretch_by(i64::MAX).is_err());
        assert_eq!(m.size(), Size::at_least_one(10, 6));

        m.stretch_by(i64::from(MAX_GIF_DIM) - 6).unwrap();
        assert_eq!(m.size().height, MAX_GIF_DIM);
        assert!(m.rescale_to_width(20).is_err());
        assert_eq!(m.size().height, MAX_GIF_DIM);
    }

    #[test]
    fn scale_from_rejects_huge_targets() {
        let mut m = mask(10, 10);
        assert!(m.scale_from(Size::at_least_one(10, 10), 1e9, 1.0).is_err());
        assert_eq!(m.size(), Size::at_least_one(10, 10));
    }

    #[test]
    fn scale_from_truncates_and_clamps() {
        let mut m = mask(10, 10);
        m.scale_from(Size::at_least_one(10, 10), 1.55, 0.01).unwrap();
        assert_eq!(m.size(), Size::at_least_one(15, 1));
    }

    #[test]
    fn prepared_mask_matches_frame_width_and_flips() {
        let mut img = RgbaImage::new(4, 2);
        img.put_pixel(0, 0, image::Rgba([0, 0, 255, 255]));
        let m = MaskState::new(img);

        let plain = m.prepared_for(4, false);
        assert_eq!(plain.dimensions(), (4, 2));
        assert_eq!(plain.get_pixel(0, 0).0[3], 255);

        let flipped = m.prepared_for(4, true);
        assert_eq!(flipped.get_pixel(3, 0).0[3], 255);

        let wide = m.prepared_for(8, false);
        assert_eq!(wide.dimensions(), (8, 4));
    }

    #[test]
    fn preview_mask_is_unscaled() {
        let m = mask(3, 7);
        assert_eq!(m.preview_mask(true).dimensions(), (3, 7));
    }
}
