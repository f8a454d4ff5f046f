use std::collections::BTreeMap;

use image::RgbaImage;
use rayon::prelude::*;

use crate::{
    foundation::{
        core::CompositeMode,
        error::{MaskframeError, MaskframeResult},
    },
    mask::MaskState,
};

pub type StraightRgba8 = [u8; 4];

/// Blend `src` onto `dst` using `src` alpha as coverage, on all four channels.
pub fn paste(dst: StraightRgba8, src: StraightRgba8) -> StraightRgba8 {
    let a = u16::from(src[3]);
    if a == 0 {
        return dst;
    }
    if a == 255 {
        return src;
    }
    let inv = 255 - a;
    let mut out = [0u8; 4];
    for i in 0..4 {
        let sc = mul_div255(u16::from(src[i]), a);
        let dc = mul_div255(u16::from(dst[i]), inv);
        out[i] = sc.saturating_add(dc);
    }
    out
}

/// Fade `dst` towards fully transparent by `coverage`.
pub fn erase(dst: StraightRgba8, coverage: u8) -> StraightRgba8 {
    let inv = 255 - u16::from(coverage);
    [
        mul_div255(u16::from(dst[0]), inv),
        mul_div255(u16::from(dst[1]), inv),
        mul_div255(u16::from(dst[2]), inv),
        mul_div255(u16::from(dst[3]), inv),
    ]
}

/// Alpha-paste `mask` onto `frame` at the origin, clipped to the frame.
pub fn paste_over(frame: &mut RgbaImage, mask: &RgbaImage) {
    let w = frame.width().min(mask.width());
    let h = frame.height().min(mask.height());
    for y in 0..h {
        for x in 0..w {
            let src = mask.get_pixel(x, y).0;
            let dst = frame.get_pixel_mut(x, y);
            dst.0 = paste(dst.0, src);
        }
    }
}

/// Punch transparent holes into `frame` wherever `mask` has alpha.
pub fn cut_out(frame: &mut RgbaImage, mask: &RgbaImage) {
    let w = frame.width().min(mask.width());
    let h = frame.height().min(mask.height());
    for y in 0..h {
        for x in 0..w {
            let coverage = mask.get_pixel(x, y).0[3];
            if coverage == 0 {
                continue;
            }
            let dst = frame.get_pixel_mut(x, y);
            dst.0 = erase(dst.0, coverage);
        }
    }
}

pub fn composite(frame: &mut RgbaImage, mask: &RgbaImage, mode: CompositeMode) {
    match mode {
        CompositeMode::Overlay => paste_over(frame, mask),
        CompositeMode::Cutout => cut_out(frame, mask),
    }
}

/// Composite the mask onto every frame, resizing it to each frame's width first.
#[tracing::instrument(skip(frames, mask), fields(count = frames.len()))]
pub fn apply_to_frames(
    frames: &mut [RgbaImage],
    mask: &MaskState,
    mode: CompositeMode,
    flip: bool,
) -> MaskframeResult<()> {
    if frames.is_empty() {
        return Err(MaskframeError::validation("no frames to composite onto"));
    }

    let mut prepared = BTreeMap::<u32, RgbaImage>::new();
    for frame in frames.iter() {
        prepared
            .entry(frame.width())
            .or_insert_with(|| mask.prepared_for(frame.width(), flip));
    }

    frames.par_iter_mut().for_each(|frame| {
        if let Some(m) = prepared.get(&frame.width()) {
            composite(frame, m, mode);
        }
    });

    tracing::debug!(widths = prepared.len(), "composited frames");
    Ok(())
}

fn mul_div255(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}
