//! maskframe composites a mask image onto every frame of an animated image (or a frame sequence
//! sampled from a video) and re-exports the result as a looping GIF.
//!
//! # Pipeline overview
//!
//! 1. **Decode**: GIF/APNG/still images through `image`, videos through the system `ffmpeg`
//!    (feature `media-ffmpeg`). Every frame becomes straight RGBA8.
//! 2. **Size**: frames and mask are resampled with Lanczos3, always from the decoded originals.
//! 3. **Composite**: the mask is scaled to the frame width, optionally mirrored, and either
//!    alpha-pasted ([`CompositeMode::Overlay`]) or used to punch transparency
//!    ([`CompositeMode::Cutout`]) at the frame origin.
//! 4. **Encode**: frames are quantised and written as an infinitely looping GIF.
//!
//! [`Session`] exposes the same steps as individual editing actions; [`run_job`] drives a session
//! from a JSON [`Job`].
#![forbid(unsafe_code)]

mod assets;
mod composite;
mod encode_gif;
mod foundation;
mod job;
mod mask;
mod sequence;
mod session;

pub use assets::decode::{DecodedCanvas, SourceFrame, SourceKind, load_frames, load_mask};
pub use assets::media::{
    VideoSourceInfo, is_ffmpeg_on_path, probe_video, sample_video_frames, split_rgba_frames,
};
pub use composite::{apply_to_frames, composite, cut_out, erase, paste, paste_over};
pub use encode_gif::{
    GifExportConfig, GifWriter, Timing, encode_gif, ensure_parent_dir, write_gif,
};
pub use foundation::core::{
    CompositeMode, DEFAULT_DELAY_MS, DEFAULT_VIDEO_FPS, FrameDelay, MAX_DELAY_MS, MAX_GIF_DIM,
    MAX_VIDEO_FPS, MIN_DELAY_MS, MIN_VIDEO_FPS, PREVIEW_MAX, RESAMPLE_FILTER, SampleRate, Size,
};
pub use foundation::error::{MaskframeError, MaskframeResult};
pub use job::{Job, JobReport, run_job};
pub use mask::MaskState;
pub use sequence::{FrameSequence, drag_target, fit_within};
pub use session::{Canvas, PlaybackTick, Session, Settings};
