//! Morphogram is a frame-sequence compositing engine for time-lapse photo
//! journals.
//!
//! An ordered sequence of still images is composited with a low-opacity text
//! watermark and encoded into a single exportable artifact: an H.264 MP4 (via
//! the system `ffmpeg`) or an animated GIF. The pipeline is:
//!
//! 1. [`FrameStore`] supplies decoded frames by file name
//! 2. [`compose`] cover-scales each frame onto the job canvas and stamps the
//!    watermark
//! 3. [`PixelBufferPool`] bridges composited frames into encoder-ready
//!    buffers
//! 4. A [`FrameSink`] ([`FfmpegSink`] or [`GifSink`]) consumes buffers in
//!    strict presentation order and finalizes the container
//!
//! [`Animator`] coordinates the whole job and reports one terminal outcome.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod assets;
pub mod buffer;
pub mod encode;
mod foundation;
pub mod overlay;
pub mod session;

pub use crate::foundation::core::{Canvas, Fps, FrameDelay, FrameIndex};
pub use crate::foundation::error::{MorphogramError, MorphogramResult};

pub use crate::assets::store::{Frame, FrameStore, decode_frame};
pub use crate::buffer::pool::{PixelBuffer, PixelBufferPool, PixelBufferPoolOpts, PoolStats};
pub use crate::encode::ffmpeg::{FfmpegSink, FfmpegSinkOpts, is_ffmpeg_on_path};
pub use crate::encode::gif::{GifSink, GifSinkOpts};
pub use crate::encode::sink::{FrameSink, InMemorySink, SinkConfig, WriterState};
pub use crate::overlay::compose::{ComposedFrame, compose};
pub use crate::overlay::text::{AlphaMask, FontdueRaster, TextRaster};
pub use crate::overlay::{
    FONT_SCALE_RATIO, WATERMARK_OPACITY, WATERMARK_TEXT, WatermarkPolicy, WatermarkPosition,
    WatermarkSpec,
};
pub use crate::session::animator::{
    AnimationJob, Animator, CancelToken, ComposeThreading, JobHandle, JobStats, OutputFormat,
};
