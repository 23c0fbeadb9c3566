//! Media encoding sinks.
//!
//! Sinks consume composited frames in strict timeline order and finalize to a
//! container file. The video path streams into a spawned `ffmpeg`; the GIF
//! path writes the container directly.

pub mod ffmpeg;
pub mod gif;
pub mod sink;
