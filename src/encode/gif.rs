//! Animated GIF encoding.
//!
//! Unlike the video path there is no incremental readiness signal here;
//! writes are synchronous and the result is known only once the trailer is
//! flushed. The ordering contract still applies.

use std::fs::File;
use std::io::{BufWriter, Write as _};
use std::path::PathBuf;

use crate::buffer::pool::PixelBuffer;
use crate::encode::ffmpeg::ensure_parent_dir;
use crate::encode::sink::{FrameSink, SinkConfig, SinkGuard, WriterState};
use crate::foundation::core::{FrameDelay, FrameIndex};
use crate::foundation::error::{MorphogramError, MorphogramResult};

/// Options for [`GifSink`] output.
#[derive(Clone, Debug)]
pub struct GifSinkOpts {
    /// Output GIF file path.
    pub out_path: PathBuf,
    /// Overwrite the output file if it already exists.
    pub overwrite: bool,
    /// Display delay applied to every frame.
    pub frame_delay: FrameDelay,
    /// Number of animation loops; 0 loops forever.
    pub loop_count: u16,
}

impl GifSinkOpts {
    /// Create options for an infinitely looping GIF at `out_path`.
    pub fn new(out_path: impl Into<PathBuf>, frame_delay: FrameDelay) -> Self {
        Self {
            out_path: out_path.into(),
            overwrite: true,
            frame_delay,
            loop_count: 0,
        }
    }
}

/// Multi-frame GIF writer with a fixed per-frame delay.
pub struct GifSink {
    opts: GifSinkOpts,
    guard: SinkGuard,
    encoder: Option<gif::Encoder<BufWriter<File>>>,
    cfg: Option<SinkConfig>,
}

impl GifSink {
    /// Create a new GIF sink.
    pub fn new(opts: GifSinkOpts) -> Self {
        Self {
            opts,
            guard: SinkGuard::new(),
            encoder: None,
            cfg: None,
        }
    }
}

impl FrameSink for GifSink {
    fn begin(&mut self, cfg: SinkConfig) -> MorphogramResult<()> {
        self.guard.check_begin()?;
        if cfg.width == 0 || cfg.height == 0 {
            return Err(MorphogramError::validation(
                "gif sink width/height must be non-zero",
            ));
        }
        if cfg.width > u32::from(u16::MAX) || cfg.height > u32::from(u16::MAX) {
            return Err(MorphogramError::validation(
                "gif dimensions must fit in 16 bits",
            ));
        }

        ensure_parent_dir(&self.opts.out_path)?;
        if !self.opts.overwrite && self.opts.out_path.exists() {
            return Err(MorphogramError::encoder_open(format!(
                "output file '{}' already exists",
                self.opts.out_path.display()
            )));
        }

        let file = File::create(&self.opts.out_path).map_err(|e| {
            MorphogramError::encoder_open(format!(
                "failed to create '{}': {e}",
                self.opts.out_path.display()
            ))
        })?;
        let mut encoder =
            gif::Encoder::new(BufWriter::new(file), cfg.width as u16, cfg.height as u16, &[])
                .map_err(|e| MorphogramError::encoder_open(format!("gif header write failed: {e}")))?;

        let repeat = if self.opts.loop_count == 0 {
            gif::Repeat::Infinite
        } else {
            gif::Repeat::Finite(self.opts.loop_count)
        };
        encoder
            .set_repeat(repeat)
            .map_err(|e| MorphogramError::encoder_open(format!("gif loop extension failed: {e}")))?;

        tracing::debug!(out = %self.opts.out_path.display(), "gif sink started");
        self.encoder = Some(encoder);
        self.cfg = Some(cfg);
        self.guard.state = WriterState::Writing;
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, buffer: &PixelBuffer) -> MorphogramResult<()> {
        self.guard.check_push(idx)?;
        let cfg = self
            .cfg
            .as_ref()
            .ok_or_else(|| MorphogramError::encoding("gif sink not started"))?;
        if buffer.width != cfg.width || buffer.height != cfg.height {
            return Err(MorphogramError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                buffer.width, buffer.height, cfg.width, cfg.height
            )));
        }

        let encoder = self
            .encoder
            .as_mut()
            .ok_or_else(|| MorphogramError::encoding("gif sink not started"))?;

        // Per-frame local palette; quantization mutates its input buffer.
        let mut rgba = buffer.data.clone();
        let mut frame =
            gif::Frame::from_rgba_speed(cfg.width as u16, cfg.height as u16, &mut rgba, 10);
        frame.delay = self.opts.frame_delay.as_centis();
        if let Err(e) = encoder.write_frame(&frame) {
            self.guard.state = WriterState::Failed;
            return Err(MorphogramError::encoding(format!(
                "gif frame write failed: {e}"
            )));
        }
        Ok(())
    }

    fn end(&mut self) -> MorphogramResult<()> {
        self.guard.check_end()?;
        let encoder = self
            .encoder
            .take()
            .ok_or_else(|| MorphogramError::encoding("gif sink not started"))?;

        // Writes the trailer and hands the writer back for the final flush.
        let mut writer = encoder.into_inner().map_err(|e| {
            self.guard.state = WriterState::Failed;
            MorphogramError::finalize(format!("gif trailer write failed: {e}"))
        })?;
        writer.flush().map_err(|e| {
            self.guard.state = WriterState::Failed;
            MorphogramError::finalize(format!("gif flush failed: {e}"))
        })?;

        tracing::debug!(out = %self.opts.out_path.display(), "gif sink finished");
        self.guard.state = WriterState::Finished;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::core::Fps;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "morphogram_{name}_{}_{}.gif",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ))
    }

    fn cfg(width: u32, height: u32) -> SinkConfig {
        SinkConfig {
            width,
            height,
            fps: Fps::new(2, 1).unwrap(),
        }
    }

    fn buffer(width: u32, height: u32, fill: u8) -> PixelBuffer {
        PixelBuffer {
            width,
            height,
            data: vec![fill; (width * height * 4) as usize],
        }
    }

    #[test]
    fn writes_a_decodable_gif_with_delay_and_infinite_loop() {
        let path = temp_path("sink_roundtrip");
        let delay = FrameDelay::from_secs(0.5).unwrap();
        let mut sink = GifSink::new(GifSinkOpts::new(&path, delay));

        sink.begin(cfg(4, 4)).unwrap();
        for i in 0..3u64 {
            sink.push_frame(FrameIndex(i), &buffer(4, 4, (i * 40) as u8))
                .unwrap();
        }
        sink.end().unwrap();

        let mut options = gif::DecodeOptions::new();
        options.set_color_output(gif::ColorOutput::RGBA);
        let mut decoder = options.read_info(File::open(&path).unwrap()).unwrap();
        assert_eq!(decoder.repeat(), gif::Repeat::Infinite);
        let mut count = 0;
        while let Some(frame) = decoder.read_next_frame().unwrap() {
            assert_eq!(frame.delay, 50);
            count += 1;
        }
        assert_eq!(count, 3);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn out_of_order_frames_are_rejected() {
        let path = temp_path("sink_order");
        let delay = FrameDelay::from_secs(0.1).unwrap();
        let mut sink = GifSink::new(GifSinkOpts::new(&path, delay));
        sink.begin(cfg(2, 2)).unwrap();
        sink.push_frame(FrameIndex(1), &buffer(2, 2, 0)).unwrap();
        assert!(sink.push_frame(FrameIndex(1), &buffer(2, 2, 0)).is_err());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn oversized_dimensions_are_rejected() {
        let path = temp_path("sink_dims");
        let delay = FrameDelay::from_secs(0.1).unwrap();
        let mut sink = GifSink::new(GifSinkOpts::new(&path, delay));
        assert!(sink.begin(cfg(1 << 17, 2)).is_err());
    }
}
