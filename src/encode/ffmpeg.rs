//! MP4 encoding through a spawned `ffmpeg` process.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

use crate::buffer::pool::PixelBuffer;
use crate::encode::sink::{FrameSink, SinkConfig, SinkGuard, WriterState};
use crate::foundation::core::FrameIndex;
use crate::foundation::error::{MorphogramError, MorphogramResult};

/// Options for [`FfmpegSink`] MP4 output.
#[derive(Clone, Debug)]
pub struct FfmpegSinkOpts {
    /// Output MP4 file path.
    pub out_path: PathBuf,
    /// Overwrite the output file if it already exists.
    pub overwrite: bool,
}

impl FfmpegSinkOpts {
    /// Create options for outputting an MP4 to `out_path`.
    pub fn new(out_path: impl Into<PathBuf>) -> Self {
        Self {
            out_path: out_path.into(),
            overwrite: true,
        }
    }
}

/// Sequential MP4 writer that streams raw RGBA frames into `ffmpeg`.
///
/// The encoder consumes frames strictly in order; `push_frame` blocks on pipe
/// backpressure until `ffmpeg` is ready for more data. Presentation time for
/// frame `i` is `i / fps`, established by the rawvideo input rate.
pub struct FfmpegSink {
    opts: FfmpegSinkOpts,
    guard: SinkGuard,

    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr_drain: Option<std::thread::JoinHandle<std::io::Result<Vec<u8>>>>,
    cfg: Option<SinkConfig>,
}

impl FfmpegSink {
    /// Create a new sink that streams into `ffmpeg`.
    pub fn new(opts: FfmpegSinkOpts) -> Self {
        Self {
            opts,
            guard: SinkGuard::new(),
            child: None,
            stdin: None,
            stderr_drain: None,
            cfg: None,
        }
    }
}

impl FrameSink for FfmpegSink {
    fn begin(&mut self, cfg: SinkConfig) -> MorphogramResult<()> {
        self.guard.check_begin()?;
        if cfg.width == 0 || cfg.height == 0 {
            return Err(MorphogramError::validation(
                "ffmpeg sink width/height must be non-zero",
            ));
        }
        if !cfg.width.is_multiple_of(2) || !cfg.height.is_multiple_of(2) {
            return Err(MorphogramError::validation(
                "ffmpeg sink width/height must be even (required for yuv420p mp4 output)",
            ));
        }

        ensure_parent_dir(&self.opts.out_path)?;
        if !self.opts.overwrite && self.opts.out_path.exists() {
            return Err(MorphogramError::encoder_open(format!(
                "output file '{}' already exists",
                self.opts.out_path.display()
            )));
        }
        if !is_ffmpeg_on_path() {
            return Err(MorphogramError::encoder_open(
                "ffmpeg is required for MP4 encoding, but was not found on PATH",
            ));
        }

        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        cmd.arg(if self.opts.overwrite { "-y" } else { "-n" });
        cmd.args([
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-s",
            &format!("{}x{}", cfg.width, cfg.height),
            // Input rate before -i: frame i lands at i/fps in the container.
            "-r",
            &format!("{}/{}", cfg.fps.num, cfg.fps.den),
            "-i",
            "pipe:0",
            "-an",
            "-c:v",
            "libx264",
            "-pix_fmt",
            "yuv420p",
            "-movflags",
            "+faststart",
        ]);
        cmd.arg(&self.opts.out_path);

        let mut child = cmd.spawn().map_err(|e| {
            MorphogramError::encoder_open(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| MorphogramError::encoder_open("failed to open ffmpeg stdin"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| MorphogramError::encoder_open("failed to open ffmpeg stderr"))?;
        let stderr_drain = std::thread::spawn(move || {
            let mut stderr_bytes = Vec::new();
            stderr.read_to_end(&mut stderr_bytes)?;
            Ok(stderr_bytes)
        });

        tracing::debug!(out = %self.opts.out_path.display(), "ffmpeg sink started");
        self.child = Some(child);
        self.stdin = Some(stdin);
        self.stderr_drain = Some(stderr_drain);
        self.cfg = Some(cfg);
        self.guard.state = WriterState::Writing;
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, buffer: &PixelBuffer) -> MorphogramResult<()> {
        self.guard.check_push(idx)?;
        let cfg = self
            .cfg
            .as_ref()
            .ok_or_else(|| MorphogramError::encoding("ffmpeg sink not started"))?;
        if buffer.width != cfg.width || buffer.height != cfg.height {
            return Err(MorphogramError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                buffer.width, buffer.height, cfg.width, cfg.height
            )));
        }
        if buffer.data.len() != (cfg.width as usize) * (cfg.height as usize) * 4 {
            return Err(MorphogramError::validation(
                "buffer.data size mismatch with width*height*4",
            ));
        }

        // A dead encoder would otherwise manifest as a broken-pipe hang or a
        // confusing write error; surface its exit status instead.
        if let Some(child) = self.child.as_mut()
            && let Ok(Some(status)) = child.try_wait()
        {
            self.guard.state = WriterState::Failed;
            return Err(MorphogramError::encoding(format!(
                "ffmpeg exited early with status {status}"
            )));
        }

        let Some(stdin) = self.stdin.as_mut() else {
            self.guard.state = WriterState::Failed;
            return Err(MorphogramError::encoding("ffmpeg stdin is closed"));
        };

        use std::io::Write as _;
        if let Err(e) = stdin.write_all(&buffer.data) {
            self.guard.state = WriterState::Failed;
            return Err(MorphogramError::encoding(format!(
                "failed to write frame to ffmpeg stdin: {e}"
            )));
        }
        Ok(())
    }

    fn end(&mut self) -> MorphogramResult<()> {
        self.guard.check_end()?;
        drop(self.stdin.take());
        let mut child = self
            .child
            .take()
            .ok_or_else(|| MorphogramError::encoding("ffmpeg sink not started"))?;

        let status = child.wait().map_err(|e| {
            self.guard.state = WriterState::Failed;
            MorphogramError::finalize(format!("failed to wait for ffmpeg to finish: {e}"))
        })?;
        let stderr_bytes = match self.stderr_drain.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| MorphogramError::finalize("ffmpeg stderr drain thread panicked"))?
                .map_err(|e| MorphogramError::finalize(format!("ffmpeg stderr read failed: {e}")))?,
            None => Vec::new(),
        };

        if !status.success() {
            self.guard.state = WriterState::Failed;
            let stderr = String::from_utf8_lossy(&stderr_bytes);
            return Err(MorphogramError::finalize(format!(
                "ffmpeg exited with status {}: {}",
                status,
                stderr.trim()
            )));
        }

        tracing::debug!(out = %self.opts.out_path.display(), "ffmpeg sink finished");
        self.guard.state = WriterState::Finished;
        Ok(())
    }
}

/// Ensure the parent directory of `path` exists.
pub fn ensure_parent_dir(path: &Path) -> MorphogramResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| {
            MorphogramError::io(format!(
                "failed to create output directory '{}': {e}",
                parent.display()
            ))
        })?;
    }
    Ok(())
}

/// Return `true` when `ffmpeg` can be invoked from `PATH`.
pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::core::Fps;

    #[test]
    fn odd_dimensions_are_rejected_before_spawning() {
        let mut sink = FfmpegSink::new(FfmpegSinkOpts::new("/nonexistent/out.mp4"));
        let cfg = SinkConfig {
            width: 3,
            height: 2,
            fps: Fps::new(10, 1).unwrap(),
        };
        match sink.begin(cfg) {
            Err(MorphogramError::Validation(_)) => {}
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn push_without_begin_is_an_encoding_error() {
        let mut sink = FfmpegSink::new(FfmpegSinkOpts::new("out.mp4"));
        let buffer = PixelBuffer {
            width: 2,
            height: 2,
            data: vec![0; 16],
        };
        assert!(sink.push_frame(FrameIndex(0), &buffer).is_err());
    }
}
