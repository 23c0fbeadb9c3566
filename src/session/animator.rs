//! The animation orchestrator: frames in, one media file out.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;

use crate::assets::store::Frame;
use crate::buffer::pool::PixelBufferPool;
use crate::encode::ffmpeg::{FfmpegSink, FfmpegSinkOpts};
use crate::encode::gif::{GifSink, GifSinkOpts};
use crate::encode::sink::{FrameSink, SinkConfig};
use crate::foundation::core::{Canvas, FrameDelay, FrameIndex, Fps};
use crate::foundation::error::{MorphogramError, MorphogramResult};
use crate::overlay::compose::{ComposedFrame, compose};
use crate::overlay::text::TextRaster;
use crate::overlay::{WatermarkPolicy, WatermarkSpec};

/// Output container formats.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum OutputFormat {
    /// H.264 MP4 at a fixed frame rate.
    Mp4 {
        /// Output frame rate.
        fps: Fps,
    },
    /// Animated GIF with a fixed per-frame delay.
    Gif {
        /// Display delay applied to every frame.
        frame_delay: FrameDelay,
        /// Number of animation loops; 0 loops forever.
        loop_count: u16,
    },
}

impl OutputFormat {
    fn extension(self) -> &'static str {
        match self {
            OutputFormat::Mp4 { .. } => "mp4",
            OutputFormat::Gif { .. } => "gif",
        }
    }

    fn watermark_policy(self) -> WatermarkPolicy {
        match self {
            OutputFormat::Mp4 { .. } => WatermarkPolicy::VIDEO,
            OutputFormat::Gif { .. } => WatermarkPolicy::GIF,
        }
    }

    /// Effective frame rate: the GIF time base is centiseconds, so the rate
    /// is exact for any representable delay.
    fn fps(self) -> Fps {
        match self {
            OutputFormat::Mp4 { fps } => fps,
            OutputFormat::Gif { frame_delay, .. } => Fps {
                num: 100,
                den: u32::from(frame_delay.as_centis()),
            },
        }
    }
}

/// One export request: the transient state of a single animation job.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct AnimationJob {
    /// Owning project name; the output file is named after it.
    pub project: String,
    /// Output container and timing.
    pub format: OutputFormat,
    /// Watermark applied to every frame.
    pub watermark: WatermarkSpec,
    /// Overrides the process-scoped scratch directory when set.
    pub out_dir: Option<PathBuf>,
}

impl AnimationJob {
    /// Standard job for `project` with the default watermark.
    pub fn new(project: impl Into<String>, format: OutputFormat) -> Self {
        Self {
            project: project.into(),
            format,
            watermark: WatermarkSpec::default(),
            out_dir: None,
        }
    }

    fn output_path(&self) -> MorphogramResult<PathBuf> {
        if self.project.is_empty()
            || self.project.contains('/')
            || self.project.contains('\\')
            || self.project == "."
            || self.project == ".."
        {
            return Err(MorphogramError::validation(format!(
                "project name '{}' is not a valid file stem",
                self.project
            )));
        }
        let dir = match &self.out_dir {
            Some(dir) => dir.clone(),
            None => std::env::temp_dir().join("morphogram"),
        };
        std::fs::create_dir_all(&dir).map_err(|e| {
            MorphogramError::io(format!(
                "failed to create scratch directory '{}': {e}",
                dir.display()
            ))
        })?;
        Ok(dir.join(format!("{}.{}", self.project, self.format.extension())))
    }
}

/// Counters for one finished job.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct JobStats {
    /// Frames supplied to the job.
    pub frames_total: u64,
    /// Frames that reached the encoder.
    pub frames_encoded: u64,
    /// Frames dropped by the per-frame skip policy.
    pub frames_skipped: u64,
}

/// Threading and chunking controls for frame composition.
///
/// Composition may run in parallel; encoder appends never do.
#[derive(Clone, Debug)]
pub struct ComposeThreading {
    /// Enable parallel composition when `true`.
    pub parallel: bool,
    /// Chunk size in frames for batched scheduling.
    pub chunk_size: usize,
    /// Optional explicit worker thread count.
    pub threads: Option<usize>,
}

impl Default for ComposeThreading {
    fn default() -> Self {
        Self {
            parallel: false,
            chunk_size: 64,
            threads: None,
        }
    }
}

/// Cooperative cancellation flag shared with a running job.
///
/// Checked between chunks; an observed cancellation removes any partially
/// written output before the job reports [`MorphogramError::Canceled`].
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been requested.
    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Handle to a job running on a background thread.
pub struct JobHandle {
    cancel: CancelToken,
    thread: std::thread::JoinHandle<MorphogramResult<PathBuf>>,
}

impl JobHandle {
    /// Token for requesting cooperative cancellation.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Wait for the job's single terminal outcome.
    pub fn join(self) -> MorphogramResult<PathBuf> {
        self.thread
            .join()
            .map_err(|_| MorphogramError::encoding("animation job thread panicked"))?
    }
}

/// Top-level coordinator: composites each frame, bridges it into an
/// encoder-ready buffer and appends it to the output sink in strict order.
#[derive(Clone)]
pub struct Animator {
    pool: Arc<PixelBufferPool>,
    raster: Arc<dyn TextRaster>,
    threading: ComposeThreading,
}

impl Animator {
    /// Create an animator using `raster` for watermark text.
    pub fn new(raster: Arc<dyn TextRaster>) -> Self {
        Self {
            pool: Arc::new(PixelBufferPool::default()),
            raster,
            threading: ComposeThreading::default(),
        }
    }

    /// Share an explicit pixel buffer pool (e.g. across concurrent jobs).
    pub fn with_pool(mut self, pool: Arc<PixelBufferPool>) -> Self {
        self.pool = pool;
        self
    }

    /// Override composition threading.
    pub fn with_threading(mut self, threading: ComposeThreading) -> Self {
        self.threading = threading;
        self
    }

    /// Run `job` over `frames` and return the output file path.
    pub fn create(&self, frames: &[Frame], job: &AnimationJob) -> MorphogramResult<PathBuf> {
        self.create_with_cancel(frames, job, &CancelToken::default())
    }

    /// Like [`Animator::create`], observing `cancel` between chunks.
    pub fn create_with_cancel(
        &self,
        frames: &[Frame],
        job: &AnimationJob,
        cancel: &CancelToken,
    ) -> MorphogramResult<PathBuf> {
        if frames.is_empty() {
            return Err(MorphogramError::EmptyInput);
        }

        let out_path = job.output_path()?;
        // Stale output from an earlier export of the same project is cleared
        // up front so scratch space cannot grow across repeated exports.
        if out_path.exists() {
            std::fs::remove_file(&out_path).map_err(|e| {
                MorphogramError::io(format!(
                    "failed to remove stale output '{}': {e}",
                    out_path.display()
                ))
            })?;
        }

        let result = match job.format {
            OutputFormat::Mp4 { .. } => {
                let mut sink = FfmpegSink::new(FfmpegSinkOpts::new(&out_path));
                self.create_with_sink(frames, job, &mut sink, cancel)
            }
            OutputFormat::Gif {
                frame_delay,
                loop_count,
            } => {
                let mut opts = GifSinkOpts::new(&out_path, frame_delay);
                opts.loop_count = loop_count;
                let mut sink = GifSink::new(opts);
                self.create_with_sink(frames, job, &mut sink, cancel)
            }
        };

        match result {
            Ok(stats) => {
                tracing::info!(
                    project = %job.project,
                    out = %out_path.display(),
                    encoded = stats.frames_encoded,
                    skipped = stats.frames_skipped,
                    "animation job finished"
                );
                Ok(out_path)
            }
            Err(e) => {
                // No partial container may survive a failed or canceled job.
                std::fs::remove_file(&out_path).ok();
                Err(e)
            }
        }
    }

    /// Drive an explicit sink. This is the seam `create` is built on; tests
    /// use it to run the orchestrator against an in-memory sink.
    pub fn create_with_sink(
        &self,
        frames: &[Frame],
        job: &AnimationJob,
        sink: &mut dyn FrameSink,
        cancel: &CancelToken,
    ) -> MorphogramResult<JobStats> {
        if frames.is_empty() {
            return Err(MorphogramError::EmptyInput);
        }

        let canvas = self.job_canvas(&frames[0], job.format)?;
        sink.begin(SinkConfig {
            width: canvas.width,
            height: canvas.height,
            fps: job.format.fps(),
        })?;

        let policy = job.format.watermark_policy();
        let pool = self.build_thread_pool()?;
        let chunk_size = self.threading.chunk_size.max(1);

        let mut stats = JobStats::default();
        // Encoded indices stay dense: skipped frames must not leave gaps in
        // the presentation timeline.
        let mut encoded_idx = 0u64;

        for chunk in frames.chunks(chunk_size) {
            if cancel.is_canceled() {
                return Err(MorphogramError::Canceled);
            }

            let composed: Vec<MorphogramResult<ComposedFrame>> = match &pool {
                Some(pool) => pool.install(|| {
                    chunk
                        .par_iter()
                        .map(|frame| compose(frame, &job.watermark, policy, canvas, &*self.raster))
                        .collect()
                }),
                None => chunk
                    .iter()
                    .map(|frame| compose(frame, &job.watermark, policy, canvas, &*self.raster))
                    .collect(),
            };

            // Appends are strictly sequential regardless of how composition
            // was scheduled.
            for result in composed {
                if cancel.is_canceled() {
                    return Err(MorphogramError::Canceled);
                }
                stats.frames_total += 1;
                let frame_no = stats.frames_total - 1;
                let composed_frame = match result {
                    Ok(f) => f,
                    Err(e) => {
                        tracing::warn!(frame = frame_no, error = %e, "skipping frame: compose failed");
                        stats.frames_skipped += 1;
                        continue;
                    }
                };

                let buffer = match self.pool.to_pixel_buffer(&composed_frame, canvas) {
                    Ok(b) => b,
                    Err(e @ MorphogramError::Allocation(_)) => return Err(e),
                    Err(e) => {
                        tracing::warn!(frame = frame_no, error = %e, "skipping frame: buffer conversion failed");
                        stats.frames_skipped += 1;
                        continue;
                    }
                };

                sink.push_frame(FrameIndex(encoded_idx), &buffer)?;
                encoded_idx += 1;
                stats.frames_encoded += 1;
            }
        }

        sink.end()?;
        Ok(stats)
    }

    /// Run `job` on a background thread.
    pub fn spawn(&self, frames: Vec<Frame>, job: AnimationJob) -> JobHandle {
        let animator = self.clone();
        let cancel = CancelToken::default();
        let thread_cancel = cancel.clone();
        let thread = std::thread::spawn(move || {
            animator.create_with_cancel(&frames, &job, &thread_cancel)
        });
        JobHandle { cancel, thread }
    }

    /// Pool counters, exposed for diagnostics.
    pub fn pool_stats(&self) -> crate::buffer::pool::PoolStats {
        self.pool.stats()
    }

    /// Canvas size is fixed for the whole job and derived from the first
    /// frame; the MP4 path additionally rounds down to even dimensions.
    fn job_canvas(&self, first: &Frame, format: OutputFormat) -> MorphogramResult<Canvas> {
        let canvas = Canvas::new(first.width, first.height)?;
        match format {
            OutputFormat::Mp4 { .. } => canvas.rounded_to_even(),
            OutputFormat::Gif { .. } => Ok(canvas),
        }
    }

    fn build_thread_pool(&self) -> MorphogramResult<Option<rayon::ThreadPool>> {
        if !self.threading.parallel {
            return Ok(None);
        }
        if let Some(n) = self.threading.threads
            && n == 0
        {
            return Err(MorphogramError::validation(
                "compose threading 'threads' must be >= 1 when set",
            ));
        }

        let mut builder = rayon::ThreadPoolBuilder::new();
        if let Some(n) = self.threading.threads {
            builder = builder.num_threads(n);
        }
        builder.build().map(Some).map_err(|e| {
            MorphogramError::validation(format!("failed to build compose thread pool: {e}"))
        })
    }
}
