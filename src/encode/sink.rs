//! The frame sink contract shared by all encoders.

use crate::buffer::pool::PixelBuffer;
use crate::foundation::core::{Fps, FrameIndex};
use crate::foundation::error::{MorphogramError, MorphogramResult};

/// Configuration provided to a [`FrameSink`] before any frames are pushed.
#[derive(Debug, Clone, Copy)]
pub struct SinkConfig {
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Output frame rate; frame `i` is presented at `i / fps`.
    pub fps: Fps,
}

/// Lifecycle of an append-only media writer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriterState {
    /// Constructed, output not yet opened.
    Created,
    /// Output open, accepting frames.
    Writing,
    /// Finalized successfully.
    Finished,
    /// A frame append or finalization failed; the sink is unusable.
    Failed,
}

/// Sink contract for consuming frames in timeline order.
///
/// Ordering contract: `push_frame` is called with strictly increasing
/// [`FrameIndex`] values, and only between a successful `begin` and `end`.
/// Sinks fail fast on violations instead of producing a corrupt container.
pub trait FrameSink: Send {
    /// Open the output. Calling twice is a contract violation.
    fn begin(&mut self, cfg: SinkConfig) -> MorphogramResult<()>;
    /// Append one frame at presentation index `idx`.
    fn push_frame(&mut self, idx: FrameIndex, buffer: &PixelBuffer) -> MorphogramResult<()>;
    /// Finalize the container.
    fn end(&mut self) -> MorphogramResult<()>;
}

/// Shared state/ordering guard used by the concrete sinks.
#[derive(Debug)]
pub(crate) struct SinkGuard {
    pub(crate) state: WriterState,
    last_idx: Option<FrameIndex>,
}

impl SinkGuard {
    pub(crate) fn new() -> Self {
        Self {
            state: WriterState::Created,
            last_idx: None,
        }
    }

    pub(crate) fn check_begin(&self) -> MorphogramResult<()> {
        match self.state {
            WriterState::Created => Ok(()),
            _ => Err(MorphogramError::encoding("sink begin called twice")),
        }
    }

    pub(crate) fn check_push(&mut self, idx: FrameIndex) -> MorphogramResult<()> {
        if self.state != WriterState::Writing {
            return Err(MorphogramError::encoding(
                "push_frame is only valid between begin and end",
            ));
        }
        if let Some(last) = self.last_idx
            && idx <= last
        {
            return Err(MorphogramError::encoding(format!(
                "out-of-order frame: index {} after {}",
                idx.0, last.0
            )));
        }
        self.last_idx = Some(idx);
        Ok(())
    }

    pub(crate) fn check_end(&self) -> MorphogramResult<()> {
        if self.state != WriterState::Writing {
            return Err(MorphogramError::encoding("end called on a sink that is not writing"));
        }
        Ok(())
    }
}

/// In-memory sink for tests and debugging.
#[derive(Debug)]
pub struct InMemorySink {
    guard: SinkGuard,
    cfg: Option<SinkConfig>,
    frames: Vec<(FrameIndex, PixelBuffer)>,
}

impl Default for InMemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self {
            guard: SinkGuard::new(),
            cfg: None,
            frames: Vec::new(),
        }
    }

    /// Configuration captured in `begin`, if any.
    pub fn config(&self) -> Option<SinkConfig> {
        self.cfg
    }

    /// Frames captured so far, in push order.
    pub fn frames(&self) -> &[(FrameIndex, PixelBuffer)] {
        &self.frames
    }

    /// Current writer state.
    pub fn state(&self) -> WriterState {
        self.guard.state
    }
}

impl FrameSink for InMemorySink {
    fn begin(&mut self, cfg: SinkConfig) -> MorphogramResult<()> {
        self.guard.check_begin()?;
        self.cfg = Some(cfg);
        self.frames.clear();
        self.guard.state = WriterState::Writing;
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, buffer: &PixelBuffer) -> MorphogramResult<()> {
        self.guard.check_push(idx)?;
        self.frames.push((idx, buffer.clone()));
        Ok(())
    }

    fn end(&mut self) -> MorphogramResult<()> {
        self.guard.check_end()?;
        self.guard.state = WriterState::Finished;
        Ok(())
    }
}
