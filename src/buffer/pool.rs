//! Size-keyed pixel buffer pool bridging composited frames to the encoders.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::foundation::core::Canvas;
use crate::foundation::error::{MorphogramError, MorphogramResult};
use crate::overlay::compose::ComposedFrame;

/// Raw frame bytes in the tightly packed RGBA8 layout the encoders consume.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelBuffer {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// RGBA8 bytes, row-major.
    pub data: Vec<u8>,
}

/// Pool configuration.
#[derive(Debug, Clone, Copy)]
pub struct PixelBufferPoolOpts {
    /// Maximum bytes retained across all templates. Requests that would push
    /// the pool past this cap fail with an allocation error.
    pub max_template_bytes: usize,
}

impl Default for PixelBufferPoolOpts {
    fn default() -> Self {
        Self {
            max_template_bytes: 256 * 1024 * 1024,
        }
    }
}

/// Counters exposed for cache-behavior verification.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Template buffers allocated (one per distinct size seen).
    pub template_allocs: u64,
    /// Requests satisfied from an existing template.
    pub hits: u64,
    /// Bytes currently retained by templates.
    pub retained_bytes: usize,
}

#[derive(Default)]
struct PoolInner {
    templates: HashMap<(u32, u32), Vec<u8>>,
    stats: PoolStats,
}

/// Bridges composited frames into encoder-ready [`PixelBuffer`]s.
///
/// Holds at most one template buffer per distinct size, so retained memory is
/// bounded by the number of distinct sizes requested, never by frame count.
/// Callers always receive a private copy; a template is never handed out
/// directly, since the encoder may still be reading a previously returned
/// buffer while the next frame is being prepared.
pub struct PixelBufferPool {
    opts: PixelBufferPoolOpts,
    inner: Mutex<PoolInner>,
}

impl Default for PixelBufferPool {
    fn default() -> Self {
        Self::new(PixelBufferPoolOpts::default())
    }
}

impl PixelBufferPool {
    /// Create a pool with the given caps.
    pub fn new(opts: PixelBufferPoolOpts) -> Self {
        Self {
            opts,
            inner: Mutex::new(PoolInner::default()),
        }
    }

    /// Snapshot of the pool counters.
    pub fn stats(&self) -> PoolStats {
        self.lock().stats
    }

    /// Convert a composited frame into an encoder-ready buffer.
    ///
    /// The frame must already match `canvas` size; compositing is responsible
    /// for scaling. Fails with an allocation error when a new template would
    /// exceed the pool cap, in which case the whole job must abort.
    pub fn to_pixel_buffer(
        &self,
        frame: &ComposedFrame,
        canvas: Canvas,
    ) -> MorphogramResult<PixelBuffer> {
        if frame.width != canvas.width || frame.height != canvas.height {
            return Err(MorphogramError::validation(format!(
                "composed frame size {}x{} does not match canvas {}x{}",
                frame.width, frame.height, canvas.width, canvas.height
            )));
        }
        let byte_len = canvas
            .rgba8_len()
            .ok_or_else(|| MorphogramError::allocation("pixel buffer byte size overflow"))?;
        if frame.rgba8.len() != byte_len {
            return Err(MorphogramError::validation(
                "composed frame data length must equal width*height*4",
            ));
        }

        let mut data = {
            let mut inner = self.lock();
            let key = (canvas.width, canvas.height);
            if let Some(template) = inner.templates.get(&key) {
                let template = template.clone();
                inner.stats.hits += 1;
                tracing::debug!(width = canvas.width, height = canvas.height, "pool hit");
                template
            } else {
                let retained = inner.stats.retained_bytes;
                if retained.saturating_add(byte_len) > self.opts.max_template_bytes {
                    return Err(MorphogramError::allocation(format!(
                        "pixel buffer pool exhausted: {byte_len} bytes for {}x{} would exceed cap",
                        canvas.width, canvas.height
                    )));
                }
                let template = vec![0u8; byte_len];
                inner.templates.insert(key, template.clone());
                inner.stats.template_allocs += 1;
                inner.stats.retained_bytes += byte_len;
                template
            }
        };

        // Render into the private copy only; the template never carries
        // frame content that another consumer could observe mid-flight.
        data.copy_from_slice(&frame.rgba8);
        Ok(PixelBuffer {
            width: canvas.width,
            height: canvas.height,
            data,
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PoolInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn composed(width: u32, height: u32, fill: u8) -> ComposedFrame {
        ComposedFrame {
            width,
            height,
            rgba8: vec![fill; (width * height * 4) as usize],
        }
    }

    #[test]
    fn same_size_twice_hits_template_without_reallocating() {
        let pool = PixelBufferPool::default();
        let canvas = Canvas::new(8, 8).unwrap();

        pool.to_pixel_buffer(&composed(8, 8, 1), canvas).unwrap();
        pool.to_pixel_buffer(&composed(8, 8, 2), canvas).unwrap();

        let stats = pool.stats();
        assert_eq!(stats.template_allocs, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.retained_bytes, 8 * 8 * 4);
    }

    #[test]
    fn buffers_are_independent_copies() {
        let pool = PixelBufferPool::default();
        let canvas = Canvas::new(4, 4).unwrap();

        let a = pool.to_pixel_buffer(&composed(4, 4, 7), canvas).unwrap();
        let mut b = pool.to_pixel_buffer(&composed(4, 4, 7), canvas).unwrap();
        assert_eq!(a.data, b.data);

        b.data[0] = 99;
        assert_eq!(a.data[0], 7);
        // The template is also unaffected: a third request still renders
        // correct content.
        let c = pool.to_pixel_buffer(&composed(4, 4, 7), canvas).unwrap();
        assert_eq!(c.data[0], 7);
    }

    #[test]
    fn one_template_per_distinct_size() {
        let pool = PixelBufferPool::default();
        for _ in 0..3 {
            let canvas = Canvas::new(4, 4).unwrap();
            pool.to_pixel_buffer(&composed(4, 4, 0), canvas).unwrap();
            let canvas = Canvas::new(8, 2).unwrap();
            pool.to_pixel_buffer(&composed(8, 2, 0), canvas).unwrap();
        }
        assert_eq!(pool.stats().template_allocs, 2);
    }

    #[test]
    fn exhausted_pool_is_an_allocation_error() {
        let pool = PixelBufferPool::new(PixelBufferPoolOpts {
            max_template_bytes: 16,
        });
        let canvas = Canvas::new(4, 4).unwrap();
        match pool.to_pixel_buffer(&composed(4, 4, 0), canvas) {
            Err(MorphogramError::Allocation(_)) => {}
            other => panic!("expected allocation error, got {other:?}"),
        }
        assert_eq!(pool.stats().template_allocs, 0);
    }

    #[test]
    fn size_mismatch_is_rejected() {
        let pool = PixelBufferPool::default();
        let canvas = Canvas::new(8, 8).unwrap();
        assert!(pool.to_pixel_buffer(&composed(4, 4, 0), canvas).is_err());
    }
}
