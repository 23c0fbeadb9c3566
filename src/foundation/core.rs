//! Timing and geometry value types shared across the pipeline.

use crate::foundation::error::{MorphogramError, MorphogramResult};

/// Absolute 0-based index of a frame in the output timeline.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct FrameIndex(pub u64);

/// Frames-per-second represented as a rational `num/den`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps {
    /// Numerator (frames).
    pub num: u32,
    /// Denominator (seconds), must be non-zero.
    pub den: u32,
}

impl Fps {
    /// Create a validated FPS value.
    pub fn new(num: u32, den: u32) -> MorphogramResult<Self> {
        if den == 0 {
            return Err(MorphogramError::validation("Fps den must be > 0"));
        }
        if num == 0 {
            return Err(MorphogramError::validation("Fps num must be > 0"));
        }
        Ok(Self { num, den })
    }

    /// Convert to floating-point FPS.
    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    /// Presentation timestamp of frame `idx` in seconds.
    ///
    /// Computed as `idx / fps`; strictly increasing in `idx`.
    pub fn frame_timestamp_secs(self, idx: FrameIndex) -> f64 {
        (idx.0 as f64) * f64::from(self.den) / f64::from(self.num)
    }

    /// Duration of one frame in seconds.
    pub fn frame_duration_secs(self) -> f64 {
        f64::from(self.den) / f64::from(self.num)
    }
}

/// Output canvas dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Canvas {
    /// Create a validated, non-empty canvas.
    pub fn new(width: u32, height: u32) -> MorphogramResult<Self> {
        if width == 0 || height == 0 {
            return Err(MorphogramError::validation(
                "canvas width/height must be non-zero",
            ));
        }
        Ok(Self { width, height })
    }

    /// Round both dimensions down to even values.
    ///
    /// yuv420p output requires even dimensions; 4:2:0 chroma is subsampled
    /// 2x2.
    pub fn rounded_to_even(self) -> MorphogramResult<Self> {
        Self::new(self.width & !1, self.height & !1)
    }

    /// Total RGBA8 byte length for this canvas, or `None` on overflow.
    pub fn rgba8_len(self) -> Option<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)?
            .checked_mul(4)
    }
}

/// Positive per-frame display delay for animated GIF output.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FrameDelay {
    secs: f64,
}

impl FrameDelay {
    /// Create a validated delay; must be finite and strictly positive.
    pub fn from_secs(secs: f64) -> MorphogramResult<Self> {
        if !secs.is_finite() || secs <= 0.0 {
            return Err(MorphogramError::validation(
                "frame delay must be finite and > 0",
            ));
        }
        Ok(Self { secs })
    }

    /// Delay in seconds.
    pub fn as_secs(self) -> f64 {
        self.secs
    }

    /// Delay in the GIF time base (centiseconds).
    ///
    /// Sub-centisecond delays clamp to 1 rather than rounding to a zero tick.
    pub fn as_centis(self) -> u16 {
        let centis = (self.secs * 100.0).round();
        if centis < 1.0 {
            return 1;
        }
        if centis > f64::from(u16::MAX) {
            return u16::MAX;
        }
        centis as u16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fps_rejects_zero() {
        assert!(Fps::new(0, 1).is_err());
        assert!(Fps::new(10, 0).is_err());
        assert!(Fps::new(10, 1).is_ok());
    }

    #[test]
    fn frame_timestamps_are_strictly_increasing() {
        let fps = Fps::new(10, 1).unwrap();
        let mut prev = -1.0;
        for i in 0..100u64 {
            let t = fps.frame_timestamp_secs(FrameIndex(i));
            assert!(t > prev);
            assert!((t - (i as f64) / 10.0).abs() < 1e-12);
            prev = t;
        }
    }

    #[test]
    fn rational_fps_timestamps() {
        let fps = Fps::new(30000, 1001).unwrap();
        let t = fps.frame_timestamp_secs(FrameIndex(30000));
        assert!((t - 1001.0).abs() < 1e-9);
    }

    #[test]
    fn canvas_even_rounding() {
        let c = Canvas::new(801, 601).unwrap().rounded_to_even().unwrap();
        assert_eq!((c.width, c.height), (800, 600));
        assert!(Canvas::new(1, 1).unwrap().rounded_to_even().is_err());
    }

    #[test]
    fn frame_delay_clamps_to_one_centisecond() {
        assert_eq!(FrameDelay::from_secs(0.001).unwrap().as_centis(), 1);
        assert_eq!(FrameDelay::from_secs(0.5).unwrap().as_centis(), 50);
        assert!(FrameDelay::from_secs(0.0).is_err());
        assert!(FrameDelay::from_secs(f64::NAN).is_err());
    }
}
