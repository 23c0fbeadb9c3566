//! Watermark specification and per-frame overlay compositing.

pub mod compose;
pub mod text;

/// Default watermark text stamped onto every output frame.
pub const WATERMARK_TEXT: &str = "Morphogram";

/// Fixed low watermark blend opacity.
pub const WATERMARK_OPACITY: f32 = 0.3;

/// Watermark font size as a fraction of canvas width.
pub const FONT_SCALE_RATIO: f32 = 0.10;

/// Placement anchor for the watermark within the output canvas.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum WatermarkPosition {
    /// Canvas center.
    Center,
    /// Inset from the top-left corner.
    TopLeft,
    /// Inset from the top-right corner.
    TopRight,
    /// Inset from the bottom-left corner.
    BottomLeft,
    /// Inset from the bottom-right corner.
    BottomRight,
}

/// The text overlay applied to each frame of an animation job.
///
/// Constructed once per job and reused for every frame.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct WatermarkSpec {
    /// Text content.
    pub text: String,
    /// Placement anchor.
    pub position: WatermarkPosition,
    /// Blend opacity in `[0, 1]`.
    pub opacity: f32,
}

impl Default for WatermarkSpec {
    fn default() -> Self {
        Self::new(WatermarkPosition::BottomRight)
    }
}

impl WatermarkSpec {
    /// Standard "Morphogram" watermark at `position`.
    pub fn new(position: WatermarkPosition) -> Self {
        Self {
            text: WATERMARK_TEXT.to_string(),
            position,
            opacity: WATERMARK_OPACITY,
        }
    }
}

/// Placement constants that differ between output formats.
///
/// The GIF and video paths shipped with different corner padding, and only
/// the GIF path rotates a center-anchored watermark. Both behaviors are kept
/// as explicit per-format policies instead of being silently unified.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct WatermarkPolicy {
    /// Corner inset as a fraction of canvas width.
    pub pad_ratio: f32,
    /// Rotate a center-anchored watermark by 45 degrees.
    pub rotate_center: bool,
}

impl WatermarkPolicy {
    /// Video placement: 1.5% padding, no rotation.
    pub const VIDEO: Self = Self {
        pad_ratio: 0.015,
        rotate_center: false,
    };

    /// GIF placement: 5% padding, center watermark rotated 45 degrees.
    pub const GIF: Self = Self {
        pad_ratio: 0.05,
        rotate_center: true,
    };
}
