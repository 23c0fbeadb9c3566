//! Text rasterization behind a trait seam.

use crate::foundation::error::{MorphogramError, MorphogramResult};

/// Grayscale coverage mask produced by rasterizing watermark text.
#[derive(Clone, Debug)]
pub struct AlphaMask {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Row-major coverage bytes; 0 is transparent, 255 fully covered.
    pub coverage: Vec<u8>,
}

impl AlphaMask {
    /// Wrap coverage bytes, validating the length against the dimensions.
    pub fn new(width: u32, height: u32, coverage: Vec<u8>) -> MorphogramResult<Self> {
        if width == 0 || height == 0 {
            return Err(MorphogramError::validation(
                "alpha mask width/height must be non-zero",
            ));
        }
        if coverage.len() != (width as usize) * (height as usize) {
            return Err(MorphogramError::validation(
                "alpha mask coverage length must equal width*height",
            ));
        }
        Ok(Self {
            width,
            height,
            coverage,
        })
    }

    /// Coverage at `(x, y)`; out-of-bounds reads are transparent.
    pub fn coverage_at(&self, x: i64, y: i64) -> u8 {
        if x < 0 || y < 0 || x >= i64::from(self.width) || y >= i64::from(self.height) {
            return 0;
        }
        self.coverage[y as usize * self.width as usize + x as usize]
    }
}

/// Rasterizes a single line of text into an [`AlphaMask`].
///
/// The seam exists so compositing can be tested with a deterministic stub;
/// production code uses [`FontdueRaster`].
pub trait TextRaster: Send + Sync {
    /// Rasterize `text` at `size_px` pixels.
    fn raster(&self, text: &str, size_px: f32) -> MorphogramResult<AlphaMask>;
}

/// `fontdue`-backed rasterizer over caller-supplied font bytes.
pub struct FontdueRaster {
    font: fontdue::Font,
}

impl FontdueRaster {
    /// Parse TTF/OTF font bytes.
    pub fn from_bytes(bytes: &[u8]) -> MorphogramResult<Self> {
        let font = fontdue::Font::from_bytes(bytes, fontdue::FontSettings::default())
            .map_err(|e| MorphogramError::validation(format!("font parse failed: {e}")))?;
        Ok(Self { font })
    }
}

impl TextRaster for FontdueRaster {
    fn raster(&self, text: &str, size_px: f32) -> MorphogramResult<AlphaMask> {
        if !size_px.is_finite() || size_px <= 0.0 {
            return Err(MorphogramError::validation(
                "text size_px must be finite and > 0",
            ));
        }
        if text.is_empty() {
            return Err(MorphogramError::validation("text must be non-empty"));
        }

        let line = self
            .font
            .horizontal_line_metrics(size_px)
            .ok_or_else(|| MorphogramError::validation("font has no horizontal metrics"))?;
        let ascent = line.ascent.ceil();
        let height = (line.ascent - line.descent).ceil().max(1.0) as u32;

        // First pass: total advance width.
        let mut advance = 0.0f32;
        for ch in text.chars() {
            advance += self.font.metrics(ch, size_px).advance_width;
        }
        let width = advance.ceil().max(1.0) as u32;

        // Second pass: blit glyph bitmaps onto the shared baseline.
        let mut coverage = vec![0u8; (width as usize) * (height as usize)];
        let mut pen_x = 0.0f32;
        for ch in text.chars() {
            let (metrics, bitmap) = self.font.rasterize(ch, size_px);
            let gx0 = (pen_x + metrics.xmin as f32).round() as i64;
            let gy0 = (ascent - (metrics.ymin + metrics.height as i32) as f32).round() as i64;
            for row in 0..metrics.height {
                for col in 0..metrics.width {
                    let x = gx0 + col as i64;
                    let y = gy0 + row as i64;
                    if x < 0 || y < 0 || x >= i64::from(width) || y >= i64::from(height) {
                        continue;
                    }
                    let idx = y as usize * width as usize + x as usize;
                    coverage[idx] = coverage[idx].max(bitmap[row * metrics.width + col]);
                }
            }
            pen_x += metrics.advance_width;
        }

        AlphaMask::new(width, height, coverage)
    }
}
