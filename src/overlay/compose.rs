//! Pure per-frame compositing: cover-scale the photo, stamp the watermark.

use kurbo::{Affine, Point, Rect};

use crate::assets::store::Frame;
use crate::foundation::core::Canvas;
use crate::foundation::error::{MorphogramError, MorphogramResult};
use crate::overlay::text::{AlphaMask, TextRaster};
use crate::overlay::{FONT_SCALE_RATIO, WatermarkPolicy, WatermarkPosition, WatermarkSpec};

/// A frame composited to canvas size with the watermark applied.
///
/// Pixels are straight-alpha RGBA8 and fully opaque.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComposedFrame {
    /// Width in pixels (equals the job canvas width).
    pub width: u32,
    /// Height in pixels (equals the job canvas height).
    pub height: u32,
    /// RGBA8 bytes, tightly packed, row-major.
    pub rgba8: Vec<u8>,
}

/// Composite one frame onto a canvas of `canvas` size and stamp the watermark.
///
/// The frame is scaled so it fully covers the canvas and center-cropped; no
/// letterbox bars are ever produced. The watermark is rasterized at 10% of
/// canvas width and placed according to `watermark.position` and `policy`.
///
/// Pure function over its inputs; mutates no shared state.
pub fn compose(
    frame: &Frame,
    watermark: &WatermarkSpec,
    policy: WatermarkPolicy,
    canvas: Canvas,
    raster: &dyn TextRaster,
) -> MorphogramResult<ComposedFrame> {
    let len = canvas
        .rgba8_len()
        .ok_or_else(|| MorphogramError::validation("canvas byte size overflow"))?;
    if frame.width == 0 || frame.height == 0 {
        return Err(MorphogramError::validation(
            "frame width/height must be non-zero",
        ));
    }

    let mut rgba8 = vec![0u8; len];
    cover_blit(frame, canvas, &mut rgba8);

    let size_px = canvas.width as f32 * FONT_SCALE_RATIO;
    let mask = raster.raster(&watermark.text, size_px)?;
    let affine = placement(watermark.position, policy, canvas, &mask);
    stamp_mask(&mut rgba8, canvas, &mask, affine, watermark.opacity);

    Ok(ComposedFrame {
        width: canvas.width,
        height: canvas.height,
        rgba8,
    })
}

/// Scale `frame` to fully cover `canvas` (center-cropped) with bilinear
/// sampling. Output alpha is forced opaque.
fn cover_blit(frame: &Frame, canvas: Canvas, dst: &mut [u8]) {
    let (fw, fh) = (frame.width as f64, frame.height as f64);
    let (cw, ch) = (canvas.width as f64, canvas.height as f64);
    let scale = (cw / fw).max(ch / fh);
    let off_x = (fw - cw / scale) / 2.0;
    let off_y = (fh - ch / scale) / 2.0;

    for y in 0..canvas.height {
        let sy = off_y + (y as f64 + 0.5) / scale - 0.5;
        for x in 0..canvas.width {
            let sx = off_x + (x as f64 + 0.5) / scale - 0.5;
            let rgb = sample_bilinear(frame, sx, sy);
            let idx = (y as usize * canvas.width as usize + x as usize) * 4;
            dst[idx] = rgb[0];
            dst[idx + 1] = rgb[1];
            dst[idx + 2] = rgb[2];
            dst[idx + 3] = 255;
        }
    }
}

fn sample_bilinear(frame: &Frame, sx: f64, sy: f64) -> [u8; 3] {
    let max_x = (frame.width - 1) as i64;
    let max_y = (frame.height - 1) as i64;
    let x0 = sx.floor() as i64;
    let y0 = sy.floor() as i64;
    let fx = (sx - x0 as f64).clamp(0.0, 1.0);
    let fy = (sy - y0 as f64).clamp(0.0, 1.0);

    let px = |x: i64, y: i64| -> [f64; 3] {
        let x = x.clamp(0, max_x) as usize;
        let y = y.clamp(0, max_y) as usize;
        let idx = (y * frame.width as usize + x) * 4;
        [
            frame.rgba8[idx] as f64,
            frame.rgba8[idx + 1] as f64,
            frame.rgba8[idx + 2] as f64,
        ]
    };

    let (p00, p10, p01, p11) = (px(x0, y0), px(x0 + 1, y0), px(x0, y0 + 1), px(x0 + 1, y0 + 1));
    let mut out = [0u8; 3];
    for c in 0..3 {
        let top = p00[c] * (1.0 - fx) + p10[c] * fx;
        let bot = p01[c] * (1.0 - fx) + p11[c] * fx;
        out[c] = (top * (1.0 - fy) + bot * fy).round().clamp(0.0, 255.0) as u8;
    }
    out
}

/// Mask-space to canvas-space placement transform.
fn placement(
    position: WatermarkPosition,
    policy: WatermarkPolicy,
    canvas: Canvas,
    mask: &AlphaMask,
) -> Affine {
    let (cw, ch) = (canvas.width as f64, canvas.height as f64);
    let (mw, mh) = (mask.width as f64, mask.height as f64);
    let pad = f64::from(policy.pad_ratio) * cw;

    let (tx, ty) = match position {
        WatermarkPosition::Center => ((cw - mw) / 2.0, (ch - mh) / 2.0),
        WatermarkPosition::TopLeft => (pad, pad),
        WatermarkPosition::TopRight => (cw - pad - mw, pad),
        WatermarkPosition::BottomLeft => (pad, ch - pad - mh),
        WatermarkPosition::BottomRight => (cw - pad - mw, ch - pad - mh),
    };

    let translate = Affine::translate((tx, ty));
    if policy.rotate_center && position == WatermarkPosition::Center {
        let center = Point::new(cw / 2.0, ch / 2.0);
        return Affine::rotate_about(std::f64::consts::FRAC_PI_4, center) * translate;
    }
    translate
}

/// Blend the mask over `dst` as white text at `opacity`, placed by `affine`.
fn stamp_mask(dst: &mut [u8], canvas: Canvas, mask: &AlphaMask, affine: Affine, opacity: f32) {
    let opacity = f64::from(opacity.clamp(0.0, 1.0));
    if opacity <= 0.0 {
        return;
    }

    let mask_rect = Rect::new(0.0, 0.0, f64::from(mask.width), f64::from(mask.height));
    let bbox = affine.transform_rect_bbox(mask_rect);
    let x0 = (bbox.x0.floor().max(0.0)) as u32;
    let y0 = (bbox.y0.floor().max(0.0)) as u32;
    let x1 = (bbox.x1.ceil().min(f64::from(canvas.width))) as u32;
    let y1 = (bbox.y1.ceil().min(f64::from(canvas.height))) as u32;

    let inv = affine.inverse();
    for y in y0..y1 {
        for x in x0..x1 {
            let p = inv * Point::new(x as f64 + 0.5, y as f64 + 0.5);
            let coverage = mask.coverage_at(p.x.floor() as i64, p.y.floor() as i64);
            if coverage == 0 {
                continue;
            }
            let a = (coverage as f64 / 255.0) * opacity;
            let idx = (y as usize * canvas.width as usize + x as usize) * 4;
            for c in 0..3 {
                let d = dst[idx + c] as f64;
                dst[idx + c] = (255.0 * a + d * (1.0 - a)).round().clamp(0.0, 255.0) as u8;
            }
        }
    }
}
