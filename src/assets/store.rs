//! Filesystem-backed frame store with a decode-once cache.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;

use crate::foundation::error::{MorphogramError, MorphogramResult};

/// Decoded still image in straight-alpha RGBA8 form.
#[derive(Clone, Debug)]
pub struct Frame {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel bytes, row-major, tightly packed RGBA8.
    pub rgba8: Arc<Vec<u8>>,
}

impl Frame {
    /// Wrap raw RGBA8 bytes, validating the length against the dimensions.
    pub fn from_rgba8(width: u32, height: u32, rgba8: Vec<u8>) -> MorphogramResult<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(4))
            .ok_or_else(|| MorphogramError::validation("frame byte size overflow"))?;
        if width == 0 || height == 0 {
            return Err(MorphogramError::validation(
                "frame width/height must be non-zero",
            ));
        }
        if rgba8.len() != expected {
            return Err(MorphogramError::validation(format!(
                "frame data length {} does not match {}x{}x4",
                rgba8.len(),
                width,
                height
            )));
        }
        Ok(Self {
            width,
            height,
            rgba8: Arc::new(rgba8),
        })
    }
}

/// Decode image bytes (PNG/JPEG/...) into a [`Frame`].
pub fn decode_frame(bytes: &[u8]) -> MorphogramResult<Frame> {
    let dyn_img = image::load_from_memory(bytes).context("decode image from memory")?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();
    Frame::from_rgba8(width, height, rgba.into_raw())
}

/// Filesystem-backed store of a project's photos, addressed by file name.
///
/// Repeated loads of the same file name decode once; the decoded frame is
/// cached and handed out as a cheap clone (pixels are shared via `Arc`).
pub struct FrameStore {
    root: PathBuf,
    cache: HashMap<String, Frame>,
    decode_counts: HashMap<String, u64>,
}

impl FrameStore {
    /// Create a store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache: HashMap::new(),
            decode_counts: HashMap::new(),
        }
    }

    /// Root directory the store reads from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Load a frame by file name, decoding at most once per name.
    pub fn load(&mut self, file_name: &str) -> MorphogramResult<Frame> {
        let key = validate_file_name(file_name)?;
        if let Some(frame) = self.cache.get(key) {
            return Ok(frame.clone());
        }

        let path = self.root.join(key);
        let bytes = std::fs::read(&path).map_err(|e| {
            MorphogramError::io(format!("failed to read frame '{}': {e}", path.display()))
        })?;
        let frame = decode_frame(&bytes)?;

        *self.decode_counts.entry(key.to_string()).or_insert(0) += 1;
        self.cache.insert(key.to_string(), frame.clone());
        Ok(frame)
    }

    /// Load an ordered sequence of frames, preserving input order.
    pub fn load_sequence(
        &mut self,
        file_names: impl IntoIterator<Item = impl AsRef<str>>,
    ) -> MorphogramResult<Vec<Frame>> {
        let mut out = Vec::new();
        for name in file_names {
            out.push(self.load(name.as_ref())?);
        }
        Ok(out)
    }

    /// Number of times `file_name` has been decoded from disk.
    pub fn decode_count(&self, file_name: &str) -> u64 {
        self.decode_counts.get(file_name).copied().unwrap_or(0)
    }
}

/// File names address entries directly under the store root; separators and
/// parent traversals are rejected.
fn validate_file_name(file_name: &str) -> MorphogramResult<&str> {
    if file_name.is_empty() {
        return Err(MorphogramError::validation("file name must be non-empty"));
    }
    if file_name.contains('/') || file_name.contains('\\') || file_name == ".." {
        return Err(MorphogramError::validation(format!(
            "file name '{file_name}' must not contain path separators"
        )));
    }
    Ok(file_name)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "morphogram_{name}_{}_{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ))
    }

    fn write_png(path: &Path, width: u32, height: u32, rgba: &[u8]) {
        let img = image::RgbaImage::from_raw(width, height, rgba.to_vec()).unwrap();
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        std::fs::write(path, &buf).unwrap();
    }

    #[test]
    fn load_same_frame_only_decodes_once() {
        let tmp = temp_dir("store_decode_once");
        std::fs::create_dir_all(&tmp).unwrap();
        write_png(&tmp.join("img.png"), 1, 1, &[1, 2, 3, 255]);

        let mut store = FrameStore::new(&tmp);
        let a = store.load("img.png").unwrap();
        let b = store.load("img.png").unwrap();
        assert_eq!(store.decode_count("img.png"), 1);
        assert_eq!(a.rgba8, b.rgba8);

        std::fs::remove_dir_all(&tmp).ok();
    }

    #[test]
    fn load_sequence_preserves_order() {
        let tmp = temp_dir("store_sequence");
        std::fs::create_dir_all(&tmp).unwrap();
        write_png(&tmp.join("a.png"), 1, 1, &[10, 0, 0, 255]);
        write_png(&tmp.join("b.png"), 1, 1, &[20, 0, 0, 255]);

        let mut store = FrameStore::new(&tmp);
        let frames = store.load_sequence(["a.png", "b.png"]).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].rgba8[0], 10);
        assert_eq!(frames[1].rgba8[0], 20);

        std::fs::remove_dir_all(&tmp).ok();
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let mut store = FrameStore::new(temp_dir("store_missing"));
        match store.load("nope.png") {
            Err(MorphogramError::Io(_)) => {}
            other => panic!("expected io error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_path_traversal_names() {
        let mut store = FrameStore::new(".");
        assert!(store.load("a/b.png").is_err());
        assert!(store.load("..").is_err());
        assert!(store.load("").is_err());
    }

    #[test]
    fn frame_from_rgba8_validates_length() {
        assert!(Frame::from_rgba8(2, 2, vec![0; 16]).is_ok());
        assert!(Frame::from_rgba8(2, 2, vec![0; 15]).is_err());
        assert!(Frame::from_rgba8(0, 2, vec![]).is_err());
    }
}
