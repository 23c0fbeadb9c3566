//! Encoder-ready pixel buffers and their pooled templates.

pub mod pool;
