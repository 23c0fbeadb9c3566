//! Job-level orchestration of compositing and encoding.

pub mod animator;
