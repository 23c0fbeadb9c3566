//! Frame loading and caching.

pub mod store;
