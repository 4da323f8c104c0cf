//! Remote resources synchronized over HTTP
//!
//! This module provides:
//! - [`RemoteLayer`], a leaf resource that polls a layer endpoint
//! - [`RetryPolicy`] for transient failures

mod layer;

pub use layer::{RemoteLayer, RetryPolicy};
