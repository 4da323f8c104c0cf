//! FFI bindings for UniFFI export
//!
//! This module provides Swift/Kotlin bindings for the layersync crate via UniFFI.
//!
//! ## Usage from Kotlin
//!
//! ```kotlin
//! // Initialize logging first
//! initializeLogging(callback = LogcatCallback(), maxLevel = FfiLogLevel.INFO)
//!
//! val service = SyncService(
//!     dbPath = context.filesDir.resolve("sync.db").path,
//!     accountType = "org.layersync.account",
//!     authority = "org.layersync.provider",
//!     callback = BroadcastCallback(context)
//! )
//!
//! service.addAccount("field-team")
//! service.setLayersJson(treeJson)
//! service.schedule(account = null, intervalSecs = 3600u, extras = emptyMap())
//!
//! // From the platform's sync worker
//! val report = service.performSync("field-team", extras, timeoutMs = null)
//!
//! // When the platform interrupts the worker
//! service.cancelSync("field-team")
//! ```

mod logging;
mod service;
mod types;

// Re-export all FFI types and the SyncService
pub use logging::{init_ffi_logger, set_log_callback, set_log_level};
pub use service::*;
pub use types::*;
