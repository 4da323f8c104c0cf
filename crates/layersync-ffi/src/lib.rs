//! UniFFI bindings crate for the layersync library
//!
//! Host platforms (Android background workers, iOS BGTaskScheduler) load this
//! library and drive `SyncService` from their own trigger mechanism. The crate
//! only re-exports the FFI surface and scaffolding of `layersync`.
//!
//! ## Building for Kotlin
//!
//! 1. Build the shared library for the Android targets:
//!    ```bash
//!    cargo build --release -p layersync-ffi --target aarch64-linux-android
//!    ```
//!
//! 2. Generate Kotlin bindings:
//!    ```bash
//!    cargo run -p layersync-ffi --features bindgen --bin uniffi-bindgen generate \
//!        --library target/aarch64-linux-android/release/liblayersync_ffi.so \
//!        --language kotlin \
//!        --out-dir generated/kotlin
//!    ```
//!
//! Swift bindings are generated the same way with `--language swift`.

pub use layersync::ffi::*;

// Library mode needs the scaffolding symbols re-exported from this cdylib
layersync::uniffi_reexport_scaffolding!();
