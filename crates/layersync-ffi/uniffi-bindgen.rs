//! UniFFI bindgen binary for the layersync-ffi library
//!
//! Usage:
//!   cargo run -p layersync-ffi --features bindgen --bin uniffi-bindgen generate \
//!       --library target/release/liblayersync_ffi.so \
//!       --language kotlin \
//!       --out-dir generated/kotlin

fn main() {
    uniffi::uniffi_bindgen_main()
}
