//! GStreamer backend for the DVD adapter and the fingerprint bridge
//!
//! - `decode`: single-use decode pipeline feeding an `appsink`
//! - `playbin`: `playbin` wrapper implementing the DVD adapter's traits
//!
//! # Fingerprint pipeline
//!
//! ```text
//! filesrc ! decodebin ! audioconvert ! audioresample
//!         ! audio/x-raw,format=S16LE,channels=1,rate=<rate> ! appsink
//! ```
//!
//! Only the first decoded audio pad is linked. Buffers reach the sample
//! consumer from the `appsink` callback on the streaming thread.

#[cfg(feature = "gst")]
mod decode;
#[cfg(feature = "gst")]
mod playbin;

#[cfg(feature = "gst")]
pub use decode::{GstBus, GstDecodeBackend, GstDecodePipeline};
#[cfg(feature = "gst")]
pub use playbin::{GstNavigation, GstPlaybin, PlaybinEvent};

/// Initialize GStreamer (idempotent, safe to call multiple times)
#[cfg(feature = "gst")]
pub fn initialize_gstreamer() -> anyhow::Result<()> {
    use std::sync::OnceLock;

    static GSTREAMER_INITIALIZED: OnceLock<Result<(), String>> = OnceLock::new();

    GSTREAMER_INITIALIZED
        .get_or_init(|| {
            gstreamer::init().map_err(|e| e.to_string())?;
            log::info!("GStreamer initialized");
            Ok(())
        })
        .clone()
        .map_err(|e| anyhow::anyhow!("Failed to initialize GStreamer: {}", e))
}

/// Stub when the `gst` feature is disabled
#[cfg(not(feature = "gst"))]
pub fn initialize_gstreamer() -> anyhow::Result<()> {
    anyhow::bail!("GStreamer support not compiled in")
}

#[cfg(all(test, not(feature = "gst")))]
mod tests {
    #[test]
    fn test_stub_reports_missing_support() {
        let err = super::initialize_gstreamer().unwrap_err();
        assert!(err.to_string().contains("not compiled in"));
    }
}
