//! Media player shim: DVD navigation adapter and acoustic fingerprint bridge
//!
//! The DVD and fingerprint logic only depend on small traits; the GStreamer
//! implementations live in [`gst`] behind the `gst` feature.

pub mod macros;

pub mod config;
pub mod dvd;
pub mod fingerprint;
pub mod gst;

pub use config::Config;
