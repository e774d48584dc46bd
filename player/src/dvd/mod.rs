//! DVD playback adapter
//!
//! - `uri`: `dvd://<device>[#<chapter>]` parsing
//! - `device`: the cached device node and its state transitions
//! - `playbin`: traits the playback backend implements
//! - `manager`: the per-player [`DvdManager`] the host calls into
//!
//! # Device handling
//!
//! Playbin does not understand device nodes in DVD URIs. The adapter caches
//! the device of the active disc and sets it on every source element the
//! pipeline creates. Opening another chapter of the disc already spinning is
//! recognized as a fast seek. Any non-DVD URI clears the cache.

mod device;
mod manager;
mod playbin;
mod uri;

pub use device::DeviceCache;
pub use manager::DvdManager;
pub use playbin::{DeviceSource, Navigation, Playbin, SourceChangedHandler};
pub use uri::{DvdUri, is_dvd_uri};
