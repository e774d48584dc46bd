//! Cached DVD device node
//!
//! Playbin has no notion of device nodes in DVD URIs, so the adapter keeps the
//! device of the disc currently being played and pushes it onto every new
//! source element. The cache is shared with the source-changed handler, which
//! the pipeline runs on its own thread.

use super::playbin::DeviceSource;
use super::uri::DvdUri;
use common::UriDecision;
use std::sync::{Arc, Mutex, PoisonError};

/// The device node of the disc currently being played, if any
#[derive(Debug, Clone, Default)]
pub struct DeviceCache {
    device: Arc<Mutex<Option<String>>>,
}

impl DeviceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently cached device
    pub fn device(&self) -> Option<String> {
        self.device
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Update the cache for a URI about to be opened
    ///
    /// Non-DVD URIs always leave the cache empty. A DVD URI is adopted when
    /// nothing was cached, replaces a different device, and is recognized as
    /// a fast seek when it names the device already cached.
    pub fn handle_uri(&self, uri: &str) -> UriDecision {
        let mut cached = self.device.lock().unwrap_or_else(PoisonError::into_inner);

        let Some(dvd) = DvdUri::parse(uri) else {
            return match cached.take() {
                Some(device) => {
                    log::warn!("dvd: finished using device ({})", device);
                    UriDecision::Released { device }
                }
                None => UriDecision::NotDvd,
            };
        };

        match cached.as_deref() {
            None => {
                log::debug!("dvd: storing device node for fast seeks ({})", dvd.device);
                *cached = Some(dvd.device.to_string());
                UriDecision::Adopted {
                    device: dvd.device.to_string(),
                }
            }
            Some(current) if current == dvd.device => {
                log::debug!(
                    "dvd: fast seeking to chapter {:?} on already playing device ({})",
                    dvd.chapter,
                    current
                );
                UriDecision::FastSeek {
                    device: current.to_string(),
                    chapter: dvd.chapter,
                }
            }
            Some(current) => {
                log::debug!(
                    "dvd: switching devices for DVD playback (from {}, to {})",
                    current,
                    dvd.device
                );
                let from = current.to_string();
                *cached = Some(dvd.device.to_string());
                UriDecision::Switched {
                    from,
                    to: dvd.device.to_string(),
                }
            }
        }
    }

    /// Point a freshly created source element at the cached device
    ///
    /// Returns whether the property was set.
    pub fn apply_to_source(&self, source: &dyn DeviceSource) -> bool {
        let Some(device) = self.device() else {
            return false;
        };

        if !source.has_device_property() {
            log::trace!("dvd: source has no device property, leaving it alone");
            return false;
        }

        log::debug!("dvd: setting device property on source ({})", device);
        source.set_device(&device);
        true
    }
}
