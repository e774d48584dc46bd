//! Seams between the DVD adapter and the playback pipeline
//!
//! The adapter never talks to GStreamer directly. A backend implements
//! [`Playbin`] for its playback element, [`DeviceSource`] for the source
//! element playbin creates per URI, and [`Navigation`] for the interactive
//! interface of the current video sink.

use common::{MouseEvent, NavigationCommand};

/// The source element created by the pipeline for the current URI
pub trait DeviceSource {
    /// Whether the element exposes a writable `device` property
    fn has_device_property(&self) -> bool;

    /// Set the `device` property
    fn set_device(&self, device: &str);
}

/// Callback run by the pipeline every time its source element changes
pub type SourceChangedHandler = Box<dyn Fn(&dyn DeviceSource) + Send + Sync + 'static>;

/// Interactive input interface exposed by DVD-capable video sinks
pub trait Navigation {
    fn send_mouse_event(&self, event: MouseEvent);

    fn send_command(&self, command: NavigationCommand);

    /// Commands the element currently accepts, `None` if the query failed
    fn commands(&self) -> Option<Vec<NavigationCommand>>;
}

/// The playback pipeline the host opens URIs on
pub trait Playbin {
    type Navigation: Navigation;

    /// Register a handler for source element changes (`notify::source`)
    fn connect_source_changed(&self, handler: SourceChangedHandler);

    /// Resolve the navigation interface of the current video sink
    ///
    /// Returns `None` when there is no video sink or it cannot navigate.
    fn find_navigation(&self) -> Option<Self::Navigation>;

    /// Current position in the `chapter` format
    fn query_chapter(&self) -> Option<i64>;

    /// Flushing absolute seek in the `chapter` format
    fn seek_chapter(&self, chapter: i64) -> bool;

    /// Whether the pipeline is at least PAUSED, i.e. a device is spinning
    fn is_prerolled(&self) -> bool;
}
