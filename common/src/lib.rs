//! Common types shared by the player shim and `bpctl`.
//!
//! This crate defines the vocabulary both adapters speak at their host-facing
//! surface: the DVD navigation commands and pointer events forwarded to the
//! video sink, the decision taken for every opened URI, and the outcome of a
//! fingerprint decode together with its integer status codes.
//!
//! Everything here is serializable so the CLI can print it as JSON.
//!
//! # Examples
//!
//! ```
//! use common::{DecodeOutcome, DecodeStatus};
//!
//! let outcome = DecodeOutcome::success(4711, 1024);
//! assert_eq!(outcome.code(), 0);
//! assert_eq!(outcome.size, 513);
//!
//! let cancelled = DecodeOutcome::failure(DecodeStatus::Cancelled);
//! assert_eq!(cancelled.code(), -2);
//! assert_eq!(cancelled.size, 0);
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// URI scheme handled by the DVD adapter.
pub const DVD_SCHEME: &str = "dvd://";

/// Common error types shared between the library and the CLI.
#[derive(Error, Debug, Serialize, Deserialize)]
pub enum BridgeError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Pipeline error: {0}")]
    Pipeline(String),

    #[error("Submission error: {0}")]
    Submit(String),

    #[error("Invalid response from fingerprint service: {0}")]
    InvalidResponse(String),
}

impl From<std::io::Error> for BridgeError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(e: serde_json::Error) -> Self {
        Self::Io(e.to_string())
    }
}

/// Navigation commands understood by DVD-capable video sinks.
///
/// Mirrors the subset of GStreamer's `GstNavigationCommand` the player uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NavigationCommand {
    Left,
    Right,
    Up,
    Down,
    Activate,
    /// Jump to the disc's main menu (`MENU1`)
    DvdMenu,
    /// Any other command offered by the element
    Other,
}

impl NavigationCommand {
    /// Commands whose availability means a DVD menu is on screen
    pub fn is_menu_command(self) -> bool {
        matches!(
            self,
            Self::Left | Self::Right | Self::Up | Self::Down | Self::Activate
        )
    }

    /// Parse a command name as typed on the CLI
    pub fn from_name(s: &str) -> Option<Self> {
        match s {
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            "activate" | "enter" => Some(Self::Activate),
            "menu" => Some(Self::DvdMenu),
            _ => None,
        }
    }
}

/// Pointer events forwarded to the navigation capability.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MouseEvent {
    Move { x: f64, y: f64 },
    ButtonPress { button: i32, x: f64, y: f64 },
    ButtonRelease { button: i32, x: f64, y: f64 },
}

impl MouseEvent {
    /// Event name in the navigation event structure
    pub fn name(&self) -> &'static str {
        match self {
            Self::Move { .. } => "mouse-move",
            Self::ButtonPress { .. } => "mouse-button-press",
            Self::ButtonRelease { .. } => "mouse-button-release",
        }
    }

    /// Button number (0 for motion)
    pub fn button(&self) -> i32 {
        match self {
            Self::Move { .. } => 0,
            Self::ButtonPress { button, .. } | Self::ButtonRelease { button, .. } => *button,
        }
    }

    pub fn position(&self) -> (f64, f64) {
        match self {
            Self::Move { x, y }
            | Self::ButtonPress { x, y, .. }
            | Self::ButtonRelease { x, y, .. } => (*x, *y),
        }
    }
}

/// What the DVD adapter did with an opened URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UriDecision {
    /// Not a DVD URI and nothing was cached
    NotDvd,
    /// Not a DVD URI; the previously cached device was released
    Released { device: String },
    /// First DVD URI; device cached, pipeline opens it normally
    Adopted { device: String },
    /// Same device as the cached one; playback can seek in place
    FastSeek {
        device: String,
        chapter: Option<u32>,
    },
    /// Different device; cache replaced, pipeline reopens
    Switched { from: String, to: String },
}

impl UriDecision {
    /// Device cached after this decision, if any
    pub fn device(&self) -> Option<&str> {
        match self {
            Self::NotDvd | Self::Released { .. } => None,
            Self::Adopted { device } | Self::FastSeek { device, .. } => Some(device),
            Self::Switched { to, .. } => Some(to),
        }
    }
}

/// Status of a fingerprint decode, with the integer codes reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecodeStatus {
    Ok,
    /// Pipeline could not be built, rate negotiation failed or decoding errored
    Failed,
    /// Decode was cancelled from another thread
    Cancelled,
    /// The fingerprint service could not be reached or answered garbage
    SubmitFailed,
    /// The stream ended before the extractor produced a fingerprint
    NoFingerprint,
}

impl DecodeStatus {
    pub fn code(self) -> i32 {
        match self {
            Self::Ok => 0,
            Self::Failed => -1,
            Self::Cancelled => -2,
            Self::SubmitFailed => -3,
            Self::NoFingerprint => -4,
        }
    }
}

/// Result of one fingerprint decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeOutcome {
    /// Identifier assigned by the service, -1 when none was obtained
    pub fingerprint_id: i64,
    /// `winsize / 2 + 1` on success, 0 otherwise
    pub size: i32,
    pub status: DecodeStatus,
}

impl DecodeOutcome {
    pub fn success(fingerprint_id: i64, winsize: i32) -> Self {
        Self {
            fingerprint_id,
            size: winsize / 2 + 1,
            status: DecodeStatus::Ok,
        }
    }

    pub fn failure(status: DecodeStatus) -> Self {
        Self {
            fingerprint_id: -1,
            size: 0,
            status,
        }
    }

    pub fn code(&self) -> i32 {
        self.status.code()
    }

    pub fn is_success(&self) -> bool {
        self.status == DecodeStatus::Ok
    }
}

/// Optional track metadata sent along with a fingerprint submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackHints {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track: Option<String>,
    /// Track duration in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

impl TrackHints {
    pub fn is_empty(&self) -> bool {
        self.artist.is_none()
            && self.album.is_none()
            && self.track.is_none()
            && self.duration.is_none()
            && self.filename.is_none()
    }
}
