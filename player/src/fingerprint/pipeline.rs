//! Decode pipeline seams for the fingerprint bridge
//!
//! A backend builds one [`DecodePipeline`] per decoded file. The bridge talks
//! to it through three primitives: a [`SampleConsumer`] the sink pushes raw
//! buffers into, a [`MessageBus`] polled with a bounded wait, and the
//! paused/playing/stopped state transitions.

use common::BridgeError;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Bus messages the decode loop reacts to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusMessage {
    Eos,
    Error(String),
}

/// Message bus of a decode pipeline
pub trait MessageBus: Send + Sync {
    /// Wait up to `timeout` for an error or end-of-stream message
    fn timed_pop(&self, timeout: Duration) -> Option<BusMessage>;

    /// Post a synthetic end-of-stream message to unwind the decode loop
    fn post_eos(&self) -> bool;
}

/// Receives every decoded buffer of interleaved S16 samples
///
/// Returns whether extraction is complete; the sink keeps delivering buffers
/// until end-of-stream is processed, so the consumer must tolerate calls
/// after completion.
pub type SampleConsumer = Box<dyn FnMut(&[i16]) -> bool + Send + 'static>;

/// A single-use decode pipeline for one file
pub trait DecodePipeline {
    fn bus(&self) -> Arc<dyn MessageBus>;

    /// Register the consumer buffers are pushed into
    fn set_consumer(&mut self, consumer: SampleConsumer);

    /// Bring the pipeline to PAUSED and read the negotiated sample rate
    ///
    /// Each state transition is waited on for at most `timeout`. Returns
    /// `None` when no rate could be negotiated.
    fn probe_rate(&mut self, timeout: Duration) -> Option<i32>;

    fn play(&mut self) -> Result<(), BridgeError>;

    /// Stop the pipeline and release its resources
    fn stop(&mut self);
}

/// Builds decode pipelines
pub trait DecodeBackend: Send + Sync {
    type Pipeline: DecodePipeline;

    fn build(&self, path: &Path) -> Result<Self::Pipeline, BridgeError>;
}
