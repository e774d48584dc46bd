//! GStreamer decode pipeline for fingerprinting
//!
//! This module builds the single-use audio decode pipeline, probes its
//! negotiated sample rate and hands decoded buffers to the bridge.

use crate::fingerprint::{BusMessage, DecodeBackend, DecodePipeline, MessageBus, SampleConsumer};
use anyhow::{Context, Result};
use common::BridgeError;
use gstreamer as gst;
use gstreamer::glib;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

fn clock_time(duration: Duration) -> gst::ClockTime {
    gst::ClockTime::from_mseconds(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
}

/// Build the audio decode pipeline
///
/// # Arguments
///
/// * `path` - Audio file to decode
/// * `rate` - Sample rate the audio is resampled to
///
/// # Returns
///
/// Tuple of (pipeline, app_sink) where app_sink delivers mono S16 buffers
pub fn build_pipeline(path: impl AsRef<Path>, rate: i32) -> Result<(gst::Pipeline, gst_app::AppSink)> {
    let path = path.as_ref();
    log::info!("Creating decode pipeline for: {}", path.display());

    let location = path
        .to_str()
        .with_context(|| format!("Path is not valid UTF-8: {}", path.display()))?;

    let pipeline = gst::Pipeline::with_name("fingerprint");

    let source = gst::ElementFactory::make("filesrc")
        .name("source")
        .property("location", location)
        .build()
        .context("Failed to create filesrc")?;
    let decoder = gst::ElementFactory::make("decodebin")
        .name("decoder")
        .build()
        .context("Failed to create decodebin")?;
    let convert = gst::ElementFactory::make("audioconvert")
        .name("conv")
        .build()
        .context("Failed to create audioconvert")?;
    let resample = gst::ElementFactory::make("audioresample")
        .name("resample")
        .build()
        .context("Failed to create audioresample")?;

    let caps = gst::Caps::builder("audio/x-raw")
        .field("format", "S16LE")
        .field("layout", "interleaved")
        .field("channels", 1i32)
        .field("rate", rate)
        .build();
    log::debug!("Decode caps: {}", caps);

    let app_sink = gst::ElementFactory::make("appsink")
        .name("sink")
        .property("caps", &caps)
        .build()
        .context("Failed to create appsink")?
        .dynamic_cast::<gst_app::AppSink>()
        .map_err(|_| anyhow::anyhow!("sink is not an AppSink"))?;
    configure_app_sink(&app_sink);

    pipeline
        .add_many([
            &source,
            &decoder,
            &convert,
            &resample,
            app_sink.upcast_ref::<gst::Element>(),
        ])
        .context("Failed to add elements to decode pipeline")?;
    gst::Element::link_many([&source, &decoder]).context("Failed to link filesrc to decodebin")?;
    gst::Element::link_many([&convert, &resample, app_sink.upcast_ref::<gst::Element>()])
        .context("Failed to link audio conversion chain")?;

    let convert_weak = convert.downgrade();
    decoder.connect_pad_added(move |_decoder, src_pad| {
        let Some(convert) = convert_weak.upgrade() else {
            return;
        };
        let Some(sink_pad) = convert.static_pad("sink") else {
            return;
        };

        // Only link once
        if sink_pad.is_linked() {
            return;
        }

        let caps = src_pad
            .current_caps()
            .unwrap_or_else(|| src_pad.query_caps(None));
        let Some(structure) = caps.structure(0) else {
            return;
        };
        if !structure.name().as_str().contains("audio") {
            log::trace!("Ignoring decoded pad with caps {}", structure.name());
            return;
        }

        match src_pad.link(&sink_pad) {
            Ok(_) => log::debug!("Linked decoded audio pad ({})", structure.name()),
            Err(e) => log::warn!("Failed to link decoded audio pad: {:?}", e),
        }
    });

    Ok((pipeline, app_sink))
}

/// Configure AppSink for decoding as fast as possible
///
/// - `sync=false`: No clock synchronisation, decode at full speed
/// - `max-buffers=4`: Small queue, the consumer runs in the callback anyway
pub fn configure_app_sink(app_sink: &gst_app::AppSink) {
    app_sink.set_property("emit-signals", false);
    app_sink.set_property("sync", false);
    app_sink.set_property("max-buffers", 4u32);
}

/// Reinterpret a mapped S16LE buffer as samples
fn pcm_samples(data: &[u8]) -> Vec<i16> {
    data.chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect()
}

/// Bus of a decode pipeline
pub struct GstBus {
    bus: gst::Bus,
    pipeline: glib::WeakRef<gst::Pipeline>,
}

impl MessageBus for GstBus {
    fn timed_pop(&self, timeout: Duration) -> Option<BusMessage> {
        let message = self.bus.timed_pop_filtered(
            clock_time(timeout),
            &[gst::MessageType::Error, gst::MessageType::Eos],
        )?;

        match message.view() {
            gst::MessageView::Eos(_) => Some(BusMessage::Eos),
            gst::MessageView::Error(err) => Some(BusMessage::Error(format!(
                "{} (debug: {:?})",
                err.error(),
                err.debug()
            ))),
            _ => None,
        }
    }

    fn post_eos(&self) -> bool {
        let message = match self.pipeline.upgrade() {
            Some(pipeline) => gst::message::Eos::builder().src(&pipeline).build(),
            None => gst::message::Eos::new(),
        };
        self.bus.post(message).is_ok()
    }
}

/// A decode pipeline for one file
pub struct GstDecodePipeline {
    pipeline: gst::Pipeline,
    app_sink: gst_app::AppSink,
    bus: Arc<GstBus>,
    stopped: bool,
}

impl GstDecodePipeline {
    pub fn new(path: &Path, rate: i32) -> Result<Self> {
        let (pipeline, app_sink) = build_pipeline(path, rate)?;
        let bus = pipeline.bus().context("Pipeline has no bus")?;

        Ok(Self {
            bus: Arc::new(GstBus {
                bus,
                pipeline: pipeline.downgrade(),
            }),
            pipeline,
            app_sink,
            stopped: false,
        })
    }

    fn wait_for_state(&self, state: gst::State, timeout: gst::ClockTime) -> bool {
        match self.pipeline.set_state(state) {
            Ok(gst::StateChangeSuccess::Async) => {
                let (result, current, pending) = self.pipeline.state(Some(timeout));
                log::debug!(
                    "Pipeline state after {:?}: {:?} (pending {:?}, {:?})",
                    state,
                    current,
                    pending,
                    result
                );
                result.is_ok()
            }
            Ok(_) => true,
            Err(e) => {
                log::warn!("Failed to set pipeline to {:?}: {}", state, e);
                false
            }
        }
    }
}

impl DecodePipeline for GstDecodePipeline {
    fn bus(&self) -> Arc<dyn MessageBus> {
        self.bus.clone()
    }

    fn set_consumer(&mut self, mut consumer: SampleConsumer) {
        self.app_sink.set_callbacks(
            gst_app::AppSinkCallbacks::builder()
                .new_sample(move |sink| {
                    let sample = sink.pull_sample().map_err(|_| gst::FlowError::Eos)?;
                    let buffer = sample.buffer().ok_or(gst::FlowError::Error)?;
                    let map = buffer.map_readable().map_err(|_| gst::FlowError::Error)?;

                    let samples = pcm_samples(map.as_slice());
                    log::trace!("Delivering {} samples", samples.len());
                    consumer(&samples);

                    Ok(gst::FlowSuccess::Ok)
                })
                .build(),
        );
    }

    fn probe_rate(&mut self, timeout: Duration) -> Option<i32> {
        let timeout = clock_time(timeout);
        if !self.wait_for_state(gst::State::Ready, timeout)
            || !self.wait_for_state(gst::State::Paused, timeout)
        {
            return None;
        }

        let pad = self.app_sink.static_pad("sink")?;
        let caps = pad.current_caps()?;
        let rate = caps.structure(0)?.get::<i32>("rate").ok()?;
        log::debug!("Negotiated sample rate: {} Hz", rate);
        Some(rate)
    }

    fn play(&mut self) -> Result<(), BridgeError> {
        self.pipeline
            .set_state(gst::State::Playing)
            .map(|_| ())
            .map_err(|e| BridgeError::Pipeline(format!("Failed to start playback: {}", e)))
    }

    fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;

        // Clear callbacks first; this also drops the consumer
        self.app_sink
            .set_callbacks(gst_app::AppSinkCallbacks::builder().build());

        log::debug!("Setting decode pipeline state to Null...");
        match self.pipeline.set_state(gst::State::Null) {
            Ok(_) => {
                let (result, current, _) = self.pipeline.state(Some(gst::ClockTime::from_seconds(2)));
                if let Err(e) = result {
                    log::warn!("Failed to get decode pipeline final state: {:?}", e);
                } else {
                    log::debug!("Decode pipeline final state: {:?}", current);
                }
            }
            Err(e) => log::warn!("Failed to set decode pipeline state to Null: {}", e),
        }

        // Drain pending messages from bus
        let mut drained = 0;
        while self.bus.bus.pop().is_some() {
            drained += 1;
        }
        if drained > 0 {
            log::debug!("Drained {} pending messages from bus", drained);
        }
    }
}

impl Drop for GstDecodePipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Builds [`GstDecodePipeline`]s resampling to a fixed rate
pub struct GstDecodeBackend {
    rate: i32,
}

impl GstDecodeBackend {
    pub fn new(rate: i32) -> Result<Self> {
        super::initialize_gstreamer()?;
        Ok(Self { rate })
    }
}

impl DecodeBackend for GstDecodeBackend {
    type Pipeline = GstDecodePipeline;

    fn build(&self, path: &Path) -> Result<GstDecodePipeline, BridgeError> {
        GstDecodePipeline::new(path, self.rate).map_err(|e| BridgeError::Pipeline(format!("{:#}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pcm_samples() {
        assert_eq!(pcm_samples(&[0x01, 0x00, 0xff, 0xff]), vec![1, -1]);
        // Trailing odd byte is dropped
        assert_eq!(pcm_samples(&[0x2c, 0x01, 0x07]), vec![300]);
        assert!(pcm_samples(&[]).is_empty());
    }

    #[test]
    fn test_clock_time_conversion() {
        assert_eq!(
            clock_time(Duration::from_millis(100)),
            gst::ClockTime::from_mseconds(100)
        );
    }
}
