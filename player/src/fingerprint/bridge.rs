//! Decode-and-submit session driving one fingerprint at a time
//!
//! [`FingerprintBridge::decode`] blocks the calling thread: it builds a
//! pipeline for the file, probes its sample rate, plays it and polls the bus
//! until end-of-stream or an error. Buffers reach the extractor through the
//! sample consumer on the pipeline's streaming thread; once a fingerprint is
//! ready it is submitted from there and a synthetic end-of-stream stops the
//! decode early.
//!
//! Decodes on one bridge are serialized: a second caller waits until the
//! running decode has returned, so each session owns the extractor, its
//! completion slot and its quit flag for its whole duration.
//!
//! [`FingerprintBridge::cancel`] may be called from any other thread while a
//! decode runs. It shares one mutex with the teardown step so a cancellation
//! is either observed by teardown or arrives after the pipeline was released.
//! Teardown releases that mutex before stopping the pipeline, which may wait
//! for a submission still running on the streaming thread; `cancel` never
//! waits for it.

use super::extractor::{Extractor, FingerprintParams};
use super::pipeline::{BusMessage, DecodeBackend, DecodePipeline, MessageBus, SampleConsumer};
use super::submit::Submitter;
use crate::config::FingerprintSettings;
use common::{BridgeError, DecodeOutcome, DecodeStatus, TrackHints};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

type Completion = Arc<Mutex<Option<Result<i64, BridgeError>>>>;

/// State guarded by the cancellation mutex
#[derive(Default)]
struct CancelState {
    /// Set by `cancel`, checked by teardown
    invalidate: bool,

    /// Bus of the pipeline currently decoding
    bus: Option<Arc<dyn MessageBus>>,
}

/// Fingerprint extraction bridge
pub struct FingerprintBridge<B: DecodeBackend, S: Submitter, E: Extractor> {
    params: FingerprintParams,
    backend: B,
    submitter: Arc<S>,
    extractor: Arc<Mutex<E>>,
    poll_interval: Duration,
    state_timeout: Duration,
    cancel: Mutex<CancelState>,

    /// Held for the whole of a decode
    session: Mutex<()>,
}

impl<B: DecodeBackend, S: Submitter, E: Extractor> FingerprintBridge<B, S, E> {
    pub fn new(settings: &FingerprintSettings, backend: B, submitter: S, mut extractor: E) -> Self {
        let params = FingerprintParams::from(settings);
        extractor.init_for_query(&params);

        log::debug!(
            "Fingerprint bridge initialized (rate={}, seconds={}, winsize={})",
            params.rate,
            params.seconds,
            params.winsize
        );

        Self {
            params,
            backend,
            submitter: Arc::new(submitter),
            extractor: Arc::new(Mutex::new(extractor)),
            poll_interval: settings.poll_interval(),
            state_timeout: settings.state_timeout(),
            cancel: Mutex::new(CancelState::default()),
            session: Mutex::new(()),
        }
    }

    pub fn params(&self) -> &FingerprintParams {
        &self.params
    }

    /// Decode `path` and return the identifier the service assigned
    pub fn decode(&self, path: &Path) -> DecodeOutcome {
        self.decode_with_hints(path, &TrackHints::default())
    }

    /// Decode `path`, sending `hints` along with the fingerprint
    ///
    /// Blocks until any decode already running on this bridge has finished.
    pub fn decode_with_hints(&self, path: &Path, hints: &TrackHints) -> DecodeOutcome {
        let _session = self.session.lock().unwrap_or_else(PoisonError::into_inner);

        // Set once the consumer has requested end-of-stream
        let quit = Arc::new(AtomicBool::new(false));
        self.lock_cancel().invalidate = false;
        self.lock_extractor().init_for_query(&self.params);

        let mut pipeline = match self.backend.build(path) {
            Ok(pipeline) => pipeline,
            Err(e) => {
                log::error!("Failed to build decode pipeline for {}: {}", path.display(), e);
                return DecodeOutcome::failure(DecodeStatus::Failed);
            }
        };

        let bus = pipeline.bus();
        let completion: Completion = Arc::new(Mutex::new(None));
        pipeline.set_consumer(self.consumer(
            Arc::clone(&bus),
            Arc::clone(&completion),
            Arc::clone(&quit),
            hints,
        ));
        self.lock_cancel().bus = Some(Arc::clone(&bus));

        let rate = pipeline.probe_rate(self.state_timeout).unwrap_or(-1);
        if rate < 0 {
            log::warn!("Could not negotiate a sample rate for {}", path.display());
            self.teardown(&mut pipeline);
            return DecodeOutcome::failure(DecodeStatus::Failed);
        }

        log::info!("Decoding {} ({} Hz)", path.display(), rate);

        if let Err(e) = pipeline.play() {
            log::error!("Failed to start decoding {}: {}", path.display(), e);
            self.teardown(&mut pipeline);
            return DecodeOutcome::failure(DecodeStatus::Failed);
        }

        let mut status = DecodeStatus::Ok;
        loop {
            match bus.timed_pop(self.poll_interval) {
                None => continue,
                Some(BusMessage::Error(message)) => {
                    log::error!("Decode error: {}", message);
                    status = DecodeStatus::Failed;
                    break;
                }
                Some(BusMessage::Eos) => {
                    log::debug!("EOS message received");
                    break;
                }
            }
        }

        if self.teardown(&mut pipeline) {
            log::info!("Decoding of {} was cancelled", path.display());
            return DecodeOutcome::failure(DecodeStatus::Cancelled);
        }

        if status != DecodeStatus::Ok {
            return DecodeOutcome::failure(status);
        }

        let result = completion
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let result = match result {
            Some(result) => Some(result),
            None if !quit.load(Ordering::Acquire) => self.flush(hints),
            None => None,
        };

        match result {
            Some(Ok(id)) => {
                log::info!("Fingerprint id for {}: {}", path.display(), id);
                DecodeOutcome::success(id, self.params.winsize)
            }
            Some(Err(e)) => {
                log::warn!("Fingerprint submission failed: {}", e);
                DecodeOutcome::failure(DecodeStatus::SubmitFailed)
            }
            None => {
                log::warn!("{} ended before a fingerprint was ready", path.display());
                DecodeOutcome::failure(DecodeStatus::NoFingerprint)
            }
        }
    }

    /// Abort a running decode from another thread
    ///
    /// Does nothing when no decode is in progress.
    pub fn cancel(&self) {
        let mut state = self.lock_cancel();

        let Some(bus) = state.bus.as_ref() else {
            return;
        };

        if bus.post_eos() {
            log::debug!("EOS message sent (cancel)");
        } else {
            log::warn!("Failed to post EOS while cancelling");
        }
        state.invalidate = true;
    }

    /// Whether a decode currently owns a pipeline
    pub fn is_decoding(&self) -> bool {
        self.lock_cancel().bus.is_some()
    }

    /// Stop and release the pipeline; returns whether the decode was invalidated
    fn teardown(&self, pipeline: &mut B::Pipeline) -> bool {
        let invalidated = {
            let mut state = self.lock_cancel();
            state.bus = None;
            state.invalidate
        };
        // Cancels from here on find no bus and return at once
        pipeline.stop();
        invalidated
    }

    /// Give the extractor a last chance on whatever audio it has seen
    fn flush(&self, hints: &TrackHints) -> Option<Result<i64, BridgeError>> {
        let fingerprint = {
            let mut extractor = self.lock_extractor();
            if !extractor.process(&[], true) {
                return None;
            }
            extractor.fingerprint()?
        };

        log::debug!("Fingerprint ready at end of stream ({} bytes)", fingerprint.len());
        Some(self.submitter.submit(&fingerprint, hints))
    }

    fn consumer(
        &self,
        bus: Arc<dyn MessageBus>,
        completion: Completion,
        quit: Arc<AtomicBool>,
        hints: &TrackHints,
    ) -> SampleConsumer {
        let extractor = Arc::clone(&self.extractor);
        let submitter = Arc::clone(&self.submitter);
        let hints = hints.clone();

        Box::new(move |samples: &[i16]| {
            // Data keeps flowing until the EOS is processed
            if quit.load(Ordering::Acquire) {
                return true;
            }
            if samples.is_empty() {
                return false;
            }

            let fingerprint = {
                let mut extractor = extractor.lock().unwrap_or_else(PoisonError::into_inner);
                if !extractor.process(samples, false) {
                    return false;
                }
                extractor.fingerprint()
            };

            quit.store(true, Ordering::Release);

            match fingerprint {
                Some(fingerprint) => {
                    log::debug!("Fingerprint ready ({} bytes), submitting", fingerprint.len());
                    let result = submitter.submit(&fingerprint, &hints);
                    *completion.lock().unwrap_or_else(PoisonError::into_inner) = Some(result);
                }
                None => log::warn!("Extractor finished without a fingerprint"),
            }

            if bus.post_eos() {
                log::debug!("EOS message sent");
            }
            true
        })
    }

    fn lock_cancel(&self) -> MutexGuard<'_, CancelState> {
        self.cancel.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_extractor(&self) -> MutexGuard<'_, E> {
        self.extractor.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<B: DecodeBackend, S: Submitter, E: Extractor> Drop for FingerprintBridge<B, S, E> {
    fn drop(&mut self) {
        log::debug!("Fingerprint bridge destroyed");
    }
}
