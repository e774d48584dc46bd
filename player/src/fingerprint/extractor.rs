//! Fingerprint extractor interface

use crate::config::FingerprintSettings;

/// Parameters an extractor is initialized with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FingerprintParams {
    /// Sample rate of the PCM fed to the extractor
    pub rate: i32,

    /// Seconds of audio to analyze
    pub seconds: i32,

    /// Analysis window size
    pub winsize: i32,
}

impl From<&FingerprintSettings> for FingerprintParams {
    fn from(settings: &FingerprintSettings) -> Self {
        Self {
            rate: settings.rate,
            seconds: settings.seconds,
            winsize: settings.winsize,
        }
    }
}

/// Converts raw audio into a compact signature
pub trait Extractor: Send + 'static {
    /// Reset the extractor for a new query
    fn init_for_query(&mut self, params: &FingerprintParams);

    /// Feed mono S16 samples; returns `true` once a fingerprint is ready
    fn process(&mut self, pcm: &[i16], end_of_stream: bool) -> bool;

    /// The finished fingerprint, `None` until `process` returned `true`
    fn fingerprint(&self) -> Option<Vec<u8>>;
}

/// Collects a fixed window of PCM and hands it over as the payload
///
/// For services that compute the signature server-side. The payload is
/// `rate * seconds` samples, little-endian, or whatever the stream had when
/// it ended early.
#[derive(Debug, Default)]
pub struct PcmWindowExtractor {
    target: usize,
    samples: Vec<i16>,
    complete: bool,
}

impl PcmWindowExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn collected(&self) -> usize {
        self.samples.len()
    }
}

impl Extractor for PcmWindowExtractor {
    fn init_for_query(&mut self, params: &FingerprintParams) {
        self.target = usize::try_from(params.rate.max(0)).unwrap_or(0)
            * usize::try_from(params.seconds.max(0)).unwrap_or(0);
        self.samples = Vec::with_capacity(self.target);
        self.complete = false;
    }

    fn process(&mut self, pcm: &[i16], end_of_stream: bool) -> bool {
        if self.complete {
            return true;
        }

        let wanted = self.target.saturating_sub(self.samples.len());
        self.samples.extend_from_slice(&pcm[..pcm.len().min(wanted)]);

        self.complete =
            self.samples.len() >= self.target || (end_of_stream && !self.samples.is_empty());
        self.complete
    }

    fn fingerprint(&self) -> Option<Vec<u8>> {
        if !self.complete {
            return None;
        }

        Some(self.samples.iter().flat_map(|s| s.to_le_bytes()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(rate: i32, seconds: i32) -> FingerprintParams {
        FingerprintParams {
            rate,
            seconds,
            winsize: 1024,
        }
    }

    #[test]
    fn test_params_from_settings() {
        let settings = FingerprintSettings::default();
        let params = FingerprintParams::from(&settings);
        assert_eq!(params.rate, settings.rate);
        assert_eq!(params.seconds, settings.seconds);
        assert_eq!(params.winsize, settings.winsize);
    }

    #[test]
    fn test_completes_after_window() {
        let mut extractor = PcmWindowExtractor::new();
        extractor.init_for_query(&params(4, 2));

        assert!(!extractor.process(&[1, 2, 3], false));
        assert!(extractor.fingerprint().is_none());

        // Only the missing samples are kept
        assert!(extractor.process(&[4, 5, 6, 7, 8, 9, 10], false));
        assert_eq!(extractor.collected(), 8);

        let payload = extractor.fingerprint().unwrap();
        assert_eq!(payload.len(), 16);
        assert_eq!(&payload[..4], &[1, 0, 2, 0]);
    }

    #[test]
    fn test_end_of_stream_flushes_partial_window() {
        let mut extractor = PcmWindowExtractor::new();
        extractor.init_for_query(&params(100, 10));

        assert!(!extractor.process(&[-1, 300], false));
        assert!(extractor.process(&[], true));
        assert_eq!(extractor.fingerprint().unwrap(), vec![0xff, 0xff, 0x2c, 0x01]);
    }

    #[test]
    fn test_end_of_stream_without_audio() {
        let mut extractor = PcmWindowExtractor::new();
        extractor.init_for_query(&params(100, 10));
        assert!(!extractor.process(&[], true));
        assert!(extractor.fingerprint().is_none());
    }

    #[test]
    fn test_init_resets_state() {
        let mut extractor = PcmWindowExtractor::new();
        extractor.init_for_query(&params(1, 1));
        assert!(extractor.process(&[7], false));

        extractor.init_for_query(&params(1, 2));
        assert_eq!(extractor.collected(), 0);
        assert!(extractor.fingerprint().is_none());
    }
}
