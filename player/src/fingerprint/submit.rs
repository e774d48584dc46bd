//! Fingerprint submission to the remote identification service

use crate::config::FingerprintSettings;
use common::{BridgeError, TrackHints};
use reqwest::blocking::{Client, multipart};
use std::time::Duration;

/// Sends a finished fingerprint and returns the identifier the service assigns
pub trait Submitter: Send + Sync + 'static {
    fn submit(&self, fingerprint: &[u8], hints: &TrackHints) -> Result<i64, BridgeError>;
}

/// Parse the identifier from a service response
///
/// The service answers with the numeric identifier as the first token,
/// optionally followed by a status word.
pub fn parse_fingerprint_id(body: &str) -> Result<i64, BridgeError> {
    body.split_whitespace()
        .next()
        .and_then(|token| token.parse::<i64>().ok())
        .filter(|id| *id >= 0)
        .ok_or_else(|| BridgeError::InvalidResponse(body.trim().to_string()))
}

/// Multipart HTTP POST submitter
pub struct HttpSubmitter {
    client: Client,
    url: String,
    field_name: String,
    retries: u32,
}

impl HttpSubmitter {
    /// Must not be called from within an async runtime (blocking client)
    pub fn new(settings: &FingerprintSettings) -> Result<Self, BridgeError> {
        let client = Client::builder()
            .timeout(settings.request_timeout())
            .user_agent(concat!("bpctl/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BridgeError::Submit(e.to_string()))?;

        Ok(Self {
            client,
            url: settings.server_url.clone(),
            field_name: settings.field_name.clone(),
            retries: settings.submit_retries,
        })
    }

    fn post(&self, fingerprint: &[u8], hints: &TrackHints) -> Result<String, reqwest::Error> {
        let part = multipart::Part::bytes(fingerprint.to_vec()).file_name("fingerprint");
        let form = multipart::Form::new().part(self.field_name.clone(), part);

        self.client
            .post(&self.url)
            .query(hints)
            .multipart(form)
            .send()?
            .error_for_status()?
            .text()
    }
}

impl Submitter for HttpSubmitter {
    fn submit(&self, fingerprint: &[u8], hints: &TrackHints) -> Result<i64, BridgeError> {
        let mut attempt = 0;

        loop {
            match self.post(fingerprint, hints) {
                Ok(body) => {
                    log::debug!("Fingerprint service answered: {}", body.trim());
                    return parse_fingerprint_id(&body);
                }
                Err(e) if attempt < self.retries && is_transient(&e) => {
                    attempt += 1;
                    log::warn!(
                        "Fingerprint submission failed ({}), retry {}/{}",
                        e,
                        attempt,
                        self.retries
                    );
                    std::thread::sleep(Duration::from_millis(500 * u64::from(attempt)));
                }
                Err(e) => return Err(BridgeError::Submit(e.to_string())),
            }
        }
    }
}

fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout()
        || e.is_connect()
        || e.is_request()
        || e.status().is_some_and(|s| s.is_server_error())
}
