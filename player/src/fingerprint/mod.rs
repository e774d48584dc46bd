//! Acoustic fingerprint bridge
//!
//! Decodes a single audio file, feeds the decoded samples to an extractor and
//! submits the finished fingerprint to a remote identification service:
//!
//! - `pipeline`: decode pipeline, bus and sample consumer traits
//! - `extractor`: the extractor interface and the bundled PCM window extractor
//! - `submit`: the HTTP submitter and response parsing
//! - `bridge`: [`FingerprintBridge`], the blocking decode session
//!
//! # Outcome codes
//!
//! | status          | code | size            |
//! |-----------------|------|-----------------|
//! | `Ok`            | 0    | `winsize/2 + 1` |
//! | `Failed`        | -1   | 0               |
//! | `Cancelled`     | -2   | 0               |
//! | `SubmitFailed`  | -3   | 0               |
//! | `NoFingerprint` | -4   | 0               |

mod bridge;
mod extractor;
mod pipeline;
mod submit;

pub use bridge::FingerprintBridge;
pub use extractor::{Extractor, FingerprintParams, PcmWindowExtractor};
pub use pipeline::{BusMessage, DecodeBackend, DecodePipeline, MessageBus, SampleConsumer};
pub use submit::{HttpSubmitter, Submitter, parse_fingerprint_id};
