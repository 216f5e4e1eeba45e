//! ffsd - streaming audio decoder
//!
//! Opens a stream from an HTTP(S) URL or a local file and hands out decoded
//! audio block by block as planar 32-bit float, stereo, 48 kHz, whatever
//! the source format is. The same contract is exported to C from [`ffi`].

pub mod audio;
pub mod config;
pub mod error;
pub mod ffi;
pub mod handle;
pub mod locator;
pub mod source;

#[cfg(test)]
mod test_util;

pub use audio::{
    AudioFormat, DecodeStatus, DecodeWorker, DecodedBlock, OUTPUT_CHANNELS, OUTPUT_SAMPLE_RATE,
    PcmBlock, StreamDecoder, WorkerEvent,
};
pub use config::{Config, DecoderOptions};
pub use error::{DecodeError, OpenError};
pub use handle::{StreamHandle, StreamState};
pub use locator::Locator;
