//! audio - Decoding of compressed streams to fixed-format PCM
//!
//! Symphonia does the demuxing and codec work. Everything it produces is
//! folded to stereo and resampled to 48 kHz before it leaves this module.

mod frame;
mod resampler;
pub mod stream_decoder;
mod symphonia_decoder;
mod worker;

pub use stream_decoder::{
    AudioFormat, DecodeStatus, DecodedBlock, OUTPUT_CHANNELS, OUTPUT_SAMPLE_RATE, PcmBlock,
    StreamDecoder,
};
pub use symphonia_decoder::SymphoniaDecoder;
pub use worker::{DecodeWorker, WorkerEvent};
