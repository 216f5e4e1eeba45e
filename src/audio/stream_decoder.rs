//! Generic stream decoder trait and the block types it hands out.

use serde::Serialize;

use crate::error::DecodeError;

/// Output rate of every decoder in this crate.
pub const OUTPUT_SAMPLE_RATE: u32 = 48_000;
/// Output channel count of every decoder in this crate.
pub const OUTPUT_CHANNELS: usize = 2;

/// Shape of the samples a decoder produces. Fixed for the lifetime of a
/// decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: usize,
    pub interleaved: bool,
}

/// A trait for audio stream decoders that pull compressed data from their
/// source and produce 32-bit float PCM.
///
/// The layout is queried rather than assumed so decoders with another
/// layout can sit behind the same interface.
pub trait StreamDecoder: Send {
    fn sample_rate(&self) -> u32;

    fn channels(&self) -> usize;

    fn is_interleaved(&self) -> bool;

    /// Decode the next block.
    ///
    /// The block borrows buffers owned by the decoder, so it cannot outlive
    /// the next call.
    fn decode_next(&mut self) -> Result<DecodeStatus<'_>, DecodeError>;

    fn format(&self) -> AudioFormat {
        AudioFormat {
            sample_rate: self.sample_rate(),
            channels: self.channels(),
            interleaved: self.is_interleaved(),
        }
    }
}

/// Outcome of a successful decode step.
#[derive(Debug)]
pub enum DecodeStatus<'a> {
    /// At least one frame was decoded.
    Block(DecodedBlock<'a>),
    /// No further audio. Repeated calls keep returning this.
    EndOfStream,
}

/// Borrowed view of one decoded block: one slice per channel, all of the
/// same length.
#[derive(Debug, Clone, Copy)]
pub struct DecodedBlock<'a> {
    planes: [&'a [f32]; OUTPUT_CHANNELS],
}

impl<'a> DecodedBlock<'a> {
    pub(crate) fn new(left: &'a [f32], right: &'a [f32]) -> Self {
        debug_assert_eq!(left.len(), right.len());
        Self { planes: [left, right] }
    }

    pub fn frames(&self) -> usize {
        self.planes[0].len()
    }

    /// Samples of one channel, `None` past the last channel.
    pub fn channel(&self, index: usize) -> Option<&'a [f32]> {
        self.planes.get(index).copied()
    }

    pub fn planes(&self) -> &[&'a [f32]; OUTPUT_CHANNELS] {
        &self.planes
    }

    /// Copy the block out so it survives the next decode call.
    pub fn to_owned_block(&self) -> PcmBlock {
        PcmBlock {
            channels: self.planes.map(|plane| plane.to_vec()),
        }
    }

    /// Copy the block out as `L R L R ...`.
    pub fn to_interleaved(&self) -> Vec<f32> {
        let [left, right] = self.planes;
        left.iter().zip(right).flat_map(|(&l, &r)| [l, r]).collect()
    }
}

/// Owned planar block, safe to keep or send to another thread.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PcmBlock {
    pub channels: [Vec<f32>; OUTPUT_CHANNELS],
}

impl PcmBlock {
    pub fn frames(&self) -> usize {
        self.channels[0].len()
    }
}
