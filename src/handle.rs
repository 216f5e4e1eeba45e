//! The stream handle: lifecycle of one opened stream.
//!
//! `Ready → Decoding → (Ended | Failed)`, closed by [`StreamHandle::close`]
//! or by dropping the handle.

use crate::audio::{AudioFormat, DecodeStatus, StreamDecoder, SymphoniaDecoder};
use crate::config::DecoderOptions;
use crate::error::{DecodeError, OpenError};
use crate::locator::Locator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Opened, nothing decoded yet.
    Ready,
    /// At least one block was returned.
    Decoding,
    /// End of stream was reported.
    Ended,
    /// A decode step failed.
    Failed,
}

/// One opened stream.
///
/// Each handle owns its source and codec and shares nothing with other
/// handles. `decode_next` takes `&mut self`, so one call is in flight at a
/// time.
pub struct StreamHandle {
    decoder: Box<dyn StreamDecoder>,
    source: String,
    state: StreamState,
    blocks: u64,
    frames: u64,
}

impl StreamHandle {
    /// Open `locator` with the default options.
    ///
    /// Accepts `http://`, `https://`, `file://` URLs and plain paths.
    pub fn open(locator: &str) -> Result<Self, OpenError> {
        Self::open_with(locator, &DecoderOptions::default())
    }

    pub fn open_with(locator: &str, options: &DecoderOptions) -> Result<Self, OpenError> {
        let locator = Locator::parse(locator)?;
        let decoder = SymphoniaDecoder::open(&locator, options)?;
        log::info!("Stream opened: {}", locator);
        Ok(Self::from_decoder(Box::new(decoder), locator.to_string()))
    }

    /// Wrap an already opened decoder.
    ///
    /// * `decoder` - Decoder to drive
    /// * `source`  - Name used in log lines
    pub fn from_decoder(decoder: Box<dyn StreamDecoder>, source: impl Into<String>) -> Self {
        Self {
            decoder,
            source: source.into(),
            state: StreamState::Ready,
            blocks: 0,
            frames: 0,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.decoder.sample_rate()
    }

    pub fn channel_count(&self) -> usize {
        self.decoder.channels()
    }

    pub fn is_interleaved(&self) -> bool {
        self.decoder.is_interleaved()
    }

    pub fn format(&self) -> AudioFormat {
        self.decoder.format()
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn blocks_decoded(&self) -> u64 {
        self.blocks
    }

    pub fn frames_decoded(&self) -> u64 {
        self.frames
    }

    /// Decode the next block.
    ///
    /// Returns a block of at least one frame, or `EndOfStream` (also on
    /// every later call). After an error every later call returns
    /// [`DecodeError::Terminated`].
    pub fn decode_next(&mut self) -> Result<DecodeStatus<'_>, DecodeError> {
        match self.state {
            StreamState::Ended => return Ok(DecodeStatus::EndOfStream),
            StreamState::Failed => return Err(DecodeError::Terminated),
            StreamState::Ready | StreamState::Decoding => {}
        }

        match self.decoder.decode_next() {
            Ok(DecodeStatus::Block(block)) => {
                self.state = StreamState::Decoding;
                self.blocks += 1;
                self.frames += block.frames() as u64;
                log::debug!("{}: block {} with {} frames", self.source, self.blocks, block.frames());
                Ok(DecodeStatus::Block(block))
            }
            Ok(DecodeStatus::EndOfStream) => {
                self.state = StreamState::Ended;
                log::info!("{}: end of stream after {} frames", self.source, self.frames);
                Ok(DecodeStatus::EndOfStream)
            }
            Err(e) => {
                self.state = StreamState::Failed;
                log::error!("{}: decode failed: {}", self.source, e);
                Err(e)
            }
        }
    }

    /// Release the source and the codec.
    pub fn close(self) {}
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        log::info!(
            "Stream closed: {} ({:?}, {} blocks, {} frames)",
            self.source,
            self.state,
            self.blocks,
            self.frames
        );
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use symphonia::core::probe::Hint;

    use super::*;
    use crate::audio::{OUTPUT_CHANNELS, OUTPUT_SAMPLE_RATE};
    use crate::test_util::{TempFile, generate_sine_wav};

    fn in_memory(sample_rate: u32, channels: u16, frames: usize) -> StreamHandle {
        let source = Box::new(Cursor::new(generate_sine_wav(440.0, frames, sample_rate, channels)));
        let mut hint = Hint::new();
        hint.with_extension("wav");
        let decoder =
            SymphoniaDecoder::from_source(source, hint, &DecoderOptions::default()).unwrap();
        StreamHandle::from_decoder(Box::new(decoder), "memory")
    }

    fn drain(handle: &mut StreamHandle) -> usize {
        let mut frames = 0;
        while let DecodeStatus::Block(block) = handle.decode_next().unwrap() {
            assert!(block.frames() > 0);
            frames += block.frames();
        }
        frames
    }

    /// Fails on the first call.
    struct BrokenDecoder;

    impl StreamDecoder for BrokenDecoder {
        fn sample_rate(&self) -> u32 {
            OUTPUT_SAMPLE_RATE
        }

        fn channels(&self) -> usize {
            OUTPUT_CHANNELS
        }

        fn is_interleaved(&self) -> bool {
            false
        }

        fn decode_next(&mut self) -> Result<DecodeStatus<'_>, DecodeError> {
            Err(DecodeError::Codec("broken".to_string()))
        }
    }

    #[test]
    fn format_is_fixed() {
        let handle = in_memory(22_050, 1, 100);
        assert_eq!(handle.sample_rate(), 48_000);
        assert_eq!(handle.channel_count(), 2);
        assert!(!handle.is_interleaved());
        assert_eq!(handle.state(), StreamState::Ready);
    }

    #[test]
    fn drains_native_rate_exactly() {
        let mut handle = in_memory(48_000, 2, 12_345);
        assert_eq!(drain(&mut handle), 12_345);
        assert_eq!(handle.frames_decoded(), 12_345);
        assert_eq!(handle.state(), StreamState::Ended);
    }

    #[test]
    fn end_of_stream_repeats() {
        let mut handle = in_memory(48_000, 1, 10);
        drain(&mut handle);
        for _ in 0..3 {
            assert!(matches!(handle.decode_next(), Ok(DecodeStatus::EndOfStream)));
        }
    }

    #[test]
    fn failure_is_terminal() {
        let mut handle = StreamHandle::from_decoder(Box::new(BrokenDecoder), "broken");
        assert!(matches!(handle.decode_next(), Err(DecodeError::Codec(_))));
        assert_eq!(handle.state(), StreamState::Failed);
        assert!(matches!(handle.decode_next(), Err(DecodeError::Terminated)));
        handle.close();
    }

    #[test]
    fn opens_plain_path_and_file_url() {
        let wav = TempFile::wav(960, 48_000, 2);
        let mut by_path = StreamHandle::open(&wav.locator()).unwrap();
        assert_eq!(drain(&mut by_path), 960);

        let mut by_url = StreamHandle::open(&wav.file_url()).unwrap();
        assert_eq!(drain(&mut by_url), 960);
    }

    #[test]
    fn missing_file_fails_to_open() {
        assert!(matches!(
            StreamHandle::open("/nonexistent/ffsd-missing.wav"),
            Err(OpenError::Io(_))
        ));
    }
}
