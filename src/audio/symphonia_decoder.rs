//! Symphonia-backed [`StreamDecoder`].
//!
//! Demuxing and codec work are Symphonia's. This module adapts whatever the
//! codec produces to the fixed output format:
//!
//! - samples converted to `f32`,
//! - channels folded to stereo (mono duplicated, surround folded at -3 dB),
//! - rate converted to [`OUTPUT_SAMPLE_RATE`] by [`Resampler`].

use std::io;

use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Channels, Signal};
use symphonia::core::codecs::{CODEC_TYPE_NULL, Decoder, DecoderOptions as CodecOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, Track};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::frame::Frame;
use super::resampler::Resampler;
use super::stream_decoder::{
    DecodeStatus, DecodedBlock, OUTPUT_CHANNELS, OUTPUT_SAMPLE_RATE, StreamDecoder,
};
use crate::config::DecoderOptions;
use crate::error::{DecodeError, OpenError};
use crate::locator::Locator;
use crate::source::{OpenedSource, open_source};

const FOLD_GAIN: f32 = std::f32::consts::FRAC_1_SQRT_2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Progress {
    Running,
    Ended,
    Failed,
}

/// Result of pulling one packet from the demuxer.
enum Pull {
    /// Packet consumed; output may or may not have grown.
    Consumed,
    /// Demuxer reached the end of its input.
    Exhausted,
}

pub struct SymphoniaDecoder {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    max_consecutive_decode_errors: u32,
    corrupt_in_row: u32,
    progress: Progress,
    stage: OutputStage,
    left: Vec<f32>,
    right: Vec<f32>,
}

/// Turns decoded buffers of any layout and rate into 48 kHz stereo frames.
#[derive(Default)]
struct OutputStage {
    /// Decoded samples converted to `f32`, reused across packets.
    sample_buf: Option<AudioBuffer<f32>>,
    /// Created from the first decoded buffer, rebuilt when the source rate changes.
    resampler: Option<Resampler>,
    folded: Vec<Frame>,
    output: Vec<Frame>,
}

impl OutputStage {
    fn absorb(&mut self, decoded: AudioBufferRef<'_>) {
        let spec = *decoded.spec();
        if decoded.frames() == 0 {
            return;
        }

        let mut buffer = match self.sample_buf.take() {
            Some(buffer) if buffer.capacity() >= decoded.capacity() && *buffer.spec() == spec => buffer,
            _ => AudioBuffer::new(decoded.capacity() as u64, spec),
        };
        decoded.convert(&mut buffer);

        self.folded.clear();
        fold_to_stereo(&buffer, &mut self.folded);
        self.sample_buf = Some(buffer);

        let rate_changed = match &self.resampler {
            Some(resampler) => resampler.input_rate() != spec.rate,
            None => true,
        };
        if rate_changed {
            if let Some(mut previous) = self.resampler.take() {
                log::info!("Source rate changed {} -> {}Hz", previous.input_rate(), spec.rate);
                previous.flush(&mut self.output);
            }
            self.resampler = Some(Resampler::new(spec.rate, OUTPUT_SAMPLE_RATE));
        }
        if let Some(resampler) = self.resampler.as_mut() {
            resampler.process(&self.folded, &mut self.output);
        }
    }

    fn finish(&mut self) {
        if let Some(resampler) = self.resampler.as_mut() {
            resampler.flush(&mut self.output);
        }
    }
}

impl SymphoniaDecoder {
    /// Open `locator`, probe its container and set up the codec.
    pub fn open(locator: &Locator, options: &DecoderOptions) -> Result<Self, OpenError> {
        let OpenedSource { source, hint } = open_source(locator, options)?;
        Self::from_source(source, hint, options)
    }

    /// Probe an already opened byte source.
    pub fn from_source(
        source: Box<dyn MediaSource>,
        hint: Hint,
        options: &DecoderOptions,
    ) -> Result<Self, OpenError> {
        let mss = MediaSourceStream::new(source, Default::default());

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(probe_error)?;
        let format = probed.format;

        let track = select_track(format.as_ref()).ok_or(OpenError::NoAudioTrack)?;
        let track_id = track.id;
        let params = &track.codec_params;

        let decoder = symphonia::default::get_codecs()
            .make(params, &CodecOptions::default())
            .map_err(|e| OpenError::UnsupportedCodec(e.to_string()))?;

        let codec_name = symphonia::default::get_codecs()
            .get_codec(params.codec)
            .map(|descriptor| descriptor.short_name)
            .unwrap_or("unknown");
        log::info!(
            "Decoder opened: codec={}, source rate={:?}, source channels={:?}, output={}Hz/{}ch planar",
            codec_name,
            params.sample_rate,
            params.channels.map(|channels| channels.count()),
            OUTPUT_SAMPLE_RATE,
            OUTPUT_CHANNELS,
        );

        Ok(Self {
            format,
            decoder,
            track_id,
            max_consecutive_decode_errors: options.max_consecutive_decode_errors,
            corrupt_in_row: 0,
            progress: Progress::Running,
            stage: OutputStage::default(),
            left: Vec::new(),
            right: Vec::new(),
        })
    }

    fn pull_packet(&mut self) -> Result<Pull, DecodeError> {
        let packet = match self.format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                return Ok(Pull::Exhausted);
            }
            Err(SymphoniaError::ResetRequired) => {
                self.reset_decoder()?;
                return Ok(Pull::Consumed);
            }
            Err(SymphoniaError::IoError(e)) => return Err(DecodeError::Io(e)),
            Err(e) => return Err(DecodeError::Codec(e.to_string())),
        };

        if packet.track_id() != self.track_id {
            return Ok(Pull::Consumed);
        }

        let decoded = match self.decoder.decode(&packet) {
            Ok(decoded) => {
                self.stage.absorb(decoded);
                Ok(())
            }
            Err(e) => Err(e),
        };

        match decoded {
            Ok(()) => self.corrupt_in_row = 0,
            Err(SymphoniaError::DecodeError(reason)) => self.skip_corrupt_packet(reason)?,
            Err(SymphoniaError::IoError(e)) => self.skip_corrupt_packet(&e.to_string())?,
            Err(SymphoniaError::ResetRequired) => self.reset_decoder()?,
            Err(e) => return Err(DecodeError::Codec(e.to_string())),
        }
        Ok(Pull::Consumed)
    }

    fn skip_corrupt_packet(&mut self, reason: &str) -> Result<(), DecodeError> {
        self.corrupt_in_row += 1;
        log::warn!(
            "Skipping corrupt packet ({}/{}): {}",
            self.corrupt_in_row,
            self.max_consecutive_decode_errors,
            reason
        );
        if self.corrupt_in_row > self.max_consecutive_decode_errors {
            return Err(DecodeError::TooManyCorruptPackets(self.corrupt_in_row));
        }
        Ok(())
    }

    /// Rebuild the codec after the demuxer asked for a reset (e.g. a chained
    /// Ogg stream starting a new logical bitstream).
    fn reset_decoder(&mut self) -> Result<(), DecodeError> {
        let track = select_track(self.format.as_ref())
            .ok_or_else(|| DecodeError::Codec("no audio track after reset".to_string()))?;
        self.track_id = track.id;
        self.decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &CodecOptions::default())
            .map_err(|e| DecodeError::Codec(e.to_string()))?;
        log::info!("Decoder reset for track {}", self.track_id);
        Ok(())
    }

    /// Run packets through the codec until there is output or input ends.
    fn fill_output(&mut self) -> Result<(), DecodeError> {
        while self.stage.output.is_empty() {
            match self.pull_packet()? {
                Pull::Consumed => {}
                Pull::Exhausted => {
                    self.stage.finish();
                    self.progress = Progress::Ended;
                    break;
                }
            }
        }
        Ok(())
    }
}

impl StreamDecoder for SymphoniaDecoder {
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
        match self.progress {
            Progress::Ended => return Ok(DecodeStatus::EndOfStream),
            Progress::Failed => return Err(DecodeError::Terminated),
            Progress::Running => {}
        }

        self.stage.output.clear();
        if let Err(e) = self.fill_output() {
            self.progress = Progress::Failed;
            return Err(e);
        }
        let output = &self.stage.output;
        if output.is_empty() {
            return Ok(DecodeStatus::EndOfStream);
        }

        self.left.clear();
        self.right.clear();
        self.left.extend(output.iter().map(|frame| frame.left));
        self.right.extend(output.iter().map(|frame| frame.right));

        Ok(DecodeStatus::Block(DecodedBlock::new(&self.left, &self.right)))
    }
}

fn probe_error(error: SymphoniaError) -> OpenError {
    match error {
        SymphoniaError::Unsupported(what) => OpenError::UnsupportedFormat(what.to_string()),
        // The probe ran out of input before finding a known container
        SymphoniaError::IoError(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
            OpenError::UnsupportedFormat("no recognisable container before end of input".to_string())
        }
        SymphoniaError::IoError(e) => OpenError::Io(e),
        other => OpenError::UnsupportedFormat(other.to_string()),
    }
}

fn select_track(format: &dyn FormatReader) -> Option<&Track> {
    format
        .tracks()
        .iter()
        .find(|track| track.codec_params.codec != CODEC_TYPE_NULL)
}

/// Append the frames of `buffer` to `out` as stereo.
fn fold_to_stereo(buffer: &AudioBuffer<f32>, out: &mut Vec<Frame>) {
    let spec = buffer.spec();
    let planes = spec.channels.count();
    let frames = buffer.frames();

    match planes {
        0 => {}
        1 => out.extend(buffer.chan(0)[..frames].iter().map(|&s| Frame::from_mono(s))),
        2 => out.extend(
            buffer.chan(0)[..frames]
                .iter()
                .zip(&buffer.chan(1)[..frames])
                .map(|(&l, &r)| Frame::new(l, r)),
        ),
        _ => {
            let gains = fold_gains(spec.channels);
            let start = out.len();
            out.resize(start + frames, Frame::ZERO);
            for (plane, &(gain_left, gain_right)) in gains.iter().enumerate() {
                for (dst, &s) in out[start..].iter_mut().zip(&buffer.chan(plane)[..frames]) {
                    dst.left += s * gain_left;
                    dst.right += s * gain_right;
                }
            }
        }
    }
}

/// Per-plane `(left, right)` gains folding a multichannel layout to stereo.
///
/// Planes are ordered by ascending channel bit, as Symphonia lays them out.
/// Gains are normalised so a full-scale signal on every input channel stays
/// within full scale.
fn fold_gains(channels: Channels) -> Vec<(f32, f32)> {
    let left_side = Channels::FRONT_LEFT_CENTRE | Channels::REAR_LEFT | Channels::SIDE_LEFT;
    let right_side = Channels::FRONT_RIGHT_CENTRE | Channels::REAR_RIGHT | Channels::SIDE_RIGHT;

    let mut gains: Vec<(f32, f32)> = (0..u32::BITS)
        .map(|bit| 1u32 << bit)
        .filter(|bit| channels.bits() & bit != 0)
        .map(|bit| {
            let channel = Channels::from_bits_truncate(bit);
            if channel == Channels::FRONT_LEFT {
                (1.0, 0.0)
            } else if channel == Channels::FRONT_RIGHT {
                (0.0, 1.0)
            } else if channel == Channels::LFE1 {
                (0.0, 0.0)
            } else if left_side.contains(channel) {
                (FOLD_GAIN, 0.0)
            } else if right_side.contains(channel) {
                (0.0, FOLD_GAIN)
            } else {
                (FOLD_GAIN, FOLD_GAIN)
            }
        })
        .collect();

    let total_left: f32 = gains.iter().map(|(l, _)| l).sum();
    let total_right: f32 = gains.iter().map(|(_, r)| r).sum();
    let norm = total_left.max(total_right);
    if norm > 1.0 {
        for (l, r) in &mut gains {
            *l /= norm;
            *r /= norm;
        }
    }
    gains
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use symphonia::core::audio::SignalSpec;

    use super::*;
    use crate::test_util::generate_sine_wav;

    fn wav_decoder(frames: usize, options: &DecoderOptions) -> SymphoniaDecoder {
        let source = Box::new(std::io::Cursor::new(generate_sine_wav(440.0, frames, 48_000, 2)));
        let mut hint = Hint::new();
        hint.with_extension("wav");
        SymphoniaDecoder::from_source(source, hint, options).unwrap()
    }

    fn next_frames(decoder: &mut SymphoniaDecoder) -> usize {
        match decoder.decode_next().unwrap() {
            DecodeStatus::Block(block) => block.frames(),
            DecodeStatus::EndOfStream => 0,
        }
    }

    fn buffer_with(channels: Channels, planes: &[&[f32]]) -> AudioBuffer<f32> {
        let frames = planes[0].len();
        let mut buffer = AudioBuffer::new(frames as u64, SignalSpec::new(44_100, channels));
        buffer.render_reserved(Some(frames));
        for (index, plane) in planes.iter().enumerate() {
            buffer.chan_mut(index).copy_from_slice(plane);
        }
        buffer
    }

    #[test]
    fn mono_is_duplicated() {
        let buffer = buffer_with(Channels::FRONT_CENTRE, &[&[0.1, -0.2, 0.3]]);
        let mut out = Vec::new();
        fold_to_stereo(&buffer, &mut out);
        assert_eq!(
            out,
            vec![Frame::new(0.1, 0.1), Frame::new(-0.2, -0.2), Frame::new(0.3, 0.3)]
        );
    }

    #[test]
    fn stereo_passes_through() {
        let buffer = buffer_with(
            Channels::FRONT_LEFT | Channels::FRONT_RIGHT,
            &[&[0.5, 0.25], &[-0.5, -0.25]],
        );
        let mut out = vec![Frame::ZERO];
        fold_to_stereo(&buffer, &mut out);
        assert_eq!(out, vec![Frame::ZERO, Frame::new(0.5, -0.5), Frame::new(0.25, -0.25)]);
    }

    #[test]
    fn five_one_folds_without_clipping() {
        let layout = Channels::FRONT_LEFT
            | Channels::FRONT_RIGHT
            | Channels::FRONT_CENTRE
            | Channels::LFE1
            | Channels::REAR_LEFT
            | Channels::REAR_RIGHT;
        let gains = fold_gains(layout);
        assert_eq!(gains.len(), 6);
        // LFE is dropped.
        assert_eq!(gains[3], (0.0, 0.0));

        let full: &[f32] = &[1.0];
        let buffer = buffer_with(layout, &[full, full, full, full, full, full]);
        let mut out = Vec::new();
        fold_to_stereo(&buffer, &mut out);
        assert_abs_diff_eq!(out[0].left, 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(out[0].right, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn centre_only_signal_is_balanced() {
        let layout = Channels::FRONT_LEFT | Channels::FRONT_RIGHT | Channels::FRONT_CENTRE;
        let buffer = buffer_with(layout, &[&[0.0], &[0.0], &[0.8]]);
        let mut out = Vec::new();
        fold_to_stereo(&buffer, &mut out);
        assert_abs_diff_eq!(out[0].left, out[0].right, epsilon = 1e-6);
        assert!(out[0].left > 0.0);
    }

    #[test]
    fn garbage_is_not_a_container() {
        let bytes = b"plain text, definitely not audio\n".repeat(64);
        let source = Box::new(std::io::Cursor::new(bytes));
        match SymphoniaDecoder::from_source(source, Hint::new(), &DecoderOptions::default()) {
            Err(OpenError::UnsupportedFormat(_)) => {}
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("garbage was accepted as audio"),
        }
    }

    #[test]
    fn corrupt_packets_are_skipped_up_to_the_limit() {
        let options = DecoderOptions::default().with_max_consecutive_decode_errors(2);
        let mut decoder = wav_decoder(4_800, &options);

        decoder.skip_corrupt_packet("bad frame").unwrap();
        decoder.skip_corrupt_packet("bad frame").unwrap();
        // A good packet ends the run.
        assert!(next_frames(&mut decoder) > 0);
        assert_eq!(decoder.corrupt_in_row, 0);

        decoder.skip_corrupt_packet("bad frame").unwrap();
        decoder.skip_corrupt_packet("bad frame").unwrap();
        match decoder.skip_corrupt_packet("bad frame") {
            Err(DecodeError::TooManyCorruptPackets(count)) => assert_eq!(count, 3),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn reset_rebuilds_the_codec_mid_stream() {
        let mut decoder = wav_decoder(4_800, &DecoderOptions::default());
        let mut frames = next_frames(&mut decoder);
        assert!(frames > 0);

        decoder.reset_decoder().unwrap();
        loop {
            match next_frames(&mut decoder) {
                0 => break,
                n => frames += n,
            }
        }
        assert_eq!(frames, 4_800);
    }
}
