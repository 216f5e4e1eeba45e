//! Streaming sample-rate conversion to the fixed output rate.

use super::frame::{Frame, interpolate_frame};

/// Converts a stream of stereo frames from one rate to another, one input
/// frame at a time, carrying interpolation history across calls.
///
/// Output is delayed by two input frames; [`Resampler::flush`] emits that
/// tail at end of stream.
pub struct Resampler {
    input_rate: u32,
    output_rate: u32,
    /// Input frames advanced per output frame.
    step: f64,
    /// `[previous, current, next_1, next_2]`, output lies between `current` and `next_1`.
    window: [Frame; 4],
    /// Position between `current` and `next_1`.
    fraction: f64,
    /// Input frames pushed so far, saturating at the window priming length.
    primed: usize,
}

const PRIMING_FRAMES: usize = 2;

impl Resampler {
    /// * `input_rate`  - Rate of the decoded stream (e.g. 44100)
    /// * `output_rate` - Rate of the produced frames (e.g. 48000)
    pub fn new(input_rate: u32, output_rate: u32) -> Self {
        let input_rate = input_rate.max(1);
        let output_rate = output_rate.max(1);
        Self {
            input_rate,
            output_rate,
            step: input_rate as f64 / output_rate as f64,
            window: [Frame::ZERO; 4],
            fraction: 0.0,
            primed: 0,
        }
    }

    pub fn input_rate(&self) -> u32 {
        self.input_rate
    }

    pub fn is_passthrough(&self) -> bool {
        self.input_rate == self.output_rate
    }

    /// Resample `input`, appending the produced frames to `output`.
    pub fn process(&mut self, input: &[Frame], output: &mut Vec<Frame>) {
        if self.is_passthrough() {
            output.extend_from_slice(input);
            return;
        }
        output.reserve((input.len() as f64 / self.step).ceil() as usize + 1);
        for &frame in input {
            self.push_frame(frame, output);
        }
    }

    /// Emit what is still held back by the interpolation window and reset.
    pub fn flush(&mut self, output: &mut Vec<Frame>) {
        if !self.is_passthrough() && self.primed > 0 {
            for _ in 0..PRIMING_FRAMES {
                self.push_frame(Frame::ZERO, output);
            }
        }
        self.window = [Frame::ZERO; 4];
        self.fraction = 0.0;
        self.primed = 0;
    }

    fn push_frame(&mut self, frame: Frame, output: &mut Vec<Frame>) {
        self.window.rotate_left(1);
        self.window[3] = frame;

        if self.primed < PRIMING_FRAMES {
            self.primed += 1;
            return;
        }
        self.primed = PRIMING_FRAMES + 1;

        let [previous, current, next_1, next_2] = self.window;
        while self.fraction < 1.0 {
            output.push(interpolate_frame(previous, current, next_1, next_2, self.fraction as f32));
            self.fraction += self.step;
        }
        self.fraction -= 1.0;
    }
}
