//! Test fixtures: generated WAV audio and temp files.
//!
//! Also compiled into the integration tests through `tests/common`.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Generate a 16-bit PCM WAV file containing a half-scale sine wave.
///
/// # Arguments
/// * `freq_hz` - Frequency of the sine wave (e.g. 440.0 for A4)
/// * `frames` - Number of frames
/// * `sample_rate` - Sample rate (e.g. 44100 or 48000)
/// * `channels` - Number of channels, every channel carries the same signal
pub fn generate_sine_wav(freq_hz: f32, frames: usize, sample_rate: u32, channels: u16) -> Vec<u8> {
    let data_size = frames * channels as usize * 2;
    let mut wav = Vec::with_capacity(44 + data_size);

    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_size as u32).to_le_bytes());
    wav.extend_from_slice(b"WAVE");

    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
    wav.extend_from_slice(&channels.to_le_bytes());
    wav.extend_from_slice(&sample_rate.to_le_bytes());
    wav.extend_from_slice(&(sample_rate * channels as u32 * 2).to_le_bytes());
    wav.extend_from_slice(&(channels * 2).to_le_bytes());
    wav.extend_from_slice(&16u16.to_le_bytes());

    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&(data_size as u32).to_le_bytes());

    for i in 0..frames {
        let t = i as f32 / sample_rate as f32;
        let sample = ((std::f32::consts::TAU * freq_hz * t).sin() * 0.5 * i16::MAX as f32) as i16;
        for _ in 0..channels {
            wav.extend_from_slice(&sample.to_le_bytes());
        }
    }
    wav
}

static NEXT_FILE: AtomicUsize = AtomicUsize::new(0);

/// A file in the temp directory, removed on drop.
pub struct TempFile {
    path: PathBuf,
}

impl TempFile {
    pub fn new(extension: &str, bytes: &[u8]) -> Self {
        let id = NEXT_FILE.fetch_add(1, Ordering::Relaxed);
        let path = std::env::temp_dir().join(format!(
            "ffsd-test-{}-{}.{}",
            std::process::id(),
            id,
            extension
        ));
        std::fs::write(&path, bytes).unwrap();
        Self { path }
    }

    /// 440 Hz sine WAV.
    pub fn wav(frames: usize, sample_rate: u32, channels: u16) -> Self {
        Self::new("wav", &generate_sine_wav(440.0, frames, sample_rate, channels))
    }

    pub fn locator(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    pub fn file_url(&self) -> String {
        url::Url::from_file_path(&self.path).unwrap().to_string()
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}
