//! Audio I/O seam.
//!
//! Sessions only ever talk to an [`AudioDevice`]: one blocking recording or
//! one blocking playback at a time, never both.

use crate::config::MAX_DURATION_SECS;
use crate::error::{ModemError, Result};

/// Blocking mono audio endpoint.
pub trait AudioDevice {
    /// Rate of every buffer recorded from the device.
    fn sample_rate(&self) -> u32;

    /// Record `duration_secs` of audio. Returns once the whole window has
    /// been captured.
    fn record(&mut self, duration_secs: f32) -> Result<Vec<f32>>;

    /// Play `samples` and return once playback has finished.
    fn play(&mut self, samples: &[f32], sample_rate: u32) -> Result<()>;
}

impl<D: AudioDevice + ?Sized> AudioDevice for &mut D {
    fn sample_rate(&self) -> u32 {
        (**self).sample_rate()
    }

    fn record(&mut self, duration_secs: f32) -> Result<Vec<f32>> {
        (**self).record(duration_secs)
    }

    fn play(&mut self, samples: &[f32], sample_rate: u32) -> Result<()> {
        (**self).play(samples, sample_rate)
    }
}

/// In-memory device.
///
/// The script is what the microphone hears over successive `record` calls:
/// each call consumes the next window of it, and reads past its end return
/// silence. Playback does not consume the script; played buffers are kept
/// for inspection.
#[derive(Debug, Clone, Default)]
pub struct ReplayDevice {
    sample_rate: u32,
    script: Vec<f32>,
    cursor: usize,
    played: Vec<Vec<f32>>,
}

impl ReplayDevice {
    pub fn new(sample_rate: u32, script: Vec<f32>) -> Self {
        Self {
            sample_rate,
            script,
            cursor: 0,
            played: Vec::new(),
        }
    }

    /// Device whose microphone hears nothing.
    pub fn silent(sample_rate: u32) -> Self {
        Self::new(sample_rate, Vec::new())
    }

    /// Append to the unheard part of the script.
    pub fn extend_script(&mut self, samples: &[f32]) {
        self.script.extend_from_slice(samples);
    }

    /// Samples of the script not yet recorded.
    pub fn remaining(&self) -> usize {
        self.script.len().saturating_sub(self.cursor)
    }

    /// Every buffer passed to `play`, in order.
    pub fn played(&self) -> &[Vec<f32>] {
        &self.played
    }

    /// All played buffers back to back.
    pub fn played_samples(&self) -> Vec<f32> {
        self.played.concat()
    }
}

impl AudioDevice for ReplayDevice {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn record(&mut self, duration_secs: f32) -> Result<Vec<f32>> {
        if !(duration_secs >= 0.0 && duration_secs <= MAX_DURATION_SECS) {
            return Err(ModemError::Device(format!(
                "invalid recording duration {}",
                duration_secs
            )));
        }

        let len = (duration_secs * self.sample_rate as f32).round() as usize;
        let start = self.cursor.min(self.script.len());
        let end = (self.cursor + len).min(self.script.len());

        let mut window = self.script[start..end].to_vec();
        window.resize(len, 0.0);
        self.cursor += len;

        log::debug!("replay: recorded {} samples, {} left", len, self.remaining());
        Ok(window)
    }

    fn play(&mut self, samples: &[f32], sample_rate: u32) -> Result<()> {
        if sample_rate != self.sample_rate {
            return Err(ModemError::Device(format!(
                "device runs at {} Hz, asked to play {} Hz",
                self.sample_rate, sample_rate
            )));
        }
        self.played.push(samples.to_vec());
        Ok(())
    }
}
