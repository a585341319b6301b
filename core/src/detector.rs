//! Dominant-tone estimation for fixed-length audio chunks.
//!
//! Both detectors always return *some* frequency, even for silence or pure
//! noise. Callers gate on [`Detection::amplitude`] and, for markers, on the
//! distance to the expected frequency before trusting a result.

use crate::config::{ChannelConfig, DetectorKind};
use crate::error::{ModemError, Result};
use realfft::{RealFftPlanner, RealToComplex};
use std::f32::consts::PI;
use std::sync::Arc;

/// Loudest tone found in a chunk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub frequency: f32,
    /// Estimated peak amplitude of the tone, in sample units.
    pub amplitude: f32,
}

impl Detection {
    pub fn is_near(&self, target: f32, tolerance_hz: f32) -> bool {
        (self.frequency - target).abs() <= tolerance_hz
    }

    pub fn is_signal(&self, floor: f32) -> bool {
        self.amplitude >= floor
    }
}

/// Remove the DC offset so it cannot leak into the lowest bins.
fn remove_dc(samples: &[f32]) -> Vec<f32> {
    if samples.is_empty() {
        return Vec::new();
    }
    let mean = samples.iter().sum::<f32>() / samples.len() as f32;
    samples.iter().map(|s| s - mean).collect()
}

fn hann_window(len: usize) -> Vec<f32> {
    if len < 2 {
        return vec![1.0; len];
    }
    (0..len)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f32 / (len - 1) as f32).cos())
        .collect()
}

/// Broadband detector: real-input FFT, Hann window, loudest bin wins.
pub struct SpectrumDetector {
    sample_rate: f32,
    planner: RealFftPlanner<f32>,
    plan: Option<Arc<dyn RealToComplex<f32>>>,
    plan_len: usize,
    window: Vec<f32>,
    window_sum: f32,
}

impl SpectrumDetector {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate: sample_rate as f32,
            planner: RealFftPlanner::new(),
            plan: None,
            plan_len: 0,
            window: Vec::new(),
            window_sum: 0.0,
        }
    }

    fn prepare(&mut self, len: usize) -> Arc<dyn RealToComplex<f32>> {
        if let Some(plan) = &self.plan {
            if self.plan_len == len {
                return Arc::clone(plan);
            }
        }

        let plan = self.planner.plan_fft_forward(len);
        self.plan_len = len;
        self.window = hann_window(len);
        self.window_sum = self.window.iter().sum();
        self.plan = Some(Arc::clone(&plan));
        plan
    }

    /// Magnitude of every bin from DC to Nyquist.
    pub fn spectrum(&mut self, chunk: &[f32]) -> Result<Vec<f32>> {
        if chunk.is_empty() {
            return Err(ModemError::InsufficientData);
        }

        let plan = self.prepare(chunk.len());
        let mut input = remove_dc(chunk);
        for (sample, &w) in input.iter_mut().zip(self.window.iter()) {
            *sample *= w;
        }

        let mut output = plan.make_output_vec();
        plan.process(&mut input, &mut output)
            .map_err(|e| ModemError::FftError(format!("forward transform failed: {:?}", e)))?;

        Ok(output.iter().map(|c| c.norm()).collect())
    }

    pub fn detect(&mut self, chunk: &[f32]) -> Result<Detection> {
        let magnitudes = self.spectrum(chunk)?;
        let n = chunk.len() as f32;

        // Bin 0 is DC and never a carrier.
        let mut peak = 1.min(magnitudes.len() - 1);
        for (bin, &m) in magnitudes.iter().enumerate().skip(1) {
            if m > magnitudes[peak] {
                peak = bin;
            }
        }

        // Parabolic interpolation around the peak for sub-bin accuracy.
        let mut offset = 0.0;
        if peak > 0 && peak + 1 < magnitudes.len() {
            let (a, b, c) = (magnitudes[peak - 1], magnitudes[peak], magnitudes[peak + 1]);
            let denom = a - 2.0 * b + c;
            if denom.abs() > f32::EPSILON {
                offset = (0.5 * (a - c) / denom).clamp(-0.5, 0.5);
            }
        }

        let amplitude = if self.window_sum > 0.0 {
            2.0 * magnitudes[peak] / self.window_sum
        } else {
            0.0
        };

        Ok(Detection {
            frequency: (peak as f32 + offset) * self.sample_rate / n,
            amplitude,
        })
    }

    /// Detect every `chunk_len` window of `samples`, advancing by `hop`.
    /// A recording shorter than one chunk is analysed as a single chunk.
    pub fn scan(
        &mut self,
        samples: &[f32],
        chunk_len: usize,
        hop: usize,
    ) -> Result<Vec<(usize, Detection)>> {
        if samples.is_empty() || chunk_len == 0 {
            return Ok(Vec::new());
        }
        if samples.len() < chunk_len {
            return Ok(vec![(0, self.detect(samples)?)]);
        }

        let hop = hop.max(1);
        let mut detections = Vec::with_capacity((samples.len() - chunk_len) / hop + 1);
        let mut offset = 0;
        while offset + chunk_len <= samples.len() {
            detections.push((offset, self.detect(&samples[offset..offset + chunk_len])?));
            offset += hop;
        }
        Ok(detections)
    }
}

/// Power of `frequency` in `samples` via the Goertzel recurrence.
pub fn goertzel_power(samples: &[f32], frequency: f32, sample_rate: f32) -> f32 {
    let omega = 2.0 * PI * frequency / sample_rate;
    let coeff = 2.0 * omega.cos();

    let mut q1 = 0.0f32;
    let mut q2 = 0.0f32;
    for &sample in samples {
        let q0 = coeff * q1 - q2 + sample;
        q2 = q1;
        q1 = q0;
    }

    (q1 * q1 + q2 * q2 - coeff * q1 * q2).max(0.0)
}

/// Narrowband detector: one resonant filter per candidate carrier.
#[derive(Debug, Clone)]
pub struct GoertzelDetector {
    sample_rate: f32,
    candidates: Vec<f32>,
}

impl GoertzelDetector {
    pub fn new(sample_rate: u32, candidates: Vec<f32>) -> Self {
        Self {
            sample_rate: sample_rate as f32,
            candidates,
        }
    }

    pub fn candidates(&self) -> &[f32] {
        &self.candidates
    }

    pub fn detect(&self, chunk: &[f32]) -> Result<Detection> {
        if chunk.is_empty() || self.candidates.is_empty() {
            return Err(ModemError::InsufficientData);
        }

        let conditioned = remove_dc(chunk);
        let mut best = self.candidates[0];
        let mut best_power = -1.0f32;
        for &freq in &self.candidates {
            let power = goertzel_power(&conditioned, freq, self.sample_rate);
            if power > best_power {
                best_power = power;
                best = freq;
            }
        }

        Ok(Detection {
            frequency: best,
            amplitude: 2.0 * best_power.sqrt() / chunk.len() as f32,
        })
    }
}

/// Either detector behind one call site.
pub enum FrequencyDetector {
    Spectrum(SpectrumDetector),
    Goertzel(GoertzelDetector),
}

impl FrequencyDetector {
    /// Detector for payload chunks. Goertzel candidates include the marker
    /// tones so a preamble or ACK after the payload is recognised as such.
    pub fn for_payload(config: &ChannelConfig) -> Self {
        match config.detector {
            DetectorKind::Spectrum => {
                FrequencyDetector::Spectrum(SpectrumDetector::new(config.sample_rate))
            }
            DetectorKind::Goertzel => {
                let mut candidates = config.symbol_table.frequencies().to_vec();
                candidates.extend(config.marker_frequencies());
                FrequencyDetector::Goertzel(GoertzelDetector::new(config.sample_rate, candidates))
            }
        }
    }

    pub fn detect(&mut self, chunk: &[f32]) -> Result<Detection> {
        match self {
            FrequencyDetector::Spectrum(d) => d.detect(chunk),
            FrequencyDetector::Goertzel(d) => d.detect(chunk),
        }
    }
}
