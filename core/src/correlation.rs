//! FFT-based cross-correlation for real-valued signals.
//!
//! Output indexing follows the usual `correlate` convention: in
//! [`Mode::Full`] index `k` is the lag where `template[M-1]` lines up with
//! `signal[k]`, so the window starting at `signal[i]` lives at
//! `i + M - 1`. [`Mode::Valid`] keeps only the fully overlapping windows,
//! indexed directly by their start sample.

use crate::error::{ModemError, Result};
use realfft::RealFftPlanner;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// `signal.len() + template.len() - 1` samples.
    Full,
    /// `signal.len() - template.len() + 1` samples, empty if the template
    /// is longer than the signal.
    Valid,
}

/// Correlate `template` against `signal` in O(N log N).
pub fn fft_correlate_1d(signal: &[f32], template: &[f32], mode: Mode) -> Result<Vec<f32>> {
    if signal.is_empty() || template.is_empty() {
        return Ok(Vec::new());
    }
    if mode == Mode::Valid && signal.len() < template.len() {
        return Ok(Vec::new());
    }

    let output_len = signal.len() + template.len() - 1;
    let fft_size = output_len.next_power_of_two();

    let mut padded_signal = vec![0.0; fft_size];
    padded_signal[..signal.len()].copy_from_slice(signal);

    // Correlation is convolution with the time-reversed template.
    let mut padded_template = vec![0.0; fft_size];
    for (slot, &val) in padded_template.iter_mut().zip(template.iter().rev()) {
        *slot = val;
    }

    let mut planner = RealFftPlanner::<f32>::new();
    let r2c = planner.plan_fft_forward(fft_size);
    let c2r = planner.plan_fft_inverse(fft_size);

    let mut signal_spectrum = r2c.make_output_vec();
    let mut template_spectrum = r2c.make_output_vec();
    r2c.process(&mut padded_signal, &mut signal_spectrum)
        .map_err(|e| ModemError::FftError(format!("forward transform of signal failed: {:?}", e)))?;
    r2c.process(&mut padded_template, &mut template_spectrum)
        .map_err(|e| ModemError::FftError(format!("forward transform of template failed: {:?}", e)))?;

    for (s, t) in signal_spectrum.iter_mut().zip(template_spectrum.iter()) {
        *s = *s * *t;
    }

    // The inverse real transform rejects DC and Nyquist bins with a
    // non-zero imaginary part; rounding can leave a few ulps there.
    if let Some(first) = signal_spectrum.first_mut() {
        first.im = 0.0;
    }
    if let Some(last) = signal_spectrum.last_mut() {
        last.im = 0.0;
    }

    let mut result = c2r.make_output_vec();
    c2r.process(&mut signal_spectrum, &mut result)
        .map_err(|e| ModemError::FftError(format!("inverse transform failed: {:?}", e)))?;

    let normalization = fft_size as f32;
    result.iter_mut().for_each(|x| *x /= normalization);

    match mode {
        Mode::Full => {
            result.truncate(output_len);
            Ok(result)
        }
        Mode::Valid => {
            let start = template.len() - 1;
            let valid_len = signal.len() - template.len() + 1;
            Ok(result[start..start + valid_len].to_vec())
        }
    }
}

/// Normalised correlation coefficient `|<w, t>| / (|w| |t|)` for every
/// fully overlapping window `w` of `signal`, in `[0, 1]`.
///
/// Window energies come from a prefix sum of squared samples, so the whole
/// scan costs one FFT correlation plus O(N).
pub fn normalized_correlation(signal: &[f32], template: &[f32]) -> Result<Vec<f32>> {
    let raw = fft_correlate_1d(signal, template, Mode::Valid)?;
    if raw.is_empty() {
        return Ok(raw);
    }

    let template_energy: f64 = template.iter().map(|&x| (x as f64) * (x as f64)).sum();
    // Accumulated in f64: long recordings would otherwise lose the energy of
    // quiet windows to cancellation.
    let mut sq_prefix = vec![0.0f64; signal.len() + 1];
    for (k, &s) in signal.iter().enumerate() {
        sq_prefix[k + 1] = sq_prefix[k] + (s as f64) * (s as f64);
    }

    let m = template.len();
    Ok(raw
        .iter()
        .enumerate()
        .map(|(i, &r)| {
            let window_energy = (sq_prefix[i + m] - sq_prefix[i]).max(0.0);
            let denom = (window_energy * template_energy).sqrt();
            if denom > 1e-10 {
                ((r as f64 / denom).abs() as f32).min(1.0)
            } else {
                0.0
            }
        })
        .collect())
}
