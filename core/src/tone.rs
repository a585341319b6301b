use crate::config::{ChannelConfig, Waveform};
use crate::symbol::{Symbol, SymbolTable};
use std::f32::consts::PI;

/// Fixed-amplitude tone generator.
///
/// Every tone starts at phase zero, so two renderings of the same
/// frequency and duration are sample-identical. The preamble aligner relies
/// on this when it correlates against a locally generated template.
#[derive(Debug, Clone)]
pub struct ToneModulator {
    sample_rate: f32,
    amplitude: f32,
    waveform: Waveform,
}

impl ToneModulator {
    pub fn new(sample_rate: u32, amplitude: f32, waveform: Waveform) -> Self {
        Self {
            sample_rate: sample_rate as f32,
            amplitude,
            waveform,
        }
    }

    pub fn from_config(config: &ChannelConfig) -> Self {
        Self::new(config.sample_rate, config.amplitude, config.waveform)
    }

    pub fn waveform(&self) -> Waveform {
        self.waveform
    }

    /// `duration * sample_rate` samples of a tone at `frequency`.
    pub fn modulate(&self, frequency: f32, duration: f32) -> Vec<f32> {
        let len = (duration * self.sample_rate).round() as usize;
        self.tone(frequency, len)
    }

    /// Tone of an exact sample count.
    pub fn tone(&self, frequency: f32, len: usize) -> Vec<f32> {
        let omega = 2.0 * PI * frequency / self.sample_rate;
        (0..len)
            .map(|i| {
                let s = (omega * i as f32).sin();
                match self.waveform {
                    Waveform::Sine => self.amplitude * s,
                    Waveform::Square => {
                        if s >= 0.0 {
                            self.amplitude
                        } else {
                            -self.amplitude
                        }
                    }
                }
            })
            .collect()
    }

    pub fn silence(&self, len: usize) -> Vec<f32> {
        vec![0.0; len]
    }

    /// Each symbol as `symbol_len` samples of tone followed by `gap_len`
    /// samples of silence.
    pub fn modulate_symbols(
        &self,
        symbols: &[Symbol],
        table: &SymbolTable,
        symbol_len: usize,
        gap_len: usize,
    ) -> Vec<f32> {
        let mut samples = Vec::with_capacity(symbols.len() * (symbol_len + gap_len));
        for &symbol in symbols {
            samples.extend(self.tone(table.frequency(symbol), symbol_len));
            samples.extend(self.silence(gap_len));
        }
        samples
    }

    /// Duplicate mono samples into `channels` interleaved channels.
    pub fn to_multichannel(samples: &[f32], channels: u16) -> Vec<f32> {
        let channels = channels.max(1) as usize;
        let mut out = Vec::with_capacity(samples.len() * channels);
        for &s in samples {
            out.extend(std::iter::repeat(s).take(channels));
        }
        out
    }
}
