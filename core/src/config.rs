//! Channel and session parameters.
//!
//! Both ends of a link must be built from identical [`ChannelConfig`] values;
//! nothing about the channel is negotiated over the air.

use crate::error::{ModemError, Result};
use crate::fec::FecScheme;
use crate::symbol::SymbolTable;

/// Highest sample rate a channel may use.
pub const MAX_SAMPLE_RATE: u32 = 384_000;

/// Longest duration accepted for any tone, gap or recording window.
pub const MAX_DURATION_SECS: f32 = 600.0;

/// Carrier shape produced by the tone modulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    /// Pure sinusoid: no harmonics, lowest audible harshness.
    Sine,
    /// Square wave at the same fundamental. Harmonics land at 3f, 5f, ...
    /// but the fundamental carries 4/pi more energy, which survives cheap
    /// speakers better.
    Square,
}

/// Algorithm used to pick the tone of each payload chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorKind {
    /// Magnitude spectrum of the whole chunk, loudest bin wins.
    Spectrum,
    /// One Goertzel filter per candidate carrier, strongest wins.
    Goertzel,
}

/// How much evidence the listening window needs before declaring sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPolicy {
    /// A single chunk dominated by either preamble tone.
    Soft,
    /// At least this many p0/p1 alternations across consecutive hits.
    Alternating { transitions: usize },
}

/// Correlation threshold used when aligning on the preamble.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DetectionThreshold {
    /// Scales with the RMS of the recording.
    Adaptive,
    Fixed(f32),
}

impl DetectionThreshold {
    pub fn resolve(&self, samples: &[f32]) -> f32 {
        match *self {
            DetectionThreshold::Fixed(value) => value,
            DetectionThreshold::Adaptive => {
                if samples.is_empty() {
                    return 0.4;
                }
                let rms = (samples.iter().map(|x| x * x).sum::<f32>() / samples.len() as f32).sqrt();
                if rms > 0.1 {
                    0.4
                } else if rms > 0.02 {
                    0.35
                } else {
                    0.3
                }
            }
        }
    }
}

/// Physical-layer parameters shared out of band by transmitter and receiver.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelConfig {
    pub sample_rate: u32,
    /// Seconds per symbol tone (also the length of each preamble tone).
    pub symbol_duration: f32,
    /// Silence after every payload symbol, seconds.
    pub symbol_gap: f32,
    pub preamble_freqs: [f32; 2],
    /// Number of `[p0, p1]` pairs in the preamble.
    pub preamble_cycles: usize,
    pub symbol_table: SymbolTable,
    pub ack_freq: Option<f32>,
    pub ack_duration: f32,
    pub fec: FecScheme,
    pub waveform: Waveform,
    pub amplitude: f32,
    pub detector: DetectorKind,
    /// Maximum distance between a detected and an expected marker tone.
    pub tolerance_hz: f32,
    /// Minimum estimated tone amplitude for a chunk to count as signal.
    pub detection_floor: f32,
    pub sync_policy: SyncPolicy,
    pub correlation_threshold: DetectionThreshold,
}

impl ChannelConfig {
    /// 22.05 kHz, four audible tones, two bits per symbol.
    pub fn audible() -> Self {
        Self {
            sample_rate: 22050,
            symbol_duration: 0.1,
            symbol_gap: 0.03,
            preamble_freqs: [400.0, 600.0],
            preamble_cycles: 5,
            symbol_table: audible_table(),
            ack_freq: Some(1500.0),
            ack_duration: 0.3,
            fec: FecScheme::None,
            waveform: Waveform::Sine,
            amplitude: 0.5,
            detector: DetectorKind::Spectrum,
            tolerance_hz: 20.0,
            detection_floor: 0.02,
            sync_policy: SyncPolicy::Soft,
            correlation_threshold: DetectionThreshold::Adaptive,
        }
    }

    /// 44.1 kHz, sixteen tones between 17 and 18.5 kHz, Hamming protected.
    pub fn near_ultrasonic() -> Self {
        Self {
            sample_rate: 44100,
            symbol_duration: 0.05,
            symbol_gap: 0.01,
            preamble_freqs: [16000.0, 16500.0],
            preamble_cycles: 8,
            symbol_table: ultrasonic_table(),
            ack_freq: Some(19000.0),
            ack_duration: 0.2,
            fec: FecScheme::Hamming74,
            waveform: Waveform::Sine,
            amplitude: 0.5,
            detector: DetectorKind::Goertzel,
            tolerance_hz: 20.0,
            detection_floor: 0.02,
            sync_policy: SyncPolicy::Soft,
            correlation_threshold: DetectionThreshold::Adaptive,
        }
    }

    pub fn samples_for(&self, seconds: f32) -> usize {
        (seconds * self.sample_rate as f32).round() as usize
    }

    pub fn symbol_samples(&self) -> usize {
        self.samples_for(self.symbol_duration)
    }

    pub fn gap_samples(&self) -> usize {
        self.samples_for(self.symbol_gap)
    }

    /// Distance between the starts of consecutive payload symbols.
    pub fn symbol_stride(&self) -> usize {
        self.symbol_samples() + self.gap_samples()
    }

    pub fn nyquist(&self) -> f32 {
        self.sample_rate as f32 / 2.0
    }

    /// Frequency resolution of a one-symbol spectrum.
    pub fn bin_width(&self) -> f32 {
        self.sample_rate as f32 / self.symbol_samples().max(1) as f32
    }

    /// Preamble and ACK tones: anything that is not payload.
    pub fn marker_frequencies(&self) -> Vec<f32> {
        let mut markers = self.preamble_freqs.to_vec();
        markers.extend(self.ack_freq);
        markers
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 || self.sample_rate > MAX_SAMPLE_RATE {
            return Err(invalid(&format!(
                "sample rate must be in 1..={} Hz",
                MAX_SAMPLE_RATE
            )));
        }
        check_duration("symbol duration", self.symbol_duration, false)?;
        if self.symbol_samples() == 0 {
            return Err(invalid("symbol duration must cover at least one sample"));
        }
        check_duration("symbol gap", self.symbol_gap, true)?;
        if self.preamble_cycles == 0 {
            return Err(invalid("preamble needs at least one cycle"));
        }
        if self.ack_freq.is_some() {
            check_duration("ACK tone duration", self.ack_duration, false)?;
        }
        if !(self.amplitude > 0.0 && self.amplitude <= 1.0) {
            return Err(invalid("amplitude must be in (0, 1]"));
        }
        if !(self.detection_floor > 0.0 && self.detection_floor < 1.0) {
            return Err(invalid("detection floor must be in (0, 1)"));
        }
        if !(self.tolerance_hz > 0.0 && self.tolerance_hz.is_finite()) {
            return Err(invalid("tolerance must be positive"));
        }
        if let DetectionThreshold::Fixed(value) = self.correlation_threshold {
            if !(value > 0.0 && value < 1.0) {
                return Err(invalid("correlation threshold must be in (0, 1)"));
            }
        }
        if let SyncPolicy::Alternating { transitions } = self.sync_policy {
            if transitions == 0 {
                return Err(invalid("alternating sync needs at least one transition"));
            }
        }

        let mut all: Vec<f32> = self.symbol_table.frequencies().to_vec();
        all.extend(self.marker_frequencies());

        let nyquist = self.nyquist();
        if let Some(f) = all.iter().find(|&&f| !(f > 0.0 && f < nyquist)) {
            return Err(invalid(&format!(
                "{} Hz is outside (0, {}) Hz",
                f, nyquist
            )));
        }

        let min_separation = (2.0 * self.tolerance_hz).max(self.bin_width());
        for (i, &a) in all.iter().enumerate() {
            for &b in &all[i + 1..] {
                if (a - b).abs() <= min_separation {
                    return Err(invalid(&format!(
                        "{} Hz and {} Hz are not separable (need > {} Hz)",
                        a, b, min_separation
                    )));
                }
            }
        }

        Ok(())
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self::audible()
    }
}

/// Link behaviour of one process: handshake, repetition, voting and the
/// fixed recording windows that bound every wait.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub handshake: bool,
    /// Times the whole frame is sent.
    pub repetitions: usize,
    /// Silence between repeated frames, seconds.
    pub frame_gap: f32,
    /// Independent listen/sync/decode cycles per receive session.
    pub receive_attempts: usize,
    pub listen_window: f32,
    pub payload_window: f32,
    pub ack_window: f32,
    pub max_ack_retries: usize,
}

impl SessionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.repetitions == 0 {
            return Err(invalid("repetitions must be at least 1"));
        }
        if self.receive_attempts == 0 {
            return Err(invalid("receive attempts must be at least 1"));
        }
        if self.max_ack_retries == 0 {
            return Err(invalid("ACK retry ceiling must be at least 1"));
        }
        check_duration("frame gap", self.frame_gap, true)?;
        check_duration("listen window", self.listen_window, false)?;
        check_duration("payload window", self.payload_window, false)?;
        check_duration("ack window", self.ack_window, false)?;
        Ok(())
    }

    /// Validate against the channel this session will drive.
    pub fn validate_with(&self, channel: &ChannelConfig) -> Result<()> {
        self.validate()?;
        if self.handshake && channel.ack_freq.is_none() {
            return Err(invalid("handshake requires an ACK frequency"));
        }
        Ok(())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            handshake: false,
            repetitions: 1,
            frame_gap: 0.5,
            receive_attempts: 5,
            listen_window: 1.0,
            payload_window: 5.0,
            ack_window: 1.5,
            max_ack_retries: 5,
        }
    }
}

fn invalid(msg: &str) -> ModemError {
    ModemError::InvalidConfig(msg.to_string())
}

/// Finite, at most [`MAX_DURATION_SECS`], and positive (or zero when
/// `allow_zero`).
pub(crate) fn check_duration(name: &str, seconds: f32, allow_zero: bool) -> Result<()> {
    let lower_ok = if allow_zero { seconds >= 0.0 } else { seconds > 0.0 };
    if !seconds.is_finite() || !lower_ok || seconds > MAX_DURATION_SECS {
        return Err(invalid(&format!(
            "{} must be {} and at most {} s, got {}",
            name,
            if allow_zero { "non-negative" } else { "positive" },
            MAX_DURATION_SECS,
            seconds
        )));
    }
    Ok(())
}

fn audible_table() -> SymbolTable {
    SymbolTable::new(vec![500.0, 700.0, 900.0, 1200.0]).expect("preset symbol table is valid")
}

fn ultrasonic_table() -> SymbolTable {
    SymbolTable::new((0..16).map(|i| 17000.0 + 100.0 * i as f32).collect())
        .expect("preset symbol table is valid")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_validate() {
        ChannelConfig::audible().validate().unwrap();
        ChannelConfig::near_ultrasonic().validate().unwrap();
        SessionConfig::default()
            .validate_with(&ChannelConfig::audible())
            .unwrap();
    }

    #[test]
    fn test_audible_geometry() {
        let config = ChannelConfig::audible();
        assert_eq!(config.symbol_samples(), 2205);
        assert_eq!(config.symbol_table.bits_per_symbol(), 2);
        assert_eq!(config.marker_frequencies(), vec![400.0, 600.0, 1500.0]);
    }

    #[test]
    fn test_rejects_frequency_above_nyquist() {
        let mut config = ChannelConfig::audible();
        config.ack_freq = Some(12000.0);
        assert!(matches!(config.validate(), Err(ModemError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_inseparable_frequencies() {
        let mut config = ChannelConfig::audible();
        config.preamble_freqs = [400.0, 520.0];
        assert!(config.validate().is_err());

        let mut config = ChannelConfig::audible();
        config.tolerance_hz = 60.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_session_validation() {
        let mut session = SessionConfig::default();
        session.handshake = true;
        let mut channel = ChannelConfig::audible();
        channel.ack_freq = None;
        assert!(session.validate_with(&channel).is_err());

        let mut session = SessionConfig::default();
        session.receive_attempts = 0;
        assert!(session.validate().is_err());
    }

    #[test]
    fn test_rejects_non_finite_durations() {
        let mut channel = ChannelConfig::audible();
        channel.symbol_gap = f32::INFINITY;
        assert!(matches!(channel.validate(), Err(ModemError::InvalidConfig(_))));

        let mut channel = ChannelConfig::audible();
        channel.symbol_duration = f32::NAN;
        assert!(channel.validate().is_err());

        let session = SessionConfig {
            listen_window: f32::INFINITY,
            ..SessionConfig::default()
        };
        assert!(session.validate_with(&ChannelConfig::audible()).is_err());

        let session = SessionConfig {
            frame_gap: 1e30,
            ..SessionConfig::default()
        };
        assert!(session.validate().is_err());

        let session = SessionConfig {
            frame_gap: 0.0,
            ..SessionConfig::default()
        };
        assert!(session.validate().is_ok());
    }

    #[test]
    fn test_adaptive_threshold_tracks_level() {
        let loud = vec![0.5f32; 100];
        let quiet = vec![0.01f32; 100];
        assert_eq!(DetectionThreshold::Adaptive.resolve(&loud), 0.4);
        assert_eq!(DetectionThreshold::Adaptive.resolve(&quiet), 0.3);
        assert_eq!(DetectionThreshold::Fixed(0.6).resolve(&loud), 0.6);
    }
}
