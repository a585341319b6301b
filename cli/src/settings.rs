use crate::wav::CliError;
use clap::ValueEnum;
use serde::Deserialize;
use std::path::Path;
use tonelink_core::{
    ChannelConfig, DetectionThreshold, DetectorKind, FecScheme, SessionConfig, SymbolTable, SyncPolicy,
    Waveform,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Preset {
    Audible,
    Ultrasonic,
}

impl Preset {
    pub fn channel(self) -> ChannelConfig {
        match self {
            Preset::Audible => ChannelConfig::audible(),
            Preset::Ultrasonic => ChannelConfig::near_ultrasonic(),
        }
    }
}

/// JSON config file. Every field is optional and overrides the preset.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub channel: ChannelOverlay,
    pub session: SessionOverlay,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChannelOverlay {
    pub sample_rate: Option<u32>,
    pub symbol_duration: Option<f32>,
    pub symbol_gap: Option<f32>,
    pub preamble_freqs: Option<[f32; 2]>,
    pub preamble_cycles: Option<usize>,
    pub symbol_freqs: Option<Vec<f32>>,
    pub ack_freq: Option<f32>,
    pub no_ack: bool,
    pub ack_duration: Option<f32>,
    pub fec: Option<bool>,
    pub square_wave: Option<bool>,
    pub amplitude: Option<f32>,
    pub goertzel: Option<bool>,
    pub tolerance_hz: Option<f32>,
    pub detection_floor: Option<f32>,
    /// Required p0/p1 alternations; zero selects the soft policy.
    pub sync_transitions: Option<usize>,
    /// Fixed correlation threshold; absent keeps the preset's choice.
    pub correlation_threshold: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionOverlay {
    pub handshake: Option<bool>,
    pub repetitions: Option<usize>,
    pub frame_gap: Option<f32>,
    pub receive_attempts: Option<usize>,
    pub listen_window: Option<f32>,
    pub payload_window: Option<f32>,
    pub ack_window: Option<f32>,
    pub max_ack_retries: Option<usize>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self, CliError> {
        let text = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&text)?;
        log::info!("Loaded config overlay from {}", path.display());
        Ok(config)
    }

    pub fn apply(&self, channel: &mut ChannelConfig, session: &mut SessionConfig) -> Result<(), CliError> {
        self.channel.apply(channel)?;
        self.session.apply(session);
        Ok(())
    }
}

impl ChannelOverlay {
    fn apply(&self, c: &mut ChannelConfig) -> Result<(), CliError> {
        if let Some(v) = self.sample_rate {
            c.sample_rate = v;
        }
        if let Some(v) = self.symbol_duration {
            c.symbol_duration = v;
        }
        if let Some(v) = self.symbol_gap {
            c.symbol_gap = v;
        }
        if let Some(v) = self.preamble_freqs {
            c.preamble_freqs = v;
        }
        if let Some(v) = self.preamble_cycles {
            c.preamble_cycles = v;
        }
        if let Some(freqs) = &self.symbol_freqs {
            c.symbol_table = SymbolTable::new(freqs.clone())?;
        }
        if self.no_ack {
            c.ack_freq = None;
        } else if let Some(v) = self.ack_freq {
            c.ack_freq = Some(v);
        }
        if let Some(v) = self.ack_duration {
            c.ack_duration = v;
        }
        if let Some(on) = self.fec {
            c.fec = if on { FecScheme::Hamming74 } else { FecScheme::None };
        }
        if let Some(square) = self.square_wave {
            c.waveform = if square { Waveform::Square } else { Waveform::Sine };
        }
        if let Some(v) = self.amplitude {
            c.amplitude = v;
        }
        if let Some(goertzel) = self.goertzel {
            c.detector = if goertzel {
                DetectorKind::Goertzel
            } else {
                DetectorKind::Spectrum
            };
        }
        if let Some(v) = self.tolerance_hz {
            c.tolerance_hz = v;
        }
        if let Some(v) = self.detection_floor {
            c.detection_floor = v;
        }
        if let Some(transitions) = self.sync_transitions {
            c.sync_policy = match transitions {
                0 => SyncPolicy::Soft,
                n => SyncPolicy::Alternating { transitions: n },
            };
        }
        if let Some(v) = self.correlation_threshold {
            c.correlation_threshold = DetectionThreshold::Fixed(v);
        }
        Ok(())
    }
}

impl SessionOverlay {
    fn apply(&self, s: &mut SessionConfig) {
        if let Some(v) = self.handshake {
            s.handshake = v;
        }
        if let Some(v) = self.repetitions {
            s.repetitions = v;
        }
        if let Some(v) = self.frame_gap {
            s.frame_gap = v;
        }
        if let Some(v) = self.receive_attempts {
            s.receive_attempts = v;
        }
        if let Some(v) = self.listen_window {
            s.listen_window = v;
        }
        if let Some(v) = self.payload_window {
            s.payload_window = v;
        }
        if let Some(v) = self.ack_window {
            s.ack_window = v;
        }
        if let Some(v) = self.max_ack_retries {
            s.max_ack_retries = v;
        }
    }
}
