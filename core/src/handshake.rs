use crate::config::ChannelConfig;
use crate::detector::{Detection, SpectrumDetector};
use crate::error::{ModemError, Result};
use crate::tone::ToneModulator;

/// Acknowledgment tone exchanged after the receiver syncs.
///
/// The receiver answers a preamble with [`AckHandshake::ack_waveform`]; the
/// transmitter runs [`AckHandshake::detect_ack`] over its listening window
/// before committing the payload.
pub struct AckHandshake {
    ack_freq: f32,
    ack_samples: usize,
    chunk_len: usize,
    tolerance_hz: f32,
    detection_floor: f32,
    modulator: ToneModulator,
    detector: SpectrumDetector,
}

impl AckHandshake {
    pub fn new(config: &ChannelConfig) -> Result<Self> {
        let ack_freq = config.ack_freq.ok_or_else(|| {
            ModemError::InvalidConfig("handshake requires an ACK frequency".to_string())
        })?;
        let ack_samples = config.samples_for(config.ack_duration);

        Ok(Self {
            ack_freq,
            ack_samples,
            chunk_len: config.symbol_samples().min(ack_samples).max(1),
            tolerance_hz: config.tolerance_hz,
            detection_floor: config.detection_floor,
            modulator: ToneModulator::from_config(config),
            detector: SpectrumDetector::new(config.sample_rate),
        })
    }

    pub fn ack_freq(&self) -> f32 {
        self.ack_freq
    }

    pub fn ack_waveform(&self) -> Vec<f32> {
        self.modulator.tone(self.ack_freq, self.ack_samples)
    }

    /// First chunk of `window` carrying the ACK tone above the floor.
    pub fn detect_ack(&mut self, window: &[f32]) -> Result<Option<Detection>> {
        let detections = self
            .detector
            .scan(window, self.chunk_len, self.chunk_len / 2)?;

        for (offset, detection) in detections {
            if detection.is_signal(self.detection_floor)
                && detection.is_near(self.ack_freq, self.tolerance_hz)
            {
                log::info!(
                    "ACK heard at sample {} ({:.1} Hz, amp {:.3})",
                    offset,
                    detection.frequency,
                    detection.amplitude
                );
                return Ok(Some(detection));
            }
        }
        Ok(None)
    }
}
