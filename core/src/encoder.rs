use crate::config::{check_duration, ChannelConfig};
use crate::error::Result;
use crate::symbol::{Symbol, SymbolCodec};
use crate::sync::PreambleSynchronizer;
use crate::tone::ToneModulator;

/// Send path: text to frame waveform.
///
/// A frame is the preamble followed by the payload, where the payload is one
/// gap of silence and then every symbol as `tone + gap`. There is no length
/// field; the receiver stops at the first silent or marker chunk.
pub struct Encoder {
    config: ChannelConfig,
    codec: SymbolCodec,
    modulator: ToneModulator,
    sync: PreambleSynchronizer,
}

impl Encoder {
    pub fn new(config: &ChannelConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: config.clone(),
            codec: SymbolCodec::new(config.symbol_table.clone(), config.fec),
            modulator: ToneModulator::from_config(config),
            sync: PreambleSynchronizer::new(config),
        })
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    pub fn symbols(&self, text: &str) -> Result<Vec<Symbol>> {
        self.codec.encode(text)
    }

    pub fn preamble(&self) -> Vec<f32> {
        self.sync.preamble_waveform()
    }

    /// Single `[p0, p1]` cycle sent ahead of the payload after a handshake.
    pub fn sync_header(&self) -> Vec<f32> {
        self.sync.sync_header()
    }

    /// Leading gap plus every symbol tone and its trailing gap.
    pub fn payload(&self, text: &str) -> Result<Vec<f32>> {
        let symbols = self.symbols(text)?;
        log::debug!("Encoding {} chars as {} symbols", text.chars().count(), symbols.len());

        let gap = self.config.gap_samples();
        let mut samples = self.modulator.silence(gap);
        samples.extend(self.modulator.modulate_symbols(
            &symbols,
            self.codec.table(),
            self.config.symbol_samples(),
            gap,
        ));
        Ok(samples)
    }

    /// Preamble followed by the payload.
    pub fn encode(&self, text: &str) -> Result<Vec<f32>> {
        let mut samples = self.preamble();
        samples.extend(self.payload(text)?);
        Ok(samples)
    }

    /// Sync header followed by the payload, sent once the ACK is heard.
    pub fn encode_burst(&self, text: &str) -> Result<Vec<f32>> {
        let mut samples = self.sync_header();
        samples.extend(self.payload(text)?);
        Ok(samples)
    }

    /// `repetitions` copies of the frame separated by `frame_gap` seconds of
    /// silence.
    pub fn encode_repeated(&self, text: &str, repetitions: usize, frame_gap: f32) -> Result<Vec<f32>> {
        check_duration("frame gap", frame_gap, true)?;
        let frame = self.encode(text)?;
        let gap = self.modulator.silence(self.config.samples_for(frame_gap));

        let mut samples = Vec::new();
        for i in 0..repetitions {
            if i > 0 {
                samples.extend_from_slice(&gap);
            }
            samples.extend_from_slice(&frame);
        }
        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModemError;

    #[test]
    fn test_frame_layout() {
        let config = ChannelConfig::audible();
        let encoder = Encoder::new(&config).unwrap();
        let frame = encoder.encode("Hi").unwrap();

        let preamble = encoder.preamble().len();
        let stride = config.symbol_stride();
        assert_eq!(frame.len(), preamble + config.gap_samples() + 8 * stride);

        // Leading gap after the preamble is silent.
        assert!(frame[preamble..preamble + config.gap_samples()]
            .iter()
            .all(|&s| s == 0.0));
        // First symbol "01" is 700 Hz.
        let first = &frame[preamble + config.gap_samples()..][..config.symbol_samples()];
        assert_eq!(first, ToneModulator::from_config(&config).tone(700.0, 2205).as_slice());
    }

    #[test]
    fn test_burst_starts_with_one_cycle() {
        let config = ChannelConfig::audible();
        let encoder = Encoder::new(&config).unwrap();
        let burst = encoder.encode_burst("Hi").unwrap();
        let frame = encoder.encode("Hi").unwrap();
        assert_eq!(burst.len(), frame.len() - 4 * 2 * config.symbol_samples());
        assert_eq!(&burst[..4410], encoder.sync_header().as_slice());
    }

    #[test]
    fn test_repetitions_are_separated() {
        let config = ChannelConfig::audible();
        let encoder = Encoder::new(&config).unwrap();
        let frame = encoder.encode("A").unwrap();
        let repeated = encoder.encode_repeated("A", 3, 0.5).unwrap();
        assert_eq!(repeated.len(), 3 * frame.len() + 2 * config.samples_for(0.5));
        assert_eq!(&repeated[..frame.len()], frame.as_slice());

        assert!(matches!(
            encoder.encode_repeated("A", 2, f32::INFINITY),
            Err(ModemError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_rejects_unencodable_text() {
        let encoder = Encoder::new(&ChannelConfig::audible()).unwrap();
        assert!(matches!(
            encoder.encode("snow \u{2603}"),
            Err(ModemError::UnencodableCharacter('\u{2603}'))
        ));
    }

    #[test]
    fn test_rejects_invalid_config() {
        let mut config = ChannelConfig::audible();
        config.sample_rate = 2000;
        assert!(Encoder::new(&config).is_err());
    }
}
