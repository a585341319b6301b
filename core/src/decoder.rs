use crate::config::ChannelConfig;
use crate::detector::FrequencyDetector;
use crate::error::{ModemError, Result};
use crate::reliability::VoteTally;
use crate::symbol::{Symbol, SymbolCodec};
use crate::sync::{FrameLocation, FrameLocator};

/// Payload chunks quieter than this fraction of the last preamble tone end
/// the frame.
const END_OF_FRAME_RATIO: f32 = 0.25;

/// Receive path: recording to text.
///
/// Payload chunks are read one symbol stride apart from the aligned payload
/// start until a chunk is silent, carries a marker tone, or runs past the
/// end of the recording.
pub struct Decoder {
    config: ChannelConfig,
    codec: SymbolCodec,
    detector: FrequencyDetector,
    locator: FrameLocator,
}

impl Decoder {
    pub fn new(config: &ChannelConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: config.clone(),
            codec: SymbolCodec::new(config.symbol_table.clone(), config.fec),
            detector: FrequencyDetector::for_payload(config),
            locator: FrameLocator::new(config),
        })
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    pub fn locate(&self, recording: &[f32]) -> Result<Vec<FrameLocation>> {
        self.locator.locate_all(recording)
    }

    /// Symbols from `payload_start` up to the end of the frame.
    pub fn demodulate(&mut self, samples: &[f32], payload_start: usize) -> Result<Vec<Symbol>> {
        let symbol_len = self.config.symbol_samples();
        let stride = self.config.symbol_stride();
        let markers = self.config.marker_frequencies();
        let floor = self.end_of_frame_floor(samples, payload_start)?;
        let table = self.codec.table();

        let mut symbols = Vec::new();
        let mut offset = payload_start;
        while offset + symbol_len <= samples.len() {
            let detection = self.detector.detect(&samples[offset..offset + symbol_len])?;
            if !detection.is_signal(floor) {
                log::debug!("chunk @{}: silent (amp {:.3}), end of frame", offset, detection.amplitude);
                break;
            }
            if markers
                .iter()
                .any(|&m| detection.is_near(m, self.config.tolerance_hz))
            {
                log::debug!("chunk @{}: marker {:.1} Hz, end of frame", offset, detection.frequency);
                break;
            }

            let symbol = table.nearest(detection.frequency);
            log::debug!(
                "chunk @{}: {:.1} Hz amp {:.3} -> {}",
                offset,
                detection.frequency,
                detection.amplitude,
                symbol
            );
            symbols.push(symbol);
            offset += stride;
        }

        Ok(symbols)
    }

    /// Silence gate for the payload at `payload_start`.
    ///
    /// The p1 tone that ends the preamble sits one gap before the payload.
    /// Its level scales the gate so that loud noise after the last symbol
    /// still reads as silence. Without that tone only the absolute
    /// `detection_floor` applies.
    fn end_of_frame_floor(&mut self, samples: &[f32], payload_start: usize) -> Result<f32> {
        let floor = self.config.detection_floor;
        let symbol_len = self.config.symbol_samples();
        let start = match payload_start.checked_sub(self.config.gap_samples() + symbol_len) {
            Some(start) => start,
            None => return Ok(floor),
        };
        let chunk = match samples.get(start..start + symbol_len) {
            Some(chunk) => chunk,
            None => return Ok(floor),
        };

        let reference = self.detector.detect(chunk)?;
        if !reference.is_near(self.config.preamble_freqs[1], self.config.tolerance_hz) {
            return Ok(floor);
        }
        let gate = floor.max(reference.amplitude * END_OF_FRAME_RATIO);
        log::debug!("preamble tail at {:.3}, silence below {:.3}", reference.amplitude, gate);
        Ok(gate)
    }

    /// Decode the payload starting at `payload_start`. An empty result is a
    /// [`ModemError::CorruptedFrame`].
    pub fn decode_payload(&mut self, samples: &[f32], payload_start: usize) -> Result<String> {
        let symbols = self.demodulate(samples, payload_start)?;
        let text = self.codec.decode(&symbols);
        if text.is_empty() {
            log::warn!("Frame at {} decoded to nothing ({} symbols)", payload_start, symbols.len());
            return Err(ModemError::CorruptedFrame);
        }
        log::info!("Decoded {} symbols into {:?}", symbols.len(), text);
        Ok(text)
    }

    /// Decode every frame in `recording`. Frames that decode to nothing
    /// yield an empty string.
    pub fn decode_frames(&mut self, recording: &[f32]) -> Result<Vec<String>> {
        let frames = self.locate(recording)?;
        let mut texts = Vec::with_capacity(frames.len());
        for frame in frames {
            match self.decode_payload(recording, frame.payload_start) {
                Ok(text) => texts.push(text),
                Err(ModemError::CorruptedFrame) => texts.push(String::new()),
                Err(e) => return Err(e),
            }
        }
        Ok(texts)
    }

    /// First frame in `recording` that decodes to something.
    pub fn decode_first(&mut self, recording: &[f32]) -> Result<String> {
        let texts = self.decode_frames(recording)?;
        if texts.is_empty() {
            return Err(ModemError::NoSignal);
        }
        texts
            .into_iter()
            .find(|text| !text.is_empty())
            .ok_or(ModemError::CorruptedFrame)
    }

    /// Decode every frame of a long recording and majority-vote the results.
    pub fn decode_recording(&mut self, recording: &[f32]) -> Result<String> {
        let texts = self.decode_frames(recording)?;
        if texts.is_empty() {
            return Err(ModemError::NoSignal);
        }
        let tally: VoteTally = texts.iter().collect();
        log::info!(
            "{} frames, {} usable, candidates {:?}",
            tally.attempts(),
            tally.votes(),
            tally.candidates()
        );
        tally.winner()
    }
}
