//! Frame synchronisation on the alternating two-tone preamble.
//!
//! Two stages run on every reception:
//!
//! 1. [`PreambleSynchronizer::listen`] decides *whether* a frame is on the
//!    air by looking for chunks dominated by either preamble tone.
//! 2. [`FrameLocator`] decides *where* the payload starts, by correlating a
//!    one-cycle `[p0, p1]` template against the recording and walking the
//!    cycles forward to the last one.

use crate::config::{ChannelConfig, DetectionThreshold, SyncPolicy};
use crate::correlation::normalized_correlation;
use crate::detector::{Detection, SpectrumDetector};
use crate::error::{ModemError, Result};
use crate::tone::ToneModulator;

/// Receiver-side synchronisation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Listening,
    Synced,
    Decoding,
}

/// Which preamble tone a chunk matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreambleTone {
    Low,
    High,
}

/// Evidence that caused the `Listening -> Synced` transition.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncHit {
    /// Sample offset of the first matching chunk in the listening window.
    pub offset: usize,
    pub tone: PreambleTone,
    pub detection: Detection,
    /// p0/p1 alternations seen across consecutive matching chunks.
    pub transitions: usize,
}

/// Preamble generation and soft preamble detection.
pub struct PreambleSynchronizer {
    config: ChannelConfig,
    modulator: ToneModulator,
    detector: SpectrumDetector,
    state: SyncState,
}

impl PreambleSynchronizer {
    pub fn new(config: &ChannelConfig) -> Self {
        Self {
            config: config.clone(),
            modulator: ToneModulator::from_config(config),
            detector: SpectrumDetector::new(config.sample_rate),
            state: SyncState::Idle,
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    /// One `[p0, p1]` cycle, each tone one symbol long.
    pub fn sync_header(&self) -> Vec<f32> {
        let len = self.config.symbol_samples();
        let [p0, p1] = self.config.preamble_freqs;
        let mut cycle = self.modulator.tone(p0, len);
        cycle.extend(self.modulator.tone(p1, len));
        cycle
    }

    /// `preamble_cycles` back-to-back copies of the sync header.
    pub fn preamble_waveform(&self) -> Vec<f32> {
        self.sync_header().repeat(self.config.preamble_cycles)
    }

    /// Start a receive cycle.
    pub fn begin(&mut self) {
        self.transition(SyncState::Listening);
    }

    /// Scan a listening window for the preamble.
    ///
    /// The window is cut into symbol-long chunks with half-symbol hop. A
    /// chunk matches when its dominant tone is within tolerance of p0 or p1
    /// and loud enough to clear the detection floor. Fails with
    /// [`ModemError::NoSignal`] and returns to `Idle` when the configured
    /// [`SyncPolicy`] is not satisfied.
    pub fn listen(&mut self, window: &[f32]) -> Result<SyncHit> {
        if self.state == SyncState::Idle {
            self.begin();
        }

        let chunk_len = self.config.symbol_samples();
        let detections = self.detector.scan(window, chunk_len, chunk_len / 2)?;

        let mut first: Option<SyncHit> = None;
        let mut run_last: Option<PreambleTone> = None;
        let mut run_transitions = 0usize;
        let mut best_transitions = 0usize;

        for (offset, detection) in detections {
            let tone = self.classify(&detection);
            log::debug!(
                "listen chunk @{}: {:.1} Hz amp {:.3} -> {:?}",
                offset,
                detection.frequency,
                detection.amplitude,
                tone
            );

            match tone {
                Some(tone) => {
                    if first.is_none() {
                        first = Some(SyncHit {
                            offset,
                            tone,
                            detection,
                            transitions: 0,
                        });
                    }
                    if run_last.is_some_and(|last| last != tone) {
                        run_transitions += 1;
                    }
                    run_last = Some(tone);
                    best_transitions = best_transitions.max(run_transitions);
                }
                None => {
                    run_last = None;
                    run_transitions = 0;
                }
            }
        }

        let required = match self.config.sync_policy {
            SyncPolicy::Soft => 0,
            SyncPolicy::Alternating { transitions } => transitions,
        };

        match first {
            Some(mut hit) if best_transitions >= required => {
                hit.transitions = best_transitions;
                log::info!(
                    "Preamble detected at sample {} ({:.1} Hz, {} alternations)",
                    hit.offset,
                    hit.detection.frequency,
                    hit.transitions
                );
                self.transition(SyncState::Synced);
                Ok(hit)
            }
            Some(_) => {
                log::debug!(
                    "Preamble tones heard but only {} of {} alternations",
                    best_transitions,
                    required
                );
                self.transition(SyncState::Idle);
                Err(ModemError::NoSignal)
            }
            None => {
                self.transition(SyncState::Idle);
                Err(ModemError::NoSignal)
            }
        }
    }

    /// `Synced -> Decoding`: the caller is recording the payload window.
    pub fn begin_decoding(&mut self) {
        if self.state == SyncState::Synced {
            self.transition(SyncState::Decoding);
        }
    }

    /// Back to `Idle` once a result (or failure) has been produced.
    pub fn finish(&mut self) {
        self.transition(SyncState::Idle);
    }

    fn classify(&self, detection: &Detection) -> Option<PreambleTone> {
        if !detection.is_signal(self.config.detection_floor) {
            return None;
        }
        let [p0, p1] = self.config.preamble_freqs;
        if detection.is_near(p0, self.config.tolerance_hz) {
            Some(PreambleTone::Low)
        } else if detection.is_near(p1, self.config.tolerance_hz) {
            Some(PreambleTone::High)
        } else {
            None
        }
    }

    fn transition(&mut self, next: SyncState) {
        if self.state != next {
            log::debug!("sync state {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }
}

/// Where a frame sits inside a recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLocation {
    /// Start of the first preamble cycle found.
    pub preamble_start: usize,
    /// Number of consecutive cycles found.
    pub cycles: usize,
    /// Start of the first payload symbol tone.
    pub payload_start: usize,
}

/// Symbol-boundary alignment by normalised cross-correlation.
pub struct FrameLocator {
    template: Vec<f32>,
    symbol_samples: usize,
    gap_samples: usize,
    threshold: DetectionThreshold,
}

impl FrameLocator {
    pub fn new(config: &ChannelConfig) -> Self {
        Self {
            template: PreambleSynchronizer::new(config).sync_header(),
            symbol_samples: config.symbol_samples(),
            gap_samples: config.gap_samples(),
            threshold: config.correlation_threshold,
        }
    }

    /// First frame in `recording`, if any.
    pub fn locate(&self, recording: &[f32]) -> Result<Option<FrameLocation>> {
        Ok(self.locate_all(recording)?.into_iter().next())
    }

    /// Every frame in `recording`, in order.
    ///
    /// Each frame is anchored on the first correlation sample above the
    /// threshold, refined to the strongest peak within one symbol, then
    /// followed forward in steps of one cycle (searching a quarter symbol
    /// either side) while the peaks stay above the threshold.
    pub fn locate_all(&self, recording: &[f32]) -> Result<Vec<FrameLocation>> {
        let corr = normalized_correlation(recording, &self.template)?;
        if corr.is_empty() {
            return Ok(Vec::new());
        }

        let threshold = self.threshold.resolve(recording);
        let cycle = 2 * self.symbol_samples;
        let slack = self.symbol_samples / 4;

        let mut frames = Vec::new();
        let mut from = 0;
        while let Some(first) = corr[from..].iter().position(|&c| c > threshold) {
            let anchor = from + first;
            let (start, peak) = argmax(&corr, anchor, anchor + self.symbol_samples);

            let mut last = start;
            let mut cycles = 1;
            loop {
                let expected = last + cycle;
                if expected >= corr.len() {
                    break;
                }
                let (pos, value) = argmax(&corr, expected.saturating_sub(slack), expected + slack + 1);
                if value <= threshold {
                    break;
                }
                last = pos;
                cycles += 1;
            }

            let payload_start = last + cycle + self.gap_samples;
            log::debug!(
                "frame at {} (peak {:.3}, threshold {:.2}): {} cycles, payload at {}",
                start,
                peak,
                threshold,
                cycles,
                payload_start
            );
            frames.push(FrameLocation {
                preamble_start: start,
                cycles,
                payload_start,
            });
            from = payload_start.min(corr.len());
        }

        Ok(frames)
    }
}

/// Position and value of the maximum of `values[from..to]` (clamped).
/// The earliest position wins a tie.
fn argmax(values: &[f32], from: usize, to: usize) -> (usize, f32) {
    let to = to.min(values.len());
    let from = from.min(to);
    let mut best = (from, f32::MIN);
    for (i, &v) in values[from..to].iter().enumerate() {
        if v > best.1 {
            best = (from + i, v);
        }
    }
    best
}
