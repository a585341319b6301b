//! Session drivers: one `transmit(text)` and one `receive()` per process.
//!
//! Everything here is sequential. Each device call blocks for its whole
//! window and every wait is bounded by a window length or a retry ceiling.

use crate::config::{ChannelConfig, SessionConfig};
use crate::decoder::Decoder;
use crate::device::AudioDevice;
use crate::encoder::Encoder;
use crate::error::{ModemError, Result};
use crate::handshake::AckHandshake;
use crate::reliability::VoteTally;
use crate::sync::{PreambleSynchronizer, SyncState};

fn check_rate<D: AudioDevice + ?Sized>(device: &D, channel: &ChannelConfig) -> Result<()> {
    if device.sample_rate() != channel.sample_rate {
        return Err(ModemError::InvalidConfig(format!(
            "device runs at {} Hz but the channel needs {} Hz",
            device.sample_rate(),
            channel.sample_rate
        )));
    }
    Ok(())
}

/// What a transmit session put on the air.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransmitReport {
    /// Frames whose payload was sent.
    pub frames: usize,
    /// Preambles played, including handshake retries.
    pub preambles: usize,
}

pub struct Transmitter {
    session: SessionConfig,
    encoder: Encoder,
    handshake: Option<AckHandshake>,
}

impl Transmitter {
    pub fn new(channel: &ChannelConfig, session: &SessionConfig) -> Result<Self> {
        session.validate_with(channel)?;
        let handshake = if session.handshake {
            Some(AckHandshake::new(channel)?)
        } else {
            None
        };
        Ok(Self {
            session: session.clone(),
            encoder: Encoder::new(channel)?,
            handshake,
        })
    }

    pub fn encoder(&self) -> &Encoder {
        &self.encoder
    }

    /// Send `text` `repetitions` times.
    ///
    /// Without a handshake every frame goes out open loop, separated by the
    /// frame gap. With a handshake each repetition is a rendezvous: preamble,
    /// ACK window, and the payload burst only once the ACK was heard.
    pub fn transmit<D: AudioDevice + ?Sized>(&mut self, device: &mut D, text: &str) -> Result<TransmitReport> {
        let channel = self.encoder.config().clone();
        check_rate(&*device, &channel)?;

        let mut report = TransmitReport::default();
        let gap = vec![0.0; channel.samples_for(self.session.frame_gap)];

        for rep in 0..self.session.repetitions {
            if rep > 0 && !gap.is_empty() {
                device.play(&gap, channel.sample_rate)?;
            }

            if self.handshake.is_some() {
                report.preambles += self.rendezvous(device, &channel)?;
                device.play(&self.encoder.encode_burst(text)?, channel.sample_rate)?;
            } else {
                device.play(&self.encoder.encode(text)?, channel.sample_rate)?;
                report.preambles += 1;
            }

            report.frames += 1;
            log::info!(
                "Sent frame {}/{} ({} chars)",
                rep + 1,
                self.session.repetitions,
                text.chars().count()
            );
        }

        Ok(report)
    }

    /// Play the preamble until an ACK comes back. Returns the number of
    /// preambles played.
    fn rendezvous<D: AudioDevice + ?Sized>(&mut self, device: &mut D, channel: &ChannelConfig) -> Result<usize> {
        let preamble = self.encoder.preamble();
        let retries = self.session.max_ack_retries;
        let handshake = self
            .handshake
            .as_mut()
            .ok_or_else(|| ModemError::InvalidConfig("handshake is disabled".to_string()))?;

        for attempt in 1..=retries {
            device.play(&preamble, channel.sample_rate)?;
            let window = device.record(self.session.ack_window)?;
            if handshake.detect_ack(&window)?.is_some() {
                return Ok(attempt);
            }
            log::warn!("No ACK after preamble {}/{}", attempt, retries);
        }

        Err(ModemError::HandshakeTimeout { retries })
    }
}

pub struct Receiver {
    channel: ChannelConfig,
    session: SessionConfig,
    sync: PreambleSynchronizer,
    decoder: Decoder,
    handshake: Option<AckHandshake>,
}

impl Receiver {
    pub fn new(channel: &ChannelConfig, session: &SessionConfig) -> Result<Self> {
        session.validate_with(channel)?;
        let handshake = if session.handshake {
            Some(AckHandshake::new(channel)?)
        } else {
            None
        };
        Ok(Self {
            channel: channel.clone(),
            session: session.clone(),
            sync: PreambleSynchronizer::new(channel),
            decoder: Decoder::new(channel)?,
            handshake,
        })
    }

    pub fn state(&self) -> SyncState {
        self.sync.state()
    }

    /// One listen / sync / (ACK) / payload / decode cycle.
    ///
    /// Fails with [`ModemError::NoSignal`] when the listening window holds no
    /// preamble and with [`ModemError::CorruptedFrame`] when sync fired but
    /// no text came out of the payload window.
    pub fn attempt<D: AudioDevice + ?Sized>(&mut self, device: &mut D) -> Result<String> {
        check_rate(&*device, &self.channel)?;

        self.sync.begin();
        let result = self.listen_and_decode(device);
        // Device errors can leave the synchronizer mid-cycle.
        self.sync.finish();
        result
    }

    fn listen_and_decode<D: AudioDevice + ?Sized>(&mut self, device: &mut D) -> Result<String> {
        let listen = device.record(self.session.listen_window)?;
        self.sync.listen(&listen)?;

        if let Some(handshake) = &self.handshake {
            device.play(&handshake.ack_waveform(), self.channel.sample_rate)?;
            log::info!("ACK sent at {:.0} Hz", handshake.ack_freq());
        }

        self.sync.begin_decoding();
        let payload = device.record(self.session.payload_window)?;

        // After a handshake the transmitter re-sends a sync header, so only
        // the payload window is searched. Otherwise the frame may straddle
        // both windows.
        let result = if self.handshake.is_some() {
            self.decoder.decode_first(&payload)
        } else {
            let mut recording = listen;
            recording.extend_from_slice(&payload);
            self.decoder.decode_first(&recording)
        };

        match result {
            Err(ModemError::NoSignal) => {
                log::warn!("Synced but no frame could be aligned");
                Err(ModemError::CorruptedFrame)
            }
            other => other,
        }
    }

    /// Run `receive_attempts` attempts and return the plurality decode.
    pub fn receive<D: AudioDevice + ?Sized>(&mut self, device: &mut D) -> Result<String> {
        let attempts = self.session.receive_attempts;
        let mut tally = VoteTally::new();

        for n in 1..=attempts {
            match self.attempt(device) {
                Ok(text) => {
                    log::info!("Attempt {}/{}: {:?}", n, attempts, text);
                    tally.record(&text);
                }
                Err(e @ (ModemError::NoSignal | ModemError::CorruptedFrame)) => {
                    log::warn!("Attempt {}/{} failed: {}", n, attempts, e);
                    tally.record_failure();
                }
                Err(e) => return Err(e),
            }
        }

        let winner = tally.winner()?;
        log::info!(
            "Received {:?} ({} of {} attempts agree)",
            winner,
            tally.count(&winner),
            tally.attempts()
        );
        Ok(winner)
    }
}
