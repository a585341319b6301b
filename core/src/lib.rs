//! Acoustic FSK modem for short text messages
//!
//! Text is turned into fixed-width symbols (optionally Hamming(7,4)
//! protected), each symbol is sent as one tone from a frequency table, and
//! every frame is led by an alternating two-tone preamble. The receiver
//! syncs on the preamble, aligns on it by cross-correlation and reads one
//! tone per symbol slot. Handshake, repetition and majority voting sit on
//! top in [`link`].

pub mod config;
pub mod correlation;
pub mod decoder;
pub mod detector;
pub mod device;
pub mod encoder;
pub mod error;
pub mod fec;
pub mod handshake;
pub mod link;
pub mod reliability;
pub mod symbol;
pub mod sync;
pub mod tone;

pub use config::{ChannelConfig, DetectionThreshold, DetectorKind, SessionConfig, SyncPolicy, Waveform};
pub use decoder::Decoder;
pub use detector::{Detection, FrequencyDetector};
pub use device::{AudioDevice, ReplayDevice};
pub use encoder::Encoder;
pub use error::{ModemError, Result};
pub use fec::FecScheme;
pub use handshake::AckHandshake;
pub use link::{Receiver, TransmitReport, Transmitter};
pub use reliability::VoteTally;
pub use symbol::{Symbol, SymbolCodec, SymbolTable};
pub use sync::{FrameLocation, FrameLocator, PreambleSynchronizer, SyncState};
pub use tone::ToneModulator;
