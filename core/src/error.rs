use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModemError {
    #[error("No preamble detected in the listening window")]
    NoSignal,

    #[error("Frame synchronized but payload decoded to nothing")]
    CorruptedFrame,

    #[error("No acknowledgment after {retries} preamble attempts")]
    HandshakeTimeout { retries: usize },

    #[error("No usable decode in {attempts} reception attempts")]
    NoUsableDecode { attempts: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Character {0:?} has no 8-bit ordinal")]
    UnencodableCharacter(char),

    #[error("Insufficient data")]
    InsufficientData,

    #[error("FFT error: {0}")]
    FftError(String),

    #[error("Audio device error: {0}")]
    Device(String),
}

pub type Result<T> = std::result::Result<T, ModemError>;
