use hound::{SampleFormat, WavSpec};
use std::fs::File;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tonelink_core::{AudioDevice, ModemError, ReplayDevice, ToneModulator};

#[derive(Debug, Error)]
pub enum CliError {
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config file error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{path} is {found} Hz but the channel runs at {expected} Hz")]
    SampleRate {
        path: String,
        found: u32,
        expected: u32,
    },

    #[error("Unsupported WAV format: {0}")]
    Format(String),

    #[error("Invalid argument: {0}")]
    Argument(String),

    #[error(transparent)]
    Modem(#[from] ModemError),
}

/// Read a WAV file as mono f32 samples. Multichannel input is averaged.
pub fn read_wav(path: &Path) -> Result<(Vec<f32>, u32), CliError> {
    let file = File::open(path)?;
    let mut reader = hound::WavReader::new(file)?;
    let spec = reader.spec();
    log::info!(
        "Read WAV: {} Hz, {} channels, {} bits",
        spec.sample_rate,
        spec.channels,
        spec.bits_per_sample
    );

    let interleaved: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(|v| v as f32 / 32768.0))
            .collect::<Result<_, _>>()?,
        (SampleFormat::Int, 24) | (SampleFormat::Int, 32) => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()?
        }
        (SampleFormat::Float, 32) => reader.samples::<f32>().collect::<Result<_, _>>()?,
        (format, bits) => {
            return Err(CliError::Format(format!("{:?} with {} bits", format, bits)));
        }
    };

    let channels = spec.channels.max(1) as usize;
    let mono = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };

    Ok((mono, spec.sample_rate))
}

/// Write mono samples as 16-bit PCM, duplicated into `channels` channels.
pub fn write_wav(path: &Path, samples: &[f32], sample_rate: u32, channels: u16) -> Result<(), CliError> {
    let channels = channels.max(1);
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let file = File::create(path)?;
    let mut writer = hound::WavWriter::new(file, spec)?;
    for sample in ToneModulator::to_multichannel(samples, channels) {
        let clamped = sample.clamp(-1.0, 1.0);
        writer.write_sample((clamped * 32767.0) as i16)?;
    }
    writer.finalize()?;

    log::info!(
        "Wrote {} samples ({} channels) to {}",
        samples.len(),
        channels,
        path.display()
    );
    Ok(())
}

/// Audio device backed by files: the microphone replays an input WAV and
/// everything played is written to an output WAV on [`WavDevice::finish`].
pub struct WavDevice {
    inner: ReplayDevice,
    output: Option<PathBuf>,
    channels: u16,
}

impl WavDevice {
    pub fn new(
        sample_rate: u32,
        input: Option<&Path>,
        output: Option<PathBuf>,
        channels: u16,
    ) -> Result<Self, CliError> {
        let script = match input {
            Some(path) => {
                let (samples, rate) = read_wav(path)?;
                if rate != sample_rate {
                    return Err(CliError::SampleRate {
                        path: path.display().to_string(),
                        found: rate,
                        expected: sample_rate,
                    });
                }
                samples
            }
            None => Vec::new(),
        };

        Ok(Self {
            inner: ReplayDevice::new(sample_rate, script),
            output,
            channels,
        })
    }

    /// Write the played audio, if an output file was requested.
    pub fn finish(self) -> Result<Option<PathBuf>, CliError> {
        let played = self.inner.played_samples();
        match self.output {
            Some(path) if !played.is_empty() => {
                write_wav(&path, &played, self.inner.sample_rate(), self.channels)?;
                Ok(Some(path))
            }
            _ => Ok(None),
        }
    }
}

impl AudioDevice for WavDevice {
    fn sample_rate(&self) -> u32 {
        self.inner.sample_rate()
    }

    fn record(&mut self, duration_secs: f32) -> tonelink_core::Result<Vec<f32>> {
        self.inner.record(duration_secs)
    }

    fn play(&mut self, samples: &[f32], sample_rate: u32) -> tonelink_core::Result<()> {
        self.inner.play(samples, sample_rate)
    }
}
