mod settings;
mod wav;

use clap::{Args, Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use settings::{ConfigFile, Preset};
use std::path::{Path, PathBuf};
use tonelink_core::{
    AckHandshake, ChannelConfig, Decoder, Encoder, FecScheme, ReplayDevice, Receiver, SessionConfig,
    Transmitter, Waveform,
};
use wav::{CliError, WavDevice};

#[derive(Parser)]
#[command(name = "tonelink")]
#[command(about = "Acoustic FSK modem for short text messages")]
struct Cli {
    #[command(flatten)]
    channel: ChannelArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ChannelArgs {
    /// Channel preset both ends agree on
    #[arg(long, value_enum, default_value = "audible", global = true)]
    preset: Preset,

    /// JSON file overriding preset and session fields
    #[arg(long, value_name = "FILE.JSON", global = true)]
    config: Option<PathBuf>,

    /// Protect symbols with Hamming(7,4)
    #[arg(long, global = true)]
    fec: bool,

    /// Use a square-wave carrier instead of a sine
    #[arg(long, global = true)]
    square: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode text to a WAV file
    Encode {
        #[arg(value_name = "TEXT")]
        text: String,

        /// Output WAV file
        #[arg(value_name = "OUTPUT.WAV")]
        output: PathBuf,

        /// Number of frames to send
        #[arg(short, long)]
        repeat: Option<usize>,

        /// Silence between repeated frames, seconds
        #[arg(long)]
        frame_gap: Option<f32>,

        /// Output channel count (mono signal duplicated)
        #[arg(long, default_value = "1")]
        channels: u16,
    },

    /// Decode every frame of a WAV file and print the majority text
    Decode {
        /// Input WAV file
        #[arg(value_name = "INPUT.WAV")]
        input: PathBuf,
    },

    /// Run a windowed receive session with a WAV file as the microphone
    Receive {
        /// Input WAV file
        #[arg(value_name = "INPUT.WAV")]
        input: PathBuf,

        /// Listen/sync/decode cycles to vote over
        #[arg(short, long)]
        attempts: Option<usize>,

        /// Answer the preamble with an ACK tone
        #[arg(long)]
        handshake: bool,

        /// Write the ACK tones that were played to this WAV file
        #[arg(long, value_name = "ACK.WAV")]
        ack_out: Option<PathBuf>,
    },

    /// Print the symbol stream and carrier frequencies for a text
    Symbols {
        #[arg(value_name = "TEXT")]
        text: String,
    },

    /// Send text through a simulated noisy channel and receive it
    Simulate {
        #[arg(value_name = "TEXT")]
        text: String,

        /// Standard deviation of the additive Gaussian noise
        #[arg(long, default_value = "0.05")]
        noise: f32,

        /// Silence before the transmission reaches the receiver, milliseconds
        #[arg(long, default_value = "250")]
        offset_ms: u32,

        /// Rendezvous with preamble and ACK before the payload
        #[arg(long)]
        handshake: bool,

        /// Noise generator seed
        #[arg(long, default_value = "42")]
        seed: u64,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let (channel, session) = load_config(&cli.channel)?;

    match cli.command {
        Commands::Encode {
            text,
            output,
            repeat,
            frame_gap,
            channels,
        } => encode_command(&channel, session, &text, output, repeat, frame_gap, channels)?,
        Commands::Decode { input } => decode_command(&channel, &input)?,
        Commands::Receive {
            input,
            attempts,
            handshake,
            ack_out,
        } => receive_command(&channel, session, &input, attempts, handshake, ack_out)?,
        Commands::Symbols { text } => symbols_command(&channel, &text)?,
        Commands::Simulate {
            text,
            noise,
            offset_ms,
            handshake,
            seed,
        } => simulate_command(&channel, session, &text, noise, offset_ms, handshake, seed)?,
    }

    Ok(())
}

fn load_config(args: &ChannelArgs) -> Result<(ChannelConfig, SessionConfig), CliError> {
    let mut channel = args.preset.channel();
    let mut session = SessionConfig::default();

    if let Some(path) = &args.config {
        ConfigFile::load(path)?.apply(&mut channel, &mut session)?;
    }
    if args.fec {
        channel.fec = FecScheme::Hamming74;
    }
    if args.square {
        channel.waveform = Waveform::Square;
    }

    channel.validate()?;
    session.validate_with(&channel)?;
    log::debug!("Channel: {:?}", channel);
    log::debug!("Session: {:?}", session);
    Ok((channel, session))
}

fn encode_command(
    channel: &ChannelConfig,
    mut session: SessionConfig,
    text: &str,
    output: PathBuf,
    repeat: Option<usize>,
    frame_gap: Option<f32>,
    channels: u16,
) -> Result<(), CliError> {
    // Nobody can answer a file, so frames go out open loop.
    session.handshake = false;
    if let Some(n) = repeat {
        session.repetitions = n;
    }
    if let Some(gap) = frame_gap {
        session.frame_gap = gap;
    }

    let mut device = WavDevice::new(channel.sample_rate, None, Some(output), channels)?;
    let mut tx = Transmitter::new(channel, &session)?;
    let report = tx.transmit(&mut device, text)?;

    if let Some(path) = device.finish()? {
        println!(
            "Encoded {} chars as {} frame(s) to {}",
            text.chars().count(),
            report.frames,
            path.display()
        );
    }
    Ok(())
}

fn decode_command(channel: &ChannelConfig, input: &Path) -> Result<(), CliError> {
    let (samples, rate) = wav::read_wav(input)?;
    if rate != channel.sample_rate {
        return Err(CliError::SampleRate {
            path: input.display().to_string(),
            found: rate,
            expected: channel.sample_rate,
        });
    }

    let mut decoder = Decoder::new(channel)?;
    let text = decoder.decode_recording(&samples)?;
    println!("{}", text);
    Ok(())
}

fn receive_command(
    channel: &ChannelConfig,
    mut session: SessionConfig,
    input: &Path,
    attempts: Option<usize>,
    handshake: bool,
    ack_out: Option<PathBuf>,
) -> Result<(), CliError> {
    if let Some(n) = attempts {
        session.receive_attempts = n;
    }
    session.handshake |= handshake;

    let mut device = WavDevice::new(channel.sample_rate, Some(input), ack_out, 1)?;
    let mut rx = Receiver::new(channel, &session)?;
    let text = rx.receive(&mut device)?;
    if let Some(path) = device.finish()? {
        log::info!("ACK tones written to {}", path.display());
    }

    println!("{}", text);
    Ok(())
}

fn symbols_command(channel: &ChannelConfig, text: &str) -> Result<(), CliError> {
    let encoder = Encoder::new(channel)?;
    let symbols = encoder.symbols(text)?;
    println!(
        "{} symbols, {} bits each{}",
        symbols.len(),
        channel.symbol_table.bits_per_symbol(),
        if channel.fec == FecScheme::Hamming74 {
            ", Hamming(7,4)"
        } else {
            ""
        }
    );
    for symbol in &symbols {
        println!("{} {:.0} Hz", symbol, channel.symbol_table.frequency(*symbol));
    }
    Ok(())
}

fn simulate_command(
    channel: &ChannelConfig,
    mut session: SessionConfig,
    text: &str,
    noise: f32,
    offset_ms: u32,
    handshake: bool,
    seed: u64,
) -> Result<(), CliError> {
    session.handshake |= handshake;
    session.validate_with(channel)?;
    let normal = Normal::new(0.0, noise).map_err(|e| CliError::Argument(format!("noise {}: {}", noise, e)))?;
    let mut rng = StdRng::seed_from_u64(seed);

    let encoder = Encoder::new(channel)?;
    let frame = encoder.encode(text)?;
    let burst = encoder.encode_burst(text)?;

    // One payload window has to hold a whole frame however late it starts.
    let offset = offset_ms as f32 / 1000.0;
    let needed = offset + session.ack_window + frame.len() as f32 / channel.sample_rate as f32;
    if session.payload_window < needed {
        log::info!("Payload window widened to {:.2} s", needed);
        session.payload_window = needed;
        session.validate_with(channel)?;
    }

    // Transmitter side. With the handshake its microphone hears the
    // receiver's ACK shortly after every preamble, one ACK window each.
    let mut tx_device = ReplayDevice::silent(channel.sample_rate);
    if session.handshake {
        let mut window = vec![0.0; channel.samples_for(0.1)];
        window.extend(AckHandshake::new(channel)?.ack_waveform());
        window.resize(channel.samples_for(session.ack_window), 0.0);
        for _ in 0..session.repetitions {
            tx_device.extend_script(&window);
        }
    }
    let mut tx = Transmitter::new(channel, &session)?;
    let report = tx.transmit(&mut tx_device, text)?;

    // Air: start offset, then everything the transmitter played. The
    // transmitter spent a whole ACK window listening before each burst.
    let mut air = vec![0.0; channel.samples_for(offset)];
    for block in tx_device.played() {
        if session.handshake && *block == burst {
            air.extend(vec![0.0; channel.samples_for(session.ack_window)]);
        }
        air.extend_from_slice(block);
    }
    air.extend(vec![0.0; channel.samples_for(1.0)]);
    for s in air.iter_mut() {
        *s += normal.sample(&mut rng);
    }
    log::info!(
        "Simulated {:.2} s of audio ({} frames, sigma {})",
        air.len() as f32 / channel.sample_rate as f32,
        report.frames,
        noise
    );

    let mut rx_device = ReplayDevice::new(channel.sample_rate, air);
    let mut rx = Receiver::new(channel, &session)?;
    let received = rx.receive(&mut rx_device)?;
    if session.handshake {
        log::info!("Receiver played {} ACK tone(s)", rx_device.played().len());
    }

    println!("{}", received);
    if received != text {
        log::warn!("Received text differs from sent text {:?}", text);
    }
    Ok(())
}
