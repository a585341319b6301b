//! Loopback tests: the modulator's waveform is fed straight back into the
//! receive path, with silence, noise and timing offsets added in between.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use tonelink_core::{
    AckHandshake, AudioDevice, ChannelConfig, Decoder, Encoder, FecScheme, ModemError, Receiver,
    ReplayDevice, SessionConfig, SyncPolicy, TransmitReport, Transmitter, Waveform,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn add_noise(samples: &mut [f32], sigma: f32, seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    let normal = Normal::new(0.0, sigma).unwrap();
    for s in samples.iter_mut() {
        *s += normal.sample(&mut rng);
    }
}

fn with_margins(frame: Vec<f32>, lead: usize, tail: usize) -> Vec<f32> {
    let mut samples = vec![0.0; lead];
    samples.extend(frame);
    samples.extend(vec![0.0; tail]);
    samples
}

/// One receive attempt's worth of audio: `content` after `lead` samples,
/// padded to the listen plus payload windows.
fn attempt_window(channel: &ChannelConfig, session: &SessionConfig, content: &[f32], lead: usize) -> Vec<f32> {
    let len = channel.samples_for(session.listen_window) + channel.samples_for(session.payload_window);
    let mut window = vec![0.0; lead];
    window.extend_from_slice(content);
    window.resize(len, 0.0);
    window
}

fn roundtrip(config: &ChannelConfig, text: &str) -> String {
    let encoder = Encoder::new(config).unwrap();
    let mut decoder = Decoder::new(config).unwrap();
    let recording = with_margins(encoder.encode(text).unwrap(), 0, 1000);
    decoder.decode_first(&recording).unwrap()
}

#[test]
fn test_printable_ascii_roundtrip() {
    init_logging();
    let config = ChannelConfig::audible();
    let text: String = (0x20u8..0x7f).map(char::from).collect();
    assert_eq!(roundtrip(&config, &text), text);
}

#[test]
fn test_hi_symbol_stream() {
    let config = ChannelConfig::audible();
    let encoder = Encoder::new(&config).unwrap();
    let symbols: Vec<String> = encoder
        .symbols("Hi")
        .unwrap()
        .iter()
        .map(|s| s.to_string())
        .collect();
    assert_eq!(symbols, ["01", "00", "10", "00", "01", "10", "10", "01"]);
    assert_eq!(roundtrip(&config, "Hi"), "Hi");
}

#[test]
fn test_roundtrip_with_offset_and_noise() {
    init_logging();
    let config = ChannelConfig::audible();
    let encoder = Encoder::new(&config).unwrap();
    let mut decoder = Decoder::new(&config).unwrap();

    for (seed, lead) in [(1u64, 137usize), (2, 5000), (3, 22049)] {
        let mut recording = with_margins(encoder.encode("Hello, world").unwrap(), lead, 4000);
        add_noise(&mut recording, 0.05, seed);
        assert_eq!(decoder.decode_first(&recording).unwrap(), "Hello, world", "lead {}", lead);
    }
}

#[test]
fn test_heavy_noise_leaves_no_trailing_symbols() {
    init_logging();
    let config = ChannelConfig::audible();
    let encoder = Encoder::new(&config).unwrap();
    let mut decoder = Decoder::new(&config).unwrap();

    for seed in [21u64, 22, 23] {
        let mut recording = with_margins(encoder.encode("Hi").unwrap(), 3000, config.samples_for(3.0));
        add_noise(&mut recording, 0.2, seed);
        assert_eq!(decoder.decode_first(&recording).unwrap(), "Hi", "seed {}", seed);
    }
}

#[test]
fn test_receiver_exact_under_heavy_noise() {
    let channel = ChannelConfig::audible();
    let session = SessionConfig {
        receive_attempts: 1,
        ..SessionConfig::default()
    };
    let encoder = Encoder::new(&channel).unwrap();
    let mut script = attempt_window(&channel, &session, &encoder.encode("Hi").unwrap(), 2000);
    add_noise(&mut script, 0.2, 24);

    let mut device = ReplayDevice::new(channel.sample_rate, script);
    let mut rx = Receiver::new(&channel, &session).unwrap();
    assert_eq!(rx.receive(&mut device).unwrap(), "Hi");
}

#[test]
fn test_attenuated_signal() {
    let config = ChannelConfig::audible();
    let encoder = Encoder::new(&config).unwrap();
    let mut decoder = Decoder::new(&config).unwrap();

    let quiet: Vec<f32> = encoder.encode("quiet").unwrap().iter().map(|s| s * 0.1).collect();
    let mut recording = with_margins(quiet, 3000, 3000);
    add_noise(&mut recording, 0.005, 4);
    assert_eq!(decoder.decode_first(&recording).unwrap(), "quiet");
}

#[test]
fn test_fec_roundtrip_on_audible_channel() {
    let mut config = ChannelConfig::audible();
    config.fec = FecScheme::Hamming74;
    assert_eq!(roundtrip(&config, "FEC!"), "FEC!");
    assert_eq!(roundtrip(&config, "odd"), "odd");
}

#[test]
fn test_near_ultrasonic_preset() {
    init_logging();
    let config = ChannelConfig::near_ultrasonic();
    let encoder = Encoder::new(&config).unwrap();
    let mut decoder = Decoder::new(&config).unwrap();

    let mut recording = with_margins(encoder.encode("Ultrasonic 123").unwrap(), 9999, 5000);
    add_noise(&mut recording, 0.05, 5);
    assert_eq!(decoder.decode_first(&recording).unwrap(), "Ultrasonic 123");
}

#[test]
fn test_square_wave_carrier() {
    let mut config = ChannelConfig::audible();
    config.waveform = Waveform::Square;
    assert_eq!(roundtrip(&config, "square"), "square");
}

#[test]
fn test_latin1_roundtrip() {
    let config = ChannelConfig::audible();
    assert_eq!(roundtrip(&config, "caf\u{e9} \u{b5}"), "caf\u{e9} \u{b5}");
}

#[test]
fn test_offline_vote_survives_one_corrupted_copy() {
    init_logging();
    let config = ChannelConfig::audible();
    let encoder = Encoder::new(&config).unwrap();
    let mut decoder = Decoder::new(&config).unwrap();

    let good = encoder.encode("vote").unwrap();
    let bad = encoder.encode("vxte").unwrap();
    let gap = vec![0.0; config.samples_for(0.5)];

    let mut recording = good.clone();
    recording.extend_from_slice(&gap);
    recording.extend_from_slice(&bad);
    recording.extend_from_slice(&gap);
    recording.extend_from_slice(&good);
    recording.extend_from_slice(&gap);

    assert_eq!(decoder.decode_frames(&recording).unwrap(), ["vote", "vxte", "vote"]);
    assert_eq!(decoder.decode_recording(&recording).unwrap(), "vote");
}

#[test]
fn test_receiver_votes_across_attempts() {
    init_logging();
    let channel = ChannelConfig::audible();
    let session = SessionConfig {
        receive_attempts: 4,
        ..SessionConfig::default()
    };
    let encoder = Encoder::new(&channel).unwrap();
    let hi = encoder.encode("Hi").unwrap();
    let hx = encoder.encode("Hx").unwrap();

    let mut script = attempt_window(&channel, &session, &hi, 4410);
    script.extend(attempt_window(&channel, &session, &hi, 300));
    script.extend(attempt_window(&channel, &session, &hx, 2000));
    script.extend(attempt_window(&channel, &session, &[], 0));
    add_noise(&mut script, 0.02, 6);

    let mut device = ReplayDevice::new(channel.sample_rate, script);
    let mut rx = Receiver::new(&channel, &session).unwrap();
    assert_eq!(rx.receive(&mut device).unwrap(), "Hi");
    assert!(device.played().is_empty());
}

#[test]
fn test_receiver_fails_on_pure_noise() {
    let channel = ChannelConfig::audible();
    let session = SessionConfig {
        receive_attempts: 3,
        ..SessionConfig::default()
    };
    let len = 3 * attempt_window(&channel, &session, &[], 0).len();
    let mut script = vec![0.0; len];
    add_noise(&mut script, 0.05, 7);

    let mut device = ReplayDevice::new(channel.sample_rate, script);
    let mut rx = Receiver::new(&channel, &session).unwrap();
    assert!(matches!(
        rx.receive(&mut device),
        Err(ModemError::NoUsableDecode { attempts: 3 })
    ));
}

#[test]
fn test_open_loop_session_over_replay() {
    let channel = ChannelConfig::audible();
    let session = SessionConfig {
        repetitions: 2,
        receive_attempts: 1,
        ..SessionConfig::default()
    };

    let mut tx_device = ReplayDevice::silent(channel.sample_rate);
    let mut tx = Transmitter::new(&channel, &session).unwrap();
    let report = tx.transmit(&mut tx_device, "loop").unwrap();
    assert_eq!(report, TransmitReport { frames: 2, preambles: 2 });

    let mut air = with_margins(tx_device.played_samples(), 2500, 0);
    add_noise(&mut air, 0.03, 8);
    let mut rx_device = ReplayDevice::new(channel.sample_rate, air);
    let mut rx = Receiver::new(&channel, &session).unwrap();
    assert_eq!(rx.receive(&mut rx_device).unwrap(), "loop");
}

#[test]
fn test_handshake_rendezvous() {
    init_logging();
    let channel = ChannelConfig::audible();
    let session = SessionConfig {
        handshake: true,
        receive_attempts: 1,
        ..SessionConfig::default()
    };
    let encoder = Encoder::new(&channel).unwrap();

    // Receiver hears the preamble part-way through its listen window, then
    // the transmitter's burst once it has turned around.
    let mut heard = vec![0.0; channel.samples_for(0.25)];
    heard.extend(encoder.preamble());
    heard.extend(vec![0.0; channel.samples_for(0.5)]);
    heard.extend(encoder.encode_burst("ok").unwrap());
    heard.extend(vec![0.0; channel.samples_for(1.0)]);
    add_noise(&mut heard, 0.02, 9);

    let mut rx_device = ReplayDevice::new(channel.sample_rate, heard);
    let mut rx = Receiver::new(&channel, &session).unwrap();
    assert_eq!(rx.attempt(&mut rx_device).unwrap(), "ok");

    let ack = rx_device.played_samples();
    assert_eq!(ack, AckHandshake::new(&channel).unwrap().ack_waveform());

    // Transmitter hears that ACK inside its first listening window.
    let mut tx_script = vec![0.0; channel.samples_for(0.1)];
    tx_script.extend(ack);
    add_noise(&mut tx_script, 0.02, 10);
    let mut tx_device = ReplayDevice::new(channel.sample_rate, tx_script);
    let mut tx = Transmitter::new(&channel, &session).unwrap();

    let report = tx.transmit(&mut tx_device, "ok").unwrap();
    assert_eq!(report, TransmitReport { frames: 1, preambles: 1 });
    assert_eq!(tx_device.played()[0], encoder.preamble());
    assert_eq!(tx_device.played()[1], encoder.encode_burst("ok").unwrap());
}

#[test]
fn test_handshake_timeout_is_bounded() {
    let channel = ChannelConfig::near_ultrasonic();
    let session = SessionConfig {
        handshake: true,
        max_ack_retries: 4,
        ..SessionConfig::default()
    };
    let mut device = ReplayDevice::silent(channel.sample_rate);
    let mut tx = Transmitter::new(&channel, &session).unwrap();

    assert!(matches!(
        tx.transmit(&mut device, "nobody home"),
        Err(ModemError::HandshakeTimeout { retries: 4 })
    ));
    assert_eq!(device.played().len(), 4);
    assert_eq!(device.sample_rate(), 44100);
}

#[test]
fn test_alternating_policy_still_receives() {
    let mut channel = ChannelConfig::audible();
    channel.sync_policy = SyncPolicy::Alternating { transitions: 4 };
    let session = SessionConfig {
        receive_attempts: 1,
        ..SessionConfig::default()
    };
    let encoder = Encoder::new(&channel).unwrap();
    let script = attempt_window(&channel, &session, &encoder.encode("alt").unwrap(), 0);

    let mut device = ReplayDevice::new(channel.sample_rate, script);
    let mut rx = Receiver::new(&channel, &session).unwrap();
    assert_eq!(rx.receive(&mut device).unwrap(), "alt");
}
