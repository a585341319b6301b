use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use tonelink_core::sync::PreambleTone;
use tonelink_core::{
    ChannelConfig, DetectionThreshold, Encoder, FrameLocator, ModemError, PreambleSynchronizer,
    SyncPolicy, SyncState, ToneModulator,
};

fn noise(len: usize, sigma: f32, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    let normal = Normal::new(0.0, sigma).unwrap();
    (0..len).map(|_| normal.sample(&mut rng)).collect()
}

#[test]
fn test_pure_noise_never_syncs() {
    let config = ChannelConfig::audible();
    let mut sync = PreambleSynchronizer::new(&config);
    for seed in 0..5 {
        let window = noise(config.samples_for(1.0), 0.1, seed);
        assert!(
            matches!(sync.listen(&window), Err(ModemError::NoSignal)),
            "seed {} synced on noise",
            seed
        );
        assert_eq!(sync.state(), SyncState::Idle);
    }
}

#[test]
fn test_quiet_preamble_tone_below_floor_is_ignored() {
    let config = ChannelConfig::audible();
    let modulator = ToneModulator::new(config.sample_rate, 0.01, config.waveform);
    let mut sync = PreambleSynchronizer::new(&config);
    assert!(sync.listen(&modulator.modulate(400.0, 1.0)).is_err());
}

#[test]
fn test_narrowband_interferer_on_p0_fools_soft_sync_only() {
    let mut config = ChannelConfig::audible();
    let modulator = ToneModulator::new(config.sample_rate, 0.3, config.waveform);
    let hum = modulator.modulate(400.0, 1.0);

    let hit = PreambleSynchronizer::new(&config).listen(&hum).unwrap();
    assert_eq!(hit.tone, PreambleTone::Low);
    assert_eq!(hit.transitions, 0);

    config.sync_policy = SyncPolicy::Alternating { transitions: 2 };
    assert!(PreambleSynchronizer::new(&config).listen(&hum).is_err());
}

#[test]
fn test_sync_on_preamble_tail() {
    // Only the final p1 tone lands at the end of the window.
    let config = ChannelConfig::audible();
    let mut sync = PreambleSynchronizer::new(&config);
    let preamble = sync.preamble_waveform();
    let tail = &preamble[preamble.len() - config.samples_for(0.1)..];

    let mut window = noise(config.samples_for(0.9), 0.02, 1);
    window.extend_from_slice(tail);
    let hit = sync.listen(&window).unwrap();
    assert_eq!(hit.tone, PreambleTone::High);
}

#[test]
fn test_ultrasonic_preamble_syncs() {
    let config = ChannelConfig::near_ultrasonic();
    let mut sync = PreambleSynchronizer::new(&config);
    let mut window = noise(4000, 0.02, 2);
    window.extend(sync.preamble_waveform());
    window.truncate(config.samples_for(1.0));
    assert!(sync.listen(&window).is_ok());
}

#[test]
fn test_locator_position_is_exact_for_clean_frames() {
    let config = ChannelConfig::audible();
    let encoder = Encoder::new(&config).unwrap();
    let locator = FrameLocator::new(&config);

    for lead in [0usize, 1, 333, 4409, 10000] {
        let mut recording = vec![0.0; lead];
        recording.extend(encoder.encode("Hi").unwrap());
        let frame = locator.locate(&recording).unwrap().unwrap();
        assert_eq!(frame.preamble_start, lead);
        assert_eq!(frame.cycles, config.preamble_cycles);
        assert_eq!(
            frame.payload_start,
            lead + encoder.preamble().len() + config.gap_samples()
        );
    }
}

#[test]
fn test_locator_with_fixed_threshold() {
    let mut config = ChannelConfig::audible();
    config.correlation_threshold = DetectionThreshold::Fixed(0.6);
    let encoder = Encoder::new(&config).unwrap();

    let mut recording = noise(3000, 0.05, 3);
    recording.extend(encoder.encode("fixed").unwrap());
    let frame = FrameLocator::new(&config).locate(&recording).unwrap().unwrap();
    assert!(frame.preamble_start.abs_diff(3000) <= 2, "{:?}", frame);
}

#[test]
fn test_locator_rejects_payload_only() {
    let config = ChannelConfig::audible();
    let encoder = Encoder::new(&config).unwrap();
    let payload = encoder.payload("no preamble here").unwrap();
    assert!(FrameLocator::new(&config).locate(&payload).unwrap().is_none());
}
