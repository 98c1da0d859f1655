use keytone::dsp::envelope::EnvelopeParams;
use keytone::engine::{EngineConfig, RenderEngine};
use keytone::io::BufferSink;

fn peak(samples: &[i16]) -> i16 {
    samples.iter().map(|s| s.saturating_abs()).max().unwrap_or(0)
}

#[test]
fn chord_lifecycle_renders_and_releases_to_silence() {
    let (mut engine, mut handle) = RenderEngine::new(EngineConfig::default());
    let mut sink = BufferSink::new(44_100);

    handle.set_envelope(EnvelopeParams::adsr(0.01, 0.01, 0.8, 0.02));
    handle.note_on(60, 1.0);
    handle.note_on(64, 1.0);
    handle.note_on(67, 0.9);

    engine.tick(&mut sink);
    assert_eq!(handle.active_voices(), 3);
    assert!(sink.samples().iter().any(|&s| s != 0), "chord must be audible");

    handle.note_off(60);
    handle.note_off(64);
    handle.note_off(67);

    // 20ms of release is under two 512-sample blocks at 44.1kHz; render a
    // few more to be past the tails.
    for _ in 0..5 {
        engine.tick(&mut sink);
    }
    assert_eq!(handle.active_voices(), 0);

    let samples = sink.samples();
    let tail = &samples[samples.len() - 512..];
    assert!(tail.iter().all(|&s| s == 0), "released chord must decay to silence");
}

#[test]
fn master_volume_scales_the_rendered_peak() {
    let render_at = |volume: f32| {
        let (mut engine, mut handle) = RenderEngine::new(EngineConfig::default());
        let mut sink = BufferSink::new(44_100);
        handle.set_master_volume(volume);
        handle.note_on(69, 1.0);
        for _ in 0..4 {
            engine.tick(&mut sink);
        }
        peak(sink.samples())
    };

    let loud = render_at(0.8) as i32;
    let quiet = render_at(0.1) as i32;
    assert!(loud > quiet * 4, "volume should scale output: {loud} vs {quiet}");
}

#[test]
fn stop_all_cuts_mid_release_voices_immediately() {
    let (mut engine, mut handle) = RenderEngine::new(EngineConfig {
        block_size: 256,
        ..EngineConfig::default()
    });
    let mut sink = BufferSink::new(44_100);

    // Long release so the voice would otherwise ring for seconds.
    handle.set_envelope(EnvelopeParams::adsr(0.005, 0.01, 0.7, 5.0));
    handle.note_on(60, 1.0);
    engine.tick(&mut sink);

    handle.note_off(60);
    engine.tick(&mut sink);
    assert_eq!(handle.active_voices(), 1, "voice should still be releasing");

    handle.stop_all();
    engine.tick(&mut sink);
    assert_eq!(handle.active_voices(), 0);

    let samples = sink.samples();
    let last_block = &samples[samples.len() - 256..];
    assert!(last_block.iter().all(|&s| s == 0));
}

#[test]
fn output_is_bounded_under_heavy_polyphony() {
    let (mut engine, mut handle) = RenderEngine::new(EngineConfig::default());
    let mut sink = BufferSink::new(44_100);

    handle.set_master_volume(1.0);
    for pitch in 48..64 {
        handle.note_on(pitch, 1.0);
    }
    for _ in 0..8 {
        engine.tick(&mut sink);
    }

    // Sixteen full-velocity voices overload the mix; the hard clip keeps
    // every sample representable and the engine keeps running.
    assert_eq!(handle.active_voices(), 16);
    assert!(sink.samples().iter().any(|&s| s == i16::MAX || s == i16::MIN));
}

#[test]
fn retuning_affects_new_notes_between_ticks() {
    let (mut engine, mut handle) = RenderEngine::new(EngineConfig::default());
    let mut sink = BufferSink::new(44_100);

    handle.note_on(69, 1.0);
    engine.tick(&mut sink);

    handle.set_interval_ratio(1.25);
    assert!((handle.frequency_of(69) - 440.0).abs() < 1e-9);
    assert!((handle.frequency_of(70) - 550.0).abs() < 1e-9);

    handle.note_on(70, 1.0);
    engine.tick(&mut sink);
    assert_eq!(handle.active_voices(), 2);
}
