/// Offline chord render: strike a C major chord, release it, and bounce
/// everything into an in-memory sink - no audio device required.
use keytone::engine::{EngineConfig, RenderEngine};
use keytone::io::BufferSink;

fn main() {
    println!("=== Offline Chord Render ===\n");

    let config = EngineConfig::default();
    let blocks_per_second = config.sample_rate as usize / config.block_size;

    let (mut engine, mut handle) = RenderEngine::new(config);
    let mut sink = BufferSink::new(config.sample_rate);

    println!("Striking C major:");
    for (pitch, name) in [(60, "C4"), (64, "E4"), (67, "G4")] {
        println!("  Note On: {name} ({pitch}) at {:.2} Hz", handle.frequency_of(pitch));
        handle.note_on(pitch, 1.0);
    }

    // One second held, then release and let the tails ring out.
    for _ in 0..blocks_per_second {
        engine.tick(&mut sink);
    }
    println!("\nReleasing all three notes");
    for pitch in [60, 64, 67] {
        handle.note_off(pitch);
    }
    for _ in 0..blocks_per_second {
        engine.tick(&mut sink);
    }

    let samples = sink.samples();
    let peak = samples.iter().map(|s| s.unsigned_abs()).max().unwrap_or(0);
    println!("\nRendered {} samples ({} blocks)", samples.len(), samples.len() / config.block_size);
    println!("Peak amplitude: {peak} / {}", i16::MAX);
    println!("Voices still active: {}", handle.active_voices());
}
