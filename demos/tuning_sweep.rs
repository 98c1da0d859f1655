/// Sweep the interval ratio and watch the keyboard reshape itself: the
/// octave count, the playable span, and where familiar pitches land.
use keytone::tuning::{Temperament, STANDARD_RATIO};

fn main() {
    println!("=== Temperament Sweep ===\n");

    let ratios = [0.5, 0.9, 1.02, STANDARD_RATIO, 1.1, 1.5, 2.0, 3.0];

    println!("{:>10}  {:>7}  {:>5}  {:>12}  {:>12}", "ratio", "octaves", "keys", "A4 (69)", "C4 (60)");
    for ratio in ratios {
        let t = Temperament::with_ratio(ratio);
        let keys = t.all_pitches();
        println!(
            "{:>10.6}  {:>7}  {:>5}  {:>9.2} Hz  {:>9.2} Hz",
            t.interval_ratio(),
            t.octave_count(),
            keys.len(),
            t.frequency_of(69),
            t.frequency_of(60),
        );
    }

    println!("\nThe reference pitch A4 stays at 440 Hz under every ratio;");
    println!("everything else stretches around it.");
}
