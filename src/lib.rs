pub mod dsp;
#[cfg(feature = "rtrb")]
pub mod engine; // Streaming render loop and its control handle
pub mod io;
pub mod synth; // Voice state and the active-voice set
pub mod tuning; // Pitch-to-frequency mapping with an adjustable ratio

pub const MAX_BLOCK_SIZE: usize = 2048;
pub(crate) const MIN_TIME: f64 = 1.0 / 48_000.0;
