//! Low-level DSP primitives used by voices and the render engine.
//!
//! These components are allocation-free and realtime-safe, making them safe to
//! embed directly inside voice structs and the per-sample mixing loop. They
//! intentionally stay focused on the signal-processing math so the engine can
//! layer on voice management and output-sink orchestration.

/// Attack/decay/sustain/release envelope state machine.
pub mod envelope;
/// Fixed harmonic-series string tone.
pub mod harmonics;
/// Block summing and hard-clip PCM quantization.
pub mod mix;

pub use envelope::{Envelope, EnvelopeParams, EnvelopeStage};
