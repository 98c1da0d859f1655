use crate::tuning::PitchId;

/// Control events crossing from the input context into the render context.
///
/// Configuration values (tuning ratio, master volume, envelope) travel
/// separately through the shared control state; this queue carries only the
/// voice events whose ordering matters.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum EngineMessage {
    NoteOn { pitch: PitchId, velocity: f32 },
    NoteOff { pitch: PitchId },
    StopAll,
}
