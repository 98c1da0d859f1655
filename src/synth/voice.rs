use crate::dsp::envelope::{Envelope, EnvelopeParams, EnvelopeStage};
use crate::dsp::harmonics;
use crate::tuning::PitchId;

/// One currently sounding note.
///
/// The frequency is snapshotted at note-on and stays fixed for the voice's
/// life - a tuning-ratio change re-pitches future notes, never notes already
/// sounding. The voice-local clock drives the waveform; the envelope drives
/// loudness and the lifecycle.
pub struct Voice {
    pitch: PitchId,
    frequency_hz: f64,
    velocity: f32,
    envelope: Envelope,
    clock: f64, // seconds since note-on
}

impl Voice {
    pub fn new(pitch: PitchId, frequency_hz: f64, velocity: f32) -> Self {
        Self {
            pitch,
            frequency_hz,
            velocity: velocity.clamp(0.0, 1.0),
            envelope: Envelope::new(),
            clock: 0.0,
        }
    }

    /// Step the envelope by `dt` seconds, returning the amplitude multiplier.
    pub fn advance(&mut self, dt: f64, params: &EnvelopeParams) -> f32 {
        self.envelope.advance(dt, params)
    }

    /// Instantaneous waveform value at voice-local time `t`.
    #[inline]
    pub fn sample(&self, t: f64) -> f32 {
        harmonics::string_tone(self.frequency_hz, t)
    }

    /// One render step: waveform × envelope, advancing the voice clock.
    ///
    /// Velocity and master volume are applied by the mixer, not here, so
    /// the envelope tests can observe the raw contour.
    #[inline]
    pub fn next_sample(&mut self, dt: f64, params: &EnvelopeParams) -> f32 {
        let amplitude = self.envelope.advance(dt, params);
        let wave = self.sample(self.clock);
        self.clock += dt;
        wave * amplitude
    }

    /// Key released: let the envelope ramp out from its current level.
    pub fn release(&mut self) {
        self.envelope.note_off();
    }

    pub fn is_finished(&self) -> bool {
        self.envelope.is_finished()
    }

    pub fn pitch(&self) -> PitchId {
        self.pitch
    }

    pub fn frequency_hz(&self) -> f64 {
        self.frequency_hz
    }

    pub fn velocity(&self) -> f32 {
        self.velocity
    }

    pub fn stage(&self) -> EnvelopeStage {
        self.envelope.stage()
    }

    /// Current envelope level, for status displays.
    pub fn envelope_level(&self) -> f32 {
        self.envelope.level()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f64 = 1.0 / 44_100.0;

    #[test]
    fn velocity_is_clamped_into_unit_range() {
        assert_eq!(Voice::new(60, 261.63, 2.0).velocity(), 1.0);
        assert_eq!(Voice::new(60, 261.63, -1.0).velocity(), 0.0);
    }

    #[test]
    fn frequency_snapshot_is_stable() {
        let mut voice = Voice::new(69, 440.0, 1.0);
        let params = EnvelopeParams::default();
        for _ in 0..128 {
            voice.next_sample(DT, &params);
        }
        assert_eq!(voice.frequency_hz(), 440.0);
    }

    #[test]
    fn lifecycle_runs_attack_to_finished() {
        let params = EnvelopeParams::adsr(0.002, 0.002, 0.5, 0.002);
        let mut voice = Voice::new(60, 261.63, 1.0);
        assert_eq!(voice.stage(), EnvelopeStage::Attack);

        for _ in 0..(0.01 / DT) as usize {
            voice.next_sample(DT, &params);
        }
        assert_eq!(voice.stage(), EnvelopeStage::Sustain);

        voice.release();
        assert_eq!(voice.stage(), EnvelopeStage::Release);

        for _ in 0..(0.01 / DT) as usize {
            voice.next_sample(DT, &params);
        }
        assert!(voice.is_finished());
    }

    #[test]
    fn finished_voice_is_silent() {
        let params = EnvelopeParams::adsr(0.001, 0.001, 0.5, 0.001);
        let mut voice = Voice::new(60, 261.63, 1.0);
        for _ in 0..(0.02 / DT) as usize {
            voice.next_sample(DT, &params);
        }
        voice.release();
        for _ in 0..(0.02 / DT) as usize {
            voice.next_sample(DT, &params);
        }
        assert!(voice.is_finished());
        assert_eq!(voice.next_sample(DT, &params), 0.0);
    }
}
