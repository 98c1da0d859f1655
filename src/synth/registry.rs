use crate::synth::voice::Voice;
use crate::tuning::PitchId;

/// The set of currently sounding voices, keyed by pitch.
///
/// Invariant: at most one voice per pitch at any instant. A note-on for an
/// already-sounding pitch REPLACES the old voice outright (no release tail)
/// rather than stacking a second one.
///
/// The registry is owned by the render context; every mutation funnels
/// through the engine's message drain at the top of a tick, which makes the
/// control queue the single serialization point for this set. Voices are
/// held in a plain Vec - the set is small (one entry per held key) and a
/// linear pitch search beats hashing at audio rates.
pub struct VoiceRegistry {
    voices: Vec<Voice>,
}

impl VoiceRegistry {
    pub fn new() -> Self {
        Self { voices: Vec::new() }
    }

    /// Start a voice for `pitch`, replacing any voice already on it.
    ///
    /// The frequency is the caller's snapshot from the tuning model; the
    /// registry never computes pitch math itself.
    pub fn note_on(&mut self, pitch: PitchId, velocity: f32, frequency_hz: f64) {
        if let Some(slot) = self.voices.iter_mut().find(|v| v.pitch() == pitch) {
            *slot = Voice::new(pitch, frequency_hz, velocity);
        } else {
            self.voices.push(Voice::new(pitch, frequency_hz, velocity));
        }
    }

    /// Move the voice on `pitch` into its release ramp. Silently ignored
    /// when no voice is sounding there.
    pub fn note_off(&mut self, pitch: PitchId) {
        if let Some(voice) = self.voices.iter_mut().find(|v| v.pitch() == pitch) {
            voice.release();
        }
    }

    /// Legacy hard cutoff: discard the voice immediately, skipping the
    /// release ramp. The audible click is the point - this reproduces the
    /// original instrument's note-off when explicitly configured.
    pub fn cut(&mut self, pitch: PitchId) {
        self.voices.retain(|v| v.pitch() != pitch);
    }

    /// Panic stop: discard every voice at once, whatever its stage.
    pub fn stop_all(&mut self) {
        self.voices.clear();
    }

    /// Drop voices whose envelopes have finished.
    pub fn prune_finished(&mut self) {
        self.voices.retain(|v| !v.is_finished());
    }

    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    pub fn voices_mut(&mut self) -> &mut [Voice] {
        &mut self.voices
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }
}

impl Default for VoiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::envelope::{EnvelopeParams, EnvelopeStage};

    #[test]
    fn note_on_replaces_instead_of_stacking() {
        let mut registry = VoiceRegistry::new();
        registry.note_on(60, 0.8, 261.63);
        registry.note_on(60, 0.5, 261.63);

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.voices()[0].velocity(), 0.5);
        // The replacement restarts the lifecycle from Attack.
        assert_eq!(registry.voices()[0].stage(), EnvelopeStage::Attack);
    }

    #[test]
    fn note_off_releases_only_the_matching_pitch() {
        let mut registry = VoiceRegistry::new();
        registry.note_on(60, 1.0, 261.63);
        registry.note_on(64, 1.0, 329.63);

        registry.note_off(60);

        let stages: Vec<_> = registry.voices().iter().map(|v| (v.pitch(), v.stage())).collect();
        assert!(stages.contains(&(60, EnvelopeStage::Release)));
        assert!(stages.contains(&(64, EnvelopeStage::Attack)));
    }

    #[test]
    fn note_off_without_a_voice_is_a_no_op() {
        let mut registry = VoiceRegistry::new();
        registry.note_off(60);
        assert!(registry.is_empty());
    }

    #[test]
    fn stop_all_clears_every_stage_immediately() {
        let params = EnvelopeParams::default();
        let mut registry = VoiceRegistry::new();
        registry.note_on(60, 1.0, 261.63); // Attack
        registry.note_on(64, 1.0, 329.63);
        for voice in registry.voices_mut() {
            voice.advance(0.2, &params); // into Decay
        }
        registry.note_on(67, 1.0, 392.0);
        registry.note_off(64); // Release

        registry.stop_all();
        assert!(registry.is_empty());
    }

    #[test]
    fn cut_discards_without_release() {
        let mut registry = VoiceRegistry::new();
        registry.note_on(60, 1.0, 261.63);
        registry.cut(60);
        assert!(registry.is_empty());
    }

    #[test]
    fn prune_drops_only_finished_voices() {
        let params = EnvelopeParams::adsr(0.001, 0.001, 0.5, 0.001);
        let mut registry = VoiceRegistry::new();
        registry.note_on(60, 1.0, 261.63);
        registry.note_on(64, 1.0, 329.63);

        // Run the first voice to completion, leave the second sounding.
        registry.note_off(60);
        for voice in registry.voices_mut() {
            if voice.pitch() == 60 {
                voice.advance(1.0, &params);
            }
        }

        registry.prune_finished();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.voices()[0].pitch(), 64);
    }
}
