use crate::MIN_TIME;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/*
ADSR Envelope Implementation
============================

This module implements a linear ADSR envelope - the amplitude contour that
shapes a note's loudness from key-down to silence.

Vocabulary
----------

  level       The envelope's current output value (0.0 to 1.0). This
              multiplies the voice's waveform to control loudness over time.

  stage       Which phase the envelope is in: Attack, Decay, Sustain,
              Release, or Finished. A state machine governs transitions.

  elapsed     Seconds spent in the current stage. The only driver of
              transitions - stages advance on time, not on sample counts,
              so the same envelope state is exact at any sample rate.

  params      The shared ADSR configuration. Process-wide and read on every
              advance, so a configuration change reaches sounding voices on
              their next step.


The Shape: Linear Ramps
-----------------------

  Level
    1.0 ┐     ╱╲
        │    ╱  ╲___________
    S   │   ╱               ╲
        │  ╱                 ╲
    0.0 └─╱───────────────────╲──→ Time
        Attack Decay  Sustain  Release
         (A)   (D)      (S)      (R)


The State Machine
-----------------

    ┌────────┐ t≥A  ┌───────┐ t≥D  ┌─────────┐
    │ Attack │ ───→ │ Decay │ ───→ │ Sustain │
    └────────┘      └───────┘      └─────────┘
        │               │               │
        │ note_off      │ note_off      │ note_off
        ↓               ↓               ↓
    ┌─────────┐  t≥R  ┌──────────┐
    │ Release │ ────→ │ Finished │
    └─────────┘       └──────────┘

There is no Idle: an envelope exists only while its voice is sounding, and
Finished is terminal - the voice registry prunes the voice on the next tick.

Two details are correctness requirements, not niceties:

  1. Stage boundaries CARRY the leftover elapsed time forward. Crossing the
     end of Attack with 3 ms to spare starts Decay 3 ms in, rather than at
     zero. Resetting would stretch every stage by up to one step and drift
     the contour against wall time.

  2. Release starts from the CURRENT level, not from 1.0 or the sustain
     level. Releasing mid-Attack at level 0.4 ramps 0.4 → 0. Starting the
     ramp anywhere else produces an audible click.
*/

/// The current stage of the envelope state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeStage {
    Attack,   // Ramping 0 → 1 since key-down
    Decay,    // Ramping 1 → sustain level
    Sustain,  // Holding until note-off, no time limit
    Release,  // Ramping current level → 0
    Finished, // Terminal; the voice is eligible for removal
}

/// Shared ADSR configuration, read by every voice on every step.
///
/// Times are floored to a minimum step so zero-length stages cannot divide
/// by zero; the sustain level is clamped into [0, 1].
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvelopeParams {
    attack_time: f64,
    decay_time: f64,
    sustain_level: f64,
    release_time: f64,
}

impl EnvelopeParams {
    pub fn adsr(attack: f64, decay: f64, sustain: f64, release: f64) -> Self {
        Self {
            attack_time: attack.max(MIN_TIME),
            decay_time: decay.max(MIN_TIME),
            sustain_level: sustain.clamp(0.0, 1.0),
            release_time: release.max(MIN_TIME),
        }
    }

    pub fn attack(&self) -> f64 {
        self.attack_time
    }

    pub fn decay(&self) -> f64 {
        self.decay_time
    }

    pub fn sustain(&self) -> f64 {
        self.sustain_level
    }

    pub fn release(&self) -> f64 {
        self.release_time
    }
}

impl Default for EnvelopeParams {
    /// The stock keyboard contour: 100 ms attack, 300 ms decay, 60%
    /// sustain, 500 ms release.
    fn default() -> Self {
        Self::adsr(0.1, 0.3, 0.6, 0.5)
    }
}

/// Per-voice envelope state. Born in Attack at level zero.
#[derive(Debug, Clone, Copy)]
pub struct Envelope {
    stage: EnvelopeStage,
    elapsed: f64, // seconds in the current stage
    level: f32,
    release_start_level: f32,
}

impl Envelope {
    pub fn new() -> Self {
        Self {
            stage: EnvelopeStage::Attack,
            elapsed: 0.0,
            level: 0.0,
            release_start_level: 0.0,
        }
    }

    /// Advance by `dt` seconds and return the amplitude multiplier.
    ///
    /// Transitions are evaluated in a loop so a large step can cross
    /// several stage boundaries, each carrying its leftover time onward.
    pub fn advance(&mut self, dt: f64, params: &EnvelopeParams) -> f32 {
        self.elapsed += dt;

        loop {
            match self.stage {
                EnvelopeStage::Attack => {
                    if self.elapsed < params.attack_time {
                        self.level = (self.elapsed / params.attack_time) as f32;
                        break;
                    }
                    // Carry the leftover into Decay instead of resetting.
                    self.elapsed -= params.attack_time;
                    self.stage = EnvelopeStage::Decay;
                }

                EnvelopeStage::Decay => {
                    if self.elapsed < params.decay_time {
                        let progress = self.elapsed / params.decay_time;
                        self.level = (1.0 - (1.0 - params.sustain_level) * progress) as f32;
                        break;
                    }
                    self.elapsed -= params.decay_time;
                    self.stage = EnvelopeStage::Sustain;
                }

                EnvelopeStage::Sustain => {
                    // Holds until note_off; elapsed keeps growing, unused.
                    self.level = params.sustain_level as f32;
                    break;
                }

                EnvelopeStage::Release => {
                    if self.elapsed < params.release_time {
                        let remaining = (1.0 - self.elapsed / params.release_time) as f32;
                        self.level = self.release_start_level * remaining;
                        break;
                    }
                    self.stage = EnvelopeStage::Finished;
                }

                EnvelopeStage::Finished => {
                    self.level = 0.0;
                    break;
                }
            }
        }

        debug_assert!((0.0..=1.0).contains(&self.level));
        self.level
    }

    /// Key released: enter Release from the current level.
    ///
    /// No-op once already releasing or finished.
    pub fn note_off(&mut self) {
        match self.stage {
            EnvelopeStage::Attack | EnvelopeStage::Decay | EnvelopeStage::Sustain => {
                self.release_start_level = self.level;
                self.elapsed = 0.0;
                self.stage = EnvelopeStage::Release;
            }
            EnvelopeStage::Release | EnvelopeStage::Finished => {}
        }
    }

    pub fn is_finished(&self) -> bool {
        self.stage == EnvelopeStage::Finished
    }

    /// Current amplitude multiplier (0.0 to 1.0).
    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn stage(&self) -> EnvelopeStage {
        self.stage
    }
}

impl Default for Envelope {
    fn default() -> Self {
        Self::new()
    }
}
