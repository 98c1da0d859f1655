//! The streaming render engine and its control handle.

/*
Single-Writer Rendering
=======================

Exactly one component in the process synthesizes audio: the RenderEngine.
It runs a continuous loop - one iteration is a TICK - and each tick turns
the set of sounding voices into one fixed-size block of 16-bit mono PCM:

    1. Copy the shared control state (tuning, master volume, envelope).
    2. Drain the control queue into the voice registry. A note-on snapshots
       its frequency from this tick's temperament.
    3. Mix: per voice, per sample, waveform × envelope × velocity, summed
       into one float block.
    4. Scale by master volume, hard-clip to i16, write the block to the
       output sink.
    5. Prune finished voices and publish the active-voice count.

Everything else in the process talks to the engine through an EngineHandle:
voice events travel over a bounded wait-free SPSC queue (drained in step 2,
so an event is audible no later than the next tick), and configuration sits
in a small shared state behind a mutex that both sides hold only long
enough to copy it. No lock is ever held across sample synthesis, and
nothing but the engine ever touches the sink - concurrent writers to one
audio device interleave into garbage, which is the failure mode this
design exists to rule out.

The sink is also the clock: a full platform buffer blocks `write_block`,
which paces the loop at exactly real time. There is no timer and no wall
clock anywhere in the render path, so tests drive ticks synchronously
against an in-memory sink.

A sink write failure drops that block (one interval of silence) and the
loop carries on - a dead render loop would silence the instrument for
good. Repeated failures raise a degraded flag the UI can poll; the first
successful write clears it.
*/

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use log::{debug, warn};
use rtrb::{Consumer, Producer, RingBuffer};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::dsp::envelope::EnvelopeParams;
use crate::dsp::mix;
use crate::io::sink::{OutputSink, SinkError};
use crate::synth::message::EngineMessage;
use crate::synth::registry::VoiceRegistry;
use crate::tuning::{PitchId, PitchInfo, Temperament};
use crate::MAX_BLOCK_SIZE;

/// Voice events the queue can hold before note-ons start being dropped.
const QUEUE_CAPACITY: usize = 256;

/// Consecutive sink failures before the degraded flag goes up.
const DEGRADED_THRESHOLD: u32 = 3;

/// Engine construction parameters.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    pub sample_rate: u32,
    pub block_size: usize,
    /// Legacy note-off: discard the voice instantly instead of playing the
    /// release ramp. Reproduces the original instrument's (clicky) behavior
    /// for compatibility; never the default.
    pub hard_note_off: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            block_size: 512,
            hard_note_off: false,
        }
    }
}

/// Configuration shared between the handle and the engine. Copied whole at
/// the top of every tick; changes apply to that tick onward, never
/// retroactively.
#[derive(Debug, Clone, Copy)]
struct ControlState {
    temperament: Temperament,
    master_volume: f32,
    envelope: EnvelopeParams,
}

impl Default for ControlState {
    fn default() -> Self {
        Self {
            temperament: Temperament::new(),
            master_volume: 0.7,
            envelope: EnvelopeParams::default(),
        }
    }
}

/// The single writer: owns the voice registry and all sample production.
pub struct RenderEngine {
    registry: VoiceRegistry,
    rx: Consumer<EngineMessage>,
    shared: Arc<Mutex<ControlState>>,
    stop: Arc<AtomicBool>,
    degraded: Arc<AtomicBool>,
    active_voices: Arc<AtomicUsize>,
    sample_rate: u32,
    hard_note_off: bool,
    mix_buf: Vec<f32>,
    voice_buf: Vec<f32>,
    pcm_buf: Vec<i16>,
    consecutive_failures: u32,
}

impl RenderEngine {
    /// Build an engine/handle pair. The engine goes to the render context
    /// (via [`run`](Self::run) or [`spawn`](Self::spawn)); the handle is the
    /// control surface for the input/UI collaborator.
    pub fn new(config: EngineConfig) -> (Self, EngineHandle) {
        let block_size = config.block_size.clamp(1, MAX_BLOCK_SIZE);
        let (tx, rx) = RingBuffer::<EngineMessage>::new(QUEUE_CAPACITY);

        let shared = Arc::new(Mutex::new(ControlState::default()));
        let stop = Arc::new(AtomicBool::new(false));
        let degraded = Arc::new(AtomicBool::new(false));
        let active_voices = Arc::new(AtomicUsize::new(0));

        let engine = Self {
            registry: VoiceRegistry::new(),
            rx,
            shared: shared.clone(),
            stop: stop.clone(),
            degraded: degraded.clone(),
            active_voices: active_voices.clone(),
            sample_rate: config.sample_rate,
            hard_note_off: config.hard_note_off,
            mix_buf: vec![0.0; block_size],
            voice_buf: vec![0.0; block_size],
            pcm_buf: vec![0; block_size],
            consecutive_failures: 0,
        };

        let handle = EngineHandle {
            tx,
            shared,
            degraded,
            active_voices,
        };

        (engine, handle)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Render one block of mono PCM into `out`.
    ///
    /// Public so offline callers (tests, bounce-to-buffer demos) can drive
    /// the engine without a sink; the live path goes through `tick`.
    pub fn render_block(&mut self, out: &mut [i16]) {
        let control = *self.shared.lock().unwrap();
        self.drain_messages(&control);

        let frames = out.len().min(self.mix_buf.len());
        let out = &mut out[..frames];
        let dt = 1.0 / self.sample_rate as f64;

        {
            // Destructure to allow simultaneous mutable borrows
            let Self {
                registry,
                mix_buf,
                voice_buf,
                ..
            } = self;

            let block = &mut mix_buf[..frames];
            block.fill(0.0);

            for voice in registry.voices_mut() {
                let vbuf = &mut voice_buf[..frames];
                let velocity = voice.velocity();
                for sample in vbuf.iter_mut() {
                    *sample = voice.next_sample(dt, &control.envelope) * velocity;
                }
                mix::sum_in_place(block, vbuf);
            }

            mix::quantize_block(block, out, control.master_volume);
            registry.prune_finished();
        }

        self.active_voices
            .store(self.registry.len(), Ordering::Relaxed);
    }

    /// One live iteration: render a block and push it to the sink.
    pub fn tick<S: OutputSink>(&mut self, sink: &mut S) {
        let mut pcm = std::mem::take(&mut self.pcm_buf);
        self.render_block(&mut pcm);
        match sink.write_block(&pcm) {
            Ok(()) => self.note_write_ok(),
            Err(err) => self.note_write_failure(&err),
        }
        self.pcm_buf = pcm;
    }

    /// Run until the owning [`EngineThread`] (or handle drop) raises the
    /// stop flag. Blocks only inside `write_block` - sink backpressure is
    /// what paces the loop.
    pub fn run<S: OutputSink>(&mut self, sink: &mut S) {
        while !self.stop.load(Ordering::Acquire) {
            self.tick(sink);
        }
    }

    /// Move the engine onto a dedicated render thread.
    pub fn spawn<S: OutputSink + 'static>(mut self, mut sink: S) -> std::io::Result<EngineThread> {
        let stop = self.stop.clone();
        let join = thread::Builder::new()
            .name("keytone-render".into())
            .spawn(move || self.run(&mut sink))?;
        Ok(EngineThread {
            stop,
            join: Some(join),
        })
    }

    fn drain_messages(&mut self, control: &ControlState) {
        while let Ok(message) = self.rx.pop() {
            match message {
                EngineMessage::NoteOn { pitch, velocity } => {
                    let frequency = control.temperament.frequency_of(pitch);
                    self.registry.note_on(pitch, velocity, frequency);
                }
                EngineMessage::NoteOff { pitch } => {
                    if self.hard_note_off {
                        self.registry.cut(pitch);
                    } else {
                        self.registry.note_off(pitch);
                    }
                }
                EngineMessage::StopAll => self.registry.stop_all(),
            }
        }
    }

    fn note_write_ok(&mut self) {
        if self.consecutive_failures > 0 {
            debug!("audio sink recovered after {} failed writes", self.consecutive_failures);
        }
        self.consecutive_failures = 0;
        self.degraded.store(false, Ordering::Release);
    }

    fn note_write_failure(&mut self, err: &SinkError) {
        self.consecutive_failures += 1;
        warn!("dropped audio block ({} consecutive): {err}", self.consecutive_failures);
        if self.consecutive_failures >= DEGRADED_THRESHOLD {
            self.degraded.store(true, Ordering::Release);
        }
    }
}

/// Guard for a spawned render thread. Raises the stop flag and joins on
/// `shutdown` or drop - teardown is explicit, never process-exit cleanup.
pub struct EngineThread {
    stop: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl EngineThread {
    pub fn shutdown(mut self) {
        self.halt();
    }

    fn halt(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl Drop for EngineThread {
    fn drop(&mut self) {
        self.halt();
    }
}

/// Control-side surface handed to the input/UI collaborator.
///
/// Voice events are wait-free queue pushes that never block on the render
/// path; configuration setters take the shared lock only long enough to
/// store a value. All reads are pull-based - the engine emits no callbacks.
///
/// The queue is single-producer: there is exactly one handle per engine.
pub struct EngineHandle {
    tx: Producer<EngineMessage>,
    shared: Arc<Mutex<ControlState>>,
    degraded: Arc<AtomicBool>,
    active_voices: Arc<AtomicUsize>,
}

impl EngineHandle {
    /// Start (or restart) a note. Audible no later than the next tick.
    pub fn note_on(&mut self, pitch: PitchId, velocity: f32) {
        self.send(EngineMessage::NoteOn {
            pitch,
            velocity: velocity.clamp(0.0, 1.0),
        });
    }

    /// Release a note into its envelope ramp. Ignored if nothing sounds
    /// on that pitch.
    pub fn note_off(&mut self, pitch: PitchId) {
        self.send(EngineMessage::NoteOff { pitch });
    }

    /// Panic stop: discard every voice within one tick, skipping release.
    pub fn stop_all(&mut self) {
        self.send(EngineMessage::StopAll);
    }

    fn send(&mut self, message: EngineMessage) {
        if self.tx.push(message).is_err() {
            // A full queue means the render loop is stalled; dropping the
            // event is the non-blocking option.
            warn!("control queue full, dropping {message:?}");
        }
    }

    pub fn set_master_volume(&mut self, volume: f32) {
        self.shared.lock().unwrap().master_volume = volume.clamp(0.0, 1.0);
    }

    pub fn master_volume(&self) -> f32 {
        self.shared.lock().unwrap().master_volume
    }

    /// Change the interval ratio (silently clamped into [0.001, 3.000]).
    /// Re-pitches notes struck from the next tick on; sounding voices keep
    /// their frequency snapshot.
    pub fn set_interval_ratio(&mut self, ratio: f64) {
        self.shared.lock().unwrap().temperament.set_interval_ratio(ratio);
    }

    pub fn interval_ratio(&self) -> f64 {
        self.shared.lock().unwrap().temperament.interval_ratio()
    }

    pub fn frequency_of(&self, pitch: PitchId) -> f64 {
        self.shared.lock().unwrap().temperament.frequency_of(pitch)
    }

    pub fn octave_count(&self) -> u32 {
        self.shared.lock().unwrap().temperament.octave_count()
    }

    /// The derived keyboard under the current ratio, for UI layout.
    pub fn all_pitches(&self) -> Vec<PitchInfo> {
        self.shared.lock().unwrap().temperament.all_pitches()
    }

    pub fn set_envelope(&mut self, params: EnvelopeParams) {
        self.shared.lock().unwrap().envelope = params;
    }

    pub fn envelope(&self) -> EnvelopeParams {
        self.shared.lock().unwrap().envelope
    }

    /// Number of sounding voices as of the last completed tick.
    pub fn active_voices(&self) -> usize {
        self.active_voices.load(Ordering::Relaxed)
    }

    /// True while the sink keeps rejecting blocks (audio is dropping out).
    pub fn audio_degraded(&self) -> bool {
        self.degraded.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::sink::BufferSink;

    fn test_engine(block_size: usize) -> (RenderEngine, EngineHandle) {
        RenderEngine::new(EngineConfig {
            sample_rate: 44_100,
            block_size,
            hard_note_off: false,
        })
    }

    /// Sink that refuses every write, for degraded-path tests.
    struct DeadSink;

    impl OutputSink for DeadSink {
        fn sample_rate(&self) -> u32 {
            44_100
        }

        fn write_block(&mut self, _block: &[i16]) -> Result<(), SinkError> {
            Err(SinkError::Closed)
        }
    }

    #[test]
    fn empty_engine_renders_silence() {
        let (mut engine, _handle) = test_engine(128);
        let mut block = vec![0i16; 128];
        engine.render_block(&mut block);
        assert!(block.iter().all(|&s| s == 0));
    }

    #[test]
    fn note_on_is_audible_in_the_next_block() {
        let (mut engine, mut handle) = test_engine(256);
        handle.note_on(69, 1.0);

        let mut block = vec![0i16; 256];
        engine.render_block(&mut block);
        assert!(block.iter().any(|&s| s != 0));
        assert_eq!(handle.active_voices(), 1);
    }

    #[test]
    fn master_volume_scales_and_zero_silences() {
        let (mut engine, mut handle) = test_engine(256);
        handle.set_master_volume(0.0);
        handle.note_on(69, 1.0);

        let mut block = vec![0i16; 256];
        engine.render_block(&mut block);
        assert!(block.iter().all(|&s| s == 0));

        // Same sounding voice, volume restored: audible again.
        handle.set_master_volume(1.0);
        engine.render_block(&mut block);
        assert!(block.iter().any(|&s| s != 0));
    }

    #[test]
    fn volume_setter_clamps() {
        let (_engine, mut handle) = test_engine(64);
        handle.set_master_volume(1.8);
        assert_eq!(handle.master_volume(), 1.0);
        handle.set_master_volume(-0.3);
        assert_eq!(handle.master_volume(), 0.0);
    }

    #[test]
    fn stop_all_silences_within_one_tick() {
        let (mut engine, mut handle) = test_engine(256);
        handle.note_on(60, 1.0);
        handle.note_on(64, 1.0);

        let mut block = vec![0i16; 256];
        engine.render_block(&mut block);
        assert_eq!(handle.active_voices(), 2);

        handle.stop_all();
        engine.render_block(&mut block);
        assert!(block.iter().all(|&s| s == 0));
        assert_eq!(handle.active_voices(), 0);
    }

    #[test]
    fn released_voices_are_pruned_after_their_tail() {
        let (mut engine, mut handle) = test_engine(512);
        handle.set_envelope(EnvelopeParams::adsr(0.001, 0.001, 0.5, 0.001));
        handle.note_on(60, 1.0);

        let mut block = vec![0i16; 512];
        engine.render_block(&mut block);
        handle.note_off(60);

        // 512 samples at 44.1 kHz is ~11.6 ms, far past the 1 ms release.
        engine.render_block(&mut block);
        engine.render_block(&mut block);
        assert_eq!(handle.active_voices(), 0);
    }

    #[test]
    fn hard_note_off_cuts_without_a_tail() {
        let (mut engine, mut handle) = RenderEngine::new(EngineConfig {
            hard_note_off: true,
            ..EngineConfig::default()
        });
        handle.note_on(60, 1.0);

        let mut block = vec![0i16; 512];
        engine.render_block(&mut block);
        assert_eq!(handle.active_voices(), 1);

        handle.note_off(60);
        engine.render_block(&mut block);
        assert_eq!(handle.active_voices(), 0);
    }

    #[test]
    fn ratio_change_applies_to_future_notes_only() {
        let (mut engine, mut handle) = test_engine(128);
        handle.note_on(69, 1.0);
        let mut block = vec![0i16; 128];
        engine.render_block(&mut block);

        let before = handle.frequency_of(69);
        handle.set_interval_ratio(1.5);
        let after = handle.frequency_of(69);
        // The reference pitch is the fixed point of the ratio.
        assert_eq!(before, after);
        assert!(handle.frequency_of(70) > before);

        // The sounding voice was unaffected; it still renders.
        engine.render_block(&mut block);
        assert_eq!(handle.active_voices(), 1);
    }

    #[test]
    fn degraded_flag_rises_on_repeated_failures_and_clears_on_success() {
        let (mut engine, mut handle) = test_engine(64);
        handle.note_on(60, 1.0);

        let mut dead = DeadSink;
        engine.tick(&mut dead);
        assert!(!handle.audio_degraded(), "one failure is not degraded");
        engine.tick(&mut dead);
        engine.tick(&mut dead);
        assert!(handle.audio_degraded());

        // The loop kept running; a good write clears the condition.
        let mut sink = BufferSink::new(44_100);
        engine.tick(&mut sink);
        assert!(!handle.audio_degraded());
        assert_eq!(sink.samples().len(), 64);
    }

    #[test]
    fn spawned_engine_shuts_down_cleanly() {
        let (engine, mut handle) = test_engine(64);
        handle.note_on(60, 1.0);

        let thread = engine.spawn(BufferSink::new(44_100)).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        thread.shutdown();
    }
}
