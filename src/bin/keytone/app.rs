//! Keytone - terminal keyboard application and event loop

use std::collections::HashMap;
use std::time::{Duration, Instant};

use color_eyre::eyre::{Result as EyreResult, WrapErr};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use ratatui::DefaultTerminal;

use keytone::engine::{EngineConfig, EngineHandle, RenderEngine};
use keytone::io::cpal;
use keytone::io::OutputSink;
use keytone::tuning::{self, PitchId};

use crate::keys;
use crate::ui;

/// How long a key keeps sounding after its last press/repeat event.
/// Terminals deliver no key-release, so a refreshed deadline stands in for
/// one; OS key-repeat keeps a held key alive.
const HOLD_TIME: Duration = Duration::from_millis(350);

const RATIO_STEP: f64 = 0.01;
const VOLUME_STEP: f32 = 0.05;

/// Set up audio, spawn the engine, and hand the terminal to the event loop.
pub fn run() -> EyreResult<()> {
    let (stream, sink) = cpal::open().wrap_err("failed to open audio output")?;
    let config = EngineConfig {
        sample_rate: sink.sample_rate(),
        ..EngineConfig::default()
    };

    let (engine, handle) = RenderEngine::new(config);
    let render_thread = engine.spawn(sink).wrap_err("failed to spawn render thread")?;

    let mut terminal = ratatui::init();
    let mut app = Keytone {
        handle,
        held: HashMap::new(),
        should_quit: false,
    };
    let result = app.event_loop(&mut terminal);
    ratatui::restore();

    render_thread.shutdown();
    drop(stream);
    result
}

struct Keytone {
    handle: EngineHandle,
    /// Sounding keys and the deadline at which each gets its note-off.
    held: HashMap<PitchId, Instant>,
    should_quit: bool,
}

impl Keytone {
    fn event_loop(&mut self, terminal: &mut DefaultTerminal) -> EyreResult<()> {
        while !self.should_quit {
            self.release_expired();

            let view = self.status_view();
            terminal.draw(|frame| ui::render(frame, &view))?;

            // Poll keyboard at ~60 fps; repeats refresh the hold deadline.
            if event::poll(Duration::from_millis(16))? {
                if let Event::Key(key) = event::read()? {
                    if matches!(key.kind, KeyEventKind::Press | KeyEventKind::Repeat) {
                        self.handle_key(key.code);
                    }
                }
            }
        }

        self.handle.stop_all();
        Ok(())
    }

    fn handle_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,

            // Panic stop: everything off, release skipped.
            KeyCode::Char(' ') => {
                self.held.clear();
                self.handle.stop_all();
            }

            KeyCode::Char('+') | KeyCode::Char('=') => {
                let ratio = self.handle.interval_ratio();
                self.handle.set_interval_ratio(ratio + RATIO_STEP);
            }
            KeyCode::Char('-') => {
                let ratio = self.handle.interval_ratio();
                self.handle.set_interval_ratio(ratio - RATIO_STEP);
            }
            KeyCode::Char('0') => self.handle.set_interval_ratio(tuning::STANDARD_RATIO),

            KeyCode::Char(']') => {
                let volume = self.handle.master_volume();
                self.handle.set_master_volume(volume + VOLUME_STEP);
            }
            KeyCode::Char('[') => {
                let volume = self.handle.master_volume();
                self.handle.set_master_volume(volume - VOLUME_STEP);
            }

            KeyCode::Char(c) => {
                if let Some(pitch) = keys::pitch_for(c.to_ascii_lowercase()) {
                    let deadline = Instant::now() + HOLD_TIME;
                    // A fresh press triggers the note; a repeat only keeps
                    // it held.
                    if self.held.insert(pitch, deadline).is_none() {
                        self.handle.note_on(pitch, 1.0);
                    }
                }
            }

            _ => {}
        }
    }

    fn release_expired(&mut self) {
        let now = Instant::now();
        let expired: Vec<PitchId> = self
            .held
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(&pitch, _)| pitch)
            .collect();

        for pitch in expired {
            self.held.remove(&pitch);
            self.handle.note_off(pitch);
        }
    }

    fn status_view(&self) -> ui::StatusView {
        let mut held: Vec<String> = self.held.keys().map(|&p| tuning::name_of(p)).collect();
        held.sort();

        ui::StatusView {
            interval_ratio: self.handle.interval_ratio(),
            octave_count: self.handle.octave_count(),
            master_volume: self.handle.master_volume(),
            active_voices: self.handle.active_voices(),
            audio_degraded: self.handle.audio_degraded(),
            held,
        }
    }
}
