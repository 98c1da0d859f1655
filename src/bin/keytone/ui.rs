//! Status view for the terminal keyboard.
//!
//! Everything shown here is pulled from the engine handle once per frame -
//! the engine pushes nothing at the UI.

use ratatui::{
    layout::{Constraint, Direction, Layout},
    style::{Color, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph},
    Frame,
};

/// One frame's worth of engine state, as shown to the player.
pub struct StatusView {
    pub interval_ratio: f64,
    pub octave_count: u32,
    pub master_volume: f32,
    pub active_voices: usize,
    pub audio_degraded: bool,
    pub held: Vec<String>,
}

pub fn render(frame: &mut Frame, view: &StatusView) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4), // tuning + voices
            Constraint::Length(3), // volume gauge
            Constraint::Min(6),    // key map / help
            Constraint::Length(1), // degraded warning
        ])
        .split(frame.area());

    let tuning = Paragraph::new(vec![
        Line::from(vec![
            Span::raw("interval ratio "),
            Span::styled(format!("{:.6}", view.interval_ratio), Style::new().bold()),
            Span::raw(format!("   octaves {}", view.octave_count)),
        ]),
        Line::from(format!(
            "voices {}   held [{}]",
            view.active_voices,
            view.held.join(" ")
        )),
    ])
    .block(Block::default().borders(Borders::ALL).title(" keytone "));
    frame.render_widget(tuning, chunks[0]);

    let volume = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title(" volume "))
        .gauge_style(Style::new().fg(Color::Cyan))
        .ratio(view.master_volume.clamp(0.0, 1.0) as f64);
    frame.render_widget(volume, chunks[1]);

    let help = Paragraph::new(vec![
        Line::from("play      a s d f g h j k l   (white)   w e t y u o   (black)"),
        Line::from("tuning    +/- adjust ratio    0 reset to equal temperament"),
        Line::from("volume    [ quieter   ] louder"),
        Line::from("space     stop all voices"),
        Line::from("q / esc   quit"),
    ])
    .block(Block::default().borders(Borders::ALL).title(" keys "));
    frame.render_widget(help, chunks[2]);

    if view.audio_degraded {
        let warning = Paragraph::new("audio degraded: output device is rejecting blocks")
            .style(Style::new().fg(Color::Red).bold());
        frame.render_widget(warning, chunks[3]);
    }
}
