//! UI rendering helpers for the terminal user interface.
//!
//! This module contains functions to render the TUI using `ratatui`.

use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout},
    style::{Modifier, Style},
    widgets::{Block, Borders, List, ListItem, ListState, Padding, Paragraph, Wrap},
};
use std::{collections::BTreeMap, sync::LazyLock, time::Duration};

use crate::app::App;
use crate::audio::PlaybackState;
use crate::config::{ControlsSettings, UiSettings};
use crate::library::Track;

static CONTROLS_MAP: LazyLock<BTreeMap<&'static str, &'static str>> = LazyLock::new(|| {
    BTreeMap::from([
        ("j/k", "up/down"),
        ("gg/G", "top/bottom"),
        ("enter", "play selected song"),
        ("space/p", "play/pause"),
        ("s", "stop"),
        // H/L and +/- are filled from config.
        ("d", "delete"),
        ("q", "quit"),
    ])
});

/// Render the controls help text, incorporating scrub seconds and volume step.
fn controls_text(controls: &ControlsSettings) -> String {
    let order = ["j/k", "gg/G", "enter", "space/p", "s", "H/L", "+/-", "d", "q"];
    order
        .iter()
        .filter_map(|k| match *k {
            "H/L" => Some(format!("[H/L] scrub -/+{}s", controls.scrub_seconds)),
            "+/-" => Some(format!(
                "[+/-] volume ±{}%",
                (controls.volume_step * 100.0).round()
            )),
            _ => CONTROLS_MAP.get(k).map(|v| format!("[{}] {}", k, v)),
        })
        .collect::<Vec<String>>()
        .join(" | ")
}

/// Format a `Duration` as `MM:SS`.
fn format_mmss(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// One-line now-playing summary: state, song and time.
fn now_playing_text(app: &App) -> String {
    let p = &app.playback;
    let state = match p.state {
        PlaybackState::Stopped => return "Stopped".to_string(),
        PlaybackState::Playing => "Playing",
        PlaybackState::Paused => "Paused",
    };

    let title = p.title.as_deref().unwrap_or_default();
    let song = match p.artist.as_deref().filter(|a| !a.trim().is_empty()) {
        Some(artist) => format!("{artist} - {title}"),
        None => title.to_string(),
    };
    let time = match p.duration {
        Some(total) => format!("{} / {}", format_mmss(p.elapsed), format_mmss(total)),
        None => format_mmss(p.elapsed),
    };
    format!("{state} • Song: {song} [{time}]")
}

/// Render the entire UI into the provided `frame` using `app` state and settings.
pub fn draw(
    frame: &mut Frame,
    app: &App,
    tracks: &[Track],
    ui_settings: &UiSettings,
    controls_settings: &ControlsSettings,
) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(4),
            Constraint::Min(1),
            Constraint::Length(4),
        ])
        .split(frame.area());

    let header = Paragraph::new(ui_settings.header_text.as_str())
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" tapedeck ")
                .title_alignment(Alignment::Center),
        );
    frame.render_widget(header, chunks[0]);

    // Status box
    let status = {
        let mut parts = vec![
            now_playing_text(app),
            format!("Volume: {:.0}%", app.playback.volume * 100.0),
            format!("Tracks: {}", tracks.len()),
        ];
        if let Some(msg) = &app.status_message {
            parts.push(msg.clone());
        }
        parts.join(" • ")
    };
    let status_par = Paragraph::new(status)
        .block(
            Block::bordered()
                .padding(Padding {
                    left: 1,
                    right: 0,
                    top: 0,
                    bottom: 0,
                })
                .title(" status "),
        )
        .wrap(Wrap { trim: true });
    frame.render_widget(status_par, chunks[1]);

    // Main list
    {
        let playing = app.playing_index(tracks);

        // Only build ListItems for the visible window, centered on the selection.
        let total = tracks.len();
        let list_height = chunks[2].height.saturating_sub(2) as usize;
        let sel = app.selected.min(total.saturating_sub(1));
        let (start, end) = if total <= list_height || list_height == 0 {
            (0, total)
        } else {
            let half = list_height / 2;
            let start = sel.saturating_sub(half).min(total - list_height);
            (start, start + list_height)
        };

        let visible_items: Vec<ListItem> = tracks[start..end]
            .iter()
            .enumerate()
            .map(|(offset, track)| {
                let marker = if playing == Some(start + offset) {
                    "♪ "
                } else {
                    "  "
                };
                ListItem::new(format!("{marker}{}", track.display()))
            })
            .collect();

        let title = if tracks.is_empty() {
            " tracks (pass files or folders on the command line to import) "
        } else {
            " tracks "
        };
        let list = List::new(visible_items)
            .block(Block::default().borders(Borders::ALL).title(title))
            .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
            .highlight_symbol("> ");
        let mut state = ListState::default();
        if total > 0 {
            state.select(Some(sel - start));
        }
        frame.render_stateful_widget(list, chunks[2], &mut state);
    }

    let footer = Paragraph::new(controls_text(controls_settings))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" controls ")
                .padding(Padding {
                    left: 1,
                    right: 0,
                    top: 0,
                    bottom: 0,
                }),
        )
        .wrap(Wrap { trim: true });
    frame.render_widget(footer, chunks[3]);
}
