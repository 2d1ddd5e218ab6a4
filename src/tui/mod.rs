use crate::analysis::Analyzer;
use crate::audio::engine::EngineController;
use crate::audio::score::{Score, NUM_CHANNELS};
use crate::command::AudioEvent;
use crate::io::library::LoaderMessage;
use crate::viz::{create_visualizers, Visualizer, VizSettings};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame, Terminal,
};
use std::io;
use std::sync::mpsc;
use std::time::{Duration, Instant};

/// Seek step for the arrow keys, in seconds
const SEEK_STEP: f64 = 5.0;

/// Volume step for +/-
const VOLUME_STEP: f32 = 0.1;

/// Loading state of one instrument slot
#[derive(Debug, Clone, Copy, PartialEq)]
enum InstrumentState {
    Loading,
    Ready,
    /// Load failed or timed out; the fallback synth plays instead
    Fallback,
}

/// TUI application state: transport, visualizer selection, settings
pub struct TuiApp {
    score: Score,
    file_name: String,
    analyzer: Analyzer,
    visualizers: Vec<Box<dyn Visualizer>>,
    active_viz: usize,
    settings: VizSettings,
    show_settings: bool,

    playing: bool,
    finished: bool,
    position: f64,
    volume: f32,
    channel_muted: [bool; NUM_CHANNELS],

    /// Per-slot (library name, state), in slot order
    instruments: Vec<(String, InstrumentState)>,
    status_message: String,
    should_quit: bool,
}

impl TuiApp {
    pub fn new(score: Score, file_name: String, libraries: &[String]) -> Self {
        let instruments = libraries
            .iter()
            .map(|name| (name.clone(), InstrumentState::Loading))
            .collect();

        Self {
            score,
            file_name,
            analyzer: Analyzer::new(),
            visualizers: create_visualizers(),
            active_viz: 0,
            settings: VizSettings::default(),
            show_settings: false,
            playing: false,
            finished: false,
            position: 0.0,
            volume: 1.0,
            channel_muted: [false; NUM_CHANNELS],
            instruments,
            status_message: "SPACE play/pause | s stop | ←/→ seek | +/- volume | TAB visualizer | o settings | q quit".to_string(),
            should_quit: false,
        }
    }

    fn handle_key(&mut self, code: KeyCode, controller: &mut EngineController) {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => {
                self.should_quit = true;
            }
            KeyCode::Char(' ') => {
                if self.playing {
                    controller.pause();
                    self.playing = false;
                    self.status_message = "Paused".to_string();
                } else {
                    controller.play();
                    self.playing = true;
                    self.finished = false;
                    self.status_message = "Playing".to_string();
                }
            }
            KeyCode::Char('s') => {
                controller.stop();
                self.playing = false;
                self.finished = false;
                self.position = 0.0;
                self.status_message = "Stopped".to_string();
            }
            KeyCode::Left => {
                let target = (self.position - SEEK_STEP).max(0.0);
                controller.seek(target);
                self.position = target;
                self.status_message = format!("Seek to {:.1}s", target);
            }
            KeyCode::Right => {
                let target = (self.position + SEEK_STEP).min(self.score.duration);
                controller.seek(target);
                self.position = target;
                self.status_message = format!("Seek to {:.1}s", target);
            }
            KeyCode::Char('+') | KeyCode::Char('=') => {
                self.volume = (self.volume + VOLUME_STEP).min(2.0);
                controller.set_volume(self.volume);
                self.status_message = format!("Volume {:.0}%", self.volume * 100.0);
            }
            KeyCode::Char('-') => {
                self.volume = (self.volume - VOLUME_STEP).max(0.0);
                controller.set_volume(self.volume);
                self.status_message = format!("Volume {:.0}%", self.volume * 100.0);
            }
            KeyCode::Tab => {
                self.active_viz = (self.active_viz + 1) % self.visualizers.len();
            }
            KeyCode::BackTab => {
                self.active_viz =
                    (self.active_viz + self.visualizers.len() - 1) % self.visualizers.len();
            }
            KeyCode::Char('o') => {
                self.show_settings = !self.show_settings;
            }
            KeyCode::Char(c @ '0'..='9') => {
                // Toggle mute for channels 0-9
                let channel = c as usize - '0' as usize;
                self.channel_muted[channel] = !self.channel_muted[channel];
                controller.set_channel_mute(channel as u8, self.channel_muted[channel]);
                self.status_message = format!(
                    "Channel {} {}",
                    channel,
                    if self.channel_muted[channel] {
                        "muted"
                    } else {
                        "unmuted"
                    }
                );
            }
            // Settings adjustments
            KeyCode::Char('[') => {
                self.settings.sensitivity = (self.settings.sensitivity - 0.1).max(0.2);
            }
            KeyCode::Char(']') => {
                self.settings.sensitivity = (self.settings.sensitivity + 0.1).min(3.0);
            }
            KeyCode::Char('{') => {
                self.settings.speed = (self.settings.speed - 0.1).max(0.2);
            }
            KeyCode::Char('}') => {
                self.settings.speed = (self.settings.speed + 0.1).min(3.0);
            }
            KeyCode::Char('<') => {
                self.settings.particle_count = self.settings.particle_count.saturating_sub(20).max(20);
            }
            KeyCode::Char('>') => {
                self.settings.particle_count = (self.settings.particle_count + 20).min(500);
            }
            _ => {}
        }
    }

    fn handle_audio_event(&mut self, event: AudioEvent) {
        match event {
            AudioEvent::PlaybackPosition(position) => {
                self.position = position;
            }
            AudioEvent::PlaybackFinished => {
                self.playing = false;
                self.finished = true;
                self.status_message = "Finished".to_string();
            }
        }
    }

    /// Forward loader results to the audio thread and track status
    fn handle_loader_message(
        &mut self,
        message: LoaderMessage,
        controller: &mut EngineController,
    ) {
        match message {
            LoaderMessage::Loaded { slot, sampler } => {
                if let Some(entry) = self.instruments.get_mut(slot) {
                    entry.1 = InstrumentState::Ready;
                }
                controller.instrument_ready(slot, *sampler);
            }
            LoaderMessage::Failed { slot, .. } => {
                if let Some(entry) = self.instruments.get_mut(slot) {
                    entry.1 = InstrumentState::Fallback;
                }
            }
            LoaderMessage::TimedOut { remaining } => {
                for entry in &mut self.instruments {
                    if remaining.contains(&entry.0) && entry.1 == InstrumentState::Loading {
                        entry.1 = InstrumentState::Fallback;
                    }
                }
                self.status_message = "Sample loading timed out; using synth voices".to_string();
            }
            LoaderMessage::Done => {}
        }
    }
}

/// Run the application frame loop until quit.
///
/// Each frame: poll input, drain engine events and loader results,
/// compute the analysis snapshot at the current playhead, update the
/// active visualizer, draw.
pub fn run(
    mut app: TuiApp,
    mut controller: EngineController,
    mut event_rx: rtrb::Consumer<AudioEvent>,
    loader_rx: mpsc::Receiver<LoaderMessage>,
) -> Result<(), Box<dyn std::error::Error>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_loop(&mut app, &mut controller, &mut event_rx, &loader_rx, &mut terminal);

    // Restore the terminal even if the loop errored
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_loop(
    app: &mut TuiApp,
    controller: &mut EngineController,
    event_rx: &mut rtrb::Consumer<AudioEvent>,
    loader_rx: &mpsc::Receiver<LoaderMessage>,
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut last_frame = Instant::now();

    while !app.should_quit {
        // Input
        if event::poll(Duration::from_millis(16))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.handle_key(key.code, controller);
                }
            }
        }

        // Engine events
        while let Ok(audio_event) = event_rx.pop() {
            app.handle_audio_event(audio_event);
        }

        // Background loader results
        while let Ok(message) = loader_rx.try_recv() {
            app.handle_loader_message(message, controller);
        }

        // Playhead comes from the shared atomic between position events
        if app.playing {
            app.position = controller.get_playhead_seconds();
        }

        let dt = last_frame.elapsed().as_secs_f64();
        last_frame = Instant::now();

        // Analysis drives only the active visualizer
        let snapshot = app.analyzer.snapshot(&app.score, app.position);
        let settings = app.settings;
        app.visualizers[app.active_viz].update(&snapshot, dt, &settings);

        terminal.draw(|frame| draw(app, frame))?;
    }

    Ok(())
}

fn draw(app: &TuiApp, frame: &mut Frame) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Title
            Constraint::Length(1), // Instruments
            Constraint::Min(4),    // Visualizer
            Constraint::Length(1), // Transport
            Constraint::Length(1), // Status
        ])
        .split(frame.size());

    draw_title(app, frame, chunks[0]);
    draw_instruments(app, frame, chunks[1]);

    // Visualizer draws straight into the frame buffer
    let viz_area = if app.show_settings && chunks[2].width > 30 {
        let split = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(10), Constraint::Length(28)])
            .split(chunks[2]);
        draw_settings(app, frame, split[1]);
        split[0]
    } else {
        chunks[2]
    };
    app.visualizers[app.active_viz].render(viz_area, frame.buffer_mut());

    draw_transport(app, frame, chunks[3]);
    frame.render_widget(
        Paragraph::new(app.status_message.as_str()).style(Style::default().fg(Color::DarkGray)),
        chunks[4],
    );
}

fn draw_title(app: &TuiApp, frame: &mut Frame, area: Rect) {
    let mut spans = vec![
        Span::styled(
            "midiviz ",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(app.file_name.as_str()),
        Span::raw("  |  "),
    ];
    for (i, viz) in app.visualizers.iter().enumerate() {
        let style = if i == app.active_viz {
            Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        spans.push(Span::styled(format!(" {} ", viz.name()), style));
        spans.push(Span::raw(" "));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw_instruments(app: &TuiApp, frame: &mut Frame, area: Rect) {
    let mut spans = vec![Span::styled("instruments: ", Style::default().fg(Color::DarkGray))];
    if app.instruments.is_empty() {
        spans.push(Span::styled("(none)", Style::default().fg(Color::DarkGray)));
    }
    for (name, state) in &app.instruments {
        let (marker, color) = match state {
            InstrumentState::Loading => ("…", Color::Yellow),
            InstrumentState::Ready => ("✓", Color::Green),
            InstrumentState::Fallback => ("synth", Color::Red),
        };
        spans.push(Span::raw(name.clone()));
        spans.push(Span::styled(format!("[{}] ", marker), Style::default().fg(color)));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw_transport(app: &TuiApp, frame: &mut Frame, area: Rect) {
    let state = if app.playing {
        "▶"
    } else if app.finished {
        "■"
    } else {
        "⏸"
    };

    let duration = app.score.duration.max(0.001);
    let progress = (app.position / duration).clamp(0.0, 1.0);
    let bar_width = area.width.saturating_sub(24) as usize;
    let filled = (progress * bar_width as f64) as usize;
    let bar: String = (0..bar_width)
        .map(|i| {
            if i < filled {
                '='
            } else if i == filled {
                '>'
            } else {
                ' '
            }
        })
        .collect();

    let line = Line::from(vec![
        Span::styled(format!(" {} ", state), Style::default().fg(Color::Cyan)),
        Span::raw(format!("{:6.1}s [", app.position)),
        Span::styled(bar, Style::default().fg(Color::Cyan)),
        Span::raw(format!("] {:6.1}s", app.score.duration)),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}

fn draw_settings(app: &TuiApp, frame: &mut Frame, area: Rect) {
    let block = Block::default().borders(Borders::ALL).title("Settings");
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let lines = vec![
        Line::from(format!("[ ] sensitivity {:.1}", app.settings.sensitivity)),
        Line::from(format!("{{ }} speed       {:.1}", app.settings.speed)),
        Line::from(format!("< > particles   {}", app.settings.particle_count)),
        Line::from(""),
        Line::from("0-9 mute channel"),
    ];
    frame.render_widget(Paragraph::new(lines), inner);
}
