use super::{Visualizer, VizSettings};
use crate::analysis::Snapshot;
use crate::audio::score::NUM_CHANNELS;
use ratatui::{buffer::Buffer, layout::Rect, style::Color};

/// How fast the peak markers fall, in level units per second
const PEAK_FALL_RATE: f32 = 0.4;

/// Per-channel meter bank: one horizontal bar per MIDI channel with a
/// falling peak marker, beat dot, and active note count.
pub struct ChannelMeters {
    levels: [f32; NUM_CHANNELS],
    peaks: [f32; NUM_CHANNELS],
    beats: [bool; NUM_CHANNELS],
    note_counts: [usize; NUM_CHANNELS],
}

impl ChannelMeters {
    pub fn new() -> Self {
        Self {
            levels: [0.0; NUM_CHANNELS],
            peaks: [0.0; NUM_CHANNELS],
            beats: [false; NUM_CHANNELS],
            note_counts: [0; NUM_CHANNELS],
        }
    }
}

impl Default for ChannelMeters {
    fn default() -> Self {
        Self::new()
    }
}

impl Visualizer for ChannelMeters {
    fn name(&self) -> &'static str {
        "Channels"
    }

    fn update(&mut self, snapshot: &Snapshot, dt: f64, settings: &VizSettings) {
        let fall = PEAK_FALL_RATE * settings.speed * dt as f32;

        for (ch, stats) in snapshot.channels.iter().enumerate() {
            let level = (stats.energy * settings.sensitivity).min(1.0);
            self.levels[ch] = level;
            self.peaks[ch] = level.max(self.peaks[ch] - fall);
            self.beats[ch] = stats.beat;
            self.note_counts[ch] = stats.active_notes;
        }
    }

    fn render(&self, area: Rect, buf: &mut Buffer) {
        if area.width < 12 || area.height == 0 {
            return;
        }

        let label_width = 6u16;
        let count_width = 4u16;
        let bar_width = area.width - label_width - count_width;

        for ch in 0..NUM_CHANNELS.min(area.height as usize) {
            let y = area.y + ch as u16;

            // "CH 10●"
            let marker = if self.beats[ch] { '●' } else { ' ' };
            let label = format!("CH{:>2}{}", ch, marker);
            for (i, c) in label.chars().take(label_width as usize).enumerate() {
                buf.get_mut(area.x + i as u16, y)
                    .set_char(c)
                    .set_fg(if self.beats[ch] {
                        Color::White
                    } else {
                        Color::DarkGray
                    });
            }

            let filled = (self.levels[ch] * bar_width as f32) as u16;
            let peak_x = (self.peaks[ch] * bar_width.saturating_sub(1) as f32) as u16;
            for x in 0..bar_width {
                let cell = buf.get_mut(area.x + label_width + x, y);
                if x < filled {
                    let fraction = x as f32 / bar_width as f32;
                    let color = if fraction > 0.8 {
                        Color::Red
                    } else if fraction > 0.55 {
                        Color::Yellow
                    } else {
                        Color::Green
                    };
                    cell.set_symbol("■").set_fg(color);
                } else if x == peak_x && self.peaks[ch] > 0.01 {
                    cell.set_symbol("|").set_fg(Color::White);
                } else {
                    cell.set_symbol("·").set_fg(Color::DarkGray);
                }
            }

            if self.note_counts[ch] > 0 {
                let count = format!("{:>3}", self.note_counts[ch]);
                for (i, c) in count.chars().take(count_width as usize).enumerate() {
                    buf.get_mut(area.x + label_width + bar_width + i as u16, y)
                        .set_char(c)
                        .set_fg(Color::Cyan);
                }
            }
        }
    }
}
