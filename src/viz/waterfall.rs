use super::{Visualizer, VizSettings};
use crate::analysis::{Snapshot, SPECTRUM_BUCKETS};
use ratatui::{buffer::Buffer, layout::Rect, style::Color};
use std::collections::VecDeque;

/// Maximum number of history columns kept (bounds memory independent of
/// terminal size)
const MAX_HISTORY: usize = 512;

/// Seconds between history columns at speed 1.0
const COLUMN_INTERVAL: f64 = 0.04;

/// Scrolling pitch waterfall: each frame's pseudo-spectrum becomes a
/// column, newest at the right edge, scrolling left over time. Pitch runs
/// bottom-to-top.
pub struct Waterfall {
    history: VecDeque<[f32; SPECTRUM_BUCKETS]>,
    since_last_column: f64,
}

impl Waterfall {
    pub fn new() -> Self {
        Self {
            history: VecDeque::new(),
            since_last_column: 0.0,
        }
    }
}

impl Default for Waterfall {
    fn default() -> Self {
        Self::new()
    }
}

impl Visualizer for Waterfall {
    fn name(&self) -> &'static str {
        "Waterfall"
    }

    fn update(&mut self, snapshot: &Snapshot, dt: f64, settings: &VizSettings) {
        self.since_last_column += dt * settings.speed as f64;
        if self.since_last_column < COLUMN_INTERVAL {
            return;
        }
        self.since_last_column = 0.0;

        let mut column = snapshot.spectrum;
        for value in &mut column {
            *value = (*value * settings.sensitivity).min(1.0);
        }
        self.history.push_back(column);
        while self.history.len() > MAX_HISTORY {
            self.history.pop_front();
        }
    }

    fn render(&self, area: Rect, buf: &mut Buffer) {
        if area.width == 0 || area.height == 0 {
            return;
        }

        const SHADES: [&str; 4] = ["░", "▒", "▓", "█"];

        for x in 0..area.width {
            // Newest column at the right edge
            let back = (area.width - 1 - x) as usize;
            let Some(column) = self.history.iter().rev().nth(back) else {
                continue;
            };

            for y in 0..area.height {
                // Pitch runs bottom-to-top
                let bucket =
                    (area.height - 1 - y) as usize * SPECTRUM_BUCKETS / area.height as usize;
                let value = column[bucket.min(SPECTRUM_BUCKETS - 1)];
                if value < 0.05 {
                    continue;
                }

                let shade = SHADES[((value * SHADES.len() as f32) as usize).min(SHADES.len() - 1)];
                let color = if value > 0.75 {
                    Color::Magenta
                } else if value > 0.4 {
                    Color::Blue
                } else {
                    Color::DarkGray
                };
                buf.get_mut(area.x + x, area.y + y)
                    .set_symbol(shade)
                    .set_fg(color);
            }
        }
    }
}
