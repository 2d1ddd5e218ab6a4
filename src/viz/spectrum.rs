use super::{Visualizer, VizSettings};
use crate::analysis::{Snapshot, SPECTRUM_BUCKETS};
use ratatui::{buffer::Buffer, layout::Rect, style::Color};

/// Decay rate for falling bars, in level units per second
const DECAY_RATE: f32 = 2.5;

/// Classic bar spectrum: one column group per pseudo-spectrum bucket,
/// bars jump to new peaks and decay smoothly between them.
pub struct SpectrumBars {
    levels: [f32; SPECTRUM_BUCKETS],
    beat_flash: f32,
}

impl SpectrumBars {
    pub fn new() -> Self {
        Self {
            levels: [0.0; SPECTRUM_BUCKETS],
            beat_flash: 0.0,
        }
    }
}

impl Default for SpectrumBars {
    fn default() -> Self {
        Self::new()
    }
}

impl Visualizer for SpectrumBars {
    fn name(&self) -> &'static str {
        "Spectrum"
    }

    fn update(&mut self, snapshot: &Snapshot, dt: f64, settings: &VizSettings) {
        let decay = DECAY_RATE * settings.speed * dt as f32;
        for (level, &target) in self.levels.iter_mut().zip(snapshot.spectrum.iter()) {
            let scaled = (target * settings.sensitivity).min(1.0);
            *level = scaled.max(*level - decay);
        }

        if snapshot.beat {
            self.beat_flash = 1.0;
        } else {
            self.beat_flash = (self.beat_flash - decay).max(0.0);
        }
    }

    fn render(&self, area: Rect, buf: &mut Buffer) {
        if area.width == 0 || area.height == 0 {
            return;
        }

        for x in 0..area.width {
            let bucket = x as usize * SPECTRUM_BUCKETS / area.width as usize;
            let level = self.levels[bucket.min(SPECTRUM_BUCKETS - 1)];
            let bar_height = (level * area.height as f32).round() as u16;

            for y in 0..bar_height.min(area.height) {
                // Low rows green, upper rows shade toward red
                let fraction = y as f32 / area.height as f32;
                let color = if fraction > 0.8 {
                    Color::Red
                } else if fraction > 0.5 {
                    Color::Yellow
                } else {
                    Color::Green
                };
                buf.get_mut(area.x + x, area.y + area.height - 1 - y)
                    .set_symbol("█")
                    .set_fg(color);
            }
        }

        // Beat flash along the top edge
        if self.beat_flash > 0.5 {
            for x in 0..area.width {
                buf.get_mut(area.x + x, area.y)
                    .set_symbol("▀")
                    .set_fg(Color::White);
            }
        }
    }
}
