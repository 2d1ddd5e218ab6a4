//! Terminal visualizers driven by the analysis snapshot.
//!
//! Every visualizer implements the same two-method contract: `update`
//! with the current snapshot and elapsed time, then `render` into the
//! frame buffer. Visualizers own arbitrary internal animation state and
//! are created once at startup; switching the active one is a pure index
//! change and non-active visualizers do not update.

pub mod meters;
pub mod particles;
pub mod spectrum;
pub mod waterfall;

use crate::analysis::Snapshot;
use ratatui::{buffer::Buffer, layout::Rect};

pub use meters::ChannelMeters;
pub use particles::Particles;
pub use spectrum::SpectrumBars;
pub use waterfall::Waterfall;

/// User-tunable animation settings shared by all visualizers
#[derive(Debug, Clone, Copy)]
pub struct VizSettings {
    /// Scales how strongly energy maps to motion/size (0.2 - 3.0)
    pub sensitivity: f32,
    /// Scales animation speed (0.2 - 3.0)
    pub speed: f32,
    /// Upper bound on live particles for the particle visualizer
    pub particle_count: usize,
}

impl Default for VizSettings {
    fn default() -> Self {
        Self {
            sensitivity: 1.0,
            speed: 1.0,
            particle_count: 120,
        }
    }
}

/// The two-method contract every visualizer implements
pub trait Visualizer {
    /// Display name for the mode selector
    fn name(&self) -> &'static str;

    /// Advance internal animation state from the latest snapshot
    fn update(&mut self, snapshot: &Snapshot, dt: f64, settings: &VizSettings);

    /// Draw into the frame buffer region
    fn render(&self, area: Rect, buf: &mut Buffer);
}

/// Construct the built-in visualizers, in mode-selector order
pub fn create_visualizers() -> Vec<Box<dyn Visualizer>> {
    vec![
        Box::new(SpectrumBars::new()),
        Box::new(Waterfall::new()),
        Box::new(ChannelMeters::new()),
        Box::new(Particles::new()),
    ]
}
