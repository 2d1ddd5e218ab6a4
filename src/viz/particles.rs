use super::{Visualizer, VizSettings};
use crate::analysis::Snapshot;
use rand::Rng;
use ratatui::{buffer::Buffer, layout::Rect, style::Color};

/// Velocity damping per second
const DAMPING: f32 = 0.8;

/// Particle lifetime in seconds
const LIFETIME: f32 = 1.6;

/// One particle in normalized [0,1] x [0,1] space, y up
struct Particle {
    x: f32,
    y: f32,
    vx: f32,
    vy: f32,
    life: f32,
    color: Color,
}

/// Beat-driven particle bursts: every beat spawns a burst whose size
/// follows the total energy, particles drift outward with damping and
/// fade over their lifetime.
pub struct Particles {
    particles: Vec<Particle>,
}

impl Particles {
    pub fn new() -> Self {
        Self {
            particles: Vec::new(),
        }
    }

    fn spawn_burst(&mut self, snapshot: &Snapshot, settings: &VizSettings) {
        let mut rng = rand::thread_rng();

        let energy = (snapshot.bass + snapshot.mid + snapshot.high) / 3.0;
        let burst = ((energy * settings.sensitivity * 24.0) as usize).clamp(4, 48);

        // Horizontal origin follows the spectral balance: bass bursts
        // near the left, high bursts near the right
        let center_x = if energy > 0.0 {
            (snapshot.mid * 0.5 + snapshot.high) / (snapshot.bass + snapshot.mid + snapshot.high)
        } else {
            0.5
        };

        let color = if snapshot.bass >= snapshot.mid && snapshot.bass >= snapshot.high {
            Color::Red
        } else if snapshot.high >= snapshot.mid {
            Color::Cyan
        } else {
            Color::Yellow
        };

        for _ in 0..burst {
            if self.particles.len() >= settings.particle_count {
                break;
            }
            let angle = rng.gen_range(0.0..std::f32::consts::TAU);
            let speed = rng.gen_range(0.1..0.5) * (0.5 + energy);
            self.particles.push(Particle {
                x: center_x + rng.gen_range(-0.05..0.05),
                y: 0.5 + rng.gen_range(-0.1..0.1),
                vx: angle.cos() * speed,
                vy: angle.sin() * speed,
                life: LIFETIME,
                color,
            });
        }
    }
}

impl Default for Particles {
    fn default() -> Self {
        Self::new()
    }
}

impl Visualizer for Particles {
    fn name(&self) -> &'static str {
        "Particles"
    }

    fn update(&mut self, snapshot: &Snapshot, dt: f64, settings: &VizSettings) {
        let dt = dt as f32 * settings.speed;

        if snapshot.beat {
            self.spawn_burst(snapshot, settings);
        }

        let damping = (1.0 - DAMPING * dt).max(0.0);
        for p in &mut self.particles {
            p.x += p.vx * dt;
            p.y += p.vy * dt;
            p.vx *= damping;
            p.vy *= damping;
            p.life -= dt;
        }
        self.particles
            .retain(|p| p.life > 0.0 && (-0.1..1.1).contains(&p.x) && (-0.1..1.1).contains(&p.y));
    }

    fn render(&self, area: Rect, buf: &mut Buffer) {
        if area.width == 0 || area.height == 0 {
            return;
        }

        for p in &self.particles {
            if !(0.0..1.0).contains(&p.x) || !(0.0..1.0).contains(&p.y) {
                continue;
            }
            let x = area.x + (p.x * area.width as f32) as u16;
            // y up in particle space, down in terminal space
            let y = area.y + ((1.0 - p.y) * area.height as f32) as u16;
            if x >= area.x + area.width || y >= area.y + area.height {
                continue;
            }

            let symbol = if p.life > LIFETIME * 0.5 { "●" } else { "·" };
            buf.get_mut(x, y).set_symbol(symbol).set_fg(p.color);
        }
    }
}
