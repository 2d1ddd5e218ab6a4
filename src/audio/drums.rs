use super::gm::{drum_sound_for_note, DrumSound};
use rand::Rng;

/// Maximum number of simultaneous one-shot drum voices
const MAX_VOICES: usize = 12;

/// A drum hit in flight: a position into one of the pre-generated buffers
#[derive(Clone, Copy)]
struct DrumVoice {
    sound: DrumSound,
    position: usize,
    gain: f32,
    active: bool,
}

/// Synthesized percussion voices for the General MIDI drum channel.
///
/// Notes on channel 9 are never routed to melodic samplers; they trigger
/// fixed one-shot voices keyed by the GM percussion note number. Hits are
/// pre-rendered at construction time so the audio callback only mixes.
pub struct DrumKit {
    kick: Vec<f32>,
    snare: Vec<f32>,
    tom: Vec<f32>,
    hihat: Vec<f32>,
    cymbal: Vec<f32>,
    voices: [DrumVoice; MAX_VOICES],
}

impl DrumKit {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            kick: generate_kick(sample_rate),
            snare: generate_snare(sample_rate),
            tom: generate_tom(sample_rate),
            hihat: generate_hihat(sample_rate),
            cymbal: generate_cymbal(sample_rate),
            voices: [DrumVoice {
                sound: DrumSound::Kick,
                position: 0,
                gain: 0.0,
                active: false,
            }; MAX_VOICES],
        }
    }

    /// Trigger the drum voice for a percussion note number
    pub fn trigger(&mut self, note: u8, velocity: f32) {
        let sound = drum_sound_for_note(note);

        // Reuse a free slot, or the hit closest to finishing
        let slot = self
            .voices
            .iter()
            .position(|v| !v.active)
            .unwrap_or_else(|| {
                self.voices
                    .iter()
                    .enumerate()
                    .max_by_key(|(_, v)| v.position)
                    .map(|(i, _)| i)
                    .unwrap_or(0)
            });

        self.voices[slot] = DrumVoice {
            sound,
            position: 0,
            gain: velocity,
            active: true,
        };
    }

    /// Stop all drum hits immediately
    pub fn all_notes_off(&mut self) {
        for voice in &mut self.voices {
            voice.active = false;
        }
    }

    fn buffer(&self, sound: DrumSound) -> &[f32] {
        match sound {
            DrumSound::Kick => &self.kick,
            DrumSound::Snare => &self.snare,
            DrumSound::Tom => &self.tom,
            DrumSound::HiHat => &self.hihat,
            DrumSound::Cymbal => &self.cymbal,
        }
    }

    /// Mix all active hits into an interleaved output buffer
    pub fn process(&mut self, output: &mut [f32], channels: usize) {
        let frames = output.len() / channels.max(1);

        for voice_idx in 0..self.voices.len() {
            let voice = self.voices[voice_idx];
            if !voice.active {
                continue;
            }
            let buffer = self.buffer(voice.sound);
            let buffer_len = buffer.len();
            let mut position = voice.position;

            for frame in 0..frames {
                if position >= buffer_len {
                    break;
                }
                let sample = buffer[position] * voice.gain;
                for ch in 0..channels {
                    output[frame * channels + ch] += sample;
                }
                position += 1;
            }

            let voice = &mut self.voices[voice_idx];
            voice.position = position;
            if position >= buffer_len {
                voice.active = false;
            }
        }
    }
}

/// Pitched-down sine thump with a fast decay
fn generate_kick(sample_rate: u32) -> Vec<f32> {
    let length = (sample_rate as f32 * 0.18) as usize;
    let mut samples = Vec::with_capacity(length);
    let mut phase = 0.0f32;

    for i in 0..length {
        let progress = i as f32 / length as f32;
        let envelope = (1.0 - progress).powi(3);
        // Sweep the pitch from ~120 Hz down to ~45 Hz
        let frequency = 120.0 - 75.0 * progress;
        phase += frequency / sample_rate as f32;
        samples.push((phase * 2.0 * std::f32::consts::PI).sin() * envelope * 0.8);
    }
    samples
}

/// Noise burst over a short tonal body
fn generate_snare(sample_rate: u32) -> Vec<f32> {
    let length = (sample_rate as f32 * 0.12) as usize;
    let mut rng = rand::thread_rng();
    let mut samples = Vec::with_capacity(length);

    for i in 0..length {
        let t = i as f32 / sample_rate as f32;
        let progress = i as f32 / length as f32;
        let envelope = (1.0 - progress).powi(2);
        let noise: f32 = rng.gen_range(-1.0..1.0);
        let body = (2.0 * std::f32::consts::PI * 180.0 * t).sin();
        samples.push((noise * 0.6 + body * 0.3) * envelope * 0.5);
    }
    samples
}

/// Mid-pitched sine with moderate decay
fn generate_tom(sample_rate: u32) -> Vec<f32> {
    let length = (sample_rate as f32 * 0.2) as usize;
    let mut samples = Vec::with_capacity(length);
    let mut phase = 0.0f32;

    for i in 0..length {
        let progress = i as f32 / length as f32;
        let envelope = (1.0 - progress).powi(2);
        let frequency = 160.0 - 60.0 * progress;
        phase += frequency / sample_rate as f32;
        samples.push((phase * 2.0 * std::f32::consts::PI).sin() * envelope * 0.6);
    }
    samples
}

/// Very short high-passed noise tick
fn generate_hihat(sample_rate: u32) -> Vec<f32> {
    let length = (sample_rate as f32 * 0.05) as usize;
    let mut rng = rand::thread_rng();
    let mut samples = Vec::with_capacity(length);
    let mut previous = 0.0f32;

    for i in 0..length {
        let progress = i as f32 / length as f32;
        let envelope = (1.0 - progress).powi(2);
        let noise: f32 = rng.gen_range(-1.0..1.0);
        // One-tap differencing keeps only the high end
        let filtered = noise - previous;
        previous = noise;
        samples.push(filtered * envelope * 0.25);
    }
    samples
}

/// Longer noise wash for crashes and rides
fn generate_cymbal(sample_rate: u32) -> Vec<f32> {
    let length = (sample_rate as f32 * 0.5) as usize;
    let mut rng = rand::thread_rng();
    let mut samples = Vec::with_capacity(length);
    let mut previous = 0.0f32;

    for i in 0..length {
        let progress = i as f32 / length as f32;
        let envelope = (1.0 - progress).powi(2);
        let noise: f32 = rng.gen_range(-1.0..1.0);
        let filtered = noise - 0.7 * previous;
        previous = noise;
        samples.push(filtered * envelope * 0.2);
    }
    samples
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kick_hit_produces_audio_then_finishes() {
        let mut kit = DrumKit::new(44100);
        kit.trigger(36, 1.0);

        let mut buffer = vec![0.0f32; 1024];
        kit.process(&mut buffer, 2);
        assert!(buffer.iter().any(|&s| s != 0.0));

        // Exhaust the one-shot
        for _ in 0..40 {
            buffer.fill(0.0);
            kit.process(&mut buffer, 2);
        }
        assert!(kit.voices.iter().all(|v| !v.active));
    }

    #[test]
    fn velocity_scales_gain() {
        let mut kit = DrumKit::new(44100);
        kit.trigger(38, 1.0);
        let mut loud = vec![0.0f32; 512];
        kit.process(&mut loud, 1);

        kit.all_notes_off();
        kit.trigger(38, 0.1);
        let mut soft = vec![0.0f32; 512];
        kit.process(&mut soft, 1);

        let peak = |buf: &[f32]| buf.iter().fold(0.0f32, |m, &s| m.max(s.abs()));
        assert!(peak(&loud) > peak(&soft));
    }

    #[test]
    fn all_notes_off_stops_hits() {
        let mut kit = DrumKit::new(44100);
        kit.trigger(49, 1.0);
        kit.all_notes_off();

        let mut buffer = vec![0.0f32; 512];
        kit.process(&mut buffer, 2);
        assert!(buffer.iter().all(|&s| s == 0.0));
    }
}
