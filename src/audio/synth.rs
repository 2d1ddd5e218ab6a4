use std::f32::consts::PI;

/// Maximum number of simultaneous voices
const MAX_VOICES: usize = 16;

/// Envelope state for a voice
#[derive(Clone, Copy, PartialEq)]
enum EnvelopeState {
    Attack,
    Sustain,
    Release,
    Off,
}

/// A single oscillator voice
///
/// Each voice carries its own note-off point: playback scheduling hands it
/// the note duration up front, so no separate off event is needed.
#[derive(Clone)]
struct SynthVoice {
    active: bool,
    pitch: u8,
    velocity: f32,
    phase: f32,
    frequency: f32,
    age: u32, // For voice stealing
    /// Samples left until the release phase starts
    sustain_samples: u64,

    envelope_state: EnvelopeState,
    envelope_level: f32, // 0.0 to 1.0
}

impl SynthVoice {
    fn new() -> Self {
        Self {
            active: false,
            pitch: 0,
            velocity: 0.0,
            phase: 0.0,
            frequency: 0.0,
            age: 0,
            sustain_samples: 0,
            envelope_state: EnvelopeState::Off,
            envelope_level: 0.0,
        }
    }

    /// Calculate frequency from MIDI pitch
    fn pitch_to_frequency(pitch: u8) -> f32 {
        440.0 * 2.0_f32.powf((pitch as f32 - 69.0) / 12.0)
    }

    /// Start playing a note for `duration` seconds
    fn note_on(&mut self, pitch: u8, velocity: f32, duration: f64, sample_rate: f32) {
        self.active = true;
        self.pitch = pitch;
        self.velocity = velocity;
        self.frequency = Self::pitch_to_frequency(pitch);
        self.phase = 0.0;
        self.age = 0;
        self.sustain_samples = (duration * sample_rate as f64).max(0.0) as u64;
        self.envelope_state = EnvelopeState::Attack;
        self.envelope_level = 0.0; // Start from silence
    }

    /// Generate one sample
    fn process_sample(&mut self, sample_rate: f32) -> f32 {
        if self.envelope_state == EnvelopeState::Off {
            return 0.0;
        }

        // Envelope timing constants (in seconds)
        const ATTACK_TIME: f32 = 0.005; // 5ms attack
        const RELEASE_TIME: f32 = 0.05; // 50ms release

        let attack_increment = 1.0 / (ATTACK_TIME * sample_rate);
        let release_decrement = 1.0 / (RELEASE_TIME * sample_rate);

        // Move to release once the scheduled duration has elapsed
        if self.sustain_samples == 0 {
            if self.envelope_state != EnvelopeState::Release {
                self.envelope_state = EnvelopeState::Release;
            }
        } else {
            self.sustain_samples -= 1;
        }

        match self.envelope_state {
            EnvelopeState::Attack => {
                self.envelope_level += attack_increment;
                if self.envelope_level >= 1.0 {
                    self.envelope_level = 1.0;
                    self.envelope_state = EnvelopeState::Sustain;
                }
            }
            EnvelopeState::Sustain => {
                self.envelope_level = 1.0;
            }
            EnvelopeState::Release => {
                self.envelope_level -= release_decrement;
                if self.envelope_level <= 0.0 {
                    self.envelope_level = 0.0;
                    self.envelope_state = EnvelopeState::Off;
                    self.active = false;
                }
            }
            EnvelopeState::Off => {
                return 0.0;
            }
        }

        // Simple sine wave, velocity-scaled
        let sample = (self.phase * 2.0 * PI).sin() * self.velocity * 0.3;

        self.phase += self.frequency / sample_rate;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }

        self.age += 1;

        sample * self.envelope_level
    }
}

/// Polyphonic fallback synthesizer.
///
/// Stands in for any sample library that has not loaded (yet, or at all):
/// a note triggered before its channel's sampler is ready plays here
/// instead of being dropped silently.
pub struct FallbackSynth {
    voices: Vec<SynthVoice>,
    sample_rate: f32,
}

impl FallbackSynth {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            voices: vec![SynthVoice::new(); MAX_VOICES],
            sample_rate: sample_rate as f32,
        }
    }

    /// Find a free voice, or steal the oldest one
    fn find_free_voice(&mut self) -> usize {
        for (i, voice) in self.voices.iter().enumerate() {
            if !voice.active {
                return i;
            }
        }

        // No free voices, steal the oldest one
        self.voices
            .iter()
            .enumerate()
            .max_by_key(|(_, v)| v.age)
            .map(|(i, _)| i)
            .unwrap_or(0)
    }

    /// Trigger a note with a scheduled duration
    pub fn note_on(&mut self, pitch: u8, velocity: f32, duration: f64) {
        let sample_rate = self.sample_rate;
        let voice_idx = self.find_free_voice();
        self.voices[voice_idx].note_on(pitch, velocity, duration, sample_rate);
    }

    /// Stop all currently playing notes immediately (no release envelope)
    pub fn all_notes_off(&mut self) {
        for voice in &mut self.voices {
            voice.active = false;
            voice.envelope_state = EnvelopeState::Off;
            voice.envelope_level = 0.0;
        }
    }

    /// Whether any voice is currently sounding
    pub fn is_silent(&self) -> bool {
        self.voices.iter().all(|v| !v.active)
    }

    /// Mix generated audio into an interleaved output buffer
    pub fn process(&mut self, output: &mut [f32], channels: usize) {
        let sample_rate = self.sample_rate;
        for frame in output.chunks_exact_mut(channels.max(1)) {
            let mut sum = 0.0;
            for voice in &mut self.voices {
                sum += voice.process_sample(sample_rate);
            }
            for sample in frame.iter_mut() {
                *sample += sum;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn note_produces_audio_and_releases() {
        let mut synth = FallbackSynth::new(44100);
        synth.note_on(69, 1.0, 0.01);

        let mut buffer = vec![0.0f32; 2048];
        synth.process(&mut buffer, 2);
        assert!(buffer.iter().any(|&s| s != 0.0));

        // After the scheduled duration plus release, the voice frees itself
        for _ in 0..30 {
            buffer.fill(0.0);
            synth.process(&mut buffer, 2);
        }
        assert!(synth.is_silent());
    }

    #[test]
    fn all_notes_off_silences_immediately() {
        let mut synth = FallbackSynth::new(44100);
        for pitch in 60..70 {
            synth.note_on(pitch, 0.8, 10.0);
        }
        synth.all_notes_off();
        assert!(synth.is_silent());

        let mut buffer = vec![0.0f32; 512];
        synth.process(&mut buffer, 2);
        assert!(buffer.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn voice_stealing_keeps_pool_bounded() {
        let mut synth = FallbackSynth::new(44100);
        for i in 0..(MAX_VOICES as u8 + 8) {
            synth.note_on(40 + i, 1.0, 5.0);
        }
        let active = synth.voices.iter().filter(|v| v.active).count();
        assert_eq!(active, MAX_VOICES);
    }
}
