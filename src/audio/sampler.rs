/// Maximum number of simultaneous sampler voices
const MAX_VOICES: usize = 16;

/// Attack and release times shared by all sampler voices (seconds)
const ATTACK_TIME: f32 = 0.003;
const RELEASE_TIME: f32 = 0.08;

/// A decoded sample with the pitch it was recorded at
#[derive(Debug, Clone)]
pub struct SampleZone {
    /// Mono f32 sample data
    pub samples: Vec<f32>,
    /// Sample rate the data was recorded at
    pub sample_rate: u32,
    /// MIDI pitch of the recording (nearest-zone lookup key)
    pub root_pitch: u8,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum EnvelopePhase {
    Attack,
    Sustain,
    Release,
    Off,
}

/// Active voice playing one zone, resampled to the target pitch
#[derive(Debug, Clone, Copy)]
struct SamplerVoice {
    active: bool,
    zone: usize,
    playhead: f32,
    rate: f32,
    gain: f32,
    age: u32,
    sustain_samples: u64,
    envelope_phase: EnvelopePhase,
    envelope_level: f32,
}

impl SamplerVoice {
    fn idle() -> Self {
        Self {
            active: false,
            zone: 0,
            playhead: 0.0,
            rate: 1.0,
            gain: 0.0,
            age: 0,
            sustain_samples: 0,
            envelope_phase: EnvelopePhase::Off,
            envelope_level: 0.0,
        }
    }
}

/// A sample-based instrument built from one library's decoded audio.
///
/// One sampler is shared by every channel that resolves to the same
/// library. Note-on picks the zone with the nearest root pitch and plays
/// it back at the equal-temperament rate ratio; each voice carries its
/// scheduled note-off like the fallback synth does.
#[derive(Debug)]
pub struct Sampler {
    /// Library name this instrument was built from
    pub library: String,
    zones: Vec<SampleZone>,
    voices: [SamplerVoice; MAX_VOICES],
    output_rate: f32,
}

impl Sampler {
    pub fn new(library: String, zones: Vec<SampleZone>, output_rate: u32) -> Self {
        Self {
            library,
            zones,
            voices: [SamplerVoice::idle(); MAX_VOICES],
            output_rate: output_rate as f32,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// Zone with the root pitch nearest to `pitch`
    fn nearest_zone(&self, pitch: u8) -> Option<usize> {
        self.zones
            .iter()
            .enumerate()
            .min_by_key(|(_, z)| (z.root_pitch as i32 - pitch as i32).abs())
            .map(|(i, _)| i)
    }

    fn find_free_voice(&mut self) -> usize {
        for (i, voice) in self.voices.iter().enumerate() {
            if !voice.active {
                return i;
            }
        }
        self.voices
            .iter()
            .enumerate()
            .max_by_key(|(_, v)| v.age)
            .map(|(i, _)| i)
            .unwrap_or(0)
    }

    /// Trigger a note with a scheduled duration
    pub fn note_on(&mut self, pitch: u8, velocity: f32, duration: f64) {
        let Some(zone_idx) = self.nearest_zone(pitch) else {
            return;
        };
        let zone = &self.zones[zone_idx];

        // Pitch shift from the zone's root, plus rate conversion from the
        // recording rate to the output rate
        let semitones = pitch as f32 - zone.root_pitch as f32;
        let rate = 2.0_f32.powf(semitones / 12.0) * (zone.sample_rate as f32 / self.output_rate);

        let sustain_samples = (duration * self.output_rate as f64).max(0.0) as u64;
        let slot = self.find_free_voice();
        self.voices[slot] = SamplerVoice {
            active: true,
            zone: zone_idx,
            playhead: 0.0,
            rate,
            gain: velocity,
            age: 0,
            sustain_samples,
            envelope_phase: EnvelopePhase::Attack,
            envelope_level: 0.0,
        };
    }

    /// Stop all voices immediately (no release tail)
    pub fn all_notes_off(&mut self) {
        for voice in &mut self.voices {
            *voice = SamplerVoice::idle();
        }
    }

    /// Whether any voice is currently sounding
    pub fn is_silent(&self) -> bool {
        self.voices.iter().all(|v| !v.active)
    }

    /// Mix all voices into an interleaved output buffer
    pub fn process(&mut self, output: &mut [f32], channels: usize) {
        if self.zones.is_empty() {
            return;
        }

        let attack_increment = 1.0 / (ATTACK_TIME * self.output_rate);
        let release_decrement = 1.0 / (RELEASE_TIME * self.output_rate);

        for frame in output.chunks_exact_mut(channels.max(1)) {
            let mut sum = 0.0;

            for voice in &mut self.voices {
                if !voice.active {
                    continue;
                }
                let zone = &self.zones[voice.zone];

                // Past the end of the sample data, the voice is done
                let index = voice.playhead as usize;
                if index + 1 >= zone.samples.len() {
                    *voice = SamplerVoice::idle();
                    continue;
                }

                if voice.sustain_samples == 0 {
                    if voice.envelope_phase != EnvelopePhase::Release {
                        voice.envelope_phase = EnvelopePhase::Release;
                    }
                } else {
                    voice.sustain_samples -= 1;
                }

                match voice.envelope_phase {
                    EnvelopePhase::Attack => {
                        voice.envelope_level += attack_increment;
                        if voice.envelope_level >= 1.0 {
                            voice.envelope_level = 1.0;
                            voice.envelope_phase = EnvelopePhase::Sustain;
                        }
                    }
                    EnvelopePhase::Sustain => {}
                    EnvelopePhase::Release => {
                        voice.envelope_level -= release_decrement;
                        if voice.envelope_level <= 0.0 {
                            *voice = SamplerVoice::idle();
                            continue;
                        }
                    }
                    EnvelopePhase::Off => continue,
                }

                // Linear interpolation between adjacent source samples
                let frac = voice.playhead - index as f32;
                let sample = zone.samples[index] * (1.0 - frac) + zone.samples[index + 1] * frac;

                sum += sample * voice.gain * voice.envelope_level;
                voice.playhead += voice.rate;
                voice.age += 1;
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

    fn test_sampler() -> Sampler {
        // 440 Hz sine recorded at A4
        let rate = 44100u32;
        let samples: Vec<f32> = (0..rate as usize / 10)
            .map(|i| (i as f32 / rate as f32 * 440.0 * 2.0 * std::f32::consts::PI).sin())
            .collect();
        Sampler::new(
            "piano".to_string(),
            vec![SampleZone {
                samples,
                sample_rate: rate,
                root_pitch: 69,
            }],
            rate,
        )
    }

    #[test]
    fn note_at_root_plays_unity_rate() {
        let mut sampler = test_sampler();
        sampler.note_on(69, 1.0, 0.05);
        assert!((sampler.voices[0].rate - 1.0).abs() < 1e-6);

        let mut buffer = vec![0.0f32; 1024];
        sampler.process(&mut buffer, 2);
        assert!(buffer.iter().any(|&s| s != 0.0));
    }

    #[test]
    fn octave_up_doubles_rate() {
        let mut sampler = test_sampler();
        sampler.note_on(81, 1.0, 0.05);
        assert!((sampler.voices[0].rate - 2.0).abs() < 1e-4);
    }

    #[test]
    fn empty_sampler_is_inert() {
        let mut sampler = Sampler::new("piano".to_string(), Vec::new(), 44100);
        sampler.note_on(60, 1.0, 1.0);
        let mut buffer = vec![0.0f32; 256];
        sampler.process(&mut buffer, 2);
        assert!(buffer.iter().all(|&s| s == 0.0));
        assert!(sampler.is_silent());
    }

    #[test]
    fn all_notes_off_silences() {
        let mut sampler = test_sampler();
        sampler.note_on(69, 1.0, 5.0);
        sampler.all_notes_off();
        assert!(sampler.is_silent());
    }
}
