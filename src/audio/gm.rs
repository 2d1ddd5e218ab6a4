use super::score::{Score, NUM_CHANNELS, PERCUSSION_CHANNEL};

/// Sample library names for the sixteen General MIDI instrument families.
/// Programs map to families in fixed buckets of eight (0-7 piano,
/// 8-15 chromatic percussion, ...). https://en.wikipedia.org/wiki/General_MIDI
pub const GM_LIBRARIES: [&str; 16] = [
    "piano",
    "chromatic",
    "organ",
    "guitar",
    "bass",
    "strings",
    "ensemble",
    "brass",
    "reed",
    "pipe",
    "synth_lead",
    "synth_pad",
    "synth_fx",
    "ethnic",
    "percussive",
    "sound_fx",
];

/// Library used when a mapped library has no samples available
pub const DEFAULT_LIBRARY: &str = "piano";

/// Resolve a GM program number (0-127) to its sample library name
pub fn library_for_program(program: u8) -> &'static str {
    GM_LIBRARIES[(program as usize / 8) % GM_LIBRARIES.len()]
}

/// Percussion voice families, keyed by GM percussion note number ranges.
/// https://en.wikipedia.org/wiki/General_MIDI#Percussion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrumSound {
    Kick,
    Snare,
    Tom,
    HiHat,
    Cymbal,
}

/// Classify a note number on the percussion channel into a drum voice
pub fn drum_sound_for_note(note: u8) -> DrumSound {
    match note {
        35 | 36 => DrumSound::Kick,
        37..=40 => DrumSound::Snare, // side stick, snares, hand clap
        42 | 44 | 46 => DrumSound::HiHat,
        41 | 43 | 45 | 47 | 48 | 50 => DrumSound::Tom,
        49 | 51..=59 => DrumSound::Cymbal,
        _ => DrumSound::HiHat,
    }
}

/// Instrument resolution for a loaded score: the distinct sample libraries
/// to load, and the library slot each channel plays through.
///
/// Channels that resolve to the same library share one slot, so the load
/// cost is bounded by the number of distinct libraries rather than the
/// number of channels. The percussion channel gets no slot; it is routed
/// to the drum kit instead.
#[derive(Debug, Clone, Default)]
pub struct InstrumentPlan {
    /// Distinct library names, in first-use order. Slot i holds libraries[i].
    pub libraries: Vec<String>,
    /// Library slot for each channel (None = percussion or unused)
    pub channel_slots: [Option<usize>; NUM_CHANNELS],
}

/// Compute the instrument plan for a score.
///
/// Both the UI thread (to drive the sample loader) and the audio engine
/// (to route notes) derive the plan from the same score, so slot indices
/// agree on both sides.
pub fn resolve_instruments(score: &Score) -> InstrumentPlan {
    let mut plan = InstrumentPlan::default();

    for ch in score.used_channels() {
        if ch == PERCUSSION_CHANNEL {
            continue;
        }
        let program = score.channel_programs[ch as usize].unwrap_or(0);
        let library = library_for_program(program);

        let slot = match plan.libraries.iter().position(|l| l == library) {
            Some(i) => i,
            None => {
                plan.libraries.push(library.to_string());
                plan.libraries.len() - 1
            }
        };
        plan.channel_slots[ch as usize] = Some(slot);
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::score::Note;

    #[test]
    fn program_buckets() {
        assert_eq!(library_for_program(0), "piano");
        assert_eq!(library_for_program(7), "piano");
        assert_eq!(library_for_program(8), "chromatic");
        assert_eq!(library_for_program(33), "bass");
        assert_eq!(library_for_program(48), "ensemble");
        assert_eq!(library_for_program(127), "sound_fx");
    }

    #[test]
    fn percussion_ranges() {
        assert_eq!(drum_sound_for_note(35), DrumSound::Kick);
        assert_eq!(drum_sound_for_note(36), DrumSound::Kick);
        assert_eq!(drum_sound_for_note(38), DrumSound::Snare);
        assert_eq!(drum_sound_for_note(42), DrumSound::HiHat);
        assert_eq!(drum_sound_for_note(45), DrumSound::Tom);
        assert_eq!(drum_sound_for_note(49), DrumSound::Cymbal);
    }

    #[test]
    fn channels_with_same_program_share_a_slot() {
        let notes = vec![
            Note::new(60, 1.0, 0.0, 1.0, 0),
            Note::new(62, 1.0, 0.0, 1.0, 1),
            Note::new(40, 1.0, 0.0, 1.0, 2),
            Note::new(50, 1.0, 0.0, 1.0, 9), // percussion
        ];
        let mut programs = [None; NUM_CHANNELS];
        programs[0] = Some(0); // piano
        programs[1] = Some(3); // piano family
        programs[2] = Some(33); // bass
        let score = Score::from_notes(notes, programs);

        let plan = resolve_instruments(&score);
        assert_eq!(plan.libraries, vec!["piano".to_string(), "bass".to_string()]);
        assert_eq!(plan.channel_slots[0], Some(0));
        assert_eq!(plan.channel_slots[1], Some(0));
        assert_eq!(plan.channel_slots[2], Some(1));
        assert_eq!(plan.channel_slots[9], None);
    }
}
