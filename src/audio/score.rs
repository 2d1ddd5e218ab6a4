/// Number of MIDI channels
pub const NUM_CHANNELS: usize = 16;

/// The channel reserved for percussion by the General MIDI convention
pub const PERCUSSION_CHANNEL: u8 = 9;

/// A single note derived from a parsed MIDI file
///
/// Notes are immutable once derived. Times are in seconds from the start
/// of the file (sample-rate independent).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Note {
    /// MIDI pitch (0-127)
    pub pitch: u8,
    /// Display name of the pitch ("C4", "F#2", ...)
    pub name: String,
    /// Normalized velocity (0.0-1.0)
    pub velocity: f32,
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds (always start + duration)
    pub end: f64,
    /// Duration in seconds
    pub duration: f64,
    /// MIDI channel (0-15)
    pub channel: u8,
}

impl Note {
    /// Create a new note. The end time is derived from start + duration.
    pub fn new(pitch: u8, velocity: f32, start: f64, duration: f64, channel: u8) -> Self {
        Self {
            pitch,
            name: pitch_name(pitch),
            velocity,
            start,
            end: start + duration,
            duration,
            channel,
        }
    }

    /// Check whether this note is sounding at time `t`
    pub fn is_active_at(&self, t: f64) -> bool {
        self.start <= t && t <= self.end
    }
}

/// Get the display name for a MIDI pitch ("C4" for 60)
pub fn pitch_name(pitch: u8) -> String {
    const NAMES: [&str; 12] = [
        "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
    ];
    let octave = (pitch / 12) as i32 - 1;
    format!("{}{}", NAMES[(pitch % 12) as usize], octave)
}

/// All notes of a loaded MIDI file, sorted by start time, with a
/// per-channel index into the flat list.
///
/// This is the single source of truth for both playback and analysis.
/// The flat list is sorted non-decreasingly by start time; the channel
/// index preserves that ordering within each channel.
#[derive(Debug, Clone, Default)]
pub struct Score {
    /// All notes, sorted by start time
    pub notes: Vec<Note>,
    /// Indices into `notes` for each channel, in the same order
    pub channel_notes: [Vec<usize>; NUM_CHANNELS],
    /// First program change seen on each channel (None = no program change,
    /// treated as program 0)
    pub channel_programs: [Option<u8>; NUM_CHANNELS],
    /// Total duration in seconds (end of the last-ending note)
    pub duration: f64,
}

impl Score {
    /// Build a score from an unordered note list.
    ///
    /// Sorts by start time and constructs the channel index. An empty
    /// note list yields an empty score.
    pub fn from_notes(
        mut notes: Vec<Note>,
        channel_programs: [Option<u8>; NUM_CHANNELS],
    ) -> Self {
        notes.sort_by(|a, b| a.start.partial_cmp(&b.start).unwrap());

        let mut channel_notes: [Vec<usize>; NUM_CHANNELS] = Default::default();
        let mut duration = 0.0f64;
        for (i, note) in notes.iter().enumerate() {
            channel_notes[(note.channel as usize) % NUM_CHANNELS].push(i);
            duration = duration.max(note.end);
        }

        Self {
            notes,
            channel_notes,
            channel_programs,
            duration,
        }
    }

    /// Whether the score contains no notes
    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Number of notes
    pub fn len(&self) -> usize {
        self.notes.len()
    }

    /// Index of the first note with start time >= `t`.
    ///
    /// Used to re-derive the playback cursor on seek: exactly the notes
    /// from this index onward are scheduled.
    pub fn first_note_at_or_after(&self, t: f64) -> usize {
        self.notes.partition_point(|n| n.start < t)
    }

    /// Iterate over the notes of one channel, in start order
    pub fn channel(&self, channel: u8) -> impl Iterator<Item = &Note> {
        self.channel_notes[(channel as usize) % NUM_CHANNELS]
            .iter()
            .map(move |&i| &self.notes[i])
    }

    /// Channels that carry at least one note
    pub fn used_channels(&self) -> Vec<u8> {
        (0..NUM_CHANNELS as u8)
            .filter(|&ch| !self.channel_notes[ch as usize].is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notes_sorted_and_end_consistent() {
        let notes = vec![
            Note::new(64, 0.8, 2.0, 0.5, 1),
            Note::new(60, 1.0, 0.0, 1.0, 0),
            Note::new(67, 0.5, 1.0, 0.25, 0),
        ];
        let score = Score::from_notes(notes, [None; NUM_CHANNELS]);

        for pair in score.notes.windows(2) {
            assert!(pair[0].start <= pair[1].start);
        }
        for note in &score.notes {
            assert!((note.end - (note.start + note.duration)).abs() < 1e-12);
        }
        assert_eq!(score.duration, 2.5);
    }

    #[test]
    fn channel_index_preserves_order() {
        let notes = vec![
            Note::new(60, 1.0, 0.0, 1.0, 3),
            Note::new(62, 1.0, 0.5, 1.0, 3),
            Note::new(64, 1.0, 0.25, 1.0, 5),
        ];
        let score = Score::from_notes(notes, [None; NUM_CHANNELS]);

        let ch3: Vec<f64> = score.channel(3).map(|n| n.start).collect();
        assert_eq!(ch3, vec![0.0, 0.5]);
        assert_eq!(score.channel(5).count(), 1);
        assert_eq!(score.used_channels(), vec![3, 5]);
    }

    #[test]
    fn empty_score() {
        let score = Score::from_notes(Vec::new(), [None; NUM_CHANNELS]);
        assert!(score.is_empty());
        assert_eq!(score.duration, 0.0);
        assert_eq!(score.first_note_at_or_after(0.0), 0);
    }

    #[test]
    fn seek_cursor_selects_exact_subset() {
        let notes: Vec<Note> = (0..10)
            .map(|i| Note::new(60, 1.0, i as f64 * 0.5, 0.4, 0))
            .collect();
        let score = Score::from_notes(notes, [None; NUM_CHANNELS]);

        let cursor = score.first_note_at_or_after(2.0);
        assert!(score.notes[..cursor].iter().all(|n| n.start < 2.0));
        assert!(score.notes[cursor..].iter().all(|n| n.start >= 2.0));
    }

    #[test]
    fn pitch_names() {
        assert_eq!(pitch_name(60), "C4");
        assert_eq!(pitch_name(69), "A4");
        assert_eq!(pitch_name(61), "C#4");
        assert_eq!(pitch_name(0), "C-1");
    }
}
