//! Per-frame analysis of the note list.
//!
//! Every visualizer consumes the same fixed-shape [`Snapshot`], recomputed
//! each frame from the score and the current playback time. The generator
//! keeps a cursor over the start-sorted note list and a pruned active set,
//! so consecutive monotonic queries advance incrementally instead of
//! rescanning every note per channel; a backward jump rebuilds from
//! scratch. Results are identical to a full scan either way.

use crate::audio::score::{Score, NUM_CHANNELS};

/// Number of buckets in the pseudo-spectrum
pub const SPECTRUM_BUCKETS: usize = 32;

/// Half-width of the beat detection window in seconds: the beat flag is
/// set iff some note's start time is within this distance of the query.
pub const BEAT_WINDOW: f64 = 0.02;

/// Pitch thresholds for the energy buckets: below 48 is bass, 48-71 mid,
/// 72 and above high.
const BASS_MAX_PITCH: u8 = 48;
const MID_MAX_PITCH: u8 = 72;

/// Energy contributed by one active note at full velocity. Buckets clamp
/// at 1.0 no matter how many notes are sounding.
const ENERGY_PER_NOTE: f32 = 0.35;

/// Per-channel slice of the analysis
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ChannelSnapshot {
    /// Energy of this channel's active notes, clamped to [0, 1]
    pub energy: f32,
    /// A note started on this channel within the beat window
    pub beat: bool,
    /// Number of currently active notes
    pub active_notes: usize,
}

/// The fixed-shape analysis result consumed by every visualizer.
///
/// Fully derived; recomputed from scratch each call. With no score loaded
/// all fields are zero/false.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Query time in seconds
    pub time: f64,
    /// Energy of active low-pitch notes, clamped to [0, 1]
    pub bass: f32,
    /// Energy of active mid-pitch notes, clamped to [0, 1]
    pub mid: f32,
    /// Energy of active high-pitch notes, clamped to [0, 1]
    pub high: f32,
    /// Any note started within the beat window of the query time
    pub beat: bool,
    /// Pseudo-spectrum over pitch buckets, each clamped to [0, 1]
    pub spectrum: [f32; SPECTRUM_BUCKETS],
    /// Per-channel energy/beat/note-count
    pub channels: [ChannelSnapshot; NUM_CHANNELS],
    /// Total number of active notes
    pub active_count: usize,
}

impl Snapshot {
    /// The all-zero snapshot produced when nothing is loaded
    pub fn silent(time: f64) -> Self {
        Self {
            time,
            bass: 0.0,
            mid: 0.0,
            high: 0.0,
            beat: false,
            spectrum: [0.0; SPECTRUM_BUCKETS],
            channels: [ChannelSnapshot::default(); NUM_CHANNELS],
            active_count: 0,
        }
    }
}

/// Incremental snapshot generator.
///
/// Holds no reference to the score; the caller passes it each frame so
/// the same analyzer can survive a file reload (the cursor resets when
/// the note count changes or time moves backward).
#[derive(Debug, Default)]
pub struct Analyzer {
    /// Index of the first note not yet pushed to the active set
    cursor: usize,
    /// Indices of notes with start <= t, pruned of ended notes
    active: Vec<usize>,
    last_time: f64,
    last_len: usize,
}

impl Analyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute the snapshot for time `t`. Never fails; an empty score
    /// yields [`Snapshot::silent`].
    pub fn snapshot(&mut self, score: &Score, t: f64) -> Snapshot {
        if score.is_empty() {
            self.reset();
            return Snapshot::silent(t);
        }

        // Backward jump or a different score: rebuild the active set
        if t < self.last_time || score.len() != self.last_len {
            self.cursor = score.first_note_at_or_after(t);
            self.active = (0..self.cursor)
                .filter(|&i| score.notes[i].end >= t)
                .collect();
        }
        self.last_time = t;
        self.last_len = score.len();

        // Advance: pull in notes that have started since the last query
        while self.cursor < score.len() && score.notes[self.cursor].start <= t {
            self.active.push(self.cursor);
            self.cursor += 1;
        }
        // Prune notes that have ended
        self.active.retain(|&i| score.notes[i].end >= t);

        let mut snapshot = Snapshot::silent(t);
        snapshot.active_count = self.active.len();

        for &i in &self.active {
            let note = &score.notes[i];
            let energy = note.velocity * ENERGY_PER_NOTE;

            if note.pitch < BASS_MAX_PITCH {
                snapshot.bass = (snapshot.bass + energy).min(1.0);
            } else if note.pitch < MID_MAX_PITCH {
                snapshot.mid = (snapshot.mid + energy).min(1.0);
            } else {
                snapshot.high = (snapshot.high + energy).min(1.0);
            }

            let bucket = note.pitch as usize * SPECTRUM_BUCKETS / 128;
            snapshot.spectrum[bucket] = (snapshot.spectrum[bucket] + energy).min(1.0);

            let channel = &mut snapshot.channels[(note.channel as usize) % NUM_CHANNELS];
            channel.energy = (channel.energy + energy).min(1.0);
            channel.active_notes += 1;
        }

        // Beat detection looks at start times alone, independent of the
        // active set: a note can flag a beat just before it starts or
        // just after a very short note has already ended.
        let lo = score.notes.partition_point(|n| n.start <= t - BEAT_WINDOW);
        let hi = score.notes.partition_point(|n| n.start < t + BEAT_WINDOW);
        for note in &score.notes[lo..hi] {
            snapshot.beat = true;
            snapshot.channels[(note.channel as usize) % NUM_CHANNELS].beat = true;
        }

        snapshot
    }

    fn reset(&mut self) {
        self.cursor = 0;
        self.active.clear();
        self.last_time = 0.0;
        self.last_len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::score::Note;

    fn score_of(notes: Vec<Note>) -> Score {
        Score::from_notes(notes, [None; NUM_CHANNELS])
    }

    #[test]
    fn empty_score_yields_all_zero_snapshot() {
        let score = score_of(Vec::new());
        let mut analyzer = Analyzer::new();
        let snapshot = analyzer.snapshot(&score, 1.0);

        assert_eq!(snapshot.bass, 0.0);
        assert_eq!(snapshot.mid, 0.0);
        assert_eq!(snapshot.high, 0.0);
        assert!(!snapshot.beat);
        assert!(snapshot.spectrum.iter().all(|&v| v == 0.0));
        assert!(snapshot
            .channels
            .iter()
            .all(|c| *c == ChannelSnapshot::default()));
        assert_eq!(snapshot.active_count, 0);
    }

    #[test]
    fn energy_clamps_at_one() {
        // 50 simultaneous low-pitch notes at full velocity must not
        // overflow the bass bucket past 1.0
        let notes: Vec<Note> = (0..50).map(|_| Note::new(30, 1.0, 0.0, 2.0, 0)).collect();
        let score = score_of(notes);
        let mut analyzer = Analyzer::new();
        let snapshot = analyzer.snapshot(&score, 1.0);

        assert_eq!(snapshot.bass, 1.0);
        assert_eq!(snapshot.mid, 0.0);
        assert_eq!(snapshot.channels[0].energy, 1.0);
        assert_eq!(snapshot.channels[0].active_notes, 50);
        assert_eq!(snapshot.active_count, 50);
    }

    #[test]
    fn pitch_ranges_bucket_correctly() {
        let notes = vec![
            Note::new(30, 1.0, 0.0, 2.0, 0),
            Note::new(60, 1.0, 0.0, 2.0, 1),
            Note::new(100, 1.0, 0.0, 2.0, 2),
        ];
        let score = score_of(notes);
        let mut analyzer = Analyzer::new();
        let snapshot = analyzer.snapshot(&score, 1.0);

        assert!(snapshot.bass > 0.0);
        assert!(snapshot.mid > 0.0);
        assert!(snapshot.high > 0.0);
        assert!((snapshot.bass - ENERGY_PER_NOTE).abs() < 1e-6);
    }

    #[test]
    fn beat_window_boundaries() {
        let score = score_of(vec![Note::new(60, 1.0, 1.0, 0.5, 0)]);

        // Beat is true strictly inside (0.980, 1.020), false outside
        for (t, expected) in [
            (0.975, false),
            (0.981, true),
            (1.0, true),
            (1.019, true),
            (1.025, false),
        ] {
            let mut analyzer = Analyzer::new();
            let snapshot = analyzer.snapshot(&score, t);
            assert_eq!(snapshot.beat, expected, "t = {}", t);
        }
    }

    #[test]
    fn beat_fires_even_for_already_ended_short_note() {
        // A 5ms note: at t = 0.015 it has ended but its start is still
        // inside the beat window
        let score = score_of(vec![Note::new(60, 1.0, 0.0, 0.005, 0)]);
        let mut analyzer = Analyzer::new();
        let snapshot = analyzer.snapshot(&score, 0.015);
        assert!(snapshot.beat);
        assert_eq!(snapshot.active_count, 0);
    }

    #[test]
    fn incremental_matches_fresh_analyzer() {
        let notes: Vec<Note> = (0..40)
            .map(|i| Note::new(30 + (i % 60) as u8, 0.7, i as f64 * 0.1, 0.35, (i % 4) as u8))
            .collect();
        let score = score_of(notes);

        let mut incremental = Analyzer::new();
        for step in 0..60 {
            let t = step as f64 * 0.07;
            let a = incremental.snapshot(&score, t);
            let b = Analyzer::new().snapshot(&score, t);

            assert_eq!(a.active_count, b.active_count, "t = {}", t);
            assert!((a.bass - b.bass).abs() < 1e-6);
            assert!((a.mid - b.mid).abs() < 1e-6);
            assert!((a.high - b.high).abs() < 1e-6);
            assert_eq!(a.beat, b.beat);
        }
    }

    #[test]
    fn backward_seek_rebuilds_correctly() {
        let notes: Vec<Note> = (0..10)
            .map(|i| Note::new(60, 1.0, i as f64, 0.5, 0))
            .collect();
        let score = score_of(notes);

        let mut analyzer = Analyzer::new();
        analyzer.snapshot(&score, 8.2);
        let rewound = analyzer.snapshot(&score, 2.2);
        let fresh = Analyzer::new().snapshot(&score, 2.2);

        assert_eq!(rewound.active_count, fresh.active_count);
        assert!((rewound.bass - fresh.bass).abs() < 1e-6);
        assert!((rewound.mid - fresh.mid).abs() < 1e-6);
    }

    #[test]
    fn per_channel_stats_are_isolated() {
        let notes = vec![
            Note::new(40, 1.0, 0.0, 2.0, 0),
            Note::new(80, 0.5, 0.0, 2.0, 5),
        ];
        let score = score_of(notes);
        let mut analyzer = Analyzer::new();
        let snapshot = analyzer.snapshot(&score, 1.0);

        assert_eq!(snapshot.channels[0].active_notes, 1);
        assert_eq!(snapshot.channels[5].active_notes, 1);
        assert_eq!(snapshot.channels[1].active_notes, 0);
        assert!(snapshot.channels[0].energy > snapshot.channels[5].energy);
    }
}
