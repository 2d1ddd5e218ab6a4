use crate::audio::score::{Note, Score, NUM_CHANNELS};
use std::fs;
use std::path::Path;

/// Load a MIDI file and convert it to a Score
pub fn load_midi_file<P: AsRef<Path>>(path: P) -> Result<Score, String> {
    let data = fs::read(path.as_ref()).map_err(|e| format!("Failed to read MIDI file: {}", e))?;
    load_midi_bytes(&data)
}

/// Parse in-memory MIDI data and convert it to a Score
pub fn load_midi_bytes(data: &[u8]) -> Result<Score, String> {
    // Parse with midly
    let smf = midly::Smf::parse(data).map_err(|e| format!("Failed to parse MIDI file: {}", e))?;

    // Convert timing to ticks per beat
    let ticks_per_beat = match smf.header.timing {
        midly::Timing::Metrical(tpb) => tpb.as_int() as f64,
        midly::Timing::Timecode(fps, subframe) => {
            // For timecode, calculate equivalent ticks per second
            (fps.as_f32() * subframe as f32) as f64
        }
    };

    // First pass: collect all events with their tick positions and tempo changes
    enum RawEvent {
        Midi {
            tick: u64,
            channel: u8,
            message: midly::MidiMessage,
        },
        Tempo {
            tick: u64,
            microseconds_per_beat: f64,
        },
    }

    let mut raw_events = Vec::new();

    for track in &smf.tracks {
        let mut current_tick = 0u64;

        for event in track {
            current_tick += event.delta.as_int() as u64;

            match event.kind {
                midly::TrackEventKind::Midi { channel, message } => {
                    raw_events.push(RawEvent::Midi {
                        tick: current_tick,
                        channel: channel.as_int(),
                        message,
                    });
                }
                midly::TrackEventKind::Meta(midly::MetaMessage::Tempo(tempo)) => {
                    raw_events.push(RawEvent::Tempo {
                        tick: current_tick,
                        microseconds_per_beat: tempo.as_int() as f64,
                    });
                }
                _ => {
                    // Ignore other meta events
                }
            }
        }
    }

    raw_events.sort_by_key(|e| match e {
        RawEvent::Midi { tick, .. } => *tick,
        RawEvent::Tempo { tick, .. } => *tick,
    });

    // Second pass: convert ticks to seconds with tempo tracking, pairing
    // note-on with note-off into complete notes. A note-on with velocity 0
    // counts as a note-off.
    let mut microseconds_per_beat = 500000.0; // Default: 120 BPM
    let mut last_tick = 0u64;
    let mut accumulated_time = 0.0;

    // Open notes per (channel, pitch); same-pitch retriggers stack
    let mut open_notes: Vec<Vec<(f64, f32)>> = vec![Vec::new(); NUM_CHANNELS * 128];
    let mut channel_programs: [Option<u8>; NUM_CHANNELS] = [None; NUM_CHANNELS];
    let mut notes = Vec::new();

    for raw_event in raw_events {
        let tick = match &raw_event {
            RawEvent::Midi { tick, .. } => *tick,
            RawEvent::Tempo { tick, .. } => *tick,
        };
        let delta_ticks = tick - last_tick;
        accumulated_time +=
            (delta_ticks as f64 / ticks_per_beat) * (microseconds_per_beat / 1_000_000.0);
        last_tick = tick;

        match raw_event {
            RawEvent::Tempo {
                microseconds_per_beat: new_tempo,
                ..
            } => {
                microseconds_per_beat = new_tempo;
            }
            RawEvent::Midi {
                channel, message, ..
            } => {
                let key_of = |key: u8| channel as usize * 128 + key as usize;
                match message {
                    midly::MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                        open_notes[key_of(key.as_int())]
                            .push((accumulated_time, vel.as_int() as f32 / 127.0));
                    }
                    midly::MidiMessage::NoteOn { key, .. }
                    | midly::MidiMessage::NoteOff { key, .. } => {
                        let open = &mut open_notes[key_of(key.as_int())];
                        if !open.is_empty() {
                            // Earliest note-on is ended first
                            let (start, velocity) = open.remove(0);
                            let duration = (accumulated_time - start).max(0.0);
                            notes.push(Note::new(key.as_int(), velocity, start, duration, channel));
                        }
                        // A note-off with no matching note-on is dropped
                    }

                    midly::MidiMessage::ProgramChange { program } => {
                        // First program change per channel wins; instrument
                        // resolution happens once at load time
                        let slot = &mut channel_programs[channel as usize % NUM_CHANNELS];
                        if slot.is_none() {
                            *slot = Some(program.as_int());
                        }
                    }
                    _ => {
                        // Ignore other MIDI messages
                    }
                }
            }
        }
    }

    // Close any notes left open at end of track
    for (slot, open) in open_notes.into_iter().enumerate() {
        let channel = (slot / 128) as u8;
        let pitch = (slot % 128) as u8;
        for (start, velocity) in open {
            let duration = (accumulated_time - start).max(0.0);
            notes.push(Note::new(pitch, velocity, start, duration, channel));
        }
    }

    Ok(Score::from_notes(notes, channel_programs))
}
