use midiviz::analysis::Analyzer;
use midiviz::audio::score::{Note, Score, NUM_CHANNELS};
use midiviz::{AudioEvent, Command, Engine};

const SAMPLE_RATE: u32 = 44100;
const CHANNELS: u32 = 2;

/// One tenth of a second of interleaved stereo per process call
const BUFFER_FRAMES: usize = 4410;

fn make_engine() -> (
    Engine,
    rtrb::Producer<Command>,
    rtrb::Consumer<AudioEvent>,
) {
    let (command_tx, command_rx) = rtrb::RingBuffer::<Command>::new(256);
    let (event_tx, event_rx) = rtrb::RingBuffer::<AudioEvent>::new(256);
    let engine = Engine::new(SAMPLE_RATE, CHANNELS, command_rx, event_tx);
    (engine, command_tx, event_rx)
}

/// Ten notes, one every half second, each 0.4s long
fn test_score() -> Score {
    let notes: Vec<Note> = (0..10)
        .map(|i| Note::new(60 + i as u8, 0.8, i as f64 * 0.5, 0.4, 0))
        .collect();
    Score::from_notes(notes, [None; NUM_CHANNELS])
}

fn process_seconds(engine: &mut Engine, seconds: f64) {
    let mut buffer = vec![0.0f32; BUFFER_FRAMES * CHANNELS as usize];
    let iterations = (seconds / 0.1).ceil() as usize;
    for _ in 0..iterations {
        buffer.fill(0.0);
        engine.process(&mut buffer);
    }
}

#[test]
fn plays_all_notes_from_start() {
    let (mut engine, mut command_tx, _event_rx) = make_engine();
    engine.set_score(test_score());

    command_tx.push(Command::Play).unwrap();
    process_seconds(&mut engine, 6.0);

    assert_eq!(engine.notes_triggered(), 10);
}

#[test]
fn playback_produces_audio() {
    let (mut engine, mut command_tx, _event_rx) = make_engine();
    engine.set_score(test_score());
    command_tx.push(Command::Play).unwrap();

    let mut buffer = vec![0.0f32; BUFFER_FRAMES * CHANNELS as usize];
    let mut heard_something = false;
    for _ in 0..10 {
        buffer.fill(0.0);
        engine.process(&mut buffer);
        if buffer.iter().any(|&s| s != 0.0) {
            heard_something = true;
        }
        // Output is always clamped
        assert!(buffer.iter().all(|&s| (-1.0..=1.0).contains(&s)));
    }
    assert!(heard_something);
}

#[test]
fn stopped_engine_outputs_silence() {
    let (mut engine, _command_tx, _event_rx) = make_engine();
    engine.set_score(test_score());

    let mut buffer = vec![0.1f32; 1024];
    engine.process(&mut buffer);
    assert!(buffer.iter().all(|&s| s == 0.0));
    assert_eq!(engine.notes_triggered(), 0);
}

#[test]
fn reschedule_from_offset_triggers_exact_subset() {
    let (mut engine, mut command_tx, _event_rx) = make_engine();
    let score = test_score();
    engine.set_score(score.clone());

    // Play the first 2.5 seconds: notes at 0.0 .. 2.0 trigger
    command_tx.push(Command::Play).unwrap();
    process_seconds(&mut engine, 2.5);
    let before_seek = engine.notes_triggered();
    assert_eq!(before_seek, 5);

    // Re-schedule from 1.0s: exactly the notes with start >= 1.0 play
    // again, and nothing scheduled before the seek fires beyond them
    command_tx.push(Command::Seek(1.0)).unwrap();
    process_seconds(&mut engine, 6.0);

    let expected_after_seek = score.notes.iter().filter(|n| n.start >= 1.0).count() as u64;
    assert_eq!(expected_after_seek, 8);
    assert_eq!(engine.notes_triggered(), before_seek + expected_after_seek);
}

#[test]
fn stop_then_play_restarts_from_beginning() {
    let (mut engine, mut command_tx, _event_rx) = make_engine();
    engine.set_score(test_score());

    command_tx.push(Command::Play).unwrap();
    process_seconds(&mut engine, 1.2);
    let first_pass = engine.notes_triggered();
    assert!(first_pass >= 2);

    command_tx.push(Command::Stop).unwrap();
    process_seconds(&mut engine, 0.5);
    let after_stop = engine.notes_triggered();
    assert_eq!(after_stop, first_pass);

    command_tx.push(Command::Play).unwrap();
    process_seconds(&mut engine, 6.0);
    assert_eq!(engine.notes_triggered(), first_pass + 10);
}

#[test]
fn muted_channel_does_not_trigger() {
    let (mut engine, mut command_tx, _event_rx) = make_engine();
    let notes = vec![
        Note::new(60, 1.0, 0.0, 0.3, 0),
        Note::new(64, 1.0, 0.0, 0.3, 1),
    ];
    engine.set_score(Score::from_notes(notes, [None; NUM_CHANNELS]));

    command_tx.push(Command::SetChannelMute(1, true)).unwrap();
    command_tx.push(Command::Play).unwrap();
    process_seconds(&mut engine, 1.0);

    assert_eq!(engine.notes_triggered(), 1);
}

#[test]
fn percussion_channel_routes_to_drums() {
    let (mut engine, mut command_tx, _event_rx) = make_engine();
    // A kick on the percussion channel; no melodic instruments loaded
    let notes = vec![Note::new(36, 1.0, 0.0, 0.1, 9)];
    engine.set_score(Score::from_notes(notes, [None; NUM_CHANNELS]));

    command_tx.push(Command::Play).unwrap();
    let mut buffer = vec![0.0f32; BUFFER_FRAMES * CHANNELS as usize];
    engine.process(&mut buffer);

    assert_eq!(engine.notes_triggered(), 1);
    assert!(buffer.iter().any(|&s| s != 0.0));
}

#[test]
fn finishes_and_reports_end_of_score() {
    let (mut engine, mut command_tx, mut event_rx) = make_engine();
    let notes = vec![Note::new(60, 0.8, 0.0, 0.2, 0)];
    engine.set_score(Score::from_notes(notes, [None; NUM_CHANNELS]));

    command_tx.push(Command::Play).unwrap();
    process_seconds(&mut engine, 3.0);

    let mut finished = false;
    while let Ok(event) = event_rx.pop() {
        if matches!(event, AudioEvent::PlaybackFinished) {
            finished = true;
        }
    }
    assert!(finished);
}

#[test]
fn empty_score_plays_silence_and_zero_snapshot() {
    let (mut engine, mut command_tx, _event_rx) = make_engine();
    let score = Score::from_notes(Vec::new(), [None; NUM_CHANNELS]);
    engine.set_score(score.clone());

    command_tx.push(Command::Play).unwrap();
    let mut buffer = vec![0.0f32; 1024];
    engine.process(&mut buffer);
    assert!(buffer.iter().all(|&s| s == 0.0));
    assert_eq!(engine.notes_triggered(), 0);

    let snapshot = Analyzer::new().snapshot(&score, 0.5);
    assert_eq!(snapshot.active_count, 0);
    assert_eq!(snapshot.bass, 0.0);
    assert!(!snapshot.beat);
}

#[test]
fn analysis_tracks_engine_playhead() {
    // The analysis side sees the same score the engine plays; active
    // counts line up with what the playhead reports
    let (mut engine, mut command_tx, _event_rx) = make_engine();
    let score = test_score();
    engine.set_score(score.clone());

    command_tx.push(Command::Play).unwrap();
    let mut analyzer = Analyzer::new();
    let mut buffer = vec![0.0f32; BUFFER_FRAMES * CHANNELS as usize];

    for _ in 0..12 {
        buffer.fill(0.0);
        engine.process(&mut buffer);
    }

    // 1.2s in: the note at 1.0 is active (1.0..1.4)
    let snapshot = analyzer.snapshot(&score, 1.2);
    assert_eq!(snapshot.active_count, 1);
    assert!(snapshot.mid > 0.0);
}
