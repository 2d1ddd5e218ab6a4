use crate::audio::drums::DrumKit;
use crate::audio::gm::{resolve_instruments, InstrumentPlan};
use crate::audio::sampler::Sampler;
use crate::audio::score::{Score, NUM_CHANNELS, PERCUSSION_CHANNEL};
use crate::audio::synth::FallbackSynth;
use crate::command::{AudioEvent, Command};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Seconds of voice tail allowed past the last note before playback
/// reports finished
const RELEASE_TAIL: f64 = 1.0;

/// Playback engine: owns the score, the instruments, and the playhead.
///
/// Lives entirely on the audio thread; the UI talks to it through
/// lock-free command/event queues and reads the playhead from a shared
/// atomic. Note scheduling is a persistent cursor over the start-sorted
/// note list: each callback triggers the notes whose start times fall in
/// the buffer's time window. A seek silences everything and re-derives
/// the cursor, so no stale trigger survives a re-schedule.
pub struct Engine {
    score: Option<Score>,
    plan: InstrumentPlan,

    // Instruments. One sampler per distinct library; channels share slots.
    samplers: Vec<Option<Sampler>>,
    synth: FallbackSynth,
    drums: DrumKit,

    playhead: u64, // Playhead position in frames
    next_note: usize,
    sample_rate: u32,
    channels: u32,
    playing: bool,
    volume: f32,
    channel_muted: [bool; NUM_CHANNELS],
    finished_sent: bool,

    // Lock-free communication
    command_rx: rtrb::Consumer<Command>,
    event_tx: rtrb::Producer<AudioEvent>,

    // Shared playhead for UI reads
    playhead_atomic: Arc<AtomicU64>,

    // Frame counter for periodic position updates
    frames_since_last_event: usize,
    event_interval_frames: usize,

    // Diagnostic counter: total note triggers since the last score load
    notes_triggered: u64,
}

impl Engine {
    /// Create a new Engine with communication channels
    pub fn new(
        sample_rate: u32,
        channels: u32,
        command_rx: rtrb::Consumer<Command>,
        event_tx: rtrb::Producer<AudioEvent>,
    ) -> Self {
        let event_interval_frames = sample_rate as usize / 10; // Update 10 times per second

        Self {
            score: None,
            plan: InstrumentPlan::default(),
            samplers: Vec::new(),
            synth: FallbackSynth::new(sample_rate),
            drums: DrumKit::new(sample_rate),
            playhead: 0,
            next_note: 0,
            sample_rate,
            channels,
            playing: false,
            volume: 1.0,
            channel_muted: [false; NUM_CHANNELS],
            finished_sent: false,
            command_rx,
            event_tx,
            playhead_atomic: Arc::new(AtomicU64::new(0)),
            frames_since_last_event: 0,
            event_interval_frames,
            notes_triggered: 0,
        }
    }

    /// Install a score directly (used before the engine moves to the
    /// audio thread; afterwards use Command::LoadScore)
    pub fn set_score(&mut self, score: Score) {
        self.plan = resolve_instruments(&score);
        self.samplers = (0..self.plan.libraries.len()).map(|_| None).collect();
        self.score = Some(score);
        self.playhead = 0;
        self.next_note = 0;
        self.finished_sent = false;
        self.notes_triggered = 0;
        self.playhead_atomic.store(0, Ordering::Relaxed);
    }

    /// Get a handle for controlling playback from the UI thread
    pub fn get_controller(&self, command_tx: rtrb::Producer<Command>) -> EngineController {
        EngineController {
            command_tx,
            playhead: Arc::clone(&self.playhead_atomic),
            sample_rate: self.sample_rate,
        }
    }

    /// Process audio callback - called from the audio thread
    pub fn process(&mut self, output: &mut [f32]) {
        // Process all pending commands
        while let Ok(cmd) = self.command_rx.pop() {
            self.handle_command(cmd);
        }

        output.fill(0.0);

        if !self.playing {
            return;
        }

        let channels = self.channels as usize;
        let frames = output.len() / channels.max(1);
        let window_start = self.playhead as f64 / self.sample_rate as f64;
        let window_end = (self.playhead + frames as u64) as f64 / self.sample_rate as f64;

        // Collect every note whose start time falls inside this buffer,
        // then trigger them on their instruments
        let mut due: Vec<NoteTrigger> = Vec::new();
        if let Some(score) = &self.score {
            while self.next_note < score.len() && score.notes[self.next_note].start < window_end {
                let note = &score.notes[self.next_note];
                self.next_note += 1;
                if self.channel_muted[(note.channel as usize) % NUM_CHANNELS] {
                    continue;
                }
                due.push(NoteTrigger {
                    pitch: note.pitch,
                    velocity: note.velocity,
                    duration: note.duration,
                    channel: note.channel,
                });
            }
        }
        for trigger in &due {
            self.trigger(trigger);
        }

        // Mix all instruments
        self.synth.process(output, channels);
        self.drums.process(output, channels);
        for sampler in self.samplers.iter_mut().flatten() {
            sampler.process(output, channels);
        }

        // Master volume, clamped output
        for sample in output.iter_mut() {
            *sample = (*sample * self.volume).clamp(-1.0, 1.0);
        }

        // Update playhead
        self.playhead += frames as u64;
        self.playhead_atomic.store(self.playhead, Ordering::Relaxed);

        // Send periodic position updates
        self.frames_since_last_event += frames;
        if self.frames_since_last_event >= self.event_interval_frames {
            let _ = self
                .event_tx
                .push(AudioEvent::PlaybackPosition(window_end));
            self.frames_since_last_event = 0;
        }

        // Report the end of the score once, voice tails included
        if let Some(score) = &self.score {
            if !self.finished_sent
                && score.duration > 0.0
                && window_start > score.duration + RELEASE_TAIL
            {
                self.playing = false;
                self.finished_sent = true;
                let _ = self.event_tx.push(AudioEvent::PlaybackFinished);
            }
        }
    }

    /// Route one note to its instrument
    fn trigger(&mut self, trigger: &NoteTrigger) {
        self.notes_triggered += 1;

        if trigger.channel == PERCUSSION_CHANNEL {
            self.drums.trigger(trigger.pitch, trigger.velocity);
            return;
        }

        let sampler = self
            .plan
            .channel_slots
            .get(trigger.channel as usize)
            .copied()
            .flatten()
            .and_then(|slot| self.samplers.get_mut(slot))
            .and_then(|s| s.as_mut());

        match sampler {
            // The library may still be loading; until it arrives the
            // fallback synth plays instead of dropping the note
            Some(sampler) if !sampler.is_empty() => {
                sampler.note_on(trigger.pitch, trigger.velocity, trigger.duration)
            }
            _ => self
                .synth
                .note_on(trigger.pitch, trigger.velocity, trigger.duration),
        }
    }

    /// Silence every instrument immediately
    fn silence_all(&mut self) {
        self.synth.all_notes_off();
        self.drums.all_notes_off();
        for sampler in self.samplers.iter_mut().flatten() {
            sampler.all_notes_off();
        }
    }

    /// Handle a command from the UI thread
    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Play => {
                self.playing = true;
                self.finished_sent = false;
            }
            Command::Pause => {
                self.playing = false;
                self.silence_all();
            }
            Command::Stop => {
                self.playing = false;
                self.playhead = 0;
                self.next_note = 0;
                self.finished_sent = false;
                self.silence_all();
                self.playhead_atomic.store(0, Ordering::Relaxed);
            }
            Command::Seek(seconds) => {
                let seconds = seconds.max(0.0);
                self.playhead = (seconds * self.sample_rate as f64) as u64;
                // Every seek is a full re-schedule: silence pending voices
                // and pick up exactly the notes with start >= seconds
                self.silence_all();
                self.next_note = self
                    .score
                    .as_ref()
                    .map(|s| s.first_note_at_or_after(seconds))
                    .unwrap_or(0);
                self.finished_sent = false;
                self.playhead_atomic.store(self.playhead, Ordering::Relaxed);
            }
            Command::SetVolume(volume) => {
                self.volume = volume.clamp(0.0, 2.0);
            }
            Command::SetChannelMute(channel, muted) => {
                self.channel_muted[(channel as usize) % NUM_CHANNELS] = muted;
            }
            Command::LoadScore(score) => {
                self.playing = false;
                self.silence_all();
                self.set_score(*score);
            }
            Command::InstrumentReady(slot, sampler) => {
                if let Some(entry) = self.samplers.get_mut(slot) {
                    *entry = Some(*sampler);
                }
            }
        }
    }

    /// Get current sample rate
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Get number of channels
    pub fn channels(&self) -> u32 {
        self.channels
    }

    /// Total notes triggered since the last score load
    pub fn notes_triggered(&self) -> u64 {
        self.notes_triggered
    }
}

/// The fields of a note that reach an instrument
struct NoteTrigger {
    pitch: u8,
    velocity: f32,
    duration: f64,
    channel: u8,
}

/// Controller for the engine that can be used from the UI thread
pub struct EngineController {
    command_tx: rtrb::Producer<Command>,
    playhead: Arc<AtomicU64>,
    sample_rate: u32,
}

impl EngineController {
    /// Start or resume playback
    pub fn play(&mut self) {
        let _ = self.command_tx.push(Command::Play);
    }

    /// Pause playback
    pub fn pause(&mut self) {
        let _ = self.command_tx.push(Command::Pause);
    }

    /// Stop playback and reset to beginning
    pub fn stop(&mut self) {
        let _ = self.command_tx.push(Command::Stop);
    }

    /// Seek to a specific position in seconds
    pub fn seek(&mut self, seconds: f64) {
        let _ = self.command_tx.push(Command::Seek(seconds));
    }

    /// Set master volume (0.0 = silence, 1.0 = unity gain)
    pub fn set_volume(&mut self, volume: f32) {
        let _ = self.command_tx.push(Command::SetVolume(volume));
    }

    /// Mute or unmute a MIDI channel
    pub fn set_channel_mute(&mut self, channel: u8, muted: bool) {
        let _ = self.command_tx.push(Command::SetChannelMute(channel, muted));
    }

    /// Replace the loaded score
    pub fn load_score(&mut self, score: Score) {
        let _ = self.command_tx.push(Command::LoadScore(Box::new(score)));
    }

    /// Install a background-loaded sampler into an instrument slot
    pub fn instrument_ready(&mut self, slot: usize, sampler: Sampler) {
        let _ = self
            .command_tx
            .push(Command::InstrumentReady(slot, Box::new(sampler)));
    }

    /// Get current playhead position in seconds
    pub fn get_playhead_seconds(&self) -> f64 {
        let frames = self.playhead.load(Ordering::Relaxed);
        frames as f64 / self.sample_rate as f64
    }
}
