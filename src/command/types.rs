use crate::audio::sampler::Sampler;
use crate::audio::score::Score;

/// Commands sent from the UI/control thread to the audio thread
#[derive(Debug)]
pub enum Command {
    // Transport commands
    /// Start playback
    Play,
    /// Pause playback (maintains position)
    Pause,
    /// Stop playback and reset to beginning
    Stop,
    /// Seek to a specific position in seconds
    Seek(f64),

    // Mixer commands
    /// Set master volume (0.0 = silence, 1.0 = unity gain)
    SetVolume(f32),
    /// Mute or unmute a MIDI channel
    SetChannelMute(u8, bool),

    /// Replace the loaded score (resets playhead and scheduling cursor)
    LoadScore(Box<Score>),
    /// A sample library finished loading in the background; install it
    /// into the given instrument slot
    InstrumentReady(usize, Box<Sampler>),
}

/// Events sent from the audio thread back to the UI/control thread
#[derive(Debug, Clone)]
pub enum AudioEvent {
    /// Current playback position in seconds
    PlaybackPosition(f64),
    /// Playback reached the end of the score
    PlaybackFinished,
}
