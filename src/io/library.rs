use crate::audio::gm::DEFAULT_LIBRARY;
use crate::audio::sampler::{SampleZone, Sampler};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};
use symphonia::core::audio::{AudioBufferRef, Signal};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Hard deadline for background sample loading. Libraries still pending
/// when it expires are abandoned; their channels keep the fallback synth.
pub const LOAD_TIMEOUT: Duration = Duration::from_secs(8);

/// Manifest at the sample root: library name -> sample filenames.
/// Filenames carry the root pitch of the recording ("A3.wav").
pub type Manifest = HashMap<String, Vec<String>>;

/// Read and parse `manifest.json` from the sample directory
pub fn load_manifest(samples_dir: &Path) -> Result<Manifest, String> {
    let path = samples_dir.join("manifest.json");
    let data =
        fs::read_to_string(&path).map_err(|e| format!("Failed to read {:?}: {}", path, e))?;
    serde_json::from_str(&data).map_err(|e| format!("Failed to parse {:?}: {}", path, e))
}

/// Parse the root pitch out of a sample filename ("C4.wav" -> 60,
/// "F#2.flac" -> 42). Returns None for names that don't follow the
/// note-name convention.
pub fn parse_root_pitch(filename: &str) -> Option<u8> {
    let stem = filename.rsplit_once('.').map(|(s, _)| s).unwrap_or(filename);
    let mut chars = stem.chars();

    let letter = chars.next()?.to_ascii_uppercase();
    let semitone: i32 = match letter {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };

    let rest: String = chars.collect();
    let (accidental, octave_str) = match rest.chars().next() {
        Some('#') => (1, &rest[1..]),
        Some('b') => (-1, &rest[1..]),
        _ => (0, rest.as_str()),
    };

    let octave: i32 = octave_str.parse().ok()?;
    let pitch = (octave + 1) * 12 + semitone + accidental;
    u8::try_from(pitch).ok().filter(|&p| p < 128)
}

/// Messages from the background loader to the UI thread
pub enum LoaderMessage {
    /// A library finished loading; install the sampler into its slot
    Loaded { slot: usize, sampler: Box<Sampler> },
    /// A library failed to load; its channels keep the fallback synth
    Failed {
        slot: usize,
        library: String,
        error: String,
    },
    /// The deadline expired with these libraries still pending
    TimedOut { remaining: Vec<String> },
    /// All libraries resolved one way or another
    Done,
}

/// Load the distinct sample libraries of an instrument plan on a
/// background thread.
///
/// Loading starts after note processing completes and playback may begin
/// before it finishes; finished samplers are forwarded to the audio
/// thread as they arrive. Each distinct library is loaded exactly once
/// no matter how many channels resolve to it.
pub fn spawn_loader(
    samples_dir: PathBuf,
    libraries: Vec<String>,
    output_rate: u32,
) -> mpsc::Receiver<LoaderMessage> {
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        let deadline = Instant::now() + LOAD_TIMEOUT;

        let manifest = match load_manifest(&samples_dir) {
            Ok(manifest) => manifest,
            Err(error) => {
                // No manifest means no samples at all; every channel
                // stays on the fallback synth
                eprintln!("Sample manifest unavailable: {}", error);
                for (slot, library) in libraries.into_iter().enumerate() {
                    let _ = tx.send(LoaderMessage::Failed {
                        slot,
                        library,
                        error: error.clone(),
                    });
                }
                let _ = tx.send(LoaderMessage::Done);
                return;
            }
        };

        let mut pending = libraries.into_iter().enumerate();
        while let Some((slot, library)) = pending.next() {
            if Instant::now() >= deadline {
                let mut remaining = vec![library];
                remaining.extend(pending.map(|(_, l)| l));
                eprintln!(
                    "Sample loading deadline expired; skipping: {}",
                    remaining.join(", ")
                );
                let _ = tx.send(LoaderMessage::TimedOut { remaining });
                let _ = tx.send(LoaderMessage::Done);
                return;
            }

            // A mapped library with no samples available falls back to
            // the default library
            let resolved = if manifest.contains_key(&library) {
                library.clone()
            } else {
                DEFAULT_LIBRARY.to_string()
            };

            let message = match manifest.get(&resolved) {
                Some(files) => {
                    match load_library(&samples_dir, &resolved, files, output_rate) {
                        Ok(sampler) => LoaderMessage::Loaded {
                            slot,
                            sampler: Box::new(sampler),
                        },
                        Err(error) => {
                            eprintln!("Failed to load library '{}': {}", resolved, error);
                            LoaderMessage::Failed {
                                slot,
                                library: resolved,
                                error,
                            }
                        }
                    }
                }
                None => LoaderMessage::Failed {
                    slot,
                    library: resolved.clone(),
                    error: format!("'{}' not present in manifest", resolved),
                },
            };
            if tx.send(message).is_err() {
                return; // Receiver dropped, stop loading
            }
        }

        let _ = tx.send(LoaderMessage::Done);
    });

    rx
}

/// Build one sampler from a library's sample files
fn load_library(
    samples_dir: &Path,
    library: &str,
    files: &[String],
    output_rate: u32,
) -> Result<Sampler, String> {
    let mut zones = Vec::new();

    for file in files {
        let Some(root_pitch) = parse_root_pitch(file) else {
            eprintln!("Skipping sample with unrecognized name: {}", file);
            continue;
        };
        let path = samples_dir.join(library).join(file);
        match decode_audio_file(&path) {
            Ok((samples, sample_rate)) => zones.push(SampleZone {
                samples,
                sample_rate,
                root_pitch,
            }),
            Err(error) => {
                eprintln!("Skipping sample {:?}: {}", path, error);
            }
        }
    }

    if zones.is_empty() {
        return Err(format!("no usable samples for library '{}'", library));
    }
    Ok(Sampler::new(library.to_string(), zones, output_rate))
}

/// Decode an audio file to mono f32 samples via symphonia
pub fn decode_audio_file(path: &Path) -> Result<(Vec<f32>, u32), String> {
    let file = fs::File::open(path).map_err(|e| format!("Failed to open file: {}", e))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(extension);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| format!("Failed to probe format: {}", e))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| "No audio tracks found".to_string())?;

    let track_id = track.id;
    let sample_rate = track.codec_params.sample_rate.unwrap_or(48000);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| format!("Failed to create decoder: {}", e))?;

    let mut all_samples = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break; // End of stream
            }
            Err(e) => return Err(format!("Error reading packet: {}", e)),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = decoder
            .decode(&packet)
            .map_err(|e| format!("Failed to decode packet: {}", e))?;
        all_samples.extend_from_slice(&convert_to_mono_f32(&decoded));
    }

    Ok((all_samples, sample_rate))
}

/// Convert an audio buffer of any sample format to mono f32
fn convert_to_mono_f32(buf: &AudioBufferRef) -> Vec<f32> {
    // Downmix by averaging channels; each branch differs only in the
    // per-sample conversion to f32
    macro_rules! downmix {
        ($buf:expr, $to_f32:expr) => {{
            let channels = $buf.spec().channels.count();
            let frames = $buf.frames();
            let mut mono = Vec::with_capacity(frames);
            for frame in 0..frames {
                let mut sum = 0.0f32;
                for ch in 0..channels {
                    sum += $to_f32($buf.chan(ch)[frame]);
                }
                mono.push(sum / channels as f32);
            }
            mono
        }};
    }

    match buf {
        AudioBufferRef::F32(b) => downmix!(b, |s: f32| s),
        AudioBufferRef::F64(b) => downmix!(b, |s: f64| s as f32),
        AudioBufferRef::U8(b) => downmix!(b, |s: u8| (s as f32 - 128.0) / 128.0),
        AudioBufferRef::U16(b) => downmix!(b, |s: u16| (s as f32 - 32768.0) / 32768.0),
        AudioBufferRef::U24(b) => {
            downmix!(b, |s: symphonia::core::sample::u24| (s.inner() as f32
                - 8388608.0)
                / 8388608.0)
        }
        AudioBufferRef::U32(b) => {
            downmix!(b, |s: u32| (s as f32 - 2147483648.0) / 2147483648.0)
        }
        AudioBufferRef::S8(b) => downmix!(b, |s: i8| s as f32 / 128.0),
        AudioBufferRef::S16(b) => downmix!(b, |s: i16| s as f32 / 32768.0),
        AudioBufferRef::S24(b) => {
            downmix!(b, |s: symphonia::core::sample::i24| s.inner() as f32
                / 8388608.0)
        }
        AudioBufferRef::S32(b) => downmix!(b, |s: i32| s as f32 / 2147483648.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_pitch_parsing() {
        assert_eq!(parse_root_pitch("C4.wav"), Some(60));
        assert_eq!(parse_root_pitch("A3.wav"), Some(57));
        assert_eq!(parse_root_pitch("F#2.flac"), Some(42));
        assert_eq!(parse_root_pitch("Bb1.wav"), Some(34));
        assert_eq!(parse_root_pitch("C-1.wav"), Some(0));
        assert_eq!(parse_root_pitch("kick.wav"), None);
        assert_eq!(parse_root_pitch("H4.wav"), None);
        assert_eq!(parse_root_pitch("C99.wav"), None);
    }

    #[test]
    fn manifest_parses_from_json() {
        let json = r#"{
            "piano": ["A0.wav", "C4.wav"],
            "strings": ["G2.wav"]
        }"#;
        let manifest: Manifest = serde_json::from_str(json).unwrap();
        assert_eq!(manifest["piano"].len(), 2);
        assert_eq!(manifest["strings"], vec!["G2.wav".to_string()]);
    }

    #[test]
    fn missing_manifest_fails_every_library() {
        let rx = spawn_loader(
            PathBuf::from("/nonexistent/sample/dir"),
            vec!["piano".to_string(), "bass".to_string()],
            44100,
        );

        let mut failed = 0;
        let mut done = false;
        for message in rx.iter() {
            match message {
                LoaderMessage::Failed { .. } => failed += 1,
                LoaderMessage::Done => {
                    done = true;
                    break;
                }
                _ => panic!("unexpected loader message"),
            }
        }
        assert_eq!(failed, 2);
        assert!(done);
    }
}
