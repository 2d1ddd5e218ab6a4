use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use midiviz::audio::engine::Engine;
use midiviz::audio::gm::resolve_instruments;
use midiviz::io::library::spawn_loader;
use midiviz::io::midi_file::load_midi_file;
use midiviz::tui::{self, TuiApp};
use midiviz::{AudioEvent, Command};
use std::env;
use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse arguments: <file.mid> [--samples <dir>]
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <file.mid> [--samples <dir>]", args[0]);
        eprintln!("Example: {} song.mid --samples ./samples", args[0]);
        return Ok(());
    }

    let midi_path = &args[1];
    let samples_dir = args
        .iter()
        .position(|a| a == "--samples")
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("samples"));

    // Note processing happens before anything else; a parse failure
    // aborts playback entirely
    let score = match load_midi_file(midi_path) {
        Ok(score) => score,
        Err(e) => {
            eprintln!("Error loading {}: {}", midi_path, e);
            std::process::exit(1);
        }
    };

    println!(
        "Loaded {}: {} notes on {} channels, {:.2}s",
        midi_path,
        score.len(),
        score.used_channels().len(),
        score.duration
    );

    // Initialize cpal
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or("No output device available")?;
    println!("Using audio device: {}", device.name()?);

    let default_config = device.default_output_config()?;
    let sample_format = default_config.sample_format();
    let sample_rate = default_config.sample_rate().0;

    let config = cpal::StreamConfig {
        channels: 2,
        sample_rate: cpal::SampleRate(sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    // Create lock-free command and event queues
    let (command_tx, command_rx) = rtrb::RingBuffer::<Command>::new(256);
    let (event_tx, event_rx) = rtrb::RingBuffer::<AudioEvent>::new(256);

    // Create the audio engine and install the score before it moves to
    // the audio thread
    let mut engine = Engine::new(sample_rate, 2, command_rx, event_tx);
    let plan = resolve_instruments(&score);
    engine.set_score(score.clone());

    let controller = engine.get_controller(command_tx);

    // Kick off background sample loading; playback may start before the
    // samplers arrive
    let loader_rx = spawn_loader(samples_dir, plan.libraries.clone(), sample_rate);

    // Build the output stream - Engine moves into the audio thread
    let stream = match sample_format {
        cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, engine)?,
        cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, engine)?,
        cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config, engine)?,
        _ => return Err("Unsupported sample format".into()),
    };
    stream.play()?;

    let file_name = PathBuf::from(midi_path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| midi_path.clone());

    let app = TuiApp::new(score, file_name, &plan.libraries);
    tui::run(app, controller, event_rx, loader_rx)?;

    // Drop the stream to stop playback
    drop(stream);

    Ok(())
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut engine: Engine,
) -> Result<cpal::Stream, Box<dyn std::error::Error>>
where
    T: cpal::Sample + cpal::SizedSample + cpal::FromSample<f32>,
{
    let err_fn = |err| eprintln!("Audio stream error: {}", err);

    // Preallocate a generous conversion buffer so the audio callback
    // never allocates for format conversion
    let mut conversion_buffer = vec![0.0f32; 16384];

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            if conversion_buffer.len() < data.len() {
                eprintln!(
                    "Audio buffer size {} exceeds preallocated buffer size {}",
                    data.len(),
                    conversion_buffer.len()
                );
                return;
            }

            let buffer_slice = &mut conversion_buffer[..data.len()];

            // Engine lives entirely on the audio thread with ownership
            engine.process(buffer_slice);

            // Convert f32 samples to the output format
            for (out, &sample) in data.iter_mut().zip(buffer_slice.iter()) {
                *out = cpal::Sample::from_sample(sample);
            }
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}
