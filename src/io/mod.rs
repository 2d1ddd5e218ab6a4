pub mod library;
pub mod midi_file;

pub use library::{spawn_loader, LoaderMessage};
pub use midi_file::{load_midi_bytes, load_midi_file};
