pub mod drums;
pub mod engine;
pub mod gm;
pub mod sampler;
pub mod score;
pub mod synth;

pub use engine::{Engine, EngineController};
pub use sampler::{SampleZone, Sampler};
pub use score::{Note, Score};
pub use synth::FallbackSynth;
