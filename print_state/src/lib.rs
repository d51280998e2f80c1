mod sequencer;
pub mod states;

pub use sequencer::{ConfigError, PrintGeometry, PrintSequencer};
pub use states::{Activation, CaptureLength, LayerState, PrintStatus};
