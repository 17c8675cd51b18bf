//! Trial timing and the input/output waveforms built on it.

pub mod stimulus;
pub mod target;
pub mod timing;

pub use stimulus::StimulusSeries;
pub use target::TargetSeries;
pub use timing::{TrialTiming, EXTRA_END_MS, EXTRA_TRAIN_MS, PLOT_POINTS};
