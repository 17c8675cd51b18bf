//! innate-rnn: innate-trajectory training of random recurrent rate networks
//!
//! A sparsely, randomly connected pool of leaky rate units is simulated with
//! explicit Euler steps. Its response to a brief input pulse under the
//! initial weights (the innate trajectory) becomes the training signal: the
//! incoming weights of a subset of plastic units are adjusted by recursive
//! least squares until noisy trials retrace that trajectory. A linear
//! readout is then fit to a Gaussian-bump target and tested on fresh trials.
//!
//! ## Architecture
//!
//! - **rng**: one seeded stream for every stochastic draw
//! - **network**: spec, sparse recurrent storage, weight initialization
//! - **trial**: timing, stimulus pulse, target waveform
//! - **engine**: integrator, harvest, plasticity rules, readout, trainer
//! - **config**: TOML experiment configuration
//! - **checkpoint**: JSON persistence of runs

pub mod checkpoint;
pub mod config;
pub mod engine;
pub mod error;
pub mod network;
pub mod rng;
pub mod trial;

pub use config::ExperimentConfig;
pub use engine::{
    harvest_innate, Activation, Integrator, RecurrentRule, RlsRule, TestReport, Trainer,
    TrainingParams, TrainingStage, TrainingSummary, Trajectory, TrialReport,
};
pub use error::{ConfigError, Phase, SimulationError};
pub use network::{initialize_weights, CsrMatrix, NetworkSpec, Weights};
pub use rng::{RandomStream, DEFAULT_SEED};
pub use trial::{StimulusSeries, TargetSeries, TrialTiming};
