//! Error types for configuration and simulation.
//!
//! Configuration errors are raised when an entity is constructed
//! (`NetworkSpec`, `TrialTiming`, `StimulusSeries`, `TargetSeries`,
//! `ExperimentConfig`). Simulation errors are raised while integrating or
//! training and carry enough context (phase, trial, step) to locate the fault.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while building or loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{name} must be positive and finite, got {value}")]
    NonPositive { name: &'static str, value: f64 },

    #[error("{name} = {value} is outside {range}")]
    OutOfRange {
        name: &'static str,
        value: f64,
        range: &'static str,
    },

    #[error("training window is empty: start {start_ms} ms is not before end {end_ms} ms")]
    EmptyTrainingWindow { start_ms: f64, end_ms: f64 },

    #[error("trial has no time steps (max {max_ms} ms at {time_step_ms} ms per step)")]
    NoSteps { max_ms: f64, time_step_ms: f64 },

    #[error("{what} window [{start}, {end}) falls outside the trial's step range [0, {n_steps})")]
    WindowOutOfRange {
        what: &'static str,
        start: usize,
        end: usize,
        n_steps: usize,
    },

    #[error("Config I/O error ({}): {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Config parse error ({}): {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Config serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
}

/// Which part of the pipeline a trial belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Harvest,
    Recurrent,
    Readout,
    Test,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Harvest => "harvest",
            Self::Recurrent => "recurrent training",
            Self::Readout => "readout training",
            Self::Test => "test",
        };
        f.write_str(name)
    }
}

/// Errors raised during integration or training.
#[derive(Error, Debug)]
pub enum SimulationError {
    #[error("non-finite activity in {phase} trial {trial} at step {step} (unit {unit})")]
    NonFinite {
        phase: Phase,
        trial: usize,
        step: usize,
        unit: usize,
    },

    #[error("shape mismatch for {what}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        what: &'static str,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("weight delta targets non-plastic row {row} (plastic rows are 0..{n_plastic})")]
    NonPlasticRow { row: usize, n_plastic: usize },

    #[error("weight delta for row {row} has {actual} entries, row stores {expected}")]
    DeltaLength {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("invalid stored weights: {0}")]
    InvalidWeights(String),

    #[error("cannot {action} while trainer is {stage}")]
    InvalidStage {
        action: &'static str,
        stage: String,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}
