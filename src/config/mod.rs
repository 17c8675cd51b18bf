//! Experiment Configuration Module
//!
//! Per-experiment configuration loaded from TOML files.
//!
//! ## Loading Order
//!
//! 1. `INNATE_CONFIG` environment variable (path to TOML file)
//! 2. `innate.toml` in the current working directory
//! 3. Built-in defaults (the reference experiment)
//!
//! ## Usage
//!
//! ```ignore
//! let config = ExperimentConfig::load();
//! let mut trainer = config.build_trainer()?;
//! let summary = trainer.run()?;
//! ```

mod experiment;
pub mod validation;

pub use experiment::*;
pub use validation::ValidationWarning;
