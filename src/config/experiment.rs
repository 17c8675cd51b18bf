//! Experiment configuration as operator-tunable TOML values.
//!
//! Every section implements `Default` with the reference experiment, so a
//! missing file or a partial file still yields a runnable configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::engine::{Activation, Trainer, TrainingParams};
use crate::error::{ConfigError, SimulationError};
use crate::network::NetworkSpec;
use crate::rng::{RandomStream, DEFAULT_SEED};
use crate::trial::{StimulusSeries, TargetSeries, TrialTiming};

/// Environment variable naming the config file to load.
pub const CONFIG_ENV: &str = "INNATE_CONFIG";
/// Config file looked up in the working directory.
pub const LOCAL_CONFIG: &str = "innate.toml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for one experiment.
///
/// Load with `ExperimentConfig::load()` which searches:
/// 1. `$INNATE_CONFIG`
/// 2. `./innate.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExperimentConfig {
    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub trial: TrialConfig,

    #[serde(default)]
    pub stimulus: StimulusConfig,

    #[serde(default)]
    pub target: TargetConfig,

    #[serde(default)]
    pub training: TrainingConfig,

    #[serde(default)]
    pub rls: RlsConfig,
}

impl ExperimentConfig {
    /// Load using the standard search order, falling back on any failure.
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded experiment config from {CONFIG_ENV}");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from {CONFIG_ENV}, falling back");
                    }
                }
            } else {
                warn!(path = %path, "{CONFIG_ENV} points to non-existent file, falling back");
            }
        }

        let local = PathBuf::from(LOCAL_CONFIG);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded experiment config from ./{LOCAL_CONFIG}");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{LOCAL_CONFIG}, using defaults");
                }
            }
        }

        info!("No {LOCAL_CONFIG} found, using built-in defaults");
        Self::default()
    }

    /// Load from a specific TOML file. Unknown keys are logged, not fatal.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    /// Parse and validate TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }

        let config: Self = toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })?;
        config.validate()?;
        for w in super::validation::validate_ranges(&config) {
            warn!(field = %w.field, "{}", w);
        }
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = self.to_toml()?;
        std::fs::write(path, contents).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "Experiment config saved");
        Ok(())
    }

    /// Build every entity once and collect all construction errors.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        if let Err(e) = self.network_spec() {
            errors.push(format!("network: {e}"));
        }
        match self.timing() {
            Ok(timing) => {
                if let Err(e) = self.stimulus(&timing) {
                    errors.push(format!("stimulus: {e}"));
                }
                if let Err(e) = self.target(&timing) {
                    errors.push(format!("target: {e}"));
                }
            }
            Err(e) => errors.push(format!("trial: {e}")),
        }
        if let Err(e) = self.training_params().validate() {
            errors.push(format!("training: {e}"));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    pub fn network_spec(&self) -> Result<NetworkSpec, ConfigError> {
        let n = &self.network;
        NetworkSpec::new(n.n_units, n.p_connect, n.syn_strength, n.p_plastic)
    }

    pub fn timing(&self) -> Result<TrialTiming, ConfigError> {
        let t = &self.trial;
        TrialTiming::new(
            t.length_ms,
            t.spacing,
            t.time_step_ms,
            t.start_train_ms,
            t.end_train_ms,
        )
    }

    pub fn stimulus(&self, timing: &TrialTiming) -> Result<StimulusSeries, ConfigError> {
        let s = &self.stimulus;
        StimulusSeries::new(timing, s.n_units, s.value, s.start_ms, s.duration_ms)
    }

    pub fn target(&self, timing: &TrialTiming) -> Result<TargetSeries, ConfigError> {
        let t = &self.target;
        TargetSeries::new(
            timing,
            t.n_units,
            t.value,
            t.center_ms,
            t.width_ms,
            t.baseline_val,
        )
    }

    pub fn training_params(&self) -> TrainingParams {
        let t = &self.training;
        TrainingParams {
            tau_ms: t.tau_ms,
            activation: t.activation,
            noise_harvest: t.noise_harvest,
            noise_train: t.noise_train,
            n_trials_recurrent: t.n_trials_recurrent,
            n_trials_readout: t.n_trials_readout,
            n_trials_test: t.n_trials_test,
            update_every: self.rls.update_every,
            rls_alpha: self.rls.alpha,
            readout_alpha: self.rls.readout_alpha,
        }
    }

    /// Fresh trainer with weights drawn from `training.seed`.
    pub fn build_trainer(&self) -> Result<Trainer, SimulationError> {
        let spec = self.network_spec()?;
        let timing = self.timing()?;
        let stimulus = self.stimulus(&timing)?;
        let target = self.target(&timing)?;
        Trainer::from_spec(
            &spec,
            stimulus,
            target,
            timing,
            self.training_params(),
            RandomStream::new(self.training.seed),
        )
    }
}

// ============================================================================
// Sections
// ============================================================================

/// `[network]`: size and connectivity of the recurrent pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub n_units: usize,
    pub p_connect: f64,
    /// Gain of the recurrent weights; above ~1 the network is chaotic.
    pub syn_strength: f64,
    /// Fraction of units whose incoming weights are trained.
    pub p_plastic: f64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            n_units: 800,
            p_connect: 0.1,
            syn_strength: 1.5,
            p_plastic: 0.6,
        }
    }
}

/// `[trial]`: trial timing, all in milliseconds except `spacing`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrialConfig {
    pub length_ms: f64,
    pub spacing: f64,
    pub time_step_ms: f64,
    pub start_train_ms: f64,
    pub end_train_ms: f64,
}

impl Default for TrialConfig {
    fn default() -> Self {
        Self {
            length_ms: 1000.0,
            spacing: 1.0,
            time_step_ms: 1.0,
            start_train_ms: 250.0,
            end_train_ms: 1250.0,
        }
    }
}

/// `[stimulus]`: the input pulse on channel 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StimulusConfig {
    pub n_units: usize,
    pub value: f64,
    pub start_ms: f64,
    pub duration_ms: f64,
}

impl Default for StimulusConfig {
    fn default() -> Self {
        Self {
            n_units: 1,
            value: 5.0,
            start_ms: 200.0,
            duration_ms: 50.0,
        }
    }
}

/// `[target]`: the Gaussian bump the readout should produce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    pub n_units: usize,
    pub value: f64,
    pub center_ms: f64,
    pub width_ms: f64,
    pub baseline_val: f64,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            n_units: 1,
            value: 1.0,
            center_ms: 1000.0,
            width_ms: 30.0,
            baseline_val: 0.2,
        }
    }
}

/// `[training]`: dynamics, noise, trial counts and the random seed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub seed: u64,
    pub tau_ms: f64,
    pub activation: Activation,
    pub noise_harvest: f64,
    pub noise_train: f64,
    pub n_trials_recurrent: usize,
    pub n_trials_readout: usize,
    pub n_trials_test: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        let params = TrainingParams::default();
        Self {
            seed: DEFAULT_SEED,
            tau_ms: params.tau_ms,
            activation: params.activation,
            noise_harvest: params.noise_harvest,
            noise_train: params.noise_train,
            n_trials_recurrent: params.n_trials_recurrent,
            n_trials_readout: params.n_trials_readout,
            n_trials_test: params.n_trials_test,
        }
    }
}

/// `[rls]`: recursive least squares settings for both learning stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RlsConfig {
    /// Initial `P = I / alpha` for plastic units.
    pub alpha: f64,
    /// Initial `P = I / alpha` for the readout.
    pub readout_alpha: f64,
    /// Steps between learning updates inside a training window.
    pub update_every: usize,
}

impl Default for RlsConfig {
    fn default() -> Self {
        let params = TrainingParams::default();
        Self {
            alpha: params.rls_alpha,
            readout_alpha: params.readout_alpha,
            update_every: params.update_every,
        }
    }
}
