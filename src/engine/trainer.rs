//! Training pipeline: innate harvest, recurrent training, readout training
//! and test evaluation, driven as a state machine.
//!
//! ```text
//! NotTrained -> RecurrentTraining { trial } -> ReadoutTraining { trial } -> Testing { trial } -> Trained
//! ```
//!
//! Trials within a stage run one after another. Every trial draws its own
//! noise and initial condition from the shared stream, and weight changes
//! are applied in trial and step order through the `Weights` write path.

use std::fmt;

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::engine::activation::Activation;
use crate::engine::harvest::harvest_innate;
use crate::engine::integrator::{Integrator, Trajectory, TrialDraw, TrialId};
use crate::engine::plasticity::{PlasticStep, RecurrentRule, RlsRule};
use crate::engine::readout::ReadoutRls;
use crate::error::{ConfigError, Phase, SimulationError};
use crate::network::{initialize_weights, NetworkSpec, Weights};
use crate::rng::RandomStream;
use crate::trial::{StimulusSeries, TargetSeries, TrialTiming};

/// Dynamics, noise and trial-count settings for one training run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TrainingParams {
    /// Unit time constant (ms).
    pub tau_ms: f64,
    pub activation: Activation,
    /// Noise scale while harvesting the innate trajectory.
    pub noise_harvest: f64,
    /// Noise scale for training and test trials.
    pub noise_train: f64,
    pub n_trials_recurrent: usize,
    pub n_trials_readout: usize,
    pub n_trials_test: usize,
    /// Apply a learning update every this many steps inside a training window.
    pub update_every: usize,
    /// Initial `P = I / alpha` for recurrent RLS.
    pub rls_alpha: f64,
    /// Initial `P = I / alpha` for readout RLS.
    pub readout_alpha: f64,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            tau_ms: 10.0,
            activation: Activation::Tanh,
            noise_harvest: 0.001,
            noise_train: 0.001,
            n_trials_recurrent: 20,
            n_trials_readout: 10,
            n_trials_test: 10,
            update_every: 2,
            rls_alpha: 1.0,
            readout_alpha: 1.0,
        }
    }
}

impl TrainingParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [("noise_harvest", self.noise_harvest), ("noise_train", self.noise_train)] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::OutOfRange {
                    name,
                    value,
                    range: "[0, inf)",
                });
            }
        }
        for (name, value) in [
            ("tau_ms", self.tau_ms),
            ("rls_alpha", self.rls_alpha),
            ("readout_alpha", self.readout_alpha),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::NonPositive { name, value });
            }
        }
        if self.update_every == 0 {
            return Err(ConfigError::NonPositive {
                name: "update_every",
                value: 0.0,
            });
        }
        Ok(())
    }
}

/// Where the trainer is in its pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrainingStage {
    NotTrained,
    RecurrentTraining { trial: usize },
    ReadoutTraining { trial: usize },
    Testing { trial: usize },
    Trained,
}

impl fmt::Display for TrainingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotTrained => write!(f, "not trained"),
            Self::RecurrentTraining { trial } => write!(f, "in recurrent training (trial {trial})"),
            Self::ReadoutTraining { trial } => write!(f, "in readout training (trial {trial})"),
            Self::Testing { trial } => write!(f, "testing (trial {trial})"),
            Self::Trained => write!(f, "trained"),
        }
    }
}

/// Outcome of one training or test trial.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrialReport {
    pub phase: Phase,
    pub trial: usize,
    /// Mean squared error over the trial's window (before each update, when training).
    pub mse: f64,
    /// Learning updates applied during the trial.
    pub updates: usize,
}

/// Fit of the trained readout on held-out trials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestReport {
    pub trials: Vec<TrialReport>,
    /// Mean of the per-trial MSEs; `None` when no test trials ran.
    pub mean_mse: Option<f64>,
}

/// Everything a run produced, for logging or persistence by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub seed: u64,
    pub n_units: usize,
    pub n_plastic: usize,
    pub connections: usize,
    pub rule: String,
    pub recurrent: Vec<TrialReport>,
    pub readout: Vec<TrialReport>,
    pub test: TestReport,
    pub weights_version: u64,
}

fn mean(sum: f64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Owns the weights and drives every training stage.
pub struct Trainer {
    weights: Weights,
    stimulus: StimulusSeries,
    target: TargetSeries,
    timing: TrialTiming,
    params: TrainingParams,
    integrator: Integrator,
    rule: Box<dyn RecurrentRule>,
    rng: RandomStream,
    innate: Option<Trajectory>,
    stage: TrainingStage,
    recurrent_reports: Vec<TrialReport>,
    readout_reports: Vec<TrialReport>,
    test_report: Option<TestReport>,
}

impl fmt::Debug for Trainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trainer")
            .field("stage", &self.stage)
            .field("rule", &self.rule.name())
            .field("n_units", &self.weights.n_units())
            .field("weights_version", &self.weights.version())
            .finish_non_exhaustive()
    }
}

impl Trainer {
    /// Trainer over existing weights. Shapes of stimulus and target must
    /// match the weights and the timing.
    pub fn new(
        weights: Weights,
        stimulus: StimulusSeries,
        target: TargetSeries,
        timing: TrialTiming,
        params: TrainingParams,
        rng: RandomStream,
    ) -> Result<Self, SimulationError> {
        params.validate()?;
        Integrator::check_stimulus(&weights, stimulus.series().view(), &timing)?;
        let expected = (weights.n_outputs(), timing.n_steps());
        if target.series().dim() != expected {
            return Err(SimulationError::ShapeMismatch {
                what: "target series",
                expected,
                actual: target.series().dim(),
            });
        }
        let integrator = Integrator::new(params.tau_ms, &timing, params.activation)?;

        Ok(Self {
            weights,
            stimulus,
            target,
            timing,
            params,
            integrator,
            rule: Box::new(RlsRule::new(params.rls_alpha)),
            rng,
            innate: None,
            stage: TrainingStage::NotTrained,
            recurrent_reports: Vec::new(),
            readout_reports: Vec::new(),
            test_report: None,
        })
    }

    /// Draw fresh weights for `spec` from `rng`, then build the trainer.
    pub fn from_spec(
        spec: &NetworkSpec,
        stimulus: StimulusSeries,
        target: TargetSeries,
        timing: TrialTiming,
        params: TrainingParams,
        mut rng: RandomStream,
    ) -> Result<Self, SimulationError> {
        let weights = initialize_weights(spec, stimulus.n_units(), target.n_units(), &mut rng);
        Self::new(weights, stimulus, target, timing, params, rng)
    }

    /// Replace the recurrent update rule.
    pub fn with_rule(mut self, rule: Box<dyn RecurrentRule>) -> Self {
        self.rule = rule;
        self
    }

    pub fn stage(&self) -> TrainingStage {
        self.stage
    }

    pub fn weights(&self) -> &Weights {
        &self.weights
    }

    pub fn innate(&self) -> Option<&Trajectory> {
        self.innate.as_ref()
    }

    pub fn timing(&self) -> &TrialTiming {
        &self.timing
    }

    pub fn params(&self) -> &TrainingParams {
        &self.params
    }

    /// Seed of the stream every draw of this run comes from.
    pub fn seed(&self) -> u64 {
        self.rng.seed()
    }

    fn invalid(&self, action: &'static str) -> SimulationError {
        SimulationError::InvalidStage {
            action,
            stage: self.stage.to_string(),
        }
    }

    /// Harvest (or re-harvest) the innate trajectory under the current weights.
    pub fn harvest_innate(&mut self) -> Result<&Trajectory, SimulationError> {
        if self.stage != TrainingStage::NotTrained {
            return Err(self.invalid("harvest the innate trajectory"));
        }
        let innate = harvest_innate(
            &self.integrator,
            &self.weights,
            &self.stimulus,
            &self.timing,
            self.params.noise_harvest,
            &mut self.rng,
        )?;
        Ok(&*self.innate.insert(innate))
    }

    /// Run every recurrent training trial, harvesting first if needed.
    ///
    /// A trial that fails partway restores the weights it started from, so
    /// `W_rec` never holds half a trial's updates. The stage stays at the
    /// failed trial and the trainer cannot be restarted.
    pub fn train_recurrent(&mut self) -> Result<&[TrialReport], SimulationError> {
        if self.stage != TrainingStage::NotTrained {
            return Err(self.invalid("start recurrent training"));
        }
        if self.innate.is_none() {
            self.harvest_innate()?;
        }
        self.rule.prepare(&self.weights);

        let window = self.timing.recurrent_window();
        info!(
            trials = self.params.n_trials_recurrent,
            rule = self.rule.name(),
            n_plastic = self.weights.n_plastic(),
            window_start = window.start,
            window_end = window.end,
            "Recurrent training started"
        );

        for trial in 0..self.params.n_trials_recurrent {
            self.stage = TrainingStage::RecurrentTraining { trial };
            let snapshot = self.weights.clone();
            let report = match self.recurrent_trial(trial) {
                Ok(report) => report,
                Err(e) => {
                    warn!(trial, error = %e, "Recurrent trial failed, weights restored");
                    self.weights = snapshot;
                    return Err(e);
                }
            };
            debug!(trial, mse = report.mse, updates = report.updates, "Recurrent trial done");
            self.recurrent_reports.push(report);
        }

        self.stage = TrainingStage::ReadoutTraining { trial: 0 };
        info!(weights_version = self.weights.version(), "Recurrent training finished");
        Ok(self.recurrent_reports.as_slice())
    }

    fn recurrent_trial(&mut self, trial: usize) -> Result<TrialReport, SimulationError> {
        let n_units = self.weights.n_units();
        let n_plastic = self.weights.n_plastic();
        let window = self.timing.recurrent_window();
        let every = self.params.update_every;
        let id = TrialId {
            phase: Phase::Recurrent,
            trial,
        };

        let TrialDraw { noise, mut state } =
            self.integrator
                .draw_trial(&mut self.rng, n_units, &self.timing, self.params.noise_train);
        let stimulus = self.stimulus.series();
        let Some(innate) = self.innate.as_ref() else {
            return Err(SimulationError::InvalidStage {
                action: "train without an innate trajectory",
                stage: self.stage.to_string(),
            });
        };

        let mut errors = vec![0.0; n_plastic];
        let mut sq_err = 0.0;
        let mut updates = 0;
        for t in 0..self.timing.n_steps() {
            self.integrator
                .step(&mut state, &self.weights, stimulus.column(t), noise.column(t), id, t)?;

            if !window.contains(&t) || (t - window.start) % every != 0 {
                continue;
            }
            for (i, e) in errors.iter_mut().enumerate() {
                *e = state.x_fr[i] - innate[[i, t]];
            }
            sq_err += errors.iter().map(|e| e * e).sum::<f64>();
            updates += 1;

            let delta = self.rule.weight_delta(
                &self.weights.w_rec,
                &PlasticStep {
                    step: t,
                    firing_rate: state.x_fr.view(),
                    errors: &errors,
                },
            );
            self.weights.apply_recurrent_delta(&delta)?;
        }

        Ok(TrialReport {
            phase: Phase::Recurrent,
            trial,
            mse: mean(sq_err, updates * n_plastic),
            updates,
        })
    }

    /// Fit `W_out` to the target over the readout window with `W_rec` frozen.
    pub fn train_readout(&mut self) -> Result<&[TrialReport], SimulationError> {
        if self.stage != (TrainingStage::ReadoutTraining { trial: 0 }) {
            return Err(self.invalid("start readout training"));
        }

        let window = self.timing.readout_window();
        let every = self.params.update_every;
        let n_units = self.weights.n_units();
        let n_outputs = self.weights.n_outputs();
        let mut rls = ReadoutRls::new(self.weights.w_out.clone(), self.params.readout_alpha);
        info!(trials = self.params.n_trials_readout, "Readout training started");

        for trial in 0..self.params.n_trials_readout {
            self.stage = TrainingStage::ReadoutTraining { trial };
            let id = TrialId {
                phase: Phase::Readout,
                trial,
            };
            let draw = self
                .integrator
                .draw_trial(&mut self.rng, n_units, &self.timing, self.params.noise_train);

            rls.sync(&self.weights.w_out);
            let target = self.target.series();
            let mut sq_err = 0.0;
            let mut updates = 0;
            self.integrator
                .run(&self.weights, self.stimulus.series().view(), draw, id, |t, state| {
                    if window.contains(&t) && (t - window.start) % every == 0 {
                        sq_err += rls.update(state.x_fr.view(), target.column(t));
                        updates += 1;
                    }
                })?;

            let delta: Array2<f64> = rls.w_out() - &self.weights.w_out;
            self.weights.apply_readout_delta(&delta)?;

            let report = TrialReport {
                phase: Phase::Readout,
                trial,
                mse: mean(sq_err, updates * n_outputs),
                updates,
            };
            debug!(trial, mse = report.mse, "Readout trial done");
            self.readout_reports.push(report);
        }

        self.stage = TrainingStage::Testing { trial: 0 };
        info!("Readout training finished");
        Ok(self.readout_reports.as_slice())
    }

    /// Run held-out trials with all weights fixed and report readout MSE.
    pub fn test(&mut self) -> Result<&TestReport, SimulationError> {
        if self.stage != (TrainingStage::Testing { trial: 0 }) {
            return Err(self.invalid("test"));
        }

        let window = self.timing.readout_window();
        let n_units = self.weights.n_units();
        let n_outputs = self.weights.n_outputs();
        let mut trials = Vec::with_capacity(self.params.n_trials_test);

        for trial in 0..self.params.n_trials_test {
            self.stage = TrainingStage::Testing { trial };
            let id = TrialId {
                phase: Phase::Test,
                trial,
            };
            let draw = self
                .integrator
                .draw_trial(&mut self.rng, n_units, &self.timing, self.params.noise_train);

            let w_out = &self.weights.w_out;
            let target = self.target.series();
            let mut sq_err = 0.0;
            let mut samples = 0;
            self.integrator
                .run(&self.weights, self.stimulus.series().view(), draw, id, |t, state| {
                    if window.contains(&t) {
                        let out = w_out.dot(&state.x_fr);
                        sq_err += (&out - &target.column(t)).mapv(|e| e * e).sum();
                        samples += 1;
                    }
                })?;

            let report = TrialReport {
                phase: Phase::Test,
                trial,
                mse: mean(sq_err, samples * n_outputs),
                updates: 0,
            };
            debug!(trial, mse = report.mse, "Test trial done");
            trials.push(report);
        }

        let mean_mse = if trials.is_empty() {
            None
        } else {
            Some(trials.iter().map(|r| r.mse).sum::<f64>() / trials.len() as f64)
        };
        info!(mean_mse = ?mean_mse, "Test finished");

        self.stage = TrainingStage::Trained;
        Ok(&*self.test_report.insert(TestReport { trials, mean_mse }))
    }

    /// Run every remaining stage and summarize.
    pub fn run(&mut self) -> Result<TrainingSummary, SimulationError> {
        if self.stage == TrainingStage::NotTrained {
            self.train_recurrent()?;
        }
        if matches!(self.stage, TrainingStage::ReadoutTraining { .. }) {
            self.train_readout()?;
        }
        if matches!(self.stage, TrainingStage::Testing { .. }) {
            self.test()?;
        }
        self.summary()
    }

    /// Summary of a finished run.
    pub fn summary(&self) -> Result<TrainingSummary, SimulationError> {
        let Some(test) = self.test_report.clone() else {
            return Err(self.invalid("summarize"));
        };
        Ok(TrainingSummary {
            seed: self.seed(),
            n_units: self.weights.n_units(),
            n_plastic: self.weights.n_plastic(),
            connections: self.weights.w_rec.nnz(),
            rule: self.rule.name().to_string(),
            recurrent: self.recurrent_reports.clone(),
            readout: self.readout_reports.clone(),
            test,
            weights_version: self.weights.version(),
        })
    }
}
