//! Explicit Euler integration of the leaky rate dynamics.
//!
//! ```text
//! x_lvl <- x_lvl + (-x_lvl + W_rec . x_fr + W_in . u[:, t] + noise[:, t]) / time_div
//! x_fr  <- sigmoid(x_lvl)
//! ```
//!
//! `time_div = tau_ms / time_step_ms`. There is no adaptive stepping; the
//! scheme stays stable as long as `time_div` is well above one.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

use crate::engine::activation::Activation;
use crate::error::{ConfigError, Phase, SimulationError};
use crate::network::Weights;
use crate::rng::RandomStream;
use crate::trial::TrialTiming;

/// Firing rates of every unit at every step, shape `(n_units, n_steps)`.
pub type Trajectory = Array2<f64>;

/// Which trial of which phase a step belongs to, for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrialId {
    pub phase: Phase,
    pub trial: usize,
}

/// Activation level and firing rate of every unit during one trial.
#[derive(Debug, Clone)]
pub struct TrialState {
    pub x_lvl: Array1<f64>,
    pub x_fr: Array1<f64>,
    drive: Array1<f64>,
}

impl TrialState {
    /// State with the given activation levels; rates are derived from them.
    pub fn from_levels(x_lvl: Array1<f64>, activation: Activation) -> Self {
        let x_fr = x_lvl.mapv(|x| activation.apply(x));
        let drive = Array1::zeros(x_lvl.len());
        Self { x_lvl, x_fr, drive }
    }
}

/// Per-trial random inputs: the noise for every step and the initial state.
#[derive(Debug, Clone)]
pub struct TrialDraw {
    pub noise: Array2<f64>,
    pub state: TrialState,
}

/// Stepper shared by harvesting, training and testing.
#[derive(Debug, Clone, Copy)]
pub struct Integrator {
    time_div: f64,
    activation: Activation,
}

impl Integrator {
    pub fn new(tau_ms: f64, timing: &TrialTiming, activation: Activation) -> Result<Self, ConfigError> {
        if !(tau_ms.is_finite() && tau_ms > 0.0) {
            return Err(ConfigError::NonPositive {
                name: "tau_ms",
                value: tau_ms,
            });
        }
        Ok(Self {
            time_div: tau_ms / timing.time_step_ms(),
            activation,
        })
    }

    pub fn time_div(&self) -> f64 {
        self.time_div
    }

    pub fn activation(&self) -> Activation {
        self.activation
    }

    /// Draw one trial's noise and initial condition, in that order.
    ///
    /// Noise is a discretized Wiener increment, `noise_scale * N(0, dt)`;
    /// initial levels are uniform on [-1, 1).
    pub fn draw_trial(
        &self,
        rng: &mut RandomStream,
        n_units: usize,
        timing: &TrialTiming,
        noise_scale: f64,
    ) -> TrialDraw {
        let mut noise = rng.normal(timing.time_step_ms().sqrt(), n_units, timing.n_steps());
        noise *= noise_scale;
        let x_lvl = rng.uniform(n_units, 1).column(0).mapv(|u| 2.0 * u - 1.0);
        TrialDraw {
            noise,
            state: TrialState::from_levels(x_lvl, self.activation),
        }
    }

    /// Check that `stimulus` matches the network inputs and the trial length.
    pub fn check_stimulus(
        weights: &Weights,
        stimulus: ArrayView2<'_, f64>,
        timing: &TrialTiming,
    ) -> Result<(), SimulationError> {
        let expected = (weights.n_inputs(), timing.n_steps());
        if stimulus.dim() != expected {
            return Err(SimulationError::ShapeMismatch {
                what: "stimulus series",
                expected,
                actual: stimulus.dim(),
            });
        }
        Ok(())
    }

    /// Advance `state` by one time step.
    pub fn step(
        &self,
        state: &mut TrialState,
        weights: &Weights,
        input: ArrayView1<'_, f64>,
        noise: ArrayView1<'_, f64>,
        id: TrialId,
        t: usize,
    ) -> Result<(), SimulationError> {
        weights.w_rec.mul_vec_into(state.x_fr.view(), &mut state.drive);
        state.drive += &weights.w_in.dot(&input);
        state.drive += &noise;

        let time_div = self.time_div;
        let activation = self.activation;
        for ((lvl, fr), &drive) in state
            .x_lvl
            .iter_mut()
            .zip(state.x_fr.iter_mut())
            .zip(state.drive.iter())
        {
            *lvl += (drive - *lvl) / time_div;
            *fr = activation.apply(*lvl);
        }

        let bad = state
            .x_lvl
            .iter()
            .zip(state.x_fr.iter())
            .position(|(l, f)| !(l.is_finite() && f.is_finite()));
        match bad {
            Some(unit) => Err(SimulationError::NonFinite {
                phase: id.phase,
                trial: id.trial,
                step: t,
                unit,
            }),
            None => Ok(()),
        }
    }

    /// Integrate a whole trial with fixed weights.
    ///
    /// `on_step` sees the state after every step. Returns the final state.
    pub fn run<F>(
        &self,
        weights: &Weights,
        stimulus: ArrayView2<'_, f64>,
        draw: TrialDraw,
        id: TrialId,
        mut on_step: F,
    ) -> Result<TrialState, SimulationError>
    where
        F: FnMut(usize, &TrialState),
    {
        let TrialDraw { noise, mut state } = draw;
        for t in 0..noise.ncols() {
            self.step(&mut state, weights, stimulus.column(t), noise.column(t), id, t)?;
            on_step(t, &state);
        }
        Ok(state)
    }

    /// Integrate a whole trial and record `x_fr` after every step.
    pub fn record(
        &self,
        weights: &Weights,
        stimulus: ArrayView2<'_, f64>,
        draw: TrialDraw,
        id: TrialId,
    ) -> Result<Trajectory, SimulationError> {
        let mut trajectory = Array2::zeros(draw.noise.dim());
        self.run(weights, stimulus, draw, id, |t, state| {
            trajectory.column_mut(t).assign(&state.x_fr);
        })?;
        Ok(trajectory)
    }
}
