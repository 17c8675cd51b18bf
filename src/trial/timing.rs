//! Temporal structure of a trial: duration, step size and training window.

use std::ops::Range;

use serde::Serialize;

use crate::error::ConfigError;

/// Extra time recurrent training continues past the end of the readout window.
pub const EXTRA_TRAIN_MS: f64 = 150.0;
/// Trailing time simulated after the end of the training window.
pub const EXTRA_END_MS: f64 = 200.0;
/// Approximate number of samples a plot of one trial should show.
pub const PLOT_POINTS: usize = 500;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrialTiming {
    length_ms: f64,
    spacing: f64,
    time_step_ms: f64,
    start_train_ms: f64,
    end_train_ms: f64,

    start_train_n: usize,
    end_train_n: usize,
    extra_train_n: usize,
    max_ms: f64,
    n_steps: usize,
    plot_skip: usize,
}

fn check_positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NonPositive { name, value })
    }
}

impl TrialTiming {
    pub fn new(
        length_ms: f64,
        spacing: f64,
        time_step_ms: f64,
        start_train_ms: f64,
        end_train_ms: f64,
    ) -> Result<Self, ConfigError> {
        check_positive("length_ms", length_ms)?;
        check_positive("spacing", spacing)?;
        check_positive("time_step_ms", time_step_ms)?;
        check_positive("start_train_ms", start_train_ms)?;
        check_positive("end_train_ms", end_train_ms)?;
        if end_train_ms <= start_train_ms {
            return Err(ConfigError::EmptyTrainingWindow {
                start_ms: start_train_ms,
                end_ms: end_train_ms,
            });
        }

        let max_ms = end_train_ms + EXTRA_END_MS;
        let n_steps = (max_ms / time_step_ms).floor() as usize;
        if n_steps == 0 {
            return Err(ConfigError::NoSteps {
                max_ms,
                time_step_ms,
            });
        }

        let mut plot_skip = n_steps.div_ceil(PLOT_POINTS);
        if plot_skip % 2 == 0 {
            plot_skip += 1;
        }

        Ok(Self {
            length_ms,
            spacing,
            time_step_ms,
            start_train_ms,
            end_train_ms,
            start_train_n: (start_train_ms / time_step_ms).round_ties_even() as usize,
            end_train_n: (end_train_ms / time_step_ms).round_ties_even() as usize,
            extra_train_n: (EXTRA_TRAIN_MS / time_step_ms).round_ties_even() as usize,
            max_ms,
            n_steps,
            plot_skip,
        })
    }

    pub fn length_ms(&self) -> f64 {
        self.length_ms
    }

    pub fn spacing(&self) -> f64 {
        self.spacing
    }

    pub fn time_step_ms(&self) -> f64 {
        self.time_step_ms
    }

    pub fn start_train_ms(&self) -> f64 {
        self.start_train_ms
    }

    pub fn end_train_ms(&self) -> f64 {
        self.end_train_ms
    }

    pub fn start_train_n(&self) -> usize {
        self.start_train_n
    }

    pub fn end_train_n(&self) -> usize {
        self.end_train_n
    }

    /// Simulated duration: end of training plus the trailing margin.
    pub fn max_ms(&self) -> f64 {
        self.max_ms
    }

    pub fn n_steps(&self) -> usize {
        self.n_steps
    }

    /// Odd decimation factor that keeps plots near `PLOT_POINTS` samples.
    pub fn plot_skip(&self) -> usize {
        self.plot_skip
    }

    /// Sample times `k * time_step_ms` for `k in 0..n_steps`.
    pub fn time_ms(&self) -> Vec<f64> {
        (0..self.n_steps)
            .map(|k| k as f64 * self.time_step_ms)
            .collect()
    }

    /// Steps over which the readout is fit and evaluated.
    pub fn readout_window(&self) -> Range<usize> {
        self.start_train_n.min(self.n_steps)..self.end_train_n.min(self.n_steps)
    }

    /// Steps over which recurrent weights track the innate trajectory.
    ///
    /// Extends `EXTRA_TRAIN_MS` past the readout window so activity stays on
    /// the trained trajectory after the readout stops reading it.
    pub fn recurrent_window(&self) -> Range<usize> {
        let end = (self.end_train_n + self.extra_train_n).min(self.n_steps);
        self.start_train_n.min(self.n_steps)..end
    }
}
