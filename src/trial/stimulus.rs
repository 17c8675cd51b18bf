//! Pulsed input waveform.

use ndarray::{s, Array2};
use serde::Serialize;

use crate::error::ConfigError;
use crate::trial::timing::TrialTiming;

/// Input series of shape `(n_units_in, n_steps)`.
///
/// Zero everywhere except channel 0, which holds `value` for samples
/// `[start, start + duration - 1)` where both bounds are the configured
/// times rounded to whole steps.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StimulusSeries {
    n_units_in: usize,
    value: f64,
    start_ms: f64,
    duration_ms: f64,
    pulse: (usize, usize),
    series: Array2<f64>,
}

impl StimulusSeries {
    pub fn new(
        timing: &TrialTiming,
        n_units_in: usize,
        value: f64,
        start_ms: f64,
        duration_ms: f64,
    ) -> Result<Self, ConfigError> {
        if n_units_in == 0 {
            return Err(ConfigError::NonPositive {
                name: "stimulus n_units",
                value: 0.0,
            });
        }
        if !value.is_finite() {
            return Err(ConfigError::OutOfRange {
                name: "stimulus value",
                value,
                range: "finite reals",
            });
        }
        if !(start_ms.is_finite() && start_ms >= 0.0) {
            return Err(ConfigError::OutOfRange {
                name: "stimulus start_ms",
                value: start_ms,
                range: "[0, inf)",
            });
        }
        if !(duration_ms.is_finite() && duration_ms >= 0.0) {
            return Err(ConfigError::OutOfRange {
                name: "stimulus duration_ms",
                value: duration_ms,
                range: "[0, inf)",
            });
        }

        let n_steps = timing.n_steps();
        let start = (start_ms / timing.time_step_ms()).round_ties_even() as usize;
        let samples = (duration_ms / timing.time_step_ms()).round_ties_even() as usize;
        let end = (start + samples).saturating_sub(1).max(start);
        if start >= n_steps || end > n_steps {
            return Err(ConfigError::WindowOutOfRange {
                what: "stimulus pulse",
                start,
                end,
                n_steps,
            });
        }

        let mut series = Array2::zeros((n_units_in, n_steps));
        series.slice_mut(s![0, start..end]).fill(value);

        Ok(Self {
            n_units_in,
            value,
            start_ms,
            duration_ms,
            pulse: (start, end),
            series,
        })
    }

    pub fn n_units(&self) -> usize {
        self.n_units_in
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn start_ms(&self) -> f64 {
        self.start_ms
    }

    pub fn duration_ms(&self) -> f64 {
        self.duration_ms
    }

    /// Half-open sample range `[start, end)` where channel 0 is on.
    pub fn pulse_window(&self) -> (usize, usize) {
        self.pulse
    }

    pub fn series(&self) -> &Array2<f64> {
        &self.series
    }
}
