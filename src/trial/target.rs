//! Gaussian-bump target output waveform.

use ndarray::{Array1, Array2};
use serde::Serialize;
use statrs::distribution::{Continuous, Normal};

use crate::error::ConfigError;
use crate::trial::timing::TrialTiming;

/// Desired output series of shape `(n_units_out, n_steps)`.
///
/// A normal density over the time axis, scaled so its peak is 1, then mapped
/// affinely from `[0, 1]` onto `[baseline_val, value]`. Every output channel
/// carries the same waveform.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetSeries {
    n_units_out: usize,
    value: f64,
    center_ms: f64,
    width_ms: f64,
    baseline_val: f64,
    series: Array2<f64>,
}

/// Peak-normalized normal density sampled on `time_ms`.
fn normalized_bell(time_ms: &[f64], center_ms: f64, width_ms: f64) -> Result<Array1<f64>, ConfigError> {
    let density = Normal::new(center_ms, width_ms).map_err(|_| ConfigError::NonPositive {
        name: "target width_ms",
        value: width_ms,
    })?;
    let bell: Array1<f64> = time_ms.iter().map(|&t| density.pdf(t)).collect();
    let peak = bell.fold(0.0_f64, |m, &v| m.max(v));
    if !(peak.is_finite() && peak > 0.0) {
        return Err(ConfigError::OutOfRange {
            name: "target width_ms",
            value: width_ms,
            range: "widths resolvable at the trial's time step",
        });
    }
    Ok(bell / peak)
}

impl TargetSeries {
    pub fn new(
        timing: &TrialTiming,
        n_units_out: usize,
        value: f64,
        center_ms: f64,
        width_ms: f64,
        baseline_val: f64,
    ) -> Result<Self, ConfigError> {
        if n_units_out == 0 {
            return Err(ConfigError::NonPositive {
                name: "target n_units",
                value: 0.0,
            });
        }
        if !(width_ms.is_finite() && width_ms > 0.0) {
            return Err(ConfigError::NonPositive {
                name: "target width_ms",
                value: width_ms,
            });
        }
        if !(center_ms.is_finite() && center_ms >= 0.0 && center_ms < timing.max_ms()) {
            return Err(ConfigError::OutOfRange {
                name: "target center_ms",
                value: center_ms,
                range: "[0, max_ms)",
            });
        }
        if !(value.is_finite() && baseline_val.is_finite()) {
            return Err(ConfigError::OutOfRange {
                name: "target value",
                value: if value.is_finite() { baseline_val } else { value },
                range: "finite reals",
            });
        }

        let bell = normalized_bell(&timing.time_ms(), center_ms, width_ms)?;
        let row = bell * (value - baseline_val) + baseline_val;

        let mut series = Array2::zeros((n_units_out, timing.n_steps()));
        for mut channel in series.rows_mut() {
            channel.assign(&row);
        }

        Ok(Self {
            n_units_out,
            value,
            center_ms,
            width_ms,
            baseline_val,
            series,
        })
    }

    pub fn n_units(&self) -> usize {
        self.n_units_out
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn center_ms(&self) -> f64 {
        self.center_ms
    }

    pub fn width_ms(&self) -> f64 {
        self.width_ms
    }

    pub fn baseline_val(&self) -> f64 {
        self.baseline_val
    }

    pub fn series(&self) -> &Array2<f64> {
        &self.series
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timing() -> TrialTiming {
        TrialTiming::new(1000.0, 1.0, 1.0, 100.0, 800.0).unwrap()
    }

    #[test]
    fn test_bell_peak_is_one() {
        let bell = normalized_bell(&timing().time_ms(), 400.0, 30.0).unwrap();
        let peak = bell.fold(f64::MIN, |m, &v| m.max(v));
        assert_eq!(peak, 1.0);
        assert_eq!(bell[400], 1.0);
    }

    #[test]
    fn test_peak_and_baseline() {
        let target = TargetSeries::new(&timing(), 1, 2.0, 400.0, 30.0, -0.5).unwrap();
        let series = target.series();
        let max = series.fold(f64::MIN, |m, &v| m.max(v));
        assert!((max - 2.0).abs() < 1e-12);
        assert!((series[[0, 400]] - 2.0).abs() < 1e-12);
        assert!((series[[0, 0]] + 0.5).abs() < 1e-9);
        assert!((series[[0, 999]] + 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_channels_identical() {
        let target = TargetSeries::new(&timing(), 3, 1.0, 250.0, 50.0, 0.0).unwrap();
        let series = target.series();
        assert_eq!(series.dim(), (3, 1000));
        assert_eq!(series.row(0), series.row(2));
    }

    #[test]
    fn test_peak_off_grid_still_normalized() {
        let target = TargetSeries::new(&timing(), 1, 1.0, 400.5, 10.0, 0.0).unwrap();
        let max = target.series().fold(f64::MIN, |m, &v| m.max(v));
        assert!((max - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_bad_target() {
        assert!(TargetSeries::new(&timing(), 1, 1.0, 400.0, 0.0, 0.0).is_err());
        assert!(TargetSeries::new(&timing(), 1, 1.0, 1000.0, 10.0, 0.0).is_err());
        assert!(TargetSeries::new(&timing(), 1, 1.0, -1.0, 10.0, 0.0).is_err());
        assert!(TargetSeries::new(&timing(), 0, 1.0, 400.0, 10.0, 0.0).is_err());
        assert!(TargetSeries::new(&timing(), 1, 1.0, 400.5, 1e-4, 0.0).is_err());
    }
}
