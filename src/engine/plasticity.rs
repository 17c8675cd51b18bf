//! Recurrent weight-update rules for plastic units.
//!
//! A rule sees, at one training step, the current firing rates and each
//! plastic unit's error against the innate trajectory, and answers with a
//! weight change restricted to plastic rows of `W_rec`. The trainer applies
//! that change through [`Weights::apply_recurrent_delta`] before the next
//! integration step.
//!
//! `RlsRule` is the default: recursive least squares on each plastic unit's
//! incoming synapses, one inverse-correlation matrix per unit.

use ndarray::ArrayView1;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::network::{CsrMatrix, RecurrentDelta, RowDelta, Weights};

/// What a rule sees at one update step.
#[derive(Debug, Clone, Copy)]
pub struct PlasticStep<'a> {
    /// Time step index within the trial.
    pub step: usize,
    /// Firing rates of all units after this step.
    pub firing_rate: ArrayView1<'a, f64>,
    /// `x_fr[i] - innate[i, step]` for each plastic unit `i`.
    pub errors: &'a [f64],
}

/// Pluggable update rule for the plastic rows of `W_rec`.
pub trait RecurrentRule: Send {
    fn name(&self) -> &'static str;

    /// Called once with the initial weights before the first training trial.
    fn prepare(&mut self, weights: &Weights);

    /// Weight change for this step. Rows outside the plastic set are rejected
    /// when the delta is applied.
    fn weight_delta(&mut self, w_rec: &CsrMatrix, step: &PlasticStep<'_>) -> RecurrentDelta;
}

/// Inverse correlation matrix for one plastic unit's presynaptic rates.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct UnitRls {
    /// Row-major `m x m`, `m` = number of presynaptic partners.
    p: Vec<f64>,
    m: usize,
}

impl UnitRls {
    fn new(m: usize, alpha: f64) -> Self {
        let mut p = vec![0.0; m * m];
        for i in 0..m {
            p[i * m + i] = 1.0 / alpha;
        }
        Self { p, m }
    }

    /// One RLS step for presynaptic rates `r` and error `e`; returns `dw`.
    fn update(&mut self, r: &[f64], e: f64) -> Vec<f64> {
        let m = self.m;
        let k: Vec<f64> = (0..m)
            .map(|i| {
                self.p[i * m..(i + 1) * m]
                    .iter()
                    .zip(r)
                    .map(|(p, r)| p * r)
                    .sum()
            })
            .collect();
        let r_p_r: f64 = r.iter().zip(&k).map(|(r, k)| r * k).sum();
        let c = 1.0 / (1.0 + r_p_r);

        for i in 0..m {
            let ck = c * k[i];
            for (p, kj) in self.p[i * m..(i + 1) * m].iter_mut().zip(&k) {
                *p -= ck * kj;
            }
        }
        k.iter().map(|k| -c * e * k).collect()
    }
}

/// Recursive least squares over each plastic unit's incoming synapses.
///
/// `P` starts at `I / alpha`; smaller `alpha` means faster initial learning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RlsRule {
    alpha: f64,
    units: Vec<UnitRls>,
}

impl RlsRule {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            units: Vec::new(),
        }
    }

    fn init_units(&mut self, w_rec: &CsrMatrix, n_plastic: usize) {
        self.units = (0..n_plastic)
            .map(|row| UnitRls::new(w_rec.row_indices(row).len(), self.alpha))
            .collect();
    }
}

impl Default for RlsRule {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl RecurrentRule for RlsRule {
    fn name(&self) -> &'static str {
        "rls"
    }

    fn prepare(&mut self, weights: &Weights) {
        self.init_units(&weights.w_rec, weights.n_plastic());
    }

    fn weight_delta(&mut self, w_rec: &CsrMatrix, step: &PlasticStep<'_>) -> RecurrentDelta {
        debug_assert_eq!(
            self.units.len(),
            step.errors.len(),
            "RlsRule::prepare must run before the first update"
        );

        let rates = step.firing_rate;
        let errors = step.errors;
        let rows = self
            .units
            .par_iter_mut()
            .enumerate()
            .filter(|(_, unit)| unit.m > 0)
            .map(|(row, unit)| {
                let r: Vec<f64> = w_rec.row_indices(row).iter().map(|&j| rates[j]).collect();
                RowDelta {
                    row,
                    values: unit.update(&r, errors[row]),
                }
            })
            .collect();
        RecurrentDelta { rows }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_unit_rls_matches_closed_form() {
        // One synapse: P = 1/alpha, k = P r, c = 1 / (1 + r k).
        let mut unit = UnitRls::new(1, 2.0);
        let dw = unit.update(&[0.5], 0.4);
        let k = 0.5 / 2.0;
        let c = 1.0 / (1.0 + 0.5 * k);
        assert!((dw[0] + c * 0.4 * k).abs() < 1e-15);
        assert!((unit.p[0] - (0.5 - c * k * k)).abs() < 1e-15);
    }

    #[test]
    fn test_rls_reduces_error_on_fixed_input() {
        // A unit reading fixed rates should learn to hit a fixed target.
        let dense = array![[0.0, 0.3, -0.2], [0.0, 0.0, 0.0], [0.0, 0.0, 0.0]];
        let mut w_rec = CsrMatrix::from_dense(&dense);
        let rates = array![0.1, 0.6, -0.4];
        let target = 0.5;
        let mut rule = RlsRule::new(1.0);
        rule.init_units(&w_rec, 1);

        let drive = |w: &CsrMatrix| w.mul_vec(rates.view())[0];
        let initial_err = (drive(&w_rec) - target).abs();
        for step in 0..100 {
            let errors = [drive(&w_rec) - target];
            let delta = rule.weight_delta(
                &w_rec,
                &PlasticStep {
                    step,
                    firing_rate: rates.view(),
                    errors: &errors,
                },
            );
            for rd in &delta.rows {
                for (w, dw) in w_rec.row_values_mut(rd.row).iter_mut().zip(&rd.values) {
                    *w += dw;
                }
            }
        }
        let final_err = (drive(&w_rec) - target).abs();
        assert!(final_err < initial_err * 0.05, "{initial_err} -> {final_err}");
    }

    #[test]
    fn test_delta_only_touches_plastic_rows() {
        let dense = array![[0.0, 0.3, 0.1], [0.2, 0.0, 0.4], [0.5, 0.6, 0.0]];
        let w_rec = CsrMatrix::from_dense(&dense);
        let rates = array![0.1, 0.2, 0.3];
        let mut rule = RlsRule::default();
        rule.init_units(&w_rec, 2);
        let delta = rule.weight_delta(
            &w_rec,
            &PlasticStep {
                step: 0,
                firing_rate: rates.view(),
                errors: &[0.1, -0.2],
            },
        );
        let rows: Vec<usize> = delta.rows.iter().map(|r| r.row).collect();
        assert_eq!(rows, vec![0, 1]);
        assert_eq!(delta.rows[0].values.len(), 2);
    }

    #[test]
    fn test_zero_error_gives_zero_delta() {
        let dense = array![[0.0, 0.3], [0.2, 0.0]];
        let w_rec = CsrMatrix::from_dense(&dense);
        let rates = array![0.5, -0.5];
        let mut rule = RlsRule::default();
        rule.init_units(&w_rec, 2);
        let delta = rule.weight_delta(
            &w_rec,
            &PlasticStep {
                step: 0,
                firing_rate: rates.view(),
                errors: &[0.0, 0.0],
            },
        );
        assert!(delta.rows.iter().all(|r| r.values.iter().all(|&v| v == 0.0)));
    }

    #[test]
    fn test_state_carries_across_updates() {
        let w_rec = CsrMatrix::from_dense(&array![[0.0, 0.3], [0.2, 0.0]]);
        let rates = array![0.5, -0.5];
        let mut rule = RlsRule::default();
        rule.init_units(&w_rec, 1);
        let step = PlasticStep {
            step: 0,
            firing_rate: rates.view(),
            errors: &[0.1],
        };
        let first = rule.weight_delta(&w_rec, &step);
        let second = rule.weight_delta(&w_rec, &step);
        // P shrinks after each update, so the same error moves the weights less.
        assert!(second.rows[0].values[0].abs() < first.rows[0].values[0].abs());
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "prepare")]
    fn test_update_before_prepare_panics_in_debug() {
        let w_rec = CsrMatrix::from_dense(&array![[0.0, 0.3], [0.2, 0.0]]);
        let rates = array![0.5, -0.5];
        let mut rule = RlsRule::default();
        rule.weight_delta(
            &w_rec,
            &PlasticStep {
                step: 0,
                firing_rate: rates.view(),
                errors: &[0.1, 0.1],
            },
        );
    }
}
