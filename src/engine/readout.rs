//! Linear readout training by recursive least squares.

use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

/// RLS state for `W_out`: a working copy of the readout weights and one
/// shared inverse-correlation matrix over all unit rates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadoutRls {
    w_out: Array2<f64>,
    p: Array2<f64>,
}

impl ReadoutRls {
    /// Start from `w_out` with `P = I / alpha`.
    pub fn new(w_out: Array2<f64>, alpha: f64) -> Self {
        let n = w_out.ncols();
        let p = Array2::eye(n) / alpha;
        Self { w_out, p }
    }

    pub fn w_out(&self) -> &Array2<f64> {
        &self.w_out
    }

    /// Restart the working copy from `w_out`, keeping the learned `P`.
    pub fn sync(&mut self, w_out: &Array2<f64>) {
        self.w_out.assign(w_out);
    }

    /// Readout of `rates` under the working weights.
    pub fn output(&self, rates: ArrayView1<'_, f64>) -> Array1<f64> {
        self.w_out.dot(&rates)
    }

    /// One RLS step toward `target`; returns the squared error before the update.
    pub fn update(&mut self, rates: ArrayView1<'_, f64>, target: ArrayView1<'_, f64>) -> f64 {
        let error = self.output(rates) - target;
        let k = self.p.dot(&rates);
        let c = 1.0 / (1.0 + rates.dot(&k));

        for ((i, j), p) in self.p.indexed_iter_mut() {
            *p -= c * k[i] * k[j];
        }
        for ((o, j), w) in self.w_out.indexed_iter_mut() {
            *w -= c * error[o] * k[j];
        }
        error.mapv(|e| e * e).sum()
    }
}
