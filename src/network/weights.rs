//! Random weight initialization and the single write path for training.

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SimulationError;
use crate::network::sparse::CsrMatrix;
use crate::network::spec::NetworkSpec;
use crate::rng::RandomStream;

/// Change to the stored entries of one recurrent row.
///
/// `values[k]` is added to the `k`-th stored synapse of `row`, in the order
/// given by [`CsrMatrix::row_indices`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowDelta {
    pub row: usize,
    pub values: Vec<f64>,
}

/// Weight change for a set of plastic rows, produced by a training rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecurrentDelta {
    pub rows: Vec<RowDelta>,
}

impl RecurrentDelta {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Recurrent, input and output weights of one network instance.
///
/// `version` increases every time a training delta is applied, so callers
/// holding a snapshot can tell whether the weights moved underneath them.
///
/// Loading checks that the three matrices agree on `n_units`, that `W_rec`
/// has no self-connections and that `n_plastic <= n_units`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WeightsParts")]
pub struct Weights {
    /// Recurrent weights, `n_units x n_units`, zero diagonal.
    pub w_rec: CsrMatrix,
    /// Input weights, `n_units x n_inputs`.
    pub w_in: Array2<f64>,
    /// Readout weights, `n_outputs x n_units`.
    pub w_out: Array2<f64>,
    n_plastic: usize,
    version: u64,
}

#[derive(Deserialize)]
struct WeightsParts {
    w_rec: CsrMatrix,
    w_in: Array2<f64>,
    w_out: Array2<f64>,
    n_plastic: usize,
    version: u64,
}

impl TryFrom<WeightsParts> for Weights {
    type Error = SimulationError;

    fn try_from(p: WeightsParts) -> Result<Self, Self::Error> {
        let (rows, cols) = p.w_rec.shape();
        if rows != cols {
            return Err(SimulationError::ShapeMismatch {
                what: "recurrent weights",
                expected: (rows, rows),
                actual: (rows, cols),
            });
        }
        if p.w_in.nrows() != rows {
            return Err(SimulationError::ShapeMismatch {
                what: "input weights",
                expected: (rows, p.w_in.ncols()),
                actual: p.w_in.dim(),
            });
        }
        if p.w_out.ncols() != rows {
            return Err(SimulationError::ShapeMismatch {
                what: "readout weights",
                expected: (p.w_out.nrows(), rows),
                actual: p.w_out.dim(),
            });
        }
        if !p.w_rec.has_zero_diagonal() {
            return Err(SimulationError::InvalidWeights(
                "recurrent weights contain a self-connection".into(),
            ));
        }
        if p.n_plastic > rows {
            return Err(SimulationError::InvalidWeights(format!(
                "n_plastic {} exceeds {rows} units",
                p.n_plastic
            )));
        }
        Ok(Self {
            w_rec: p.w_rec,
            w_in: p.w_in,
            w_out: p.w_out,
            n_plastic: p.n_plastic,
            version: p.version,
        })
    }
}

/// Draw the initial weights for `spec`.
///
/// Draw order (part of the reproducibility contract): recurrent mask,
/// recurrent values, input weights, output weights.
pub fn initialize_weights(
    spec: &NetworkSpec,
    n_inputs: usize,
    n_outputs: usize,
    rng: &mut RandomStream,
) -> Weights {
    let n = spec.n_units();

    let mask = rng.uniform(n, n);
    let mut w_rec = rng.normal(spec.scale_recurr(), n, n);
    w_rec.zip_mut_with(&mask, |w, &m| {
        if m > spec.p_connect() {
            *w = 0.0;
        }
    });
    w_rec.diag_mut().fill(0.0);
    let w_rec = CsrMatrix::from_dense(&w_rec);

    let w_in = rng.normal(1.0, n, n_inputs);
    let w_out = rng.normal(1.0 / (n as f64).sqrt(), n_outputs, n);

    debug!(
        n_units = n,
        connections = w_rec.nnz(),
        n_plastic = spec.n_plastic(),
        "Initialized network weights"
    );

    Weights {
        w_rec,
        w_in,
        w_out,
        n_plastic: spec.n_plastic(),
        version: 0,
    }
}

impl Weights {
    pub fn n_units(&self) -> usize {
        self.w_rec.shape().0
    }

    pub fn n_inputs(&self) -> usize {
        self.w_in.ncols()
    }

    pub fn n_outputs(&self) -> usize {
        self.w_out.nrows()
    }

    /// Plastic units are `0..n_plastic`.
    pub fn n_plastic(&self) -> usize {
        self.n_plastic
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Add a training delta to the plastic rows of `w_rec`.
    ///
    /// The whole delta is checked before anything is written, so a rejected
    /// delta leaves the weights untouched.
    pub fn apply_recurrent_delta(&mut self, delta: &RecurrentDelta) -> Result<(), SimulationError> {
        for rd in &delta.rows {
            if rd.row >= self.n_plastic {
                return Err(SimulationError::NonPlasticRow {
                    row: rd.row,
                    n_plastic: self.n_plastic,
                });
            }
            let stored = self.w_rec.row_indices(rd.row).len();
            if rd.values.len() != stored {
                return Err(SimulationError::DeltaLength {
                    row: rd.row,
                    expected: stored,
                    actual: rd.values.len(),
                });
            }
        }

        for rd in &delta.rows {
            for (w, dw) in self.w_rec.row_values_mut(rd.row).iter_mut().zip(&rd.values) {
                *w += dw;
            }
        }
        self.version += 1;
        Ok(())
    }

    /// Add a delta of shape `n_outputs x n_units` to the readout weights.
    pub fn apply_readout_delta(&mut self, delta: &Array2<f64>) -> Result<(), SimulationError> {
        if delta.dim() != self.w_out.dim() {
            return Err(SimulationError::ShapeMismatch {
                what: "readout delta",
                expected: self.w_out.dim(),
                actual: delta.dim(),
            });
        }
        self.w_out += delta;
        self.version += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(n: usize, p: f64) -> NetworkSpec {
        NetworkSpec::new(n, p, 1.5, 0.3).unwrap()
    }

    #[test]
    fn test_shapes() {
        let mut rng = RandomStream::new(1234);
        let w = initialize_weights(&spec(50, 0.2), 2, 3, &mut rng);
        assert_eq!(w.w_rec.shape(), (50, 50));
        assert_eq!(w.w_in.dim(), (50, 2));
        assert_eq!(w.w_out.dim(), (3, 50));
        assert_eq!(w.n_plastic(), 15);
        assert_eq!(w.version(), 0);
    }

    #[test]
    fn test_zero_diagonal_for_all_sizes() {
        let mut rng = RandomStream::new(5);
        for n in [1, 2, 7, 40] {
            let w = initialize_weights(&spec(n, 1.0), 1, 1, &mut rng);
            assert!(w.w_rec.has_zero_diagonal(), "n = {n}");
        }
    }

    #[test]
    fn test_density_converges_to_p_connect() {
        let mut rng = RandomStream::new(99);
        let n = 600;
        let w = initialize_weights(&spec(n, 0.1), 1, 1, &mut rng);
        let density = w.w_rec.nnz() as f64 / (n * (n - 1)) as f64;
        assert!((density - 0.1).abs() < 0.005, "density {density}");
    }

    #[test]
    fn test_deterministic_for_seed() {
        let a = initialize_weights(&spec(30, 0.3), 1, 1, &mut RandomStream::new(42));
        let b = initialize_weights(&spec(30, 0.3), 1, 1, &mut RandomStream::new(42));
        let c = initialize_weights(&spec(30, 0.3), 1, 1, &mut RandomStream::new(43));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_draw_order() {
        // Reproduce the draws by hand from an identically seeded stream.
        let s = spec(8, 0.5);
        let w = initialize_weights(&s, 2, 1, &mut RandomStream::new(11));

        let mut rng = RandomStream::new(11);
        let mask = rng.uniform(8, 8);
        let vals = rng.normal(s.scale_recurr(), 8, 8);
        let w_in = rng.normal(1.0, 8, 2);
        let w_out = rng.normal(1.0 / 8.0_f64.sqrt(), 1, 8);

        for i in 0..8 {
            for j in 0..8 {
                let expected = if i != j && mask[[i, j]] <= 0.5 { vals[[i, j]] } else { 0.0 };
                assert_eq!(w.w_rec.get(i, j), expected);
            }
        }
        assert_eq!(w.w_in, w_in);
        assert_eq!(w.w_out, w_out);
    }

    #[test]
    fn test_deserialize_checks_invariants() {
        let w = initialize_weights(&spec(10, 0.5), 1, 1, &mut RandomStream::new(8));
        let json = serde_json::to_value(&w).unwrap();
        let back: Weights = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(back, w);

        let mut too_many_plastic = json.clone();
        too_many_plastic["n_plastic"] = serde_json::json!(11);
        let err = serde_json::from_value::<Weights>(too_many_plastic).unwrap_err();
        assert!(err.to_string().contains("n_plastic"), "{err}");

        let mut bad_readout = json;
        bad_readout["w_out"] = serde_json::to_value(Array2::<f64>::zeros((1, 4))).unwrap();
        assert!(serde_json::from_value::<Weights>(bad_readout).is_err());
    }

    #[test]
    fn test_apply_recurrent_delta() {
        let mut w = initialize_weights(&spec(20, 0.5), 1, 1, &mut RandomStream::new(3));
        let row = 0;
        let before = w.w_rec.row_values(row).to_vec();
        let delta = RecurrentDelta {
            rows: vec![RowDelta {
                row,
                values: vec![0.25; before.len()],
            }],
        };
        w.apply_recurrent_delta(&delta).unwrap();
        for (a, b) in before.iter().zip(w.w_rec.row_values(row)) {
            assert!((b - a - 0.25).abs() < 1e-12);
        }
        assert_eq!(w.version(), 1);
    }

    #[test]
    fn test_rejects_non_plastic_row() {
        let mut w = initialize_weights(&spec(20, 0.5), 1, 1, &mut RandomStream::new(3));
        let snapshot = w.clone();
        let row = w.n_plastic();
        let delta = RecurrentDelta {
            rows: vec![
                RowDelta {
                    row: 0,
                    values: vec![1.0; w.w_rec.row_indices(0).len()],
                },
                RowDelta {
                    row,
                    values: vec![1.0; w.w_rec.row_indices(row).len()],
                },
            ],
        };
        let err = w.apply_recurrent_delta(&delta).unwrap_err();
        assert!(matches!(err, SimulationError::NonPlasticRow { .. }));
        assert_eq!(w, snapshot);
    }

    #[test]
    fn test_rejects_wrong_length_and_shape() {
        let mut w = initialize_weights(&spec(20, 0.5), 1, 2, &mut RandomStream::new(3));
        let delta = RecurrentDelta {
            rows: vec![RowDelta {
                row: 0,
                values: vec![0.0; w.w_rec.row_indices(0).len() + 1],
            }],
        };
        assert!(matches!(
            w.apply_recurrent_delta(&delta),
            Err(SimulationError::DeltaLength { .. })
        ));
        assert!(w.apply_readout_delta(&Array2::zeros((1, 20))).is_err());
        assert!(w.apply_readout_delta(&Array2::zeros((2, 20))).is_ok());
    }
}
