//! Compressed sparse row storage for the recurrent weight matrix.
//!
//! Row `i` holds the synapses arriving at unit `i`: `col_index[row_offset[i]..row_offset[i + 1]]`
//! are the presynaptic units and `values` over the same range their weights.
//! Training only ever rewrites stored values, so the sparsity pattern chosen
//! at initialization is kept for the life of the matrix.
//!
//! Deserialization goes through [`CsrMatrix::from_parts`], so a stored matrix
//! with broken offsets or out-of-range columns is rejected on load.

use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::error::SimulationError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CsrParts")]
pub struct CsrMatrix {
    rows: usize,
    cols: usize,
    row_offset: Vec<usize>,
    col_index: Vec<usize>,
    values: Vec<f64>,
}

/// Unchecked wire form of [`CsrMatrix`].
#[derive(Deserialize)]
struct CsrParts {
    rows: usize,
    cols: usize,
    row_offset: Vec<usize>,
    col_index: Vec<usize>,
    values: Vec<f64>,
}

impl TryFrom<CsrParts> for CsrMatrix {
    type Error = SimulationError;

    fn try_from(p: CsrParts) -> Result<Self, Self::Error> {
        Self::from_parts(p.rows, p.cols, p.row_offset, p.col_index, p.values)
    }
}

impl CsrMatrix {
    /// Assemble from raw CSR arrays, checking the layout.
    pub fn from_parts(
        rows: usize,
        cols: usize,
        row_offset: Vec<usize>,
        col_index: Vec<usize>,
        values: Vec<f64>,
    ) -> Result<Self, SimulationError> {
        let invalid = |msg: String| Err(SimulationError::InvalidWeights(msg));

        if row_offset.len() != rows + 1 {
            return invalid(format!(
                "row_offset has {} entries, expected {}",
                row_offset.len(),
                rows + 1
            ));
        }
        if row_offset[0] != 0 {
            return invalid(format!("row_offset starts at {}, expected 0", row_offset[0]));
        }
        if let Some(row) = row_offset.windows(2).position(|w| w[0] > w[1]) {
            return invalid(format!("row_offset decreases at row {row}"));
        }
        if col_index.len() != values.len() || row_offset[rows] != values.len() {
            return invalid(format!(
                "row_offset ends at {} with {} column indices and {} values",
                row_offset[rows],
                col_index.len(),
                values.len()
            ));
        }
        if let Some(&col) = col_index.iter().find(|&&j| j >= cols) {
            return invalid(format!("column index {col} out of range for {cols} columns"));
        }

        Ok(Self {
            rows,
            cols,
            row_offset,
            col_index,
            values,
        })
    }

    /// Build from a dense matrix, keeping entries that are not exactly zero.
    pub fn from_dense(dense: &Array2<f64>) -> Self {
        let (rows, cols) = dense.dim();
        let mut row_offset = Vec::with_capacity(rows + 1);
        let mut col_index = Vec::new();
        let mut values = Vec::new();

        row_offset.push(0);
        for row in dense.rows() {
            for (j, &v) in row.iter().enumerate() {
                if v != 0.0 {
                    col_index.push(j);
                    values.push(v);
                }
            }
            row_offset.push(values.len());
        }

        Self {
            rows,
            cols,
            row_offset,
            col_index,
            values,
        }
    }

    /// Dense copy, for small-`n` inspection and tests.
    pub fn to_dense(&self) -> Array2<f64> {
        let mut dense = Array2::zeros((self.rows, self.cols));
        for i in 0..self.rows {
            for (&j, &v) in self.row_indices(i).iter().zip(self.row_values(i)) {
                dense[[i, j]] = v;
            }
        }
        dense
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Column indices (presynaptic units) stored in `row`.
    #[inline]
    pub fn row_indices(&self, row: usize) -> &[usize] {
        &self.col_index[self.row_offset[row]..self.row_offset[row + 1]]
    }

    #[inline]
    pub fn row_values(&self, row: usize) -> &[f64] {
        &self.values[self.row_offset[row]..self.row_offset[row + 1]]
    }

    #[inline]
    pub fn row_values_mut(&mut self, row: usize) -> &mut [f64] {
        &mut self.values[self.row_offset[row]..self.row_offset[row + 1]]
    }

    /// Value at `(row, col)`, zero when the entry is not stored.
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.row_indices(row)
            .iter()
            .position(|&j| j == col)
            .map_or(0.0, |k| self.row_values(row)[k])
    }

    /// True when no diagonal entry is stored.
    pub fn has_zero_diagonal(&self) -> bool {
        (0..self.rows.min(self.cols)).all(|i| !self.row_indices(i).contains(&i))
    }

    /// `self · x` written into `out`.
    pub fn mul_vec_into(&self, x: ArrayView1<'_, f64>, out: &mut Array1<f64>) {
        debug_assert_eq!(x.len(), self.cols);
        debug_assert_eq!(out.len(), self.rows);
        for (i, o) in out.iter_mut().enumerate() {
            *o = self
                .row_indices(i)
                .iter()
                .zip(self.row_values(i))
                .map(|(&j, &w)| w * x[j])
                .sum();
        }
    }

    pub fn mul_vec(&self, x: ArrayView1<'_, f64>) -> Array1<f64> {
        let mut out = Array1::zeros(self.rows);
        self.mul_vec_into(x, &mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_dense_round_trip_keeps_pattern() {
        let dense = array![[0.0, 1.5, 0.0], [2.0, 0.0, -1.0], [0.0, 0.0, 0.0]];
        let csr = CsrMatrix::from_dense(&dense);
        assert_eq!(csr.nnz(), 3);
        assert_eq!(csr.row_indices(1), &[0, 2]);
        assert!(csr.row_indices(2).is_empty());
        assert_eq!(csr.to_dense(), dense);
        assert_eq!(csr.get(1, 2), -1.0);
        assert_eq!(csr.get(0, 0), 0.0);
    }

    #[test]
    fn test_mul_vec_matches_dense() {
        let dense = array![[0.0, 1.5, 0.0], [2.0, 0.0, -1.0], [0.5, 0.0, 0.0]];
        let csr = CsrMatrix::from_dense(&dense);
        let x = array![1.0, -2.0, 3.0];
        assert_eq!(csr.mul_vec(x.view()), dense.dot(&x));
    }

    #[test]
    fn test_zero_diagonal_detection() {
        let with_diag = CsrMatrix::from_dense(&array![[1.0, 0.0], [0.0, 0.0]]);
        let without = CsrMatrix::from_dense(&array![[0.0, 1.0], [1.0, 0.0]]);
        assert!(!with_diag.has_zero_diagonal());
        assert!(without.has_zero_diagonal());
    }

    #[test]
    fn test_from_parts_checks_layout() {
        let ok = CsrMatrix::from_parts(2, 2, vec![0, 1, 2], vec![1, 0], vec![0.5, -0.5]).unwrap();
        assert_eq!(ok, CsrMatrix::from_dense(&array![[0.0, 0.5], [-0.5, 0.0]]));

        let bad = [
            CsrMatrix::from_parts(2, 2, vec![0, 1], vec![1], vec![0.5]),
            CsrMatrix::from_parts(2, 2, vec![1, 1, 2], vec![1, 0], vec![0.5, 0.5]),
            CsrMatrix::from_parts(2, 2, vec![0, 2, 1], vec![1, 0], vec![0.5, 0.5]),
            CsrMatrix::from_parts(2, 2, vec![0, 1, 3], vec![1, 0], vec![0.5, 0.5]),
            CsrMatrix::from_parts(2, 2, vec![0, 1, 2], vec![1, 7], vec![0.5, 0.5]),
        ];
        for result in bad {
            assert!(matches!(result, Err(SimulationError::InvalidWeights(_))));
        }
    }

    #[test]
    fn test_deserialize_rejects_bad_offsets() {
        let csr = CsrMatrix::from_dense(&array![[0.0, 1.0], [2.0, 0.0]]);
        let json = serde_json::to_string(&csr).unwrap();
        let back: CsrMatrix = serde_json::from_str(&json).unwrap();
        assert_eq!(back, csr);

        let broken = r#"{"rows":2,"cols":2,"row_offset":[0,5,2],"col_index":[1,0],"values":[1.0,2.0]}"#;
        let err = serde_json::from_str::<CsrMatrix>(broken).unwrap_err();
        assert!(err.to_string().contains("row_offset"), "{err}");
    }

    #[test]
    fn test_row_values_mut_updates_in_place() {
        let mut csr = CsrMatrix::from_dense(&array![[0.0, 1.0], [2.0, 0.0]]);
        csr.row_values_mut(1)[0] += 0.5;
        assert_eq!(csr.get(1, 0), 2.5);
        assert_eq!(csr.nnz(), 2);
    }
}
