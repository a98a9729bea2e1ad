//! Plain dense row-major matrix shared by the sensitivity kernel, the
//! zone extractor's link matrices, and the disk cache's wire format.
//!
//! A dependency on `nalgebra` would pull in a second linear-algebra stack
//! alongside `faer`/`sprs`; since every consumer here only needs indexing,
//! row access and flat serialization, a thin `Vec<f64>`-backed type is kept
//! instead, mirroring how `sparse::sensitivity::PtdfMatrix` wraps its data.

use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl DenseMatrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    pub fn from_rows(rows: Vec<Vec<f64>>) -> Self {
        let nrows = rows.len();
        let ncols = rows.first().map(|r| r.len()).unwrap_or(0);
        let mut data = Vec::with_capacity(nrows * ncols);
        for row in rows {
            assert_eq!(row.len(), ncols, "ragged matrix rows");
            data.extend(row);
        }
        Self {
            rows: nrows,
            cols: ncols,
            data,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn row(&self, r: usize) -> &[f64] {
        let start = r * self.cols;
        &self.data[start..start + self.cols]
    }

    pub fn row_mut(&mut self, r: usize) -> &mut [f64] {
        let start = r * self.cols;
        &mut self.data[start..start + self.cols]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Zeroes entries with `|value| < tolerance`, as required of the
    /// sensitivity matrices before they are cached or compared.
    pub fn truncate_small(&mut self, tolerance: f64) -> usize {
        let mut truncated = 0;
        for v in self.data.iter_mut() {
            if v.abs() < tolerance {
                *v = 0.0;
                truncated += 1;
            }
        }
        truncated
    }
}

impl Index<(usize, usize)> for DenseMatrix {
    type Output = f64;

    fn index(&self, (r, c): (usize, usize)) -> &f64 {
        &self.data[r * self.cols + c]
    }
}

impl IndexMut<(usize, usize)> for DenseMatrix {
    fn index_mut(&mut self, (r, c): (usize, usize)) -> &mut f64 {
        &mut self.data[r * self.cols + c]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_roundtrip() {
        let mut m = DenseMatrix::zeros(2, 3);
        m[(0, 2)] = 4.5;
        assert_eq!(m[(0, 2)], 4.5);
        assert_eq!(m.row(0), &[0.0, 0.0, 4.5]);
    }

    #[test]
    fn truncate_small_zeroes_entries() {
        let mut m = DenseMatrix::from_rows(vec![vec![1e-9, 1.0], vec![-1e-9, -2.0]]);
        let n = m.truncate_small(1e-6);
        assert_eq!(n, 2);
        assert_eq!(m[(0, 0)], 0.0);
        assert_eq!(m[(1, 1)], -2.0);
    }
}
