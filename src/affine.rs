use ndarray::Array2;

use crate::error::TransformError;

/// An augmented affine matrix of size `(target_dim + 1) × (source_dim + 1)`.
///
/// A point `p` of `source_dim` ordinates maps to `M · [p, 1]ᵀ`. The last row
/// is `[0, …, 0, 1]` for every matrix built by this crate.
///
/// Composition reads right to left: `a.multiply(&b)` applies `b` first.
#[derive(Clone, Debug, PartialEq)]
pub struct Matrix {
    elements: Array2<f64>,
}

const IDENTITY_TOLERANCE: f64 = 1e-12;

impl Matrix {
    /// Square identity of `size × size` (dimension `size - 1`).
    pub fn identity(size: usize) -> Self {
        Self {
            elements: Array2::eye(size),
        }
    }

    /// Matrix mapping `source_dim` ordinates to `target_dim` ordinates with only
    /// the homogeneous corner set.
    pub fn zeros(target_dim: usize, source_dim: usize) -> Self {
        let mut elements = Array2::zeros((target_dim + 1, source_dim + 1));
        elements[[target_dim, source_dim]] = 1.0;
        Self { elements }
    }

    pub fn from_rows(rows: &[&[f64]]) -> Result<Self, TransformError> {
        let n_rows = rows.len();
        let n_cols = rows.first().map_or(0, |r| r.len());
        if n_rows == 0 || n_cols == 0 {
            return Err(TransformError::InvalidParameter("empty matrix".into()));
        }
        let mut elements = Array2::zeros((n_rows, n_cols));
        for (r, row) in rows.iter().enumerate() {
            if row.len() != n_cols {
                return Err(TransformError::InvalidParameter(format!(
                    "row {r} has {} columns, expected {n_cols}",
                    row.len()
                )));
            }
            for (c, &v) in row.iter().enumerate() {
                elements[[r, c]] = v;
            }
        }
        Ok(Self { elements })
    }

    /// Translation of `offsets.len()` dimensions.
    pub fn translation(offsets: &[f64]) -> Self {
        let dim = offsets.len();
        let mut m = Self::identity(dim + 1);
        for (i, &t) in offsets.iter().enumerate() {
            m.elements[[i, dim]] = t;
        }
        m
    }

    pub fn num_row(&self) -> usize {
        self.elements.nrows()
    }

    pub fn num_col(&self) -> usize {
        self.elements.ncols()
    }

    pub fn source_dimensions(&self) -> usize {
        self.num_col() - 1
    }

    pub fn target_dimensions(&self) -> usize {
        self.num_row() - 1
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.elements[[row, col]]
    }

    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.elements[[row, col]] = value;
    }

    pub fn as_array(&self) -> &Array2<f64> {
        &self.elements
    }

    /// `self · other`, i.e. `other` is applied first.
    pub fn multiply(&self, other: &Matrix) -> Result<Matrix, TransformError> {
        if self.num_col() != other.num_row() {
            return Err(TransformError::DimensionMismatch {
                expected: self.source_dimensions(),
                found: other.target_dimensions(),
            });
        }
        Ok(Matrix {
            elements: self.elements.dot(&other.elements),
        })
    }

    /// Invert a square matrix by Gauss-Jordan elimination with partial pivoting.
    pub fn inverse(&self) -> Result<Matrix, TransformError> {
        let n = self.num_row();
        if n != self.num_col() {
            return Err(TransformError::NonInvertible(format!(
                "{}×{} matrix is not square",
                n,
                self.num_col()
            )));
        }
        let mut a = self.elements.clone();
        let mut inv = Array2::<f64>::eye(n);
        for col in 0..n {
            let mut pivot = col;
            for row in col + 1..n {
                if a[[row, col]].abs() > a[[pivot, col]].abs() {
                    pivot = row;
                }
            }
            let p = a[[pivot, col]];
            if p.abs() < f64::EPSILON {
                return Err(TransformError::NonInvertible(
                    "singular matrix (zero pivot)".into(),
                ));
            }
            if pivot != col {
                for k in 0..n {
                    a.swap([pivot, k], [col, k]);
                    inv.swap([pivot, k], [col, k]);
                }
            }
            for k in 0..n {
                a[[col, k]] /= p;
                inv[[col, k]] /= p;
            }
            for row in 0..n {
                if row == col {
                    continue;
                }
                let factor = a[[row, col]];
                if factor != 0.0 {
                    for k in 0..n {
                        a[[row, k]] -= factor * a[[col, k]];
                        inv[[row, k]] -= factor * inv[[col, k]];
                    }
                }
            }
        }
        Ok(Matrix { elements: inv })
    }

    pub fn is_identity(&self) -> bool {
        self.is_identity_within(IDENTITY_TOLERANCE)
    }

    pub fn is_identity_within(&self, tolerance: f64) -> bool {
        if self.num_row() != self.num_col() {
            return false;
        }
        self.elements.indexed_iter().all(|((r, c), &v)| {
            let expected = if r == c { 1.0 } else { 0.0 };
            (v - expected).abs() <= tolerance
        })
    }

    /// True when the last row is `[0, …, 0, 1]`.
    pub fn is_affine(&self) -> bool {
        let last = self.num_row() - 1;
        let cols = self.num_col();
        (0..cols).all(|c| {
            let expected = if c == cols - 1 { 1.0 } else { 0.0 };
            self.elements[[last, c]] == expected
        })
    }

    pub fn approx_eq(&self, other: &Matrix, tolerance: f64) -> bool {
        self.elements.dim() == other.elements.dim()
            && self
                .elements
                .iter()
                .zip(other.elements.iter())
                .all(|(a, b)| (a - b).abs() <= tolerance)
    }

    /// Apply to one point. `src.len()` must be `source_dimensions()` and
    /// `dst.len()` must be `target_dimensions()`.
    pub fn transform_point(&self, src: &[f64], dst: &mut [f64]) {
        let src_dim = self.source_dimensions();
        for (r, out) in dst.iter_mut().enumerate().take(self.target_dimensions()) {
            let mut sum = self.elements[[r, src_dim]];
            for (c, &v) in src.iter().enumerate().take(src_dim) {
                sum += self.elements[[r, c]] * v;
            }
            *out = sum;
        }
    }
}
