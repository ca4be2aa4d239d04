//! Small dense complex linear algebra for MIMO channel processing.
//!
//! Channel matrices in this simulator are tiny (2x2 per resource block), so a
//! plain row-major `Vec` representation is used throughout. Provides the
//! handful of operations the SINR engine and the optimizer need: products,
//! Hermitian transpose, inversion, Hermitian eigenvalues and a real Cholesky
//! factorization for correlated shadowing.
//!
//! ## Example
//!
//! ```rust
//! use raps_core::linalg::ComplexMatrix;
//! use raps_core::types::Complex;
//!
//! let h = ComplexMatrix::from_rows(&[
//!     vec![Complex::new(1.0, -1.0), Complex::new(-1.0, 0.0)],
//!     vec![Complex::new(-1.0, 0.0), Complex::new(1.0, 0.0)],
//! ]);
//! let s = h.gram();
//! let eig = s.hermitian_eigenvalues().unwrap();
//! assert!((eig[0] + eig[1] - 5.0).abs() < 1e-12);
//! ```

use crate::types::{Complex, RapsError, RapsResult};
use serde::{Deserialize, Serialize};

/// Relative tolerance on the anti-Hermitian part of a matrix that should be
/// Hermitian.
pub const HERMITIAN_TOLERANCE: f64 = 1e-10;

/// Row-major dense complex matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplexMatrix {
    rows: usize,
    cols: usize,
    data: Vec<Complex>,
}

impl ComplexMatrix {
    /// Zero matrix.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![Complex::new(0.0, 0.0); rows * cols],
        }
    }

    /// Identity-like matrix: ones on the main diagonal, works for non-square
    /// shapes too.
    pub fn eye(rows: usize, cols: usize) -> Self {
        let mut m = Self::zeros(rows, cols);
        for i in 0..rows.min(cols) {
            m.set(i, i, Complex::new(1.0, 0.0));
        }
        m
    }

    /// Square identity scaled by a real factor.
    pub fn scaled_identity(n: usize, value: f64) -> Self {
        let mut m = Self::zeros(n, n);
        for i in 0..n {
            m.set(i, i, Complex::new(value, 0.0));
        }
        m
    }

    /// Create from flat row-major data.
    pub fn from_flat(rows: usize, cols: usize, data: Vec<Complex>) -> RapsResult<Self> {
        if data.len() != rows * cols {
            return Err(RapsError::DimensionMismatch {
                expected: rows * cols,
                actual: data.len(),
            });
        }
        Ok(Self { rows, cols, data })
    }

    /// Create from rows. All rows must have the same length.
    ///
    /// # Panics
    /// Panics on ragged input.
    pub fn from_rows(rows: &[Vec<Complex>]) -> Self {
        let r = rows.len();
        let c = rows.first().map_or(0, |row| row.len());
        let mut data = Vec::with_capacity(r * c);
        for row in rows {
            assert_eq!(row.len(), c, "ragged matrix rows");
            data.extend_from_slice(row);
        }
        Self { rows: r, cols: c, data }
    }

    /// Create from real-valued rows.
    pub fn from_real_rows(rows: &[Vec<f64>]) -> Self {
        let complex: Vec<Vec<Complex>> = rows
            .iter()
            .map(|row| row.iter().map(|&v| Complex::new(v, 0.0)).collect())
            .collect();
        Self::from_rows(&complex)
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn get(&self, r: usize, c: usize) -> Complex {
        self.data[r * self.cols + c]
    }

    #[inline]
    pub fn set(&mut self, r: usize, c: usize, value: Complex) {
        self.data[r * self.cols + c] = value;
    }

    pub fn as_slice(&self) -> &[Complex] {
        &self.data
    }

    pub fn is_square(&self) -> bool {
        self.rows == self.cols
    }

    /// Conjugate transpose.
    pub fn hermitian(&self) -> ComplexMatrix {
        let mut out = Self::zeros(self.cols, self.rows);
        for r in 0..self.rows {
            for c in 0..self.cols {
                out.set(c, r, self.get(r, c).conj());
            }
        }
        out
    }

    /// Matrix product `self * other`.
    ///
    /// # Panics
    /// Panics if the inner dimensions disagree.
    pub fn mul(&self, other: &ComplexMatrix) -> ComplexMatrix {
        assert_eq!(self.cols, other.rows, "matrix product dimension mismatch");
        let mut out = Self::zeros(self.rows, other.cols);
        for i in 0..self.rows {
            for k in 0..self.cols {
                let a = self.get(i, k);
                if a == Complex::new(0.0, 0.0) {
                    continue;
                }
                for j in 0..other.cols {
                    out.data[i * other.cols + j] += a * other.get(k, j);
                }
            }
        }
        out
    }

    /// `self * diag(d) * self^H`: the covariance a transmitter with per-antenna
    /// power `d` produces through this channel.
    pub fn weighted_gram(&self, d: &[f64]) -> ComplexMatrix {
        assert_eq!(d.len(), self.cols, "diagonal length mismatch");
        let mut out = Self::zeros(self.rows, self.rows);
        for i in 0..self.rows {
            for j in 0..self.rows {
                let mut acc = Complex::new(0.0, 0.0);
                for k in 0..self.cols {
                    acc += self.get(i, k) * d[k] * self.get(j, k).conj();
                }
                out.set(i, j, acc);
            }
        }
        out
    }

    /// `self * self^H`.
    pub fn gram(&self) -> ComplexMatrix {
        self.weighted_gram(&vec![1.0; self.cols])
    }

    /// Element-wise sum, in place.
    pub fn add_assign(&mut self, other: &ComplexMatrix) {
        assert_eq!(self.rows, other.rows);
        assert_eq!(self.cols, other.cols);
        for (a, b) in self.data.iter_mut().zip(other.data.iter()) {
            *a += *b;
        }
    }

    /// Multiply every entry by a real scalar.
    pub fn scale(&self, factor: f64) -> ComplexMatrix {
        ComplexMatrix {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().map(|v| v * factor).collect(),
        }
    }

    /// Real part of the trace.
    pub fn trace(&self) -> f64 {
        (0..self.rows.min(self.cols)).map(|i| self.get(i, i).re).sum()
    }

    pub fn frobenius_norm(&self) -> f64 {
        self.data.iter().map(|v| v.norm_sqr()).sum::<f64>().sqrt()
    }

    /// Inverse by Gauss-Jordan elimination with partial pivoting.
    pub fn inverse(&self) -> RapsResult<ComplexMatrix> {
        if !self.is_square() {
            return Err(RapsError::DimensionMismatch {
                expected: self.rows,
                actual: self.cols,
            });
        }
        let n = self.rows;
        if n == 2 {
            return self.inverse_2x2();
        }
        let mut a = self.clone();
        let mut inv = Self::eye(n, n);
        let scale = self.frobenius_norm().max(f64::MIN_POSITIVE);
        for col in 0..n {
            let pivot = (col..n)
                .max_by(|&x, &y| a.get(x, col).norm().total_cmp(&a.get(y, col).norm()))
                .unwrap_or(col);
            if a.get(pivot, col).norm() <= 1e-300 * scale {
                return Err(RapsError::Consistency("singular matrix in inversion".into()));
            }
            if pivot != col {
                for c in 0..n {
                    a.data.swap(pivot * n + c, col * n + c);
                    inv.data.swap(pivot * n + c, col * n + c);
                }
            }
            let p = a.get(col, col);
            for c in 0..n {
                a.data[col * n + c] /= p;
                inv.data[col * n + c] /= p;
            }
            for r in 0..n {
                if r == col {
                    continue;
                }
                let f = a.get(r, col);
                if f == Complex::new(0.0, 0.0) {
                    continue;
                }
                for c in 0..n {
                    let av = a.get(col, c);
                    let iv = inv.get(col, c);
                    a.data[r * n + c] -= f * av;
                    inv.data[r * n + c] -= f * iv;
                }
            }
        }
        Ok(inv)
    }

    fn inverse_2x2(&self) -> RapsResult<ComplexMatrix> {
        let (a, b, c, d) = (self.get(0, 0), self.get(0, 1), self.get(1, 0), self.get(1, 1));
        let det = a * d - b * c;
        if det.norm() <= 1e-300 {
            return Err(RapsError::Consistency("singular matrix in inversion".into()));
        }
        Ok(ComplexMatrix {
            rows: 2,
            cols: 2,
            data: vec![d / det, -b / det, -c / det, a / det],
        })
    }

    /// Frobenius norm of the anti-Hermitian part relative to the matrix norm.
    pub fn hermitian_residual(&self) -> f64 {
        let norm = self.frobenius_norm();
        if norm == 0.0 {
            return 0.0;
        }
        let mut acc = 0.0;
        for r in 0..self.rows {
            for c in 0..self.cols {
                acc += (self.get(r, c) - self.get(c, r).conj()).norm_sqr();
            }
        }
        acc.sqrt() / norm
    }

    /// Real eigenvalues of a Hermitian matrix, in descending order.
    ///
    /// Fails if the matrix is not square or its anti-Hermitian part exceeds
    /// [`HERMITIAN_TOLERANCE`] relative to its norm.
    pub fn hermitian_eigenvalues(&self) -> RapsResult<Vec<f64>> {
        if !self.is_square() {
            return Err(RapsError::DimensionMismatch {
                expected: self.rows,
                actual: self.cols,
            });
        }
        let residual = self.hermitian_residual();
        if residual > HERMITIAN_TOLERANCE {
            return Err(RapsError::Consistency(format!(
                "eigenvalues of a non-Hermitian matrix requested (relative residual {residual:e})"
            )));
        }
        let mut eig = match self.rows {
            0 => Vec::new(),
            1 => vec![self.get(0, 0).re],
            2 => hermitian_eigen_2x2(self),
            _ => hermitian_eigen_jacobi(self),
        };
        eig.sort_by(|a, b| b.total_cmp(a));
        Ok(eig)
    }
}

/// Closed form for a 2x2 Hermitian matrix `[[p, z], [z*, q]]`.
fn hermitian_eigen_2x2(m: &ComplexMatrix) -> Vec<f64> {
    let p = m.get(0, 0).re;
    let q = m.get(1, 1).re;
    let z = 0.5 * (m.get(0, 1) + m.get(1, 0).conj());
    let mean = 0.5 * (p + q);
    let radius = (0.25 * (p - q) * (p - q) + z.norm_sqr()).sqrt();
    let large = mean + radius;
    let det = p * q - z.norm_sqr();
    // small eigenvalue from the determinant avoids cancellation
    let small = if large.abs() > 0.0 { det / large } else { mean - radius };
    vec![large, small]
}

/// Jacobi iteration on the real `2n x 2n` embedding `[[A, -B], [B, A]]` of
/// `A + iB`. Every eigenvalue of the embedding appears twice.
fn hermitian_eigen_jacobi(m: &ComplexMatrix) -> Vec<f64> {
    let n = m.rows();
    let size = 2 * n;
    let mut a = vec![0.0; size * size];
    for r in 0..n {
        for c in 0..n {
            let v = 0.5 * (m.get(r, c) + m.get(c, r).conj());
            a[r * size + c] = v.re;
            a[(r + n) * size + (c + n)] = v.re;
            a[(r + n) * size + c] = v.im;
            a[r * size + (c + n)] = -v.im;
        }
    }

    let max_iter = 100 * size * size;
    let tol = 1e-14 * m.frobenius_norm().max(f64::MIN_POSITIVE);
    for _ in 0..max_iter {
        let (mut p, mut q, mut max_off) = (0, 1, 0.0_f64);
        for i in 0..size {
            for j in (i + 1)..size {
                let v = a[i * size + j].abs();
                if v > max_off {
                    max_off = v;
                    p = i;
                    q = j;
                }
            }
        }
        if max_off < tol {
            break;
        }
        let app = a[p * size + p];
        let aqq = a[q * size + q];
        let apq = a[p * size + q];
        let theta = if (app - aqq).abs() < 1e-300 {
            std::f64::consts::FRAC_PI_4
        } else {
            0.5 * (2.0 * apq / (app - aqq)).atan()
        };
        let (s, c) = theta.sin_cos();
        for i in 0..size {
            let ap = a[p * size + i];
            let aq = a[q * size + i];
            a[p * size + i] = c * ap + s * aq;
            a[q * size + i] = -s * ap + c * aq;
        }
        for i in 0..size {
            let ap = a[i * size + p];
            let aq = a[i * size + q];
            a[i * size + p] = c * ap + s * aq;
            a[i * size + q] = -s * ap + c * aq;
        }
    }

    let mut diag: Vec<f64> = (0..size).map(|i| a[i * size + i]).collect();
    diag.sort_by(|x, y| y.total_cmp(x));
    diag.into_iter().step_by(2).collect()
}

/// Lower-triangular Cholesky factor `L` of a real symmetric positive definite
/// matrix, `A = L L^T`.
pub fn cholesky_lower(a: &[Vec<f64>]) -> RapsResult<Vec<Vec<f64>>> {
    let n = a.len();
    let mut l = vec![vec![0.0; n]; n];
    for i in 0..n {
        if a[i].len() != n {
            return Err(RapsError::DimensionMismatch {
                expected: n,
                actual: a[i].len(),
            });
        }
        for j in 0..=i {
            let dot: f64 = (0..j).map(|k| l[i][k] * l[j][k]).sum();
            if i == j {
                let d = a[i][i] - dot;
                if d <= 0.0 {
                    return Err(RapsError::Consistency(
                        "Cholesky factorization of a non positive definite matrix".into(),
                    ));
                }
                l[i][j] = d.sqrt();
            } else {
                l[i][j] = (a[i][j] - dot) / l[j][j];
            }
        }
    }
    Ok(l)
}
