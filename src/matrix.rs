//! Dense row-major `f64` matrix and the linear algebra the backends need.
//!
//! All operations return a new value. The only in-place helpers are
//! [`Matrix::sub_assign_scaled`] (the gradient-descent update) and
//! [`Matrix::randomize`].
//!
//! Shape contract violations return [`Error::DimensionMismatch`].

use rand::Rng;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::matmul;
use crate::pool::{self, ThreadPool};
use crate::{Activation, Error, Result};

/// Half-width of the uniform range used for random initialization.
pub const INIT_RANGE: f64 = 0.5;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// Uniform random values in `[-0.5, 0.5]`.
    pub fn random<R: Rng + ?Sized>(rows: usize, cols: usize, rng: &mut R) -> Self {
        let mut m = Self::zeros(rows, cols);
        m.randomize(rng);
        m
    }

    /// Build from a flat row-major buffer.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::DimensionMismatch(format!(
                "buffer length {} does not match {rows}x{cols}",
                data.len()
            )));
        }
        Ok(Self { rows, cols, data })
    }

    /// Build from per-row vectors; every row must have the same length.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(rows.len() * cols);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != cols {
                return Err(Error::DimensionMismatch(format!(
                    "row {i} has len {}, expected {cols}",
                    row.len()
                )));
            }
            data.extend_from_slice(row);
        }
        Ok(Self {
            rows: rows.len(),
            cols,
            data,
        })
    }

    /// A single-row matrix.
    pub fn row_vector(values: Vec<f64>) -> Self {
        Self {
            rows: 1,
            cols: values.len(),
            data: values,
        }
    }

    #[inline]
    pub(crate) fn from_parts(rows: usize, cols: usize, data: Vec<f64>) -> Self {
        debug_assert_eq!(data.len(), rows * cols);
        Self { rows, cols, data }
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
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    #[inline]
    pub fn into_vec(self) -> Vec<f64> {
        self.data
    }

    /// Panics if `i >= rows`.
    #[inline]
    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    /// Panics if out of bounds.
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.cols + j]
    }

    #[inline]
    pub fn set(&mut self, i: usize, j: usize, value: f64) {
        self.data[i * self.cols + j] = value;
    }

    pub fn add(&self, other: &Matrix) -> Result<Matrix> {
        self.zip_with(other, "add", |a, b| a + b)
    }

    pub fn sub(&self, other: &Matrix) -> Result<Matrix> {
        self.zip_with(other, "sub", |a, b| a - b)
    }

    /// Element-wise product.
    pub fn hadamard(&self, other: &Matrix) -> Result<Matrix> {
        self.zip_with(other, "hadamard", |a, b| a * b)
    }

    pub fn scale(&self, factor: f64) -> Matrix {
        self.map(|x| x * factor)
    }

    pub fn transpose(&self) -> Matrix {
        let mut data = Vec::with_capacity(self.data.len());
        for j in 0..self.cols {
            for i in 0..self.rows {
                data.push(self.data[i * self.cols + j]);
            }
        }
        Matrix::from_parts(self.cols, self.rows, data)
    }

    pub fn activate(&self, activation: Activation) -> Matrix {
        self.map(|x| activation.forward(x))
    }

    /// Activation derivative evaluated at each (post-activation) element.
    pub fn activate_derivative(&self, activation: Activation) -> Matrix {
        self.map(|y| activation.derivative(y))
    }

    /// Matrix product `self * other`.
    ///
    /// Large products (every dimension above [`matmul::WINOGRAD_THRESHOLD`]) run the
    /// Winograd kernel on the shared pool; everything else uses the naive loop.
    pub fn multiply(&self, other: &Matrix) -> Result<Matrix> {
        self.check_inner(other)?;
        if matmul::use_winograd(self.rows, self.cols, other.cols) {
            matmul::winograd(self, other, pool::shared_pool())
        } else {
            Ok(matmul::naive(self, other))
        }
    }

    pub fn multiply_naive(&self, other: &Matrix) -> Result<Matrix> {
        self.check_inner(other)?;
        Ok(matmul::naive(self, other))
    }

    /// Winograd product on an explicit pool, regardless of size.
    pub fn multiply_winograd(&self, other: &Matrix, pool: &ThreadPool) -> Result<Matrix> {
        self.check_inner(other)?;
        matmul::winograd(self, other, pool)
    }

    /// `self -= factor * other`.
    pub fn sub_assign_scaled(&mut self, other: &Matrix, factor: f64) -> Result<()> {
        if self.shape() != other.shape() {
            return Err(Error::shape("sub_assign_scaled", self.shape(), other.shape()));
        }
        for (a, &b) in self.data.iter_mut().zip(&other.data) {
            *a -= factor * b;
        }
        Ok(())
    }

    /// Refill with uniform random values in `[-0.5, 0.5]`.
    pub fn randomize<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        for v in &mut self.data {
            *v = rng.gen_range(-INIT_RANGE..=INIT_RANGE);
        }
    }

    fn map(&self, f: impl Fn(f64) -> f64) -> Matrix {
        Matrix::from_parts(self.rows, self.cols, self.data.iter().map(|&x| f(x)).collect())
    }

    fn zip_with(&self, other: &Matrix, op: &str, f: impl Fn(f64, f64) -> f64) -> Result<Matrix> {
        if self.shape() != other.shape() {
            return Err(Error::shape(op, self.shape(), other.shape()));
        }
        let data = self
            .data
            .iter()
            .zip(&other.data)
            .map(|(&a, &b)| f(a, b))
            .collect();
        Ok(Matrix::from_parts(self.rows, self.cols, data))
    }

    fn check_inner(&self, other: &Matrix) -> Result<()> {
        if self.cols != other.rows {
            return Err(Error::shape("multiply", self.shape(), other.shape()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn m(rows: &[&[f64]]) -> Matrix {
        Matrix::from_rows(&rows.iter().map(|r| r.to_vec()).collect::<Vec<_>>()).unwrap()
    }

    #[test]
    fn elementwise_ops() {
        let a = m(&[&[1.0, 2.0], &[3.0, 4.0]]);
        let b = m(&[&[0.5, -1.0], &[2.0, 0.0]]);

        assert_eq!(a.add(&b).unwrap(), m(&[&[1.5, 1.0], &[5.0, 4.0]]));
        assert_eq!(a.sub(&b).unwrap(), m(&[&[0.5, 3.0], &[1.0, 4.0]]));
        assert_eq!(a.hadamard(&b).unwrap(), m(&[&[0.5, -2.0], &[6.0, 0.0]]));
        assert_eq!(a.scale(2.0), m(&[&[2.0, 4.0], &[6.0, 8.0]]));
    }

    #[test]
    fn elementwise_ops_reject_shape_mismatch() {
        let a = Matrix::zeros(2, 3);
        let b = Matrix::zeros(3, 2);
        assert!(matches!(a.add(&b), Err(Error::DimensionMismatch(_))));
        assert!(matches!(a.sub(&b), Err(Error::DimensionMismatch(_))));
        assert!(matches!(a.hadamard(&b), Err(Error::DimensionMismatch(_))));
    }

    #[test]
    fn multiply_small() {
        let a = m(&[&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]]);
        let b = m(&[&[7.0, 8.0], &[9.0, 10.0], &[11.0, 12.0]]);
        assert_eq!(a.multiply(&b).unwrap(), m(&[&[58.0, 64.0], &[139.0, 154.0]]));
    }

    #[test]
    fn multiply_rejects_inner_dim_mismatch() {
        let a = Matrix::zeros(2, 3);
        assert!(matches!(a.multiply(&a), Err(Error::DimensionMismatch(_))));
        assert!(matches!(a.multiply_naive(&a), Err(Error::DimensionMismatch(_))));
    }

    #[test]
    fn large_multiply_uses_fast_path_and_matches_naive() {
        let mut rng = StdRng::seed_from_u64(3);
        let a = Matrix::random(201, 203, &mut rng);
        let b = Matrix::random(203, 202, &mut rng);
        let fast = a.multiply(&b).unwrap();
        let slow = a.multiply_naive(&b).unwrap();
        for (x, y) in fast.as_slice().iter().zip(slow.as_slice()) {
            assert!((x - y).abs() <= 1e-9);
        }
    }

    #[test]
    fn transpose_is_involutive() {
        let mut rng = StdRng::seed_from_u64(5);
        for &(r, c) in &[(1, 1), (1, 7), (4, 3), (9, 2)] {
            let a = Matrix::random(r, c, &mut rng);
            let t = a.transpose();
            assert_eq!(t.shape(), (c, r));
            assert_eq!(t.transpose(), a);
        }
    }

    #[test]
    fn random_values_stay_in_range() {
        let mut rng = StdRng::seed_from_u64(0);
        let a = Matrix::random(20, 20, &mut rng);
        assert!(a.as_slice().iter().all(|v| (-0.5..=0.5).contains(v)));
    }

    #[test]
    fn sub_assign_scaled_updates_in_place() {
        let mut a = m(&[&[1.0, 1.0]]);
        a.sub_assign_scaled(&m(&[&[2.0, -4.0]]), 0.5).unwrap();
        assert_eq!(a, m(&[&[0.0, 3.0]]));
        assert!(a.sub_assign_scaled(&Matrix::zeros(2, 1), 1.0).is_err());
    }

    #[test]
    fn activation_maps_elementwise() {
        let z = Matrix::zeros(1, 3);
        let y = z.activate(Activation::Sigmoid);
        assert_eq!(y.as_slice(), &[0.5, 0.5, 0.5]);
        assert_eq!(
            y.activate_derivative(Activation::Sigmoid).as_slice(),
            &[0.25, 0.25, 0.25]
        );
    }
}
