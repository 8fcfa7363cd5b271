//! Matrix multiplication kernels.
//!
//! - `naive`: the triple loop, used for anything at or below the size threshold.
//! - `winograd`: precomputes pairwise row/column factors so each output cell needs
//!   about half the multiplications, then fans output rows out over a [`ThreadPool`].
//!
//! Both operate on row-major buffers and assume the caller validated shapes.

use std::sync::Arc;

use crate::pool::ThreadPool;
use crate::{Matrix, Result};

/// Every one of `rows(a)`, `cols(a)` and `cols(b)` must exceed this for the fast path.
pub const WINOGRAD_THRESHOLD: usize = 200;

#[inline]
pub(crate) fn use_winograd(m: usize, k: usize, n: usize) -> bool {
    m > WINOGRAD_THRESHOLD && k > WINOGRAD_THRESHOLD && n > WINOGRAD_THRESHOLD
}

pub(crate) fn naive(a: &Matrix, b: &Matrix) -> Matrix {
    let (m, k, n) = (a.rows(), a.cols(), b.cols());
    let lhs = a.as_slice();
    let rhs = b.as_slice();
    let mut out = vec![0.0; m * n];

    for i in 0..m {
        let row = &lhs[i * k..(i + 1) * k];
        let out_row = &mut out[i * n..(i + 1) * n];
        for (p, &av) in row.iter().enumerate() {
            let rhs_row = &rhs[p * n..(p + 1) * n];
            for (o, &bv) in out_row.iter_mut().zip(rhs_row) {
                *o = av.mul_add(bv, *o);
            }
        }
    }

    Matrix::from_parts(m, n, out)
}

pub(crate) fn winograd(a: &Matrix, b: &Matrix, pool: &ThreadPool) -> Result<Matrix> {
    let (m, n) = (a.rows(), b.cols());

    let a = Arc::new(a.clone());
    let b = Arc::new(b.clone());
    let row_factors = Arc::new(row_factors(&a));
    let col_factors = Arc::new(col_factors(&b));

    let workers = pool.size().min(m).max(1);
    let chunk = m.div_ceil(workers);

    let mut handles = Vec::with_capacity(workers);
    let mut start = 0;
    while start < m {
        let end = (start + chunk).min(m);
        let (a, b) = (Arc::clone(&a), Arc::clone(&b));
        let (rf, cf) = (Arc::clone(&row_factors), Arc::clone(&col_factors));
        handles.push(pool.submit(move || winograd_rows(&a, &b, &rf, &cf, start, end))?);
        start = end;
    }

    let mut out = Vec::with_capacity(m * n);
    for handle in handles {
        out.extend(handle.join()?);
    }

    Ok(Matrix::from_parts(m, n, out))
}

/// `sum_k a[i][2k] * a[i][2k+1]` for every row `i`.
fn row_factors(a: &Matrix) -> Vec<f64> {
    let half = a.cols() / 2;
    (0..a.rows())
        .map(|i| {
            let row = a.row(i);
            (0..half).map(|k| row[2 * k] * row[2 * k + 1]).sum()
        })
        .collect()
}

/// `sum_k b[2k][j] * b[2k+1][j]` for every column `j`.
fn col_factors(b: &Matrix) -> Vec<f64> {
    let half = b.rows() / 2;
    let mut factors = vec![0.0; b.cols()];
    for k in 0..half {
        let even = b.row(2 * k);
        let odd = b.row(2 * k + 1);
        for ((f, &e), &o) in factors.iter_mut().zip(even).zip(odd) {
            *f += e * o;
        }
    }
    factors
}

fn winograd_rows(
    a: &Matrix,
    b: &Matrix,
    row_factors: &[f64],
    col_factors: &[f64],
    start: usize,
    end: usize,
) -> Vec<f64> {
    let k = a.cols();
    let n = b.cols();
    let half = k / 2;
    let mut out = Vec::with_capacity((end - start) * n);

    for i in start..end {
        let row = a.row(i);
        for j in 0..n {
            let mut acc = -row_factors[i] - col_factors[j];
            for p in 0..half {
                acc += (row[2 * p] + b.get(2 * p + 1, j)) * (row[2 * p + 1] + b.get(2 * p, j));
            }
            if k % 2 == 1 {
                acc += row[k - 1] * b.get(k - 1, j);
            }
            out.push(acc);
        }
    }

    out
}
