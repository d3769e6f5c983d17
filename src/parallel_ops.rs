//! Local sparse matrix-vector products. These run on every rank, coordinator
//! included, and are the only real arithmetic in the pipeline.

use rayon::prelude::*;

use crate::csr::LocalMatrix;

/// Below this many nonzeros the row loop stays on the calling thread.
const PARALLEL_NNZ_THRESHOLD: usize = 1 << 16;

/// `y[i] = sum_j values[j] * x[col_indices[j]]` over the nonzeros of local
/// row `i`. Each row is summed in storage order, whether or not the rows
/// are spread over the rayon pool, so results are bit-for-bit repeatable.
///
/// Panics if `x` is shorter than the matrix is wide.
pub fn spmv_local(a: &LocalMatrix, x: &[f64]) -> Vec<f64> {
    assert!(
        x.len() >= a.ncols(),
        "vector of length {} is shorter than {} columns",
        x.len(),
        a.ncols()
    );
    let row_sum = |i: usize| {
        let (cols, vals) = a.row(i);
        cols.iter()
            .zip(vals.iter())
            .fold(0.0, |acc, (&j, &v)| acc + v * x[j])
    };
    if a.nnz() < PARALLEL_NNZ_THRESHOLD {
        (0..a.row_count()).map(row_sum).collect()
    } else {
        (0..a.row_count()).into_par_iter().map(row_sum).collect()
    }
}
