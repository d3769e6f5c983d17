//! General utilities that don't have a specific home: input vectors, the
//! sequential reference product, and formatting helpers.

use rand::{distributions::Uniform, rngs::StdRng, Rng, SeedableRng};
use sprs::TriMat;
use std::time::Duration;

use crate::config::RunConfig;
use crate::csr::SparseMatrix;
use crate::Vector;

/// Input vector used in test mode for 10x10 matrices.
pub const TEST_VECTOR: [f64; 10] = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9, 1.0];

/// Uniform values in `[0, 1)`. The same seed always gives the same vector.
pub fn random_vec(size: usize, seed: Option<u64>) -> Vector {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let distribution = Uniform::new(0.0_f64, 1.0_f64);
    (0..size).map(|_| rng.sample(distribution)).collect()
}

/// The vector `x` the coordinator multiplies by.
pub fn input_vector(n: usize, config: &RunConfig) -> Vector {
    if config.test_mode && n == TEST_VECTOR.len() {
        info!("test mode: using the fixed input vector");
        Vector::from(TEST_VECTOR.to_vec())
    } else {
        random_vec(n, config.seed)
    }
}

/// `A * x` on one thread with sprs, without any partitioning. Used to check
/// the distributed result.
pub fn sequential_product(mat: &SparseMatrix, x: &Vector) -> Vector {
    assert_eq!(mat.ncols(), x.len());
    let mut tri = TriMat::with_capacity((mat.nrows(), mat.ncols()), mat.nnz());
    for (i, j, v) in mat.iter() {
        tri.add_triplet(i, j, v);
    }
    let csr = tri.to_csr::<usize>();
    csr.outer_iterator()
        .map(|row| row.iter().map(|(j, v)| x[j] * v).sum::<f64>())
        .collect()
}

pub fn max_abs_diff(a: &Vector, b: &Vector) -> f64 {
    assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f64::max)
}

pub fn format_duration(duration: &Duration) -> String {
    let millis = duration.subsec_millis();
    let seconds = duration.as_secs();
    let minutes = seconds / 60;
    let seconds = seconds % 60;

    format!("{} minutes, {}.{:03} seconds", minutes, seconds, millis)
}
