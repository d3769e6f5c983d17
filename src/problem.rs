//! What the coordinator owns before distribution: the full matrix in
//! row-indexed form and the input vector.

use std::path::Path;

use crate::config::RunConfig;
use crate::csr::SparseMatrix;
use crate::error::{Error, Result};
use crate::io::{read_matrix_market, MatrixMarket};
use crate::utils::input_vector;
use crate::Vector;

#[derive(Debug, Clone)]
pub struct Problem {
    matrix: SparseMatrix,
    x: Vector,
}

impl Problem {
    pub fn new(matrix: SparseMatrix, x: Vector) -> Result<Self> {
        if matrix.nrows() != matrix.ncols() {
            return Err(Error::UnsupportedFormat(format!(
                "{}x{} matrix is not square",
                matrix.nrows(),
                matrix.ncols()
            )));
        }
        if x.len() != matrix.ncols() {
            return Err(Error::InvalidConfig(format!(
                "vector of length {} for a matrix with {} columns",
                x.len(),
                matrix.ncols()
            )));
        }
        Ok(Self { matrix, x })
    }

    /// Validates a parsed file against the run policy, converts it and
    /// builds the input vector.
    pub fn from_market(mm: MatrixMarket, config: &RunConfig) -> Result<Self> {
        if mm.nrows != mm.ncols {
            return Err(Error::UnsupportedFormat(format!(
                "{}x{} matrix is not square",
                mm.nrows, mm.ncols
            )));
        }
        config.check_dimensions(mm.nrows, mm.ncols)?;
        let matrix = SparseMatrix::from_triples(mm.nrows, mm.ncols, &mm.triples, true)?;
        let x = input_vector(matrix.nrows(), config);
        Self::new(matrix, x)
    }

    pub fn load<P: AsRef<Path>>(path: P, config: &RunConfig) -> Result<Self> {
        let path = path.as_ref();
        info!("loading {}", path.display());
        Self::from_market(read_matrix_market(path)?, config)
    }

    pub fn matrix(&self) -> &SparseMatrix {
        &self.matrix
    }

    pub fn x(&self) -> &Vector {
        &self.x
    }

    pub fn n(&self) -> usize {
        self.matrix.nrows()
    }
}
