//! Row-indexed (CSR) sparse storage.
//!
//! The coordinator owns one [`SparseMatrix`] for the whole run. Workers only
//! ever see a [`LocalMatrix`], the rows of their partition with offsets
//! re-based so that local row 0 starts at offset 0. Slicing the full matrix
//! is a borrowed [`RowsView`]; data is only copied when a slice is turned
//! into a local matrix or serialized for transmission.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::partitioner::RowRange;

/// One coordinate entry as handed over by the input reader.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Triple {
    pub row: usize,
    pub col: usize,
    pub value: f64,
}

impl Triple {
    pub fn new(row: usize, col: usize, value: f64) -> Self {
        Self { row, col, value }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SparseMatrix {
    nrows: usize,
    ncols: usize,
    row_offsets: Vec<usize>,
    col_indices: Vec<usize>,
    values: Vec<f64>,
}

impl SparseMatrix {
    /// Converts a coordinate list into row-indexed form with a stable
    /// counting sort. Entries of a row keep their input order, duplicates
    /// are kept as separate nonzeros.
    ///
    /// With `one_indexed` the triples use 1-based numbering and are shifted
    /// down by one. Every triple is bounds checked before anything is
    /// placed, so an out-of-range entry never leaves a half built matrix.
    pub fn from_triples(
        nrows: usize,
        ncols: usize,
        triples: &[Triple],
        one_indexed: bool,
    ) -> Result<Self> {
        let shift = usize::from(one_indexed);
        let too_large = || {
            Error::UnsupportedFormat(format!("{nrows}x{ncols} matrix is too large to index"))
        };
        let len = nrows.checked_add(1).ok_or_else(too_large)?;
        let mut row_offsets: Vec<usize> = Vec::new();
        row_offsets.try_reserve_exact(len).map_err(|_| too_large())?;
        row_offsets.resize(len, 0);

        for (entry, t) in triples.iter().enumerate() {
            let in_range = |idx: usize, bound: usize| idx >= shift && idx - shift < bound;
            if !in_range(t.row, nrows) || !in_range(t.col, ncols) {
                return Err(Error::IndexOutOfRange {
                    entry,
                    row: t.row,
                    col: t.col,
                    nrows,
                    ncols,
                });
            }
            row_offsets[t.row - shift + 1] += 1;
        }

        for i in 0..nrows {
            row_offsets[i + 1] += row_offsets[i];
        }

        let nnz = triples.len();
        let mut col_indices = vec![0usize; nnz];
        let mut values = vec![0.0f64; nnz];
        let mut cursor: Vec<usize> = row_offsets[..nrows].to_vec();

        for t in triples {
            let row = t.row - shift;
            let dest = cursor[row];
            col_indices[dest] = t.col - shift;
            values[dest] = t.value;
            cursor[row] += 1;
        }

        trace!("converted {nnz} triples into a {nrows}x{ncols} row-indexed matrix");

        Ok(Self {
            nrows,
            ncols,
            row_offsets,
            col_indices,
            values,
        })
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    pub fn nnz(&self) -> usize {
        self.col_indices.len()
    }

    pub fn row_offsets(&self) -> &[usize] {
        &self.row_offsets
    }

    pub fn col_indices(&self) -> &[usize] {
        &self.col_indices
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Column indices and values of row `i`.
    pub fn row(&self, i: usize) -> (&[usize], &[f64]) {
        let range = self.row_offsets[i]..self.row_offsets[i + 1];
        (&self.col_indices[range.clone()], &self.values[range])
    }

    /// All nonzeros as 0-based `(row, col, value)` in storage order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        (0..self.nrows).flat_map(move |i| {
            let (cols, vals) = self.row(i);
            cols.iter().zip(vals.iter()).map(move |(&j, &v)| (i, j, v))
        })
    }

    /// Borrowed view over a contiguous block of rows.
    ///
    /// Panics if the range runs past the last row.
    pub fn rows(&self, range: RowRange) -> RowsView<'_> {
        assert!(
            range.end() <= self.nrows,
            "row range {range:?} exceeds {} rows",
            self.nrows
        );
        RowsView {
            matrix: self,
            range,
        }
    }
}

/// Read-only window over rows `[start, start + count)` of a [`SparseMatrix`].
#[derive(Debug, Clone, Copy)]
pub struct RowsView<'a> {
    matrix: &'a SparseMatrix,
    range: RowRange,
}

impl<'a> RowsView<'a> {
    pub fn range(&self) -> RowRange {
        self.range
    }

    pub fn row_count(&self) -> usize {
        self.range.count
    }

    pub fn ncols(&self) -> usize {
        self.matrix.ncols
    }

    fn first_offset(&self) -> usize {
        self.matrix.row_offsets[self.range.start]
    }

    fn last_offset(&self) -> usize {
        self.matrix.row_offsets[self.range.end()]
    }

    pub fn local_nnz(&self) -> usize {
        self.last_offset() - self.first_offset()
    }

    /// Row offsets shifted so the first row of the view starts at 0.
    /// Always `row_count + 1` long.
    pub fn rebased_offsets(&self) -> Vec<usize> {
        let base = self.first_offset();
        self.matrix.row_offsets[self.range.start..=self.range.end()]
            .iter()
            .map(|offset| offset - base)
            .collect()
    }

    pub fn col_indices(&self) -> &'a [usize] {
        &self.matrix.col_indices[self.first_offset()..self.last_offset()]
    }

    pub fn values(&self) -> &'a [f64] {
        &self.matrix.values[self.first_offset()..self.last_offset()]
    }

    /// Owned copy of the view in local (re-based) form.
    pub fn to_local(&self) -> LocalMatrix {
        LocalMatrix {
            first_row: self.range.start,
            ncols: self.matrix.ncols,
            row_offsets: self.rebased_offsets(),
            col_indices: self.col_indices().to_vec(),
            values: self.values().to_vec(),
        }
    }
}

/// The rows of the matrix owned by one rank, with local offsets.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalMatrix {
    first_row: usize,
    ncols: usize,
    row_offsets: Vec<usize>,
    col_indices: Vec<usize>,
    values: Vec<f64>,
}

impl LocalMatrix {
    /// Builds a local slice from received parts, checking every structural
    /// invariant. The error string describes the first violation found.
    pub fn try_new(
        first_row: usize,
        ncols: usize,
        row_offsets: Vec<usize>,
        col_indices: Vec<usize>,
        values: Vec<f64>,
    ) -> std::result::Result<Self, String> {
        let nnz = col_indices.len();
        if values.len() != nnz {
            return Err(format!(
                "{} column indices but {} values",
                nnz,
                values.len()
            ));
        }
        match (row_offsets.first(), row_offsets.last()) {
            (Some(&0), Some(&last)) if last == nnz => {}
            (first, last) => {
                return Err(format!(
                    "row offsets must run from 0 to {nnz}, got {first:?}..{last:?}"
                ))
            }
        }
        if let Some(pos) = row_offsets.windows(2).position(|w| w[0] > w[1]) {
            return Err(format!("row offsets decrease at local row {pos}"));
        }
        if let Some(&col) = col_indices.iter().find(|&&c| c >= ncols) {
            return Err(format!("column index {col} outside {ncols} columns"));
        }
        Ok(Self {
            first_row,
            ncols,
            row_offsets,
            col_indices,
            values,
        })
    }

    /// Global index of local row 0.
    pub fn first_row(&self) -> usize {
        self.first_row
    }

    pub fn row_count(&self) -> usize {
        self.row_offsets.len() - 1
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    pub fn nnz(&self) -> usize {
        self.col_indices.len()
    }

    pub fn row_offsets(&self) -> &[usize] {
        &self.row_offsets
    }

    pub fn col_indices(&self) -> &[usize] {
        &self.col_indices
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn row(&self, i: usize) -> (&[usize], &[f64]) {
        let range = self.row_offsets[i]..self.row_offsets[i + 1];
        (&self.col_indices[range.clone()], &self.values[range])
    }

    /// Nonzeros as `(global_row, col, value)`.
    pub fn entries(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        (0..self.row_count()).flat_map(move |i| {
            let (cols, vals) = self.row(i);
            let global_row = self.first_row + i;
            cols.iter()
                .zip(vals.iter())
                .map(move |(&j, &v)| (global_row, j, v))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SparseMatrix {
        // 1-based input, deliberately unsorted and with an empty row (row 3)
        let triples = vec![
            Triple::new(4, 1, 7.0),
            Triple::new(1, 2, 1.0),
            Triple::new(2, 2, 3.0),
            Triple::new(1, 1, 2.0),
            Triple::new(4, 4, 8.0),
            Triple::new(2, 3, 4.0),
        ];
        SparseMatrix::from_triples(4, 4, &triples, true).unwrap()
    }

    #[test]
    fn offsets_are_well_formed() {
        let mat = sample();
        assert_eq!(mat.row_offsets(), &[0, 2, 4, 4, 6]);
        assert_eq!(mat.row_offsets()[0], 0);
        assert_eq!(*mat.row_offsets().last().unwrap(), mat.nnz());
        assert!(mat.row_offsets().windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn conversion_is_stable_within_rows() {
        let mat = sample();
        assert_eq!(mat.row(0), (&[1, 0][..], &[1.0, 2.0][..]));
        assert_eq!(mat.row(1), (&[1, 2][..], &[3.0, 4.0][..]));
        assert_eq!(mat.row(2), (&[][..], &[][..]));
        assert_eq!(mat.row(3), (&[0, 3][..], &[7.0, 8.0][..]));
    }

    #[test]
    fn zero_indexed_input_is_not_shifted() {
        let triples = vec![Triple::new(0, 0, 1.0), Triple::new(1, 0, 2.0)];
        let mat = SparseMatrix::from_triples(2, 2, &triples, false).unwrap();
        assert_eq!(mat.iter().collect::<Vec<_>>(), vec![(0, 0, 1.0), (1, 0, 2.0)]);
    }

    #[test]
    fn out_of_range_entries_are_rejected() {
        let zero_row = vec![Triple::new(1, 1, 1.0), Triple::new(0, 1, 1.0)];
        match SparseMatrix::from_triples(3, 3, &zero_row, true) {
            Err(Error::IndexOutOfRange { entry, row, .. }) => {
                assert_eq!(entry, 1);
                assert_eq!(row, 0);
            }
            other => panic!("expected IndexOutOfRange, got {other:?}"),
        }

        let wide_col = vec![Triple::new(1, 4, 1.0)];
        assert!(matches!(
            SparseMatrix::from_triples(3, 3, &wide_col, true),
            Err(Error::IndexOutOfRange { col: 4, .. })
        ));
    }

    #[test]
    fn unindexable_dimensions_are_rejected() {
        for nrows in [usize::MAX, usize::MAX / 2] {
            assert!(matches!(
                SparseMatrix::from_triples(nrows, nrows, &[], true),
                Err(Error::UnsupportedFormat(_))
            ));
        }
    }

    #[test]
    fn view_rebases_offsets() {
        let mat = sample();
        let view = mat.rows(RowRange::new(1, 3));
        assert_eq!(view.row_count(), 3);
        assert_eq!(view.local_nnz(), 4);
        assert_eq!(view.rebased_offsets(), vec![0, 2, 2, 4]);
        assert_eq!(view.col_indices(), &[1, 2, 0, 3]);
        assert_eq!(view.values(), &[3.0, 4.0, 7.0, 8.0]);

        let local = view.to_local();
        assert_eq!(local.first_row(), 1);
        assert_eq!(local.row_count(), 3);
        assert_eq!(
            local.entries().collect::<Vec<_>>(),
            vec![(1, 1, 3.0), (1, 2, 4.0), (3, 0, 7.0), (3, 3, 8.0)]
        );
    }

    #[test]
    fn empty_view_has_single_offset() {
        let mat = sample();
        let view = mat.rows(RowRange::new(4, 0));
        assert_eq!(view.rebased_offsets(), vec![0]);
        assert_eq!(view.to_local().row_count(), 0);
    }

    #[test]
    fn local_matrix_validation() {
        assert!(LocalMatrix::try_new(0, 3, vec![0, 1, 2], vec![0, 2], vec![1.0, 2.0]).is_ok());
        assert!(LocalMatrix::try_new(0, 3, vec![0, 1, 2], vec![0], vec![1.0]).is_err());
        assert!(LocalMatrix::try_new(0, 3, vec![1, 2], vec![0, 2], vec![1.0, 2.0]).is_err());
        assert!(LocalMatrix::try_new(0, 3, vec![0, 2, 1, 2], vec![0, 2], vec![1.0, 2.0]).is_err());
        assert!(LocalMatrix::try_new(0, 3, vec![0, 2], vec![0, 3], vec![1.0, 2.0]).is_err());
        assert!(LocalMatrix::try_new(0, 3, vec![], vec![], vec![]).is_err());
    }
}
