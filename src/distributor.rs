//! Moves the problem from the coordinator to the workers.
//!
//! The dimension and the input vector are broadcast to the whole group.
//! Each worker then receives its own slice as four messages in a fixed
//! order: header, re-based row offsets, column indices, values. Streams for
//! different ranks are independent and are pushed concurrently.

use rayon::prelude::*;

use crate::comm::Communicator;
use crate::csr::{LocalMatrix, RowsView, SparseMatrix};
use crate::error::{Error, Result};
use crate::partitioner::{Partition, RowRange};
use crate::protocol::{Payload, SliceHeader};

/// Broadcasts `n` and then the input vector from `root`. Every rank returns
/// the same vector; non-root ranks check it is exactly `n` long.
pub fn broadcast_problem<C: Communicator>(
    comm: &C,
    root: usize,
    x: Option<&[f64]>,
) -> Result<Vec<f64>> {
    let n = comm
        .broadcast(root, x.map(|x| Payload::Dimension(x.len())))?
        .into_dimension()?;
    let x = comm
        .broadcast(root, x.map(|x| Payload::Vector(x.to_vec())))?
        .into_vector(Some(n))?;
    debug!("rank {} holds the input vector (n = {})", comm.rank(), n);
    Ok(x)
}

/// Sends one rank's slice of the matrix as its four-message stream.
pub fn send_slice<C: Communicator>(comm: &C, dest: usize, view: RowsView<'_>) -> Result<()> {
    let range = view.range();
    let header = SliceHeader {
        first_row: range.start,
        row_count: range.count,
        local_nnz: view.local_nnz(),
        ncols: view.ncols(),
    };
    debug!(
        "sending rows {}..{} ({} nonzeros) to rank {}",
        range.start,
        range.end(),
        header.local_nnz,
        dest
    );
    comm.send(dest, Payload::SliceHeader(header))?;
    comm.send(dest, Payload::RowOffsets(view.rebased_offsets()))?;
    comm.send(dest, Payload::ColumnIndices(view.col_indices().to_vec()))?;
    comm.send(dest, Payload::Values(view.values().to_vec()))
}

/// Coordinator side: pushes every other rank its slice and returns the
/// root's own slice, which is built locally rather than sent to itself.
pub fn distribute<C: Communicator>(
    comm: &C,
    matrix: &SparseMatrix,
    partition: &Partition,
) -> Result<LocalMatrix> {
    let root = comm.rank();
    if partition.ranks() != comm.size() || partition.n() != matrix.nrows() {
        return Err(Error::InvalidConfig(format!(
            "partition of {} rows over {} ranks does not fit a {} row matrix on {} ranks",
            partition.n(),
            partition.ranks(),
            matrix.nrows(),
            comm.size()
        )));
    }

    (0..comm.size())
        .into_par_iter()
        .filter(|&rank| rank != root)
        .try_for_each(|rank| send_slice(comm, rank, matrix.rows(partition.range(rank))))?;

    Ok(matrix.rows(partition.range(root)).to_local())
}

/// Worker side: receives the slice stream from `root` and checks it
/// against the range this rank expects to own and the matrix width.
pub fn receive_slice<C: Communicator>(
    comm: &C,
    root: usize,
    expected: RowRange,
    ncols: usize,
) -> Result<LocalMatrix> {
    let header = comm.recv(root)?.into_slice_header()?;
    let declared = RowRange::new(header.first_row, header.row_count);
    if declared != expected {
        return Err(Error::protocol(
            root,
            format!("slice header announces {declared:?}, this rank owns {expected:?}"),
        ));
    }
    if header.ncols != ncols {
        return Err(Error::protocol(
            root,
            format!(
                "slice header announces {} columns, expected {}",
                header.ncols, ncols
            ),
        ));
    }

    let row_offsets = comm.recv(root)?.into_row_offsets(header.row_count + 1)?;
    let col_indices = comm.recv(root)?.into_column_indices(header.local_nnz)?;
    let values = comm.recv(root)?.into_values(header.local_nnz)?;

    let local = LocalMatrix::try_new(header.first_row, ncols, row_offsets, col_indices, values)
        .map_err(|message| Error::protocol(root, message))?;
    debug!(
        "rank {} received rows {}..{} ({} nonzeros)",
        comm.rank(),
        declared.start,
        declared.end(),
        local.nnz()
    );
    Ok(local)
}
