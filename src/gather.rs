//! Reassembles the global result from per-rank pieces of varying length.
//!
//! First every rank reports its row count, then the root places each
//! rank's local result at the exclusive prefix sum of the counts before it.
//! Because the partition hands out rows in rank order, those displacements
//! are exactly the start rows, so the pieces tile `[0, n)` with no gaps.

use crate::comm::Communicator;
use crate::error::{Error, Result};
use crate::partitioner::displacements;
use crate::protocol::Payload;

/// Collects one count per rank at `root`, in rank order.
pub fn gather_counts<C: Communicator>(
    comm: &C,
    root: usize,
    count: usize,
) -> Result<Option<Vec<usize>>> {
    comm.gather(root, Payload::RowCount(count))?
        .map(|envelopes| {
            envelopes
                .into_iter()
                .map(|envelope| envelope.into_row_count())
                .collect::<Result<Vec<usize>>>()
        })
        .transpose()
}

/// Variable-length gather of `local` into a vector of length `n` at `root`.
/// Returns `Some(y)` at the root and `None` everywhere else.
pub fn gather_results<C: Communicator>(
    comm: &C,
    root: usize,
    n: usize,
    local: Vec<f64>,
) -> Result<Option<Vec<f64>>> {
    let counts = gather_counts(comm, root, local.len())?;

    let counts = match counts {
        Some(counts) => counts,
        None => {
            comm.send(root, Payload::LocalResult(local))?;
            return Ok(None);
        }
    };

    let total: usize = counts.iter().sum();
    if total != n {
        return Err(Error::protocol(
            root,
            format!("ranks report {total} rows in total, the matrix has {n}"),
        ));
    }
    if counts[root] != local.len() {
        return Err(Error::protocol(root, "root row count changed during gather"));
    }

    let displs = displacements(&counts);
    let mut y = vec![0.0; n];
    let mut own = Some(local);
    for (rank, (&count, &start)) in counts.iter().zip(displs.iter()).enumerate() {
        let piece = if rank == root {
            own.take().unwrap_or_default()
        } else {
            comm.recv(rank)?.into_local_result(count)?
        };
        y[start..start + count].copy_from_slice(&piece);
    }
    debug!("gathered {} rows from {} ranks", n, counts.len());
    Ok(Some(y))
}
