//! Rank ordered reporting.
//!
//! [`sequenced`] hands a token from rank to rank so that section `r` only
//! starts after section `r - 1` finished, then fences the whole group. What
//! a section does with its output is up to the [`ReportSink`] it writes to,
//! which keeps the ordering testable without a console.

use std::sync::Mutex;

use crate::comm::Communicator;
use crate::csr::LocalMatrix;
use crate::error::Result;
use crate::protocol::Payload;

/// Destination for the lines a rank reports.
pub trait ReportSink: Sync {
    fn emit(&self, rank: usize, lines: &[String]);
}

/// Sink that keeps everything it is given, in arrival order.
#[derive(Debug, Default)]
pub struct Transcript {
    entries: Mutex<Vec<(usize, Vec<String>)>>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_entries(self) -> Vec<(usize, Vec<String>)> {
        self.entries
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ReportSink for Transcript {
    fn emit(&self, rank: usize, lines: &[String]) {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.push((rank, lines.to_vec()));
    }
}

/// Runs `section` on every rank, one rank at a time in rank order, and
/// returns once the whole group has finished its sections.
pub fn sequenced<C, F, T>(comm: &C, section: F) -> Result<T>
where
    C: Communicator,
    F: FnOnce() -> T,
{
    let rank = comm.rank();
    if rank > 0 {
        comm.recv(rank - 1)?.into_token()?;
    }
    let out = section();
    if rank + 1 < comm.size() {
        comm.send(rank + 1, Payload::Token)?;
    }
    comm.barrier()?;
    Ok(out)
}

/// Lines describing the entries a rank received, with global row numbers.
pub fn describe_local(rank: usize, local: &LocalMatrix) -> Vec<String> {
    let first = local.first_row() as i64;
    let last = first + local.row_count() as i64 - 1;
    let mut lines = vec![format!(
        "Process {rank} (global row range: {first} to {last}) received matrix entries:"
    )];
    lines.extend(
        local
            .entries()
            .map(|(row, col, value)| format!("  ({row}, {col}) -> {value:.6}")),
    );
    lines
}
