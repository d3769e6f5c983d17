//! Row-partitioned sparse matrix-vector product, `y = A * x`, over a group
//! of message-passing ranks.
//!
//! <br>
//!
//! Rank 0 acts as the coordinator. It reads a square matrix in Matrix Market
//! coordinate format, converts it to compressed sparse row storage, and
//! builds the input vector `x`. The dimension and `x` are broadcast to every
//! rank, the rows are split into contiguous blocks whose sizes differ by at
//! most one, and each rank is sent the row offsets, column indices and values
//! of its block. Every rank (the coordinator included) multiplies its block
//! by `x`, and the partial results are gathered back on the coordinator in
//! rank order.
//!
//! Ranks talk only through the [`comm::Communicator`] trait. The crate ships
//! an in-process backend, [`comm::ChannelComm`], where each rank is a thread
//! and every message is an encoded frame on a channel, so the whole protocol
//! runs and is tested inside one process.

use ndarray::Array1;

#[macro_use]
extern crate log;
extern crate approx;

pub mod comm;
pub mod config;
pub mod csr;
pub mod distributor;
pub mod error;
pub mod gather;
pub mod io;
pub mod parallel_ops;
pub mod partitioner;
pub mod problem;
pub mod protocol;
pub mod report;
pub mod roles;
pub mod utils;

pub use error::{Error, Result};

pub type Vector = Array1<f64>;
