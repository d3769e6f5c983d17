//! The two roles a rank can play.
//!
//! Rank [`ROOT`] is the coordinator: it owns the problem, drives
//! distribution and gathering, and also computes its own block of rows.
//! Every other rank is a worker. The role is picked once from the rank when
//! the group starts; after that each side only runs its own code path.

use std::time::Instant;

use crate::comm::{run_group, Communicator};
use crate::config::RunConfig;
use crate::csr::LocalMatrix;
use crate::distributor::{broadcast_problem, distribute, receive_slice};
use crate::error::{Error, Result};
use crate::gather::gather_results;
use crate::parallel_ops::spmv_local;
use crate::partitioner::Partition;
use crate::problem::Problem;
use crate::report::{describe_local, sequenced, ReportSink};
use crate::utils::format_duration;
use crate::Vector;

/// Rank of the coordinator.
pub const ROOT: usize = 0;

pub enum Role<'a, C: Communicator> {
    Coordinator(Coordinator<'a, C>),
    Worker(Worker<'a, C>),
}

impl<'a, C: Communicator> Role<'a, C> {
    pub fn select(comm: &'a C, config: &'a RunConfig) -> Self {
        if comm.rank() == ROOT {
            Role::Coordinator(Coordinator { comm, config })
        } else {
            Role::Worker(Worker { comm, config })
        }
    }
}

pub struct Coordinator<'a, C: Communicator> {
    comm: &'a C,
    config: &'a RunConfig,
}

impl<'a, C: Communicator> Coordinator<'a, C> {
    /// Runs the whole pipeline from the coordinator's side and returns the
    /// assembled `y = A * x`.
    pub fn run(&self, problem: &Problem, sink: &dyn ReportSink) -> Result<Vector> {
        let comm = self.comm;
        let timer = Instant::now();
        let n = problem.n();
        let x = problem.x().to_vec();

        broadcast_problem(comm, ROOT, Some(&x))?;

        let partition = Partition::new(n, comm.size());
        info!(
            "distributing {} rows ({} nonzeros) over {} ranks, row counts {:?}",
            n,
            problem.matrix().nnz(),
            comm.size(),
            partition.counts()
        );
        let local = distribute(comm, problem.matrix(), &partition)?;
        debug!("distribution done in {}", format_duration(&timer.elapsed()));

        let local_y = compute(comm, self.config, &local, &x, sink)?;
        let y = gather_results(comm, ROOT, n, local_y)?
            .ok_or_else(|| Error::protocol(ROOT, "coordinator received no gathered result"))?;

        info!("product assembled in {}", format_duration(&timer.elapsed()));
        Ok(Vector::from(y))
    }
}

pub struct Worker<'a, C: Communicator> {
    comm: &'a C,
    config: &'a RunConfig,
}

impl<'a, C: Communicator> Worker<'a, C> {
    pub fn run(&self, sink: &dyn ReportSink) -> Result<()> {
        let comm = self.comm;
        let x = broadcast_problem(comm, ROOT, None)?;
        let n = x.len();

        let partition = Partition::new(n, comm.size());
        let local = receive_slice(comm, ROOT, partition.range(comm.rank()), n)?;

        let local_y = compute(comm, self.config, &local, &x, sink)?;
        gather_results(comm, ROOT, n, local_y)?;
        Ok(())
    }
}

/// The part both roles share: the optional ordered dump of the local
/// entries, then the local product.
fn compute<C: Communicator>(
    comm: &C,
    config: &RunConfig,
    local: &LocalMatrix,
    x: &[f64],
    sink: &dyn ReportSink,
) -> Result<Vec<f64>> {
    if config.test_mode {
        sequenced(comm, || sink.emit(comm.rank(), &describe_local(comm.rank(), local)))?;
    }
    let timer = Instant::now();
    let local_y = spmv_local(local, x);
    trace!(
        "rank {} multiplied {} rows in {:?}",
        comm.rank(),
        local.row_count(),
        timer.elapsed()
    );
    Ok(local_y)
}

/// Runs one product on a fresh in-process group of `config.workers` ranks.
///
/// `load` is called on the coordinator only, the way only the coordinator
/// reads the input. If it fails, the whole group is aborted and its error
/// is returned. When several ranks fail, the first failure that is not just
/// a reaction to another rank aborting is reported.
pub fn run_distributed<F>(config: &RunConfig, load: F, sink: &dyn ReportSink) -> Result<Vector>
where
    F: Fn() -> Result<Problem> + Sync,
{
    config.validate()?;
    let outcomes = run_group(config.workers, |comm| match Role::select(comm, config) {
        Role::Coordinator(coordinator) => {
            let problem = load()?;
            coordinator.run(&problem, sink).map(Some)
        }
        Role::Worker(worker) => worker.run(sink).map(|_| None),
    });
    settle(outcomes)
}

/// Same as [`run_distributed`] for a problem that is already in memory.
pub fn run_problem(config: &RunConfig, problem: &Problem, sink: &dyn ReportSink) -> Result<Vector> {
    run_distributed(config, || Ok(problem.clone()), sink)
}

fn settle(outcomes: Vec<Result<Option<Vector>>>) -> Result<Vector> {
    let is_echo = |e: &Error| matches!(e, Error::Aborted { .. } | Error::Disconnected(_));
    let mut result = None;
    let mut echo = None;
    let mut cause = None;
    for (rank, outcome) in outcomes.into_iter().enumerate() {
        match outcome {
            Ok(Some(y)) if rank == ROOT => result = Some(y),
            Ok(_) => {}
            Err(e) => {
                error!("rank {rank} failed: {e}");
                if !is_echo(&e) {
                    cause.get_or_insert(e);
                } else {
                    echo.get_or_insert(e);
                }
            }
        }
    }
    match (cause, echo, result) {
        (Some(e), _, _) | (None, Some(e), _) => Err(e),
        (None, None, Some(y)) => Ok(y),
        (None, None, None) => Err(Error::protocol(ROOT, "coordinator returned no result")),
    }
}

#[cfg(test)]
extern crate test_generator;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csr::{SparseMatrix, Triple};
    use crate::io::read_matrix_market;
    use crate::report::Transcript;
    use crate::utils::{random_vec, sequential_product, TEST_VECTOR};
    use approx::assert_abs_diff_eq;
    use test_generator::test_resources;

    fn test_config(workers: usize) -> RunConfig {
        RunConfig {
            seed: Some(17),
            ..RunConfig::with_workers(workers)
        }
    }

    fn small_problem() -> Problem {
        // 10x10 with a single nonzero at 1-based (4, 4)
        let matrix = SparseMatrix::from_triples(10, 10, &[Triple::new(4, 4, 1.0)], true).unwrap();
        Problem::new(matrix, Vector::from(TEST_VECTOR.to_vec())).unwrap()
    }

    #[test]
    fn single_entry_scenario() {
        for workers in 1..=12 {
            let y = run_problem(&test_config(workers), &small_problem(), &Transcript::new()).unwrap();
            for (i, yi) in y.iter().enumerate() {
                let expected = if i == 3 { 0.4 } else { 0.0 };
                assert_abs_diff_eq!(*yi, expected);
            }
        }
    }

    #[test]
    fn runs_are_bit_identical() {
        let n = 57;
        let triples: Vec<Triple> = (1..=n)
            .flat_map(|i| {
                [(i * 5) % n + 1, (i * 11) % n + 1, i]
                    .into_iter()
                    .map(move |j| Triple::new(i, j, 1.0 / (i + j) as f64))
            })
            .collect();
        let matrix = SparseMatrix::from_triples(n, n, &triples, true).unwrap();
        let problem = Problem::new(matrix, random_vec(n, Some(3))).unwrap();

        let first = run_problem(&test_config(5), &problem, &Transcript::new()).unwrap();
        let second = run_problem(&test_config(5), &problem, &Transcript::new()).unwrap();
        let first: Vec<u64> = first.iter().map(|v| v.to_bits()).collect();
        let second: Vec<u64> = second.iter().map(|v| v.to_bits()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn empty_matrix_gives_empty_result() {
        let matrix = SparseMatrix::from_triples(0, 0, &[], true).unwrap();
        let problem = Problem::new(matrix, Vector::zeros(0)).unwrap();
        let y = run_problem(&test_config(3), &problem, &Transcript::new()).unwrap();
        assert!(y.is_empty());
    }

    #[test]
    fn test_mode_dumps_ranks_in_order() {
        let triples = [
            Triple::new(1, 1, 1.0),
            Triple::new(5, 2, 2.0),
            Triple::new(10, 10, 3.0),
        ];
        let matrix = SparseMatrix::from_triples(10, 10, &triples, true).unwrap();
        let problem = Problem::new(matrix, Vector::from(TEST_VECTOR.to_vec())).unwrap();
        let config = RunConfig {
            test_mode: true,
            ..test_config(4)
        };
        let transcript = Transcript::new();
        run_problem(&config, &problem, &transcript).unwrap();

        let entries = transcript.into_entries();
        let ranks: Vec<usize> = entries.iter().map(|(rank, _)| *rank).collect();
        assert_eq!(ranks, vec![0, 1, 2, 3]);
        assert_eq!(
            entries[0].1,
            vec![
                "Process 0 (global row range: 0 to 2) received matrix entries:".to_string(),
                "  (0, 0) -> 1.000000".to_string(),
            ]
        );
        assert_eq!(
            entries[1].1,
            vec![
                "Process 1 (global row range: 3 to 5) received matrix entries:".to_string(),
                "  (4, 1) -> 2.000000".to_string(),
            ]
        );
        assert_eq!(entries[3].1.len(), 2);
    }

    #[test]
    fn load_failure_aborts_every_rank() {
        let config = test_config(4);
        let outcome = run_distributed(
            &config,
            || Err(Error::UnsupportedFormat("dense input".into())),
            &Transcript::new(),
        );
        assert!(matches!(outcome, Err(Error::UnsupportedFormat(_))));
    }

    #[test]
    fn size_policy_aborts_the_group() {
        let config = test_config(3);
        let outcome = run_distributed(
            &config,
            || {
                let mm = crate::io::parse_matrix_market(
                    "%%MatrixMarket matrix coordinate real general\n10 10 1\n4 4 1.0\n".as_bytes(),
                )?;
                Problem::from_market(mm, &config)
            },
            &Transcript::new(),
        );
        assert!(matches!(outcome, Err(Error::SizeConstraint { .. })));
    }

    #[test]
    fn zero_workers_is_rejected_up_front() {
        let outcome = run_problem(&test_config(0), &small_problem(), &Transcript::new());
        assert!(matches!(outcome, Err(Error::InvalidConfig(_))));
    }

    #[test_resources("test_matrices/*.mtx")]
    fn distributed_matches_sequential(path: &str) {
        let mm = read_matrix_market(path).unwrap();
        let config = RunConfig {
            test_mode: true,
            ..test_config(1)
        };
        let problem = Problem::from_market(mm, &config).unwrap();
        let expected = sequential_product(problem.matrix(), problem.x());

        for workers in 1..=problem.n().clamp(1, 9) {
            let config = RunConfig {
                workers,
                ..config.clone()
            };
            let y = run_problem(&config, &problem, &Transcript::new()).unwrap();
            assert_abs_diff_eq!(y, expected, epsilon = 1e-12);
        }
    }
}
