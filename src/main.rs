use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;

use dist_spmv::{
    config::RunConfig,
    problem::Problem,
    report::ReportSink,
    roles::run_distributed,
    utils::{format_duration, max_abs_diff, sequential_product},
    Result, Vector,
};
use structopt::StructOpt;

#[macro_use]
extern crate log;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "dist_spmv",
    about = "Multiply a sparse Matrix Market matrix by a vector over a group of workers"
)]
struct Opt {
    /// Matrix file in matrix market coordinate format.
    /// A file named `test.mtx` turns on test mode
    #[structopt(parse(from_os_str))]
    input: PathBuf,

    /// Number of ranks, coordinator included. Defaults to the number of cores
    #[structopt(short = "p", long)]
    workers: Option<usize>,

    /// Seed for the random input vector
    #[structopt(long)]
    seed: Option<u64>,

    /// How many leading entries of the result to print
    #[structopt(long, default_value = "10")]
    prefix: usize,

    /// Check the result against a sequential product
    #[structopt(long)]
    verify: bool,

    /// Smallest accepted dimension outside test mode
    #[structopt(long = "min-dim", default_value = "100")]
    min_dim: usize,
}

impl From<&Opt> for RunConfig {
    fn from(opt: &Opt) -> Self {
        let mut config = RunConfig {
            test_mode: RunConfig::is_test_input(&opt.input),
            seed: opt.seed,
            report_prefix: opt.prefix,
            verify: opt.verify,
            min_dimension: opt.min_dim,
            ..RunConfig::default()
        };
        if let Some(workers) = opt.workers {
            config.workers = workers;
        }
        config
    }
}

/// Prints each rank's report straight to stdout.
struct StdoutSink;

impl ReportSink for StdoutSink {
    fn emit(&self, rank: usize, lines: &[String]) {
        let stdout = std::io::stdout();
        if let Err(e) = write_lines(&mut stdout.lock(), lines) {
            warn!("could not write report of rank {rank}: {e}");
        }
    }
}

fn write_lines<W: Write>(out: &mut W, lines: &[String]) -> std::io::Result<()> {
    for line in lines {
        writeln!(out, "{line}")?;
    }
    out.flush()
}

fn run(opt: &Opt) -> Result<()> {
    let config = RunConfig::from(opt);
    match serde_json::to_string(&config) {
        Ok(json) => debug!("run config: {json}"),
        Err(e) => warn!("could not serialize run config: {e}"),
    }
    if config.test_mode {
        info!("running in test mode");
    }

    let timer = Instant::now();
    let y = run_distributed(&config, || Problem::load(&opt.input, &config), &StdoutSink)?;
    info!("total time: {}", format_duration(&timer.elapsed()));

    let shown = config.report_prefix.min(y.len());
    println!("Result vector y (first {shown} entries):");
    for value in y.iter().take(shown) {
        println!("{value:.6}");
    }

    if config.verify {
        verify(opt, &config, &y)?;
    }
    Ok(())
}

/// Rebuilds the problem with the same inputs and compares against a
/// sequential product. Needs a seed to reproduce a random `x`.
fn verify(opt: &Opt, config: &RunConfig, y: &Vector) -> Result<()> {
    if config.seed.is_none() && !(config.test_mode && y.len() == 10) {
        warn!("--verify without --seed cannot rebuild the input vector, skipping");
        return Ok(());
    }
    let problem = Problem::load(&opt.input, config)?;
    let expected = sequential_product(problem.matrix(), problem.x());
    let diff = max_abs_diff(y, &expected);
    let scale = expected.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    if diff > 1e-9 * (1.0 + scale) {
        warn!("distributed result differs from the sequential product by {diff:e}");
    } else {
        info!("verified against the sequential product, max difference {diff:e}");
    }
    Ok(())
}

fn main() {
    pretty_env_logger::init();
    let opt = Opt::from_args();

    if let Err(e) = run(&opt) {
        error!("{e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn report_lines_are_newline_terminated() {
        let mut out = Vec::new();
        write_lines(&mut out, &["a".to_string(), "b".to_string()]).unwrap();
        assert_eq!(out, b"a\nb\n");
    }

    #[test]
    fn write_failures_are_surfaced() {
        let err = write_lines(&mut ClosedPipe, &["lost".to_string()]).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::BrokenPipe);
    }
}
