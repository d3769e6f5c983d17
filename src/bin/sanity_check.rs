use std::path::{Path, PathBuf};
use std::time::Instant;

use dist_spmv::{
    config::RunConfig,
    io::read_matrix_market,
    problem::Problem,
    report::Transcript,
    roles::run_problem,
    utils::{format_duration, max_abs_diff, sequential_product},
    Result,
};

#[macro_use]
extern crate log;

const MAX_WORKERS: usize = 8;

/// Multiplies every `.mtx` file in a directory with 1 to 8 ranks and checks
/// each result against the sequential product.
fn main() {
    pretty_env_logger::init();

    let dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("test_matrices"));

    match check_dir(&dir) {
        Ok(0) => info!("all matrices in {} agree", dir.display()),
        Ok(failures) => {
            error!("{failures} runs disagreed with the sequential product");
            std::process::exit(1);
        }
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    }
}

fn check_dir(dir: &Path) -> Result<usize> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.extension().map_or(false, |ext| ext == "mtx"))
        .collect();
    paths.sort();

    let mut failures = 0;
    for path in paths {
        failures += check_matrix(&path)?;
    }
    Ok(failures)
}

fn check_matrix(path: &Path) -> Result<usize> {
    let base = RunConfig {
        test_mode: true,
        seed: Some(0),
        ..RunConfig::default()
    };
    let problem = Problem::from_market(read_matrix_market(path)?, &base)?;
    let expected = sequential_product(problem.matrix(), problem.x());
    let scale = expected.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    info!(
        "{}: {}x{} with {} nonzeros",
        path.display(),
        problem.n(),
        problem.n(),
        problem.matrix().nnz()
    );

    let mut failures = 0;
    for workers in 1..=MAX_WORKERS {
        let config = RunConfig {
            workers,
            ..base.clone()
        };
        let timer = Instant::now();
        let y = run_problem(&config, &problem, &Transcript::new())?;
        let elapsed = timer.elapsed();
        let diff = max_abs_diff(&y, &expected);
        if diff > 1e-9 * (1.0 + scale) {
            failures += 1;
            warn!("  P = {workers}: max difference {diff:e}");
        } else {
            info!("  P = {workers}: ok in {}", format_duration(&elapsed));
        }
    }
    Ok(failures)
}
