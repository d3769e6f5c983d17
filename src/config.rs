//! Run configuration shared by every rank of the group.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Input file name that switches on test mode.
pub const TEST_INPUT_NAME: &str = "test.mtx";

/// Smallest accepted dimension outside test mode.
pub const DEFAULT_MIN_DIMENSION: usize = 100;

/// Number of leading result entries reported by default.
pub const DEFAULT_REPORT_PREFIX: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Number of ranks in the group, coordinator included.
    pub workers: usize,
    /// Skip the size check, use the fixed input vector when `n == 10`, and
    /// dump every rank's local entries in rank order.
    pub test_mode: bool,
    pub min_dimension: usize,
    /// Seed for the random input vector. `None` draws one from the OS.
    pub seed: Option<u64>,
    pub report_prefix: usize,
    /// Compare the gathered result against a sequential product.
    pub verify: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            workers: num_cpus::get(),
            test_mode: false,
            min_dimension: DEFAULT_MIN_DIMENSION,
            seed: None,
            report_prefix: DEFAULT_REPORT_PREFIX,
            verify: false,
        }
    }
}

impl RunConfig {
    pub fn with_workers(workers: usize) -> Self {
        Self {
            workers,
            ..Self::default()
        }
    }

    /// Test mode is keyed on the file name alone, not on its contents.
    pub fn is_test_input<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref()
            .file_name()
            .map_or(false, |name| name == TEST_INPUT_NAME)
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::InvalidConfig("at least one worker is required".into()));
        }
        Ok(())
    }

    /// Enforces the minimum size policy unless test mode is on.
    pub fn check_dimensions(&self, rows: usize, cols: usize) -> Result<()> {
        if !self.test_mode && (rows < self.min_dimension || cols < self.min_dimension) {
            return Err(Error::SizeConstraint {
                rows,
                cols,
                min: self.min_dimension,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_is_matched_by_file_name() {
        assert!(RunConfig::is_test_input("test.mtx"));
        assert!(RunConfig::is_test_input("/data/matrices/test.mtx"));
        assert!(!RunConfig::is_test_input("test.mtx.bak"));
        assert!(!RunConfig::is_test_input("bcsstk13.mtx"));
    }

    #[test]
    fn small_matrices_need_test_mode() {
        let mut config = RunConfig::with_workers(2);
        assert!(matches!(
            config.check_dimensions(10, 10),
            Err(Error::SizeConstraint { min: 100, .. })
        ));
        assert!(config.check_dimensions(100, 100).is_ok());
        config.test_mode = true;
        assert!(config.check_dimensions(10, 10).is_ok());
    }

    #[test]
    fn zero_workers_is_invalid() {
        assert!(RunConfig::with_workers(0).validate().is_err());
        assert!(RunConfig::default().validate().is_ok());
    }
}
