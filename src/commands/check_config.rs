//! `check-config`: report missing configuration without running anything.

use crate::config::{Config, Job};

/// Missing values per job, in job order. Empty when everything is set.
pub fn run(config: &Config, jobs: &[Job]) -> Vec<(Job, Vec<String>)> {
    jobs.iter()
        .map(|job| (*job, config.missing(job.requirements())))
        .filter(|(_, missing)| !missing.is_empty())
        .collect()
}
