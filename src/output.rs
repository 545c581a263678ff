use crate::runner::RunSummary;
use anyhow::Result;
use fpt_common::FptConfig;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Result of the idempotent directory-creation operation. Distinguishing
/// "already there" from "created" keeps genuinely unexpected filesystem
/// errors from being silently absorbed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirStatus {
    Created,
    AlreadyPresent,
}

pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<DirStatus> {
    let path = path.as_ref();
    if path.is_dir() {
        return Ok(DirStatus::AlreadyPresent);
    }
    fs::create_dir_all(path).map_err(|e| {
        anyhow::anyhow!("Failed to create output directory '{}': {}", path.display(), e)
    })?;
    Ok(DirStatus::Created)
}

/// Deterministic output path for the first-passage-time file, derived from
/// the run parameters so a repeat run with identical parameters overwrites
/// rather than append-merges.
pub fn fpt_output_path(config: &FptConfig) -> PathBuf {
    Path::new(&config.output.parent_directory).join(format!(
        "{}_trajs{}_boxsize{}.xyz",
        config.output.base_filename, config.run.num_trajectories, config.run.boxsize
    ))
}

/// Opens (truncating) the first-passage-time output file. Kept open for the
/// whole run and appended to incrementally by the runner.
pub fn create_fpt_writer<P: AsRef<Path>>(path: P) -> Result<BufWriter<File>> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| {
        anyhow::anyhow!("Failed to create output file '{}': {}", path.display(), e)
    })?;
    Ok(BufWriter::new(file))
}

/// Writes one discretized trajectory: one integer discrete-state label per
/// line, file name derived from the source trajectory's index with
/// zero-padded numbering.
pub fn write_discrete_trajectory(
    dir: &Path,
    base: &str,
    index: usize,
    labels: &[i32],
) -> Result<()> {
    let path = dir.join(format!("{}_{:04}_discrete.xyz", base, index));
    let mut file = BufWriter::new(File::create(&path).map_err(|e| {
        anyhow::anyhow!("Failed to create discrete trajectory '{}': {}", path.display(), e)
    })?);
    for label in labels {
        writeln!(file, "{}", label)?;
    }
    file.flush()?;
    Ok(())
}

/// Human-auditable end-of-run report saved next to the FPT file.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub num_trajectories: u32,
    pub completed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub errored: usize,
    pub num_resamples: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mfpt: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fpt_std_dev: Option<f64>,
}

impl RunReport {
    pub fn new(config: &FptConfig, summary: &RunSummary, estimate: Option<(f64, f64)>) -> Self {
        Self {
            num_trajectories: config.run.num_trajectories,
            completed: summary.completed,
            succeeded: summary.succeeded,
            failed: summary.failed,
            errored: summary.errored,
            num_resamples: config.run.num_resamples,
            mfpt: estimate.map(|(m, _)| m),
            fpt_std_dev: estimate.map(|(_, s)| s),
        }
    }
}

pub fn write_summary(path: &Path, report: &RunReport) -> Result<()> {
    let mut file = File::create(path).map_err(|e| {
        anyhow::anyhow!("Failed to create summary file '{}': {}", path.display(), e)
    })?;
    let json = serde_json::to_string_pretty(report)?;
    file.write_all(json.as_bytes())?;
    Ok(())
}
