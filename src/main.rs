use anyhow::Result;
use log::{info, warn};
use std::path::Path;
use std::time::Instant;

// Define modules used by main
mod binding;
mod engine;
mod estimate;
mod output;
mod particle;
mod runner;
mod trajectory;

use fpt_common::{write_parameters, FptConfig};
use output::DirStatus;
use trajectory::{DiscreteRecorder, TrajectorySimulator};

fn main() -> Result<()> {
    // Initialize the logger
    env_logger::init();

    info!("Starting first-passage-time harness...");

    // --- Load Configuration ---
    let config = FptConfig::load("config.toml")?;

    info!("Using {} Rayon threads.", rayon::current_num_threads());

    // --- Prepare Output Directory ---
    let parent = Path::new(&config.output.parent_directory).to_path_buf();
    match output::ensure_dir(&parent)? {
        DirStatus::Created => info!("Created output directory '{}'.", parent.display()),
        DirStatus::AlreadyPresent => {
            info!("Output directory '{}' already exists. Run continues.", parent.display())
        }
    }

    // --- Persist Run Parameters ---
    // Written before simulating so the run is auditable even if interrupted.
    let parameter_base = parent.join("parameters");
    write_parameters(&parameter_base, &config.to_parameter_set())?;
    info!("Run parameters saved under '{}.dat'.", parameter_base.display());

    // --- Open FPT Output Stream ---
    let fpt_path = output::fpt_output_path(&config);
    let mut sink = output::create_fpt_writer(&fpt_path)?;
    info!("Streaming first-passage times to '{}'.", fpt_path.display());

    // --- Run All Trajectories ---
    let num_trajectories = config.run.num_trajectories as usize;
    let simulator = TrajectorySimulator::new(config.clone());
    let record_discrete = config.output.record_discrete;
    let discrete_stride = config.output.discrete_stride;
    let base_filename = config.output.base_filename.clone();
    let discrete_dir = parent.clone();

    info!("Running {} trajectories...", num_trajectories);
    let start_time = Instant::now();
    let summary = runner::run_all(
        num_trajectories,
        |id| {
            if record_discrete {
                let mut recorder = DiscreteRecorder::new(discrete_stride);
                let outcome = simulator.run_recorded(id as u64, Some(&mut recorder))?;
                output::write_discrete_trajectory(
                    &discrete_dir,
                    &base_filename,
                    id,
                    recorder.labels(),
                )?;
                Ok(outcome)
            } else {
                simulator.run(id as u64)
            }
        },
        &mut sink,
    )?;
    info!(
        "Completed {} trajectories in {:.2} s: {} succeeded, {} failed, {} errored.",
        summary.completed,
        start_time.elapsed().as_secs_f64(),
        summary.succeeded,
        summary.failed,
        summary.errored
    );

    // --- Bootstrap Estimation ---
    // Zero successes is a normal termination; estimation on an empty sample
    // is a precondition violation, so it is skipped explicitly.
    let estimate = if summary.sample.is_empty() {
        warn!("No successful trajectories; skipping bootstrap estimation.");
        None
    } else {
        let (mfpt, std_dev) =
            estimate::bootstrap_mfpt(&summary.sample, config.run.num_resamples as usize)?;
        info!(
            "Mean first-passage time: {:.4} +/- {:.4} ({} successes, {} resamples).",
            mfpt,
            std_dev,
            summary.sample.len(),
            config.run.num_resamples
        );
        Some((mfpt, std_dev))
    };

    // --- Save Run Summary ---
    if config.output.save_summary {
        let report = output::RunReport::new(&config, &summary, estimate);
        let summary_path = parent.join(format!("{}_summary.json", config.output.base_filename));
        output::write_summary(&summary_path, &report)?;
        info!("Run summary saved to '{}'.", summary_path.display());
    } else {
        info!("Skipping run summary as per config (save_summary is false).");
    }

    info!("First-passage-time run complete.");
    Ok(())
}
