use crate::trajectory::{Outcome, TrajectoryOutcome};
use anyhow::Result;
use log::{info, warn};
use rayon::prelude::*;
use std::io::Write;
use std::sync::mpsc;

/// Aggregate counts and the first-passage-time sample for one `run_all`
/// call. The sample holds Success elapsed times only, in completion order.
#[derive(Debug, Default, Clone)]
pub struct RunSummary {
    pub completed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub errored: usize,
    pub sample: Vec<f64>,
}

/// Fans `num_trajectories` independent simulations out over the rayon pool
/// and consumes their outcomes in completion order on the calling thread.
/// Each Success is appended to `sink` as `"<label> <elapsed>\n"` and flushed
/// before the next result is handled, so partial progress survives a crash
/// of the orchestrating process. Failures and per-trajectory errors are
/// logged and counted but never persisted, and never cancel sibling
/// trajectories.
///
/// The parallel iterator is driven from a plain scoped thread rather than a
/// `rayon::scope` task. The consumer loop below blocks on the channel, and a
/// blocked pool worker cannot execute anything, so on a one-worker pool a
/// scoped consumer would starve its own producer.
pub fn run_all<F, W>(num_trajectories: usize, simulate: F, sink: &mut W) -> Result<RunSummary>
where
    F: Fn(usize) -> Result<TrajectoryOutcome> + Sync,
    W: Write,
{
    let mut summary = RunSummary::default();
    let mut sink_error: Option<anyhow::Error> = None;
    let simulate = &simulate;
    let (tx, rx) = mpsc::channel::<(usize, Result<TrajectoryOutcome>)>();

    std::thread::scope(|s| {
        s.spawn(move || {
            (0..num_trajectories)
                .into_par_iter()
                .for_each_with(tx, |tx, id| {
                    // A dropped receiver only means the writer bailed out;
                    // in-flight trajectories still run to completion.
                    let _ = tx.send((id, simulate(id)));
                });
        });

        // Completion order, not submission order: downstream consumers
        // must not assume trajectory-index alignment in the output file.
        for (id, result) in rx.iter() {
            summary.completed += 1;
            match result {
                Ok(out) => match out.outcome {
                    Outcome::Success => {
                        summary.succeeded += 1;
                        summary.sample.push(out.elapsed);
                        if sink_error.is_none() {
                            let write = writeln!(sink, "{} {:.6}", out.outcome, out.elapsed)
                                .and_then(|_| sink.flush());
                            if let Err(e) = write {
                                sink_error = Some(e.into());
                            }
                        }
                        info!("Trajectory {} done: success at t = {:.4}", id, out.elapsed);
                    }
                    Outcome::Failure => {
                        summary.failed += 1;
                        info!("Trajectory {} done: failed at t = {:.4}", id, out.elapsed);
                    }
                },
                Err(e) => {
                    summary.errored += 1;
                    warn!("Trajectory {} aborted: {:#}", id, e);
                }
            }
        }
    });

    if let Some(e) = sink_error {
        return Err(e.context("Failed to append to first-passage-time output"));
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_lines(buf: &[u8]) -> Vec<(String, f64)> {
        String::from_utf8(buf.to_vec())
            .unwrap()
            .lines()
            .map(|line| {
                let mut parts = line.split_whitespace();
                let label = parts.next().unwrap().to_string();
                let time: f64 = parts.next().unwrap().parse().unwrap();
                assert!(parts.next().is_none());
                (label, time)
            })
            .collect()
    }

    #[test]
    fn one_failing_trajectory_does_not_disturb_the_rest() {
        let n = 8;
        let mut sink = Vec::new();
        let summary = run_all(
            n,
            |id| {
                if id == 3 {
                    anyhow::bail!("engine blew up");
                }
                Ok(TrajectoryOutcome { outcome: Outcome::Success, elapsed: id as f64 })
            },
            &mut sink,
        )
        .unwrap();

        assert_eq!(summary.completed, n);
        assert_eq!(summary.succeeded, n - 1);
        assert_eq!(summary.errored, 1);
        assert_eq!(summary.sample.len(), n - 1);
        assert_eq!(parse_lines(&sink).len(), n - 1);
    }

    #[test]
    fn only_successes_are_persisted() {
        // Even ids succeed at id * 1.0, odd ids fail at the time budget.
        let mut sink = Vec::new();
        let summary = run_all(
            10,
            |id| {
                if id % 2 == 0 {
                    Ok(TrajectoryOutcome { outcome: Outcome::Success, elapsed: id as f64 })
                } else {
                    Ok(TrajectoryOutcome { outcome: Outcome::Failure, elapsed: 600.0 })
                }
            },
            &mut sink,
        )
        .unwrap();

        assert_eq!(summary.completed, 10);
        assert_eq!(summary.succeeded, 5);
        assert_eq!(summary.failed, 5);

        let lines = parse_lines(&sink);
        assert_eq!(lines.len(), 5);
        let mut times: Vec<f64> = lines
            .iter()
            .map(|(label, time)| {
                assert_eq!(label, "Success");
                *time
            })
            .collect();
        times.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(times, vec![0.0, 2.0, 4.0, 6.0, 8.0]);

        let mut sample = summary.sample.clone();
        sample.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(sample, vec![0.0, 2.0, 4.0, 6.0, 8.0]);
    }

    #[test]
    fn completes_on_a_single_worker_pool() {
        // With one pool worker the consumer must not occupy it: run_all is
        // invoked from inside the pool, so the calling thread is the pool's
        // only worker and blocks on the channel for the whole run.
        let pool = rayon::ThreadPoolBuilder::new().num_threads(1).build().unwrap();
        let mut sink = Vec::new();
        let summary = pool
            .install(|| {
                run_all(
                    6,
                    |id| Ok(TrajectoryOutcome { outcome: Outcome::Success, elapsed: id as f64 }),
                    &mut sink,
                )
            })
            .unwrap();
        assert_eq!(summary.completed, 6);
        assert_eq!(summary.succeeded, 6);
        assert_eq!(parse_lines(&sink).len(), 6);
    }

    #[test]
    fn zero_successes_still_terminates_normally() {
        let mut sink = Vec::new();
        let summary = run_all(
            4,
            |_| Ok(TrajectoryOutcome { outcome: Outcome::Failure, elapsed: 600.0 }),
            &mut sink,
        )
        .unwrap();
        assert_eq!(summary.failed, 4);
        assert!(summary.sample.is_empty());
        assert!(sink.is_empty());
    }
}
