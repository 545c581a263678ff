use crate::binding::{BindingDetector, TerminationPolicy, Verdict};
use crate::engine::{
    OverdampedLangevin, PairStateClassifier, PatchyParticleAngular, PeriodicBox, SimulationEngine,
};
use crate::particle::{random_particle_list, ParticleList};
use anyhow::Result;
use fpt_common::FptConfig;
use std::fmt;

/// Terminal label of one trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Success => write!(f, "Success"),
            Outcome::Failure => write!(f, "Failure"),
        }
    }
}

/// Immutable terminal record, produced exactly once per trajectory.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrajectoryOutcome {
    pub outcome: Outcome,
    pub elapsed: f64,
}

/// Records a strided discrete-state sequence (the total bound-pair count at
/// each sampled step) for the discretized trajectory files.
#[derive(Debug, Clone)]
pub struct DiscreteRecorder {
    stride: u64,
    steps: u64,
    labels: Vec<i32>,
}

impl DiscreteRecorder {
    pub fn new(stride: u32) -> Self {
        Self { stride: stride.max(1) as u64, steps: 0, labels: Vec::new() }
    }

    fn observe(&mut self, total_bindings: u32) {
        self.steps += 1;
        if self.steps % self.stride == 0 {
            self.labels.push(total_bindings as i32);
        }
    }

    pub fn labels(&self) -> &[i32] {
        &self.labels
    }
}

/// Drives one trajectory to its terminal outcome: step the engine, then
/// evaluate the termination policy, until Success or Failure. Performs no
/// I/O; the recorder, if any, only accumulates in memory.
pub fn simulate<E: SimulationEngine + ?Sized>(
    engine: &mut E,
    particles: &mut ParticleList,
    policy: &TerminationPolicy,
    mut recorder: Option<&mut DiscreteRecorder>,
) -> Result<TrajectoryOutcome> {
    loop {
        engine.step(particles)?;
        // The recorded path needs the tally itself; the bare path hands the
        // whole evaluation to the policy.
        let verdict = match recorder.as_deref_mut() {
            Some(rec) => {
                let tally = policy.detector().tally(engine, particles);
                rec.observe(tally.total);
                policy.verdict(&tally, engine.clock())
            }
            None => policy.evaluate(engine, particles),
        };
        match verdict {
            Verdict::Continue => {}
            Verdict::Success { elapsed } => {
                return Ok(TrajectoryOutcome { outcome: Outcome::Success, elapsed })
            }
            Verdict::Failure { elapsed } => {
                return Ok(TrajectoryOutcome { outcome: Outcome::Failure, elapsed })
            }
        }
    }
}

/// Builds the engine, boundary, potential, and initial particle list for one
/// trajectory id and runs it to completion. Each trajectory owns independent
/// instances end to end, so an engine failure can only abort its own run.
pub struct TrajectorySimulator {
    config: FptConfig,
}

impl TrajectorySimulator {
    pub fn new(config: FptConfig) -> Self {
        Self { config }
    }

    pub fn run(&self, trajectory_id: u64) -> Result<TrajectoryOutcome> {
        self.run_recorded(trajectory_id, None)
    }

    pub fn run_recorded(
        &self,
        trajectory_id: u64,
        recorder: Option<&mut DiscreteRecorder>,
    ) -> Result<TrajectoryOutcome> {
        let cfg = &self.config;

        // Two independent seeds per trajectory: a strictly negative dynamics
        // seed requests fresh OS entropy (uncorrelated sample paths across
        // repeated runs), while the placement seed is the unnegated id so
        // initial configurations stay reproducible for debugging.
        let dynamics_seed = -(trajectory_id as i64) - 1;
        let classifier = PairStateClassifier::new(
            cfg.potential.sigma,
            cfg.potential.patch_angle,
            cfg.binding.position_tolerance,
            cfg.binding.orientation_tolerance,
        );
        let mut engine = OverdampedLangevin::new(cfg.run.dt, dynamics_seed, classifier);
        engine.set_boundary(PeriodicBox::cube(cfg.run.boxsize));
        engine.set_pair_potential(Box::new(PatchyParticleAngular::new(
            cfg.potential.sigma,
            cfg.potential.strength,
            cfg.potential.angular_strength,
            cfg.potential.patch_angle,
        )));

        let mut particles = random_particle_list(
            cfg.particles.count,
            cfg.run.boxsize,
            cfg.particles.overlap_threshold,
            cfg.particles.diffusion,
            cfg.particles.rot_diffusion,
            trajectory_id,
        )?;

        let policy = TerminationPolicy::new(
            BindingDetector::new(cfg.binding.bound_states.clone()),
            cfg.binding.target_bindings,
            cfg.run.time_budget,
        );

        simulate(&mut engine, &mut particles, &policy, recorder)
    }
}
