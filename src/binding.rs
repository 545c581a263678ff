use crate::engine::SimulationEngine;
use crate::particle::ParticleList;
use serde::{Deserialize, Serialize};

/// Discrete classification of a particle pair, as reported by the engine's
/// classifier. `Bound(k)` values are the classifier's numbered metastable
/// configurations; which of them count as bound for topology purposes is
/// decided by the [`BindingDetector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BindingLabel {
    Unbound,
    Bound(u8),
}

/// Per-trajectory binding state, recomputed from scratch at every evaluation
/// point. Never maintained incrementally: a pair may transiently leave and
/// re-enter a bound label, so the tally must be a pure function of the
/// current particle configuration rather than of observed transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingTally {
    /// Total number of bound pairs.
    pub total: u32,
    /// Bound-pair count per particle, indexed by particle order.
    pub per_particle: Vec<u32>,
}

/// Wraps the engine's pairwise classifier and the configured set of labels
/// that count as bound.
#[derive(Debug, Clone)]
pub struct BindingDetector {
    bound_labels: Vec<u8>,
}

impl BindingDetector {
    pub fn new(bound_labels: Vec<u8>) -> Self {
        Self { bound_labels }
    }

    pub fn is_bound(&self, label: BindingLabel) -> bool {
        match label {
            BindingLabel::Unbound => false,
            BindingLabel::Bound(k) => self.bound_labels.contains(&k),
        }
    }

    /// Classifies every unordered pair and accumulates the tally. O(n^2) over
    /// the particle list, acceptable because lists are small (tens at most).
    pub fn tally<E: SimulationEngine + ?Sized>(
        &self,
        engine: &E,
        particles: &ParticleList,
    ) -> BindingTally {
        let n = particles.len();
        let mut tally = BindingTally { total: 0, per_particle: vec![0; n] };
        for i in 0..n {
            for j in (i + 1)..n {
                let label = engine.classify_pair_state(&particles[i], &particles[j]);
                if self.is_bound(label) {
                    tally.total += 1;
                    tally.per_particle[i] += 1;
                    tally.per_particle[j] += 1;
                }
            }
        }
        tally
    }
}

/// Terminal decision for one evaluation point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    Continue,
    Success { elapsed: f64 },
    Failure { elapsed: f64 },
}

/// Decides, from the pairwise binding tally and the engine clock, whether a
/// trajectory continues, has reached the target topology, or has exhausted
/// its simulated-time budget.
#[derive(Debug, Clone)]
pub struct TerminationPolicy {
    detector: BindingDetector,
    target_bindings: u32,
    time_budget: f64,
}

impl TerminationPolicy {
    pub fn new(detector: BindingDetector, target_bindings: u32, time_budget: f64) -> Self {
        Self { detector, target_bindings, time_budget }
    }

    pub fn detector(&self) -> &BindingDetector {
        &self.detector
    }

    /// Recomputes the tally and applies [`Self::verdict`].
    pub fn evaluate<E: SimulationEngine + ?Sized>(
        &self,
        engine: &E,
        particles: &ParticleList,
    ) -> Verdict {
        let tally = self.detector.tally(engine, particles);
        self.verdict(&tally, engine.clock())
    }

    /// The binding check precedes the time check: an evaluation that reaches
    /// the target on the same step the budget runs out is a Success.
    pub fn verdict(&self, tally: &BindingTally, clock: f64) -> Verdict {
        if tally.total >= self.target_bindings {
            Verdict::Success { elapsed: clock }
        } else if clock >= self.time_budget {
            Verdict::Failure { elapsed: clock }
        } else {
            Verdict::Continue
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testutil::{stub_particles, StubEngine};

    #[test]
    fn detector_honors_configured_bound_set() {
        let detector = BindingDetector::new(vec![1, 2]);
        assert!(detector.is_bound(BindingLabel::Bound(1)));
        assert!(detector.is_bound(BindingLabel::Bound(2)));
        assert!(!detector.is_bound(BindingLabel::Bound(3)));
        assert!(!detector.is_bound(BindingLabel::Unbound));
    }

    #[test]
    fn tally_counts_all_pairs_and_both_endpoints() {
        // Every pair classified bound: 5 particles -> 10 pairs, degree 4 each.
        let mut engine = StubEngine::new(0.1, vec![BindingLabel::Bound(1)]);
        let mut particles = stub_particles(5);
        engine.step(&mut particles).unwrap();
        let detector = BindingDetector::new(vec![1, 2, 3, 4]);
        let tally = detector.tally(&engine, &particles);
        assert_eq!(tally.total, 10);
        assert_eq!(tally.per_particle, vec![4, 4, 4, 4, 4]);
    }

    #[test]
    fn tally_is_pure_in_current_configuration() {
        // Scripted classifier: bound, then unbound again. The tally must
        // follow the classifier back down rather than latching.
        let mut engine = StubEngine::new(
            0.1,
            vec![BindingLabel::Bound(1), BindingLabel::Unbound],
        );
        let mut particles = stub_particles(3);
        let detector = BindingDetector::new(vec![1]);

        engine.step(&mut particles).unwrap();
        assert_eq!(detector.tally(&engine, &particles).total, 3);
        engine.step(&mut particles).unwrap();
        assert_eq!(detector.tally(&engine, &particles).total, 0);
    }

    #[test]
    fn evaluate_reflects_the_current_engine_state() {
        // Unbound on the first step, fully bound on the second.
        let mut engine = StubEngine::new(
            0.1,
            vec![BindingLabel::Unbound, BindingLabel::Bound(1)],
        );
        let mut particles = stub_particles(3);
        let policy = TerminationPolicy::new(BindingDetector::new(vec![1]), 3, 600.0);

        engine.step(&mut particles).unwrap();
        assert_eq!(policy.evaluate(&engine, &particles), Verdict::Continue);
        engine.step(&mut particles).unwrap();
        match policy.evaluate(&engine, &particles) {
            Verdict::Success { elapsed } => assert!((elapsed - 0.2).abs() < 1e-12),
            other => panic!("expected Success, got {:?}", other),
        }
    }

    #[test]
    fn binding_check_precedes_time_check() {
        let policy = TerminationPolicy::new(BindingDetector::new(vec![1]), 5, 1.0);
        let tally = BindingTally { total: 5, per_particle: vec![2; 5] };
        // Budget exceeded on the same evaluation the target is reached.
        assert_eq!(policy.verdict(&tally, 2.0), Verdict::Success { elapsed: 2.0 });
    }

    #[test]
    fn verdict_covers_all_three_outcomes() {
        let policy = TerminationPolicy::new(BindingDetector::new(vec![1]), 5, 1.0);
        let below = BindingTally { total: 4, per_particle: vec![0; 5] };
        assert_eq!(policy.verdict(&below, 0.5), Verdict::Continue);
        assert_eq!(policy.verdict(&below, 1.0), Verdict::Failure { elapsed: 1.0 });
        let reached = BindingTally { total: 5, per_particle: vec![2; 5] };
        assert_eq!(policy.verdict(&reached, 0.5), Verdict::Success { elapsed: 0.5 });
    }
}
