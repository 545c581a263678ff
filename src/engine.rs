use crate::binding::BindingLabel;
use crate::particle::{Particle, ParticleList};
use anyhow::Result;
use fpt_common::{Quat, Vec3};
use rand::prelude::*;
use rand_distr::StandardNormal;

/// Capability seam to the stochastic-dynamics engine. The harness only ever
/// drives an engine through this trait, so any compliant implementation
/// (including a deterministic stub) can be substituted for testing.
pub trait SimulationEngine {
    /// Advances the particle list by one bounded physics step and the
    /// internal clock by the corresponding simulated-time increment.
    fn step(&mut self, particles: &mut ParticleList) -> Result<()>;

    /// Elapsed simulated time. Monotonically non-decreasing.
    fn clock(&self) -> f64;

    /// Classifies the binding state of an unordered particle pair.
    fn classify_pair_state(&self, a: &Particle, b: &Particle) -> BindingLabel;
}

/// Periodic cubic box centered at the origin.
#[derive(Debug, Clone, Copy)]
pub struct PeriodicBox {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl PeriodicBox {
    pub fn cube(side: f64) -> Self {
        Self { x: side, y: side, z: side }
    }

    /// Wraps a position back into the box.
    pub fn wrap(&self, p: Vec3) -> Vec3 {
        Vec3::new(
            p.x - self.x * (p.x / self.x).round(),
            p.y - self.y * (p.y / self.y).round(),
            p.z - self.z * (p.z / self.z).round(),
        )
    }

    /// Minimum-image displacement.
    pub fn minimum_image(&self, d: Vec3) -> Vec3 {
        self.wrap(d)
    }
}

/// Pair interaction consumed by the engine. Forces obey Newton's third law;
/// torques are reported per particle.
pub trait PairPotential: Send + Sync {
    /// Returns (force on `a`, torque on `a`, torque on `b`) for the
    /// minimum-image displacement `rel` = b - a. The force on `b` is the
    /// negation of the force on `a`.
    fn force_torque(&self, a: &Particle, b: &Particle, rel: Vec3) -> (Vec3, Vec3, Vec3);
}

/// Two-patch particle with an isotropic attractive well plus an angular term
/// that torques the nearest patch of each particle toward its neighbor.
#[derive(Debug, Clone)]
pub struct PatchyParticleAngular {
    sigma: f64,
    strength: f64,
    angular_strength: f64,
    patches: [Vec3; 2],
    cutoff: f64,
}

impl PatchyParticleAngular {
    pub fn new(sigma: f64, strength: f64, angular_strength: f64, patch_angle: f64) -> Self {
        Self {
            sigma,
            strength,
            angular_strength,
            patches: patch_coordinates(patch_angle),
            cutoff: 2.0 * sigma,
        }
    }

    /// The patch of `p` (in the world frame) closest to direction `toward`.
    fn nearest_patch(&self, p: &Particle, toward: Vec3) -> Vec3 {
        let a = p.orientation.rotate(self.patches[0]);
        let b = p.orientation.rotate(self.patches[1]);
        if a.dot(toward) >= b.dot(toward) {
            a
        } else {
            b
        }
    }
}

impl PairPotential for PatchyParticleAngular {
    fn force_torque(&self, a: &Particle, b: &Particle, rel: Vec3) -> (Vec3, Vec3, Vec3) {
        let r = rel.length();
        if r >= self.cutoff || r < 1e-12 {
            return (Vec3::zero(), Vec3::zero(), Vec3::zero());
        }
        let r_hat = rel.scale(1.0 / r);

        // Isotropic part: U(r) = strength * ((sigma/r)^2 - 2 sigma/r), a soft
        // well with its minimum at r = sigma. With rel = b - a, the force on
        // a is (dU/dr) r_hat: repulsive below sigma, attractive above.
        let s_over_r = self.sigma / r;
        let du_dr = self.strength * (2.0 * self.sigma / (r * r) - 2.0 * s_over_r * s_over_r / r);
        let force_a = r_hat.scale(du_dr);

        // Angular part: torque each particle's nearest patch toward the
        // neighbor, fading out linearly at the cutoff.
        let weight = self.angular_strength * (1.0 - r / self.cutoff);
        let torque_a = self.nearest_patch(a, r_hat).cross(r_hat).scale(weight);
        let torque_b = self.nearest_patch(b, -r_hat).cross(-r_hat).scale(weight);

        (force_a, torque_a, torque_b)
    }
}

fn patch_coordinates(patch_angle: f64) -> [Vec3; 2] {
    let half = patch_angle / 2.0;
    [
        Vec3::new(half.cos(), half.sin(), 0.0),
        Vec3::new(half.cos(), -half.sin(), 0.0),
    ]
}

/// Geometric pair classifier: compares the relative position (in the frame
/// of the lower-indexed particle) and relative orientation of a pair against
/// the metastable bound configurations of the two-patch geometry, within
/// configurable tolerances.
#[derive(Debug, Clone)]
pub struct PairStateClassifier {
    position_tolerance: f64,
    orientation_tolerance: f64,
    bound_positions: [Vec3; 4],
    bound_orientations: [Quat; 4],
}

impl PairStateClassifier {
    pub fn new(
        sigma: f64,
        patch_angle: f64,
        position_tolerance: f64,
        orientation_tolerance: f64,
    ) -> Self {
        let half = patch_angle / 2.0;
        let patch_angles = [half, -half];
        let z_axis = Vec3::new(0.0, 0.0, 1.0);

        // Bound state k = 2i + j + 1 pairs patch i of the first particle with
        // patch j of the second: the second particle sits one sigma out along
        // patch i, rotated so its patch j points back along the bond.
        let mut bound_positions = [Vec3::zero(); 4];
        let mut bound_orientations = [Quat::identity(); 4];
        for i in 0..2 {
            for j in 0..2 {
                let k = 2 * i + j;
                bound_positions[k] =
                    Vec3::new(patch_angles[i].cos(), patch_angles[i].sin(), 0.0).scale(sigma);
                let rotation = std::f64::consts::PI + patch_angles[i] - patch_angles[j];
                bound_orientations[k] = Quat::from_axis_angle(z_axis, rotation);
            }
        }

        Self { position_tolerance, orientation_tolerance, bound_positions, bound_orientations }
    }

    pub fn classify(&self, a: &Particle, b: &Particle, rel: Vec3) -> BindingLabel {
        // Order the pair by index so the label is symmetric in (a, b).
        let (first, second, rel) = if a.id <= b.id { (a, b, rel) } else { (b, a, -rel) };
        let inv = first.orientation.conjugate();
        let rel_body = inv.rotate(rel);
        let rel_orient = inv * second.orientation;

        for k in 0..4 {
            if rel_body.distance(self.bound_positions[k]) <= self.position_tolerance
                && rel_orient.angle_to(self.bound_orientations[k]) <= self.orientation_tolerance
            {
                return BindingLabel::Bound(k as u8 + 1);
            }
        }
        BindingLabel::Unbound
    }
}

/// Reference engine: Euler-Maruyama integration of overdamped Langevin
/// dynamics for rigid bodies (kT = 1), with a periodic box boundary and a
/// pluggable pair potential.
pub struct OverdampedLangevin {
    dt: f64,
    clock: f64,
    rng: StdRng,
    boundary: Option<PeriodicBox>,
    potential: Option<Box<dyn PairPotential>>,
    classifier: PairStateClassifier,
}

impl OverdampedLangevin {
    /// A negative `seed` requests fresh OS entropy for the dynamics stream;
    /// a non-negative one gives a reproducible stream.
    pub fn new(dt: f64, seed: i64, classifier: PairStateClassifier) -> Self {
        let rng = if seed < 0 {
            StdRng::from_os_rng()
        } else {
            StdRng::seed_from_u64(seed as u64)
        };
        Self { dt, clock: 0.0, rng, boundary: None, potential: None, classifier }
    }

    pub fn set_boundary(&mut self, boundary: PeriodicBox) {
        self.boundary = Some(boundary);
    }

    pub fn set_pair_potential(&mut self, potential: Box<dyn PairPotential>) {
        self.potential = Some(potential);
    }

    fn relative(&self, from: Vec3, to: Vec3) -> Vec3 {
        let d = to - from;
        match &self.boundary {
            Some(b) => b.minimum_image(d),
            None => d,
        }
    }

    fn gaussian_vec(&mut self) -> Vec3 {
        Vec3::new(
            self.rng.sample(StandardNormal),
            self.rng.sample(StandardNormal),
            self.rng.sample(StandardNormal),
        )
    }
}

impl SimulationEngine for OverdampedLangevin {
    fn step(&mut self, particles: &mut ParticleList) -> Result<()> {
        let n = particles.len();
        let mut forces = vec![Vec3::zero(); n];
        let mut torques = vec![Vec3::zero(); n];

        if let Some(potential) = &self.potential {
            for i in 0..n {
                for j in (i + 1)..n {
                    let rel = self.relative(particles[i].position, particles[j].position);
                    let (f, ta, tb) = potential.force_torque(&particles[i], &particles[j], rel);
                    forces[i] = forces[i] + f;
                    forces[j] = forces[j] - f;
                    torques[i] = torques[i] + ta;
                    torques[j] = torques[j] + tb;
                }
            }
        }

        let dt = self.dt;
        for i in 0..n {
            let (d, d_rot) = (particles[i].d, particles[i].d_rot);
            let trans_noise = self.gaussian_vec().scale((2.0 * d * dt).sqrt());
            let rot_noise = self.gaussian_vec().scale((2.0 * d_rot * dt).sqrt());
            let p = &mut particles[i];

            let mut position = p.position + forces[i].scale(d * dt) + trans_noise;
            if let Some(b) = &self.boundary {
                position = b.wrap(position);
            }
            p.position = position;

            let dphi = torques[i].scale(d_rot * dt) + rot_noise;
            let angle = dphi.length();
            if angle > 1e-12 {
                let rotation = Quat::from_axis_angle(dphi, angle);
                p.orientation = (rotation * p.orientation).normalize();
            }
        }

        self.clock += dt;
        Ok(())
    }

    fn clock(&self) -> f64 {
        self.clock
    }

    fn classify_pair_state(&self, a: &Particle, b: &Particle) -> BindingLabel {
        let rel = self.relative(a.position, b.position);
        self.classifier.classify(a, b, rel)
    }
}

#[cfg(test)]
pub mod testutil {
    use super::*;

    /// Deterministic engine stub: advances the clock by a fixed increment per
    /// step and reports a scripted label for every pair. The last script
    /// entry repeats once the script is exhausted.
    pub struct StubEngine {
        dt: f64,
        clock: f64,
        steps: usize,
        script: Vec<BindingLabel>,
    }

    impl StubEngine {
        pub fn new(dt: f64, script: Vec<BindingLabel>) -> Self {
            assert!(!script.is_empty());
            Self { dt, clock: 0.0, steps: 0, script }
        }
    }

    impl SimulationEngine for StubEngine {
        fn step(&mut self, _particles: &mut ParticleList) -> Result<()> {
            self.steps += 1;
            self.clock += self.dt;
            Ok(())
        }

        fn clock(&self) -> f64 {
            self.clock
        }

        fn classify_pair_state(&self, _a: &Particle, _b: &Particle) -> BindingLabel {
            let idx = self.steps.saturating_sub(1).min(self.script.len() - 1);
            self.script[idx]
        }
    }

    /// Engine stub whose step always fails, for isolation tests.
    pub struct BrokenEngine;

    impl SimulationEngine for BrokenEngine {
        fn step(&mut self, _particles: &mut ParticleList) -> Result<()> {
            anyhow::bail!("synthetic engine failure")
        }

        fn clock(&self) -> f64 {
            0.0
        }

        fn classify_pair_state(&self, _a: &Particle, _b: &Particle) -> BindingLabel {
            BindingLabel::Unbound
        }
    }

    pub fn stub_particles(count: u32) -> ParticleList {
        (0..count)
            .map(|id| Particle {
                id,
                position: Vec3::new(id as f64, 0.0, 0.0),
                orientation: Quat::identity(),
                d: 1.0,
                d_rot: 1.0,
            })
            .collect()
    }
}
