use anyhow::Result;
use fpt_common::{Quat, Vec3};
use rand::prelude::*;
use rand::distr::Uniform;
use rand_distr::StandardNormal;

/// One diffusing rigid body. Owned by a single trajectory and mutated in
/// place by the engine's step operation.
#[derive(Debug, Clone)]
pub struct Particle {
    pub id: u32,
    pub position: Vec3,
    pub orientation: Quat,
    /// Translational diffusion coefficient.
    pub d: f64,
    /// Rotational diffusion coefficient.
    pub d_rot: f64,
}

/// Fixed-size particle list, created once per trajectory.
pub type ParticleList = Vec<Particle>;

const MAX_PLACEMENT_ATTEMPTS: usize = 1000;

/// Generates a random non-overlapping particle list inside a cubic box of
/// side `boxsize` centered at the origin. Placement is deterministic in
/// `seed` so initial configurations are reproducible per trajectory id.
pub fn random_particle_list(
    count: u32,
    boxsize: f64,
    overlap_threshold: f64,
    diffusion: f64,
    rot_diffusion: f64,
    seed: u64,
) -> Result<ParticleList> {
    let mut rng = StdRng::seed_from_u64(seed);
    let half = boxsize / 2.0;
    let coord_dist = Uniform::new(-half, half)?;

    let mut particles: ParticleList = Vec::with_capacity(count as usize);
    for id in 0..count {
        let mut placed = false;
        for _attempt in 0..MAX_PLACEMENT_ATTEMPTS {
            let candidate = Vec3::new(
                rng.sample(coord_dist),
                rng.sample(coord_dist),
                rng.sample(coord_dist),
            );
            let overlaps = particles
                .iter()
                .any(|p| p.position.distance(candidate) < overlap_threshold);
            if overlaps {
                continue;
            }
            particles.push(Particle {
                id,
                position: candidate,
                orientation: random_orientation(&mut rng),
                d: diffusion,
                d_rot: rot_diffusion,
            });
            placed = true;
            break;
        }
        if !placed {
            anyhow::bail!(
                "Could not place particle {} without overlap after {} attempts (boxsize {}, threshold {}).",
                id,
                MAX_PLACEMENT_ATTEMPTS,
                boxsize,
                overlap_threshold
            );
        }
    }
    Ok(particles)
}

/// Uniform random rotation: four standard normals, normalized onto S3.
fn random_orientation(rng: &mut StdRng) -> Quat {
    let w: f64 = rng.sample(StandardNormal);
    let x: f64 = rng.sample(StandardNormal);
    let y: f64 = rng.sample(StandardNormal);
    let z: f64 = rng.sample(StandardNormal);
    Quat::new(w, x, y, z).normalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_gives_identical_configuration() {
        let a = random_particle_list(5, 6.0, 1.5, 1.0, 1.0, 42).unwrap();
        let b = random_particle_list(5, 6.0, 1.5, 1.0, 1.0, 42).unwrap();
        assert_eq!(a.len(), b.len());
        for (pa, pb) in a.iter().zip(b.iter()) {
            assert_eq!(pa.position, pb.position);
            assert_eq!(pa.orientation, pb.orientation);
        }
        let c = random_particle_list(5, 6.0, 1.5, 1.0, 1.0, 43).unwrap();
        assert!(a.iter().zip(c.iter()).any(|(pa, pc)| pa.position != pc.position));
    }

    #[test]
    fn respects_overlap_threshold() {
        let particles = random_particle_list(10, 8.0, 1.5, 1.0, 1.0, 7).unwrap();
        for i in 0..particles.len() {
            for j in (i + 1)..particles.len() {
                assert!(particles[i].position.distance(particles[j].position) >= 1.5);
            }
        }
    }

    #[test]
    fn orientations_are_unit_quaternions() {
        let particles = random_particle_list(5, 6.0, 1.5, 1.0, 1.0, 3).unwrap();
        for p in &particles {
            assert!((p.orientation.norm_squared() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn overcrowded_box_is_an_error() {
        // 50 particles with pairwise separation >= 2.0 cannot fit in a unit box.
        assert!(random_particle_list(50, 1.0, 2.0, 1.0, 1.0, 0).is_err());
    }
}
