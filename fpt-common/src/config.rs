use crate::params::{ParamValue, ParameterSet};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

// Particle properties shared by every trajectory
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ParticleConfig {
    pub count: u32,
    pub diffusion: f64,
    pub rot_diffusion: f64,
    /// Minimum allowed pair separation when generating initial configurations.
    pub overlap_threshold: f64,
}

// Pair potential parameters (patchy particle with angular dependence)
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct PotentialConfig {
    pub sigma: f64,
    pub strength: f64,
    pub angular_strength: f64,
    /// Angle between the two patches, in radians. Defaults to the ring
    /// geometry of a five-membered closure (3*pi/5).
    #[serde(default = "default_patch_angle")]
    pub patch_angle: f64,
}

fn default_patch_angle() -> f64 {
    0.6 * std::f64::consts::PI
}

// Binding-state classification and target topology
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct BindingConfig {
    /// Classifier labels that count as bound for topology purposes.
    pub bound_states: Vec<u8>,
    /// Minimum total bound-pair count defining the target topology.
    pub target_bindings: u32,
    #[serde(default = "default_position_tolerance")]
    pub position_tolerance: f64,
    #[serde(default = "default_orientation_tolerance")]
    pub orientation_tolerance: f64,
}

fn default_position_tolerance() -> f64 {
    0.5
}

// Lax by default: ring closure bends the pair binding angle.
fn default_orientation_tolerance() -> f64 {
    std::f64::consts::PI
}

// Integration and sampling settings for one run
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct RunConfig {
    pub dt: f64,
    /// Simulated-time budget after which a trajectory counts as failed.
    pub time_budget: f64,
    pub num_trajectories: u32,
    /// Number of bootstrap resamples used for the final MFPT estimate.
    pub num_resamples: u32,
    pub boxsize: f64,
}

// Output settings
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct OutputConfig {
    pub parent_directory: String,
    pub base_filename: String,
    #[serde(default)]
    pub record_discrete: bool,
    #[serde(default = "default_discrete_stride")]
    pub discrete_stride: u32,
    #[serde(default = "default_save_summary")]
    pub save_summary: bool,
}

fn default_discrete_stride() -> u32 {
    50
}

fn default_save_summary() -> bool {
    true
}

/// Main harness configuration, loaded from `config.toml`.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct FptConfig {
    pub particles: ParticleConfig,
    pub potential: PotentialConfig,
    pub binding: BindingConfig,
    pub run: RunConfig,
    pub output: OutputConfig,
}

impl FptConfig {
    /// Loads the harness configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let config_str = std::fs::read_to_string(path_ref)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path_ref.display(), e))?;
        let config: FptConfig = toml::from_str(&config_str)
            .map_err(|e| anyhow::anyhow!("Failed to parse TOML from '{}': {}", path_ref.display(), e))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.particles.count < 2 {
            anyhow::bail!("particles.count must be at least 2 to form a pair.");
        }
        if self.particles.diffusion <= 0.0 || self.particles.rot_diffusion <= 0.0 {
            anyhow::bail!("Diffusion coefficients must be positive.");
        }
        if self.particles.overlap_threshold < 0.0 {
            anyhow::bail!("particles.overlap_threshold must be non-negative.");
        }
        if self.potential.sigma <= 0.0 {
            anyhow::bail!("potential.sigma must be positive.");
        }
        if self.run.dt <= 0.0 {
            anyhow::bail!("run.dt must be positive.");
        }
        if self.run.time_budget <= 0.0 {
            anyhow::bail!("run.time_budget must be positive.");
        }
        if self.run.boxsize <= 0.0 {
            anyhow::bail!("run.boxsize must be positive.");
        }
        if self.run.num_trajectories == 0 {
            anyhow::bail!("run.num_trajectories must be greater than 0.");
        }
        if self.run.num_resamples == 0 {
            anyhow::bail!("run.num_resamples must be at least 1.");
        }
        if self.binding.bound_states.is_empty() {
            anyhow::bail!("binding.bound_states must name at least one bound label.");
        }
        if self.binding.bound_states.iter().any(|&s| s == 0) {
            anyhow::bail!("Label 0 is reserved for the unbound state.");
        }
        let num_pairs = self.particles.count * (self.particles.count - 1) / 2;
        if self.binding.target_bindings == 0 || self.binding.target_bindings > num_pairs {
            anyhow::bail!(
                "binding.target_bindings must be in 1..={} for {} particles.",
                num_pairs,
                self.particles.count
            );
        }
        Ok(())
    }

    /// Flattens the run parameters into the set persisted by the parameter
    /// store next to the simulation output.
    pub fn to_parameter_set(&self) -> ParameterSet {
        let mut set = ParameterSet::new();
        set.insert("num_particles".into(), ParamValue::Int(self.particles.count as i64));
        set.insert("diffusion".into(), ParamValue::Float(self.particles.diffusion));
        set.insert("rot_diffusion".into(), ParamValue::Float(self.particles.rot_diffusion));
        set.insert("overlap_threshold".into(), ParamValue::Float(self.particles.overlap_threshold));
        set.insert("sigma".into(), ParamValue::Float(self.potential.sigma));
        set.insert("strength".into(), ParamValue::Float(self.potential.strength));
        set.insert("angular_strength".into(), ParamValue::Float(self.potential.angular_strength));
        set.insert("patch_angle".into(), ParamValue::Float(self.potential.patch_angle));
        set.insert(
            "bound_states".into(),
            ParamValue::IntList(self.binding.bound_states.iter().map(|&s| s as i64).collect()),
        );
        set.insert("target_bindings".into(), ParamValue::Int(self.binding.target_bindings as i64));
        set.insert("position_tolerance".into(), ParamValue::Float(self.binding.position_tolerance));
        set.insert(
            "orientation_tolerance".into(),
            ParamValue::Float(self.binding.orientation_tolerance),
        );
        set.insert("dt".into(), ParamValue::Float(self.run.dt));
        set.insert("time_budget".into(), ParamValue::Float(self.run.time_budget));
        set.insert("num_trajectories".into(), ParamValue::Int(self.run.num_trajectories as i64));
        set.insert("num_resamples".into(), ParamValue::Int(self.run.num_resamples as i64));
        set.insert("boxsize".into(), ParamValue::Float(self.run.boxsize));
        set.insert("base_filename".into(), ParamValue::Text(self.output.base_filename.clone()));
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
        [particles]
        count = 5
        diffusion = 1.0
        rot_diffusion = 1.0
        overlap_threshold = 1.5

        [potential]
        sigma = 1.0
        strength = 160.0
        angular_strength = 20.0

        [binding]
        bound_states = [1, 2, 3, 4]
        target_bindings = 5

        [run]
        dt = 0.0001
        time_budget = 600.0
        num_trajectories = 100
        num_resamples = 1000
        boxsize = 6.0

        [output]
        parent_directory = "data/first_passage_times"
        base_filename = "pentamer_fpts"
    "#;

    #[test]
    fn loads_sample_config_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = FptConfig::load(&path).unwrap();
        assert_eq!(config.particles.count, 5);
        assert_eq!(config.binding.bound_states, vec![1, 2, 3, 4]);
        // Defaults filled in for omitted keys
        assert!((config.potential.patch_angle - 0.6 * std::f64::consts::PI).abs() < 1e-12);
        assert!(!config.output.record_discrete);
        assert_eq!(config.output.discrete_stride, 50);
    }

    #[test]
    fn rejects_unreachable_binding_target() {
        let mut config: FptConfig = toml::from_str(SAMPLE).unwrap();
        config.binding.target_bindings = 11; // 5 particles only have 10 pairs
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_reserved_unbound_label() {
        let mut config: FptConfig = toml::from_str(SAMPLE).unwrap();
        config.binding.bound_states = vec![0, 1];
        assert!(config.validate().is_err());
    }

    #[test]
    fn parameter_set_covers_run_parameters() {
        let config: FptConfig = toml::from_str(SAMPLE).unwrap();
        let set = config.to_parameter_set();
        assert_eq!(set.get("num_particles"), Some(&ParamValue::Int(5)));
        assert_eq!(set.get("dt"), Some(&ParamValue::Float(0.0001)));
        assert_eq!(set.get("bound_states"), Some(&ParamValue::IntList(vec![1, 2, 3, 4])));
    }
}
