pub mod config;
pub mod params;
pub mod vecmath;

// Re-export key types for easier use by dependent crates
pub use config::{BindingConfig, FptConfig, OutputConfig, ParticleConfig, PotentialConfig, RunConfig};
pub use params::{read_parameters, write_parameters, ParamValue, ParameterSet};
pub use vecmath::{Quat, Vec3};
