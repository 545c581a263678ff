use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// A single run parameter. Kept as a small closed set of variants so the
/// lossless on-disk form can reload every value exactly as written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    IntList(Vec<i64>),
    FloatList(Vec<f64>),
}

/// Named parameter map persisted alongside every run.
pub type ParameterSet = BTreeMap<String, ParamValue>;

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Bool(v) => write!(f, "{}", v),
            ParamValue::Text(v) => write!(f, "{}", v),
            ParamValue::IntList(v) => {
                let rendered: Vec<String> = v.iter().map(|x| x.to_string()).collect();
                write!(f, "[{}]", rendered.join(", "))
            }
            ParamValue::FloatList(v) => {
                let rendered: Vec<String> = v.iter().map(|x| x.to_string()).collect();
                write!(f, "[{}]", rendered.join(", "))
            }
        }
    }
}

/// Writes the parameter set under `base` in two forms: `<base>.dat`, a plain
/// `key value` listing meant only for human inspection, and `<base>.msgpack`,
/// the lossless MessagePack form that `read_parameters` reloads from.
pub fn write_parameters<P: AsRef<Path>>(base: P, params: &ParameterSet) -> Result<()> {
    let base = base.as_ref();

    let dat_path = base.with_extension("dat");
    let mut dat = BufWriter::new(File::create(&dat_path).map_err(|e| {
        anyhow::anyhow!("Failed to create parameter file '{}': {}", dat_path.display(), e)
    })?);
    for (key, value) in params {
        writeln!(dat, "{} {}", key, value)?;
    }
    dat.flush()?;

    let bin_path = base.with_extension("msgpack");
    let mut bin = File::create(&bin_path).map_err(|e| {
        anyhow::anyhow!("Failed to create parameter file '{}': {}", bin_path.display(), e)
    })?;
    rmp_serde::encode::write(&mut bin, params)?;
    Ok(())
}

/// Reloads a parameter set written by [`write_parameters`]. Only the lossless
/// form is ever parsed; the `.dat` listing is a write-only projection.
pub fn read_parameters<P: AsRef<Path>>(base: P) -> Result<ParameterSet> {
    let bin_path = base.as_ref().with_extension("msgpack");
    let file = File::open(&bin_path).map_err(|e| {
        anyhow::anyhow!("Failed to open parameter file '{}': {}", bin_path.display(), e)
    })?;
    let params = rmp_serde::decode::from_read(file)?;
    Ok(params)
}
