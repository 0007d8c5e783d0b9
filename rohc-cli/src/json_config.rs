//! Loads a [`RohcConfig`] override from JSON, the same
//! one-struct-one-doc-comment-per-field pattern the teacher's
//! `config/quinn.rs` uses for `QuinnJsonConfig`. Unlike that struct,
//! `RohcConfig` itself already carries `serde(Deserialize)` behind the
//! `rohc` crate's `serde` feature, so there is no separate JSON shadow
//! struct to keep in sync — this module is just the file-loading glue.

use std::path::Path;

use anyhow::{Context, Result};
use rohc::RohcConfig;

/// Reads a `RohcConfig` from `path`, falling back to [`RohcConfig::default`]
/// when no path is given.
pub fn load_config(path: Option<&Path>) -> Result<RohcConfig> {
    match path {
        None => Ok(RohcConfig::default()),
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading config file {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("parsing config file {} as RohcConfig JSON", path.display()))
        }
    }
}
