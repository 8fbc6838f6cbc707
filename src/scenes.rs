use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};

/// Scene configuration for a studio checkout: which display profiles exist
/// and which scene names map to a renderable template. Loaded once per run;
/// every render request is validated against it before the browser navigates.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct SceneConfig {
    pub profiles: BTreeMap<String, serde_yaml::Value>,
    pub scenes: BTreeMap<String, String>,
}

pub fn load_scene_config(path: &Path) -> Result<SceneConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read scene config {}", path.display()))?;
    let config: SceneConfig = serde_yaml::from_str(&contents).map_err(|error| {
        let location = error
            .location()
            .map(|location| format!("line {}, column {}", location.line(), location.column()))
            .unwrap_or_else(|| "unknown location".to_owned());
        anyhow!(
            "failed to parse yaml in {} at {}: {}",
            path.display(),
            location,
            error
        )
    })?;
    Ok(config)
}

impl SceneConfig {
    pub fn require_profile(&self, name: &str) -> Result<()> {
        if !self.profiles.contains_key(name) {
            bail!("unknown profile '{name}'. Define it under top-level profiles in the scene config");
        }
        Ok(())
    }

    pub fn require_scene(&self, name: &str) -> Result<()> {
        if !self.scenes.contains_key(name) {
            bail!("unknown scene '{name}'. Define it under top-level scenes in the scene config");
        }
        Ok(())
    }
}
