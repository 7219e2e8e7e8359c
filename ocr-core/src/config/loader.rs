use crate::config::schema::{EngineKind, RunConfig};
use crate::error::ConfigError;
use serde_yaml::Value;
use std::path::Path;

/// Merges YAML layers base -> engine profile -> named preset -> caller
/// overrides by deep map union with last-write-wins, then validates the
/// merged result once (not per layer).
#[derive(Default)]
pub struct ConfigLoader {
    layers: Vec<Value>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { layers: Vec::new() }
    }

    pub fn with_base_file(mut self, path: &Path) -> Result<Self, ConfigError> {
        self.layers.push(read_yaml(path)?);
        Ok(self)
    }

    pub fn with_engine_file(mut self, path: &Path) -> Result<Self, ConfigError> {
        self.layers.push(read_yaml(path)?);
        Ok(self)
    }

    pub fn with_preset_file(mut self, path: &Path) -> Result<Self, ConfigError> {
        self.layers.push(read_yaml(path)?);
        Ok(self)
    }

    pub fn with_overrides(mut self, overrides: Value) -> Self {
        self.layers.push(overrides);
        self
    }

    pub fn load(self) -> Result<RunConfig, ConfigError> {
        let merged = self
            .layers
            .into_iter()
            .fold(Value::Mapping(Default::default()), |acc, layer| deep_merge(acc, layer));

        let config: RunConfig = serde_yaml::from_value(merged.clone()).map_err(|e| ConfigError::Yaml {
            path: "<merged>".to_string(),
            source: e,
        })?;

        validate(&config)?;
        Ok(config)
    }
}

fn read_yaml(path: &Path) -> Result<Value, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|e| ConfigError::InvalidValue {
        field: path.display().to_string(),
        reason: e.to_string(),
    })?;
    serde_yaml::from_str(&text).map_err(|e| ConfigError::Yaml {
        path: path.display().to_string(),
        source: e,
    })
}

/// Deep dictionary union, last-write-wins on scalar and sequence leaves.
fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Mapping(mut base_map), Value::Mapping(overlay_map)) => {
            for (k, v) in overlay_map {
                let merged = match base_map.remove(&k) {
                    Some(existing) => deep_merge(existing, v),
                    None => v,
                };
                base_map.insert(k, merged);
            }
            Value::Mapping(base_map)
        }
        (_, overlay) => overlay,
    }
}

fn validate(config: &RunConfig) -> Result<(), ConfigError> {
    if EngineKind::from_name(config.engine_profile.engine.as_str()).is_none() {
        return Err(ConfigError::UnknownEngineKind(
            config.engine_profile.engine.as_str().to_string(),
        ));
    }
    if let Some(name) = &config.engine_profile.preprocessing_profile {
        if !config.preprocessing_profiles.iter().any(|p| &p.name == name) {
            return Err(ConfigError::MissingProfile(name.clone()));
        }
    }
    let weight_sum = config.engine_profile.ensemble.reranker.positive_sum();
    if (weight_sum - 1.0).abs() > 1e-6 {
        return Err(ConfigError::WeightsNotNormalized(weight_sum));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_yaml::Mapping;

    #[test]
    fn deep_merge_overlays_nested_maps_last_write_wins() {
        let base: Value = serde_yaml::from_str("a: 1\nb:\n  x: 1\n  y: 2\n").unwrap();
        let overlay: Value = serde_yaml::from_str("b:\n  y: 9\nc: 3\n").unwrap();
        let merged = deep_merge(base, overlay);
        let map = merged.as_mapping().unwrap();
        assert_eq!(map.get("a").unwrap().as_i64(), Some(1));
        assert_eq!(map.get("c").unwrap().as_i64(), Some(3));
        let b = map.get("b").unwrap().as_mapping().unwrap();
        assert_eq!(b.get("x").unwrap().as_i64(), Some(1));
        assert_eq!(b.get("y").unwrap().as_i64(), Some(9));
    }

    #[test]
    fn empty_mapping_merge_is_overlay() {
        let merged = deep_merge(Value::Mapping(Mapping::new()), Value::Mapping(Mapping::new()));
        assert!(merged.as_mapping().unwrap().is_empty());
    }
}
