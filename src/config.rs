// src/config.rs

use crate::types::Config;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(contents)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let cfg = Config::from_yaml(
            "drop_off:\n  danger_height: 0.12\nalert:\n  cooldown_ms: 2000\n",
        )
        .unwrap();

        assert!((cfg.drop_off.danger_height - 0.12).abs() < 1e-6);
        assert!((cfg.drop_off.max_check_distance - 1.5).abs() < 1e-6);
        assert_eq!(cfg.alert.cooldown_ms, 2000);
        assert_eq!(cfg.alert.min_frames_drop_off, 2);
        assert_eq!(cfg.probes.obstacle.len(), 5);
        assert_eq!(cfg.scan.interval_ms, 80);
    }

    #[test]
    fn test_probe_table_override() {
        let cfg = Config::from_yaml(
            "probes:\n  drop_off:\n    - { x: 0.5, y: 0.7 }\n    - { x: 0.25, y: 0.7 }\n",
        )
        .unwrap();

        assert_eq!(cfg.probes.drop_off.len(), 2);
        assert!((cfg.probes.drop_off[1].x - 0.25).abs() < 1e-6);
        assert!((cfg.probes.baseline.y - 0.95).abs() < 1e-6);
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(Config::load("/nonexistent/smart-cane.yaml").is_err());
    }
}
