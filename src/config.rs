// src/config.rs
use crate::adapters::Adapter;
use crate::dom::WalkLimits;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Environment variable naming a YAML engine configuration file
pub const CONFIG_ENV_VAR: &str = "FORMPILOT_CONFIG";

/// Tunable engine parameters. Every field has a default, so a config file
/// only needs the values it overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub thresholds: Thresholds,
    pub timing: Timing,
    pub traversal: Traversal,
    /// Rows closer than this many pixels are filled left to right
    pub row_tolerance_px: f64,
    /// Replaces the built-in adapter table when present
    pub adapters: Option<Vec<Adapter>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// A candidate container must score strictly above this
    pub form_score: i32,
    /// Minimum confidence for a field/profile match
    pub match_confidence: f64,
    /// Fuzzy matches only count above this similarity
    pub fuzzy_similarity: f64,
    /// Weight applied to fuzzy similarity
    pub fuzzy_weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Timing {
    pub typing_delay_min_ms: u64,
    pub typing_delay_max_ms: u64,
    pub field_delay_min_ms: u64,
    pub field_delay_max_ms: u64,
    pub scroll_pause_ms: u64,
    pub focus_pause_ms: u64,
    /// Pause between filling a wizard step and pressing Next
    pub fill_settle_ms: u64,
    /// Quiet period the mutation watcher waits for
    pub mutation_debounce_ms: u64,
    /// Lower bound between two mutation-triggered re-detections
    pub min_redetect_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Traversal {
    pub max_scope_depth: usize,
    pub max_elements: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            timing: Timing::default(),
            traversal: Traversal::default(),
            row_tolerance_px: 10.0,
            adapters: None,
        }
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            form_score: 3,
            match_confidence: 0.5,
            fuzzy_similarity: 0.7,
            fuzzy_weight: 0.7,
        }
    }
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            typing_delay_min_ms: 30,
            typing_delay_max_ms: 80,
            field_delay_min_ms: 100,
            field_delay_max_ms: 300,
            scroll_pause_ms: 200,
            focus_pause_ms: 50,
            fill_settle_ms: 1000,
            mutation_debounce_ms: 500,
            min_redetect_interval_ms: 1000,
        }
    }
}

impl Default for Traversal {
    fn default() -> Self {
        let limits = WalkLimits::default();
        Self {
            max_scope_depth: limits.max_scope_depth,
            max_elements: limits.max_elements,
        }
    }
}

impl EngineConfig {
    /// Load from an explicit file, else from `FORMPILOT_CONFIG`, else defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => Some(path.to_path_buf()),
            None => std::env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from),
        };

        match path {
            Some(path) => Self::load_from_file(&path),
            None => {
                info!("No engine configuration given, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        info!("Loading engine configuration from {}", path.display());
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let t = &self.thresholds;
        if !(0.0..=1.0).contains(&t.match_confidence) {
            anyhow::bail!("match_confidence must be within [0, 1], got {}", t.match_confidence);
        }
        if !(0.0..=1.0).contains(&t.fuzzy_similarity) {
            anyhow::bail!("fuzzy_similarity must be within [0, 1], got {}", t.fuzzy_similarity);
        }
        let timing = &self.timing;
        if timing.typing_delay_min_ms > timing.typing_delay_max_ms {
            anyhow::bail!("typing delay range is inverted");
        }
        if timing.field_delay_min_ms > timing.field_delay_max_ms {
            anyhow::bail!("field delay range is inverted");
        }
        if self.traversal.max_elements == 0 {
            anyhow::bail!("traversal.max_elements must be positive");
        }
        Ok(())
    }

    pub fn with_form_threshold(mut self, score: i32) -> Self {
        self.thresholds.form_score = score;
        self
    }

    pub fn with_match_threshold(mut self, confidence: f64) -> Self {
        self.thresholds.match_confidence = confidence;
        self
    }

    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_traversal(mut self, traversal: Traversal) -> Self {
        self.traversal = traversal;
        self
    }

    pub fn with_adapters(mut self, adapters: Vec<Adapter>) -> Self {
        self.adapters = Some(adapters);
        self
    }

    /// Walk bounds for catalog and locator traversals
    pub fn walk_limits(&self, enter_frames: bool) -> WalkLimits {
        WalkLimits {
            max_scope_depth: self.traversal.max_scope_depth,
            max_elements: self.traversal.max_elements,
            enter_frames,
        }
    }
}

impl Timing {
    pub fn fill_settle(&self) -> Duration {
        Duration::from_millis(self.fill_settle_ms)
    }

    pub fn mutation_debounce(&self) -> Duration {
        Duration::from_millis(self.mutation_debounce_ms)
    }

    pub fn min_redetect_interval(&self) -> Duration {
        Duration::from_millis(self.min_redetect_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_tuned_constants() {
        let config = EngineConfig::default();
        assert_eq!(config.thresholds.form_score, 3);
        assert_eq!(config.thresholds.match_confidence, 0.5);
        assert_eq!(config.thresholds.fuzzy_similarity, 0.7);
        assert_eq!(config.timing.typing_delay_min_ms, 30);
        assert_eq!(config.timing.typing_delay_max_ms, 80);
        assert_eq!(config.row_tolerance_px, 10.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "thresholds:\n  form_score: 5\ntiming:\n  mutation_debounce_ms: 750\n"
        )
        .unwrap();

        let config = EngineConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.thresholds.form_score, 5);
        assert_eq!(config.thresholds.match_confidence, 0.5);
        assert_eq!(config.timing.mutation_debounce_ms, 750);
        assert_eq!(config.timing.focus_pause_ms, 50);
    }

    #[test]
    fn test_rejects_invalid_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "thresholds:\n  match_confidence: 1.5\n").unwrap();
        assert!(EngineConfig::load(Some(file.path())).is_err());

        let missing = EngineConfig::load(Some(Path::new("/nonexistent/formpilot.yaml")));
        assert!(missing.is_err());
    }

    #[test]
    fn test_builders() {
        let config = EngineConfig::default()
            .with_form_threshold(1)
            .with_match_threshold(0.7);
        assert_eq!(config.thresholds.form_score, 1);
        assert_eq!(config.thresholds.match_confidence, 0.7);
        assert!(config.walk_limits(false).max_elements > 0);
    }
}
