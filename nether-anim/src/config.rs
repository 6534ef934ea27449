//! Animation configuration (`[animation]` table)

use serde::{Deserialize, Serialize};

/// Transition time used when no explicit edge exists between two states
pub const DEFAULT_TRANSITION_TIME: f32 = 0.3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    /// Seconds
    pub default_transition_time: f32,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            default_transition_time: DEFAULT_TRANSITION_TIME,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        assert_eq!(AnimationConfig::default().default_transition_time, 0.3);
    }

    #[test]
    fn test_config_from_toml() {
        let config: AnimationConfig = toml::from_str("default_transition_time = 0.5").unwrap();
        assert_eq!(config.default_transition_time, 0.5);

        let config: AnimationConfig = toml::from_str("").unwrap();
        assert_eq!(config, AnimationConfig::default());
    }
}
