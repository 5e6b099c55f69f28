// Configuration module for reading Arbiter.toml
// Grid size, match rules, agent protocol limits and the match log

use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::maze::MAX_DIMENSION;

/// Main configuration structure containing all tunable parameters
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Config {
    pub grid: GridConfig,
    pub rules: RulesConfig,
    pub protocol: ProtocolConfig,
    pub match_log: MatchLogConfig,
}

/// Torus dimensions shared by the maze file and every agent map
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct GridConfig {
    pub height: usize,
    pub width: usize,
}

/// Turn budget, placement and scoring rules
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RulesConfig {
    pub max_turns_per_player: usize,
    pub max_turn_length: usize,
    pub min_start_distance_sq: i64,
    pub placement_attempts: usize,
    pub capture_points: i64,
    pub score_cap: i64,
}

/// Limits applied to agent processes
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ProtocolConfig {
    pub turn_timeout_ms: u64,
    pub quit_grace_ms: u64,
    pub stderr_limit_bytes: usize,
    pub max_line_bytes: usize,
}

impl ProtocolConfig {
    pub fn turn_timeout(&self) -> Duration {
        Duration::from_millis(self.turn_timeout_ms)
    }

    pub fn quit_grace(&self) -> Duration {
        Duration::from_millis(self.quit_grace_ms)
    }
}

/// Match log output
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct MatchLogConfig {
    pub enabled: bool,
    pub log_file_path: String,
}

impl Config {
    /// Loads configuration from a TOML file
    ///
    /// # Arguments
    /// * `path` - Path to the Arbiter.toml configuration file
    ///
    /// # Returns
    /// * `Result<Config, String>` - Parsed and validated configuration or error message
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let contents = fs::read_to_string(path.as_ref())
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| format!("Failed to parse config file: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads default configuration from Arbiter.toml in the project root
    pub fn load_default() -> Result<Self, String> {
        Self::from_file("Arbiter.toml")
    }

    /// Creates a configuration with hardcoded default values as fallback
    /// This should match the constants defined in Arbiter.toml
    pub fn default_hardcoded() -> Self {
        Config {
            grid: GridConfig {
                height: 25,
                width: 25,
            },
            rules: RulesConfig {
                max_turns_per_player: 150,
                max_turn_length: 256,
                min_start_distance_sq: 17 * 17,
                placement_attempts: 100_000,
                capture_points: 100,
                score_cap: 1000,
            },
            protocol: ProtocolConfig {
                turn_timeout_ms: 10_000,
                quit_grace_ms: 2_000,
                stderr_limit_bytes: 4096,
                max_line_bytes: 1024,
            },
            match_log: MatchLogConfig {
                enabled: false,
                log_file_path: "match_log.jsonl".to_string(),
            },
        }
    }

    /// Loads from Arbiter.toml, falling back to hardcoded defaults if loading fails
    pub fn load_or_default() -> Self {
        Self::load_default()
            .unwrap_or_else(|e| {
                eprintln!("Warning: Could not load Arbiter.toml ({}), using hardcoded defaults", e);
                Self::default_hardcoded()
            })
    }

    /// Rejects values the arbiter cannot run a match with
    pub fn validate(&self) -> Result<(), String> {
        let dimension_ok = |n: usize| (1..=MAX_DIMENSION).contains(&n);
        if !dimension_ok(self.grid.height) || !dimension_ok(self.grid.width) {
            return Err(format!(
                "grid must be between 1x1 and {}x{}, got {}x{}",
                MAX_DIMENSION, MAX_DIMENSION, self.grid.height, self.grid.width
            ));
        }
        if self.rules.max_turns_per_player == 0 {
            return Err("max_turns_per_player must be positive".to_string());
        }
        if self.rules.max_turn_length == 0 {
            return Err("max_turn_length must be positive".to_string());
        }
        if self.rules.placement_attempts == 0 {
            return Err("placement_attempts must be positive".to_string());
        }
        if self.rules.score_cap < 0 {
            return Err("score_cap must not be negative".to_string());
        }
        if self.protocol.max_line_bytes <= self.rules.max_turn_length {
            return Err("max_line_bytes must leave room for the longest turn and its newline".to_string());
        }
        if self.match_log.enabled && self.match_log.log_file_path.is_empty() {
            return Err("match_log.log_file_path must be set when the log is enabled".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_can_be_created() {
        let config = Config::default_hardcoded();
        assert_eq!(config.grid.height, 25);
        assert_eq!(config.rules.min_start_distance_sq, 289);
        assert_eq!(config.protocol.turn_timeout(), Duration::from_secs(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_arbiter_toml_can_be_parsed() {
        // This test ensures Arbiter.toml is valid and can be parsed
        let result = Config::from_file("Arbiter.toml");
        assert!(
            result.is_ok(),
            "Failed to parse Arbiter.toml: {:?}",
            result.err()
        );
    }

    #[test]
    fn test_all_config_values_match_hardcoded_defaults() {
        let file_config = Config::from_file("Arbiter.toml")
            .expect("Arbiter.toml should be parseable");
        let hardcoded_config = Config::default_hardcoded();

        assert_eq!(file_config.grid, hardcoded_config.grid, "[grid] differs from hardcoded defaults");
        assert_eq!(file_config.rules, hardcoded_config.rules, "[rules] differs from hardcoded defaults");
        assert_eq!(
            file_config.protocol, hardcoded_config.protocol,
            "[protocol] differs from hardcoded defaults"
        );
        assert_eq!(
            file_config.match_log, hardcoded_config.match_log,
            "[match_log] differs from hardcoded defaults"
        );
    }

    #[test]
    fn test_load_or_default_works() {
        // This should succeed with the actual file
        let config = Config::load_or_default();
        assert_eq!(config.rules.max_turns_per_player, 150);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut config = Config::default_hardcoded();
        config.grid.width = 64;
        assert!(config.validate().is_err());

        let mut config = Config::default_hardcoded();
        config.protocol.max_line_bytes = 256;
        assert!(config.validate().is_err());

        let mut config = Config::default_hardcoded();
        config.match_log.enabled = true;
        config.match_log.log_file_path.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        // Test with a non-existent file
        let result = Config::from_file("nonexistent.toml");
        assert!(result.is_err());

        let parsed: Result<Config, _> = toml::from_str("[grid]\nheight = 25\n");
        assert!(parsed.is_err());
    }
}
