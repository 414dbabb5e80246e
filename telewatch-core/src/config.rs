//! Detection configuration
//!
//! All rule thresholds are supplied from outside the engine. The struct
//! deserializes from any serde format; missing keys take the defaults in
//! [`crate::constants`].
//!
//! ```toml
//! temp_max = 80.0
//! temp_min = -40.0
//! voltage_min = 4.5
//! voltage_max = 5.5
//! temp_rate_threshold = 15.0
//! voltage_rate_threshold = 0.5   # optional
//! heartbeat_timeout_secs = 4.0
//! coalesce_episodes = false
//! ```

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::errors::ConfigError;
use crate::time;

/// Thresholds for every detection rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// °C
    pub temp_min: f64,
    /// °C
    pub temp_max: f64,
    /// Volts
    pub voltage_min: f64,
    /// Volts
    pub voltage_max: f64,
    /// Max |ΔT| between consecutive readings, °C
    pub temp_rate_threshold: f64,
    /// Max |ΔV| between consecutive readings; `None` disables the rule
    pub voltage_rate_threshold: Option<f64>,
    /// Seconds of silence before a heartbeat loss is reported
    pub heartbeat_timeout_secs: f64,
    /// Report one anomaly per fault episode instead of one per reading
    pub coalesce_episodes: bool,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            temp_min: DEFAULT_TEMP_MIN_C,
            temp_max: DEFAULT_TEMP_MAX_C,
            voltage_min: DEFAULT_VOLTAGE_MIN_V,
            voltage_max: DEFAULT_VOLTAGE_MAX_V,
            temp_rate_threshold: DEFAULT_TEMP_RATE_C,
            voltage_rate_threshold: None,
            heartbeat_timeout_secs: DEFAULT_HEARTBEAT_TIMEOUT_S,
            coalesce_episodes: false,
        }
    }
}

impl DetectionConfig {
    pub fn with_temp_range(mut self, min: f64, max: f64) -> Self {
        self.temp_min = min;
        self.temp_max = max;
        self
    }

    pub fn with_voltage_range(mut self, min: f64, max: f64) -> Self {
        self.voltage_min = min;
        self.voltage_max = max;
        self
    }

    pub fn with_temp_rate(mut self, threshold: f64) -> Self {
        self.temp_rate_threshold = threshold;
        self
    }

    pub fn with_voltage_rate(mut self, threshold: f64) -> Self {
        self.voltage_rate_threshold = Some(threshold);
        self
    }

    pub fn with_heartbeat_timeout(mut self, secs: f64) -> Self {
        self.heartbeat_timeout_secs = secs;
        self
    }

    pub fn with_episode_coalescing(mut self, enabled: bool) -> Self {
        self.coalesce_episodes = enabled;
        self
    }

    /// Heartbeat timeout as a duration
    pub fn heartbeat_timeout(&self) -> Duration {
        time::duration_from_secs(self.heartbeat_timeout_secs)
    }

    /// Reject threshold sets no rule can evaluate meaningfully
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("temperature", self.temp_min, self.temp_max)?;
        check_range("voltage", self.voltage_min, self.voltage_max)?;
        check_positive("temp_rate_threshold", self.temp_rate_threshold)?;
        if let Some(rate) = self.voltage_rate_threshold {
            check_positive("voltage_rate_threshold", rate)?;
        }
        check_positive("heartbeat_timeout_secs", self.heartbeat_timeout_secs)?;
        Ok(())
    }
}

fn check_range(field: &'static str, min: f64, max: f64) -> Result<(), ConfigError> {
    if min.is_finite() && max.is_finite() && min < max {
        Ok(())
    } else {
        Err(ConfigError::InvalidRange { field, min, max })
    }
}

fn check_positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NotPositive { field, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = DetectionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.heartbeat_timeout(), Duration::seconds(4));
        assert!(!config.coalesce_episodes);
    }

    #[test]
    fn inverted_range_rejected() {
        let config = DetectionConfig::default().with_voltage_range(5.5, 4.5);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidRange { field: "voltage", .. })
        ));
    }

    #[test]
    fn non_positive_thresholds_rejected() {
        let config = DetectionConfig::default().with_heartbeat_timeout(0.0);
        assert!(matches!(config.validate(), Err(ConfigError::NotPositive { .. })));

        let config = DetectionConfig::default().with_voltage_rate(-0.1);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NotPositive { field: "voltage_rate_threshold", .. })
        ));
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config: DetectionConfig =
            serde_json::from_str(r#"{"temp_max": 95.0, "voltage_rate_threshold": 0.5}"#).unwrap();
        assert_eq!(config.temp_max, 95.0);
        assert_eq!(config.temp_min, DEFAULT_TEMP_MIN_C);
        assert_eq!(config.voltage_rate_threshold, Some(0.5));
    }
}
