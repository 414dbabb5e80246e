//! Default detection thresholds
//!
//! Values used when no configuration overrides them. They match the limits
//! the reference bench device was characterised against.

// ===== TEMPERATURE =====

/// Upper temperature limit (°C). Above this the device is overheating.
pub const DEFAULT_TEMP_MAX_C: f64 = 80.0;

/// Lower temperature limit (°C).
///
/// Industrial-grade electronics operating floor.
pub const DEFAULT_TEMP_MIN_C: f64 = -40.0;

/// Largest tolerated temperature change between consecutive readings (°C).
pub const DEFAULT_TEMP_RATE_C: f64 = 15.0;

// ===== VOLTAGE =====

/// 5 V rail, ±10 %
pub const DEFAULT_VOLTAGE_MIN_V: f64 = 4.5;
pub const DEFAULT_VOLTAGE_MAX_V: f64 = 5.5;

// ===== AVAILABILITY =====

/// Silence longer than this (seconds) counts as heartbeat loss.
///
/// Devices report once per second; four missed reports is an outage.
pub const DEFAULT_HEARTBEAT_TIMEOUT_S: f64 = 4.0;

// ===== INGESTION =====

/// Pause between polls of a silent source (milliseconds)
pub const DEFAULT_IDLE_BACKOFF_MS: u64 = 10;
