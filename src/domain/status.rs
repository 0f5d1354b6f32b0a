// Canonical drone status domain model
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The full status record held by the state store. Created once at startup
/// with the same defaults the vehicle reports before its first fix.
#[derive(Debug, Clone, Serialize)]
pub struct StatusRecord {
    pub altitude: f64,
    pub speed: f64,
    pub battery_percent: f64,
    pub battery_voltage: f64,
    pub gps_global: String,
    pub gps_relative: String,
    pub mission_time: String,
    pub flight_mode: String,
    pub last_update: DateTime<Utc>,
}

impl Default for StatusRecord {
    fn default() -> Self {
        Self {
            altitude: 0.0,
            speed: 0.0,
            battery_percent: 100.0,
            battery_voltage: 0.0,
            gps_global: "0.0,0.0".to_string(),
            gps_relative: "0.0,0.0".to_string(),
            mission_time: "00:00:00".to_string(),
            flight_mode: "INIT".to_string(),
            last_update: Utc::now(),
        }
    }
}

/// A partial update: only present fields are applied, absent fields keep
/// their previous value. Built by the normalizer or deserialized from a
/// direct status push.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusPatch {
    pub altitude: Option<f64>,
    pub speed: Option<f64>,
    pub battery_percent: Option<f64>,
    pub battery_voltage: Option<f64>,
    pub gps_global: Option<String>,
    pub gps_relative: Option<String>,
    pub mission_time: Option<String>,
    pub flight_mode: Option<String>,
}

impl StatusPatch {
    pub fn is_empty(&self) -> bool {
        self.altitude.is_none()
            && self.speed.is_none()
            && self.battery_percent.is_none()
            && self.battery_voltage.is_none()
            && self.gps_global.is_none()
            && self.gps_relative.is_none()
            && self.mission_time.is_none()
            && self.flight_mode.is_none()
    }
}

impl StatusRecord {
    /// Apply a patch in place. Returns true if at least one field was
    /// present; the caller stamps `last_update` in that case.
    pub fn apply(&mut self, patch: &StatusPatch) -> bool {
        let mut touched = false;
        if let Some(v) = patch.altitude {
            self.altitude = v;
            touched = true;
        }
        if let Some(v) = patch.speed {
            self.speed = v;
            touched = true;
        }
        if let Some(v) = patch.battery_percent {
            self.battery_percent = v;
            touched = true;
        }
        if let Some(v) = patch.battery_voltage {
            self.battery_voltage = v;
            touched = true;
        }
        if let Some(v) = &patch.gps_global {
            self.gps_global = v.clone();
            touched = true;
        }
        if let Some(v) = &patch.gps_relative {
            self.gps_relative = v.clone();
            touched = true;
        }
        if let Some(v) = &patch.mission_time {
            self.mission_time = v.clone();
            touched = true;
        }
        if let Some(v) = &patch.flight_mode {
            self.flight_mode = v.clone();
            touched = true;
        }
        touched
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_leaves_absent_fields_untouched() {
        let mut record = StatusRecord::default();
        record.speed = 7.5;

        let patch = StatusPatch {
            altitude: Some(120.0),
            ..Default::default()
        };

        assert!(record.apply(&patch));
        assert_eq!(record.altitude, 120.0);
        assert_eq!(record.speed, 7.5);
        assert_eq!(record.flight_mode, "INIT");
    }

    #[test]
    fn test_empty_patch_applies_nothing() {
        let mut record = StatusRecord::default();
        let before = record.clone();

        assert!(!record.apply(&StatusPatch::default()));
        assert_eq!(record.altitude, before.altitude);
        assert_eq!(record.gps_global, before.gps_global);
    }
}
