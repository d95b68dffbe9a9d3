// Poll cadence and per-unit wiring configuration
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Cadence of the completion poll loop
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Per-unit configuration: bus endpoint plus wiring calibration.
///
/// The calibration bits map wire polarity to logical forward/right for this
/// specific unit; which way they go is trial and error per wheel, since it
/// depends on how the motors were wired. Deserializable so a robot's wheel
/// table can live in a JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WheelConfig {
    /// Bus endpoint of the unit's controller board
    pub address: u8,

    /// Wire polarity 1 drives the wheel logically forward
    #[serde(default)]
    pub forward_is_positive: bool,

    /// Wire polarity 1 steers the wheel logically right
    #[serde(default)]
    pub right_is_positive: bool,

    /// Issue a zero-and-learn-direction command at construction. Leave off
    /// when the device is not yet powered; the unit then stays uncalibrated
    /// until `reset_rotation(true, ..)` is called explicitly.
    #[serde(default = "default_calibrate")]
    pub calibrate_on_startup: bool,

    /// Optional per-command completion deadline, e.g. "250ms". Unset means
    /// poll until the device answers or the bus fails.
    #[serde(default, with = "humantime_serde::option")]
    pub poll_timeout: Option<Duration>,
}

fn default_calibrate() -> bool {
    true
}

impl WheelConfig {
    pub fn new(address: u8) -> Self {
        Self {
            address,
            forward_is_positive: false,
            right_is_positive: false,
            calibrate_on_startup: true,
            poll_timeout: None,
        }
    }

    pub fn with_calibration(mut self, forward_is_positive: bool, right_is_positive: bool) -> Self {
        self.forward_is_positive = forward_is_positive;
        self.right_is_positive = right_is_positive;
        self
    }

    pub fn without_startup_calibration(mut self) -> Self {
        self.calibrate_on_startup = false;
        self
    }

    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = Some(timeout);
        self
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_json() {
        let config = WheelConfig::from_json(r#"{ "address": 4 }"#).unwrap();
        assert_eq!(config.address, 4);
        assert!(!config.forward_is_positive);
        assert!(!config.right_is_positive);
        assert!(config.calibrate_on_startup);
        assert!(config.poll_timeout.is_none());
    }

    #[test]
    fn test_full_json() {
        let config = WheelConfig::from_json(
            r#"{
                "address": 4,
                "forward_is_positive": true,
                "right_is_positive": false,
                "calibrate_on_startup": false,
                "poll_timeout": "250ms"
            }"#,
        )
        .unwrap();
        assert!(config.forward_is_positive);
        assert!(!config.calibrate_on_startup);
        assert_eq!(config.poll_timeout, Some(Duration::from_millis(250)));
    }
}
