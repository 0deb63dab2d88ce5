//! # Motion command module
//!
//! Defines the [`Command`] sent to the vehicle over the duplex channel, the
//! [`SpeedScale`] presets which scale raw throttle readings, and the inbound
//! [`VehicleMsg`] the vehicle can send back to the console.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ------------------------------------------------------------------------------------------------
// DATA STRUCTURES
// ------------------------------------------------------------------------------------------------

/// A motion command, the atomic unit transmitted to the vehicle.
///
/// Serialised as a JSON object in which absent fields are omitted entirely,
/// e.g. `{"angle": 90.0, "ac": 40}` or `{"en": 1}`.
///
/// A command is only meaningful with at least one field populated. The
/// transmission choke point refuses all-empty commands, see
/// [`Command::is_empty`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Command {
    /// Heading angle in degrees, normalised to (-180, 180], 0 = forward.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub angle: Option<f64>,

    /// Throttle level, 0..100, as a percentage of the selected speed scale.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ac: Option<u8>,

    /// Enable flag, only ever 1. Sent on connection establishment and
    /// whenever the vehicle reports itself disabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub en: Option<u8>,
}

/// An inbound message from the vehicle.
///
/// The only recognised field is `encendido`; when true the vehicle considers
/// itself disabled and the console must re-send the enable command.
#[derive(Debug, Default, Deserialize)]
pub struct VehicleMsg {
    #[serde(default)]
    pub encendido: Option<bool>,
}

// ------------------------------------------------------------------------------------------------
// ENUMERATIONS
// ------------------------------------------------------------------------------------------------

/// Named speed scale presets multiplying the raw 0..100 throttle reading.
///
/// Exactly one scale is active at a time. The console starts with no scale
/// selected, which is equivalent to a factor of 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpeedScale {
    Low,
    Medium,
    High,
}

/// Error returned when parsing a [`SpeedScale`] from a string.
#[derive(Debug, Error)]
#[error("`{0}` is not a speed scale, expected one of low, medium, high")]
pub struct ParseSpeedScaleError(String);

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Command {
    /// The handshake/enable command, `{"en": 1}`.
    pub fn enable() -> Self {
        Self {
            en: Some(1),
            ..Default::default()
        }
    }

    /// The idle command emitted on input release, `{"angle": 0.0, "ac": 0}`.
    ///
    /// This is an explicit recentre so the vehicle can distinguish "operator
    /// released" from a stale stream.
    pub fn idle() -> Self {
        Self {
            angle: Some(0.0),
            ac: Some(0),
            ..Default::default()
        }
    }

    /// A motion command carrying a heading and a throttle level.
    pub fn motion(angle_deg: f64, ac: u8) -> Self {
        Self {
            angle: Some(angle_deg),
            ac: Some(ac),
            ..Default::default()
        }
    }

    /// True if no field of the command is populated.
    pub fn is_empty(&self) -> bool {
        self.angle.is_none() && self.ac.is_none() && self.en.is_none()
    }

    /// Field-wise equality after wire quantisation.
    ///
    /// Angles are compared after rounding to one decimal place, matching the
    /// precision actually placed on the wire. The throttler uses this to
    /// suppress redundant repeats.
    pub fn wire_eq(&self, other: &Command) -> bool {
        quantise_angle(self.angle) == quantise_angle(other.angle)
            && self.ac == other.ac
            && self.en == other.en
    }
}

impl SpeedScale {
    /// The multiplier applied to the raw 0..100 throttle reading.
    pub fn factor(&self) -> f64 {
        match self {
            SpeedScale::Low => 0.3,
            SpeedScale::Medium => 0.6,
            SpeedScale::High => 1.0,
        }
    }
}

impl std::str::FromStr for SpeedScale {
    type Err = ParseSpeedScaleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(SpeedScale::Low),
            "medium" | "med" => Ok(SpeedScale::Medium),
            "high" => Ok(SpeedScale::High),
            _ => Err(ParseSpeedScaleError(s.into())),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Quantise an optional angle to tenths of a degree.
fn quantise_angle(angle: Option<f64>) -> Option<i64> {
    angle.map(|a| (a * 10.0).round() as i64)
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_absent_fields_omitted() {
        let json = serde_json::to_string(&Command::enable()).unwrap();
        assert_eq!(json, r#"{"en":1}"#);

        let json = serde_json::to_string(&Command::motion(90.0, 40)).unwrap();
        assert_eq!(json, r#"{"angle":90.0,"ac":40}"#);
    }

    #[test]
    fn test_is_empty() {
        assert!(Command::default().is_empty());
        assert!(!Command::idle().is_empty());
        assert!(!Command::enable().is_empty());
    }

    #[test]
    fn test_wire_eq_rounds_angle() {
        let a = Command::motion(90.04, 40);
        let b = Command::motion(90.01, 40);
        let c = Command::motion(90.16, 40);

        assert!(a.wire_eq(&b));
        assert!(!a.wire_eq(&c));
        assert!(!a.wire_eq(&Command::motion(90.04, 41)));
    }

    #[test]
    fn test_vehicle_msg_parse() {
        let msg: VehicleMsg = serde_json::from_str(r#"{"encendido": true}"#).unwrap();
        assert_eq!(msg.encendido, Some(true));

        // Unknown fields are ignored
        let msg: VehicleMsg = serde_json::from_str(r#"{"ack": {"angle": 1.0}}"#).unwrap();
        assert_eq!(msg.encendido, None);
    }

    #[test]
    fn test_speed_scale_parse() {
        assert_eq!("low".parse::<SpeedScale>().unwrap(), SpeedScale::Low);
        assert_eq!("HIGH".parse::<SpeedScale>().unwrap(), SpeedScale::High);
        assert!("turbo".parse::<SpeedScale>().is_err());
    }
}
