//! # Trajectory wire definitions
//!
//! Types exchanged with the trajectory storage API. The storage service
//! persists timestamped command sequences and is an external collaborator,
//! only its JSON surface is defined here.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};

// Internal
use crate::cmd::Command;

// ------------------------------------------------------------------------------------------------
// DATA STRUCTURES
// ------------------------------------------------------------------------------------------------

/// A single recorded point: a command plus the server-assigned capture
/// timestamp.
///
/// The timestamp is metadata only, it never appears in commands put back on
/// the vehicle channel, see [`RecordedPoint::strip`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecordedPoint {
    /// Capture time as seconds since the unix epoch, assigned by the server.
    #[serde(rename = "_ts", skip_serializing_if = "Option::is_none")]
    pub ts: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub angle: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ac: Option<u8>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub en: Option<u8>,
}

/// Metadata for a stored trajectory.
#[derive(Debug, Clone, Deserialize)]
pub struct TrajectoryInfo {
    pub id: u64,

    pub name: String,

    /// Creation time as seconds since the unix epoch.
    #[serde(default)]
    pub ts: Option<i64>,
}

/// Response to a `start` request.
#[derive(Debug, Deserialize)]
pub struct StartResponse {
    pub ok: bool,

    #[serde(default)]
    pub id: Option<u64>,

    #[serde(default)]
    pub error: Option<String>,
}

/// Response to `stop` and `point` requests.
#[derive(Debug, Deserialize)]
pub struct AckResponse {
    pub ok: bool,

    #[serde(default)]
    pub error: Option<String>,
}

/// Response to a `list` request.
#[derive(Debug, Deserialize)]
pub struct ListResponse {
    pub ok: bool,

    #[serde(default)]
    pub items: Vec<TrajectoryInfo>,

    #[serde(default)]
    pub error: Option<String>,
}

/// Response to a `points/{id}` request.
#[derive(Debug, Deserialize)]
pub struct PointsResponse {
    pub ok: bool,

    #[serde(default)]
    pub points: Vec<RecordedPoint>,

    #[serde(default)]
    pub error: Option<String>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl RecordedPoint {
    /// The command carried by this point, with the timestamp stripped.
    pub fn strip(&self) -> Command {
        Command {
            angle: self.angle,
            ac: self.ac,
            en: self.en,
        }
    }
}

impl From<Command> for RecordedPoint {
    fn from(cmd: Command) -> Self {
        Self {
            ts: None,
            angle: cmd.angle,
            ac: cmd.ac,
            en: cmd.en,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_point_parse_and_strip() {
        let p: RecordedPoint =
            serde_json::from_str(r#"{"_ts": 1700000000.5, "angle": 90.0, "ac": 40}"#).unwrap();

        assert_eq!(p.ts, Some(1700000000.5));

        let cmd = p.strip();
        assert_eq!(cmd, Command::motion(90.0, 40));

        // The stripped command must not carry the timestamp back on the wire
        let json = serde_json::to_string(&cmd).unwrap();
        assert!(!json.contains("_ts"));
    }

    #[test]
    fn test_point_serialises_without_ts() {
        let p: RecordedPoint = Command::motion(0.0, 10).into();
        assert_eq!(serde_json::to_string(&p).unwrap(), r#"{"angle":0.0,"ac":10}"#);
    }

    #[test]
    fn test_list_response_parse() {
        let r: ListResponse = serde_json::from_str(
            r#"{"ok": true, "items": [{"id": 3, "name": "trip1", "ts": 1700000000}]}"#,
        )
        .unwrap();

        assert!(r.ok);
        assert_eq!(r.items.len(), 1);
        assert_eq!(r.items[0].id, 3);
        assert_eq!(r.items[0].name, "trip1");
    }

    #[test]
    fn test_error_envelope_parse() {
        let r: StartResponse =
            serde_json::from_str(r#"{"ok": false, "error": "name requerido"}"#).unwrap();
        assert!(!r.ok);
        assert_eq!(r.error.as_deref(), Some("name requerido"));
        assert!(r.id.is_none());
    }
}
