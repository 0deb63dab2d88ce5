//! # Trajectory storage client
//!
//! Client for the trajectory storage HTTP/JSON API, the external
//! collaborator which persists recorded command sequences. The
//! [`TrajectoryStore`] trait is the seam the recorder and replayer are
//! written against; unit tests substitute an in-memory implementation.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::time::Duration;

use comms_if::{
    cmd::Command,
    traj::{AckResponse, ListResponse, PointsResponse, RecordedPoint, StartResponse, TrajectoryInfo},
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Timeout applied to every storage request.
///
/// Point captures ride on a background worker so this never stalls the
/// control loop, but a bound keeps the worker from wedging on a dead server.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Operations offered by the trajectory storage collaborator.
pub trait TrajectoryStore: Send + Sync {
    /// Open a new trajectory with the given name, returning its identifier.
    fn start(&self, name: &str) -> Result<u64, StorageError>;

    /// Close the active trajectory.
    fn stop(&self) -> Result<(), StorageError>;

    /// Append a point to the active trajectory. The server assigns the
    /// capture timestamp.
    fn point(&self, cmd: &Command) -> Result<(), StorageError>;

    /// List stored trajectories.
    fn list(&self) -> Result<Vec<TrajectoryInfo>, StorageError>;

    /// Fetch all points of the identified trajectory, in capture order.
    fn points(&self, id: u64) -> Result<Vec<RecordedPoint>, StorageError>;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// [`TrajectoryStore`] implementation over the storage HTTP API.
pub struct HttpTrajectoryStore {
    client: reqwest::blocking::Client,

    base_url: String,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage request failed: {0}")]
    RequestError(reqwest::Error),

    #[error("Storage rejected the request: {0}")]
    Rejected(String),

    #[error("Storage sent an invalid response: {0}")]
    BadResponse(String),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl HttpTrajectoryStore {
    /// Create a new store client for the given API base URL, e.g.
    /// `http://localhost:8000/api/recorridos`.
    pub fn new(base_url: &str) -> Result<Self, StorageError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(StorageError::RequestError)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        if path.is_empty() {
            self.base_url.clone()
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

impl TrajectoryStore for HttpTrajectoryStore {
    fn start(&self, name: &str) -> Result<u64, StorageError> {
        let resp: StartResponse = self
            .client
            .post(self.url("start"))
            .json(&serde_json::json!({ "name": name }))
            .send()
            .map_err(StorageError::RequestError)?
            .json()
            .map_err(StorageError::RequestError)?;

        if !resp.ok {
            return Err(StorageError::Rejected(
                resp.error.unwrap_or_else(|| "unknown error".into()),
            ));
        }

        resp.id
            .ok_or_else(|| StorageError::BadResponse("start response missing an id".into()))
    }

    fn stop(&self) -> Result<(), StorageError> {
        let resp: AckResponse = self
            .client
            .post(self.url("stop"))
            .json(&serde_json::json!({}))
            .send()
            .map_err(StorageError::RequestError)?
            .json()
            .map_err(StorageError::RequestError)?;

        match resp.ok {
            true => Ok(()),
            false => Err(StorageError::Rejected(
                resp.error.unwrap_or_else(|| "unknown error".into()),
            )),
        }
    }

    fn point(&self, cmd: &Command) -> Result<(), StorageError> {
        let resp: AckResponse = self
            .client
            .post(self.url("point"))
            .json(cmd)
            .send()
            .map_err(StorageError::RequestError)?
            .json()
            .map_err(StorageError::RequestError)?;

        match resp.ok {
            true => Ok(()),
            false => Err(StorageError::Rejected(
                resp.error.unwrap_or_else(|| "unknown error".into()),
            )),
        }
    }

    fn list(&self) -> Result<Vec<TrajectoryInfo>, StorageError> {
        let resp: ListResponse = self
            .client
            .get(self.url(""))
            .send()
            .map_err(StorageError::RequestError)?
            .json()
            .map_err(StorageError::RequestError)?;

        match resp.ok {
            true => Ok(resp.items),
            false => Err(StorageError::Rejected(
                resp.error.unwrap_or_else(|| "unknown error".into()),
            )),
        }
    }

    fn points(&self, id: u64) -> Result<Vec<RecordedPoint>, StorageError> {
        let resp: PointsResponse = self
            .client
            .get(self.url(&format!("{}/points", id)))
            .send()
            .map_err(StorageError::RequestError)?
            .json()
            .map_err(StorageError::RequestError)?;

        match resp.ok {
            true => Ok(resp.points),
            false => Err(StorageError::Rejected(
                resp.error.unwrap_or_else(|| "unknown error".into()),
            )),
        }
    }
}
