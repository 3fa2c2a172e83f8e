//! [`TraceLog`] – append-only per-tick record for offline analysis.
//!
//! The control loop pushes one [`TickSnapshot`] per tick when tracing is
//! enabled.  The log serialises to a JSON array of objects carrying at least
//! `speed`, `pose`, `points` and `direction`.
//!
//! # Example
//!
//! ```
//! use rover_runtime::trace::TraceLog;
//!
//! let log = TraceLog::new();
//! assert!(log.is_empty());
//! assert_eq!(log.to_json().unwrap(), "[]");
//! ```

use std::path::Path;

use chrono::{DateTime, Utc};
use rover_types::{RoverError, TickSnapshot};
use schemars::schema_for;
use tracing::info;
use uuid::Uuid;

/// In-memory trace of one run.
#[derive(Debug, Clone)]
pub struct TraceLog {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    snapshots: Vec<TickSnapshot>,
}

impl Default for TraceLog {
    fn default() -> Self {
        Self::new()
    }
}

impl TraceLog {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            snapshots: Vec::new(),
        }
    }

    /// Identifier of the run, also attached to the control loop's log
    /// events.
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn push(&mut self, snapshot: TickSnapshot) {
        self.snapshots.push(snapshot);
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn snapshots(&self) -> &[TickSnapshot] {
        &self.snapshots
    }

    /// JSON array of all snapshots.
    ///
    /// # Errors
    ///
    /// [`RoverError::Serialization`] if a snapshot cannot be encoded.
    pub fn to_json(&self) -> Result<String, RoverError> {
        serde_json::to_string(&self.snapshots)
            .map_err(|e| RoverError::Serialization(format!("trace encoding failed: {e}")))
    }

    /// Write [`to_json`][Self::to_json] to `path`, replacing the file.
    ///
    /// # Errors
    ///
    /// [`RoverError::Serialization`] or [`RoverError::Io`].
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), RoverError> {
        let path = path.as_ref();
        let json = self.to_json()?;
        std::fs::write(path, json)?;
        info!(run_id = %self.run_id, ticks = self.len(), path = %path.display(), "trace written");
        Ok(())
    }

    /// JSON Schema of one trace record.
    ///
    /// # Errors
    ///
    /// [`RoverError::Serialization`] if the schema cannot be encoded.
    pub fn schema() -> Result<serde_json::Value, RoverError> {
        serde_json::to_value(schema_for!(TickSnapshot))
            .map_err(|e| RoverError::Serialization(format!("trace schema encoding failed: {e}")))
    }
}
