//! Control frames exchanged next to the appraisal events.

use serde::{Deserialize, Serialize};

/// Frames a client may send while a run is streaming.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    Ping,
}

/// Server frames that are not appraisal events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ControlMessage {
    Pong,
}
