//! Payloads exchanged between page components

use serde::{Deserialize, Serialize};

/// Request to correct the recorded start time of the running shift.
///
/// Dispatched by the active-shift card and handled by the state layer,
/// which avoids an import cycle between the two.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShiftStartCorrection {
    /// Id of the in-progress shift
    pub id: String,
    /// Corrected start, ISO-8601
    pub iso_timestamp: String,
}

impl ShiftStartCorrection {
    /// Name of the in-page event carrying this payload
    pub const EVENT_NAME: &'static str = "hour-stacker:correct-shift-start";

    pub fn new(id: impl Into<String>, iso_timestamp: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            iso_timestamp: iso_timestamp.into(),
        }
    }
}
