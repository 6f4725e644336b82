//! Custom in-page events.

use crate::host::PageHost;
use serde_json::Value as JsonValue;
use stacker_common::{Result, StackerError};
use stacker_core::ShiftStartCorrection;

/// Ask the state layer to move the running shift's start time.
pub fn request_start_correction<P: PageHost>(page: &P, correction: &ShiftStartCorrection) -> Result<()> {
    let detail = serde_json::to_value(correction)
        .map_err(|e| StackerError::internal(format!("encoding start correction: {}", e)))?;
    page.dispatch_event(ShiftStartCorrection::EVENT_NAME, detail);
    Ok(())
}

/// Decode the detail of a received event; `None` for any other event or a
/// malformed payload.
pub fn start_correction(name: &str, detail: &JsonValue) -> Option<ShiftStartCorrection> {
    if name != ShiftStartCorrection::EVENT_NAME {
        return None;
    }
    serde_json::from_value(detail.clone()).ok()
}
