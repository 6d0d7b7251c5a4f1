//! Optional draft inputs sourced from device collaborators.
//!
//! A denied permission leaves the field empty and returns the error so the
//! caller can show a warning; task creation is never blocked by it.

use super::device::{CapabilityError, CapabilityResult};
use crate::model::task::{AttachmentRef, GeoPoint, TaskDraft};
use log::warn;

/// Current-position provider.
pub trait GeolocationProvider {
    fn current_location(&self) -> CapabilityResult<GeoPoint>;
}

/// File/media picker. An empty vector means the user cancelled.
pub trait AttachmentPicker {
    fn pick(&self) -> CapabilityResult<Vec<AttachmentRef>>;
}

/// Fills `draft.location` from the provider.
///
/// Returns the non-fatal failure, if any; the draft keeps its previous value.
pub fn apply_current_location(
    draft: &mut TaskDraft,
    provider: &dyn GeolocationProvider,
) -> Option<CapabilityError> {
    match provider.current_location() {
        Ok(point) => {
            draft.location = Some(point);
            None
        }
        Err(err) => {
            warn!(
                "event=capability_skip module=capability status=skip capability={} error={}",
                err.capability().as_str(),
                err
            );
            Some(err)
        }
    }
}

/// Appends picked attachments to the draft in picker order.
pub fn apply_picked_attachments(
    draft: &mut TaskDraft,
    picker: &dyn AttachmentPicker,
) -> Option<CapabilityError> {
    match picker.pick() {
        Ok(picked) => {
            draft.attachments.extend(picked);
            None
        }
        Err(err) => {
            warn!(
                "event=capability_skip module=capability status=skip capability={} error={}",
                err.capability().as_str(),
                err
            );
            Some(err)
        }
    }
}
