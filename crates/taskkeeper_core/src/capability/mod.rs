//! Contracts for device collaborators the core calls into.
//!
//! # Responsibility
//! - Describe connectivity, notification, geolocation and file-picker
//!   capabilities as traits the host implements.
//! - Classify permission failures as non-fatal so task operations proceed
//!   without the affected field.

mod connectivity;
mod device;
mod inputs;
mod notification;

pub use connectivity::{ConnectivityMonitor, ManualConnectivity};
pub use device::{CapabilityError, CapabilityResult, DeviceCapability};
pub use inputs::{apply_current_location, apply_picked_attachments, AttachmentPicker, GeolocationProvider};
pub use notification::{
    NoopScheduler, NotificationScheduler, RecordingScheduler, Reminder, REMINDER_TITLE,
};
