//! Device capability declarations and permission errors.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Permission-gated capability the core may ask the host for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DeviceCapability {
    Location,
    MediaLibrary,
    Notification,
}

impl DeviceCapability {
    /// Stable string id used across the FFI boundary.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Location => "location",
            Self::MediaLibrary => "media_library",
            Self::Notification => "notification",
        }
    }

    /// Text shown when the permission is missing.
    pub fn description(self) -> &'static str {
        match self {
            Self::Location => "Location permission is required to attach a place to a task.",
            Self::MediaLibrary => {
                "Media library permission is required to add attachments to a task."
            }
            Self::Notification => "Notification permission is required for due-date reminders.",
        }
    }
}

pub type CapabilityResult<T> = Result<T, CapabilityError>;

/// Failure reported by a device collaborator. Never fatal to the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapabilityError {
    PermissionDenied(DeviceCapability),
    Unavailable {
        capability: DeviceCapability,
        message: String,
    },
}

impl CapabilityError {
    pub fn capability(&self) -> DeviceCapability {
        match self {
            Self::PermissionDenied(capability) => *capability,
            Self::Unavailable { capability, .. } => *capability,
        }
    }
}

impl Display for CapabilityError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PermissionDenied(capability) => {
                write!(f, "permission denied: {}", capability.description())
            }
            Self::Unavailable {
                capability,
                message,
            } => write!(f, "{} unavailable: {message}", capability.as_str()),
        }
    }
}

impl Error for CapabilityError {}

#[cfg(test)]
mod tests {
    use super::{CapabilityError, DeviceCapability};

    #[test]
    fn unavailable_error_names_the_capability_id() {
        let err = CapabilityError::Unavailable {
            capability: DeviceCapability::MediaLibrary,
            message: "picker closed".to_string(),
        };
        assert_eq!(err.capability(), DeviceCapability::MediaLibrary);
        assert_eq!(err.to_string(), "media_library unavailable: picker closed");
    }

    #[test]
    fn descriptions_name_the_permission() {
        assert!(DeviceCapability::Location
            .description()
            .contains("Location"));
        assert!(DeviceCapability::Notification
            .description()
            .contains("reminders"));
    }
}
