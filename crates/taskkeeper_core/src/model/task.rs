//! Task domain model.
//!
//! # Responsibility
//! - Define the canonical task record and its creation draft.
//! - Own the status cycle and field-level validation rules.
//!
//! # Invariants
//! - `id` is stable and never reused for another task.
//! - `title` and `description` are non-empty after trimming.
//! - `status` only moves along InProgress -> Completed -> Cancelled -> InProgress.
//! - `attachments` keep insertion order; removal is positional.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Opaque, stable task identifier.
///
/// New tasks get a UUID v4 string. Records written by earlier clients may
/// carry any non-empty string and are kept as-is.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Generates a fresh id for a new task.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Accepts any non-blank id, trimmed.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then(|| Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl Display for TaskId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Task lifecycle state.
///
/// The cycle has no terminal state so a cancelled task can be restarted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    /// Work is in progress. Initial state for every new task.
    InProgress,
    /// Completed successfully.
    Completed,
    /// No longer actionable.
    Cancelled,
}

impl TaskStatus {
    /// Returns the status one step further along the cycle.
    pub fn next(self) -> Self {
        match self {
            Self::InProgress => Self::Completed,
            Self::Completed => Self::Cancelled,
            Self::Cancelled => Self::InProgress,
        }
    }

    /// Stable string id used in stored records.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// User-facing label, also used in audit action text.
    pub fn label(self) -> &'static str {
        match self {
            Self::InProgress => "In Progress",
            Self::Completed => "Completed",
            Self::Cancelled => "Cancelled",
        }
    }

    /// Parses a stored status id.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "in-progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// Importance level shown as a badge next to the task title.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    Low,
    #[default]
    Medium,
    High,
}

impl Importance {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Parses a stored importance id, case-insensitive.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

/// Geographic coordinate attached to a task.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// Builds a validated coordinate.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, TaskValidationError> {
        let point = Self {
            latitude,
            longitude,
        };
        if !point.is_valid() {
            return Err(TaskValidationError::InvalidLocation {
                latitude,
                longitude,
            });
        }
        Ok(point)
    }

    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Opaque reference to a picked file (usually a platform URI).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttachmentRef(String);

impl AttachmentRef {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AttachmentRef {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for AttachmentRef {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Field validation errors for drafts and stored task records.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskValidationError {
    EmptyId,
    EmptyTitle,
    EmptyDescription,
    InvalidLocation { latitude: f64, longitude: f64 },
}

impl Display for TaskValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyId => write!(f, "task id must not be empty"),
            Self::EmptyTitle => write!(f, "task title must not be empty"),
            Self::EmptyDescription => write!(f, "task description must not be empty"),
            Self::InvalidLocation {
                latitude,
                longitude,
            } => write!(
                f,
                "task location is out of range: latitude={latitude} longitude={longitude}"
            ),
        }
    }
}

impl Error for TaskValidationError {}

/// User input for task creation.
///
/// Optional fields default to empty; `importance` defaults to `Medium`.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
    pub due_at: DateTime<Utc>,
    pub importance: Importance,
    pub location: Option<GeoPoint>,
    pub attachments: Vec<AttachmentRef>,
}

impl TaskDraft {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        due_at: DateTime<Utc>,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            due_at,
            importance: Importance::default(),
            location: None,
            attachments: Vec::new(),
        }
    }

    pub fn with_importance(mut self, importance: Importance) -> Self {
        self.importance = importance;
        self
    }

    pub fn with_location(mut self, location: Option<GeoPoint>) -> Self {
        self.location = location;
        self
    }

    pub fn with_attachments<I, A>(mut self, attachments: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<AttachmentRef>,
    {
        self.attachments
            .extend(attachments.into_iter().map(Into::into));
        self
    }

    /// Checks required fields before any state is touched.
    pub fn validate(&self) -> Result<(), TaskValidationError> {
        validate_fields(&self.title, &self.description, self.location.as_ref())
    }
}

/// Canonical task record.
///
/// Serialized with camelCase keys and `date` for the due timestamp so stored
/// collections keep the record shape existing clients already wrote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub description: String,
    #[serde(rename = "date")]
    pub due_at: DateTime<Utc>,
    pub status: TaskStatus,
    #[serde(default)]
    pub importance: Importance,
    #[serde(default)]
    pub location: Option<GeoPoint>,
    #[serde(default)]
    pub attachments: Vec<AttachmentRef>,
    pub created_at: DateTime<Utc>,
    /// True while the task sits in the offline pending queue.
    #[serde(default)]
    pub pending_sync: bool,
}

impl Task {
    /// Builds a new `InProgress` task from a validated draft.
    ///
    /// # Errors
    /// - Returns the first failing field check of `TaskDraft::validate`.
    pub fn from_draft(
        draft: TaskDraft,
        created_at: DateTime<Utc>,
        pending_sync: bool,
    ) -> Result<Self, TaskValidationError> {
        draft.validate()?;
        Ok(Self {
            id: TaskId::generate(),
            title: draft.title,
            description: draft.description,
            due_at: draft.due_at,
            status: TaskStatus::InProgress,
            importance: draft.importance,
            location: draft.location,
            attachments: draft.attachments,
            created_at,
            pending_sync,
        })
    }

    /// Validates a record loaded from storage.
    pub fn validate(&self) -> Result<(), TaskValidationError> {
        if self.id.is_blank() {
            return Err(TaskValidationError::EmptyId);
        }
        validate_fields(&self.title, &self.description, self.location.as_ref())
    }

    /// Returns whether a reminder for this task is still meaningful.
    pub fn is_open(&self) -> bool {
        self.status == TaskStatus::InProgress
    }
}

fn validate_fields(
    title: &str,
    description: &str,
    location: Option<&GeoPoint>,
) -> Result<(), TaskValidationError> {
    if title.trim().is_empty() {
        return Err(TaskValidationError::EmptyTitle);
    }
    if description.trim().is_empty() {
        return Err(TaskValidationError::EmptyDescription);
    }
    if let Some(point) = location {
        if !point.is_valid() {
            return Err(TaskValidationError::InvalidLocation {
                latitude: point.latitude,
                longitude: point.longitude,
            });
        }
    }
    Ok(())
}
