use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What produced an audit record. Corresponds to the `event_type` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    FaceRecognition,
    ExitButton,
    AdminCommand,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::FaceRecognition => "face_recognition",
            EventKind::ExitButton => "exit_button",
            EventKind::AdminCommand => "admin_command",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "face_recognition" => Some(EventKind::FaceRecognition),
            "exit_button" => Some(EventKind::ExitButton),
            "admin_command" => Some(EventKind::AdminCommand),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventResult {
    Granted,
    Denied,
}

impl EventResult {
    pub fn as_str(self) -> &'static str {
        match self {
            EventResult::Granted => "granted",
            EventResult::Denied => "denied",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "granted" => Some(EventResult::Granted),
            "denied" => Some(EventResult::Denied),
            _ => None,
        }
    }
}

/// Append-only access-decision record. Never mutated, never referenced by a
/// foreign key, and never redacted on employee delete (the base spec leaves
/// audit rows alone on delete; see `DESIGN.md` for the Open Question
/// resolution).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub event_type: EventKind,
    pub employee_id: Option<String>,
    pub matched_employee_id: Option<String>,
    pub similarity_score: Option<f32>,
    pub result: EventResult,
    pub reason: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// Fields needed to append a new record; `id` and `timestamp` are assigned
/// by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAuditRecord {
    pub event_type: EventKind,
    pub employee_id: Option<String>,
    pub matched_employee_id: Option<String>,
    pub similarity_score: Option<f32>,
    pub result: EventResult,
    pub reason: Option<String>,
    pub metadata: Option<serde_json::Value>,
}
