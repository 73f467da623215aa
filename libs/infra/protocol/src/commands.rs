use base64::Engine;
use chrono::{DateTime, Utc};
use serde_json::Value;

pub struct BeginUpsert {
    pub employee_id: String,
    pub display_name: Option<String>,
    pub access_start: DateTime<Utc>,
    pub access_end: DateTime<Utc>,
    pub num_photos: u32,
}

pub struct PhotoChunk {
    pub chunk_index: u32,
    pub total_chunks: u32,
    pub data: Vec<u8>,
    pub is_last: bool,
    pub sha256: Option<String>,
}

pub struct UpdatePeriod {
    pub employee_id: String,
    pub access_start: DateTime<Utc>,
    pub access_end: DateTime<Utc>,
}

pub struct GetAuditLogs {
    pub employee_id: Option<String>,
    pub limit: u32,
}

pub enum Command {
    BeginUpsert(BeginUpsert),
    PhotoChunk(PhotoChunk),
    EndUpsert,
    UpdatePeriod(UpdatePeriod),
    Deactivate { employee_id: String },
    Delete { employee_id: String },
    GetStatus,
    ListEmployees,
    GetAuditLogs(GetAuditLogs),
}

impl Command {
    /// Whether this command type requires a valid HMAC/nonce before dispatch.
    pub fn requires_hmac(&self) -> bool {
        matches!(
            self,
            Command::BeginUpsert(_) | Command::UpdatePeriod(_) | Command::Deactivate { .. } | Command::Delete { .. }
        )
    }

    pub fn requires_admin_mode(&self) -> bool {
        self.requires_hmac()
    }
}

fn field_str(value: &Value, name: &str) -> Result<String, String> {
    value
        .get(name)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| format!("missing or invalid field '{name}'"))
}

fn field_str_opt(value: &Value, name: &str) -> Option<String> {
    value.get(name).and_then(Value::as_str).map(str::to_string)
}

fn field_u32(value: &Value, name: &str) -> Result<u32, String> {
    value
        .get(name)
        .and_then(Value::as_u64)
        .map(|n| n as u32)
        .ok_or_else(|| format!("missing or invalid field '{name}'"))
}

fn field_bool(value: &Value, name: &str) -> Result<bool, String> {
    value
        .get(name)
        .and_then(Value::as_bool)
        .ok_or_else(|| format!("missing or invalid field '{name}'"))
}

fn field_datetime(value: &Value, name: &str) -> Result<DateTime<Utc>, String> {
    let raw = field_str(value, name)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("invalid timestamp in '{name}': {e}"))
}

/// Parses the wire `{command: "...", ...}` envelope into a typed `Command`.
/// Errors here become an `ERROR` response, not a panic — this is untrusted
/// input from the BLE link.
pub fn parse_command(value: &Value) -> Result<Command, String> {
    let tag = field_str(value, "command")?;

    match tag.as_str() {
        "BEGIN_UPSERT" => Ok(Command::BeginUpsert(BeginUpsert {
            employee_id: field_str(value, "employee_id")?,
            display_name: field_str_opt(value, "display_name"),
            access_start: field_datetime(value, "start")?,
            access_end: field_datetime(value, "end")?,
            num_photos: field_u32(value, "num_photos")?,
        })),
        "PHOTO_CHUNK" => {
            let data_b64 = field_str(value, "data")?;
            let data = base64::engine::general_purpose::STANDARD
                .decode(data_b64)
                .map_err(|e| format!("invalid base64 photo data: {e}"))?;
            Ok(Command::PhotoChunk(PhotoChunk {
                chunk_index: field_u32(value, "chunk_index")?,
                total_chunks: field_u32(value, "total_chunks")?,
                data,
                is_last: field_bool(value, "is_last")?,
                sha256: field_str_opt(value, "sha256"),
            }))
        }
        "END_UPSERT" => Ok(Command::EndUpsert),
        "UPDATE_PERIOD" => Ok(Command::UpdatePeriod(UpdatePeriod {
            employee_id: field_str(value, "employee_id")?,
            access_start: field_datetime(value, "start")?,
            access_end: field_datetime(value, "end")?,
        })),
        "DEACTIVATE" => Ok(Command::Deactivate {
            employee_id: field_str(value, "employee_id")?,
        }),
        "DELETE" => Ok(Command::Delete {
            employee_id: field_str(value, "employee_id")?,
        }),
        "GET_STATUS" => Ok(Command::GetStatus),
        "LIST_EMPLOYEES" => Ok(Command::ListEmployees),
        "GET_AUDIT_LOGS" => Ok(Command::GetAuditLogs(GetAuditLogs {
            employee_id: field_str_opt(value, "employee_id"),
            limit: field_u32(value, "limit").unwrap_or(100),
        })),
        other => Err(format!("unknown command '{other}'")),
    }
}
