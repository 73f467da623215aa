use crate::client::StoreClient;
use crate::errors::StoreError;
use chrono::{DateTime, Utc};
use faceaccess_models::{AuditRecord, EventKind, EventResult, NewAuditRecord};
use libsql::params;
use tracing::{instrument, warn};

#[derive(Clone)]
pub struct AuditRepository {
    client: StoreClient,
}

impl AuditRepository {
    pub fn new(client: StoreClient) -> Self {
        AuditRepository { client }
    }

    /// Best-effort: logs and swallows its own error rather than ever
    /// propagating one into the access-decision hot path.
    #[instrument(skip(self, record))]
    pub async fn log(&self, record: NewAuditRecord) {
        if let Err(err) = self.try_log(record).await {
            warn!(error = %err, "failed to persist audit record");
        }
    }

    async fn try_log(&self, record: NewAuditRecord) -> Result<(), StoreError> {
        let metadata_json = record
            .metadata
            .as_ref()
            .map(serde_json::Value::to_string);

        self.client
            .with_write_lock(move |conn| async move {
                conn.execute(
                    "INSERT INTO audit_log (timestamp, event_type, employee_id, matched_employee_id, similarity_score, result, reason, metadata)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        Utc::now().to_rfc3339(),
                        record.event_type.as_str(),
                        record.employee_id,
                        record.matched_employee_id,
                        record.similarity_score,
                        record.result.as_str(),
                        record.reason,
                        metadata_json,
                    ],
                )
                .await?;
                Ok(())
            })
            .await
    }

    #[instrument(skip(self))]
    pub async fn query(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        employee_id: Option<&str>,
        limit: u32,
    ) -> Result<Vec<AuditRecord>, StoreError> {
        let conn = self.client.connection().await?;

        let mut sql = String::from(
            "SELECT id, timestamp, event_type, employee_id, matched_employee_id, similarity_score, result, reason, metadata
             FROM audit_log WHERE 1 = 1",
        );
        let mut args: Vec<libsql::Value> = Vec::new();
        let mut idx = 1;

        if let Some(start) = start {
            sql.push_str(&format!(" AND timestamp >= ?{idx}"));
            args.push(start.to_rfc3339().into());
            idx += 1;
        }
        if let Some(end) = end {
            sql.push_str(&format!(" AND timestamp <= ?{idx}"));
            args.push(end.to_rfc3339().into());
            idx += 1;
        }
        if let Some(employee_id) = employee_id {
            sql.push_str(&format!(" AND employee_id = ?{idx}"));
            args.push(employee_id.to_string().into());
            idx += 1;
        }
        sql.push_str(&format!(" ORDER BY timestamp DESC LIMIT ?{idx}"));
        args.push((limit as i64).into());

        let mut rows = conn.query(&sql, args).await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row_to_record(&row)?);
        }
        Ok(out)
    }

    pub async fn count_since(&self, since: DateTime<Utc>) -> Result<u64, StoreError> {
        let conn = self.client.connection().await?;
        let mut rows = conn
            .query(
                "SELECT COUNT(*) FROM audit_log WHERE timestamp >= ?1",
                params![since.to_rfc3339()],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(row.get::<i64>(0)? as u64),
            None => Ok(0),
        }
    }
}

fn row_to_record(row: &libsql::Row) -> Result<AuditRecord, StoreError> {
    let timestamp = DateTime::parse_from_rfc3339(&row.get::<String>(1)?)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Mapping(e.to_string()))?;

    let event_type = EventKind::parse(&row.get::<String>(2)?)
        .ok_or_else(|| StoreError::Mapping("unknown event_type".to_string()))?;
    let result = EventResult::parse(&row.get::<String>(6)?)
        .ok_or_else(|| StoreError::Mapping("unknown result".to_string()))?;

    let metadata = row
        .get::<Option<String>>(8)?
        .and_then(|s| serde_json::from_str(&s).ok());

    Ok(AuditRecord {
        id: row.get(0)?,
        timestamp,
        event_type,
        employee_id: row.get(3)?,
        matched_employee_id: row.get(4)?,
        similarity_score: row.get(5)?,
        result,
        reason: row.get(7)?,
        metadata,
    })
}
