//! Ties the framer, HMAC validator, upsert session and command parser
//! together into the `Connection` that a transport adapter drives. This
//! module owns no bytes of its own knowledge about BLE, GATT or TCP — it
//! only knows "bytes arrived" and "here are the wire frames to send back".

use crate::enrollment::{process_photos, EnrollmentError, QualityConfig};
use crate::framer::Framer;
use crate::fragment::{fragment, DEFAULT_FRAGMENT_BUDGET, FINAL};
use crate::hmac_auth::{self, HmacError, NonceLedger};
use crate::session::{SessionError, UpsertSession};
use crate::commands::{self, Command};
use chrono::Utc;
use faceaccess_models::{EventKind, EventResult, NewAuditRecord};
use faceaccess_pipeline::{Detector, Embedder};
use faceaccess_store::Store;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ProtocolConfig {
    pub shared_secret: Option<Vec<u8>>,
    pub admin_mode_enabled: bool,
    pub max_photo_size: usize,
    pub quality: QualityConfig,
    pub fragment_budget: usize,
    pub inactivity_timeout: Duration,
}

/// One BLE central connection's protocol state. The owning transport
/// adapter calls `on_connect`/`on_disconnect` around the link's lifetime and
/// feeds every inbound write through `on_bytes_received`.
pub struct Connection {
    framer: Framer,
    nonce_ledger: NonceLedger,
    session: Option<UpsertSession>,
    config: ProtocolConfig,
    store: Arc<Store>,
    detector: Arc<dyn Detector>,
    embedder: Arc<dyn Embedder>,
}

impl Connection {
    pub fn new(
        config: ProtocolConfig,
        store: Arc<Store>,
        detector: Arc<dyn Detector>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        let framer = Framer::new(config.inactivity_timeout);
        Connection {
            framer,
            nonce_ledger: NonceLedger::new(),
            session: None,
            config,
            store,
            detector,
            embedder,
        }
    }

    /// Connection start/end events reset all receiver state, including
    /// sequence memory, and clear any in-progress upsert session.
    pub fn on_connect(&mut self) {
        self.framer.reset();
        self.session = None;
    }

    pub fn on_disconnect(&mut self) {
        self.framer.reset();
        self.session = None;
    }

    pub fn is_inactive(&self, now: std::time::Instant) -> bool {
        self.framer.is_inactive(now)
    }

    /// Feeds newly-arrived bytes and returns the complete set of wire frames
    /// (already fragmented if needed) to notify back, in order.
    pub async fn on_bytes_received(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        let messages = self.framer.feed(bytes);
        let mut out = Vec::new();
        for message in messages {
            if let Some(response) = self.handle_message(&message).await {
                out.extend(self.encode_response(&response));
            }
        }
        out
    }

    fn encode_response(&self, response: &Value) -> Vec<Vec<u8>> {
        let encoded = serde_json::to_vec(response).unwrap_or_else(|_| b"{}".to_vec());
        if encoded.len() <= self.config.fragment_budget {
            let mut frame = Vec::with_capacity(encoded.len() + 1);
            frame.push(FINAL);
            frame.extend_from_slice(&encoded);
            vec![frame]
        } else {
            fragment(&encoded, self.config.fragment_budget)
        }
    }

    async fn handle_message(&mut self, payload: &[u8]) -> Option<Value> {
        let value: Value = match serde_json::from_slice(payload) {
            Ok(v) => v,
            Err(err) => return Some(error_response(&format!("malformed JSON: {err}"))),
        };

        let command = match commands::parse_command(&value) {
            Ok(c) => c,
            Err(msg) => return Some(error_response(&msg)),
        };

        if command.requires_admin_mode() && !self.config.admin_mode_enabled {
            return Some(error_response("admin mode is disabled"));
        }

        if command.requires_hmac() {
            let now = hmac_auth::current_unix_timestamp();
            self.nonce_ledger.sweep(now);
            if let Err(err) = hmac_auth::verify_command(
                &value,
                self.config.shared_secret.as_deref(),
                &mut self.nonce_ledger,
                now,
            ) {
                return Some(error_response(&hmac_error_message(&err)));
            }
        }

        self.dispatch(command).await
    }

    /// `None` means no wire response should be sent for this command — only
    /// an intermediate (non-final) `PhotoChunk` write takes that path.
    async fn dispatch(&mut self, command: Command) -> Option<Value> {
        match command {
            Command::BeginUpsert(cmd) => {
                self.session = Some(UpsertSession::new(
                    cmd.employee_id,
                    cmd.display_name,
                    cmd.access_start,
                    cmd.access_end,
                    cmd.num_photos,
                    self.config.max_photo_size,
                ));
                Some(ok_response(None))
            }
            Command::PhotoChunk(cmd) => {
                let Some(session) = self.session.as_mut() else {
                    return Some(error_response("no upsert session in progress"));
                };
                let num_photos = session.num_photos;
                match session.append_chunk(&cmd.data, cmd.is_last, cmd.sha256.as_deref()) {
                    Ok(true) => Some(json!({
                        "type": "OK",
                        "photos_received": session.received,
                        "photos_total": num_photos,
                    })),
                    Ok(false) => None,
                    Err(SessionError::HashMismatch) => {
                        Some(error_response("hash mismatch; please resend this photo"))
                    }
                    Err(err) => Some(error_response(&err.to_string())),
                }
            }
            Command::EndUpsert => Some(self.finish_upsert().await),
            Command::UpdatePeriod(cmd) => {
                match self
                    .store
                    .update_employee_period(&cmd.employee_id, cmd.access_start, cmd.access_end)
                    .await
                {
                    Ok(true) => {
                        self.audit_admin_command(Some(cmd.employee_id), EventResult::Granted, None)
                            .await;
                        Some(ok_response(None))
                    }
                    Ok(false) => Some(error_response(&format!("unknown employee '{}'", cmd.employee_id))),
                    Err(err) => Some(error_response(&err.to_string())),
                }
            }
            Command::Deactivate { employee_id } => {
                match self.store.deactivate_employee(&employee_id).await {
                    Ok(true) => {
                        self.audit_admin_command(Some(employee_id), EventResult::Granted, None)
                            .await;
                        Some(ok_response(None))
                    }
                    Ok(false) => Some(error_response(&format!("unknown employee '{employee_id}'"))),
                    Err(err) => Some(error_response(&err.to_string())),
                }
            }
            Command::Delete { employee_id } => match self.store.delete_employee(&employee_id).await {
                Ok(true) => {
                    self.audit_admin_command(Some(employee_id), EventResult::Granted, None)
                        .await;
                    Some(ok_response(None))
                }
                Ok(false) => Some(error_response(&format!("unknown employee '{employee_id}'"))),
                Err(err) => Some(error_response(&err.to_string())),
            },
            Command::GetStatus => Some(match self.store.get_system_status().await {
                Ok(status) => json!({"type": "STATUS", "data": status.to_json()}),
                Err(err) => error_response(&err.to_string()),
            }),
            Command::ListEmployees => Some(match self.store.list_employees().await {
                Ok(employees) => json!({"type": "EMPLOYEES", "data": employees}),
                Err(err) => error_response(&err.to_string()),
            }),
            Command::GetAuditLogs(cmd) => Some(match self
                .store
                .get_audit_logs(None, None, cmd.employee_id.as_deref(), cmd.limit)
                .await
            {
                Ok(logs) => json!({"type": "AUDIT_LOGS", "data": logs}),
                Err(err) => error_response(&err.to_string()),
            }),
        }
    }

    async fn finish_upsert(&mut self) -> Value {
        let Some(session) = self.session.take() else {
            return error_response("no upsert session in progress");
        };

        if let Err(err) = session.finish() {
            // The session is consumed either way: a retry must BEGIN_UPSERT again.
            return error_response(&err.to_string());
        }

        let embeddings = match process_photos(
            &session.photos,
            self.detector.as_ref(),
            self.embedder.as_ref(),
            &self.config.quality,
        ) {
            Ok(vectors) => vectors,
            Err(err) => return error_response(&enrollment_error_message(&err)),
        };

        if let Err(err) = self
            .store
            .upsert_employee(
                &session.employee_id,
                session.display_name.as_deref(),
                session.access_start,
                session.access_end,
                true,
            )
            .await
        {
            return error_response(&err.to_string());
        }

        if let Err(err) = self.store.delete_embeddings(&session.employee_id).await {
            return error_response(&err.to_string());
        }

        for vector in &embeddings {
            if let Err(err) = self
                .store
                .add_embedding(&session.employee_id, vector, None)
                .await
            {
                return error_response(&err.to_string());
            }
        }

        self.audit_admin_command(Some(session.employee_id.clone()), EventResult::Granted, None)
            .await;

        json!({
            "type": "OK",
            "message": format!("Registered {} with {} embeddings", session.employee_id, embeddings.len()),
        })
    }

    async fn audit_admin_command(
        &self,
        employee_id: Option<String>,
        result: EventResult,
        reason: Option<String>,
    ) {
        let record = NewAuditRecord {
            event_type: EventKind::AdminCommand,
            employee_id,
            matched_employee_id: None,
            similarity_score: None,
            result,
            reason,
            metadata: None,
        };
        if let Err(err) = self.store.log_access_attempt(record).await {
            tracing::warn!(error = %err, "failed to log admin command to audit trail");
        }
        let _ = Utc::now();
    }
}

fn ok_response(data: Option<Value>) -> Value {
    match data {
        Some(data) => json!({"type": "OK", "data": data}),
        None => json!({"type": "OK"}),
    }
}

fn error_response(message: &str) -> Value {
    json!({"type": "ERROR", "message": message})
}

fn hmac_error_message(err: &HmacError) -> String {
    match err {
        HmacError::NoSecretConfigured => "HMAC validation failed: no shared secret configured".to_string(),
        other => format!("HMAC validation failed: {other}"),
    }
}

fn enrollment_error_message(err: &EnrollmentError) -> String {
    format!("enrollment failed: {err}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use faceaccess_pipeline::{BoundingBox, DetectedFace, EmbedError};

    struct AlwaysOneFace;
    impl Detector for AlwaysOneFace {
        fn detect(&self, frame: &faceaccess_pipeline::Frame) -> Vec<DetectedFace> {
            vec![DetectedFace {
                bbox: BoundingBox {
                    x: 10,
                    y: 10,
                    width: frame.width.saturating_sub(20).max(1),
                    height: frame.height.saturating_sub(20).max(1),
                },
                confidence: 0.99,
            }]
        }
    }

    struct FixedEmbedder;
    impl Embedder for FixedEmbedder {
        fn embed(&self, _face: &faceaccess_pipeline::AlignedFace) -> Result<Vec<f32>, EmbedError> {
            Ok(vec![0.1, 0.2, 0.3])
        }
    }

    fn test_config() -> ProtocolConfig {
        ProtocolConfig {
            shared_secret: Some(b"topsecret".to_vec()),
            admin_mode_enabled: true,
            max_photo_size: 10 << 20,
            quality: QualityConfig {
                min_face_size: 1,
                blur_threshold: -1.0,
                align_size: 16,
            },
            fragment_budget: DEFAULT_FRAGMENT_BUDGET,
            inactivity_timeout: Duration::from_secs(30),
        }
    }

    fn wire_frame(seq: u8, payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(payload.len() as u16).to_be_bytes());
        out.push(seq);
        out.extend_from_slice(payload);
        out
    }

    async fn test_connection() -> Connection {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");
        // Leaked path string is fine: lives only for the duration of one test.
        let store = Store::open(path.to_str().unwrap()).await.unwrap();
        Connection::new(
            test_config(),
            Arc::new(store),
            Arc::new(AlwaysOneFace),
            Arc::new(FixedEmbedder),
        )
    }

    #[tokio::test]
    async fn non_admin_command_round_trips_without_hmac() {
        let mut conn = test_connection().await;
        let payload = serde_json::to_vec(&json!({"command": "GET_STATUS"})).unwrap();
        let frames = conn.on_bytes_received(&wire_frame(0, &payload)).await;
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0][0], FINAL);
        let body: Value = serde_json::from_slice(&frames[0][1..]).unwrap();
        assert_eq!(body["type"], "STATUS");
    }

    #[tokio::test]
    async fn admin_command_without_hmac_fields_is_rejected() {
        let mut conn = test_connection().await;
        let payload = serde_json::to_vec(&json!({
            "command": "DEACTIVATE",
            "employee_id": "EMP001",
        }))
        .unwrap();
        let frames = conn.on_bytes_received(&wire_frame(0, &payload)).await;
        let body: Value = serde_json::from_slice(&frames[0][1..]).unwrap();
        assert_eq!(body["type"], "ERROR");
        assert!(body["message"].as_str().unwrap().contains("HMAC"));
    }

    #[tokio::test]
    async fn disconnect_clears_in_progress_session() {
        let mut conn = test_connection().await;
        conn.session = Some(UpsertSession::new(
            "EMP001".into(),
            None,
            Utc::now(),
            Utc::now() + chrono::Duration::days(1),
            1,
            1024,
        ));
        conn.on_disconnect();
        assert!(conn.session.is_none());
    }

    #[tokio::test]
    async fn intermediate_photo_chunk_emits_no_notification() {
        let mut conn = test_connection().await;
        conn.session = Some(UpsertSession::new(
            "EMP001".into(),
            None,
            Utc::now(),
            Utc::now() + chrono::Duration::days(1),
            2,
            1024,
        ));
        let payload = serde_json::to_vec(&json!({
            "command": "PHOTO_CHUNK",
            "chunk_index": 0,
            "total_chunks": 2,
            "data": base64::engine::general_purpose::STANDARD.encode(b"partial"),
            "is_last": false,
        }))
        .unwrap();
        let frames = conn.on_bytes_received(&wire_frame(0, &payload)).await;
        assert!(frames.is_empty(), "intermediate chunk must not trigger a notification");
    }

    #[tokio::test]
    async fn end_upsert_without_begin_is_an_error() {
        let mut conn = test_connection().await;
        let payload = serde_json::to_vec(&json!({"command": "END_UPSERT"})).unwrap();
        let frames = conn.on_bytes_received(&wire_frame(0, &payload)).await;
        let body: Value = serde_json::from_slice(&frames[0][1..]).unwrap();
        assert_eq!(body["type"], "ERROR");
    }
}
