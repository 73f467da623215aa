use crate::camera::{CameraBackend, CameraSource};
use crate::detector::{largest_face, Detector};
use crate::embedder::{align, Embedder};
use crate::stability::StabilityTracker;
use chrono::Utc;
use faceaccess_actuator::Actuator;
use faceaccess_matcher::{find_best_match, Candidate};
use faceaccess_models::{EventKind, EventResult, NewAuditRecord};
use faceaccess_policy::PolicyEngine;
use faceaccess_store::Store;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("camera acquisition exhausted after {0} reopen attempts")]
    CameraExhausted(u32),
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// `k`: consecutive acquire failures before the adapter is reopened.
    pub max_acquire_failures: u32,
    /// `R`: reopen attempts before the loop aborts and surfaces to the caller.
    pub max_reopen_attempts: u32,
    /// `T_pos`.
    pub stability_position_tolerance: i32,
    /// `S`.
    pub stability_required_count: u32,
    pub align_size: u32,
    pub similarity_threshold: f32,
    /// `C_g`, the post-grant cooldown sleep.
    pub grant_cooldown: Duration,
    pub no_face_sleep: Duration,
    pub unstable_sleep: Duration,
    pub denied_sleep: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            max_acquire_failures: 30,
            max_reopen_attempts: 5,
            stability_position_tolerance: 50,
            stability_required_count: 3,
            align_size: 112,
            similarity_threshold: 0.6,
            grant_cooldown: Duration::from_millis(500),
            no_face_sleep: Duration::from_millis(20),
            unstable_sleep: Duration::from_millis(100),
            denied_sleep: Duration::from_millis(100),
        }
    }
}

pub struct PipelineDeps {
    pub camera: CameraBackend,
    pub detector: Box<dyn Detector>,
    pub embedder: Box<dyn Embedder>,
    pub store: Arc<Store>,
    pub policy: Arc<PolicyEngine>,
    pub actuator: Arc<Actuator>,
}

/// Runs the acquire → detect → stability → align → embed → match → policy →
/// actuate loop until `shutdown` fires or the camera adapter is exhausted.
/// Panics inside one iteration are the Supervisor's concern, not this
/// function's — it returns `Err` only on unrecoverable camera failure.
pub async fn run(
    mut deps: PipelineDeps,
    config: PipelineConfig,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), PipelineError> {
    deps.camera.open().map_err(|e| {
        tracing::error!(error = %e, "initial camera open failed");
        PipelineError::CameraExhausted(0)
    })?;

    let mut stability = StabilityTracker::new(
        config.stability_position_tolerance,
        config.stability_required_count,
    );
    let mut consecutive_acquire_failures = 0u32;
    let mut reopen_attempts = 0u32;

    loop {
        if *shutdown.borrow() {
            break;
        }

        let frame = match deps.camera.read_latest_frame() {
            Some(frame) => {
                consecutive_acquire_failures = 0;
                frame
            }
            None => {
                consecutive_acquire_failures += 1;
                if consecutive_acquire_failures >= config.max_acquire_failures {
                    reopen_attempts += 1;
                    if reopen_attempts > config.max_reopen_attempts {
                        return Err(PipelineError::CameraExhausted(reopen_attempts));
                    }
                    tracing::warn!(reopen_attempts, "reopening camera adapter");
                    deps.camera.release();
                    deps.camera.open().ok();
                    consecutive_acquire_failures = 0;
                }
                tokio::time::sleep(config.no_face_sleep).await;
                continue;
            }
        };

        let faces = deps.detector.detect(&frame);
        let chosen = match largest_face(&faces) {
            Some(face) => face,
            None => {
                stability.reset();
                tokio::time::sleep(config.no_face_sleep).await;
                continue;
            }
        };

        if !stability.observe(chosen.bbox) {
            tokio::time::sleep(config.unstable_sleep).await;
            continue;
        }

        let aligned = align(&frame, &chosen.bbox, config.align_size);
        let embedding = match deps.embedder.embed(&aligned) {
            Ok(vector) => vector,
            Err(err) => {
                tracing::warn!(error = %err, "embedding failed");
                stability.reset();
                continue;
            }
        };

        let candidates = match deps.store.get_active_employees_with_embeddings().await {
            Ok(rows) => rows,
            Err(err) => {
                tracing::error!(error = %err, "failed to snapshot active employees");
                stability.reset();
                continue;
            }
        };

        let match_result = find_best_match(
            &embedding,
            candidates
                .iter()
                .map(|(employee, vectors)| Candidate {
                    employee_id: &employee.employee_id,
                    display_name: employee.display_name.as_deref(),
                    embeddings: vectors,
                }),
            config.similarity_threshold,
        );

        let matched_employee = match &match_result.employee_id {
            Some(id) => match deps.store.get_employee(id).await {
                Ok(found) => found,
                Err(err) => {
                    tracing::error!(error = %err, employee_id = %id, "failed to look up matched employee");
                    None
                }
            },
            None => None,
        };

        let now = Utc::now();
        let decision = deps.policy.process_access_attempt(
            matched_employee.as_ref(),
            match_result.score,
            config.similarity_threshold,
            now,
        );

        let audit = NewAuditRecord {
            event_type: EventKind::FaceRecognition,
            employee_id: matched_employee.as_ref().map(|e| e.employee_id.clone()),
            matched_employee_id: match_result.employee_id.clone(),
            similarity_score: Some(match_result.score),
            result: if decision.granted {
                EventResult::Granted
            } else {
                EventResult::Denied
            },
            reason: Some(decision.reason.clone()),
            metadata: Some(decision.metadata.clone()),
        };
        if let Err(err) = deps.store.log_access_attempt(audit).await {
            tracing::error!(error = %err, "failed to record audit entry");
        }

        if decision.granted {
            deps.actuator.unlock(None);
            stability.reset();
            tokio::time::sleep(config.grant_cooldown).await;
        } else {
            stability.reset();
            tokio::time::sleep(config.denied_sleep).await;
        }
    }

    deps.camera.release();
    Ok(())
}
