use chrono::{Duration as ChronoDuration, Utc};
use faceaccess_actuator::{Actuator, GpioLines, MockLines};
use faceaccess_pipeline::{
    AlignedFace, BoundingBox, CameraBackend, DetectedFace, Detector, EmbedError, Embedder, Frame,
    PipelineConfig, PipelineDeps, RawFrameSource,
};
use faceaccess_policy::{PolicyConfig, PolicyEngine};
use faceaccess_store::Store;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

struct CenteredFaceDetector;
impl Detector for CenteredFaceDetector {
    fn detect(&self, frame: &Frame) -> Vec<DetectedFace> {
        vec![DetectedFace {
            bbox: BoundingBox {
                x: 10,
                y: 10,
                width: frame.width.saturating_sub(20).max(1),
                height: frame.height.saturating_sub(20).max(1),
            },
            confidence: 0.98,
        }]
    }
}

struct FixedVectorEmbedder(Vec<f32>);
impl Embedder for FixedVectorEmbedder {
    fn embed(&self, _face: &AlignedFace) -> Result<Vec<f32>, EmbedError> {
        Ok(self.0.clone())
    }
}

fn synthetic_camera() -> CameraBackend {
    let factory: Box<dyn FnOnce() -> Box<dyn RawFrameSource> + Send> =
        Box::new(|| Box::new(|| Ok(Frame::new(64, 64, vec![128u8; 64 * 64 * 3]))));
    CameraBackend::usb(factory)
}

fn fast_config() -> PipelineConfig {
    PipelineConfig {
        stability_required_count: 2,
        similarity_threshold: 0.6,
        grant_cooldown: Duration::from_millis(10),
        no_face_sleep: Duration::from_millis(5),
        unstable_sleep: Duration::from_millis(5),
        denied_sleep: Duration::from_millis(5),
        ..PipelineConfig::default()
    }
}

#[tokio::test]
async fn recognized_employee_inside_their_window_unlocks_the_door() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(Store::open(dir.path().join("store.db").to_str().unwrap()).await.unwrap());

    let now = Utc::now();
    store
        .upsert_employee("emp-1", Some("Riley"), now - ChronoDuration::days(1), now + ChronoDuration::days(1), true)
        .await
        .unwrap();
    let enrolled_vector = vec![1.0_f32, 0.0, 0.0];
    store.add_embedding("emp-1", &enrolled_vector, None).await.unwrap();

    let lines: Arc<dyn GpioLines> = Arc::new(MockLines::new());
    let actuator = Arc::new(Actuator::new(Arc::clone(&lines), Duration::from_millis(50), Duration::from_millis(20)));

    let deps = PipelineDeps {
        camera: synthetic_camera(),
        detector: Box::new(CenteredFaceDetector),
        embedder: Box::new(FixedVectorEmbedder(enrolled_vector)),
        store: Arc::clone(&store),
        policy: Arc::new(PolicyEngine::new(PolicyConfig {
            cooldown: Duration::from_millis(0),
            max_attempts_per_minute: 100,
            granted_lockout: Duration::from_millis(0),
        })),
        actuator: Arc::clone(&actuator),
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(faceaccess_pipeline::run(deps, fast_config(), shutdown_rx));

    // Give the capture thread and a few loop iterations time to reach a
    // stable, matched, granted decision.
    tokio::time::sleep(Duration::from_millis(300)).await;
    shutdown_tx.send(true).unwrap();
    handle.await.unwrap().unwrap();

    let logs = store.get_audit_logs(None, None, Some("emp-1"), 10).await.unwrap();
    assert!(!logs.is_empty(), "expected at least one audit entry for emp-1");
    assert!(logs.iter().any(|r| r.result == faceaccess_models::EventResult::Granted));
}

#[tokio::test]
async fn unrecognized_face_is_denied_and_never_unlocks() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(Store::open(dir.path().join("store.db").to_str().unwrap()).await.unwrap());

    let lines = Arc::new(MockLines::new());
    let gpio_lines: Arc<dyn GpioLines> = lines.clone();
    let actuator = Arc::new(Actuator::new(gpio_lines, Duration::from_millis(50), Duration::from_millis(20)));

    let deps = PipelineDeps {
        camera: synthetic_camera(),
        detector: Box::new(CenteredFaceDetector),
        embedder: Box::new(FixedVectorEmbedder(vec![0.0, 1.0, 0.0])),
        store: Arc::clone(&store),
        policy: Arc::new(PolicyEngine::new(PolicyConfig {
            cooldown: Duration::from_millis(0),
            max_attempts_per_minute: 100,
            granted_lockout: Duration::from_millis(0),
        })),
        actuator: Arc::clone(&actuator),
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(faceaccess_pipeline::run(deps, fast_config(), shutdown_rx));

    tokio::time::sleep(Duration::from_millis(200)).await;
    shutdown_tx.send(true).unwrap();
    handle.await.unwrap().unwrap();

    assert!(!lines.relay_is_active());
    let logs = store.get_audit_logs(None, None, None, 10).await.unwrap();
    assert!(!logs.is_empty());
    assert!(logs.iter().all(|r| r.result == faceaccess_models::EventResult::Denied));
}
