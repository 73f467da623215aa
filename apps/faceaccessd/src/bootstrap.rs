//! Component construction and wiring, in the fixed order Store → Actuator →
//! Transport → Pipeline. Nothing here runs a loop; `kernel` owns that.

use crate::backends;
use faceaccess_actuator::{Actuator, CdevLines, GpioLines, MockLines};
use faceaccess_models::config::AppConfig;
use faceaccess_models::{EventKind, EventResult, NewAuditRecord};
use faceaccess_pipeline::{PipelineConfig, PipelineDeps};
use faceaccess_policy::{PolicyConfig, PolicyEngine};
use faceaccess_protocol::{Connection, ProtocolConfig, QualityConfig};
use faceaccess_store::Store;
use faceaccess_transport::BleEndpoints;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("store open failed: {0}")]
    Store(#[from] faceaccess_store::StoreError),
    #[error("actuator GPIO init failed: {0}")]
    Gpio(#[from] faceaccess_actuator::GpioError),
    #[error("BLE endpoint configuration invalid: {0}")]
    Transport(#[from] faceaccess_transport::TransportError),
}

/// Everything the Supervisor needs to launch and later tear down.
pub struct Components {
    pub store: Arc<Store>,
    pub policy: Arc<PolicyEngine>,
    pub actuator: Arc<Actuator>,
    pub connection: Arc<Mutex<Connection>>,
    pub ble_endpoints: BleEndpoints,
    pub pipeline_deps_factory: Box<dyn FnMut() -> PipelineDeps + Send>,
    pub pipeline_config: PipelineConfig,
}

pub async fn build(config: &AppConfig) -> Result<Components, BootstrapError> {
    let store = Arc::new(Store::open(&config.database.path).await?);
    tracing::info!(path = %config.database.path, "store opened");

    let policy = Arc::new(PolicyEngine::new(PolicyConfig::from(&config.access)));

    let actuator = build_actuator(config)?;
    let button_store = Arc::clone(&store);
    let button_actuator = Arc::clone(&actuator);
    let runtime_handle = tokio::runtime::Handle::current();
    actuator.start_button_monitor(Some(Arc::new(move || {
        let store = Arc::clone(&button_store);
        let actuator = Arc::clone(&button_actuator);
        runtime_handle.spawn(async move {
            let record = NewAuditRecord {
                event_type: EventKind::ExitButton,
                employee_id: None,
                matched_employee_id: None,
                similarity_score: None,
                result: EventResult::Granted,
                reason: Some("Exit button pressed".to_string()),
                metadata: None,
            };
            if let Err(err) = store.log_access_attempt(record).await {
                tracing::error!(error = %err, "failed to record exit-button audit entry");
            }
        });
        actuator.unlock(None);
    })));
    tracing::info!("actuator ready, button monitor running");

    let detector = backends::build_detector(&config.face);
    let embedder = backends::build_embedder(&config.face);

    let protocol_config = ProtocolConfig {
        shared_secret: config.ble.shared_secret.as_ref().filter(|_| config.ble.hmac_enabled).map(|s| s.as_bytes().to_vec()),
        admin_mode_enabled: config.access.admin_mode_enabled,
        max_photo_size: config.ble.max_photo_size,
        quality: QualityConfig {
            min_face_size: config.face.quality_min_face_size,
            blur_threshold: config.face.quality_blur_threshold as f32,
            align_size: config.face.input_size,
        },
        fragment_budget: faceaccess_protocol::DEFAULT_FRAGMENT_BUDGET,
        inactivity_timeout: Duration::from_secs(60),
    };
    let connection = Arc::new(Mutex::new(Connection::new(
        protocol_config,
        Arc::clone(&store),
        Arc::clone(&detector),
        Arc::clone(&embedder),
    )));

    let ble_endpoints = BleEndpoints::parse(
        &config.ble.device_name,
        &config.ble.service_uuid,
        &config.ble.command_char_uuid,
        &config.ble.response_char_uuid,
    )?;

    let pipeline_config = PipelineConfig {
        similarity_threshold: config.face.similarity_threshold,
        align_size: config.face.input_size,
        grant_cooldown: Duration::from_secs_f64(config.access.cooldown_sec.max(0.0)),
        ..PipelineConfig::default()
    };

    let camera_config = config.camera.clone();
    let pipeline_store = Arc::clone(&store);
    let pipeline_policy = Arc::clone(&policy);
    let pipeline_actuator = Arc::clone(&actuator);
    let pipeline_deps_factory: Box<dyn FnMut() -> PipelineDeps + Send> = Box::new(move || {
        PipelineDeps {
            camera: backends::build_camera(&camera_config),
            detector: Box::new(Arc::clone(&detector)),
            embedder: Box::new(Arc::clone(&embedder)),
            store: Arc::clone(&pipeline_store),
            policy: Arc::clone(&pipeline_policy),
            actuator: Arc::clone(&pipeline_actuator),
        }
    });

    Ok(Components {
        store,
        policy,
        actuator,
        connection,
        ble_endpoints,
        pipeline_deps_factory,
        pipeline_config,
    })
}

fn build_actuator(config: &AppConfig) -> Result<Arc<Actuator>, BootstrapError> {
    let lines: Arc<dyn GpioLines> = if config.lock.mock_mode {
        tracing::warn!("GPIO mock mode enabled; relay and button are simulated");
        Arc::new(MockLines::new())
    } else {
        Arc::new(CdevLines::open(
            &config.lock.gpio_chip,
            config.lock.gpio_pin,
            config.lock.active_high,
            config.lock.button_pin,
            config.lock.button_active_low,
        )?)
    };

    Ok(Arc::new(Actuator::new(
        lines,
        Duration::from_secs_f64(config.access.unlock_duration_sec),
        Duration::from_millis(config.lock.button_debounce_ms),
    )))
}
