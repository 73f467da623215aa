//! The declarative configuration document described in the system's
//! external interfaces. Loading is intentionally thin: deserialize and
//! surface a [`ConfigError`] on malformed YAML. Per-field defaults match the
//! values named in the base specification; cross-field invariants (e.g. an
//! employee's access window) are the store's responsibility, not the
//! config loader's.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path} as YAML: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraType {
    Usb,
    Rtsp,
    Csi,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraTransport {
    Tcp,
    Udp,
}

fn default_fps() -> u32 {
    15
}
fn default_width() -> u32 {
    640
}
fn default_height() -> u32 {
    480
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    #[serde(rename = "type")]
    pub camera_type: CameraType,
    pub device_id: Option<String>,
    pub url: Option<String>,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default)]
    pub transport: Option<CameraTransport>,
    #[serde(default)]
    pub rotation: i32,
    #[serde(default)]
    pub hflip: bool,
    #[serde(default)]
    pub vflip: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbedderBackend {
    Onnx,
    TfLite,
}

fn default_similarity_threshold() -> f32 {
    0.6
}
fn default_embedding_dim() -> usize {
    512
}
fn default_input_size() -> u32 {
    112
}
fn default_quality_min_face_size() -> u32 {
    80
}
fn default_quality_blur_threshold() -> f64 {
    100.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceConfig {
    pub model_path: String,
    #[serde(default)]
    pub detector_type: Option<String>,
    #[serde(default)]
    pub detector_scale_factor: Option<f32>,
    #[serde(default)]
    pub detector_min_neighbors: Option<u32>,
    #[serde(default)]
    pub detector_min_size: Option<u32>,
    #[serde(default = "default_embedding_dim")]
    pub embedding_dim: usize,
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
    #[serde(default = "default_quality_min_face_size")]
    pub quality_min_face_size: u32,
    #[serde(default = "default_quality_blur_threshold")]
    pub quality_blur_threshold: f64,
    #[serde(default = "default_true")]
    pub align_enabled: bool,
    #[serde(default = "default_input_size")]
    pub input_size: u32,
    #[serde(default)]
    pub norm_mean: Vec<f32>,
    #[serde(default)]
    pub norm_std: Vec<f32>,
    #[serde(default)]
    pub embedder_backend: EmbedderBackend,
}

impl Default for EmbedderBackend {
    fn default() -> Self {
        EmbedderBackend::Onnx
    }
}

fn default_true() -> bool {
    true
}

fn default_service_uuid() -> String {
    "12345678-1234-5678-1234-56789abcdef0".to_string()
}
fn default_command_char_uuid() -> String {
    "12345678-1234-5678-1234-56789abcdef1".to_string()
}
fn default_response_char_uuid() -> String {
    "12345678-1234-5678-1234-56789abcdef2".to_string()
}
fn default_photo_chunk_size() -> usize {
    512
}
fn default_max_photo_size() -> usize {
    2 * 1024 * 1024
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BleConfig {
    #[serde(default = "default_device_name")]
    pub device_name: String,
    #[serde(default = "default_service_uuid")]
    pub service_uuid: String,
    #[serde(default = "default_command_char_uuid")]
    pub command_char_uuid: String,
    #[serde(default = "default_response_char_uuid")]
    pub response_char_uuid: String,
    #[serde(default = "default_photo_chunk_size")]
    pub photo_chunk_size: usize,
    #[serde(default = "default_max_photo_size")]
    pub max_photo_size: usize,
    pub shared_secret: Option<String>,
    #[serde(default = "default_true")]
    pub hmac_enabled: bool,
    #[serde(default)]
    pub use_real_ble: bool,
}

fn default_device_name() -> String {
    "RP3_FaceAccess".to_string()
}

fn default_unlock_duration() -> f64 {
    3.0
}
fn default_cooldown() -> f64 {
    0.5
}
fn default_max_attempts_per_minute() -> u32 {
    30
}
fn default_granted_lockout() -> f64 {
    10.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessConfig {
    #[serde(default)]
    pub admin_mode_enabled: bool,
    #[serde(default = "default_unlock_duration")]
    pub unlock_duration_sec: f64,
    #[serde(default = "default_cooldown")]
    pub cooldown_sec: f64,
    #[serde(default = "default_max_attempts_per_minute")]
    pub max_attempts_per_minute: u32,
    #[serde(default = "default_granted_lockout")]
    pub granted_lockout_sec: f64,
}

fn default_gpio_chip() -> String {
    "gpiochip0".to_string()
}
fn default_button_debounce_ms() -> u64 {
    50
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockConfig {
    pub gpio_pin: u32,
    #[serde(default = "default_gpio_chip")]
    pub gpio_chip: String,
    #[serde(default = "default_true")]
    pub active_high: bool,
    #[serde(default)]
    pub mock_mode: bool,
    pub button_pin: Option<u32>,
    #[serde(default = "default_true")]
    pub button_active_low: bool,
    #[serde(default = "default_button_debounce_ms")]
    pub button_debounce_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub camera: CameraConfig,
    pub face: FaceConfig,
    pub ble: BleConfig,
    pub access: AccessConfig,
    pub lock: LockConfig,
    pub database: DatabaseConfig,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_document_fills_in_documented_defaults() {
        let yaml = r#"
camera:
  type: usb
face:
  model_path: /opt/models/embedder.onnx
ble:
  shared_secret: "s3cr3t"
access: {}
lock:
  gpio_pin: 17
database:
  path: /var/lib/faceaccessd/store.db
"#;
        let cfg: AppConfig = serde_yaml::from_str(yaml).expect("parses");
        assert_eq!(cfg.ble.device_name, "RP3_FaceAccess");
        assert_eq!(cfg.ble.service_uuid, "12345678-1234-5678-1234-56789abcdef0");
        assert_eq!(cfg.access.cooldown_sec, 0.5);
        assert_eq!(cfg.access.max_attempts_per_minute, 30);
        assert_eq!(cfg.access.granted_lockout_sec, 10.0);
        assert!(cfg.lock.active_high);
        assert_eq!(cfg.lock.button_debounce_ms, 50);
        assert_eq!(cfg.log_level, "info");
    }
}
