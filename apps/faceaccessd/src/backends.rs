//! Concrete stand-ins for the opaque capability traits `faceaccess_pipeline`
//! defines (`Detector`, `Embedder`, `RawFrameSource`). The neural networks
//! and camera drivers behind these traits are external collaborators — this
//! module only supplies the integration seam a real deployment wires a
//! vendor SDK or model runtime into; it never ships recognition logic.

use faceaccess_models::config::{CameraConfig, EmbedderBackend, FaceConfig};
use faceaccess_pipeline::{
    AlignedFace, CameraBackend, DetectedFace, Detector, EmbedError, Embedder, Frame,
};
use std::sync::Arc;

/// Reports zero faces on every frame. Swapped out for a real detector by
/// whatever build wires an actual model at `face.model_path`.
pub struct NoopDetector;

impl Detector for NoopDetector {
    fn detect(&self, _frame: &Frame) -> Vec<DetectedFace> {
        Vec::new()
    }
}

/// Always fails — there is no embedding to compute without a real model
/// loaded. Kept distinct from `NoopDetector` returning an empty face list so
/// a future real embedder only has to replace this one call site.
pub struct UnloadedEmbedder {
    backend: EmbedderBackend,
    model_path: String,
}

impl Embedder for UnloadedEmbedder {
    fn embed(&self, _face: &AlignedFace) -> Result<Vec<f32>, EmbedError> {
        Err(EmbedError::InferenceFailed(format!(
            "no {:?} model loaded from '{}'; wire a real embedder here",
            self.backend, self.model_path
        )))
    }
}

pub fn build_detector(_face: &FaceConfig) -> Arc<dyn Detector> {
    Arc::new(NoopDetector)
}

pub fn build_embedder(face: &FaceConfig) -> Arc<dyn Embedder> {
    Arc::new(UnloadedEmbedder {
        backend: face.embedder_backend,
        model_path: face.model_path.clone(),
    })
}

/// Synthesizes flat gray frames at the configured resolution. Stands in for
/// the USB/IP/CSI capture backends, which are opaque `RawFrameSource`
/// closures supplied by the composition root in a real deployment.
pub fn build_camera(camera: &CameraConfig) -> CameraBackend {
    let width = camera.width;
    let height = camera.height;
    let factory: Box<dyn FnOnce() -> Box<dyn faceaccess_pipeline::RawFrameSource> + Send> =
        Box::new(move || {
            Box::new(move || {
                Ok(Frame::new(width, height, vec![128u8; (width * height * 3) as usize]))
            })
        });

    match camera.camera_type {
        faceaccess_models::config::CameraType::Usb => CameraBackend::usb(factory),
        faceaccess_models::config::CameraType::Rtsp => CameraBackend::ip(factory),
        faceaccess_models::config::CameraType::Csi => CameraBackend::csi(factory),
    }
}
