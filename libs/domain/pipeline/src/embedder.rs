use crate::frame::{AlignedFace, BoundingBox, Frame};
use faceaccess_models::config::EmbedderBackend;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("embedding inference failed: {0}")]
    InferenceFailed(String),
}

/// Opaque embedding contract; ONNX and TFLite are interchangeable
/// implementations of the same contract, selected once at startup by
/// `EmbedderBackend` and never switched at runtime.
pub trait Embedder: Send + Sync {
    fn embed(&self, face: &AlignedFace) -> Result<Vec<f32>, EmbedError>;
}

/// Lets the same `Arc<dyn Embedder>` feed both the Pipeline (which takes a
/// `Box<dyn Embedder>`) and the Protocol's enrollment path.
impl Embedder for Arc<dyn Embedder> {
    fn embed(&self, face: &AlignedFace) -> Result<Vec<f32>, EmbedError> {
        self.as_ref().embed(face)
    }
}

/// Selects which concrete embedder implementation the composition root
/// should construct for the configured backend. The implementations
/// themselves are external collaborators (the neural network runtimes);
/// this function only picks a label, it does not load a model.
pub fn backend_label(backend: EmbedderBackend) -> &'static str {
    match backend {
        EmbedderBackend::Onnx => "onnx",
        EmbedderBackend::TfLite => "tflite",
    }
}

/// Crops the supplied bounding box out of `frame` and resamples it (nearest
/// neighbour) to a square `target_size x target_size` RGB8 buffer, the
/// embedder's expected input shape.
pub fn align(frame: &Frame, bbox: &BoundingBox, target_size: u32) -> AlignedFace {
    let mut out = vec![0u8; (target_size * target_size * 3) as usize];

    for ty in 0..target_size {
        for tx in 0..target_size {
            let src_x = (bbox.x + (tx * bbox.width / target_size.max(1)) as i32)
                .clamp(0, frame.width as i32 - 1) as u32;
            let src_y = (bbox.y + (ty * bbox.height / target_size.max(1)) as i32)
                .clamp(0, frame.height as i32 - 1) as u32;

            let src_idx = ((src_y * frame.width + src_x) * 3) as usize;
            let dst_idx = ((ty * target_size + tx) * 3) as usize;
            if src_idx + 3 <= frame.data.len() && dst_idx + 3 <= out.len() {
                out[dst_idx..dst_idx + 3].copy_from_slice(&frame.data[src_idx..src_idx + 3]);
            }
        }
    }

    AlignedFace {
        size: target_size,
        data: out,
    }
}
