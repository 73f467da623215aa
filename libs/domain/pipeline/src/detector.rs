use crate::frame::{DetectedFace, Frame};
use std::sync::Arc;

/// Opaque face-detection contract. The neural network itself is an external
/// collaborator; this crate only defines the boundary it must satisfy and
/// the bounding-box selection/stability logic that sits downstream of it.
pub trait Detector: Send + Sync {
    fn detect(&self, frame: &Frame) -> Vec<DetectedFace>;
}

impl<F> Detector for F
where
    F: Fn(&Frame) -> Vec<DetectedFace> + Send + Sync,
{
    fn detect(&self, frame: &Frame) -> Vec<DetectedFace> {
        (self)(frame)
    }
}

/// Lets the same `Arc<dyn Detector>` feed both the Pipeline (which takes a
/// `Box<dyn Detector>`) and the Protocol's enrollment path without cloning
/// the underlying detector.
impl Detector for Arc<dyn Detector> {
    fn detect(&self, frame: &Frame) -> Vec<DetectedFace> {
        self.as_ref().detect(frame)
    }
}

/// The face of greatest bounding-box area, or `None` if `faces` is empty.
pub fn largest_face(faces: &[DetectedFace]) -> Option<&DetectedFace> {
    faces.iter().max_by_key(|f| f.bbox.area())
}
