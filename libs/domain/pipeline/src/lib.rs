pub mod camera;
pub mod detector;
pub mod embedder;
pub mod frame;
pub mod run;
pub mod stability;

pub use camera::{CameraBackend, CameraError, CameraSource, RawFrameSource};
pub use detector::{largest_face, Detector};
pub use embedder::{align, backend_label, EmbedError, Embedder};
pub use frame::{AlignedFace, BoundingBox, DetectedFace, Frame};
pub use run::{run, PipelineConfig, PipelineDeps, PipelineError};
pub use stability::StabilityTracker;
