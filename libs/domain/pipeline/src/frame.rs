use chrono::{DateTime, Utc};

/// One captured frame: packed interleaved RGB8 pixels at `width x height`.
/// Decoding/colour-space details belong to the camera adapter; this struct is
/// the boundary the pipeline actually operates on.
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    pub captured_at: DateTime<Utc>,
}

impl Frame {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        Frame {
            width,
            height,
            data,
            captured_at: Utc::now(),
        }
    }
}

/// Axis-aligned bounding box of one detected face, in frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

#[derive(Debug, Clone)]
pub struct DetectedFace {
    pub bbox: BoundingBox,
    pub confidence: f32,
}

/// A face crop already resampled to the embedder's expected input size.
#[derive(Debug, Clone)]
pub struct AlignedFace {
    pub size: u32,
    pub data: Vec<u8>,
}
