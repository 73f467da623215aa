use crate::frame::BoundingBox;

/// Suppresses wasted embedding work on transient detections by requiring the
/// chosen bounding box to sit still, within `position_tolerance` pixels on
/// both axes, for `required_count` consecutive frames.
pub struct StabilityTracker {
    previous: Option<BoundingBox>,
    stable_count: u32,
    position_tolerance: i32,
    required_count: u32,
}

impl StabilityTracker {
    pub fn new(position_tolerance: i32, required_count: u32) -> Self {
        StabilityTracker {
            previous: None,
            stable_count: 0,
            position_tolerance,
            required_count: required_count.max(1),
        }
    }

    /// Feeds one detection. Returns `true` once `required_count` consecutive
    /// frames have kept the box within tolerance.
    pub fn observe(&mut self, bbox: BoundingBox) -> bool {
        let stayed_put = match self.previous {
            Some(prev) => {
                (bbox.x - prev.x).abs() < self.position_tolerance
                    && (bbox.y - prev.y).abs() < self.position_tolerance
            }
            None => false,
        };

        self.stable_count = if stayed_put { self.stable_count + 1 } else { 1 };
        self.previous = Some(bbox);
        self.stable_count >= self.required_count
    }

    /// Called when no face was detected this frame, or after a decision has
    /// been rendered — re-arms the gate for the next approach.
    pub fn reset(&mut self) {
        self.previous = None;
        self.stable_count = 0;
    }
}
