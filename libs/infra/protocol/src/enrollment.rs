//! The enrollment processor (section 4.5.1): turns the raw photo bytes
//! collected by an `UpsertSession` into enrolled embeddings, applying the
//! same quality gates a human reviewer would — one face, large enough,
//! in focus, centered, roughly portrait-shaped.

use faceaccess_pipeline::{align, largest_face, BoundingBox, Detector, Embedder, Frame};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnrollmentError {
    #[error("failed to decode photo: {0}")]
    Decode(String),
    #[error("expected exactly one face, found {0}")]
    FaceCount(usize),
    #[error("face is smaller than the minimum enrollment size")]
    FaceTooSmall,
    #[error("face is too close to the frame edge")]
    FaceTouchesEdge,
    #[error("face aspect ratio out of range")]
    AspectRatioOutOfRange,
    #[error("image is too blurry")]
    TooBlurry,
    #[error("embedding computation failed: {0}")]
    Embed(String),
    #[error("no valid embeddings")]
    NoValidEmbeddings,
}

#[derive(Debug, Clone, Copy)]
pub struct QualityConfig {
    pub min_face_size: u32,
    pub blur_threshold: f32,
    pub align_size: u32,
}

/// Decodes one photo, validates it, and returns its embedding. A photo that
/// fails any quality gate is simply excluded by the caller (`process_photos`
/// aggregates across photos and only fails the whole session if none pass).
fn process_one_photo(
    bytes: &[u8],
    detector: &dyn Detector,
    embedder: &dyn Embedder,
    quality: &QualityConfig,
) -> Result<Vec<f32>, EnrollmentError> {
    let decoded = image::load_from_memory(bytes).map_err(|e| EnrollmentError::Decode(e.to_string()))?;
    let rgb = decoded.to_rgb8();
    let (width, height) = (rgb.width(), rgb.height());
    let frame = Frame::new(width, height, rgb.into_raw());

    let faces = detector.detect(&frame);
    if faces.len() != 1 {
        return Err(EnrollmentError::FaceCount(faces.len()));
    }
    let face = largest_face(&faces).expect("exactly one face checked above");
    let bbox = face.bbox;

    let shorter_side = bbox.width.min(bbox.height);
    if shorter_side < quality.min_face_size {
        return Err(EnrollmentError::FaceTooSmall);
    }

    if bbox.x <= 0
        || bbox.y <= 0
        || bbox.x as u32 + bbox.width >= width
        || bbox.y as u32 + bbox.height >= height
    {
        return Err(EnrollmentError::FaceTouchesEdge);
    }

    let aspect_ratio = bbox.width as f32 / bbox.height as f32;
    if !(0.7..=1.3).contains(&aspect_ratio) {
        return Err(EnrollmentError::AspectRatioOutOfRange);
    }

    if laplacian_variance(&frame, &bbox) < quality.blur_threshold {
        return Err(EnrollmentError::TooBlurry);
    }

    let aligned = align(&frame, &bbox, quality.align_size);
    embedder
        .embed(&aligned)
        .map_err(|e| EnrollmentError::Embed(e.to_string()))
}

/// Variance of the discrete Laplacian over the cropped face region,
/// converted to grayscale first — a standard cheap focus metric: sharp
/// edges produce high-variance second derivatives, blur flattens them.
fn laplacian_variance(frame: &Frame, bbox: &BoundingBox) -> f32 {
    let luma = |x: u32, y: u32| -> f32 {
        let idx = ((y * frame.width + x) * 3) as usize;
        if idx + 2 >= frame.data.len() {
            return 0.0;
        }
        let (r, g, b) = (
            frame.data[idx] as f32,
            frame.data[idx + 1] as f32,
            frame.data[idx + 2] as f32,
        );
        0.299 * r + 0.587 * g + 0.114 * b
    };

    let x0 = bbox.x.max(1) as u32;
    let y0 = bbox.y.max(1) as u32;
    let x1 = ((bbox.x as u32 + bbox.width).min(frame.width.saturating_sub(1))).max(x0 + 1);
    let y1 = ((bbox.y as u32 + bbox.height).min(frame.height.saturating_sub(1))).max(y0 + 1);

    let mut values = Vec::new();
    for y in y0..y1 {
        for x in x0..x1 {
            let center = luma(x, y);
            let laplacian = 4.0 * center
                - luma(x - 1, y)
                - luma(x + 1, y)
                - luma(x, y - 1)
                - luma(x, y + 1);
            values.push(laplacian);
        }
    }

    if values.is_empty() {
        return 0.0;
    }
    let mean: f32 = values.iter().sum::<f32>() / values.len() as f32;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / values.len() as f32
}

/// Processes every photo in an upsert session. Returns the embeddings for
/// whichever photos passed all quality gates; fails only if none did.
pub fn process_photos(
    photos: &[Vec<u8>],
    detector: &dyn Detector,
    embedder: &dyn Embedder,
    quality: &QualityConfig,
) -> Result<Vec<Vec<f32>>, EnrollmentError> {
    let mut embeddings = Vec::new();
    for (index, photo) in photos.iter().enumerate() {
        match process_one_photo(photo, detector, embedder, quality) {
            Ok(vector) => embeddings.push(vector),
            Err(err) => tracing::warn!(photo_index = index, error = %err, "photo rejected during enrollment"),
        }
    }

    if embeddings.is_empty() {
        return Err(EnrollmentError::NoValidEmbeddings);
    }
    Ok(embeddings)
}
