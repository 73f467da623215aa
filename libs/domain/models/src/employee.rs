use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered identity and its time-bound door authorization.
///
/// Lifecycle is owned entirely by the store: created or replaced by an
/// upsert, mutated in place by period/active updates, removed (cascading to
/// its embeddings) by delete. There is no implicit expiry — an employee past
/// `access_end` still exists, it simply never passes the policy's
/// time-window check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employee {
    pub employee_id: String,
    pub display_name: Option<String>,
    pub access_start: DateTime<Utc>,
    pub access_end: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Employee {
    /// `access_end` must be strictly after `access_start` on any write; the
    /// store rejects the write outright rather than storing and flagging it.
    pub fn validate_window(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), String> {
        if end <= start {
            return Err(format!(
                "access_end ({end}) must be strictly after access_start ({start})"
            ));
        }
        Ok(())
    }

    /// iff active AND `now` falls within `[access_start, access_end]`.
    pub fn within_window(&self, now: DateTime<Utc>) -> bool {
        now >= self.access_start && now <= self.access_end
    }
}

/// A single enrolled face vector, L2-normalized so that cosine similarity
/// reduces to a dot product. `vector` is stored on disk as raw little-endian
/// `f32` bytes of length `4 * D`; `employee::l2_norm` is the tolerance check
/// applied before a vector is accepted by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub id: i64,
    pub employee_id: String,
    pub vector: Vec<f32>,
    pub photo_hash: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Tolerance within which a vector's L2 norm must sit relative to 1.0 for
/// the store to accept it as normalized.
pub const NORM_TOLERANCE: f32 = 1e-5;

pub fn l2_norm(vector: &[f32]) -> f32 {
    vector.iter().map(|x| x * x).sum::<f32>().sqrt()
}

pub fn is_normalized(vector: &[f32]) -> bool {
    (l2_norm(vector) - 1.0).abs() <= NORM_TOLERANCE
}

/// Serializes a vector of `f32` to raw little-endian bytes for the
/// `embeddings.embedding` blob column.
pub fn vector_to_bytes(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for value in vector {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Inverse of [`vector_to_bytes`]. Any trailing bytes that don't form a full
/// `f32` are dropped rather than panicking — a corrupt or truncated blob
/// should degrade to a shorter vector, not crash the caller.
pub fn bytes_to_vector(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}
