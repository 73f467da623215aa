use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("no upsert session in progress")]
    NoSession,
    #[error("a hash mismatch reset the current photo; please resend it")]
    HashMismatch,
    #[error("photo exceeds the maximum allowed size")]
    PhotoTooLarge,
    #[error("Expected {expected} photos, got {received}")]
    IncompletePhotoCount { expected: u32, received: u32 },
}

/// Scoped to a single transport connection. Connection start/end events set
/// the owning `Protocol`'s session field to `None`, not this struct.
pub struct UpsertSession {
    pub employee_id: String,
    pub display_name: Option<String>,
    pub access_start: DateTime<Utc>,
    pub access_end: DateTime<Utc>,
    pub num_photos: u32,
    pub received: u32,
    pub photos: Vec<Vec<u8>>,
    accumulator: Vec<u8>,
    max_photo_size: usize,
}

impl UpsertSession {
    pub fn new(
        employee_id: String,
        display_name: Option<String>,
        access_start: DateTime<Utc>,
        access_end: DateTime<Utc>,
        num_photos: u32,
        max_photo_size: usize,
    ) -> Self {
        UpsertSession {
            employee_id,
            display_name,
            access_start,
            access_end,
            num_photos,
            received: 0,
            photos: Vec::new(),
            accumulator: Vec::new(),
            max_photo_size,
        }
    }

    /// Appends one chunk. Returns `Ok(true)` when this chunk completed a
    /// photo (`is_last`), `Ok(false)` for an intermediate chunk (no
    /// response is emitted for those at the protocol layer).
    pub fn append_chunk(
        &mut self,
        data: &[u8],
        is_last: bool,
        expected_sha256: Option<&str>,
    ) -> Result<bool, SessionError> {
        self.accumulator.extend_from_slice(data);

        if self.accumulator.len() > self.max_photo_size {
            self.accumulator.clear();
            return Err(SessionError::PhotoTooLarge);
        }

        if !is_last {
            return Ok(false);
        }

        if let Some(expected) = expected_sha256 {
            let mut hasher = Sha256::new();
            hasher.update(&self.accumulator);
            let actual = hex::encode(hasher.finalize());
            if !actual.eq_ignore_ascii_case(expected) {
                self.accumulator.clear();
                return Err(SessionError::HashMismatch);
            }
        }

        self.photos.push(std::mem::take(&mut self.accumulator));
        self.received += 1;
        Ok(true)
    }

    pub fn finish(&self) -> Result<(), SessionError> {
        if self.received != self.num_photos {
            return Err(SessionError::IncompletePhotoCount {
                expected: self.num_photos,
                received: self.received,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sha256_hex(data: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(data);
        hex::encode(hasher.finalize())
    }

    fn window() -> (DateTime<Utc>, DateTime<Utc>) {
        (Utc::now(), Utc::now() + chrono::Duration::days(365))
    }

    #[test]
    fn single_chunk_photo_with_correct_hash_completes() {
        let (start, end) = window();
        let mut session = UpsertSession::new("E1".into(), None, start, end, 1, 1 << 20);
        let data = b"fake jpeg bytes";
        let hash = sha256_hex(data);
        let completed = session.append_chunk(data, true, Some(&hash)).unwrap();
        assert!(completed);
        assert_eq!(session.received, 1);
        assert_eq!(session.photos.len(), 1);
    }

    #[test]
    fn hash_mismatch_resets_accumulator_but_keeps_session() {
        let (start, end) = window();
        let mut session = UpsertSession::new("E1".into(), None, start, end, 1, 1 << 20);
        let err = session
            .append_chunk(b"fake jpeg bytes", true, Some("deadbeef"))
            .unwrap_err();
        assert_eq!(err, SessionError::HashMismatch);
        assert_eq!(session.received, 0);
        assert!(session.photos.is_empty());

        // retry succeeds
        let data = b"fake jpeg bytes";
        let hash = sha256_hex(data);
        assert!(session.append_chunk(data, true, Some(&hash)).unwrap());
    }

    #[test]
    fn finish_before_all_photos_received_reports_counts() {
        let (start, end) = window();
        let session = UpsertSession::new("E1".into(), None, start, end, 2, 1 << 20);
        let err = session.finish().unwrap_err();
        assert_eq!(
            err,
            SessionError::IncompletePhotoCount {
                expected: 2,
                received: 0
            }
        );
    }

    #[test]
    fn oversized_accumulator_is_rejected_and_cleared() {
        let (start, end) = window();
        let mut session = UpsertSession::new("E1".into(), None, start, end, 1, 8);
        let err = session.append_chunk(&[0u8; 16], true, None).unwrap_err();
        assert_eq!(err, SessionError::PhotoTooLarge);
    }
}
