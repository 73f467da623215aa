//! Notification-egress fragmentation: given a JSON payload and a budget,
//! produce wire frames carrying a 1-byte continuation flag. A tiny,
//! stateless adapter — pacing between fragments is the transport's job,
//! not this crate's.

pub const CONTINUATION: u8 = 0x01;
pub const FINAL: u8 = 0x00;

pub const DEFAULT_FRAGMENT_BUDGET: usize = 180;

/// Splits `payload` into fragments that each total `budget` wire bytes
/// (1-byte flag + up to `budget - 1` payload bytes), so `budget` matches its
/// use elsewhere as the real transport notification-size ceiling. A payload
/// that already fits within one fragment still gets the envelope — callers
/// that want the "small response, no envelope" shortcut from the base spec
/// should check `payload.len() <= budget` themselves before calling this.
pub fn fragment(payload: &[u8], budget: usize) -> Vec<Vec<u8>> {
    assert!(budget > 1, "fragment budget must leave room for the flag byte");

    if payload.is_empty() {
        return vec![vec![FINAL]];
    }

    let chunk_size = budget - 1;
    let mut frames = Vec::new();
    let mut offset = 0;
    while offset < payload.len() {
        let end = (offset + chunk_size).min(payload.len());
        let is_last = end == payload.len();
        let mut frame = Vec::with_capacity(1 + (end - offset));
        frame.push(if is_last { FINAL } else { CONTINUATION });
        frame.extend_from_slice(&payload[offset..end]);
        frames.push(frame);
        offset = end;
    }
    frames
}

/// Inverse of `fragment`: concatenates fragment payloads until the final
/// flag is observed. Returns `None` if the sequence never terminates.
pub fn reassemble<'a>(frames: impl IntoIterator<Item = &'a [u8]>) -> Option<Vec<u8>> {
    let mut out = Vec::new();
    let mut saw_final = false;
    for frame in frames {
        let (flag, body) = frame.split_first()?;
        out.extend_from_slice(body);
        if *flag == FINAL {
            saw_final = true;
            break;
        }
    }
    saw_final.then_some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_payload_is_a_single_final_fragment() {
        let frames = fragment(b"hello", 180);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0][0], FINAL);
    }

    #[test]
    fn large_payload_splits_into_ceil_division_fragments_p10() {
        let payload = vec![7u8; 1000];
        let budget = 180;
        let frames = fragment(&payload, budget);
        let chunk_size = budget - 1;
        let expected = (payload.len() + chunk_size - 1) / chunk_size;
        assert_eq!(frames.len(), expected);
        for frame in &frames[..frames.len() - 1] {
            assert_eq!(frame[0], CONTINUATION);
            assert_eq!(frame.len(), budget);
        }
        assert_eq!(frames.last().unwrap()[0], FINAL);
    }

    #[test]
    fn reassembly_round_trips_p10() {
        let payload: Vec<u8> = (0..=255u16).flat_map(|n| (n as u8).to_be_bytes()).collect();
        let frames = fragment(&payload, 37);
        let refs: Vec<&[u8]> = frames.iter().map(|f| f.as_slice()).collect();
        let reassembled = reassemble(refs).unwrap();
        assert_eq!(reassembled, payload);
    }

    #[test]
    fn truncated_fragment_stream_fails_to_reassemble() {
        let payload = vec![1u8; 500];
        let frames = fragment(&payload, 100);
        let refs: Vec<&[u8]> = frames[..frames.len() - 1].iter().map(|f| f.as_slice()).collect();
        assert!(reassemble(refs).is_none());
    }
}
