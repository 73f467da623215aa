//! HMAC canonicalization, verification and nonce replay protection for
//! admin commands. The signed form is the JSON object with `hmac` removed,
//! keys sorted lexicographically, no insignificant whitespace — produced by
//! rebuilding the object as a `BTreeMap` and serializing that.

use chrono::Utc;
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

const NONCE_TOLERANCE_SECS: i64 = 300;
/// How long an accepted nonce is remembered before it can be forgotten —
/// comfortably past the timestamp tolerance window on both sides.
const NONCE_RETENTION_SECS: i64 = NONCE_TOLERANCE_SECS * 2;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HmacError {
    #[error("command missing 'hmac' field")]
    MissingSignature,
    #[error("command missing 'nonce' field")]
    MissingNonce,
    #[error("malformed nonce")]
    MalformedNonce,
    #[error("nonce timestamp is outside the acceptable window")]
    NonceOutOfWindow,
    #[error("nonce has already been used (HMAC replay)")]
    NonceReused,
    #[error("HMAC signature mismatch")]
    SignatureMismatch,
    #[error("admin mode disabled and no shared secret configured")]
    NoSecretConfigured,
}

/// Canonicalizes `value` (an object) for signing: drops `hmac`, rebuilds as
/// a `BTreeMap` so keys sort lexicographically, and serializes compactly.
pub fn canonicalize(value: &Value) -> Result<String, HmacError> {
    let object = value.as_object().ok_or(HmacError::MissingSignature)?;
    let mut sorted: BTreeMap<String, Value> = BTreeMap::new();
    for (k, v) in object {
        if k == "hmac" {
            continue;
        }
        sorted.insert(k.clone(), v.clone());
    }
    serde_json::to_string(&sorted).map_err(|_| HmacError::MissingSignature)
}

fn sign(secret: &[u8], canonical: &str) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(canonical.as_bytes());
    mac.finalize().into_bytes().to_vec()
}

/// Remembers accepted nonces along with the Unix timestamp each one
/// embeds, so expired entries can be swept instead of growing unbounded.
#[derive(Default)]
pub struct NonceLedger {
    seen: HashMap<String, i64>,
}

impl NonceLedger {
    pub fn new() -> Self {
        NonceLedger::default()
    }

    fn parse_nonce(nonce: &str) -> Result<i64, HmacError> {
        let (ts, _rand) = nonce.split_once('_').ok_or(HmacError::MalformedNonce)?;
        ts.parse::<i64>().map_err(|_| HmacError::MalformedNonce)
    }

    pub fn sweep(&mut self, now: i64) {
        self.seen
            .retain(|_, ts| (now - *ts).abs() <= NONCE_RETENTION_SECS);
    }

    /// Validates window + replay, then records the nonce. Does not check
    /// the signature — that's `verify_command`'s job.
    fn accept(&mut self, nonce: &str, now: i64) -> Result<(), HmacError> {
        let ts = Self::parse_nonce(nonce)?;
        if (now - ts).abs() > NONCE_TOLERANCE_SECS {
            return Err(HmacError::NonceOutOfWindow);
        }
        if self.seen.contains_key(nonce) {
            return Err(HmacError::NonceReused);
        }
        self.seen.insert(nonce.to_string(), ts);
        Ok(())
    }
}

/// Full admin-command validation: nonce window/replay, then constant-time
/// signature comparison. `secret` is `None` when HMAC is disabled by
/// configuration and no shared secret was set — always a hard failure for
/// a command that requires HMAC.
pub fn verify_command(
    command: &Value,
    secret: Option<&[u8]>,
    ledger: &mut NonceLedger,
    now_unix: i64,
) -> Result<(), HmacError> {
    let secret = secret.ok_or(HmacError::NoSecretConfigured)?;

    let nonce = command
        .get("nonce")
        .and_then(Value::as_str)
        .ok_or(HmacError::MissingNonce)?;
    let signature_hex = command
        .get("hmac")
        .and_then(Value::as_str)
        .ok_or(HmacError::MissingSignature)?;

    ledger.accept(nonce, now_unix)?;

    let canonical = canonicalize(command)?;
    let provided = hex::decode(signature_hex).map_err(|_| HmacError::SignatureMismatch)?;

    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(canonical.as_bytes());
    mac.verify_slice(&provided)
        .map_err(|_| HmacError::SignatureMismatch)?;

    Ok(())
}

pub fn current_unix_timestamp() -> i64 {
    Utc::now().timestamp()
}

pub fn sign_command_for_test(secret: &[u8], command: &Value) -> String {
    let canonical = canonicalize(command).expect("object");
    hex::encode(sign(secret, &canonical))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonicalization_sorts_keys_and_drops_hmac() {
        let value = json!({"b": 1, "a": 2, "hmac": "deadbeef"});
        let canonical = canonicalize(&value).unwrap();
        assert_eq!(canonical, r#"{"a":2,"b":1}"#);
    }

    #[test]
    fn valid_signature_is_accepted_exactly_once() {
        let secret = b"topsecret";
        let mut command = json!({
            "command": "DEACTIVATE",
            "employee_id": "EMP001",
            "nonce": "1735689600_abcd",
        });
        let sig = sign_command_for_test(secret, &command);
        command["hmac"] = json!(sig);

        let mut ledger = NonceLedger::new();
        assert!(verify_command(&command, Some(secret), &mut ledger, 1735689600).is_ok());

        // replay
        let err = verify_command(&command, Some(secret), &mut ledger, 1735689601).unwrap_err();
        assert_eq!(err, HmacError::NonceReused);
    }

    #[test]
    fn single_character_tamper_fails_verification() {
        let secret = b"topsecret";
        let mut command = json!({
            "command": "DEACTIVATE",
            "employee_id": "EMP001",
            "nonce": "1735689600_abcd",
        });
        let sig = sign_command_for_test(secret, &command);
        command["hmac"] = json!(sig);
        command["employee_id"] = json!("EMP002"); // tamper

        let mut ledger = NonceLedger::new();
        let err = verify_command(&command, Some(secret), &mut ledger, 1735689600).unwrap_err();
        assert_eq!(err, HmacError::SignatureMismatch);
    }

    #[test]
    fn nonce_outside_window_is_rejected() {
        let secret = b"topsecret";
        let mut command = json!({
            "command": "DEACTIVATE",
            "employee_id": "EMP001",
            "nonce": "1735689600_abcd",
        });
        let sig = sign_command_for_test(secret, &command);
        command["hmac"] = json!(sig);

        let mut ledger = NonceLedger::new();
        let err = verify_command(&command, Some(secret), &mut ledger, 1735689600 + 301).unwrap_err();
        assert_eq!(err, HmacError::NonceOutOfWindow);
    }

    #[test]
    fn missing_secret_on_admin_command_fails_closed() {
        let command = json!({"command": "DEACTIVATE", "employee_id": "EMP001", "nonce": "1_a", "hmac": "00"});
        let mut ledger = NonceLedger::new();
        let err = verify_command(&command, None, &mut ledger, 1).unwrap_err();
        assert_eq!(err, HmacError::NoSecretConfigured);
    }
}
