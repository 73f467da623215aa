//! Stateful access-decision gates: grant lockout, rate limiting, the active
//! flag, and the time window. Grounded directly on the reference
//! `AccessController` (`access_control.py` in the original implementation):
//! same fixed check order, same reason strings where the base spec quotes
//! them literally ("expired", "HMAC", etc. — those are the protocol layer's
//! concern, not this crate's, but the window/active/lockout/rate-limit
//! wording here matches the source one-for-one).

use chrono::{DateTime, Utc};
use faceaccess_models::Employee;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct PolicyConfig {
    pub cooldown: Duration,
    pub max_attempts_per_minute: u32,
    pub granted_lockout: Duration,
}

impl From<&faceaccess_models::config::AccessConfig> for PolicyConfig {
    fn from(cfg: &faceaccess_models::config::AccessConfig) -> Self {
        PolicyConfig {
            cooldown: Duration::from_secs_f64(cfg.cooldown_sec.max(0.0)),
            max_attempts_per_minute: cfg.max_attempts_per_minute,
            granted_lockout: Duration::from_secs_f64(cfg.granted_lockout_sec.max(0.0)),
        }
    }
}

const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);

#[derive(Default)]
struct PolicyState {
    last_global_attempt: Option<DateTime<Utc>>,
    attempt_timestamps: HashMap<String, Vec<DateTime<Utc>>>,
    last_granted: HashMap<String, DateTime<Utc>>,
}

/// Outcome of [`PolicyEngine::process_access_attempt`].
#[derive(Debug, Clone)]
pub struct Decision {
    pub granted: bool,
    pub reason: String,
    pub metadata: Value,
}

pub struct PolicyEngine {
    config: PolicyConfig,
    state: Mutex<PolicyState>,
}

impl PolicyEngine {
    pub fn new(config: PolicyConfig) -> Self {
        PolicyEngine {
            config,
            state: Mutex::new(PolicyState::default()),
        }
    }

    /// iff `start <= now <= end`.
    pub fn check_time_window(&self, employee: &Employee, now: DateTime<Utc>) -> (bool, String) {
        if now < employee.access_start {
            return (
                false,
                format!("Access not yet valid (starts {})", employee.access_start),
            );
        }
        if now > employee.access_end {
            return (false, format!("Access expired (ended {})", employee.access_end));
        }
        (true, "Access period valid".to_string())
    }

    pub fn check_active(&self, employee: &Employee) -> (bool, String) {
        if !employee.is_active {
            (false, "Employee is deactivated".to_string())
        } else {
            (true, "Employee is active".to_string())
        }
    }

    /// Global cooldown gate, then (if `identifier` is given) the per-identity
    /// 60 second sliding window. On acceptance, records this attempt against
    /// both gates — a caller that bails out earlier (e.g. on a below-threshold
    /// score) must not call this, since it mutates state.
    pub fn check_rate_limit(&self, identifier: Option<&str>, now: DateTime<Utc>) -> (bool, String) {
        let mut state = self.state.lock().expect("policy state poisoned");

        if let Some(last) = state.last_global_attempt {
            let elapsed = (now - last).to_std().unwrap_or(Duration::ZERO);
            if elapsed < self.config.cooldown {
                return (false, "Cooldown active".to_string());
            }
        }

        if let Some(id) = identifier {
            let cutoff = now - chrono::Duration::from_std(RATE_LIMIT_WINDOW).unwrap();
            let entry = state.attempt_timestamps.entry(id.to_string()).or_default();
            entry.retain(|t| *t > cutoff);

            if entry.len() >= self.config.max_attempts_per_minute as usize {
                return (
                    false,
                    format!(
                        "Rate limit exceeded ({} attempts/min)",
                        self.config.max_attempts_per_minute
                    ),
                );
            }
            entry.push(now);
        }

        state.last_global_attempt = Some(now);
        (true, "Rate limit OK".to_string())
    }

    /// iff `now - last_granted[id] >= granted_lockout`.
    pub fn check_grant_lockout(&self, employee_id: &str, now: DateTime<Utc>) -> (bool, String) {
        let state = self.state.lock().expect("policy state poisoned");
        match state.last_granted.get(employee_id) {
            Some(last) => {
                let elapsed = (now - *last).to_std().unwrap_or(Duration::ZERO);
                if elapsed < self.config.granted_lockout {
                    let remaining = self.config.granted_lockout - elapsed;
                    (
                        false,
                        format!("Recently granted ({:.0}s remaining)", remaining.as_secs_f64()),
                    )
                } else {
                    (true, "No lockout".to_string())
                }
            }
            None => (true, "No lockout".to_string()),
        }
    }

    pub fn record_granted(&self, employee_id: &str, now: DateTime<Utc>) {
        let mut state = self.state.lock().expect("policy state poisoned");
        state
            .last_granted
            .insert(employee_id.to_string(), now);
    }

    /// Orchestrates grant-lockout → rate-limit → active → time-window, in
    /// that fixed order. A `None` employee or a below-threshold score is
    /// denied before any state mutation happens.
    pub fn process_access_attempt(
        &self,
        employee: Option<&Employee>,
        score: f32,
        threshold: f32,
        now: DateTime<Utc>,
    ) -> Decision {
        let mut metadata = json!({
            "similarity_score": score,
            "similarity_threshold": threshold,
        });

        let employee = match employee {
            Some(e) => e,
            None => {
                return Decision {
                    granted: false,
                    reason: "Face not recognized".to_string(),
                    metadata,
                }
            }
        };

        if score < threshold {
            return Decision {
                granted: false,
                reason: format!("Low similarity score ({score:.3})"),
                metadata,
            };
        }

        metadata["employee_id"] = json!(employee.employee_id);
        metadata["display_name"] = json!(employee.display_name);

        let (lockout_ok, reason) = self.check_grant_lockout(&employee.employee_id, now);
        if !lockout_ok {
            return Decision {
                granted: false,
                reason,
                metadata,
            };
        }

        let (rate_ok, reason) = self.check_rate_limit(Some(&employee.employee_id), now);
        if !rate_ok {
            return Decision {
                granted: false,
                reason: format!("Rate limit: {reason}"),
                metadata,
            };
        }

        let (active_ok, reason) = self.check_active(employee);
        if !active_ok {
            return Decision {
                granted: false,
                reason,
                metadata,
            };
        }

        let (window_ok, reason) = self.check_time_window(employee, now);
        if !window_ok {
            return Decision {
                granted: false,
                reason,
                metadata,
            };
        }

        self.record_granted(&employee.employee_id, now);
        Decision {
            granted: true,
            reason: "Access granted".to_string(),
            metadata,
        }
    }
}
