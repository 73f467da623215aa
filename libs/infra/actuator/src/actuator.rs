use crate::lines::GpioLines;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

pub type ButtonCallback = Arc<dyn Fn() + Send + Sync>;

/// Relay driver with exactly-one-in-flight unlock semantics, plus an
/// independent debounced exit-button input thread. Owns one GPIO output
/// line (the relay) and optionally one input line (the button); both live
/// behind the same `GpioLines` implementation so mock mode is a drop-in
/// substitute.
pub struct Actuator {
    lines: Arc<dyn GpioLines>,
    unlocking: Arc<AtomicBool>,
    default_unlock_duration: Duration,
    button_debounce: Duration,
    monitor: Mutex<Option<ButtonMonitor>>,
}

struct ButtonMonitor {
    running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl Actuator {
    pub fn new(lines: Arc<dyn GpioLines>, default_unlock_duration: Duration, button_debounce: Duration) -> Self {
        Actuator {
            lines,
            unlocking: Arc::new(AtomicBool::new(false)),
            default_unlock_duration,
            button_debounce,
            monitor: Mutex::new(None),
        }
    }

    /// Non-blocking. If an unlock is already in flight, this call is
    /// silently dropped rather than queued or blocked on — the essential
    /// "fire and forget, at most one" contract.
    pub fn unlock(&self, duration: Option<Duration>) {
        if self
            .unlocking
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("unlock requested while already in progress; dropped");
            return;
        }

        let lines = Arc::clone(&self.lines);
        let unlocking = Arc::clone(&self.unlocking);
        let hold = duration.unwrap_or(self.default_unlock_duration);

        std::thread::spawn(move || {
            if let Err(err) = lines.set_relay(true) {
                tracing::error!(error = %err, "failed to energize relay");
                unlocking.store(false, Ordering::SeqCst);
                return;
            }
            tracing::info!(hold_secs = hold.as_secs_f64(), "door unlocked");
            std::thread::sleep(hold);
            if let Err(err) = lines.set_relay(false) {
                tracing::error!(error = %err, "failed to de-energize relay");
            }
            unlocking.store(false, Ordering::SeqCst);
        });
    }

    /// Synchronous, immediate.
    pub fn lock(&self) {
        if let Err(err) = self.lines.set_relay(false) {
            tracing::error!(error = %err, "failed to force relay inactive");
        }
    }

    /// Spawns a ~100 Hz polling thread with software debounce. `callback`
    /// defaults to `unlock` when omitted.
    pub fn start_button_monitor(self: &Arc<Self>, callback: Option<ButtonCallback>) {
        let mut guard = self.monitor.lock().expect("button monitor mutex poisoned");
        if guard.is_some() {
            tracing::warn!("button monitor already running");
            return;
        }

        let lines = Arc::clone(&self.lines);
        let debounce = self.button_debounce;
        let running = Arc::new(AtomicBool::new(true));
        let running_flag = Arc::clone(&running);
        let actuator = Arc::clone(self);
        let callback = callback.unwrap_or_else(|| {
            let actuator = Arc::clone(&actuator);
            Arc::new(move || actuator.unlock(None))
        });

        let handle = std::thread::spawn(move || {
            let poll_interval = Duration::from_millis(10);
            let mut stable_state = false;
            let mut candidate_state = false;
            let mut candidate_since = std::time::Instant::now();

            while running_flag.load(Ordering::SeqCst) {
                match lines.read_button() {
                    Ok(raw) => {
                        if raw != candidate_state {
                            candidate_state = raw;
                            candidate_since = std::time::Instant::now();
                        } else if candidate_state != stable_state
                            && candidate_since.elapsed() >= debounce
                        {
                            let rising_edge = candidate_state && !stable_state;
                            stable_state = candidate_state;
                            if rising_edge {
                                callback();
                            }
                        }
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "button read failed");
                    }
                }
                std::thread::sleep(poll_interval);
            }
        });

        *guard = Some(ButtonMonitor { running, handle });
    }

    /// Stops the monitor, forces the relay inactive, releases the lines.
    /// Safe to call twice.
    pub fn cleanup(&self) {
        if let Some(monitor) = self.monitor.lock().expect("button monitor mutex poisoned").take() {
            monitor.running.store(false, Ordering::SeqCst);
            let _ = monitor.handle.join();
        }
        self.lock();
        self.lines.close();
    }
}

impl Drop for Actuator {
    fn drop(&mut self) {
        self.cleanup();
    }
}
