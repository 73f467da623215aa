use gpio_cdev::{Chip, LineHandle, LineRequestFlags};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GpioError {
    #[error("chip open failed: {0}")]
    ChipOpen(#[from] gpio_cdev::errors::Error),
    #[error("line request failed for line {line}: {source}")]
    LineRequest {
        line: u32,
        #[source]
        source: gpio_cdev::errors::Error,
    },
    #[error("line write failed: {0}")]
    Write(gpio_cdev::errors::Error),
    #[error("line read failed: {0}")]
    Read(gpio_cdev::errors::Error),
}

/// Hexagonal boundary between the Actuator's unlock/lock/button logic and
/// the physical or mocked GPIO lines. `gpio-cdev`'s `/dev/gpiochipN` ABI on
/// one side, a no-op recorder on the other.
pub trait GpioLines: Send + Sync {
    fn set_relay(&self, active: bool) -> Result<(), GpioError>;
    fn read_button(&self) -> Result<bool, GpioError>;
    fn close(&self);
}

pub struct CdevLines {
    relay: LineHandle,
    button: Option<LineHandle>,
    active_high: bool,
    button_active_low: bool,
    _chip: Chip,
}

impl CdevLines {
    pub fn open(
        chip_path: &str,
        relay_pin: u32,
        active_high: bool,
        button_pin: Option<u32>,
        button_active_low: bool,
    ) -> Result<Self, GpioError> {
        let mut chip = Chip::new(chip_path)?;

        let relay_line = chip.get_line(relay_pin).map_err(|source| GpioError::LineRequest {
            line: relay_pin,
            source,
        })?;
        let relay = relay_line
            .request(LineRequestFlags::OUTPUT, 0, "faceaccessd-relay")
            .map_err(|source| GpioError::LineRequest {
                line: relay_pin,
                source,
            })?;

        let button = match button_pin {
            Some(pin) => {
                let line = chip.get_line(pin).map_err(|source| GpioError::LineRequest { line: pin, source })?;
                let handle = line
                    .request(LineRequestFlags::INPUT, 0, "faceaccessd-button")
                    .map_err(|source| GpioError::LineRequest { line: pin, source })?;
                Some(handle)
            }
            None => None,
        };

        Ok(CdevLines {
            relay,
            button,
            active_high,
            button_active_low,
            _chip: chip,
        })
    }
}

impl GpioLines for CdevLines {
    fn set_relay(&self, active: bool) -> Result<(), GpioError> {
        let level = match (active, self.active_high) {
            (true, true) | (false, false) => 1,
            (true, false) | (false, true) => 0,
        };
        self.relay.set_value(level).map_err(GpioError::Write)
    }

    fn read_button(&self) -> Result<bool, GpioError> {
        match &self.button {
            Some(line) => {
                let raw = line.get_value().map_err(GpioError::Read)?;
                let pressed = if self.button_active_low { raw == 0 } else { raw == 1 };
                Ok(pressed)
            }
            None => Ok(false),
        }
    }

    fn close(&self) {
        // Dropping the line handles releases them; nothing else to do.
    }
}

/// Mock mode: logs intent, applies no hardware effect. Used when GPIO is
/// unavailable or disabled by configuration so the rest of the system stays
/// fully exercised in tests.
pub struct MockLines {
    relay_state: std::sync::atomic::AtomicBool,
    button_state: std::sync::atomic::AtomicBool,
}

impl MockLines {
    pub fn new() -> Self {
        MockLines {
            relay_state: std::sync::atomic::AtomicBool::new(false),
            button_state: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Test/mock-mode hook: simulate a button press or release.
    pub fn simulate_button(&self, pressed: bool) {
        self.button_state.store(pressed, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn relay_is_active(&self) -> bool {
        self.relay_state.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl Default for MockLines {
    fn default() -> Self {
        Self::new()
    }
}

impl GpioLines for MockLines {
    fn set_relay(&self, active: bool) -> Result<(), GpioError> {
        tracing::info!(active, "mock relay set");
        self.relay_state.store(active, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }

    fn read_button(&self) -> Result<bool, GpioError> {
        Ok(self.button_state.load(std::sync::atomic::Ordering::SeqCst))
    }

    fn close(&self) {
        tracing::info!("mock gpio closed");
    }
}
