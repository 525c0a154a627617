//! gpio.rs
//! Digital I/O primitives: read pin, write pin.
//!
//! - `SysfsGpio`: Linux `/sys/class/gpio` character interface (BCM numbering on a Pi)
//! - `SimulatedGpio`: shared in-memory pin table for bench-top runs and tests

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    thread,
    time::Duration,
};

use log::{debug, warn};
use parking_lot::Mutex;

use crate::utils::error::HardwareError;

pub const SYSFS_GPIO_ROOT: &str = "/sys/class/gpio";
const EXPORT_RETRIES: usize = 20;
const EXPORT_RETRY_DELAY: Duration = Duration::from_millis(25);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high { Level::High } else { Level::Low }
    }
}

pub trait DigitalIo: Send {
    fn setup_output(&mut self, pin: u8) -> Result<(), HardwareError>;
    fn setup_input(&mut self, pin: u8) -> Result<(), HardwareError>;
    fn read(&mut self, pin: u8) -> Result<Level, HardwareError>;
    fn write(&mut self, pin: u8, level: Level) -> Result<(), HardwareError>;
    /// Returns every configured pin to the system.
    fn release(&mut self);
}

pub struct SysfsGpio {
    root: PathBuf,
    exported: Vec<u8>,
}

impl SysfsGpio {
    pub fn new() -> Self {
        Self::with_root(SYSFS_GPIO_ROOT)
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            exported: Vec::new(),
        }
    }

    fn pin_dir(&self, pin: u8) -> PathBuf {
        self.root.join(format!("gpio{}", pin))
    }

    fn export(&mut self, pin: u8) -> Result<PathBuf, HardwareError> {
        let dir = self.pin_dir(pin);
        if !dir.exists() {
            fs::write(self.root.join("export"), pin.to_string())
                .map_err(|e| HardwareError::pin(pin, e))?;
        }

        // udev may take a moment to make the attribute files writable
        let direction = dir.join("direction");
        for _ in 0..EXPORT_RETRIES {
            if direction.exists() {
                break;
            }
            thread::sleep(EXPORT_RETRY_DELAY);
        }

        if !self.exported.contains(&pin) {
            self.exported.push(pin);
        }
        Ok(dir)
    }

    fn set_direction(&mut self, pin: u8, direction: &str) -> Result<(), HardwareError> {
        let dir = self.export(pin)?;
        fs::write(dir.join("direction"), direction).map_err(|e| HardwareError::pin(pin, e))?;
        debug!("[Gpio] pin {} configured as {}", pin, direction);
        Ok(())
    }

    fn value_path(&self, pin: u8) -> PathBuf {
        self.pin_dir(pin).join("value")
    }
}

impl Default for SysfsGpio {
    fn default() -> Self {
        Self::new()
    }
}

impl DigitalIo for SysfsGpio {
    fn setup_output(&mut self, pin: u8) -> Result<(), HardwareError> {
        self.set_direction(pin, "out")
    }

    fn setup_input(&mut self, pin: u8) -> Result<(), HardwareError> {
        self.set_direction(pin, "in")
    }

    fn read(&mut self, pin: u8) -> Result<Level, HardwareError> {
        let raw = fs::read_to_string(self.value_path(pin)).map_err(|e| HardwareError::pin(pin, e))?;
        match raw.trim() {
            "0" => Ok(Level::Low),
            "1" => Ok(Level::High),
            other => Err(HardwareError::BadValue {
                pin,
                value: other.to_string(),
            }),
        }
    }

    fn write(&mut self, pin: u8, level: Level) -> Result<(), HardwareError> {
        let value = match level {
            Level::Low => "0",
            Level::High => "1",
        };
        fs::write(self.value_path(pin), value).map_err(|e| HardwareError::pin(pin, e))
    }

    fn release(&mut self) {
        let unexport = self.root.join("unexport");
        for pin in self.exported.drain(..) {
            if let Err(e) = fs::write(&unexport, pin.to_string()) {
                warn!("[Gpio] failed to unexport pin {}: {}", pin, e);
            }
        }
    }
}

#[derive(Debug, Default)]
struct SimulatedPins {
    levels: HashMap<u8, Level>,
    writes: Vec<(u8, Level)>,
    released: bool,
}

/// In-memory pins. Clones share state, so one handle can drive inputs while
/// another is owned by the indicator panel. Unset inputs read High (pull-up).
#[derive(Clone, Default)]
pub struct SimulatedGpio {
    pins: Arc<Mutex<SimulatedPins>>,
}

impl SimulatedGpio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_level(&self, pin: u8, level: Level) {
        self.pins.lock().levels.insert(pin, level);
    }

    pub fn level(&self, pin: u8) -> Option<Level> {
        self.pins.lock().levels.get(&pin).copied()
    }

    /// Every write so far, oldest first.
    pub fn writes(&self) -> Vec<(u8, Level)> {
        self.pins.lock().writes.clone()
    }

    pub fn is_released(&self) -> bool {
        self.pins.lock().released
    }
}

impl DigitalIo for SimulatedGpio {
    fn setup_output(&mut self, _pin: u8) -> Result<(), HardwareError> {
        Ok(())
    }

    fn setup_input(&mut self, _pin: u8) -> Result<(), HardwareError> {
        Ok(())
    }

    fn read(&mut self, pin: u8) -> Result<Level, HardwareError> {
        Ok(self.level(pin).unwrap_or(Level::High))
    }

    fn write(&mut self, pin: u8, level: Level) -> Result<(), HardwareError> {
        let mut pins = self.pins.lock();
        pins.levels.insert(pin, level);
        pins.writes.push((pin, level));
        Ok(())
    }

    fn release(&mut self) {
        self.pins.lock().released = true;
    }
}

/// True when `root` looks like a sysfs GPIO class directory.
pub fn sysfs_available(root: &Path) -> bool {
    root.join("export").exists()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_sysfs(pins: &[u8]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("export"), "").unwrap();
        fs::write(dir.path().join("unexport"), "").unwrap();
        for pin in pins {
            let p = dir.path().join(format!("gpio{}", pin));
            fs::create_dir(&p).unwrap();
            fs::write(p.join("direction"), "in").unwrap();
            fs::write(p.join("value"), "1\n").unwrap();
        }
        dir
    }

    #[test]
    fn sysfs_write_then_read() {
        let root = fake_sysfs(&[17]);
        let mut gpio = SysfsGpio::with_root(root.path());
        assert!(sysfs_available(root.path()));

        gpio.setup_output(17).unwrap();
        assert_eq!(fs::read_to_string(root.path().join("gpio17/direction")).unwrap(), "out");

        gpio.write(17, Level::Low).unwrap();
        assert_eq!(gpio.read(17).unwrap(), Level::Low);
        gpio.write(17, Level::High).unwrap();
        assert_eq!(gpio.read(17).unwrap(), Level::High);
    }

    #[test]
    fn sysfs_rejects_garbage_value() {
        let root = fake_sysfs(&[23]);
        fs::write(root.path().join("gpio23/value"), "x").unwrap();
        let mut gpio = SysfsGpio::with_root(root.path());
        assert!(matches!(gpio.read(23), Err(HardwareError::BadValue { pin: 23, .. })));
    }

    #[test]
    fn sysfs_release_unexports_configured_pins() {
        let root = fake_sysfs(&[24]);
        let mut gpio = SysfsGpio::with_root(root.path());
        gpio.setup_input(24).unwrap();
        gpio.release();
        assert_eq!(fs::read_to_string(root.path().join("unexport")).unwrap(), "24");
    }

    #[test]
    fn simulated_inputs_default_high_and_share_state() {
        let gpio = SimulatedGpio::new();
        let mut owned = gpio.clone();
        assert_eq!(owned.read(23).unwrap(), Level::High);

        gpio.set_level(23, Level::Low);
        assert_eq!(owned.read(23).unwrap(), Level::Low);

        owned.write(17, Level::High).unwrap();
        assert_eq!(gpio.level(17), Some(Level::High));
        assert_eq!(gpio.writes(), vec![(17, Level::High)]);
    }
}
