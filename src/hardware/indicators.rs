//! indicators.rs
//! Operator panel: two status LEDs and two active-low buttons.
//!
//! - Monitor LED: lit while monitoring is enabled
//! - Presence LED: lit while the current detection result is non-empty
//! - Toggle button: flips monitoring (debounced by the caller)
//! - Shutdown button: ends the sensing loop
//!
//! Indicator writes are best-effort; a failed write is logged, never fatal.

use std::{thread, time::Duration};

use log::{info, warn};

use crate::hardware::gpio::{DigitalIo, Level};
use crate::utils::error::HardwareError;

pub const PIN_PRESENCE_LED: u8 = 17;
pub const PIN_MONITOR_LED: u8 = 27;
pub const PIN_TOGGLE_BUTTON: u8 = 23;
pub const PIN_SHUTDOWN_BUTTON: u8 = 24;

const SHUTDOWN_BLINKS: usize = 10;
const SHUTDOWN_BLINK_HALF_PERIOD: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy)]
pub struct PinMap {
    pub presence_led: u8,
    pub monitor_led: u8,
    pub toggle_button: u8,
    pub shutdown_button: u8,
}

impl Default for PinMap {
    fn default() -> Self {
        Self {
            presence_led: PIN_PRESENCE_LED,
            monitor_led: PIN_MONITOR_LED,
            toggle_button: PIN_TOGGLE_BUTTON,
            shutdown_button: PIN_SHUTDOWN_BUTTON,
        }
    }
}

pub struct IndicatorPanel<G: DigitalIo> {
    io: G,
    pins: PinMap,
    blink_half_period: Duration,
    read_errors: u64,
}

impl<G: DigitalIo> IndicatorPanel<G> {
    /// Configures all four pins and starts with both LEDs off.
    pub fn init(mut io: G, pins: PinMap) -> Result<Self, HardwareError> {
        io.setup_output(pins.presence_led)?;
        io.setup_output(pins.monitor_led)?;
        io.setup_input(pins.toggle_button)?;
        io.setup_input(pins.shutdown_button)?;
        io.write(pins.presence_led, Level::Low)?;
        io.write(pins.monitor_led, Level::Low)?;

        info!("[Gpio] indicator panel ready: {:?}", pins);
        Ok(Self {
            io,
            pins,
            blink_half_period: SHUTDOWN_BLINK_HALF_PERIOD,
            read_errors: 0,
        })
    }

    pub fn with_blink_half_period(mut self, d: Duration) -> Self {
        self.blink_half_period = d;
        self
    }

    pub fn set_monitoring(&mut self, enabled: bool) {
        self.write(self.pins.monitor_led, enabled.into());
    }

    pub fn set_presence(&mut self, present: bool) {
        self.write(self.pins.presence_led, present.into());
    }

    pub fn toggle_pressed(&mut self) -> bool {
        self.is_active(self.pins.toggle_button)
    }

    pub fn shutdown_pressed(&mut self) -> bool {
        self.is_active(self.pins.shutdown_button)
    }

    /// Blinks the monitor LED to signal the process is going down.
    pub fn shutdown_sequence(&mut self) {
        self.set_presence(false);
        for _ in 0..SHUTDOWN_BLINKS {
            self.set_monitoring(true);
            thread::sleep(self.blink_half_period);
            self.set_monitoring(false);
            thread::sleep(self.blink_half_period);
        }
    }

    /// Drives both LEDs low and hands the pins back.
    pub fn release(&mut self) {
        self.set_presence(false);
        self.set_monitoring(false);
        self.io.release();
        info!("[Gpio] pins released");
    }

    fn write(&mut self, pin: u8, level: Level) {
        if let Err(e) = self.io.write(pin, level) {
            warn!("[Gpio] write to pin {} failed: {}", pin, e);
        }
    }

    // Buttons are active-low. A failed read counts as not pressed.
    fn is_active(&mut self, pin: u8) -> bool {
        match self.io.read(pin) {
            Ok(level) => level == Level::Low,
            Err(e) => {
                if self.read_errors == 0 {
                    warn!("[Gpio] read from pin {} failed: {} (further errors suppressed)", pin, e);
                }
                self.read_errors += 1;
                false
            }
        }
    }
}
