//! Push buttons, spacing switch and wake line on Raspberry Pi GPIO.
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use rppal::gpio::{Gpio, InputPin};
use spine_traits::{Button, ButtonInputs, HwError as TraitError, PowerManager, SpacingSwitch};

use crate::error::{HwError, Result};

fn input_pullup(gpio: &Gpio, pin: u8) -> Result<InputPin> {
    Ok(gpio
        .get(pin)
        .map_err(|e| HwError::Gpio(format!("pin {pin}: {e}")))?
        .into_input_pullup())
}

struct Lines {
    pins: [InputPin; 3],
    active_low: bool,
}

impl Lines {
    fn active(&self, i: usize) -> bool {
        self.pins[i].is_high() != self.active_low
    }
}

/// The three buttons, pulled up and by default switching to ground.
#[derive(Clone)]
pub struct GpioButtons {
    lines: Rc<RefCell<Lines>>,
}

impl GpioButtons {
    pub fn new(gpio: &Gpio, confirm: u8, a: u8, b: u8, active_low: bool) -> Result<Self> {
        let pins = [
            input_pullup(gpio, confirm)?,
            input_pullup(gpio, a)?,
            input_pullup(gpio, b)?,
        ];
        Ok(Self {
            lines: Rc::new(RefCell::new(Lines { pins, active_low })),
        })
    }

    /// Power manager that wakes on any of these buttons.
    pub fn wake_power(&self) -> GpioWakePower {
        GpioWakePower {
            lines: Rc::clone(&self.lines),
            poll: Duration::from_millis(20),
        }
    }
}

fn index(button: Button) -> usize {
    match button {
        Button::Confirm => 0,
        Button::FunctionA => 1,
        Button::FunctionB => 2,
    }
}

impl ButtonInputs for GpioButtons {
    fn is_pressed(&mut self, button: Button) -> bool {
        self.lines.borrow().active(index(button))
    }
}

pub struct GpioSwitch {
    pin: InputPin,
    active_low: bool,
}

impl GpioSwitch {
    pub fn new(gpio: &Gpio, pin: u8, active_low: bool) -> Result<Self> {
        Ok(Self {
            pin: input_pullup(gpio, pin)?,
            active_low,
        })
    }
}

impl SpacingSwitch for GpioSwitch {
    /// Closed switch selects the long spacing.
    fn is_long_spacing(&mut self) -> bool {
        self.pin.is_high() != self.active_low
    }
}

/// Waits for a button line to go active. The load cells and display are already
/// powered down by the caller; this only idles the loop.
pub struct GpioWakePower {
    lines: Rc<RefCell<Lines>>,
    poll: Duration,
}

impl PowerManager for GpioWakePower {
    fn sleep_until_wake(&mut self) -> std::result::Result<(), TraitError> {
        tracing::info!("waiting for wake button");
        loop {
            let woke = {
                let lines = self.lines.borrow();
                (0..3).any(|i| lines.active(i))
            };
            if woke {
                return Ok(());
            }
            std::thread::sleep(self.poll);
        }
    }
}
