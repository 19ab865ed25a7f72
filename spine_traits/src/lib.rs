//! Hardware seams for the spine tester.
//!
//! Everything the engine touches outside of plain arithmetic goes through one of
//! these traits: the two load cells, the three push buttons, the support-spacing
//! switch, the character display and the power manager. Errors cross the boundary
//! as `Box<dyn Error + Send + Sync>` and are mapped to typed errors by the core.
pub mod clock;

pub use clock::{Clock, MonotonicClock};

use std::time::Duration;

/// Error type used at every trait boundary.
pub type HwError = Box<dyn std::error::Error + Send + Sync>;

/// One load cell behind an ADC (HX711 or simulated).
pub trait LoadCell {
    /// Read one sample in grams, blocking until data is ready or `timeout` expires.
    /// The reading is `(raw - offset) / scale`.
    fn read(&mut self, timeout: Duration) -> Result<f32, HwError>;

    /// Zero the cell: average `samples` readings and use the result as the new offset.
    fn tare(&mut self, samples: u32) -> Result<(), HwError>;

    /// Set the linear scale factor in raw units per gram.
    fn set_scale(&mut self, factor: f32);

    /// Current scale factor in raw units per gram.
    fn scale(&self) -> f32;

    fn power_down(&mut self) -> Result<(), HwError>;
    fn power_up(&mut self) -> Result<(), HwError>;
}

impl<T: LoadCell + ?Sized> LoadCell for Box<T> {
    fn read(&mut self, timeout: Duration) -> Result<f32, HwError> {
        (**self).read(timeout)
    }
    fn tare(&mut self, samples: u32) -> Result<(), HwError> {
        (**self).tare(samples)
    }
    fn set_scale(&mut self, factor: f32) {
        (**self).set_scale(factor);
    }
    fn scale(&self) -> f32 {
        (**self).scale()
    }
    fn power_down(&mut self) -> Result<(), HwError> {
        (**self).power_down()
    }
    fn power_up(&mut self) -> Result<(), HwError> {
        (**self).power_up()
    }
}

/// The three physical push buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    /// Primary confirm/OK button.
    Confirm,
    FunctionA,
    FunctionB,
}

impl Button {
    /// Poll order; earlier buttons win when several change in the same tick.
    pub const ALL: [Button; 3] = [Button::Confirm, Button::FunctionA, Button::FunctionB];
}

/// Raw (undebounced) button levels.
pub trait ButtonInputs {
    /// True while the button is physically held down.
    fn is_pressed(&mut self, button: Button) -> bool;
}

/// Support-spacing selector switch.
pub trait SpacingSwitch {
    /// True when the switch selects the long (28 inch) support spacing.
    fn is_long_spacing(&mut self) -> bool;
}

/// Character display. Line wrapping and padding are the implementor's business.
pub trait Display {
    fn show_line(&mut self, row: u8, text: &str) -> Result<(), HwError>;
    fn clear(&mut self) -> Result<(), HwError>;
    fn clear_row(&mut self, row: u8) -> Result<(), HwError>;
}

/// Low-power mode toggle.
pub trait PowerManager {
    /// Enter the low-power state and return once the wake line fires.
    fn sleep_until_wake(&mut self) -> Result<(), HwError>;
}

impl<T: ButtonInputs + ?Sized> ButtonInputs for Box<T> {
    fn is_pressed(&mut self, button: Button) -> bool {
        (**self).is_pressed(button)
    }
}

impl<T: SpacingSwitch + ?Sized> SpacingSwitch for Box<T> {
    fn is_long_spacing(&mut self) -> bool {
        (**self).is_long_spacing()
    }
}

impl<T: Display + ?Sized> Display for Box<T> {
    fn show_line(&mut self, row: u8, text: &str) -> Result<(), HwError> {
        (**self).show_line(row, text)
    }
    fn clear(&mut self) -> Result<(), HwError> {
        (**self).clear()
    }
    fn clear_row(&mut self, row: u8) -> Result<(), HwError> {
        (**self).clear_row(row)
    }
}

impl<T: PowerManager + ?Sized> PowerManager for Box<T> {
    fn sleep_until_wake(&mut self) -> Result<(), HwError> {
        (**self).sleep_until_wake()
    }
}

impl<T: Clock + ?Sized> Clock for Box<T> {
    fn now(&self) -> std::time::Instant {
        (**self).now()
    }
    fn sleep(&self, d: Duration) {
        (**self).sleep(d);
    }
}
