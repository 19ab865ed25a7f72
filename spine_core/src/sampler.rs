//! Rolling per-channel sample history.
//!
//! One sample per channel is taken on every loop tick and written over the oldest
//! slot. The average always spans the full window, including slots that still hold
//! zeros from the last `zero()`, so readings ramp up over `cell_reads` ticks after
//! every tare. Storage is a fixed array; nothing allocates after construction.
use std::fmt;
use std::time::Duration;

use spine_traits::LoadCell;

use crate::hw_error::map_hw_error;

/// Number of load cells on the instrument.
pub const CHANNELS: usize = 2;
/// Upper bound for the configurable window length.
pub const MAX_CELL_READS: usize = 64;

/// Load cell identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    A,
    B,
}

impl Channel {
    pub const ALL: [Channel; CHANNELS] = [Channel::A, Channel::B];

    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Channel::A => 0,
            Channel::B => 1,
        }
    }

    /// The channel calibrated after this one, if any.
    pub const fn next(self) -> Option<Channel> {
        match self {
            Channel::A => Some(Channel::B),
            Channel::B => None,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::A => f.write_str("A"),
            Channel::B => f.write_str("B"),
        }
    }
}

pub struct RollingBuffer<L: LoadCell> {
    cells: [L; CHANNELS],
    slots: [[f32; MAX_CELL_READS]; CHANNELS],
    window: usize,
    next: usize,
    read_timeout: Duration,
    missed_reads: u64,
}

impl<L: LoadCell> RollingBuffer<L> {
    /// `window` is clamped to `1..=MAX_CELL_READS`.
    pub fn new(cells: [L; CHANNELS], window: usize, read_timeout: Duration) -> Self {
        Self {
            cells,
            slots: [[0.0; MAX_CELL_READS]; CHANNELS],
            window: window.clamp(1, MAX_CELL_READS),
            next: 0,
            read_timeout,
            missed_reads: 0,
        }
    }

    /// Read one sample per channel into the oldest slot.
    ///
    /// Returns the stored reading per channel, or `None` where the read failed and
    /// the slot kept its previous value.
    pub fn tick(&mut self) -> [Option<f32>; CHANNELS] {
        let mut fresh = [None; CHANNELS];
        for ch in Channel::ALL {
            let i = ch.index();
            match self.cells[i].read(self.read_timeout) {
                Ok(g) if g.is_finite() => {
                    let g = g.max(0.0);
                    self.slots[i][self.next] = g;
                    fresh[i] = Some(g);
                }
                Ok(g) => {
                    self.missed_reads = self.missed_reads.saturating_add(1);
                    tracing::warn!(channel = %ch, value = g, "non-finite sample discarded");
                }
                Err(e) => {
                    self.missed_reads = self.missed_reads.saturating_add(1);
                    let err = map_hw_error(e.as_ref());
                    tracing::warn!(channel = %ch, error = %err, "sample missed; keeping previous slot");
                }
            }
        }
        self.next = (self.next + 1) % self.window;
        fresh
    }

    /// Mean over the full window of `channel`.
    pub fn average(&self, channel: Channel) -> f32 {
        let slots = &self.slots[channel.index()][..self.window];
        slots.iter().sum::<f32>() / self.window as f32
    }

    /// Sum of both channel averages.
    pub fn total(&self) -> f32 {
        Channel::ALL.iter().map(|&c| self.average(c)).sum()
    }

    /// Clear the history and tare every cell over one window's worth of samples.
    /// Tare failures are logged; the previous offset stays in effect for that cell.
    pub fn zero(&mut self) {
        self.slots = [[0.0; MAX_CELL_READS]; CHANNELS];
        self.next = 0;
        let samples = self.window as u32;
        for ch in Channel::ALL {
            if let Err(e) = self.cells[ch.index()].tare(samples) {
                let err = map_hw_error(e.as_ref());
                tracing::warn!(channel = %ch, error = %err, "tare failed");
            }
        }
        tracing::debug!(samples, "buffer zeroed");
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Reads that failed or timed out since construction.
    pub fn missed_reads(&self) -> u64 {
        self.missed_reads
    }

    pub fn cells(&self) -> &[L; CHANNELS] {
        &self.cells
    }

    /// Direct driver access for calibration, bypassing the history.
    pub fn cells_mut(&mut self) -> &mut [L; CHANNELS] {
        &mut self.cells
    }

    pub fn power_down(&mut self) {
        for ch in Channel::ALL {
            if let Err(e) = self.cells[ch.index()].power_down() {
                tracing::warn!(channel = %ch, error = %e, "power down failed");
            }
        }
    }

    pub fn power_up(&mut self) {
        for ch in Channel::ALL {
            if let Err(e) = self.cells[ch.index()].power_up() {
                tracing::warn!(channel = %ch, error = %e, "power up failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::MockCell;

    fn buffer(window: usize) -> RollingBuffer<MockCell> {
        RollingBuffer::new(
            [MockCell::new(), MockCell::new()],
            window,
            Duration::from_millis(10),
        )
    }

    #[test]
    fn converges_over_window_after_zero() {
        let mut buf = buffer(4);
        buf.cells_mut()[0].set_load(3.0);
        buf.zero();
        assert_eq!(buf.average(Channel::A), 0.0);
        assert_eq!(buf.average(Channel::B), 0.0);

        buf.cells_mut()[0].set_load(103.0);
        buf.cells_mut()[1].set_load(50.0);
        buf.tick();
        assert_eq!(buf.average(Channel::A), 25.0);
        buf.tick();
        buf.tick();
        assert_eq!(buf.average(Channel::A), 75.0);
        buf.tick();
        assert_eq!(buf.average(Channel::A), 100.0);
        assert_eq!(buf.average(Channel::B), 50.0);
        assert_eq!(buf.total(), 150.0);
    }

    #[test]
    fn negative_readings_clamp_to_zero() {
        let mut buf = buffer(2);
        buf.cells_mut()[0].set_load(12.0);
        buf.zero();
        buf.cells_mut()[0].set_load(0.0);
        buf.cells_mut()[1].set_load(8.0);
        let fresh = buf.tick();
        assert_eq!(fresh, [Some(0.0), Some(8.0)]);
        buf.tick();
        assert_eq!(buf.average(Channel::A), 0.0);
    }

    #[test]
    fn timeout_keeps_previous_slot() {
        let mut buf = buffer(2);
        buf.cells_mut()[0].set_load(10.0);
        buf.tick();
        buf.tick();
        assert_eq!(buf.average(Channel::A), 10.0);

        buf.cells_mut()[0].fail_next(2);
        buf.cells_mut()[0].set_load(30.0);
        let fresh = buf.tick();
        assert_eq!(fresh[0], None);
        buf.tick();
        // Both slots still hold the pre-timeout value.
        assert_eq!(buf.average(Channel::A), 10.0);
        assert_eq!(buf.missed_reads(), 2);

        buf.tick();
        assert_eq!(buf.average(Channel::A), 20.0);
    }

    #[test]
    fn zero_tares_every_cell() {
        let mut buf = buffer(3);
        buf.zero();
        assert_eq!(buf.cells()[0].tares(), 1);
        assert_eq!(buf.cells()[1].tares(), 1);
    }

    #[test]
    fn window_is_clamped() {
        assert_eq!(buffer(0).window(), 1);
        assert_eq!(buffer(1000).window(), MAX_CELL_READS);
    }
}
