//! Measurement engine: force to spine conversions, center of gravity, front of
//! center and the six-position rotational average.
//!
//! All functions are pure. Undefined results are signalled by value (`0.0` for
//! the center of gravity, `None` for front of center and the rotational average)
//! and out-of-range readings are clamped to [`MAX_SPINE`], which the screens
//! render as blank.

/// Clamp ceiling for every converted reading; values at the ceiling are blank on screen.
pub const MAX_SPINE: f32 = 2000.0;
/// `spine = ASTM_FACTOR / grams` at 28 inch spacing; 440 g maps to 1000.
pub const ASTM_FACTOR: f32 = 440_000.0;
/// Deflection ratio between 28 and 23 inch spans, (28/23)^3.
pub const SHORT_SPACING_CORRECTION: f32 = 1.804_224_5;
/// 28 inch spine to 26 inch spine.
pub const ALT_26_RATIO: f32 = 0.825;
/// Per-channel minimum for a defined center of gravity.
pub const COG_MIN_GRAMS: f32 = 1.0;
/// Minimum total force before a spine peak is latched.
pub const SPINE_MIN_GRAMS: f32 = 10.0;
/// Front of center is undefined this close to a support.
pub const FOC_SUPPORT_MARGIN_MM: f32 = 10.0;
pub const MM_PER_INCH: f32 = 25.4;
/// Slots in the rotational peak history.
pub const ROTATIONS: usize = 6;

/// Distance between the two load cell supports, selected by the hardware switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupportSpacing {
    /// 28 inch span.
    Long28,
    /// 23 inch span.
    Short23,
}

impl SupportSpacing {
    pub const fn from_switch(long_spacing: bool) -> Self {
        if long_spacing {
            SupportSpacing::Long28
        } else {
            SupportSpacing::Short23
        }
    }

    pub const fn is_short(self) -> bool {
        matches!(self, SupportSpacing::Short23)
    }

    /// Half of the support span in millimetres.
    pub const fn half_spacing_mm(self) -> f32 {
        match self {
            SupportSpacing::Long28 => 355.6,
            SupportSpacing::Short23 => 292.1,
        }
    }

    pub const fn span_mm(self) -> f32 {
        self.half_spacing_mm() * 2.0
    }

    pub const fn label(self) -> &'static str {
        match self {
            SupportSpacing::Long28 => "28in",
            SupportSpacing::Short23 => "23in",
        }
    }
}

/// How a total force is presented to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Methodology {
    /// Grams of force, unconverted.
    ForceUnits,
    /// ASTM-style spine at 28 inch spacing.
    StandardSpineAt28,
    /// Spine at 26 inch spacing.
    AlternateSpineAt26,
    /// Bow poundage equivalent at 26 inch spacing.
    AlternatePoundageAt26,
}

impl Methodology {
    pub const ALL: [Methodology; 4] = [
        Methodology::ForceUnits,
        Methodology::StandardSpineAt28,
        Methodology::AlternateSpineAt26,
        Methodology::AlternatePoundageAt26,
    ];

    /// Next methodology in the selection cycle, wrapping around.
    pub const fn next(self) -> Self {
        match self {
            Methodology::ForceUnits => Methodology::StandardSpineAt28,
            Methodology::StandardSpineAt28 => Methodology::AlternateSpineAt26,
            Methodology::AlternateSpineAt26 => Methodology::AlternatePoundageAt26,
            Methodology::AlternatePoundageAt26 => Methodology::ForceUnits,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Methodology::ForceUnits => "Force g",
            Methodology::StandardSpineAt28 => "Spine 28\"",
            Methodology::AlternateSpineAt26 => "Spine 26\"",
            Methodology::AlternatePoundageAt26 => "Pounds 26\"",
        }
    }
}

/// 28-inch-equivalent spine before methodology conversion and clamping.
/// Only meaningful for `force_g > 0`.
#[inline]
pub fn base_spine(force_g: f32, spacing: SupportSpacing) -> f32 {
    let base = ASTM_FACTOR / force_g;
    if spacing.is_short() {
        base * SHORT_SPACING_CORRECTION
    } else {
        base
    }
}

/// Clamp a converted value into `[0, MAX_SPINE]`. NaN maps to the ceiling.
#[inline]
pub fn clamp_reading(v: f32) -> f32 {
    if v.is_nan() {
        return MAX_SPINE;
    }
    v.clamp(0.0, MAX_SPINE)
}

/// True when a clamped reading should be shown rather than blanked.
#[inline]
pub fn is_displayable(v: f32) -> bool {
    v.is_finite() && v < MAX_SPINE
}

/// Convert the total deflection force to the selected methodology.
pub fn force_to_spine(force_g: f32, methodology: Methodology, spacing: SupportSpacing) -> f32 {
    if force_g.is_nan() || force_g <= 0.0 {
        return MAX_SPINE;
    }
    let value = match methodology {
        Methodology::ForceUnits => force_g,
        Methodology::StandardSpineAt28 => base_spine(force_g, spacing),
        Methodology::AlternateSpineAt26 => base_spine(force_g, spacing) * ALT_26_RATIO,
        Methodology::AlternatePoundageAt26 => {
            let spine26 = base_spine(force_g, spacing) * ALT_26_RATIO;
            26.0 / (spine26 / 1000.0)
        }
    };
    clamp_reading(value)
}

/// Center of gravity in millimetres from channel A's support.
///
/// Returns `0.0` when either channel carries less than [`COG_MIN_GRAMS`].
pub fn center_of_gravity(force_a: f32, force_b: f32, spacing: SupportSpacing) -> f32 {
    if force_a.is_nan() || force_b.is_nan() || force_a < COG_MIN_GRAMS || force_b < COG_MIN_GRAMS
    {
        return 0.0;
    }
    let half = spacing.half_spacing_mm();
    ((force_b - force_a) * half) / (force_b + force_a) + half
}

/// Arrow length in millimetres.
#[inline]
pub fn sixteenths_to_mm(sixteenths: u16) -> f32 {
    f32::from(sixteenths) / 16.0 * MM_PER_INCH
}

/// Front of center in percent of arrow length.
///
/// `cog_mm` is measured from the arrow end resting on channel A's support. A
/// center of gravity in the back half is mirrored forward, so the result is never
/// negative. `None` when the center of gravity lies within
/// [`FOC_SUPPORT_MARGIN_MM`] of either support (which includes the `0.0`
/// undefined signal) or the arrow length is zero.
pub fn front_of_center(
    cog_mm: f32,
    arrow_length_sixteenths: u16,
    spacing: SupportSpacing,
) -> Option<f32> {
    if !cog_mm.is_finite()
        || cog_mm < FOC_SUPPORT_MARGIN_MM
        || cog_mm > spacing.span_mm() - FOC_SUPPORT_MARGIN_MM
    {
        return None;
    }
    let length = sixteenths_to_mm(arrow_length_sixteenths);
    if length <= 0.0 {
        return None;
    }
    let half = length / 2.0;
    let cog = if cog_mm < half { length - cog_mm } else { cog_mm };
    Some((cog - half) / length * 100.0)
}

/// Summary of six readings taken at 60 degree rotations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotationalAverage {
    pub mean: f32,
    pub max: f32,
    /// Slot index of the maximum in the peak history.
    pub max_index: usize,
    /// Rotation at which the maximum was measured.
    pub max_angle_deg: u16,
    /// `max / mean * 100`.
    pub error_percent: f32,
}

/// Rotation angle of a peak history slot. Slot 0 holds the latest reading, taken
/// at the last rotation (300 degrees); slot 5 holds the first, at 0 degrees.
#[inline]
pub const fn slot_angle_deg(index: usize) -> u16 {
    ((ROTATIONS - 1 - index) * 60) as u16
}

/// Mean, maximum and spread of six rotational readings. `None` when the mean is
/// not positive.
pub fn average_of_six(readings: &[f32; ROTATIONS]) -> Option<RotationalAverage> {
    let mean = readings.iter().sum::<f32>() / ROTATIONS as f32;
    if mean.is_nan() || mean <= 0.0 {
        return None;
    }
    let mut max_index = 0;
    for (i, &r) in readings.iter().enumerate() {
        if r > readings[max_index] {
            max_index = i;
        }
    }
    let max = readings[max_index];
    Some(RotationalAverage {
        mean,
        max,
        max_index,
        max_angle_deg: slot_angle_deg(max_index),
        error_percent: max / mean * 100.0,
    })
}

/// Peak forces of the last six spine measurements, latest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PeakHistory {
    slots: [f32; ROTATIONS],
}

impl PeakHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new measurement: drop the oldest reading and clear slot 0.
    pub fn shift(&mut self) {
        self.slots.copy_within(0..ROTATIONS - 1, 1);
        self.slots[0] = 0.0;
    }

    /// Latch `total_g` into slot 0 when it is significant and exceeds the current
    /// peak. Returns true when the peak changed.
    pub fn latch(&mut self, total_g: f32) -> bool {
        if total_g > SPINE_MIN_GRAMS && total_g > self.slots[0] {
            self.slots[0] = total_g;
            true
        } else {
            false
        }
    }

    /// Peak of the measurement in progress.
    pub fn current(&self) -> f32 {
        self.slots[0]
    }

    pub fn readings(&self) -> &[f32; ROTATIONS] {
        &self.slots
    }
}
