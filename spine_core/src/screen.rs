//! Plain-text screens for a 4x20 character display.
//!
//! Renderers return at most [`ROWS`] lines of at most 20 characters; rows a screen
//! does not use are cleared by the session.
use crate::calibration::CalStep;
use crate::measurement::{
    Methodology, RotationalAverage, SupportSpacing, force_to_spine, is_displayable,
};
use crate::sampler::Channel;

pub const ROWS: u8 = 4;

pub type Screen = Vec<String>;

/// Converted value with its unit, or an empty string when out of range.
pub fn format_reading(force_g: f32, methodology: Methodology, spacing: SupportSpacing) -> String {
    let v = force_to_spine(force_g, methodology, spacing);
    if !is_displayable(v) {
        return String::new();
    }
    match methodology {
        Methodology::ForceUnits => format!("{v:.1} g"),
        Methodology::AlternatePoundageAt26 => format!("{v:.1} lb"),
        Methodology::StandardSpineAt28 | Methodology::AlternateSpineAt26 => format!("{v:.0}"),
    }
}

pub fn idle(methodology: Methodology, spacing: SupportSpacing, notice: Option<&str>) -> Screen {
    let mut lines = vec![
        "Arrow spine tester".to_owned(),
        format!("{} {}", methodology.label(), spacing.label()),
        "OK=spine A=weigh".to_owned(),
    ];
    if let Some(n) = notice {
        lines.push(n.to_owned());
    }
    lines
}

pub fn spine(peak_g: f32, methodology: Methodology, spacing: SupportSpacing) -> Screen {
    let peak = if peak_g > 0.0 {
        format!("Peak {peak_g:.1} g")
    } else {
        "Peak --".to_owned()
    };
    vec![
        format!("Measure {}", methodology.label()),
        format_reading(peak_g, methodology, spacing),
        peak,
        "OK=next".to_owned(),
    ]
}

pub fn weighing(total_g: f32, cog_mm: f32, foc_percent: Option<f32>) -> Screen {
    let cog = if cog_mm > 0.0 {
        format!("CoG {cog_mm:.1} mm")
    } else {
        "CoG --".to_owned()
    };
    let foc = match foc_percent {
        Some(p) => format!("FoC {p:.1} %"),
        None => "FoC --".to_owned(),
    };
    vec!["Weight".to_owned(), format!("{total_g:.1} g"), cog, foc]
}

pub fn rotational(avg: Option<&RotationalAverage>) -> Screen {
    match avg {
        Some(a) => vec![
            format!("Avg {:.1} g", a.mean),
            format!("Max {:.1} g @{}", a.max, a.max_angle_deg),
            format!("Err {:.1} %", a.error_percent),
            "OK=back".to_owned(),
        ],
        None => vec!["No readings yet".to_owned(), "OK=back".to_owned()],
    }
}

pub fn methodology(current: Methodology, changed: bool) -> Screen {
    vec![
        if changed { "Method changed" } else { "Method" }.to_owned(),
        current.label().to_owned(),
        "Hold B again".to_owned(),
        "to change".to_owned(),
    ]
}

pub fn calibration(channel: Channel, step: CalStep, reference_grams: f32) -> Screen {
    match step {
        CalStep::RemoveWeight => vec![
            format!("Calibrate cell {channel}"),
            "Remove all weight".to_owned(),
            "OK=next".to_owned(),
            "other=abort".to_owned(),
        ],
        CalStep::PlaceReference => vec![
            format!("Calibrate cell {channel}"),
            format!("Place {reference_grams:.0} g"),
            "OK=measure".to_owned(),
            "other=abort".to_owned(),
        ],
        CalStep::Verify { grams } => vec![
            format!("Cell {channel} reads"),
            if grams.is_finite() {
                format!("{grams:.1} g")
            } else {
                "no reading".to_owned()
            },
            "OK=accept".to_owned(),
            "other=abort".to_owned(),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measurement::average_of_six;

    fn fits(screen: &Screen) -> bool {
        screen.len() <= usize::from(ROWS) && screen.iter().all(|l| l.chars().count() <= 20)
    }

    #[test]
    fn out_of_range_reading_is_blank() {
        assert_eq!(
            format_reading(100.0, Methodology::StandardSpineAt28, SupportSpacing::Long28),
            ""
        );
        assert_eq!(
            format_reading(440.0, Methodology::StandardSpineAt28, SupportSpacing::Long28),
            "1000"
        );
    }

    #[test]
    fn every_screen_fits_the_display() {
        let avg = average_of_six(&[100.0, 120.0, 110.0, 130.0, 90.0, 95.0]);
        let mut screens = vec![
            idle(Methodology::AlternatePoundageAt26, SupportSpacing::Short23, Some("Cal failed")),
            spine(1999.9, Methodology::ForceUnits, SupportSpacing::Long28),
            weighing(1234.5, 355.6, Some(12.3)),
            rotational(avg.as_ref()),
            rotational(None),
        ];
        for m in Methodology::ALL {
            screens.push(methodology(m, true));
        }
        for step in [
            CalStep::RemoveWeight,
            CalStep::PlaceReference,
            CalStep::Verify { grams: 1000.0 },
        ] {
            screens.push(calibration(Channel::B, step, 1000.0));
        }
        for s in &screens {
            assert!(fits(s), "{s:?}");
        }
    }

    #[test]
    fn rotational_screen_reports_angle() {
        let avg = average_of_six(&[100.0, 120.0, 110.0, 130.0, 90.0, 95.0]);
        let s = rotational(avg.as_ref());
        assert_eq!(s[1], "Max 130.0 g @120");
        assert_eq!(s[2], "Err 120.9 %");
    }
}
