use std::time::Duration;

use proptest::prelude::*;
use spine_core::measurement::{
    MAX_SPINE, SHORT_SPACING_CORRECTION, base_spine, center_of_gravity, force_to_spine,
};
use spine_core::mocks::MockCell;
use spine_core::{Channel, Methodology, RollingBuffer, SupportSpacing};

fn methodology() -> impl Strategy<Value = Methodology> {
    prop::sample::select(Methodology::ALL.to_vec())
}

fn spacing() -> impl Strategy<Value = SupportSpacing> {
    prop::sample::select(vec![SupportSpacing::Long28, SupportSpacing::Short23])
}

proptest! {
    #[test]
    fn non_positive_force_is_out_of_range(
        f in -1.0e6f32..=0.0,
        m in methodology(),
        s in spacing(),
    ) {
        prop_assert_eq!(force_to_spine(f, m, s), MAX_SPINE);
    }

    #[test]
    fn converted_values_stay_in_range(
        f in prop::num::f32::ANY,
        m in methodology(),
        s in spacing(),
    ) {
        let v = force_to_spine(f, m, s);
        prop_assert!((0.0..=MAX_SPINE).contains(&v));
    }

    #[test]
    fn standard_spine_is_non_increasing(a in 0.01f32..1.0e5, b in 0.01f32..1.0e5) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let s = SupportSpacing::Long28;
        prop_assert!(
            force_to_spine(hi, Methodology::StandardSpineAt28, s)
                <= force_to_spine(lo, Methodology::StandardSpineAt28, s)
        );
    }

    #[test]
    fn short_spacing_scales_the_base_spine(f in 0.01f32..1.0e5) {
        let long = base_spine(f, SupportSpacing::Long28);
        let short = base_spine(f, SupportSpacing::Short23);
        let expected = long * SHORT_SPACING_CORRECTION;
        prop_assert!((short - expected).abs() <= expected.abs() * 1e-6);
    }

    #[test]
    fn symmetric_load_balances_at_half_spacing(g in 1.0f32..5000.0, s in spacing()) {
        let cog = center_of_gravity(g, g, s);
        prop_assert!((cog - s.half_spacing_mm()).abs() < 1e-3);
    }

    #[test]
    fn insignificant_side_has_no_balance_point(
        light in 0.0f32..1.0,
        heavy in 0.0f32..5000.0,
        s in spacing(),
    ) {
        prop_assert_eq!(center_of_gravity(light, heavy, s), 0.0);
        prop_assert_eq!(center_of_gravity(heavy, light, s), 0.0);
    }

    #[test]
    fn balance_point_lies_between_supports(
        a in 1.0f32..5000.0,
        b in 1.0f32..5000.0,
        s in spacing(),
    ) {
        let cog = center_of_gravity(a, b, s);
        prop_assert!(cog >= -1e-3 && cog <= s.span_mm() + 1e-3);
    }

    #[test]
    fn buffer_reaches_true_force_after_one_window(
        window in 1usize..=64,
        grams in 0.0f32..2000.0,
    ) {
        let a = MockCell::new();
        let b = MockCell::new();
        let mut buf = RollingBuffer::new([a.clone(), b], window, Duration::from_millis(1));
        buf.zero();
        prop_assert_eq!(buf.average(Channel::A), 0.0);

        a.set_load(grams);
        for _ in 0..window {
            buf.tick();
        }
        let avg = buf.average(Channel::A);
        prop_assert!((avg - grams).abs() <= grams * 1e-5 + 1e-4);
    }
}
