//! Debounced button reader with short/long press classification.
//!
//! Each input is sampled once per poll and never blocks. A level change is
//! accepted once it has held for the debounce interval; events are emitted on the
//! accepted release. Buttons are polled in priority order (confirm, A, B) and the
//! first event ends the poll, so a simultaneous release of a lower-priority button
//! is picked up on the next poll.
use std::time::{Duration, Instant};

use spine_traits::{Button, ButtonInputs, Clock, SpacingSwitch};

use crate::config::ButtonCfg;
use crate::measurement::SupportSpacing;

/// Classified button release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEvent {
    Confirm,
    FunctionAShort,
    FunctionALong,
    FunctionBShort,
    FunctionBLong,
}

impl ButtonEvent {
    fn classify(button: Button, held: Duration, long_press: Duration) -> Self {
        let long = held > long_press;
        match (button, long) {
            // Confirm has no long variant.
            (Button::Confirm, _) => ButtonEvent::Confirm,
            (Button::FunctionA, false) => ButtonEvent::FunctionAShort,
            (Button::FunctionA, true) => ButtonEvent::FunctionALong,
            (Button::FunctionB, false) => ButtonEvent::FunctionBShort,
            (Button::FunctionB, true) => ButtonEvent::FunctionBLong,
        }
    }
}

/// Accepted change of a debounced level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Transition {
    active: bool,
    /// How long the previous stable level lasted.
    held: Duration,
}

/// Debounce state for one digital line.
#[derive(Debug, Clone)]
struct Debounced {
    raw: bool,
    raw_since: Instant,
    stable: bool,
    stable_since: Instant,
}

impl Debounced {
    fn new(level: bool, now: Instant) -> Self {
        Self {
            raw: level,
            raw_since: now,
            stable: level,
            stable_since: now,
        }
    }

    fn update(&mut self, level: bool, now: Instant, settle: Duration) -> Option<Transition> {
        if level != self.raw {
            self.raw = level;
            self.raw_since = now;
        }
        if self.raw != self.stable && now.saturating_duration_since(self.raw_since) >= settle {
            let held = self.raw_since.saturating_duration_since(self.stable_since);
            self.stable = self.raw;
            self.stable_since = self.raw_since;
            return Some(Transition {
                active: self.stable,
                held,
            });
        }
        None
    }

    fn settled(&self, now: Instant, settle: Duration) -> bool {
        self.raw == self.stable && now.saturating_duration_since(self.raw_since) >= settle
    }
}

#[derive(Debug, Clone)]
struct ButtonState {
    line: Debounced,
    /// Set by an observed press; a release without one (button held at boot) is ignored.
    armed: bool,
}

pub struct ButtonReader<B: ButtonInputs> {
    inputs: B,
    states: [ButtonState; 3],
    cfg: ButtonCfg,
}

impl<B: ButtonInputs> ButtonReader<B> {
    pub fn new(mut inputs: B, cfg: ButtonCfg, now: Instant) -> Self {
        let states = Button::ALL.map(|b| ButtonState {
            line: Debounced::new(inputs.is_pressed(b), now),
            armed: false,
        });
        Self {
            inputs,
            states,
            cfg,
        }
    }

    /// Sample every button once and return at most one event.
    pub fn poll(&mut self, now: Instant) -> Option<ButtonEvent> {
        for (i, button) in Button::ALL.into_iter().enumerate() {
            let level = self.inputs.is_pressed(button);
            let state = &mut self.states[i];
            let Some(t) = state.line.update(level, now, self.cfg.debounce) else {
                continue;
            };
            if t.active {
                state.armed = true;
                tracing::trace!(?button, "button down");
                continue;
            }
            if !std::mem::take(&mut state.armed) {
                tracing::debug!(?button, "release without observed press ignored");
                continue;
            }
            let event = ButtonEvent::classify(button, t.held, self.cfg.long_press);
            tracing::debug!(?event, held_ms = crate::util::ms(t.held), "button event");
            return Some(event);
        }
        None
    }

    /// Take the current levels as stable without emitting events. Buttons held
    /// now will not fire on release.
    pub fn resync(&mut self, now: Instant) {
        for (i, button) in Button::ALL.into_iter().enumerate() {
            let level = self.inputs.is_pressed(button);
            self.states[i] = ButtonState {
                line: Debounced::new(level, now),
                armed: false,
            };
        }
    }

    /// True while any button is debounced as held down.
    pub fn any_held(&self) -> bool {
        self.states.iter().any(|s| s.line.stable)
    }

    pub fn cfg(&self) -> &ButtonCfg {
        &self.cfg
    }
}

/// Sample the support-spacing switch through the debouncer, once, at startup.
///
/// Waits until the level has held for the debounce interval, polling every
/// millisecond; after `max_wait` the latest level is used.
pub fn sample_spacing_switch<S: SpacingSwitch + ?Sized>(
    switch: &mut S,
    clock: &dyn Clock,
    settle: Duration,
    max_wait: Duration,
) -> SupportSpacing {
    let start = clock.now();
    let mut line = Debounced::new(switch.is_long_spacing(), start);
    loop {
        let now = clock.now();
        line.update(switch.is_long_spacing(), now, settle);
        if line.settled(now, settle) {
            break;
        }
        if clock.has_elapsed(start, max_wait) {
            tracing::warn!(
                waited_ms = crate::util::ms(max_wait),
                "spacing switch did not settle; using latest level"
            );
            line.stable = line.raw;
            break;
        }
        clock.sleep(Duration::from_millis(1));
    }
    let spacing = SupportSpacing::from_switch(line.stable);
    tracing::info!(spacing = spacing.label(), "support spacing selected");
    spacing
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{MockButtons, MockSwitch};
    use rstest::rstest;
    use spine_traits::clock::test_clock::TestClock;

    fn reader(clock: &TestClock) -> (ButtonReader<MockButtons>, MockButtons) {
        let buttons = MockButtons::new();
        let r = ButtonReader::new(buttons.clone(), ButtonCfg::default(), clock.now());
        (r, buttons)
    }

    /// Hold `button` for `hold_ms`, polling every 5 ms, then release and poll until
    /// an event appears or 200 ms pass.
    fn press(
        r: &mut ButtonReader<MockButtons>,
        buttons: &MockButtons,
        clock: &TestClock,
        button: Button,
        hold_ms: u64,
    ) -> Option<ButtonEvent> {
        buttons.press(button);
        let mut t = 0;
        while t < hold_ms {
            assert_eq!(r.poll(clock.now()), None);
            clock.advance(Duration::from_millis(5));
            t += 5;
        }
        buttons.release(button);
        for _ in 0..40 {
            if let Some(e) = r.poll(clock.now()) {
                return Some(e);
            }
            clock.advance(Duration::from_millis(5));
        }
        None
    }

    #[test]
    fn short_and_long_presses_are_classified() {
        let clock = TestClock::new();
        let (mut r, b) = reader(&clock);
        assert_eq!(
            press(&mut r, &b, &clock, Button::FunctionA, 200),
            Some(ButtonEvent::FunctionAShort)
        );
        assert_eq!(
            press(&mut r, &b, &clock, Button::FunctionA, 1200),
            Some(ButtonEvent::FunctionALong)
        );
        assert_eq!(
            press(&mut r, &b, &clock, Button::FunctionB, 100),
            Some(ButtonEvent::FunctionBShort)
        );
        assert_eq!(
            press(&mut r, &b, &clock, Button::FunctionB, 2000),
            Some(ButtonEvent::FunctionBLong)
        );
    }

    #[test]
    fn confirm_never_reports_long() {
        let clock = TestClock::new();
        let (mut r, b) = reader(&clock);
        assert_eq!(
            press(&mut r, &b, &clock, Button::Confirm, 3000),
            Some(ButtonEvent::Confirm)
        );
    }

    #[test]
    fn bounce_shorter_than_settle_is_ignored() {
        let clock = TestClock::new();
        let (mut r, b) = reader(&clock);
        for _ in 0..5 {
            b.press(Button::Confirm);
            assert_eq!(r.poll(clock.now()), None);
            clock.advance(Duration::from_millis(10));
            b.release(Button::Confirm);
            assert_eq!(r.poll(clock.now()), None);
            clock.advance(Duration::from_millis(10));
        }
        clock.advance(Duration::from_millis(100));
        assert_eq!(r.poll(clock.now()), None);
    }

    #[test]
    fn simultaneous_releases_are_reported_in_priority_order() {
        let clock = TestClock::new();
        let (mut r, b) = reader(&clock);
        b.press(Button::Confirm);
        b.press(Button::FunctionB);
        for _ in 0..20 {
            assert_eq!(r.poll(clock.now()), None);
            clock.advance(Duration::from_millis(5));
        }
        b.release(Button::Confirm);
        b.release(Button::FunctionB);
        let mut events = Vec::new();
        for _ in 0..20 {
            if let Some(e) = r.poll(clock.now()) {
                events.push(e);
            }
            clock.advance(Duration::from_millis(5));
        }
        assert_eq!(events, vec![ButtonEvent::Confirm, ButtonEvent::FunctionBShort]);
    }

    #[test]
    fn button_held_at_boot_does_not_fire() {
        let clock = TestClock::new();
        let buttons = MockButtons::new();
        buttons.press(Button::FunctionA);
        let mut r = ButtonReader::new(buttons.clone(), ButtonCfg::default(), clock.now());
        clock.advance(Duration::from_millis(500));
        buttons.release(Button::FunctionA);
        for _ in 0..20 {
            assert_eq!(r.poll(clock.now()), None);
            clock.advance(Duration::from_millis(5));
        }
        assert!(!r.any_held());
    }

    #[test]
    fn spacing_switch_is_sampled_once() {
        let clock = TestClock::new();
        let mut long = MockSwitch::new(true);
        let spacing = sample_spacing_switch(
            &mut long,
            &clock,
            Duration::from_millis(30),
            Duration::from_secs(1),
        );
        assert_eq!(spacing, SupportSpacing::Long28);

        let mut short = MockSwitch::new(false);
        let spacing = sample_spacing_switch(
            &mut short,
            &clock,
            Duration::from_millis(30),
            Duration::from_secs(1),
        );
        assert_eq!(spacing, SupportSpacing::Short23);
    }

    #[rstest]
    // Contact bounce on a long-spacing switch never reaches the settle time.
    #[case(vec![true, false, false, true], SupportSpacing::Long28)]
    // A real flip during boot is accepted once it has held for the settle time.
    #[case(vec![true, true, false, true, false], SupportSpacing::Short23)]
    fn spacing_switch_bounce_is_debounced(
        #[case] script: Vec<bool>,
        #[case] expected: SupportSpacing,
    ) {
        let clock = TestClock::new();
        let start = clock.now();
        let settle = Duration::from_millis(30);
        let mut switch = MockSwitch::scripted(script);
        let spacing = sample_spacing_switch(&mut switch, &clock, settle, Duration::from_secs(1));
        assert_eq!(spacing, expected);
        assert!(clock.now().saturating_duration_since(start) >= settle);
    }

    #[test]
    fn spacing_switch_that_never_settles_uses_latest_level() {
        let clock = TestClock::new();
        let start = clock.now();
        let max_wait = Duration::from_millis(50);
        let chatter: Vec<bool> = (0..500).map(|i| i % 2 == 0).collect();
        let mut switch = MockSwitch::scripted(chatter);
        let spacing =
            sample_spacing_switch(&mut switch, &clock, Duration::from_millis(30), max_wait);

        assert_eq!(clock.now().saturating_duration_since(start), max_wait);
        assert!(switch.reads() < 500);
        let latest = switch.last_level().unwrap();
        assert_eq!(spacing, SupportSpacing::from_switch(latest));
    }
}
