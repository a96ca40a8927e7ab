//! Home button long-press gestures
//!
//! Holding Home for the hold time (2 s by default) triggers:
//! - Home alone: toggle gyro. Holding L or R at that moment picks the stick the
//!   gyro steers while that shoulder button is held.
//! - Home + one stick click: toggle that side's analog D-pad policy.
//!
//! A gesture fires once per press. Home must be released to arm it again.

use std::time::{Duration, Instant};

use crate::input::{Button, GyroTrigger, PadEvent, Side};

/// Default hold time before a gesture fires
pub const DEFAULT_HOLD: Duration = Duration::from_secs(2);

/// Home button timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HomeTimer {
    /// Home is up
    #[default]
    Released,
    /// A gesture fired during this press; wait for release
    Locked,
    /// Home held since the given instant
    HeldSince(Instant),
}

/// A recognized gesture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gesture {
    ToggleGyro { trigger: GyroTrigger },
    ToggleDpadPolicy { side: Side },
}

/// Long-press recognizer
#[derive(Debug, Clone, Copy)]
pub struct GestureDetector {
    hold: Duration,
}

impl GestureDetector {
    pub fn new(hold: Duration) -> Self {
        Self { hold }
    }

    /// Advance the timer with one decoded report
    pub fn update(&self, timer: HomeTimer, event: &PadEvent, now: Instant) -> (HomeTimer, Option<Gesture>) {
        if !event.pressed(Button::Home) {
            return (HomeTimer::Released, None);
        }

        let since = match timer {
            HomeTimer::Released => return (HomeTimer::HeldSince(now), None),
            HomeTimer::Locked => return (HomeTimer::Locked, None),
            HomeTimer::HeldSince(since) => since,
        };

        if now.saturating_duration_since(since) < self.hold {
            return (timer, None);
        }

        let gesture = match (event.pressed(Button::ThumbL), event.pressed(Button::ThumbR)) {
            (false, false) => {
                let trigger = if event.pressed(Button::L) {
                    GyroTrigger::Left
                } else if event.pressed(Button::R) {
                    GyroTrigger::Right
                } else {
                    GyroTrigger::None
                };
                Gesture::ToggleGyro { trigger }
            }
            (true, false) => Gesture::ToggleDpadPolicy { side: Side::Left },
            (false, true) => Gesture::ToggleDpadPolicy { side: Side::Right },
            (true, true) => return (timer, None),
        };

        tracing::debug!(?gesture, "Home gesture recognized");
        (HomeTimer::Locked, Some(gesture))
    }
}

impl Default for GestureDetector {
    fn default() -> Self {
        Self::new(DEFAULT_HOLD)
    }
}
