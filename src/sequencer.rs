//! Command sequencing
//!
//! The controller is configured one command at a time: every command is
//! acknowledged with a `0x21` report and the acknowledgement decides what to
//! send next. The planner here is pure. It takes a snapshot of the connection
//! state and returns a [`Transition`] which the connection workers apply.
//!
//! ## Setup
//! - Wrapped (USB): enable, handshake, then switch to full reports.
//! - Raw (Bluetooth): switch to simple reports.
//!
//! The first acknowledged mode change registers the controller (slot + player
//! LEDs). Gyro needs full reports first, so a gyro request from simple mode
//! goes through `SetMode(Full)` and then `EnableGyro(true)`. Every home light
//! change is finalized with an empty command after a short settle delay.

use std::time::Duration;

use crate::gesture::Gesture;
use crate::input::Mode;
use crate::protocol::{subcommand, Command, Framing, HandshakeStep, HomeLight, ReportMode};

/// Default delay between a home light ack and the finalizing no-op
pub const DEFAULT_SETTLE: Duration = Duration::from_millis(50);

/// Connection lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Disconnected,
    Handshaking,
    Ready,
}

/// One step of a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Assign a slot and light the matching player LEDs
    Register,
    Send(Command),
    Settle(Duration),
}

/// State the planner reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SequencerView {
    pub mode: Mode,
    pub mode_new: Mode,
    pub registered: bool,
}

/// Result of one planning step
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Transition {
    pub steps: Vec<Step>,
    /// Mode to commit once the steps are sent
    pub mode: Option<Mode>,
    /// New desired mode
    pub mode_new: Option<Mode>,
    pub phase: Option<Phase>,
}

impl Transition {
    fn send(&mut self, command: Command) {
        self.steps.push(Step::Send(command));
    }

    pub fn is_idle(&self) -> bool {
        self.steps.is_empty() && self.mode.is_none() && self.mode_new.is_none() && self.phase.is_none()
    }
}

/// Acknowledged subcommands that drive the sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    SetMode,
    EnableGyro,
    SetLed,
    HomeLight,
}

impl Ack {
    /// Map an acknowledged subcommand id; other ids are not acted upon
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            subcommand::SET_MODE => Some(Ack::SetMode),
            subcommand::ENABLE_IMU => Some(Ack::EnableGyro),
            subcommand::SET_LED => Some(Ack::SetLed),
            subcommand::HOME_LIGHT => Some(Ack::HomeLight),
            _ => None,
        }
    }
}

/// Protocol state machine for one connection
#[derive(Debug, Clone, Copy)]
pub struct Sequencer {
    framing: Framing,
    settle: Duration,
}

impl Sequencer {
    pub fn new(framing: Framing, settle: Duration) -> Self {
        Self { framing, settle }
    }

    /// Mode a freshly connected controller is brought into
    pub fn initial_mode(&self) -> Mode {
        match self.framing {
            Framing::Wrapped => Mode::Full,
            Framing::Raw => Mode::Simple,
        }
    }

    /// Bring-up sequence for a new connection
    pub fn on_connect(&self) -> Transition {
        let mut t = Transition {
            mode_new: Some(self.initial_mode()),
            phase: Some(Phase::Handshaking),
            ..Default::default()
        };
        match self.framing {
            Framing::Wrapped => {
                t.send(Command::Handshake(HandshakeStep::Enable));
                t.send(Command::Handshake(HandshakeStep::Handshake));
                t.send(Command::SetMode(ReportMode::Full));
            }
            Framing::Raw => t.send(Command::SetMode(ReportMode::Simple)),
        }
        t
    }

    /// React to an acknowledged subcommand id
    pub fn on_ack(&self, id: u8, view: &SequencerView) -> Transition {
        match Ack::from_id(id) {
            Some(Ack::SetMode) => self.on_mode_ack(view),
            Some(Ack::EnableGyro) => self.on_gyro_ack(view),
            Some(Ack::SetLed) => self.refresh_home_light(view),
            Some(Ack::HomeLight) => Transition {
                steps: vec![Step::Settle(self.settle), Step::Send(Command::Noop)],
                ..Default::default()
            },
            None => {
                tracing::trace!(id = format!("0x{:02X}", id), "Ack ignored");
                Transition::default()
            }
        }
    }

    /// React to a recognized gesture
    pub fn on_gesture(&self, gesture: Gesture, view: &SequencerView) -> Transition {
        match gesture {
            Gesture::ToggleGyro { .. } => self.toggle_gyro(view),
            // The policy itself flips on the report path
            Gesture::ToggleDpadPolicy { .. } => self.refresh_home_light(view),
        }
    }

    fn on_mode_ack(&self, view: &SequencerView) -> Transition {
        let mut t = Transition::default();
        if !view.registered {
            t.steps.push(Step::Register);
            t.phase = Some(Phase::Ready);
        }

        let mut commit = view.mode_new;
        match (view.mode, view.mode_new) {
            // Full reports are on now, the IMU can follow
            (Mode::Simple, Mode::Gyro) => {
                t.send(Command::EnableGyro(true));
                commit = Mode::Full;
            }
            (Mode::Gyro, Mode::Simple) => t.send(Command::HomeLight(HomeLight::Off)),
            _ => {}
        }
        t.mode = Some(commit);
        t
    }

    fn on_gyro_ack(&self, view: &SequencerView) -> Transition {
        let mut t = Transition::default();
        match view.mode_new {
            Mode::Gyro => {
                t.mode = Some(Mode::Gyro);
                t.send(Command::HomeLight(HomeLight::On));
            }
            Mode::Full => {
                t.mode = Some(Mode::Full);
                t.send(Command::HomeLight(HomeLight::Off));
            }
            // IMU off on the raw transport: drop back to simple reports
            Mode::Simple => t.send(Command::SetMode(ReportMode::Simple)),
        }
        t
    }

    fn toggle_gyro(&self, view: &SequencerView) -> Transition {
        let mut t = Transition {
            mode_new: Some(Mode::Gyro),
            ..Default::default()
        };
        match view.mode {
            Mode::Simple => t.send(Command::SetMode(ReportMode::Full)),
            Mode::Full => t.send(Command::EnableGyro(true)),
            Mode::Gyro => {
                t.send(Command::EnableGyro(false));
                t.mode_new = Some(self.initial_mode());
            }
        }
        t
    }

    /// The controller may keep a stale home light across reconnects
    fn refresh_home_light(&self, view: &SequencerView) -> Transition {
        let mut t = Transition::default();
        if view.mode != Mode::Gyro {
            t.send(Command::HomeLight(HomeLight::Off));
        }
        t
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::GyroTrigger;

    fn view(mode: Mode, mode_new: Mode, registered: bool) -> SequencerView {
        SequencerView { mode, mode_new, registered }
    }

    fn sends(t: &Transition) -> Vec<Command> {
        t.steps
            .iter()
            .filter_map(|step| match step {
                Step::Send(command) => Some(*command),
                _ => None,
            })
            .collect()
    }

    const TOGGLE_GYRO: Gesture = Gesture::ToggleGyro { trigger: GyroTrigger::None };

    #[test]
    fn test_connect_wrapped() {
        let t = Sequencer::new(Framing::Wrapped, DEFAULT_SETTLE).on_connect();
        assert_eq!(
            sends(&t),
            vec![
                Command::Handshake(HandshakeStep::Enable),
                Command::Handshake(HandshakeStep::Handshake),
                Command::SetMode(ReportMode::Full),
            ]
        );
        assert_eq!(t.mode_new, Some(Mode::Full));
        assert_eq!(t.mode, None);
        assert_eq!(t.phase, Some(Phase::Handshaking));
    }

    #[test]
    fn test_connect_raw() {
        let t = Sequencer::new(Framing::Raw, DEFAULT_SETTLE).on_connect();
        assert_eq!(sends(&t), vec![Command::SetMode(ReportMode::Simple)]);
        assert_eq!(t.mode_new, Some(Mode::Simple));
    }

    #[test]
    fn test_first_mode_ack_registers() {
        let seq = Sequencer::new(Framing::Wrapped, DEFAULT_SETTLE);
        let t = seq.on_ack(subcommand::SET_MODE, &view(Mode::Simple, Mode::Full, false));
        assert_eq!(t.steps, vec![Step::Register]);
        assert_eq!(t.mode, Some(Mode::Full));
        assert_eq!(t.phase, Some(Phase::Ready));

        let t = seq.on_ack(subcommand::SET_MODE, &view(Mode::Full, Mode::Full, true));
        assert!(t.steps.is_empty());
        assert_eq!(t.phase, None);
    }

    #[test]
    fn test_mode_ack_simple_to_gyro_enables_imu() {
        let seq = Sequencer::new(Framing::Raw, DEFAULT_SETTLE);
        let t = seq.on_ack(subcommand::SET_MODE, &view(Mode::Simple, Mode::Gyro, true));
        assert_eq!(sends(&t), vec![Command::EnableGyro(true)]);
        // Full is committed, the desired mode stays gyro until the IMU ack
        assert_eq!(t.mode, Some(Mode::Full));
        assert_eq!(t.mode_new, None);
    }

    #[test]
    fn test_mode_ack_gyro_to_simple_turns_light_off() {
        let seq = Sequencer::new(Framing::Raw, DEFAULT_SETTLE);
        let t = seq.on_ack(subcommand::SET_MODE, &view(Mode::Gyro, Mode::Simple, true));
        assert_eq!(sends(&t), vec![Command::HomeLight(HomeLight::Off)]);
        assert_eq!(t.mode, Some(Mode::Simple));
    }

    #[test]
    fn test_gyro_ack() {
        let seq = Sequencer::new(Framing::Wrapped, DEFAULT_SETTLE);
        let t = seq.on_ack(subcommand::ENABLE_IMU, &view(Mode::Full, Mode::Gyro, true));
        assert_eq!(t.mode, Some(Mode::Gyro));
        assert_eq!(sends(&t), vec![Command::HomeLight(HomeLight::On)]);

        let t = seq.on_ack(subcommand::ENABLE_IMU, &view(Mode::Gyro, Mode::Full, true));
        assert_eq!(t.mode, Some(Mode::Full));
        assert_eq!(sends(&t), vec![Command::HomeLight(HomeLight::Off)]);

        let t = seq.on_ack(subcommand::ENABLE_IMU, &view(Mode::Gyro, Mode::Simple, true));
        assert_eq!(t.mode, None);
        assert_eq!(sends(&t), vec![Command::SetMode(ReportMode::Simple)]);
    }

    #[test]
    fn test_toggle_gyro() {
        let wrapped = Sequencer::new(Framing::Wrapped, DEFAULT_SETTLE);
        let raw = Sequencer::new(Framing::Raw, DEFAULT_SETTLE);

        let t = raw.on_gesture(TOGGLE_GYRO, &view(Mode::Simple, Mode::Simple, true));
        assert_eq!(sends(&t), vec![Command::SetMode(ReportMode::Full)]);
        assert_eq!(t.mode_new, Some(Mode::Gyro));

        let t = wrapped.on_gesture(TOGGLE_GYRO, &view(Mode::Full, Mode::Full, true));
        assert_eq!(sends(&t), vec![Command::EnableGyro(true)]);
        assert_eq!(t.mode_new, Some(Mode::Gyro));

        let t = wrapped.on_gesture(TOGGLE_GYRO, &view(Mode::Gyro, Mode::Gyro, true));
        assert_eq!(sends(&t), vec![Command::EnableGyro(false)]);
        assert_eq!(t.mode_new, Some(Mode::Full));

        let t = raw.on_gesture(TOGGLE_GYRO, &view(Mode::Gyro, Mode::Gyro, true));
        assert_eq!(t.mode_new, Some(Mode::Simple));
        // Mode itself only changes on acks
        assert_eq!(t.mode, None);
    }

    #[test]
    fn test_led_ack_refreshes_home_light() {
        let seq = Sequencer::new(Framing::Raw, DEFAULT_SETTLE);
        let t = seq.on_ack(subcommand::SET_LED, &view(Mode::Simple, Mode::Simple, true));
        assert_eq!(sends(&t), vec![Command::HomeLight(HomeLight::Off)]);

        let t = seq.on_ack(subcommand::SET_LED, &view(Mode::Gyro, Mode::Gyro, true));
        assert!(t.is_idle());
    }

    #[test]
    fn test_dpad_gesture_refreshes_home_light() {
        let seq = Sequencer::new(Framing::Wrapped, DEFAULT_SETTLE);
        let gesture = Gesture::ToggleDpadPolicy { side: crate::input::Side::Left };
        let t = seq.on_gesture(gesture, &view(Mode::Full, Mode::Full, true));
        assert_eq!(sends(&t), vec![Command::HomeLight(HomeLight::Off)]);
    }

    #[test]
    fn test_home_light_ack_settles_then_noop() {
        let settle = Duration::from_millis(5);
        let t = Sequencer::new(Framing::Raw, settle).on_ack(subcommand::HOME_LIGHT, &SequencerView::default());
        assert_eq!(t.steps, vec![Step::Settle(settle), Step::Send(Command::Noop)]);
    }

    #[test]
    fn test_other_acks_ignored() {
        let seq = Sequencer::new(Framing::Raw, DEFAULT_SETTLE);
        for id in [subcommand::INFO, subcommand::BATTERY, subcommand::BUTTON_TIME, 0x99] {
            assert!(seq.on_ack(id, &SequencerView::default()).is_idle());
        }
    }
}
