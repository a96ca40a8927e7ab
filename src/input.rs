//! Input report decoding
//!
//! Turns a classified full (`0x30`) or simple (`0x3F`) input report into a
//! normalized [`PadEvent`]: 18 buttons and 6 axes in `-0x7FFF..=0x7FFF`.
//!
//! ## Interpretation policy
//! - [`AnalogDpad`] lets the D-pad drive one of the sticks at full deflection.
//!   While it is active the discrete D-pad buttons stay released.
//! - [`GyroTrigger`] fuses the angular-rate sample into one stick while the
//!   matching shoulder button is held.

use serde::{Deserialize, Serialize};

use crate::protocol::{FullPayload, SimplePayload};

/// Axis extreme
pub const AXIS_MAX: i32 = 0x7FFF;

/// Angular-rate scale factor
pub const GYRO_SCALE: i16 = 7;

// ============================================================================
// Policy types
// ============================================================================

/// Input mode the controller is in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Simple HID reports (`0x3F`)
    #[default]
    Simple,
    /// Full reports (`0x30`) without IMU
    Full,
    /// Full reports with IMU data
    Gyro,
}

/// Which stick, if any, the D-pad drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalogDpad {
    #[default]
    Off,
    LeftStick,
    RightStick,
}

/// Which stick, if any, receives gyro input while its shoulder button is held
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GyroTrigger {
    #[default]
    None,
    Left,
    Right,
}

/// A side of the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl AnalogDpad {
    /// Flip between off and the given side's policy
    pub fn toggled(self, side: Side) -> Self {
        match (self, side) {
            (AnalogDpad::LeftStick, Side::Left) | (AnalogDpad::RightStick, Side::Right) => {
                AnalogDpad::Off
            }
            (_, Side::Left) => AnalogDpad::LeftStick,
            (_, Side::Right) => AnalogDpad::RightStick,
        }
    }

    fn overrides(self, side: Side) -> bool {
        matches!(
            (self, side),
            (AnalogDpad::LeftStick, Side::Left) | (AnalogDpad::RightStick, Side::Right)
        )
    }
}

// ============================================================================
// Normalized event
// ============================================================================

/// Buttons in reporting order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    A,
    B,
    X,
    Y,
    L,
    R,
    ZL,
    ZR,
    Select,
    Start,
    Home,
    Extra,
    ThumbL,
    ThumbR,
    DpadUp,
    DpadDown,
    DpadLeft,
    DpadRight,
}

impl Button {
    pub const ALL: [Button; 18] = [
        Button::A,
        Button::B,
        Button::X,
        Button::Y,
        Button::L,
        Button::R,
        Button::ZL,
        Button::ZR,
        Button::Select,
        Button::Start,
        Button::Home,
        Button::Extra,
        Button::ThumbL,
        Button::ThumbR,
        Button::DpadUp,
        Button::DpadDown,
        Button::DpadLeft,
        Button::DpadRight,
    ];
}

/// Axes in reporting order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    LX,
    LY,
    RX,
    RY,
    GyroX,
    GyroY,
}

impl Axis {
    pub const ALL: [Axis; 6] = [Axis::LX, Axis::LY, Axis::RX, Axis::RY, Axis::GyroX, Axis::GyroY];
}

/// One decoded input report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PadEvent {
    buttons: [bool; 18],
    axes: [i32; 6],
}

impl PadEvent {
    pub fn pressed(&self, button: Button) -> bool {
        self.buttons[button as usize]
    }

    pub fn axis(&self, axis: Axis) -> i32 {
        self.axes[axis as usize]
    }

    fn set(&mut self, button: Button, pressed: bool) {
        self.buttons[button as usize] = pressed;
    }

    fn set_axis(&mut self, axis: Axis, value: i32) {
        self.axes[axis as usize] = value;
    }

    /// Iterate buttons with their state
    pub fn buttons(&self) -> impl Iterator<Item = (Button, bool)> + '_ {
        Button::ALL.iter().map(|&b| (b, self.pressed(b)))
    }

    /// Iterate axes with their value
    pub fn axes(&self) -> impl Iterator<Item = (Axis, i32)> + '_ {
        Axis::ALL.iter().map(|&a| (a, self.axis(a)))
    }
}

/// Interpretation policy applied while decoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecodePolicy {
    pub mode: Mode,
    pub analog_dpad: AnalogDpad,
    pub gyro_trigger: GyroTrigger,
}

// ============================================================================
// Tables
// ============================================================================

/// D-pad directions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Hat {
    pub up: bool,
    pub right: bool,
    pub down: bool,
    pub left: bool,
}

const fn hat(up: bool, right: bool, down: bool, left: bool) -> Hat {
    Hat { up, right, down, left }
}

/// Hat codes 0..=7 clockwise from up, 8 neutral
pub const HAT_TABLE: [Hat; 9] = [
    hat(true, false, false, false),
    hat(true, true, false, false),
    hat(false, true, false, false),
    hat(false, true, true, false),
    hat(false, false, true, false),
    hat(false, false, true, true),
    hat(false, false, false, true),
    hat(true, false, false, true),
    hat(false, false, false, false),
];

/// Look up a hat code; anything out of range reads as neutral
pub fn hat_directions(code: u8) -> Hat {
    HAT_TABLE.get(usize::from(code)).copied().unwrap_or_default()
}

impl Hat {
    /// Full-deflection stick position (x = right - left, y = down - up)
    fn as_stick(self) -> (i32, i32) {
        let x = i32::from(self.right) * AXIS_MAX - i32::from(self.left) * AXIS_MAX;
        let y = i32::from(self.down) * AXIS_MAX - i32::from(self.up) * AXIS_MAX;
        (x, y)
    }
}

// ============================================================================
// Axis arithmetic
// ============================================================================

/// Recenter a 12-bit horizontal axis
pub fn recenter_x(raw12: u16) -> i32 {
    i32::from((raw12 & 0x0FFF) << 4) - AXIS_MAX
}

/// Recenter a 12-bit vertical axis (inverted: up is negative)
pub fn recenter_y(raw12: u16) -> i32 {
    AXIS_MAX - i32::from((raw12 & 0x0FFF) << 4)
}

/// Recenter a 16-bit simple-report stick field
pub fn recenter_simple(raw: u16) -> i32 {
    (i32::from(raw) - AXIS_MAX).clamp(-AXIS_MAX, AXIS_MAX)
}

/// Scale a raw angular-rate sample (16-bit wrapping, as the device reports it)
pub fn scale_gyro(raw: u16) -> i32 {
    let scaled = (raw as i16).wrapping_mul(GYRO_SCALE);
    i32::from(scaled).max(-AXIS_MAX)
}

/// Add a gyro delta to a stick axis, clamping instead of wrapping
pub fn fuse(stick: i32, delta: i32) -> i32 {
    (stick + delta).clamp(-AXIS_MAX, AXIS_MAX)
}

// ============================================================================
// Decoding
// ============================================================================

/// Decode a simple (`0x3F`) report
pub fn decode_simple(payload: &SimplePayload<'_>, policy: &DecodePolicy) -> PadEvent {
    let mut event = PadEvent::default();

    let main = payload.buttons_main();
    let system = payload.buttons_system();
    event.set(Button::A, main & 0x02 != 0);
    event.set(Button::B, main & 0x01 != 0);
    event.set(Button::X, main & 0x08 != 0);
    event.set(Button::Y, main & 0x04 != 0);
    event.set(Button::L, main & 0x10 != 0);
    event.set(Button::R, main & 0x20 != 0);
    event.set(Button::ZL, main & 0x40 != 0);
    event.set(Button::ZR, main & 0x80 != 0);
    event.set(Button::Select, system & 0x01 != 0);
    event.set(Button::Start, system & 0x02 != 0);
    event.set(Button::ThumbL, system & 0x04 != 0);
    event.set(Button::ThumbR, system & 0x08 != 0);
    event.set(Button::Home, system & 0x10 != 0);
    event.set(Button::Extra, system & 0x20 != 0);

    let hat = hat_directions(payload.hat());
    let [lx, ly, rx, ry] = payload.sticks();
    let mut left = (recenter_simple(lx), recenter_simple(ly));
    let mut right = (recenter_simple(rx), recenter_simple(ry));

    match policy.analog_dpad {
        AnalogDpad::Off => set_dpad(&mut event, hat),
        AnalogDpad::LeftStick => left = hat.as_stick(),
        AnalogDpad::RightStick => right = hat.as_stick(),
    }

    event.set_axis(Axis::LX, left.0);
    event.set_axis(Axis::LY, left.1);
    event.set_axis(Axis::RX, right.0);
    event.set_axis(Axis::RY, right.1);
    event
}

/// Decode a full (`0x30`) report
pub fn decode_full(payload: &FullPayload<'_>, policy: &DecodePolicy) -> PadEvent {
    let mut event = PadEvent::default();

    let right_byte = payload.buttons_right();
    let shared = payload.buttons_shared();
    let left_byte = payload.buttons_left();
    event.set(Button::A, right_byte & 0x08 != 0);
    event.set(Button::B, right_byte & 0x04 != 0);
    event.set(Button::X, right_byte & 0x02 != 0);
    event.set(Button::Y, right_byte & 0x01 != 0);
    event.set(Button::R, right_byte & 0x40 != 0);
    event.set(Button::ZR, right_byte & 0x80 != 0);
    event.set(Button::L, left_byte & 0x40 != 0);
    event.set(Button::ZL, left_byte & 0x80 != 0);
    event.set(Button::Select, shared & 0x01 != 0);
    event.set(Button::Start, shared & 0x02 != 0);
    event.set(Button::ThumbR, shared & 0x04 != 0);
    event.set(Button::ThumbL, shared & 0x08 != 0);
    event.set(Button::Home, shared & 0x10 != 0);
    event.set(Button::Extra, shared & 0x20 != 0);

    let dpad = Hat {
        up: left_byte & 0x02 != 0,
        down: left_byte & 0x01 != 0,
        left: left_byte & 0x08 != 0,
        right: left_byte & 0x04 != 0,
    };

    let (lx, ly) = payload.left_stick();
    let (rx, ry) = payload.right_stick();
    let mut left = (recenter_x(lx), recenter_y(ly));
    let mut right = (recenter_x(rx), recenter_y(ry));

    match policy.analog_dpad {
        AnalogDpad::Off => set_dpad(&mut event, dpad),
        AnalogDpad::LeftStick => left = dpad.as_stick(),
        AnalogDpad::RightStick => right = dpad.as_stick(),
    }

    let mut gyro = match (policy.mode, payload.gyro()) {
        (Mode::Gyro, Some((gy, gx))) => Some((scale_gyro(gx), scale_gyro(gy))),
        _ => None,
    };

    // The shoulder state was decoded above; fusion reads it back from the event
    if let Some((gx, gy)) = gyro {
        let target = match policy.gyro_trigger {
            GyroTrigger::Left if event.pressed(Button::L) => Some((Side::Left, &mut left)),
            GyroTrigger::Right if event.pressed(Button::R) => Some((Side::Right, &mut right)),
            _ => None,
        };
        if let Some((side, stick)) = target {
            if !policy.analog_dpad.overrides(side) {
                stick.0 = fuse(stick.0, gx);
                stick.1 = fuse(stick.1, gy);
                gyro = Some((0, 0));
            }
        }
    }

    let (gx, gy) = gyro.unwrap_or((0, 0));
    event.set_axis(Axis::LX, left.0);
    event.set_axis(Axis::LY, left.1);
    event.set_axis(Axis::RX, right.0);
    event.set_axis(Axis::RY, right.1);
    event.set_axis(Axis::GyroX, gx);
    event.set_axis(Axis::GyroY, gy);
    event
}

fn set_dpad(event: &mut PadEvent, hat: Hat) {
    event.set(Button::DpadUp, hat.up);
    event.set(Button::DpadDown, hat.down);
    event.set(Button::DpadLeft, hat.left);
    event.set(Button::DpadRight, hat.right);
}

// ============================================================================
// Tests
// ============================================================================
