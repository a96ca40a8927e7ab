//! Virtual gamepad output
//!
//! Decoded [`PadEvent`]s are delivered to an [`InputSink`]. The Linux binding
//! creates a uinput gamepad through `evdev`, with the standard gamepad key
//! codes, two tilt axes for the angular-rate output and an `FF_RUMBLE`
//! effect that clients drive through the force-feedback interface.

use std::collections::HashMap;
use std::io;

use evdev::uinput::VirtualDevice;
use evdev::{
    AbsInfo, AbsoluteAxisCode, AttributeSet, BusType, EventSummary, EventType, FFEffectCode,
    FFEffectKind, InputEvent, InputId, KeyCode, UInputCode, UinputAbsSetup,
};

use crate::input::{Axis, Button, PadEvent, AXIS_MAX};
use crate::protocol::Framing;
use crate::transport::NINTENDO_VENDOR_ID;

/// Linux key codes
pub mod key_code {
    pub const BTN_EXTRA: u16 = 0x114;
    pub const BTN_SOUTH: u16 = 0x130;
    pub const BTN_EAST: u16 = 0x131;
    pub const BTN_NORTH: u16 = 0x133;
    pub const BTN_WEST: u16 = 0x134;
    pub const BTN_TL: u16 = 0x136;
    pub const BTN_TR: u16 = 0x137;
    pub const BTN_TL2: u16 = 0x138;
    pub const BTN_TR2: u16 = 0x139;
    pub const BTN_SELECT: u16 = 0x13A;
    pub const BTN_START: u16 = 0x13B;
    pub const BTN_MODE: u16 = 0x13C;
    pub const BTN_THUMBL: u16 = 0x13D;
    pub const BTN_THUMBR: u16 = 0x13E;
    pub const BTN_DPAD_UP: u16 = 0x220;
    pub const BTN_DPAD_DOWN: u16 = 0x221;
    pub const BTN_DPAD_LEFT: u16 = 0x222;
    pub const BTN_DPAD_RIGHT: u16 = 0x223;
}

/// Linux absolute axis codes
pub mod abs_code {
    pub const ABS_X: u16 = 0x00;
    pub const ABS_Y: u16 = 0x01;
    pub const ABS_RX: u16 = 0x03;
    pub const ABS_RY: u16 = 0x04;
    pub const ABS_TILT_X: u16 = 0x1A;
    pub const ABS_TILT_Y: u16 = 0x1B;
}

/// Dead zone reported for the sticks
pub const STICK_FLAT: i32 = 0x7FF;

/// Noise filter reported for the tilt axes
pub const TILT_FUZZ: i32 = 0x0F;

/// Key code for a button
pub fn button_code(button: Button) -> u16 {
    use key_code::*;
    match button {
        Button::A => BTN_SOUTH,
        Button::B => BTN_EAST,
        Button::X => BTN_NORTH,
        Button::Y => BTN_WEST,
        Button::L => BTN_TL,
        Button::R => BTN_TR,
        Button::ZL => BTN_TL2,
        Button::ZR => BTN_TR2,
        Button::Select => BTN_SELECT,
        Button::Start => BTN_START,
        Button::Home => BTN_MODE,
        Button::Extra => BTN_EXTRA,
        Button::ThumbL => BTN_THUMBL,
        Button::ThumbR => BTN_THUMBR,
        Button::DpadUp => BTN_DPAD_UP,
        Button::DpadDown => BTN_DPAD_DOWN,
        Button::DpadLeft => BTN_DPAD_LEFT,
        Button::DpadRight => BTN_DPAD_RIGHT,
    }
}

/// Axis code for an axis
pub fn axis_code(axis: Axis) -> u16 {
    use abs_code::*;
    match axis {
        Axis::LX => ABS_X,
        Axis::LY => ABS_Y,
        Axis::RX => ABS_RX,
        Axis::RY => ABS_RY,
        Axis::GyroX => ABS_TILT_X,
        Axis::GyroY => ABS_TILT_Y,
    }
}

/// (fuzz, flat) advertised for an axis
pub fn axis_filter(axis: Axis) -> (i32, i32) {
    match axis {
        Axis::GyroX | Axis::GyroY => (TILT_FUZZ, 0),
        _ => (0, STICK_FLAT),
    }
}

/// Rumble effects a client may upload at once
pub const FF_EFFECTS_MAX: u32 = 16;

/// Device name for a framing
pub fn device_name(framing: Framing) -> String {
    format!("Pro Controller ({})", framing)
}

/// Sink error type
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// Capabilities were already registered
    #[error("input device already registered")]
    AlreadyRegistered,
    /// Events were reported before registration
    #[error("input device not registered")]
    NotRegistered,
    #[error("uinput error: {0}")]
    Io(#[from] std::io::Error),
}

/// Consumer of normalized input events
pub trait InputSink: Send {
    /// Create the device with the full button and axis set
    fn register_capabilities(&mut self, framing: Framing) -> Result<(), SinkError>;

    fn report_button(&mut self, button: Button, pressed: bool) -> Result<(), SinkError>;

    fn report_axis(&mut self, axis: Axis, value: i32) -> Result<(), SinkError>;

    /// Flush everything reported since the last sync as one frame
    fn sync(&mut self) -> Result<(), SinkError>;

    /// Latest rumble level requested by a client since the last poll, as
    /// (weak, strong). Sinks without force feedback never request any.
    fn poll_rumble(&mut self) -> Result<Option<(u16, u16)>, SinkError> {
        Ok(None)
    }

    /// Report a whole event followed by a sync
    fn deliver(&mut self, event: &PadEvent) -> Result<(), SinkError> {
        for (button, pressed) in event.buttons() {
            self.report_button(button, pressed)?;
        }
        for (axis, value) in event.axes() {
            self.report_axis(axis, value)?;
        }
        self.sync()
    }
}

/// Uploaded rumble effects, keyed by effect id
///
/// Playing an effect yields its magnitudes; stopping one yields silence.
#[derive(Debug, Default)]
pub struct RumbleEffects {
    effects: HashMap<u16, (u16, u16)>,
}

impl RumbleEffects {
    pub fn upload(&mut self, id: u16, weak: u16, strong: u16) {
        self.effects.insert(id, (weak, strong));
    }

    pub fn erase(&mut self, id: u16) {
        self.effects.remove(&id);
    }

    /// Level for an `EV_FF` play (`count > 0`) or stop (`count == 0`)
    pub fn play(&self, id: u16, count: i32) -> Option<(u16, u16)> {
        let magnitudes = *self.effects.get(&id)?;
        if count > 0 {
            Some(magnitudes)
        } else {
            Some((0, 0))
        }
    }
}

/// uinput-backed gamepad
pub struct UinputSink {
    product_id: u16,
    device: Option<VirtualDevice>,
    pending: Vec<InputEvent>,
    effects: RumbleEffects,
}

impl UinputSink {
    /// Sink mirroring the given controller product id
    pub fn new(product_id: u16) -> Self {
        Self {
            product_id,
            device: None,
            pending: Vec::new(),
            effects: RumbleEffects::default(),
        }
    }

    fn ensure_registered(&self) -> Result<(), SinkError> {
        if self.device.is_none() {
            return Err(SinkError::NotRegistered);
        }
        Ok(())
    }
}

impl InputSink for UinputSink {
    fn register_capabilities(&mut self, framing: Framing) -> Result<(), SinkError> {
        if self.device.is_some() {
            return Err(SinkError::AlreadyRegistered);
        }

        let mut keys = AttributeSet::<KeyCode>::new();
        for button in Button::ALL {
            keys.insert(KeyCode(button_code(button)));
        }

        let bus = if framing.is_wrapped() {
            BusType::BUS_USB
        } else {
            BusType::BUS_BLUETOOTH
        };

        let mut ff = AttributeSet::<FFEffectCode>::new();
        ff.insert(FFEffectCode::FF_RUMBLE);

        let name = device_name(framing);
        let mut builder = VirtualDevice::builder()?
            .name(&name)
            .input_id(InputId::new(bus, NINTENDO_VENDOR_ID, self.product_id, 0))
            .with_keys(&keys)?
            .with_ff(&ff)?
            .with_ff_effects_max(FF_EFFECTS_MAX);
        for axis in Axis::ALL {
            let (fuzz, flat) = axis_filter(axis);
            let setup = UinputAbsSetup::new(
                AbsoluteAxisCode(axis_code(axis)),
                AbsInfo::new(0, -AXIS_MAX, AXIS_MAX, fuzz, flat, 0),
            );
            builder = builder.with_absolute_axis(&setup)?;
        }

        self.device = Some(builder.build()?);
        tracing::info!(name = %name, product_id = format!("0x{:04X}", self.product_id), "Virtual gamepad created");
        Ok(())
    }

    fn report_button(&mut self, button: Button, pressed: bool) -> Result<(), SinkError> {
        self.ensure_registered()?;
        self.pending
            .push(InputEvent::new(EventType::KEY.0, button_code(button), i32::from(pressed)));
        Ok(())
    }

    fn report_axis(&mut self, axis: Axis, value: i32) -> Result<(), SinkError> {
        self.ensure_registered()?;
        self.pending
            .push(InputEvent::new(EventType::ABSOLUTE.0, axis_code(axis), value));
        Ok(())
    }

    fn sync(&mut self) -> Result<(), SinkError> {
        // A failed sync drops the frame instead of replaying it later
        let events = std::mem::take(&mut self.pending);
        let device = self.device.as_mut().ok_or(SinkError::NotRegistered)?;
        // emit terminates the batch with SYN_REPORT
        device.emit(&events)?;
        Ok(())
    }

    fn poll_rumble(&mut self) -> Result<Option<(u16, u16)>, SinkError> {
        let Some(device) = self.device.as_mut() else {
            return Ok(None);
        };

        let events: Vec<InputEvent> = match device.fetch_events() {
            Ok(events) => events.collect(),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut latest = None;
        for event in events {
            match event.destructure() {
                EventSummary::UInput(event, UInputCode::UI_FF_UPLOAD, ..) => {
                    let mut upload = device.process_ff_upload(event)?;
                    let id = upload.effect_id() as u16;
                    if let FFEffectKind::Rumble {
                        strong_magnitude,
                        weak_magnitude,
                    } = upload.effect().kind
                    {
                        self.effects.upload(id, weak_magnitude, strong_magnitude);
                        tracing::debug!(id, weak_magnitude, strong_magnitude, "Rumble effect uploaded");
                    }
                    upload.set_retval(0);
                }
                EventSummary::UInput(event, UInputCode::UI_FF_ERASE, ..) => {
                    let erase = device.process_ff_erase(event)?;
                    self.effects.erase(erase.effect_id() as u16);
                }
                EventSummary::ForceFeedback(_, FFEffectCode(id), count) => {
                    if let Some(level) = self.effects.play(id, count) {
                        latest = Some(level);
                    }
                }
                _ => {}
            }
        }
        Ok(latest)
    }
}
