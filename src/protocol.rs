//! Pro Controller wire codec
//!
//! Converts between raw report buffers and logical command/report values for
//! both transport framings:
//!
//! - **Wrapped** (USB): output frames start with `0x80`, command frames carry an
//!   8-byte `0x80 0x92 ...` header and are padded to 64 bytes. Command replies
//!   arrive as `0x81` reports with a 10-byte prefix in front of the real tag.
//! - **Raw** (Bluetooth): the command body is sent directly as a 49-byte report.
//!
//! SPDX-License-Identifier: GPL-3.0

use std::fmt;

use crate::transport::{Transport, TransportError};

// ============================================================================
// Constants
// ============================================================================

/// Report tags (first byte of a report)
pub mod report_tag {
    /// Wrapped output report (host -> device, USB)
    pub const WRAPPED_OUTPUT: u8 = 0x80;
    /// Wrapped reply report (device -> host, USB)
    pub const WRAPPED_REPLY: u8 = 0x81;
    /// Subcommand acknowledgement
    pub const ACK: u8 = 0x21;
    /// Full input report (buttons, 12-bit sticks, IMU tail)
    pub const INPUT_FULL: u8 = 0x30;
    /// Simple HID input report (buttons, hat, 16-bit sticks)
    pub const INPUT_SIMPLE: u8 = 0x3F;
}

/// Command body tags (first byte of a command body)
pub mod body_tag {
    /// Rumble data followed by a subcommand
    pub const COMMAND_AND_RUMBLE: u8 = 0x01;
    /// Rumble data only
    pub const RUMBLE_ONLY: u8 = 0x10;
}

/// Wrapped transport sub-types (second byte of a `0x80` report)
pub mod wrapped {
    pub const HANDSHAKE: u8 = 0x02;
    pub const BAUD: u8 = 0x03;
    pub const ENABLE: u8 = 0x04;
    pub const DISABLE: u8 = 0x05;
    pub const DO_COMMAND: u8 = 0x92;
}

/// Subcommand ids
pub mod subcommand {
    pub const NOOP: u8 = 0x00;
    pub const INFO: u8 = 0x02;
    pub const SET_MODE: u8 = 0x03;
    pub const BUTTON_TIME: u8 = 0x04;
    pub const SET_LED: u8 = 0x30;
    pub const HOME_LIGHT: u8 = 0x38;
    pub const ENABLE_IMU: u8 = 0x40;
    pub const BATTERY: u8 = 0x50;
}

/// Input mode arguments for `SET_MODE`
pub mod mode_arg {
    pub const FULL: u8 = 0x30;
    pub const SIMPLE: u8 = 0x3F;
}

/// Wrapped frame length
pub const WRAPPED_FRAME_LEN: usize = 64;

/// Raw frame length
pub const RAW_FRAME_LEN: usize = 49;

/// Length of the `0x80 0x92` sequence header in front of a wrapped command body
pub const WRAPPED_HEADER_LEN: usize = 8;

/// Prefix stripped from `0x81` replies before the real tag
pub const WRAPPED_REPLY_PREFIX: usize = 10;

/// Offset of the acknowledged subcommand id in an ack report
pub const ACK_ID_OFFSET: usize = 14;

/// Minimum report lengths per tag
pub const MIN_ACK_LEN: usize = ACK_ID_OFFSET + 1;
pub const MIN_FULL_LEN: usize = 13;
pub const MIN_SIMPLE_LEN: usize = 12;

/// Offset of the subcommand id inside a command body
const BODY_SUBCOMMAND_OFFSET: usize = 10;

/// Minimum command body: tag, counter, 8 rumble bytes, subcommand, one argument
const MIN_BODY_LEN: usize = BODY_SUBCOMMAND_OFFSET + 2;

const WRAPPED_HEADER: [u8; WRAPPED_HEADER_LEN] = [
    report_tag::WRAPPED_OUTPUT,
    wrapped::DO_COMMAND,
    0x00,
    0x31,
    0x00,
    0x00,
    0x00,
    0x00,
];

/// Neutral rumble data sent along with ordinary subcommands
pub const NEUTRAL_RUMBLE: [u8; 8] = [0x00, 0x10, 0x40, 0x40, 0x00, 0x10, 0x40, 0x40];

/// Rumble data sent along with the home light subcommand
pub const HOME_LIGHT_RUMBLE: [u8; 8] = [0x00, 0x90, 0x20, 0x64, 0x00, 0x90, 0x20, 0x64];

// ============================================================================
// Framing
// ============================================================================

/// Transport framing of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// USB: 64-byte frames with a sequence header
    Wrapped,
    /// Bluetooth: 49-byte frames, body only
    Raw,
}

impl Framing {
    pub fn is_wrapped(self) -> bool {
        self == Framing::Wrapped
    }
}

impl fmt::Display for Framing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Framing::Wrapped => write!(f, "Wired"),
            Framing::Raw => write!(f, "Wireless"),
        }
    }
}

// ============================================================================
// Commands
// ============================================================================

/// Report mode requested with `SET_MODE`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportMode {
    Full,
    Simple,
}

impl ReportMode {
    pub fn arg(self) -> u8 {
        match self {
            ReportMode::Full => mode_arg::FULL,
            ReportMode::Simple => mode_arg::SIMPLE,
        }
    }
}

/// Home button ring light variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HomeLight {
    /// Gyro indicator lit
    On,
    /// Gyro indicator off
    Off,
}

impl HomeLight {
    pub fn variant(self) -> u8 {
        match self {
            HomeLight::On => 0x20,
            HomeLight::Off => 0x21,
        }
    }
}

/// Wrapped-transport handshake steps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeStep {
    Handshake,
    Baud,
    Enable,
    Disable,
}

impl HandshakeStep {
    pub fn code(self) -> u8 {
        match self {
            HandshakeStep::Handshake => wrapped::HANDSHAKE,
            HandshakeStep::Baud => wrapped::BAUD,
            HandshakeStep::Enable => wrapped::ENABLE,
            HandshakeStep::Disable => wrapped::DISABLE,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            wrapped::HANDSHAKE => Some(HandshakeStep::Handshake),
            wrapped::BAUD => Some(HandshakeStep::Baud),
            wrapped::ENABLE => Some(HandshakeStep::Enable),
            wrapped::DISABLE => Some(HandshakeStep::Disable),
            _ => None,
        }
    }
}

/// A command sent to the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Wrapped-transport handshake frame
    Handshake(HandshakeStep),
    /// Select the input report mode
    SetMode(ReportMode),
    /// Set the player LEDs (4-bit pattern)
    SetLed(u8),
    /// Enable or disable the IMU
    EnableGyro(bool),
    /// Set the home button ring light
    HomeLight(HomeLight),
    /// Empty subcommand used to finalize a home light change
    Noop,
    /// Rumble data only
    Rumble([u8; 8]),
}

impl Command {
    /// Subcommand id carried by this command, if any
    pub fn subcommand(&self) -> Option<u8> {
        match self {
            Command::Handshake(_) | Command::Rumble(_) => None,
            Command::SetMode(_) => Some(subcommand::SET_MODE),
            Command::SetLed(_) => Some(subcommand::SET_LED),
            Command::EnableGyro(_) => Some(subcommand::ENABLE_IMU),
            Command::HomeLight(_) => Some(subcommand::HOME_LIGHT),
            Command::Noop => Some(subcommand::NOOP),
        }
    }

    /// Encode the command for the given framing
    pub fn encode(&self, framing: Framing) -> Vec<u8> {
        match *self {
            Command::Handshake(step) => encode_handshake(step),
            Command::SetMode(mode) => {
                encode_command(framing, subcommand::SET_MODE, &[mode.arg()], &NEUTRAL_RUMBLE)
            }
            Command::SetLed(pattern) => {
                encode_command(framing, subcommand::SET_LED, &[pattern], &NEUTRAL_RUMBLE)
            }
            Command::EnableGyro(on) => {
                encode_command(framing, subcommand::ENABLE_IMU, &[u8::from(on)], &NEUTRAL_RUMBLE)
            }
            Command::HomeLight(light) => encode_command(
                framing,
                subcommand::HOME_LIGHT,
                &[0x0F, light.variant(), 0x20],
                &HOME_LIGHT_RUMBLE,
            ),
            Command::Noop => encode_command(framing, subcommand::NOOP, &[0x00], &NEUTRAL_RUMBLE),
            Command::Rumble(data) => encode_rumble_frame(framing, &data),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Handshake(step) => write!(f, "Handshake({:?})", step),
            Command::SetMode(mode) => write!(f, "SetMode({:?})", mode),
            Command::SetLed(pattern) => write!(f, "SetLed({:04b})", pattern),
            Command::EnableGyro(on) => write!(f, "EnableGyro({})", on),
            Command::HomeLight(light) => write!(f, "HomeLight({:?})", light),
            Command::Noop => write!(f, "Noop"),
            Command::Rumble(data) => write!(f, "Rumble({:02X?})", data),
        }
    }
}

// ============================================================================
// Encoding
// ============================================================================

/// Build a subcommand frame
///
/// The body is `[0x01, counter, rumble(8), subcommand, args...]`. Wrapped framing
/// prepends the sequence header and pads to 64 bytes; raw framing sends the body
/// itself, padded or truncated to 49 bytes.
pub fn encode_command(framing: Framing, subcommand: u8, args: &[u8], rumble_prefix: &[u8; 8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(BODY_SUBCOMMAND_OFFSET + 1 + args.len());
    body.push(body_tag::COMMAND_AND_RUMBLE);
    body.push(0x00);
    body.extend_from_slice(rumble_prefix);
    body.push(subcommand);
    body.extend_from_slice(args);
    frame_body(framing, &body)
}

/// Build a rumble-only frame
pub fn encode_rumble_frame(framing: Framing, rumble: &[u8; 8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(MIN_BODY_LEN);
    body.push(body_tag::RUMBLE_ONLY);
    body.push(0x00);
    body.extend_from_slice(rumble);
    body.extend_from_slice(&[0x00, 0x00]);
    frame_body(framing, &body)
}

/// Build a wrapped-transport handshake frame (`0x80 <step>`)
pub fn encode_handshake(step: HandshakeStep) -> Vec<u8> {
    let mut frame = vec![0u8; WRAPPED_FRAME_LEN];
    frame[0] = report_tag::WRAPPED_OUTPUT;
    frame[1] = step.code();
    frame
}

fn frame_body(framing: Framing, body: &[u8]) -> Vec<u8> {
    match framing {
        Framing::Wrapped => {
            let mut frame = vec![0u8; WRAPPED_FRAME_LEN];
            frame[..WRAPPED_HEADER_LEN].copy_from_slice(&WRAPPED_HEADER);
            let len = body.len().min(WRAPPED_FRAME_LEN - WRAPPED_HEADER_LEN);
            frame[WRAPPED_HEADER_LEN..WRAPPED_HEADER_LEN + len].copy_from_slice(&body[..len]);
            frame
        }
        Framing::Raw => {
            let mut frame = vec![0u8; RAW_FRAME_LEN];
            let len = body.len().min(RAW_FRAME_LEN);
            frame[..len].copy_from_slice(&body[..len]);
            frame
        }
    }
}

// ============================================================================
// Decoding
// ============================================================================

/// A host -> device frame recognised by `decode`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputCommand {
    Handshake(HandshakeStep),
    Subcommand { id: u8, arg: u8 },
    Rumble([u8; 8]),
}

/// Validated full input report (tag `0x30`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FullPayload<'a>(&'a [u8]);

/// Validated simple input report (tag `0x3F`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimplePayload<'a>(&'a [u8]);

/// A classified report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawReport<'a> {
    OutputCommand(OutputCommand),
    AckReply(u8),
    InputFull(FullPayload<'a>),
    InputSimple(SimplePayload<'a>),
    Unrecognized(u8),
}

/// Decode error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// Zero-length buffer
    #[error("empty report")]
    Empty,
    /// Buffer too short for its tag
    #[error("report 0x{tag:02X} too short: {len} bytes, need {min}")]
    TooShort { tag: u8, len: usize, min: usize },
}

fn require(data: &[u8], min: usize) -> Result<(), DecodeError> {
    if data.len() < min {
        return Err(DecodeError::TooShort {
            tag: data[0],
            len: data.len(),
            min,
        });
    }
    Ok(())
}

/// Classify a report buffer
pub fn decode(framing: Framing, data: &[u8]) -> Result<RawReport<'_>, DecodeError> {
    let mut data = data;
    if data.is_empty() {
        return Err(DecodeError::Empty);
    }

    if framing.is_wrapped() && data[0] == report_tag::WRAPPED_REPLY {
        // Only the tag is needed after stripping; a bare prefix is still short
        require(data, WRAPPED_REPLY_PREFIX + 1)?;
        data = &data[WRAPPED_REPLY_PREFIX..];
    }

    match data[0] {
        report_tag::ACK => {
            require(data, MIN_ACK_LEN)?;
            Ok(RawReport::AckReply(data[ACK_ID_OFFSET]))
        }
        report_tag::INPUT_FULL => {
            require(data, MIN_FULL_LEN)?;
            Ok(RawReport::InputFull(FullPayload(data)))
        }
        report_tag::INPUT_SIMPLE => {
            require(data, MIN_SIMPLE_LEN)?;
            Ok(RawReport::InputSimple(SimplePayload(data)))
        }
        report_tag::WRAPPED_OUTPUT if framing.is_wrapped() => decode_wrapped_output(data),
        body_tag::COMMAND_AND_RUMBLE | body_tag::RUMBLE_ONLY if !framing.is_wrapped() => {
            decode_body(data).map(RawReport::OutputCommand)
        }
        tag => Ok(RawReport::Unrecognized(tag)),
    }
}

fn decode_wrapped_output(data: &[u8]) -> Result<RawReport<'_>, DecodeError> {
    require(data, 2)?;
    if data[1] == wrapped::DO_COMMAND {
        require(data, WRAPPED_HEADER_LEN + 1)?;
        return decode_body(&data[WRAPPED_HEADER_LEN..]).map(RawReport::OutputCommand);
    }
    match HandshakeStep::from_code(data[1]) {
        Some(step) => Ok(RawReport::OutputCommand(OutputCommand::Handshake(step))),
        None => Ok(RawReport::Unrecognized(data[0])),
    }
}

fn decode_body(body: &[u8]) -> Result<OutputCommand, DecodeError> {
    require(body, MIN_BODY_LEN)?;
    let mut rumble = [0u8; 8];
    rumble.copy_from_slice(&body[2..BODY_SUBCOMMAND_OFFSET]);
    if body[0] == body_tag::RUMBLE_ONLY {
        return Ok(OutputCommand::Rumble(rumble));
    }
    Ok(OutputCommand::Subcommand {
        id: body[BODY_SUBCOMMAND_OFFSET],
        arg: body[BODY_SUBCOMMAND_OFFSET + 1],
    })
}

// ============================================================================
// Payload field accessors
// ============================================================================

impl<'a> FullPayload<'a> {
    /// Right-hand button byte (Y X B A SR SL R ZR)
    pub fn buttons_right(&self) -> u8 {
        self.0[3]
    }

    /// Shared button byte (- + RS LS Home Capture)
    pub fn buttons_shared(&self) -> u8 {
        self.0[4]
    }

    /// Left-hand button byte (Down Up Right Left SR SL L ZL)
    pub fn buttons_left(&self) -> u8 {
        self.0[5]
    }

    /// Left stick as raw 12-bit (x, y)
    pub fn left_stick(&self) -> (u16, u16) {
        unpack_stick(&self.0[6..9])
    }

    /// Right stick as raw 12-bit (x, y)
    pub fn right_stick(&self) -> (u16, u16) {
        unpack_stick(&self.0[9..12])
    }

    /// Raw angular-rate sample (y, x), when the report carries the IMU tail
    pub fn gyro(&self) -> Option<(u16, u16)> {
        let tail = self.0.get(13..17)?;
        Some((
            u16::from_le_bytes([tail[0], tail[1]]),
            u16::from_le_bytes([tail[2], tail[3]]),
        ))
    }

    /// Whether the IMU is streaming data
    pub fn imu_active(&self) -> bool {
        self.0.get(13).is_some_and(|&b| b != 0)
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.0
    }
}

impl<'a> SimplePayload<'a> {
    /// First button byte (B A Y X L R ZL ZR)
    pub fn buttons_main(&self) -> u8 {
        self.0[1]
    }

    /// Second button byte (- + LS RS Home Capture)
    pub fn buttons_system(&self) -> u8 {
        self.0[2]
    }

    /// Hat code (0..=7 directions, 8 neutral)
    pub fn hat(&self) -> u8 {
        self.0[3]
    }

    /// Sticks as unsigned 16-bit fields (lx, ly, rx, ry)
    pub fn sticks(&self) -> [u16; 4] {
        let field = |at: usize| u16::from_le_bytes([self.0[at], self.0[at + 1]]);
        [field(4), field(6), field(8), field(10)]
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.0
    }
}

/// Unpack two 12-bit values from a byte triple
fn unpack_stick(triple: &[u8]) -> (u16, u16) {
    let x = u16::from(triple[0]) | (u16::from(triple[1] & 0x0F) << 8);
    let y = u16::from(triple[1] >> 4) | (u16::from(triple[2]) << 4);
    (x, y)
}

// ============================================================================
// Send
// ============================================================================

/// Write one frame through the transport. Failures are returned, never retried.
pub fn send(transport: &dyn Transport, frame: &[u8]) -> Result<usize, TransportError> {
    let written = transport.raw_send(frame)?;
    tracing::trace!(len = frame.len(), "Sent frame: {:02X?}", &frame[..frame.len().min(16)]);
    Ok(written)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrapped_command_layout() {
        let frame = Command::SetMode(ReportMode::Full).encode(Framing::Wrapped);
        assert_eq!(frame.len(), WRAPPED_FRAME_LEN);
        assert_eq!(&frame[..8], &[0x80, 0x92, 0x00, 0x31, 0x00, 0x00, 0x00, 0x00]);
        assert_eq!(frame[8], body_tag::COMMAND_AND_RUMBLE);
        assert_eq!(&frame[10..18], &NEUTRAL_RUMBLE);
        assert_eq!(frame[18], subcommand::SET_MODE);
        assert_eq!(frame[19], mode_arg::FULL);
        assert!(frame[20..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_raw_command_layout() {
        let frame = Command::SetLed(0b0011).encode(Framing::Raw);
        assert_eq!(frame.len(), RAW_FRAME_LEN);
        assert_eq!(frame[0], body_tag::COMMAND_AND_RUMBLE);
        assert_eq!(frame[10], subcommand::SET_LED);
        assert_eq!(frame[11], 0b0011);
    }

    #[test]
    fn test_long_args_truncated_to_frame_length() {
        let raw = encode_command(Framing::Raw, subcommand::SET_MODE, &[0xAA; 60], &NEUTRAL_RUMBLE);
        assert_eq!(raw.len(), RAW_FRAME_LEN);
        assert_eq!(raw[10], subcommand::SET_MODE);
        assert_eq!(raw[RAW_FRAME_LEN - 1], 0xAA);

        let wrapped = encode_command(Framing::Wrapped, subcommand::SET_MODE, &[0xAA; 60], &NEUTRAL_RUMBLE);
        assert_eq!(wrapped.len(), WRAPPED_FRAME_LEN);
        assert_eq!(wrapped[WRAPPED_FRAME_LEN - 1], 0xAA);
    }

    #[test]
    fn test_command_round_trip_both_framings() {
        for framing in [Framing::Wrapped, Framing::Raw] {
            let frame = encode_command(framing, subcommand::ENABLE_IMU, &[0x01], &NEUTRAL_RUMBLE);
            assert_eq!(
                decode(framing, &frame),
                Ok(RawReport::OutputCommand(OutputCommand::Subcommand {
                    id: subcommand::ENABLE_IMU,
                    arg: 0x01,
                }))
            );
        }
    }

    #[test]
    fn test_home_light_frame() {
        let frame = Command::HomeLight(HomeLight::Off).encode(Framing::Raw);
        assert_eq!(&frame[2..10], &HOME_LIGHT_RUMBLE);
        assert_eq!(&frame[10..14], &[0x38, 0x0F, 0x21, 0x20]);

        let frame = Command::HomeLight(HomeLight::On).encode(Framing::Wrapped);
        assert_eq!(frame[20], 0x20);
    }

    #[test]
    fn test_handshake_frame() {
        let frame = encode_handshake(HandshakeStep::Enable);
        assert_eq!(frame.len(), WRAPPED_FRAME_LEN);
        assert_eq!(&frame[..2], &[0x80, 0x04]);
        assert_eq!(
            decode(Framing::Wrapped, &frame),
            Ok(RawReport::OutputCommand(OutputCommand::Handshake(HandshakeStep::Enable)))
        );
    }

    #[test]
    fn test_rumble_frame_uses_rumble_only_tag() {
        let data = [0x20, 0x02, 0xA8, 0x40, 0x20, 0x02, 0xA8, 0x40];
        let frame = Command::Rumble(data).encode(Framing::Raw);
        assert_eq!(frame[0], body_tag::RUMBLE_ONLY);
        assert_eq!(
            decode(Framing::Raw, &frame),
            Ok(RawReport::OutputCommand(OutputCommand::Rumble(data)))
        );
    }

    #[test]
    fn test_decode_ack() {
        let mut report = [0u8; 49];
        report[0] = report_tag::ACK;
        report[ACK_ID_OFFSET] = subcommand::SET_LED;
        assert_eq!(decode(Framing::Raw, &report), Ok(RawReport::AckReply(0x30)));
    }

    #[test]
    fn test_decode_wrapped_reply_strips_prefix() {
        let mut report = [0u8; 64];
        report[0] = report_tag::WRAPPED_REPLY;
        report[WRAPPED_REPLY_PREFIX] = report_tag::ACK;
        report[WRAPPED_REPLY_PREFIX + ACK_ID_OFFSET] = subcommand::SET_MODE;
        assert_eq!(decode(Framing::Wrapped, &report), Ok(RawReport::AckReply(0x03)));

        // The raw transport never wraps replies
        assert_eq!(decode(Framing::Raw, &report), Ok(RawReport::Unrecognized(0x81)));
    }

    #[test]
    fn test_decode_short_buffers() {
        assert_eq!(decode(Framing::Raw, &[]), Err(DecodeError::Empty));
        assert!(matches!(
            decode(Framing::Raw, &[report_tag::ACK, 0, 0]),
            Err(DecodeError::TooShort { tag: 0x21, min: 15, .. })
        ));
        assert!(decode(Framing::Raw, &[report_tag::INPUT_FULL; 12]).is_err());
        assert!(decode(Framing::Raw, &[report_tag::INPUT_SIMPLE; 11]).is_err());
        assert!(decode(Framing::Wrapped, &[report_tag::WRAPPED_REPLY; 5]).is_err());
    }

    #[test]
    fn test_decode_input_reports() {
        let full = [report_tag::INPUT_FULL; 13];
        assert!(matches!(decode(Framing::Raw, &full), Ok(RawReport::InputFull(_))));

        let simple = [report_tag::INPUT_SIMPLE; 12];
        assert!(matches!(decode(Framing::Wrapped, &simple), Ok(RawReport::InputSimple(_))));

        assert_eq!(decode(Framing::Raw, &[0x63, 0x00]), Ok(RawReport::Unrecognized(0x63)));
    }

    #[test]
    fn test_unpack_stick() {
        // x = 0xABC, y = 0x123
        assert_eq!(unpack_stick(&[0xBC, 0x3A, 0x12]), (0xABC, 0x123));
    }

    #[test]
    fn test_full_payload_gyro_tail() {
        let mut report = [0u8; 17];
        report[0] = report_tag::INPUT_FULL;
        report[13..17].copy_from_slice(&[0x01, 0x00, 0x02, 0x00]);
        let RawReport::InputFull(payload) = decode(Framing::Raw, &report).unwrap() else {
            panic!("expected full report");
        };
        assert_eq!(payload.gyro(), Some((1, 2)));
        assert!(payload.imu_active());

        let RawReport::InputFull(short) = decode(Framing::Raw, &report[..13]).unwrap() else {
            panic!("expected full report");
        };
        assert_eq!(short.gyro(), None);
        assert!(!short.imu_active());
    }
}
