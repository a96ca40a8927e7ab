//! procond Library
//!
//! Userspace driver for the Nintendo Switch Pro Controller protocol. Public API
//! for testing and integration.

pub mod config;
pub mod connection;
pub mod gesture;
pub mod input;
pub mod protocol;
pub mod registry;
pub mod rumble;
pub mod sequencer;
pub mod sink;
pub mod transport;

/// Re-export commonly used types
pub use config::{Config, ConfigError};
pub use connection::{Connection, ConnectionError, ConnectionSettings, ControllerState, RumbleHandle};
pub use gesture::{Gesture, GestureDetector, HomeTimer};
pub use input::{AnalogDpad, Axis, Button, DecodePolicy, GyroTrigger, Mode, PadEvent, Side};
pub use protocol::{decode, Command, DecodeError, Framing, RawReport};
pub use registry::{new_shared_registry, ConnectionRegistry, RegistryError, SharedRegistry, SLOT_COUNT};
pub use rumble::encode_rumble;
pub use sequencer::{Phase, Sequencer, Step, Transition};
pub use sink::{InputSink, RumbleEffects, SinkError, UinputSink};
pub use transport::{find_devices, DeviceInfo, HidrawTransport, Transport, TransportError};
