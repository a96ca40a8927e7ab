//! Raw HID transport
//!
//! Finds Nintendo controllers under `/sys/class/hidraw` and wraps the opened
//! `/dev/hidrawN` node as a [`Transport`]. The bus type in the device's
//! `HID_ID` decides the framing: USB uses the wrapped framing, Bluetooth the
//! raw one.
//!
//! SPDX-License-Identifier: GPL-3.0

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use crate::protocol::Framing;

/// Nintendo vendor ID
pub const NINTENDO_VENDOR_ID: u16 = 0x057E;

/// Supported product IDs
pub mod product {
    pub const JOYCON_LEFT: u16 = 0x2006;
    pub const JOYCON_RIGHT: u16 = 0x2007;
    pub const PRO_CONTROLLER: u16 = 0x2009;
}

/// Bus types found in `HID_ID`
pub mod bus {
    pub const USB: u16 = 0x0003;
    pub const BLUETOOTH: u16 = 0x0005;
}

const HIDRAW_CLASS_DIR: &str = "/sys/class/hidraw";

/// Largest report either framing produces
pub const MAX_REPORT_LEN: usize = 64;

// ============================================================================
// Transport trait
// ============================================================================

/// Blocking byte sink towards the device
pub trait Transport: Send + Sync {
    /// Write one complete frame
    fn raw_send(&self, frame: &[u8]) -> Result<usize, TransportError>;
}

/// Transport error type
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// No matching device
    #[error("no Nintendo controller found")]
    DeviceNotFound,
    /// Device node not accessible
    #[error("permission denied. Ensure udev rules are installed.")]
    PermissionDenied,
    /// The device accepted fewer bytes than the frame holds
    #[error("short write: {written} of {len} bytes")]
    ShortWrite { written: usize, len: usize },
    /// Device went away
    #[error("device disconnected")]
    Disconnected,
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

// ============================================================================
// Device discovery
// ============================================================================

/// A controller found under `/sys/class/hidraw`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Device node (e.g. `/dev/hidraw3`)
    pub path: PathBuf,
    /// Name reported by the kernel
    pub name: String,
    pub product_id: u16,
    pub framing: Framing,
}

impl DeviceInfo {
    pub fn product_name(&self) -> &'static str {
        match self.product_id {
            product::PRO_CONTROLLER => "Pro Controller",
            product::JOYCON_LEFT => "Joy-Con (L)",
            product::JOYCON_RIGHT => "Joy-Con (R)",
            _ => "Unknown",
        }
    }
}

/// Fields of interest from a hidraw `device/uevent` file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uevent {
    pub bus: u16,
    pub vendor_id: u16,
    pub product_id: u16,
    pub name: String,
}

/// Parse a uevent file. `HID_ID` looks like `0005:0000057E:00002009`.
pub fn parse_uevent(contents: &str) -> Option<Uevent> {
    let mut id = None;
    let mut name = String::new();

    for line in contents.lines() {
        if let Some(value) = line.strip_prefix("HID_ID=") {
            let mut parts = value.split(':');
            let bus = u32::from_str_radix(parts.next()?, 16).ok()?;
            let vendor = u32::from_str_radix(parts.next()?, 16).ok()?;
            let product = u32::from_str_radix(parts.next()?, 16).ok()?;
            id = Some((bus as u16, vendor as u16, product as u16));
        } else if let Some(value) = line.strip_prefix("HID_NAME=") {
            name = value.to_string();
        }
    }

    let (bus, vendor_id, product_id) = id?;
    Some(Uevent {
        bus,
        vendor_id,
        product_id,
        name,
    })
}

/// Classify a uevent; `None` for anything that is not a supported controller
pub fn classify(uevent: &Uevent) -> Option<Framing> {
    if uevent.vendor_id != NINTENDO_VENDOR_ID {
        return None;
    }
    if !matches!(
        uevent.product_id,
        product::PRO_CONTROLLER | product::JOYCON_LEFT | product::JOYCON_RIGHT
    ) {
        return None;
    }
    match uevent.bus {
        bus::USB => Some(Framing::Wrapped),
        bus::BLUETOOTH => Some(Framing::Raw),
        _ => None,
    }
}

/// Scan `/sys/class/hidraw` for supported controllers
pub fn find_devices() -> Result<Vec<DeviceInfo>, TransportError> {
    find_devices_in(Path::new(HIDRAW_CLASS_DIR))
}

/// Scan a hidraw class directory. Node paths are always reported under `/dev`.
pub fn find_devices_in(class_dir: &Path) -> Result<Vec<DeviceInfo>, TransportError> {
    if !class_dir.exists() {
        return Err(TransportError::DeviceNotFound);
    }

    let mut devices = Vec::new();
    for entry in std::fs::read_dir(class_dir)? {
        let path = entry?.path();
        let Ok(contents) = std::fs::read_to_string(path.join("device/uevent")) else {
            continue;
        };
        let Some(uevent) = parse_uevent(&contents) else {
            continue;
        };
        let Some(framing) = classify(&uevent) else {
            continue;
        };
        let Some(node) = path.file_name() else {
            continue;
        };

        let info = DeviceInfo {
            path: PathBuf::from("/dev").join(node),
            name: uevent.name,
            product_id: uevent.product_id,
            framing,
        };
        tracing::debug!(
            path = %info.path.display(),
            name = %info.name,
            product = format!("0x{:04X}", info.product_id),
            framing = %info.framing,
            "Found controller"
        );
        devices.push(info);
    }

    devices.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(devices)
}

// ============================================================================
// hidraw transport
// ============================================================================

/// An opened hidraw node
#[derive(Debug)]
pub struct HidrawTransport {
    file: File,
}

impl HidrawTransport {
    /// Open a hidraw node read/write and non-blocking
    pub fn open(path: &Path) -> Result<Self, TransportError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(path)
            .map_err(|e| {
                if e.kind() == io::ErrorKind::PermissionDenied {
                    tracing::error!(
                        "Permission denied opening {:?}. Make sure udev rules are installed.",
                        path
                    );
                    TransportError::PermissionDenied
                } else {
                    TransportError::Io(e)
                }
            })?;

        tracing::info!(path = %path.display(), "Opened hidraw device");
        Ok(Self { file })
    }

    /// Read one report without blocking. `Ok(None)` means nothing is pending.
    pub fn read_report(&self, buf: &mut [u8]) -> Result<Option<usize>, TransportError> {
        match (&self.file).read(buf) {
            Ok(0) => Err(TransportError::Disconnected),
            Ok(len) => Ok(Some(len)),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) if is_gone(&e) => Err(TransportError::Disconnected),
            Err(e) => Err(TransportError::Io(e)),
        }
    }
}

impl Transport for HidrawTransport {
    fn raw_send(&self, frame: &[u8]) -> Result<usize, TransportError> {
        let written = (&self.file).write(frame).map_err(|e| {
            if is_gone(&e) {
                TransportError::Disconnected
            } else {
                TransportError::Io(e)
            }
        })?;
        if written < frame.len() {
            return Err(TransportError::ShortWrite {
                written,
                len: frame.len(),
            });
        }
        Ok(written)
    }
}

/// hidraw reports a removed device as ENODEV
fn is_gone(e: &io::Error) -> bool {
    e.raw_os_error() == Some(libc::ENODEV)
}

// ============================================================================
// Tests
// ============================================================================
