// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Hotplug event types.

use std::fmt;

use crate::device::{DeviceKey, UsbDevice};

/// Kind of a hotplug event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum HotplugEventKind {
    /// A matching device appeared on the bus.
    Attached,
    /// A matching device disappeared from the bus.
    Detached,
}

impl fmt::Display for HotplugEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Attached => f.write_str("attached"),
            Self::Detached => f.write_str("detached"),
        }
    }
}

/// A device attach or detach notification.
///
/// For detach events the descriptor is the last one observed while the device
/// was still present.
///
/// # Examples
///
/// ```
/// use usb_hotplug::{HotplugEvent, HotplugEventKind, UsbDevice};
///
/// let device = UsbDevice::new(0x1050, 0x0407, "1", 2);
/// let event = HotplugEvent::attached(device.clone());
///
/// assert_eq!(event.kind(), HotplugEventKind::Attached);
/// assert_eq!(event.device(), &device);
/// assert_eq!(event.key(), device.key());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HotplugEvent {
    kind: HotplugEventKind,
    device: UsbDevice,
}

impl HotplugEvent {
    /// Creates an attach event.
    #[must_use]
    pub fn attached(device: UsbDevice) -> Self {
        Self {
            kind: HotplugEventKind::Attached,
            device,
        }
    }

    /// Creates a detach event.
    #[must_use]
    pub fn detached(device: UsbDevice) -> Self {
        Self {
            kind: HotplugEventKind::Detached,
            device,
        }
    }

    /// Returns the kind of this event.
    #[must_use]
    pub fn kind(&self) -> HotplugEventKind {
        self.kind
    }

    /// Returns the device this event is about.
    #[must_use]
    pub fn device(&self) -> &UsbDevice {
        &self.device
    }

    /// Consumes the event and returns its device.
    #[must_use]
    pub fn into_device(self) -> UsbDevice {
        self.device
    }

    /// Returns the identity key of the device.
    #[must_use]
    pub fn key(&self) -> DeviceKey {
        self.device.key()
    }

    /// Returns `true` if this is an attach event.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.kind == HotplugEventKind::Attached
    }

    /// Returns `true` if this is a detach event.
    #[must_use]
    pub fn is_detached(&self) -> bool {
        self.kind == HotplugEventKind::Detached
    }
}

impl fmt::Display for HotplugEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_predicates() {
        let device = UsbDevice::new(1, 2, "1", 3);

        let attached = HotplugEvent::attached(device.clone());
        assert!(attached.is_attached());
        assert!(!attached.is_detached());

        let detached = HotplugEvent::detached(device);
        assert!(detached.is_detached());
        assert!(!detached.is_attached());
    }

    #[test]
    fn display_format() {
        let event = HotplugEvent::detached(UsbDevice::new(0x1050, 0x0407, "1", 2));
        assert_eq!(event.to_string(), "detached 1050:0407 at bus 1, address 2");
    }

    #[test]
    fn into_device_returns_descriptor() {
        let device = UsbDevice::new(1, 2, "1", 3).with_serial("X");
        assert_eq!(HotplugEvent::attached(device.clone()).into_device(), device);
    }
}
