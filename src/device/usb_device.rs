// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device descriptor and identity key types.

use std::fmt;

/// One USB device as observed by a single enumeration.
///
/// Descriptors are plain values: a fresh one is produced for every device on
/// every scan, and two descriptors are matched across scans through their
/// [`DeviceKey`], never through object identity.
///
/// # Examples
///
/// ```
/// use usb_hotplug::UsbDevice;
///
/// let device = UsbDevice::new(0x1050, 0x0407, "1", 2).with_serial("0001234");
/// assert_eq!(device.to_string(), "1050:0407 at bus 1, address 2 (serial 0001234)");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UsbDevice {
    vendor_id: u16,
    product_id: u16,
    bus: String,
    address: u8,
    serial: Option<String>,
}

impl UsbDevice {
    /// Creates a descriptor without a serial number.
    #[must_use]
    pub fn new(vendor_id: u16, product_id: u16, bus: impl Into<String>, address: u8) -> Self {
        Self {
            vendor_id,
            product_id,
            bus: bus.into(),
            address,
            serial: None,
        }
    }

    /// Sets the serial number reported by the device.
    #[must_use]
    pub fn with_serial(mut self, serial: impl Into<String>) -> Self {
        self.serial = Some(serial.into());
        self
    }

    /// Returns the USB vendor ID.
    #[must_use]
    pub fn vendor_id(&self) -> u16 {
        self.vendor_id
    }

    /// Returns the USB product ID.
    #[must_use]
    pub fn product_id(&self) -> u16 {
        self.product_id
    }

    /// Returns the platform identifier of the bus the device is attached to.
    #[must_use]
    pub fn bus(&self) -> &str {
        &self.bus
    }

    /// Returns the device address on its bus.
    ///
    /// Addresses may be reused by another device after a detach.
    #[must_use]
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Returns the serial number, if the device exposes one.
    #[must_use]
    pub fn serial(&self) -> Option<&str> {
        self.serial.as_deref()
    }

    /// Computes the identity key of this descriptor.
    ///
    /// Devices with a serial number are identified by that serial, so they
    /// keep their identity when re-enumerated at another address. Devices
    /// without one are identified by their bus location plus vendor and
    /// product. A serial-less device unplugged and replugged between two scans
    /// at the same address is indistinguishable from one that stayed attached.
    ///
    /// Equal keys always mean the same session, but a descriptor whose serial
    /// could only be read on one of two scans has a different key on each;
    /// [`is_same_session`](Self::is_same_session) covers that case.
    #[must_use]
    pub fn key(&self) -> DeviceKey {
        match &self.serial {
            Some(serial) => DeviceKey::Serial {
                serial: serial.clone(),
            },
            None => DeviceKey::Location {
                bus: self.bus.clone(),
                address: self.address,
                vendor_id: self.vendor_id,
                product_id: self.product_id,
            },
        }
    }

    /// Returns `true` if `other`, seen in the scan after `self`, is the same
    /// device session.
    ///
    /// Serials decide when both descriptors carry one. When either lacks a
    /// serial, bus, address, vendor and product must all be equal.
    ///
    /// # Examples
    ///
    /// ```
    /// use usb_hotplug::UsbDevice;
    ///
    /// let with_serial = UsbDevice::new(0x1050, 0x0407, "1", 2).with_serial("S1");
    /// let without = UsbDevice::new(0x1050, 0x0407, "1", 2);
    /// let moved = UsbDevice::new(0x1050, 0x0407, "1", 5).with_serial("S1");
    ///
    /// assert!(with_serial.is_same_session(&without));
    /// assert!(with_serial.is_same_session(&moved));
    /// assert!(!without.is_same_session(&moved));
    /// ```
    #[must_use]
    pub fn is_same_session(&self, other: &Self) -> bool {
        match (&self.serial, &other.serial) {
            (Some(serial), Some(other_serial)) => serial == other_serial,
            _ => {
                self.bus == other.bus
                    && self.address == other.address
                    && self.vendor_id == other.vendor_id
                    && self.product_id == other.product_id
            }
        }
    }
}

impl fmt::Display for UsbDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04x}:{:04x} at bus {}, address {}",
            self.vendor_id, self.product_id, self.bus, self.address
        )?;
        if let Some(serial) = &self.serial {
            write!(f, " (serial {serial})")?;
        }
        Ok(())
    }
}

/// Identity of one physical device session.
///
/// Two descriptors from consecutive scans with equal keys are treated as the
/// same device that stayed attached.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DeviceKey {
    /// Identity of a device that reports a serial number.
    Serial {
        /// Serial number string.
        serial: String,
    },
    /// Identity of a device without a serial number.
    Location {
        /// Platform bus identifier.
        bus: String,
        /// Address on the bus.
        address: u8,
        /// USB vendor ID.
        vendor_id: u16,
        /// USB product ID.
        product_id: u16,
    },
}

impl fmt::Display for DeviceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serial { serial } => write!(f, "serial {serial}"),
            Self::Location {
                bus,
                address,
                vendor_id,
                product_id,
            } => write!(
                f,
                "{vendor_id:04x}:{product_id:04x} at bus {bus}, address {address}"
            ),
        }
    }
}
