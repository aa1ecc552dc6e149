// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device filter selecting the devices a detector reports.

use std::fmt;
use std::sync::Arc;

use crate::error::ValueError;

use super::UsbDevice;

type Predicate = Arc<dyn Fn(&UsbDevice) -> bool + Send + Sync>;

/// Parses a vendor or product ID written in hexadecimal notation.
///
/// An optional `0x`/`0X` prefix is accepted.
///
/// # Errors
///
/// Returns [`ValueError::InvalidUsbId`] if the string is not a hexadecimal
/// number that fits in 16 bits.
///
/// # Examples
///
/// ```
/// use usb_hotplug::device::parse_usb_id;
///
/// assert_eq!(parse_usb_id("0402").unwrap(), 0x0402);
/// assert_eq!(parse_usb_id("0x0204").unwrap(), 0x0204);
/// assert!(parse_usb_id("xyz").is_err());
/// ```
pub fn parse_usb_id(value: &str) -> Result<u16, ValueError> {
    let trimmed = value.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    u16::from_str_radix(digits, 16).map_err(|_| ValueError::InvalidUsbId(value.to_string()))
}

/// Predicate selecting the devices of interest.
///
/// Every configured criterion must match. A filter with no criteria matches
/// every device.
///
/// # Examples
///
/// ```
/// use usb_hotplug::{DeviceFilter, UsbDevice};
///
/// let filter = DeviceFilter::for_device(0x1050, 0x0407)
///     .with_predicate(|device| device.bus() == "1");
///
/// assert!(filter.matches(&UsbDevice::new(0x1050, 0x0407, "1", 2)));
/// assert!(!filter.matches(&UsbDevice::new(0x1050, 0x0407, "2", 2)));
/// assert!(!filter.matches(&UsbDevice::new(0x0403, 0x6001, "1", 2)));
/// ```
#[derive(Clone, Default)]
pub struct DeviceFilter {
    vendor_id: Option<u16>,
    product_id: Option<u16>,
    serial: Option<String>,
    predicate: Option<Predicate>,
}

impl DeviceFilter {
    /// Creates a filter matching every device.
    #[must_use]
    pub fn any() -> Self {
        Self::default()
    }

    /// Creates a filter matching a single vendor/product pair.
    #[must_use]
    pub fn for_device(vendor_id: u16, product_id: u16) -> Self {
        Self::any()
            .with_vendor_id(vendor_id)
            .with_product_id(product_id)
    }

    /// Creates a filter from vendor and product IDs in hexadecimal notation.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::InvalidUsbId`] if either ID cannot be parsed.
    pub fn from_hex(vendor_id: &str, product_id: &str) -> Result<Self, ValueError> {
        Ok(Self::for_device(
            parse_usb_id(vendor_id)?,
            parse_usb_id(product_id)?,
        ))
    }

    /// Restricts the filter to one vendor ID.
    #[must_use]
    pub fn with_vendor_id(mut self, vendor_id: u16) -> Self {
        self.vendor_id = Some(vendor_id);
        self
    }

    /// Restricts the filter to one product ID.
    #[must_use]
    pub fn with_product_id(mut self, product_id: u16) -> Self {
        self.product_id = Some(product_id);
        self
    }

    /// Restricts the filter to devices reporting this serial number.
    #[must_use]
    pub fn with_serial(mut self, serial: impl Into<String>) -> Self {
        self.serial = Some(serial.into());
        self
    }

    /// Adds a custom predicate, combined with the other criteria by logical AND.
    ///
    /// Setting a predicate replaces any previously set one.
    #[must_use]
    pub fn with_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&UsbDevice) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    /// Returns the vendor ID criterion.
    #[must_use]
    pub fn vendor_id(&self) -> Option<u16> {
        self.vendor_id
    }

    /// Returns the product ID criterion.
    #[must_use]
    pub fn product_id(&self) -> Option<u16> {
        self.product_id
    }

    /// Returns the serial number criterion.
    #[must_use]
    pub fn serial(&self) -> Option<&str> {
        self.serial.as_deref()
    }

    /// Returns `true` if the device satisfies every criterion.
    #[must_use]
    pub fn matches(&self, device: &UsbDevice) -> bool {
        self.vendor_id.is_none_or(|vid| vid == device.vendor_id())
            && self.product_id.is_none_or(|pid| pid == device.product_id())
            && self
                .serial
                .as_deref()
                .is_none_or(|serial| device.serial() == Some(serial))
            && self.predicate.as_ref().is_none_or(|matches| matches(device))
    }
}

impl fmt::Debug for DeviceFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceFilter")
            .field("vendor_id", &self.vendor_id)
            .field("product_id", &self.product_id)
            .field("serial", &self.serial)
            .field("predicate", &self.predicate.is_some())
            .finish()
    }
}
