// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! USB device descriptors, identity keys and filters.
//!
//! A [`UsbDevice`] is what one enumeration reports about one device. Its
//! [`DeviceKey`] decides whether two descriptors from consecutive scans belong
//! to the same physical device session. A [`DeviceFilter`] selects the devices
//! a detector is interested in.

mod filter;
mod usb_device;

pub use filter::{DeviceFilter, parse_usb_id};
pub use usb_device::{DeviceKey, UsbDevice};
