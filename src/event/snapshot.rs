// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Enumeration snapshots and the attach/detach differ.

use std::collections::HashSet;

use crate::device::{DeviceFilter, DeviceKey, UsbDevice};

use super::HotplugEvent;

/// The devices observed by one scan, in enumeration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    devices: Vec<UsbDevice>,
}

impl Snapshot {
    /// Creates an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the devices in this snapshot.
    #[must_use]
    pub fn devices(&self) -> &[UsbDevice] {
        &self.devices
    }

    /// Consumes the snapshot and returns its devices.
    #[must_use]
    pub fn into_devices(self) -> Vec<UsbDevice> {
        self.devices
    }

    /// Returns the number of devices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Returns `true` if no device was observed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Returns `true` if a device with the given key is present.
    #[must_use]
    pub fn contains(&self, key: &DeviceKey) -> bool {
        self.devices.iter().any(|device| &device.key() == key)
    }

    /// Returns a snapshot holding only the devices accepted by `filter`.
    #[must_use]
    pub fn filtered(self, filter: &DeviceFilter) -> Self {
        Self {
            devices: self
                .devices
                .into_iter()
                .filter(|device| filter.matches(device))
                .collect(),
        }
    }

    /// Computes the events leading from this snapshot to `next`.
    ///
    /// See [`diff`].
    #[must_use]
    pub fn diff(&self, next: &Self) -> Vec<HotplugEvent> {
        reconcile(&self.devices, &next.devices).0
    }

    /// Computes the events leading to `next` and the snapshot the following
    /// scan must be compared against.
    ///
    /// The returned snapshot is `next`, except that a device matched only
    /// through its location (its serial was read on one scan but not the
    /// other) keeps the descriptor that opened its session. The key of a
    /// session therefore never changes between its attach and detach events.
    #[must_use]
    pub fn advance(&self, next: &Self) -> (Vec<HotplugEvent>, Self) {
        let (events, devices) = reconcile(&self.devices, &next.devices);
        (events, Self { devices })
    }
}

impl From<Vec<UsbDevice>> for Snapshot {
    fn from(devices: Vec<UsbDevice>) -> Self {
        Self { devices }
    }
}

impl FromIterator<UsbDevice> for Snapshot {
    fn from_iter<I: IntoIterator<Item = UsbDevice>>(iter: I) -> Self {
        Self {
            devices: iter.into_iter().collect(),
        }
    }
}

/// Computes the hotplug events between two consecutive scans.
///
/// Two descriptors are the same device session when their
/// [keys](UsbDevice::key) are equal, or when
/// [`UsbDevice::is_same_session`] pairs a descriptor that vanished from
/// `previous` with one that appeared in `current` (a serial missing on one
/// side). Paired descriptors produce no event.
///
/// Descriptors only in `previous` produce a detach event carrying the
/// previous descriptor; descriptors only in `current` produce an attach event
/// carrying the current descriptor. All detach events come before all attach
/// events, so a worker bound to a reused bus slot is torn down before its
/// replacement starts. Within each group the events follow the order of the
/// scan they came from.
///
/// Enumeration should never list one device twice. If it does, repeated keys
/// within one scan are reported once, since a session is tracked per key.
///
/// # Examples
///
/// ```
/// use usb_hotplug::{HotplugEvent, UsbDevice};
/// use usb_hotplug::event::diff;
///
/// let old = UsbDevice::new(0x1050, 0x0407, "1", 2);
/// let new = UsbDevice::new(0x1050, 0x0407, "1", 3);
///
/// let events = diff(&[old.clone()], &[new.clone()]);
/// assert_eq!(events, vec![HotplugEvent::detached(old), HotplugEvent::attached(new)]);
/// ```
#[must_use]
pub fn diff(previous: &[UsbDevice], current: &[UsbDevice]) -> Vec<HotplugEvent> {
    reconcile(previous, current).0
}

/// Diffs two scans. Returns the events and the devices to carry forward.
fn reconcile(previous: &[UsbDevice], current: &[UsbDevice]) -> (Vec<HotplugEvent>, Vec<UsbDevice>) {
    let previous = unique(previous);
    let current = unique(current);

    let previous_keys: HashSet<DeviceKey> = previous.iter().map(|device| device.key()).collect();
    let current_keys: HashSet<DeviceKey> = current.iter().map(|device| device.key()).collect();

    let mut gone: Vec<&UsbDevice> = previous
        .into_iter()
        .filter(|device| !current_keys.contains(&device.key()))
        .collect();
    let mut arrived = Vec::new();
    let mut carried = Vec::with_capacity(current.len());

    for device in current {
        if previous_keys.contains(&device.key()) {
            carried.push(device.clone());
        } else if let Some(index) = gone.iter().position(|old| old.is_same_session(device)) {
            carried.push(gone.remove(index).clone());
        } else {
            carried.push(device.clone());
            arrived.push(device);
        }
    }

    let events = gone
        .into_iter()
        .map(|device| HotplugEvent::detached(device.clone()))
        .chain(arrived.into_iter().map(|device| HotplugEvent::attached(device.clone())))
        .collect();

    (events, carried)
}

/// Drops repeated keys, keeping the first occurrence.
fn unique(devices: &[UsbDevice]) -> Vec<&UsbDevice> {
    let mut seen = HashSet::new();
    devices.iter().filter(|device| seen.insert(device.key())).collect()
}
