// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Hotplug events, snapshot diffing and event distribution.
//!
//! A [`Snapshot`] is the list of devices seen by one scan. [`diff`] turns two
//! consecutive snapshots into attach/detach [`HotplugEvent`]s, and the
//! [`EventBus`] delivers them to any number of independent [`Subscription`]s.
//!
//! # Examples
//!
//! ```
//! use usb_hotplug::event::{EventBus, Snapshot};
//! use usb_hotplug::UsbDevice;
//!
//! let bus = EventBus::new();
//! let mut rx = bus.subscribe();
//!
//! let previous = Snapshot::new();
//! let current = Snapshot::from(vec![UsbDevice::new(0x1050, 0x0407, "1", 2)]);
//!
//! bus.publish(&current, &previous.diff(&current));
//! assert!(rx.try_recv().is_some_and(|event| event.is_attached()));
//! ```

mod event_bus;
mod hotplug_event;
mod snapshot;
mod subscription;

pub use event_bus::EventBus;
pub use hotplug_event::{HotplugEvent, HotplugEventKind};
pub use snapshot::{Snapshot, diff};
pub use subscription::{Subscription, SubscriptionId};
