// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `usb_hotplug` - Async USB hotplug detection for Tokio.
//!
//! This library watches the USB bus and reports devices as they are attached
//! and detached, as an ordered stream of events that any number of consumers
//! can read independently. It can also run a task per device that lives
//! exactly as long as the device stays plugged in.
//!
//! Devices are never opened: detection only relies on the operating system's
//! device list, scanned periodically and, where supported, as soon as the OS
//! reports a change.
//!
//! # Features
//!
//! - **Filtering**: by vendor ID, product ID, serial number or any predicate
//! - **Independent subscribers**: every subscription sees every event, in the
//!   same order, at its own pace
//! - **Per-device workers**: start a task on attach, cancel it on detach
//! - **Suspension**: pause scanning while the bus is being reconfigured
//!
//! # Cargo features
//!
//! - `nusb` (default): enumeration backend based on the `nusb` crate
//! - `serde`: `Serialize`/`Deserialize` for devices and events
//!
//! # Quick Start
//!
//! ## Watching events
//!
//! ```no_run
//! use usb_hotplug::HotplugDetector;
//!
//! #[tokio::main]
//! async fn main() -> usb_hotplug::Result<()> {
//!     let detector = HotplugDetector::for_device(0x1050, 0x0407)?;
//!
//!     // Subscribe before starting to also see devices already plugged in
//!     let mut events = detector.events();
//!     detector.start()?;
//!
//!     while let Some(event) = events.recv().await {
//!         println!("{event}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## One task per device
//!
//! ```no_run
//! use std::time::Duration;
//! use usb_hotplug::{HotplugDetector, UsbDevice};
//!
//! #[tokio::main]
//! async fn main() -> usb_hotplug::Result<()> {
//!     let detector = HotplugDetector::any_device()?;
//!
//!     detector
//!         .run_for_each_device(|device: UsbDevice| async move {
//!             println!("{device} attached");
//!             // Cancelled as soon as the device is unplugged
//!             tokio::time::sleep(Duration::from_secs(3600)).await;
//!             Ok::<_, std::io::Error>(())
//!         })
//!         .await
//! }
//! ```

pub mod backend;
pub mod detector;
pub mod device;
pub mod error;
pub mod event;
pub mod supervisor;

pub use backend::{NullEnumerator, UsbEnumerator, default_enumerator};
#[cfg(feature = "nusb")]
pub use backend::NusbEnumerator;
pub use detector::{
    DetectorConfig, DetectorState, DetectorStats, HotplugDetector, PollTrigger, SuspendGuard,
};
pub use device::{DeviceFilter, DeviceKey, UsbDevice, parse_usb_id};
pub use error::{BoxError, EnumerationError, Error, Result, ValueError, WorkerError};
pub use event::{HotplugEvent, HotplugEventKind, Snapshot, Subscription, SubscriptionId};
pub use supervisor::{DeviceSupervisor, FailurePolicy, SupervisorOptions};
