// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `nusb`-based enumeration backend.

use std::time::Duration;

use ::nusb::MaybeFuture;
use futures::{Stream, StreamExt};
use tokio::task::JoinHandle;

use crate::detector::PollTrigger;
use crate::device::UsbDevice;
use crate::error::EnumerationError;

use super::UsbEnumerator;

/// Enumerator backed by the `nusb` crate.
///
/// Device lists come from `nusb::list_devices()`, waited on synchronously
/// since the detector already runs enumeration on the blocking pool. It reads
/// cached OS device information and never performs I/O on the devices
/// themselves, so querying serial numbers on every scan is safe. When the OS supports it,
/// `nusb::watch_devices()` is used to trigger a scan as soon as the bus
/// changes.
#[derive(Debug, Default, Clone, Copy)]
pub struct NusbEnumerator;

impl NusbEnumerator {
    /// Creates a new `nusb` enumerator.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Returns `true` if `nusb` supports the current platform.
    #[must_use]
    pub fn is_supported() -> bool {
        cfg!(any(
            target_os = "linux",
            target_os = "android",
            target_os = "windows",
            target_os = "macos"
        ))
    }
}

fn describe(info: &::nusb::DeviceInfo) -> UsbDevice {
    let device = UsbDevice::new(
        info.vendor_id(),
        info.product_id(),
        info.bus_id(),
        info.device_address(),
    );

    match info.serial_number() {
        Some(serial) if !serial.is_empty() => device.with_serial(serial),
        _ => device,
    }
}

impl UsbEnumerator for NusbEnumerator {
    fn name(&self) -> &'static str {
        "nusb"
    }

    fn list_devices(&self) -> Result<Vec<UsbDevice>, EnumerationError> {
        let devices = ::nusb::list_devices()
            .wait()
            .map_err(|e| EnumerationError::Unavailable(e.to_string()))?;
        Ok(devices.map(|info| describe(&info)).collect())
    }

    fn spawn_change_watcher(
        &self,
        trigger: PollTrigger,
        settle_delay: Duration,
    ) -> Option<JoinHandle<()>> {
        match ::nusb::watch_devices() {
            Ok(watch) => Some(tokio::spawn(forward_changes(watch, trigger, settle_delay))),
            Err(e) => {
                tracing::debug!(error = %e, "Hotplug notifications unavailable, polling only");
                None
            }
        }
    }
}

/// Wakes the poll loop once per burst of hotplug notifications.
async fn forward_changes<S>(watch: S, trigger: PollTrigger, settle_delay: Duration)
where
    S: Stream + Send + 'static,
{
    let mut watch = std::pin::pin!(watch);

    while watch.next().await.is_some() {
        // Let the bus settle before scanning.
        while let Ok(Some(_)) = tokio::time::timeout(settle_delay, watch.next()).await {}

        tracing::debug!("Bus change notification, requesting scan");
        trigger.wake();
    }

    tracing::debug!("Hotplug notification stream ended");
}
