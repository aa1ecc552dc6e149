// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! USB enumeration backends.
//!
//! The detector only needs one capability from the platform: listing the
//! devices that are currently attached. Backends implement
//! [`UsbEnumerator`]; they may also push "something changed" notifications
//! to shorten the time until the next scan, but the detector never depends on
//! them.
//!
//! # Available backends
//!
//! - [`NusbEnumerator`] (feature `nusb`, enabled by default): lists devices
//!   with the `nusb` crate and wakes the poll loop on OS hotplug notifications.
//! - [`NullEnumerator`]: never reports a device. Useful as a fallback on
//!   platforms without USB access.

#[cfg(feature = "nusb")]
mod nusb_enumerator;
mod null;
#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::detector::PollTrigger;
use crate::device::UsbDevice;
use crate::error::{EnumerationError, Error, Result};

#[cfg(feature = "nusb")]
pub use nusb_enumerator::NusbEnumerator;
pub use null::NullEnumerator;

/// Source of USB device lists.
///
/// Implementations must be cheap to share between tasks. [`list_devices`]
/// may block; the detector always calls it on Tokio's blocking thread pool.
///
/// [`list_devices`]: UsbEnumerator::list_devices
///
/// # Examples
///
/// ```
/// use usb_hotplug::backend::UsbEnumerator;
/// use usb_hotplug::error::EnumerationError;
/// use usb_hotplug::UsbDevice;
///
/// struct SingleDevice;
///
/// impl UsbEnumerator for SingleDevice {
///     fn name(&self) -> &'static str {
///         "single"
///     }
///
///     fn list_devices(&self) -> Result<Vec<UsbDevice>, EnumerationError> {
///         Ok(vec![UsbDevice::new(0x1050, 0x0407, "1", 2)])
///     }
/// }
/// ```
pub trait UsbEnumerator: Send + Sync + 'static {
    /// Short name of the backend, used in log messages.
    fn name(&self) -> &'static str;

    /// Lists every USB device currently attached to the system.
    ///
    /// # Errors
    ///
    /// Returns an error if the USB subsystem cannot be queried right now.
    fn list_devices(&self) -> std::result::Result<Vec<UsbDevice>, EnumerationError>;

    /// Starts a background task that calls [`PollTrigger::wake`] whenever the
    /// platform reports that the device list may have changed.
    ///
    /// `settle_delay` is how long the bus should stay quiet before waking the
    /// poll loop, so a burst of notifications causes a single scan. Returns
    /// `None` when the backend has no notification mechanism, which only
    /// affects detection latency.
    fn spawn_change_watcher(
        &self,
        _trigger: PollTrigger,
        _settle_delay: Duration,
    ) -> Option<JoinHandle<()>> {
        None
    }
}

/// Returns the enumeration backend for the current platform.
///
/// # Errors
///
/// Returns [`Error::NoBackend`] when no backend supports this platform, or
/// when the crate was built without the `nusb` feature.
pub fn default_enumerator() -> Result<Arc<dyn UsbEnumerator>> {
    platform_enumerator().ok_or(Error::NoBackend)
}

#[cfg(feature = "nusb")]
fn platform_enumerator() -> Option<Arc<dyn UsbEnumerator>> {
    if NusbEnumerator::is_supported() {
        Some(Arc::new(NusbEnumerator::new()))
    } else {
        None
    }
}

#[cfg(not(feature = "nusb"))]
fn platform_enumerator() -> Option<Arc<dyn UsbEnumerator>> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_enumerator_has_no_watcher() {
        let watcher = NullEnumerator::new().spawn_change_watcher(PollTrigger::new(), Duration::ZERO);
        assert!(watcher.is_none());
    }

    #[cfg(feature = "nusb")]
    #[test]
    fn default_enumerator_matches_platform_support() {
        assert_eq!(
            default_enumerator().is_ok(),
            NusbEnumerator::is_supported()
        );
    }

    #[cfg(not(feature = "nusb"))]
    #[test]
    fn default_enumerator_requires_a_backend() {
        assert!(matches!(default_enumerator(), Err(Error::NoBackend)));
    }
}
