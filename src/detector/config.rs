// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Detector configuration.

use std::time::Duration;

use crate::device::DeviceFilter;
use crate::error::ValueError;

/// Default time between two scans of the bus.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default quiet period after an OS hotplug notification before scanning.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Configuration for a [`HotplugDetector`](super::HotplugDetector).
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use usb_hotplug::{DetectorConfig, DeviceFilter};
///
/// // Every device, default poll interval
/// let config = DetectorConfig::new();
///
/// // One vendor/product pair, scanned twice a second
/// let config = DetectorConfig::for_device(0x1050, 0x0407)
///     .with_poll_interval(Duration::from_millis(500));
///
/// // Custom filter
/// let config = DetectorConfig::new()
///     .with_filter(DeviceFilter::any().with_vendor_id(0x0403));
/// ```
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Devices the detector reports.
    pub filter: DeviceFilter,
    /// Time between two scans.
    pub poll_interval: Duration,
    /// Quiet period after an OS notification before scanning.
    pub settle_delay: Duration,
}

impl DetectorConfig {
    /// Creates a configuration matching every device.
    #[must_use]
    pub fn new() -> Self {
        Self {
            filter: DeviceFilter::any(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }

    /// Creates a configuration matching one vendor/product pair.
    #[must_use]
    pub fn for_device(vendor_id: u16, product_id: u16) -> Self {
        Self::new().with_filter(DeviceFilter::for_device(vendor_id, product_id))
    }

    /// Sets the device filter.
    #[must_use]
    pub fn with_filter(mut self, filter: DeviceFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Sets the time between two scans.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the quiet period after an OS notification before scanning.
    #[must_use]
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Checks that the configuration can be used.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::ZeroPollInterval`] if the poll interval is zero.
    pub fn validate(&self) -> Result<(), ValueError> {
        if self.poll_interval.is_zero() {
            return Err(ValueError::ZeroPollInterval);
        }
        Ok(())
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self::new()
    }
}
