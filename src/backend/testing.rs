// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-memory enumerator for unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::device::UsbDevice;
use crate::error::EnumerationError;

use super::UsbEnumerator;

/// Enumerator whose bus contents are set by the test.
#[derive(Debug, Default)]
pub(crate) struct FakeEnumerator {
    devices: Mutex<Vec<UsbDevice>>,
    failures: AtomicUsize,
    scans: AtomicUsize,
}

impl FakeEnumerator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn attach(&self, device: UsbDevice) {
        self.devices.lock().push(device);
    }

    pub(crate) fn detach(&self, device: &UsbDevice) {
        self.devices.lock().retain(|d| d != device);
    }

    /// Makes the next `count` scans fail.
    pub(crate) fn fail_next(&self, count: usize) {
        self.failures.store(count, Ordering::SeqCst);
    }

    /// Number of scans attempted so far, failed ones included.
    pub(crate) fn scans(&self) -> usize {
        self.scans.load(Ordering::SeqCst)
    }
}

impl UsbEnumerator for FakeEnumerator {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn list_devices(&self) -> Result<Vec<UsbDevice>, EnumerationError> {
        let devices = self.devices.lock().clone();
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        self.scans.fetch_add(1, Ordering::SeqCst);

        if failing {
            return Err(EnumerationError::Unavailable("injected failure".to_string()));
        }
        Ok(devices)
    }
}
