// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Backend that never detects anything.

use crate::device::UsbDevice;
use crate::error::EnumerationError;

use super::UsbEnumerator;

/// Enumerator that always reports an empty bus.
///
/// A detector built on it runs normally but never emits an event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEnumerator;

impl NullEnumerator {
    /// Creates a new null enumerator.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl UsbEnumerator for NullEnumerator {
    fn name(&self) -> &'static str {
        "null"
    }

    fn list_devices(&self) -> Result<Vec<UsbDevice>, EnumerationError> {
        Ok(Vec::new())
    }
}
