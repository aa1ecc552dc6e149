// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Registry of running per-device workers.

use std::collections::HashMap;

use tokio::task::AbortHandle;

use crate::device::{DeviceKey, UsbDevice};

/// One running worker.
#[derive(Debug)]
struct Session {
    generation: u64,
    device: UsbDevice,
    abort: AbortHandle,
}

/// Maps device keys to the worker started for them.
///
/// Every session gets a generation number, so a worker that finishes after
/// its device was re-attached cannot remove the newer session.
#[derive(Debug, Default)]
pub(crate) struct SessionRegistry {
    sessions: HashMap<DeviceKey, Session>,
    next_generation: u64,
}

impl SessionRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Reserves the generation number for the next session.
    pub(crate) fn next_generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    pub(crate) fn contains(&self, key: &DeviceKey) -> bool {
        self.sessions.contains_key(key)
    }

    pub(crate) fn insert(&mut self, key: DeviceKey, generation: u64, device: UsbDevice, abort: AbortHandle) {
        let session = Session {
            generation,
            device,
            abort,
        };
        if let Some(stale) = self.sessions.insert(key, session) {
            stale.abort.abort();
        }
    }

    /// Aborts and removes the session for `key`.
    ///
    /// Returns the device the session was started for. The worker is torn
    /// down by the runtime; this does not wait for it.
    pub(crate) fn cancel(&mut self, key: &DeviceKey) -> Option<UsbDevice> {
        let session = self.sessions.remove(key)?;
        session.abort.abort();
        Some(session.device)
    }

    /// Removes the session for `key` if it still belongs to `generation`.
    pub(crate) fn finish(&mut self, key: &DeviceKey, generation: u64) -> bool {
        match self.sessions.get(key) {
            Some(session) if session.generation == generation => {
                self.sessions.remove(key);
                true
            }
            _ => false,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.sessions.len()
    }
}
