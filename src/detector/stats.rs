// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Detector lifecycle state and counters.

use std::fmt;

/// Lifecycle state of a [`HotplugDetector`](super::HotplugDetector).
///
/// A detector only moves forward: `Idle → Running → Stopping → Stopped`,
/// or `Idle → Stopped` when it is stopped before being started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum DetectorState {
    /// Created, not scanning yet.
    #[default]
    Idle,
    /// The poll loop is scanning the bus.
    Running,
    /// A stop was requested; the last scan is finishing.
    Stopping,
    /// Stopped for good; every subscription has ended.
    Stopped,
}

impl DetectorState {
    /// Returns `true` once a stop has been requested.
    #[must_use]
    pub fn is_shutting_down(self) -> bool {
        matches!(self, Self::Stopping | Self::Stopped)
    }
}

impl fmt::Display for DetectorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Counters maintained by the poll loop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectorStats {
    /// Scans that produced a device list.
    pub scans: u64,
    /// Scans where enumeration failed.
    pub failed_scans: u64,
    /// Hotplug events published to subscribers.
    pub events_published: u64,
    /// Message of the most recent enumeration failure.
    pub last_error: Option<String>,
}

impl DetectorStats {
    /// Total number of scan attempts.
    #[must_use]
    pub fn attempts(&self) -> u64 {
        self.scans + self.failed_scans
    }
}
