// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Hotplug detection.
//!
//! A [`HotplugDetector`] owns one background task, the poll loop, which lists
//! the attached devices through a [`UsbEnumerator`](crate::backend::UsbEnumerator),
//! filters them, and publishes the attach/detach differences to every
//! subscription. Scans happen every [`DetectorConfig::poll_interval`] and
//! whenever the [`PollTrigger`] is woken, either by the backend's change
//! watcher or by [`HotplugDetector::trigger_scan`].

mod config;
mod hotplug_detector;
mod poll_loop;
mod stats;

pub use config::{DEFAULT_POLL_INTERVAL, DEFAULT_SETTLE_DELAY, DetectorConfig};
pub use hotplug_detector::{HotplugDetector, SuspendGuard};
pub use poll_loop::PollTrigger;
pub use stats::{DetectorState, DetectorStats};
