// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Supervisor options.

use std::fmt;
use std::sync::Arc;

use crate::device::UsbDevice;

/// What the supervisor does when a worker fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum FailurePolicy {
    /// Log the failure and keep supervising the other devices.
    #[default]
    LogAndContinue,
    /// Abort every other worker and return the failure.
    Propagate,
}

type Predicate = Arc<dyn Fn(&UsbDevice) -> bool + Send + Sync>;

/// Options for a [`DeviceSupervisor`](super::DeviceSupervisor).
///
/// # Examples
///
/// ```
/// use usb_hotplug::{FailurePolicy, SupervisorOptions};
///
/// let options = SupervisorOptions::new()
///     .with_failure_policy(FailurePolicy::Propagate)
///     .cancellable(false)
///     .with_predicate(|device| device.serial().is_some());
///
/// assert!(!options.is_cancellable());
/// ```
#[derive(Clone)]
pub struct SupervisorOptions {
    failure_policy: FailurePolicy,
    cancellable: bool,
    predicate: Option<Predicate>,
}

impl SupervisorOptions {
    /// Creates the default options: log failures, cancel workers on detach,
    /// accept every device.
    #[must_use]
    pub fn new() -> Self {
        Self {
            failure_policy: FailurePolicy::default(),
            cancellable: true,
            predicate: None,
        }
    }

    /// Sets the failure policy.
    #[must_use]
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Sets whether workers are cancelled when their device is detached.
    ///
    /// When `false`, a worker runs until it returns on its own, and no second
    /// worker is started for a device whose worker is still running.
    #[must_use]
    pub fn cancellable(mut self, cancellable: bool) -> Self {
        self.cancellable = cancellable;
        self
    }

    /// Only starts workers for devices accepted by `predicate`.
    #[must_use]
    pub fn with_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&UsbDevice) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    /// Returns the failure policy.
    #[must_use]
    pub fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy
    }

    /// Returns `true` if workers are cancelled on detach.
    #[must_use]
    pub fn is_cancellable(&self) -> bool {
        self.cancellable
    }

    /// Returns `true` if a worker should be started for `device`.
    #[must_use]
    pub fn accepts(&self, device: &UsbDevice) -> bool {
        self.predicate.as_ref().is_none_or(|predicate| predicate(device))
    }
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SupervisorOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupervisorOptions")
            .field("failure_policy", &self.failure_policy)
            .field("cancellable", &self.cancellable)
            .field("predicate", &self.predicate.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = SupervisorOptions::default();
        assert_eq!(options.failure_policy(), FailurePolicy::LogAndContinue);
        assert!(options.is_cancellable());
        assert!(options.accepts(&UsbDevice::new(1, 2, "1", 3)));
    }

    #[test]
    fn predicate_filters_devices() {
        let options = SupervisorOptions::new().with_predicate(|d| d.serial().is_some());

        assert!(!options.accepts(&UsbDevice::new(1, 2, "1", 3)));
        assert!(options.accepts(&UsbDevice::new(1, 2, "1", 3).with_serial("A")));
    }

    #[test]
    fn debug_hides_predicate() {
        let options = SupervisorOptions::new().with_predicate(|_| true);
        let debug = format!("{options:?}");
        assert!(debug.contains("<fn>"));
        assert!(debug.contains("LogAndContinue"));
    }
}
