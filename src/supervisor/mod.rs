// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-device worker supervision.
//!
//! A [`DeviceSupervisor`] turns a stream of hotplug events into worker tasks:
//! one task per physical device session, started when the device is attached
//! and aborted when it is detached. [`SupervisorOptions`] controls which
//! devices get a worker, whether detaching cancels it, and what happens when
//! a worker fails.

mod device_supervisor;
mod options;
mod session;

pub use device_supervisor::DeviceSupervisor;
pub use options::{FailurePolicy, SupervisorOptions};
