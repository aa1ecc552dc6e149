// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Background task scanning the bus and publishing the differences.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;

use crate::backend::UsbEnumerator;
use crate::device::DeviceFilter;
use crate::error::EnumerationError;
use crate::event::{EventBus, HotplugEvent, Snapshot};

use super::{DetectorState, DetectorStats};

/// Handle used to request an immediate scan.
///
/// Wakes are coalesced: any number of calls made while a scan is pending or
/// running result in a single extra scan.
#[derive(Debug, Clone, Default)]
pub struct PollTrigger {
    notify: Arc<Notify>,
}

impl PollTrigger {
    /// Creates a new trigger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests a scan as soon as possible.
    pub fn wake(&self) {
        self.notify.notify_one();
    }

    /// Waits until a scan is requested.
    pub(crate) async fn notified(&self) {
        self.notify.notified().await;
    }
}

/// State owned by the poll loop task.
///
/// The loop holds no reference to the detector itself, so dropping every
/// detector handle closes `shutdown` and ends the loop.
pub(crate) struct PollLoop {
    pub(crate) enumerator: Arc<dyn UsbEnumerator>,
    pub(crate) filter: DeviceFilter,
    pub(crate) interval: Duration,
    pub(crate) bus: EventBus,
    pub(crate) stats: Arc<Mutex<DetectorStats>>,
    pub(crate) trigger: PollTrigger,
    pub(crate) shutdown: watch::Receiver<bool>,
    pub(crate) suspend: watch::Receiver<usize>,
    pub(crate) state: Arc<watch::Sender<DetectorState>>,
    pub(crate) watcher: Option<JoinHandle<()>>,
}

impl PollLoop {
    pub(crate) async fn run(mut self) {
        let mut previous = Snapshot::new();
        let mut failing = false;

        loop {
            if !self.wait_while_suspended().await {
                break;
            }

            match scan(&self.enumerator, &self.filter).await {
                Ok(current) => {
                    if failing {
                        tracing::info!(backend = self.enumerator.name(), "Enumeration recovered");
                        failing = false;
                    }
                    let (events, settled) = previous.advance(&current);
                    self.publish(&settled, &events);
                    previous = settled;
                }
                Err(e) => {
                    tracing::warn!(backend = self.enumerator.name(), error = %e, "USB enumeration failed");
                    failing = true;
                    let mut stats = self.stats.lock();
                    stats.failed_scans += 1;
                    stats.last_error = Some(e.to_string());
                }
            }

            let stopping = *self.shutdown.borrow();
            if stopping || !self.wait_for_next_tick().await {
                break;
            }
        }

        if let Some(watcher) = self.watcher.take() {
            watcher.abort();
        }
        self.bus.close();
        self.state.send_replace(DetectorState::Stopped);
        tracing::debug!("Poll loop finished");
    }

    /// Delivers the events, then counts the scan. A scan counted in the stats
    /// is always visible to subscribers.
    fn publish(&self, snapshot: &Snapshot, events: &[HotplugEvent]) {
        for event in events {
            tracing::debug!(kind = %event.kind(), device = %event.device(), "Hotplug event");
        }

        let delivered = self.bus.publish(snapshot, events);
        {
            let mut stats = self.stats.lock();
            stats.scans += 1;
            stats.events_published += events.len() as u64;
        }

        tracing::trace!(
            devices = snapshot.len(),
            events = events.len(),
            subscribers = delivered,
            "Scan complete"
        );
    }

    /// Blocks while a suspension is active. Returns `false` on shutdown.
    async fn wait_while_suspended(&mut self) -> bool {
        let suspensions = *self.suspend.borrow();
        if suspensions == 0 {
            return true;
        }

        tracing::debug!(suspensions, "Scanning suspended");
        let resumed = tokio::select! {
            biased;
            () = shutdown_requested(&mut self.shutdown) => false,
            result = self.suspend.wait_for(|count| *count == 0) => result.is_ok(),
        };
        if resumed {
            tracing::debug!("Scanning resumed");
        }
        resumed
    }

    /// Waits for the poll interval or a trigger. Returns `false` on shutdown.
    async fn wait_for_next_tick(&mut self) -> bool {
        tokio::select! {
            biased;
            () = shutdown_requested(&mut self.shutdown) => false,
            () = self.trigger.notified() => true,
            () = tokio::time::sleep(self.interval) => true,
        }
    }
}

/// Resolves once a stop is requested or every detector handle is gone.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    // A closed channel means the detector was dropped.
    let _ = shutdown.wait_for(|stop| *stop).await;
}

/// Lists the devices on the blocking pool and applies the filter.
async fn scan(
    enumerator: &Arc<dyn UsbEnumerator>,
    filter: &DeviceFilter,
) -> Result<Snapshot, EnumerationError> {
    let enumerator = Arc::clone(enumerator);
    let devices = tokio::task::spawn_blocking(move || enumerator.list_devices())
        .await
        .map_err(|e| EnumerationError::TaskFailed(e.to_string()))??;

    Ok(Snapshot::from(devices).filtered(filter))
}
