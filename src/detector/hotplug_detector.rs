// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The hotplug detector.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::{Stream, StreamExt, stream};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::backend::{UsbEnumerator, default_enumerator};
use crate::device::UsbDevice;
use crate::error::{BoxError, Error, Result};
use crate::event::{EventBus, HotplugEvent, Subscription};
use crate::supervisor::{DeviceSupervisor, SupervisorOptions};

use super::poll_loop::{PollLoop, PollTrigger};
use super::{DetectorConfig, DetectorState, DetectorStats};

/// Watches the USB bus and reports devices as they come and go.
///
/// The detector scans the bus on a fixed interval (and sooner when the
/// backend reports a change), keeps the devices that match its filter, and
/// publishes the difference between two consecutive scans as
/// [`HotplugEvent`]s. Devices already attached when the detector starts are
/// reported as attached by the first scan. Stopping the detector never
/// produces detach events.
///
/// Clones share the same detector. When every clone is dropped the
/// background task ends on its own.
///
/// # Examples
///
/// ```no_run
/// use usb_hotplug::HotplugDetector;
///
/// #[tokio::main]
/// async fn main() -> usb_hotplug::Result<()> {
///     let detector = HotplugDetector::for_device(0x1050, 0x0407)?;
///     let mut events = detector.events();
///     detector.start()?;
///
///     while let Some(event) = events.recv().await {
///         println!("{event}");
///     }
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct HotplugDetector {
    inner: Arc<Inner>,
}

struct Inner {
    config: DetectorConfig,
    enumerator: Arc<dyn UsbEnumerator>,
    bus: EventBus,
    stats: Arc<Mutex<DetectorStats>>,
    trigger: PollTrigger,
    state: Arc<watch::Sender<DetectorState>>,
    shutdown: watch::Sender<bool>,
    suspend: Arc<watch::Sender<usize>>,
    /// Poll loop task; the lock also serializes start and stop.
    task: Mutex<Option<JoinHandle<()>>>,
}

impl HotplugDetector {
    /// Creates a detector using the platform's default backend.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoBackend`] if no backend supports this platform and
    /// [`Error::Value`] if the configuration is invalid.
    pub fn new(config: DetectorConfig) -> Result<Self> {
        Self::with_enumerator(config, default_enumerator()?)
    }

    /// Creates a detector using the given backend.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Value`] if the configuration is invalid.
    pub fn with_enumerator(config: DetectorConfig, enumerator: Arc<dyn UsbEnumerator>) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                enumerator,
                bus: EventBus::new(),
                stats: Arc::new(Mutex::new(DetectorStats::default())),
                trigger: PollTrigger::new(),
                state: Arc::new(watch::Sender::new(DetectorState::Idle)),
                shutdown: watch::Sender::new(false),
                suspend: Arc::new(watch::Sender::new(0)),
                task: Mutex::new(None),
            }),
        })
    }

    /// Creates a detector reporting every USB device.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoBackend`] if no backend supports this platform.
    pub fn any_device() -> Result<Self> {
        Self::new(DetectorConfig::new())
    }

    /// Creates a detector reporting devices with the given vendor and
    /// product IDs.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoBackend`] if no backend supports this platform.
    pub fn for_device(vendor_id: u16, product_id: u16) -> Result<Self> {
        Self::new(DetectorConfig::for_device(vendor_id, product_id))
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Starts scanning the bus.
    ///
    /// Spawns the poll loop on the current Tokio runtime, along with the
    /// backend's change watcher if it has one. Starting a running detector
    /// does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoRuntime`] when called outside a Tokio runtime and
    /// [`Error::InvalidState`] when the detector is stopping or stopped.
    pub fn start(&self) -> Result<()> {
        let mut task = self.inner.task.lock();

        match self.state() {
            DetectorState::Idle => {}
            DetectorState::Running => return Ok(()),
            state => {
                return Err(Error::InvalidState {
                    operation: "start",
                    state,
                });
            }
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|_| Error::NoRuntime)?;
        let inner = &self.inner;

        let watcher = inner
            .enumerator
            .spawn_change_watcher(inner.trigger.clone(), inner.config.settle_delay);

        let poll_loop = PollLoop {
            enumerator: Arc::clone(&inner.enumerator),
            filter: inner.config.filter.clone(),
            interval: inner.config.poll_interval,
            bus: inner.bus.clone(),
            stats: Arc::clone(&inner.stats),
            trigger: inner.trigger.clone(),
            shutdown: inner.shutdown.subscribe(),
            suspend: inner.suspend.subscribe(),
            state: Arc::clone(&inner.state),
            watcher,
        };

        *task = Some(runtime.spawn(poll_loop.run()));
        inner.state.send_replace(DetectorState::Running);

        tracing::info!(
            backend = inner.enumerator.name(),
            poll_interval = ?inner.config.poll_interval,
            filter = ?inner.config.filter,
            "Hotplug detector started"
        );
        Ok(())
    }

    /// Stops the detector.
    ///
    /// Waits for a scan in progress to be published, then ends every
    /// subscription. No detach events are emitted for the devices still
    /// attached. Stopping an idle detector makes it stopped without ever
    /// scanning. Calling `stop` again, or concurrently, waits for the same
    /// shutdown.
    pub async fn stop(&self) {
        let task = {
            let mut task = self.inner.task.lock();
            match self.state() {
                DetectorState::Idle => {
                    self.inner.bus.close();
                    self.inner.state.send_replace(DetectorState::Stopped);
                    tracing::info!("Hotplug detector stopped before starting");
                    return;
                }
                DetectorState::Running => {
                    self.inner.state.send_replace(DetectorState::Stopping);
                    task.take()
                }
                DetectorState::Stopping | DetectorState::Stopped => None,
            }
        };

        self.inner.shutdown.send_replace(true);

        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Poll loop ended abnormally");
                self.inner.bus.close();
                self.inner.state.send_replace(DetectorState::Stopped);
            }
            tracing::info!("Hotplug detector stopped");
        } else {
            let mut state = self.inner.state.subscribe();
            let _ = state.wait_for(|state| *state == DetectorState::Stopped).await;
        }
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> DetectorState {
        *self.inner.state.borrow()
    }

    // =========================================================================
    // Events
    // =========================================================================

    /// Subscribes to hotplug events.
    ///
    /// The subscription receives every event published from now on. Open it
    /// before [`start`](Self::start) to also see the devices that are already
    /// attached. On a stopped detector the subscription ends immediately.
    #[must_use]
    pub fn events(&self) -> Subscription {
        self.inner.bus.subscribe()
    }

    /// Returns the matching devices known right now together with a
    /// subscription to every later change.
    ///
    /// No event is lost or duplicated between the returned devices and the
    /// first event of the subscription.
    #[must_use]
    pub fn snapshot_and_events(&self) -> (Vec<UsbDevice>, Subscription) {
        self.inner.bus.subscribe_with_snapshot()
    }

    /// Returns the matching devices seen by the last successful scan.
    #[must_use]
    pub fn devices(&self) -> Vec<UsbDevice> {
        self.inner.bus.devices()
    }

    /// Streams the devices that get attached from now on.
    #[must_use]
    pub fn added_devices(&self) -> impl Stream<Item = UsbDevice> + Send + Unpin + use<> {
        self.events().attached_devices()
    }

    /// Streams the devices that get detached from now on.
    #[must_use]
    pub fn removed_devices(&self) -> impl Stream<Item = UsbDevice> + Send + Unpin + use<> {
        self.events().detached_devices()
    }

    /// Returns the number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.bus.subscriber_count()
    }

    // =========================================================================
    // Per-device workers
    // =========================================================================

    /// Runs `handler` for every matching device, with default supervisor
    /// options.
    ///
    /// See [`run_for_each_device_with`](Self::run_for_each_device_with).
    ///
    /// # Errors
    ///
    /// Same as [`run_for_each_device_with`](Self::run_for_each_device_with).
    pub async fn run_for_each_device<F, Fut, E>(&self, handler: F) -> Result<()>
    where
        F: FnMut(UsbDevice) -> Fut,
        Fut: Future<Output = std::result::Result<(), E>> + Send + 'static,
        E: Into<BoxError> + 'static,
    {
        self.run_for_each_device_with(SupervisorOptions::default(), handler)
            .await
    }

    /// Runs `handler` in its own task for every matching device while the
    /// device stays attached.
    ///
    /// Devices already attached get a worker immediately. The detector is
    /// started if it is idle. Resolves with `Ok(())` once the detector is
    /// stopped; dropping the returned future aborts every worker.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if the detector is stopping or
    /// stopped, any error from [`start`](Self::start), and
    /// [`Error::Worker`] when a worker fails under
    /// [`FailurePolicy::Propagate`](crate::FailurePolicy::Propagate).
    pub async fn run_for_each_device_with<F, Fut, E>(
        &self,
        options: SupervisorOptions,
        handler: F,
    ) -> Result<()>
    where
        F: FnMut(UsbDevice) -> Fut,
        Fut: Future<Output = std::result::Result<(), E>> + Send + 'static,
        E: Into<BoxError> + 'static,
    {
        match self.state() {
            DetectorState::Idle => self.start()?,
            DetectorState::Running => {}
            state => {
                return Err(Error::InvalidState {
                    operation: "run workers on",
                    state,
                });
            }
        }

        let (present, subscription) = self.snapshot_and_events();
        let events = stream::iter(present.into_iter().map(HotplugEvent::attached)).chain(subscription);

        DeviceSupervisor::new(options).run(events, handler).await
    }

    // =========================================================================
    // Scanning control
    // =========================================================================

    /// Requests an immediate scan.
    pub fn trigger_scan(&self) {
        self.inner.trigger.wake();
    }

    /// Suspends scanning until the returned guard is dropped.
    ///
    /// Guards nest: scanning resumes when the last one is dropped. The first
    /// scan after resuming reports every change that happened meanwhile.
    #[must_use = "scanning resumes as soon as the guard is dropped"]
    pub fn suspend(&self) -> SuspendGuard {
        self.inner.suspend.send_modify(|count| *count += 1);
        tracing::debug!("Hotplug detector suspended");
        SuspendGuard {
            suspend: Arc::clone(&self.inner.suspend),
        }
    }

    /// Returns `true` while at least one [`SuspendGuard`] is alive.
    #[must_use]
    pub fn is_suspended(&self) -> bool {
        *self.inner.suspend.borrow() > 0
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    /// Returns a copy of the scan counters.
    #[must_use]
    pub fn stats(&self) -> DetectorStats {
        self.inner.stats.lock().clone()
    }

    /// Returns the detector configuration.
    #[must_use]
    pub fn config(&self) -> &DetectorConfig {
        &self.inner.config
    }

    /// Returns the name of the enumeration backend.
    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        self.inner.enumerator.name()
    }
}

impl fmt::Debug for HotplugDetector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HotplugDetector")
            .field("backend", &self.inner.enumerator.name())
            .field("state", &self.state())
            .field("config", &self.inner.config)
            .field("subscribers", &self.subscriber_count())
            .finish_non_exhaustive()
    }
}

/// Keeps a detector's scanning suspended while alive.
///
/// Returned by [`HotplugDetector::suspend`].
#[derive(Debug)]
pub struct SuspendGuard {
    suspend: Arc<watch::Sender<usize>>,
}

impl Drop for SuspendGuard {
    fn drop(&mut self) {
        self.suspend.send_modify(|count| *count = count.saturating_sub(1));
        tracing::debug!("Hotplug detector suspension released");
    }
}
