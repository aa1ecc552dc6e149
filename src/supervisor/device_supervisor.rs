// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Runs one worker per attached device.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::{FutureExt, Stream, StreamExt};
use tokio::task::{JoinError, JoinSet};

use crate::device::{DeviceKey, UsbDevice};
use crate::error::{BoxError, Error, Result, WorkerError};
use crate::event::{HotplugEvent, HotplugEventKind};

use super::session::SessionRegistry;
use super::{FailurePolicy, SupervisorOptions};

/// Result reported by a worker task when it returns on its own.
struct WorkerExit {
    key: DeviceKey,
    generation: u64,
    outcome: std::result::Result<(), WorkerError>,
}

/// Starts a worker task for every attached device and cancels it when the
/// device goes away.
///
/// The supervisor consumes a stream of [`HotplugEvent`]s, usually a
/// [`Subscription`](crate::Subscription), and calls the handler once per
/// device session. Workers are Tokio tasks owned by the supervisor: when
/// [`run`](Self::run) returns, or its future is dropped, every remaining
/// worker is aborted.
///
/// # Examples
///
/// ```no_run
/// use usb_hotplug::{DeviceSupervisor, HotplugDetector, SupervisorOptions, UsbDevice};
///
/// # async fn example() -> usb_hotplug::Result<()> {
/// let detector = HotplugDetector::for_device(0x1050, 0x0407)?;
/// detector.start()?;
///
/// DeviceSupervisor::new(SupervisorOptions::default())
///     .run(detector.events(), |device: UsbDevice| async move {
///         println!("serving {device}");
///         Ok::<_, std::io::Error>(())
///     })
///     .await
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct DeviceSupervisor {
    options: SupervisorOptions,
}

impl DeviceSupervisor {
    /// Creates a supervisor with the given options.
    #[must_use]
    pub fn new(options: SupervisorOptions) -> Self {
        Self { options }
    }

    /// Returns the supervisor options.
    #[must_use]
    pub fn options(&self) -> &SupervisorOptions {
        &self.options
    }

    /// Supervises workers until `events` ends.
    ///
    /// `handler` is called with the device descriptor on every accepted
    /// Attached event that needs a new worker; the future it returns is
    /// spawned on the current runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Worker`] when a worker fails and the failure policy
    /// is [`FailurePolicy::Propagate`]. Every other worker is aborted first.
    pub async fn run<S, F, Fut, E>(self, mut events: S, mut handler: F) -> Result<()>
    where
        S: Stream<Item = HotplugEvent> + Unpin,
        F: FnMut(UsbDevice) -> Fut,
        Fut: Future<Output = std::result::Result<(), E>> + Send + 'static,
        E: Into<BoxError> + 'static,
    {
        let mut sessions = SessionRegistry::new();
        let mut workers: JoinSet<WorkerExit> = JoinSet::new();

        loop {
            tokio::select! {
                event = events.next() => match event {
                    Some(event) => self.dispatch(event, &mut sessions, &mut workers, &mut handler),
                    None => break,
                },
                Some(joined) = workers.join_next(), if !workers.is_empty() => {
                    if let Some(failure) = self.reap(joined, &mut sessions) {
                        tracing::debug!(workers = workers.len(), "Aborting remaining workers");
                        workers.shutdown().await;
                        return Err(Error::Worker(failure));
                    }
                }
            }
        }

        tracing::debug!(workers = sessions.len(), "Event stream ended, stopping workers");
        workers.shutdown().await;
        Ok(())
    }

    fn dispatch<F, Fut, E>(
        &self,
        event: HotplugEvent,
        sessions: &mut SessionRegistry,
        workers: &mut JoinSet<WorkerExit>,
        handler: &mut F,
    ) where
        F: FnMut(UsbDevice) -> Fut,
        Fut: Future<Output = std::result::Result<(), E>> + Send + 'static,
        E: Into<BoxError> + 'static,
    {
        let key = event.key();
        match event.kind() {
            HotplugEventKind::Attached => {
                let device = event.into_device();
                if !self.options.accepts(&device) {
                    tracing::trace!(%device, "Device rejected by predicate");
                    return;
                }

                if sessions.contains(&key) {
                    if !self.options.is_cancellable() {
                        tracing::debug!(%device, "Worker still running, not starting another");
                        return;
                    }
                    tracing::debug!(%device, "Replacing stale worker");
                    sessions.cancel(&key);
                }

                let generation = sessions.next_generation();
                let worker = handler(device.clone());
                let abort = workers.spawn(run_worker(key.clone(), generation, device.clone(), worker));
                tracing::debug!(%device, generation, "Worker started");
                sessions.insert(key, generation, device, abort);
            }
            HotplugEventKind::Detached => {
                if !self.options.is_cancellable() {
                    return;
                }
                if let Some(device) = sessions.cancel(&key) {
                    tracing::debug!(%device, "Device detached, worker cancelled");
                }
            }
        }
    }

    /// Handles a finished worker. Returns the failure to propagate, if any.
    fn reap(
        &self,
        joined: std::result::Result<WorkerExit, JoinError>,
        sessions: &mut SessionRegistry,
    ) -> Option<WorkerError> {
        // Aborted workers were already removed from the registry.
        let exit = match joined {
            Ok(exit) => exit,
            Err(e) if e.is_cancelled() => return None,
            Err(e) => {
                tracing::warn!(error = %e, "Worker task failed to join");
                return None;
            }
        };

        sessions.finish(&exit.key, exit.generation);

        match exit.outcome {
            Ok(()) => {
                tracing::debug!(key = %exit.key, "Worker finished");
                None
            }
            Err(failure) => match self.options.failure_policy() {
                FailurePolicy::LogAndContinue => {
                    tracing::warn!(error = %failure, "Worker failed");
                    None
                }
                FailurePolicy::Propagate => Some(failure),
            },
        }
    }
}

/// Drives one worker, turning errors and panics into a [`WorkerError`].
async fn run_worker<Fut, E>(key: DeviceKey, generation: u64, device: UsbDevice, worker: Fut) -> WorkerExit
where
    Fut: Future<Output = std::result::Result<(), E>> + Send + 'static,
    E: Into<BoxError> + 'static,
{
    let outcome = match AssertUnwindSafe(worker).catch_unwind().await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(WorkerError::Failed {
            device,
            source: e.into(),
        }),
        Err(payload) => Err(WorkerError::Panicked {
            device,
            message: panic_message(payload.as_ref()),
        }),
    };

    WorkerExit {
        key,
        generation,
        outcome,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use futures::channel::mpsc;
    use parking_lot::Mutex;
    use tokio::sync::oneshot;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn device(address: u8) -> UsbDevice {
        UsbDevice::new(0x1050, 0x0407, "1", address)
    }

    /// Counts worker starts and teardowns per device address.
    #[derive(Clone, Default)]
    struct Counters {
        started: Arc<Mutex<HashMap<u8, usize>>>,
        stopped: Arc<Mutex<HashMap<u8, usize>>>,
    }

    impl Counters {
        fn started(&self, address: u8) -> usize {
            self.started.lock().get(&address).copied().unwrap_or(0)
        }

        fn stopped(&self, address: u8) -> usize {
            self.stopped.lock().get(&address).copied().unwrap_or(0)
        }

        /// Worker that runs until cancelled and records its teardown.
        fn worker(&self, device: UsbDevice) -> impl Future<Output = std::result::Result<(), BoxError>> + Send + use<> {
            *self.started.lock().entry(device.address()).or_default() += 1;
            let guard = StopGuard {
                address: device.address(),
                stopped: Arc::clone(&self.stopped),
            };
            async move {
                let _guard = guard;
                std::future::pending::<()>().await;
                Ok(())
            }
        }

        async fn wait_stopped(&self, address: u8, count: usize) {
            tokio::time::timeout(TIMEOUT, async {
                while self.stopped(address) < count {
                    tokio::time::sleep(Duration::from_millis(1)).await;
                }
            })
            .await
            .expect("worker was not torn down");
        }

        async fn wait_started(&self, address: u8, count: usize) {
            tokio::time::timeout(TIMEOUT, async {
                while self.started(address) < count {
                    tokio::time::sleep(Duration::from_millis(1)).await;
                }
            })
            .await
            .expect("worker was not started");
        }
    }

    struct StopGuard {
        address: u8,
        stopped: Arc<Mutex<HashMap<u8, usize>>>,
    }

    impl Drop for StopGuard {
        fn drop(&mut self) {
            *self.stopped.lock().entry(self.address).or_default() += 1;
        }
    }

    fn spawn_supervisor(
        options: SupervisorOptions,
        counters: &Counters,
    ) -> (mpsc::UnboundedSender<HotplugEvent>, tokio::task::JoinHandle<Result<()>>) {
        let (tx, rx) = mpsc::unbounded();
        let counters = counters.clone();
        let task = tokio::spawn(DeviceSupervisor::new(options).run(rx, move |device| counters.worker(device)));
        (tx, task)
    }

    #[tokio::test]
    async fn one_worker_per_session() {
        let counters = Counters::default();
        let (tx, task) = spawn_supervisor(SupervisorOptions::default(), &counters);

        tx.unbounded_send(HotplugEvent::attached(device(1))).unwrap();
        counters.wait_started(1, 1).await;
        tx.unbounded_send(HotplugEvent::detached(device(1))).unwrap();
        counters.wait_stopped(1, 1).await;

        tx.unbounded_send(HotplugEvent::attached(device(1))).unwrap();
        counters.wait_started(1, 2).await;
        tx.unbounded_send(HotplugEvent::detached(device(1))).unwrap();
        counters.wait_stopped(1, 2).await;

        drop(tx);
        tokio::time::timeout(TIMEOUT, task).await.unwrap().unwrap().unwrap();
        assert_eq!(counters.started(1), 2);
        assert_eq!(counters.stopped(1), 2);
    }

    #[tokio::test]
    async fn detach_of_one_device_leaves_others_running() {
        let counters = Counters::default();
        let (tx, task) = spawn_supervisor(SupervisorOptions::default(), &counters);

        for address in 1..=3 {
            tx.unbounded_send(HotplugEvent::attached(device(address))).unwrap();
        }
        for address in 1..=3 {
            counters.wait_started(address, 1).await;
        }

        tx.unbounded_send(HotplugEvent::detached(device(2))).unwrap();
        counters.wait_stopped(2, 1).await;
        assert_eq!(counters.stopped(1), 0);
        assert_eq!(counters.stopped(3), 0);

        drop(tx);
        tokio::time::timeout(TIMEOUT, task).await.unwrap().unwrap().unwrap();
        assert_eq!(counters.stopped(1), 1);
        assert_eq!(counters.stopped(3), 1);
    }

    #[tokio::test]
    async fn repeated_attach_replaces_worker_when_cancellable() {
        let counters = Counters::default();
        let (tx, task) = spawn_supervisor(SupervisorOptions::default(), &counters);

        tx.unbounded_send(HotplugEvent::attached(device(1))).unwrap();
        tx.unbounded_send(HotplugEvent::attached(device(1))).unwrap();
        counters.wait_started(1, 2).await;
        counters.wait_stopped(1, 1).await;

        drop(tx);
        tokio::time::timeout(TIMEOUT, task).await.unwrap().unwrap().unwrap();
        assert_eq!(counters.stopped(1), 2);
    }

    #[tokio::test]
    async fn non_cancellable_workers_outlive_detach() {
        let (tx, rx) = mpsc::unbounded();
        let (release_tx, release_rx) = oneshot::channel::<()>();
        let release_rx = Arc::new(Mutex::new(Some(release_rx)));
        let starts = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicUsize::new(0));

        let handler = {
            let starts = Arc::clone(&starts);
            let finished = Arc::clone(&finished);
            move |_device: UsbDevice| {
                starts.fetch_add(1, Ordering::SeqCst);
                let release = release_rx.lock().take();
                let finished = Arc::clone(&finished);
                async move {
                    if let Some(release) = release {
                        let _ = release.await;
                    }
                    finished.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, BoxError>(())
                }
            }
        };

        let options = SupervisorOptions::new().cancellable(false);
        let task = tokio::spawn(DeviceSupervisor::new(options).run(rx, handler));

        tx.unbounded_send(HotplugEvent::attached(device(1))).unwrap();
        tx.unbounded_send(HotplugEvent::detached(device(1))).unwrap();
        // Still running, so the re-attach does not start a second worker.
        tx.unbounded_send(HotplugEvent::attached(device(1))).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(starts.load(Ordering::SeqCst), 1);
        assert_eq!(finished.load(Ordering::SeqCst), 0);

        release_tx.send(()).unwrap();
        tokio::time::timeout(TIMEOUT, async {
            while finished.load(Ordering::SeqCst) < 1 {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .unwrap();

        // The session ended with the worker, so a new attach starts again.
        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.unbounded_send(HotplugEvent::attached(device(1))).unwrap();
        tokio::time::timeout(TIMEOUT, async {
            while starts.load(Ordering::SeqCst) < 2 {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .unwrap();

        drop(tx);
        tokio::time::timeout(TIMEOUT, task).await.unwrap().unwrap().unwrap();
    }

    #[tokio::test]
    async fn predicate_prevents_worker_start() {
        let counters = Counters::default();
        let options = SupervisorOptions::new().with_predicate(|d| d.address() != 2);
        let (tx, task) = spawn_supervisor(options, &counters);

        tx.unbounded_send(HotplugEvent::attached(device(1))).unwrap();
        tx.unbounded_send(HotplugEvent::attached(device(2))).unwrap();
        counters.wait_started(1, 1).await;

        drop(tx);
        tokio::time::timeout(TIMEOUT, task).await.unwrap().unwrap().unwrap();
        assert_eq!(counters.started(2), 0);
    }

    #[tokio::test]
    async fn failure_is_logged_and_supervision_continues() {
        let (tx, rx) = mpsc::unbounded();
        let counters = Counters::default();
        let handler = {
            let counters = counters.clone();
            move |device: UsbDevice| {
                let fails = device.address() == 1;
                let worker = counters.worker(device);
                async move {
                    if fails {
                        return Err::<(), BoxError>("boom".into());
                    }
                    worker.await
                }
            }
        };

        let task = tokio::spawn(DeviceSupervisor::default().run(rx, handler));
        tx.unbounded_send(HotplugEvent::attached(device(1))).unwrap();
        tx.unbounded_send(HotplugEvent::attached(device(2))).unwrap();
        counters.wait_stopped(1, 1).await;

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(counters.stopped(2), 0);

        drop(tx);
        tokio::time::timeout(TIMEOUT, task).await.unwrap().unwrap().unwrap();
    }

    #[tokio::test]
    async fn propagate_policy_returns_failure_and_stops_others() {
        let (tx, rx) = mpsc::unbounded();
        let counters = Counters::default();
        let handler = {
            let counters = counters.clone();
            move |device: UsbDevice| {
                let fails = device.address() == 2;
                let worker = counters.worker(device);
                async move {
                    if fails {
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        return Err::<(), BoxError>("boom".into());
                    }
                    worker.await
                }
            }
        };

        let options = SupervisorOptions::new().with_failure_policy(FailurePolicy::Propagate);
        let task = tokio::spawn(DeviceSupervisor::new(options).run(rx, handler));
        tx.unbounded_send(HotplugEvent::attached(device(1))).unwrap();
        tx.unbounded_send(HotplugEvent::attached(device(2))).unwrap();

        let result = tokio::time::timeout(TIMEOUT, task).await.unwrap().unwrap();
        match result {
            Err(Error::Worker(WorkerError::Failed { device: failed, source })) => {
                assert_eq!(failed, device(2));
                assert_eq!(source.to_string(), "boom");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(counters.stopped(1), 1);
    }

    #[tokio::test]
    async fn panicking_worker_is_isolated() {
        let (tx, rx) = mpsc::unbounded();
        let counters = Counters::default();
        let handler = {
            let counters = counters.clone();
            move |device: UsbDevice| {
                let panics = device.address() == 1;
                let worker = counters.worker(device);
                async move {
                    assert!(!panics, "worker exploded");
                    worker.await
                }
            }
        };

        let options = SupervisorOptions::new().with_failure_policy(FailurePolicy::Propagate);
        let task = tokio::spawn(DeviceSupervisor::new(options).run(rx, handler));
        tx.unbounded_send(HotplugEvent::attached(device(1))).unwrap();

        let result = tokio::time::timeout(TIMEOUT, task).await.unwrap().unwrap();
        match result {
            Err(Error::Worker(WorkerError::Panicked { device: failed, message })) => {
                assert_eq!(failed, device(1));
                assert_eq!(message, "worker exploded");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn finished_worker_does_not_remove_newer_session() {
        let (tx, rx) = mpsc::unbounded();
        let calls = Arc::new(AtomicUsize::new(0));
        let counters = Counters::default();
        let handler = {
            let calls = Arc::clone(&calls);
            let counters = counters.clone();
            move |device: UsbDevice| {
                // The first worker returns immediately, the second one stays.
                let first = calls.fetch_add(1, Ordering::SeqCst) == 0;
                let worker = counters.worker(device);
                async move {
                    if first {
                        return Ok(());
                    }
                    worker.await
                }
            }
        };

        let task = tokio::spawn(DeviceSupervisor::default().run(rx, handler));
        tx.unbounded_send(HotplugEvent::attached(device(1))).unwrap();
        counters.wait_stopped(1, 1).await;
        tx.unbounded_send(HotplugEvent::attached(device(1))).unwrap();
        counters.wait_started(1, 2).await;

        tx.unbounded_send(HotplugEvent::detached(device(1))).unwrap();
        counters.wait_stopped(1, 2).await;

        drop(tx);
        tokio::time::timeout(TIMEOUT, task).await.unwrap().unwrap().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn panic_message_formats() {
        let payload: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(payload.as_ref()), "static");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
