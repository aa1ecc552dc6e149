// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Event bus fanning hotplug events out to subscriptions.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::device::UsbDevice;

use super::{HotplugEvent, Snapshot, Subscription, SubscriptionId};

/// Event bus for delivering hotplug events to multiple subscribers.
///
/// Every subscriber owns an unbounded queue, and each published event is
/// cloned into every queue. Nothing is ever dropped for a slow subscriber and
/// no subscriber can delay another. Alongside the events the bus keeps the
/// snapshot they were computed from, updated under the same lock, so a new
/// subscriber can read the current devices and subscribe in one atomic step.
///
/// # Examples
///
/// ```
/// use usb_hotplug::event::{EventBus, HotplugEvent, Snapshot};
/// use usb_hotplug::UsbDevice;
///
/// let bus = EventBus::new();
///
/// let mut rx1 = bus.subscribe();
/// let mut rx2 = bus.subscribe();
///
/// let device = UsbDevice::new(0x1050, 0x0407, "1", 2);
/// let snapshot = Snapshot::from(vec![device.clone()]);
/// bus.publish(&snapshot, &[HotplugEvent::attached(device.clone())]);
///
/// assert_eq!(rx1.try_recv(), Some(HotplugEvent::attached(device.clone())));
/// assert_eq!(rx2.try_recv(), Some(HotplugEvent::attached(device)));
/// ```
#[derive(Debug, Clone, Default)]
pub struct EventBus {
    state: Arc<Mutex<BusState>>,
}

#[derive(Debug, Default)]
struct BusState {
    subscribers: Vec<Subscriber>,
    snapshot: Snapshot,
    next_id: u64,
    closed: bool,
}

#[derive(Debug)]
struct Subscriber {
    id: SubscriptionId,
    sender: mpsc::UnboundedSender<HotplugEvent>,
}

impl BusState {
    fn open_subscription(&mut self) -> Subscription {
        self.next_id += 1;
        let id = SubscriptionId::new(self.next_id);
        let (sender, receiver) = mpsc::unbounded_channel();

        // A closed bus hands out subscriptions that are already finished.
        if !self.closed {
            self.subscribers.push(Subscriber { id, sender });
            tracing::debug!(subscription = %id, "Subscription opened");
        }

        Subscription::new(id, receiver)
    }
}

impl EventBus {
    /// Creates a new, open event bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to hotplug events.
    ///
    /// The subscription receives all events published after it is created.
    /// On a closed bus the subscription ends immediately.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        self.state.lock().open_subscription()
    }

    /// Returns the current devices together with a new subscription.
    ///
    /// Both are taken under the same lock as [`publish`](Self::publish), so
    /// every change after the returned snapshot is delivered to the
    /// subscription and none before it is.
    #[must_use]
    pub fn subscribe_with_snapshot(&self) -> (Vec<UsbDevice>, Subscription) {
        let mut state = self.state.lock();
        let devices = state.snapshot.devices().to_vec();
        (devices, state.open_subscription())
    }

    /// Returns the devices of the last published snapshot.
    #[must_use]
    pub fn devices(&self) -> Vec<UsbDevice> {
        self.state.lock().snapshot.devices().to_vec()
    }

    /// Returns the number of subscriptions that are still listening.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.state
            .lock()
            .subscribers
            .iter()
            .filter(|subscriber| !subscriber.sender.is_closed())
            .count()
    }

    /// Publishes the result of one scan.
    ///
    /// Stores `snapshot` as the current device list and delivers `events`, in
    /// order, to every live subscription. Subscriptions that were dropped or
    /// closed are removed. Returns the number of subscriptions the events were
    /// delivered to; publishing on a closed bus does nothing and returns 0.
    pub fn publish(&self, snapshot: &Snapshot, events: &[HotplugEvent]) -> usize {
        let mut state = self.state.lock();
        if state.closed {
            return 0;
        }

        state.snapshot = snapshot.clone();
        state.subscribers.retain(|subscriber| {
            let delivered = events
                .iter()
                .all(|event| subscriber.sender.send(event.clone()).is_ok());
            if !delivered || subscriber.sender.is_closed() {
                tracing::debug!(subscription = %subscriber.id, "Subscription dropped");
                return false;
            }
            true
        });

        state.subscribers.len()
    }

    /// Closes the bus.
    ///
    /// Every subscription sees the end of its stream after draining the events
    /// already queued. Later publishes are ignored and later subscriptions end
    /// immediately.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        state.subscribers.clear();
    }

    /// Returns `true` if the bus has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(address: u8) -> UsbDevice {
        UsbDevice::new(0x1050, 0x0407, "1", address)
    }

    fn attach(bus: &EventBus, devices: &[UsbDevice]) -> usize {
        let events: Vec<_> = devices.iter().cloned().map(HotplugEvent::attached).collect();
        bus.publish(&devices.iter().cloned().collect(), &events)
    }

    #[test]
    fn new_bus_has_no_subscribers() {
        let bus = EventBus::new();
        assert_eq!(bus.subscriber_count(), 0);
        assert!(!bus.is_closed());
    }

    #[test]
    fn subscribe_increments_count() {
        let bus = EventBus::new();

        let _rx1 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        let _rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[test]
    fn drop_subscriber_decrements_count() {
        let bus = EventBus::new();

        let rx1 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        drop(rx1);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn subscription_ids_are_unique() {
        let bus = EventBus::new();
        let a = bus.subscribe();
        let b = bus.subscribe();
        assert_ne!(a.id(), b.id());
    }

    #[tokio::test]
    async fn publish_delivers_to_multiple_subscribers_in_order() {
        let bus = EventBus::new();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        attach(&bus, &[device(1), device(2)]);

        for rx in [&mut rx1, &mut rx2] {
            assert_eq!(rx.recv().await, Some(HotplugEvent::attached(device(1))));
            assert_eq!(rx.recv().await, Some(HotplugEvent::attached(device(2))));
        }
    }

    #[test]
    fn slow_subscriber_does_not_lose_events() {
        let bus = EventBus::new();
        let mut slow = bus.subscribe();
        let mut fast = bus.subscribe();

        for address in 0..100 {
            attach(&bus, &[device(address)]);
            assert_eq!(fast.try_recv(), Some(HotplugEvent::attached(device(address))));
        }

        assert_eq!(slow.pending(), 100);
        for address in 0..100 {
            assert_eq!(slow.try_recv(), Some(HotplugEvent::attached(device(address))));
        }
    }

    #[test]
    fn late_subscriber_sees_only_future_events() {
        let bus = EventBus::new();
        attach(&bus, &[device(1)]);

        let mut late = bus.subscribe();
        assert!(late.try_recv().is_none());

        attach(&bus, &[device(1), device(2)]);
        assert!(late.try_recv().is_some());
    }

    #[test]
    fn publish_returns_live_subscriber_count() {
        let bus = EventBus::new();
        let _rx1 = bus.subscribe();
        let rx2 = bus.subscribe();
        drop(rx2);

        assert_eq!(attach(&bus, &[device(1)]), 1);
    }

    #[test]
    fn publish_without_subscribers_updates_snapshot() {
        let bus = EventBus::new();
        assert_eq!(attach(&bus, &[device(1)]), 0);
        assert_eq!(bus.devices(), vec![device(1)]);
    }

    #[test]
    fn subscribe_with_snapshot_is_consistent() {
        let bus = EventBus::new();
        attach(&bus, &[device(1)]);

        let (devices, mut sub) = bus.subscribe_with_snapshot();
        assert_eq!(devices, vec![device(1)]);
        assert!(sub.try_recv().is_none());

        let snapshot: Snapshot = vec![device(1), device(2)].into();
        bus.publish(&snapshot, &[HotplugEvent::attached(device(2))]);
        assert_eq!(sub.try_recv(), Some(HotplugEvent::attached(device(2))));
    }

    #[tokio::test]
    async fn close_ends_every_subscription() {
        let bus = EventBus::new();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        attach(&bus, &[device(1)]);
        bus.close();

        assert!(bus.is_closed());
        assert_eq!(rx1.recv().await, Some(HotplugEvent::attached(device(1))));
        assert_eq!(rx1.recv().await, None);
        assert_eq!(rx2.recv().await, Some(HotplugEvent::attached(device(1))));
        assert_eq!(rx2.recv().await, None);
    }

    #[tokio::test]
    async fn closed_bus_ignores_publish_and_new_subscribers() {
        let bus = EventBus::new();
        bus.close();

        let mut sub = bus.subscribe();
        assert_eq!(attach(&bus, &[device(1)]), 0);
        assert_eq!(sub.recv().await, None);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn clone_shares_same_bus() {
        let bus1 = EventBus::new();
        let bus2 = bus1.clone();

        let _rx = bus1.subscribe();
        assert_eq!(bus2.subscriber_count(), 1);
    }
}
