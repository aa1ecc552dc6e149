// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Subscriber side of the event bus.

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use futures::StreamExt;
use futures::future;
use tokio::sync::mpsc;

use crate::device::UsbDevice;

use super::HotplugEvent;

/// Unique identifier for a subscription.
///
/// IDs are unique within one event bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Creates a new subscription ID with the given value.
    #[must_use]
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sub({})", self.0)
    }
}

/// One consumer's view of the hotplug event stream.
///
/// A subscription receives every event published after it was opened, in
/// publication order, through its own unbounded queue: a slow subscription
/// never causes another one to miss events. The stream ends when the detector
/// stops. Dropping the subscription (or calling [`close`](Self::close))
/// detaches it from the bus without affecting anyone else.
///
/// `Subscription` implements [`Stream`], so it can be used with
/// [`StreamExt`] combinators as well as with [`recv`](Self::recv).
///
/// # Examples
///
/// ```
/// use usb_hotplug::event::EventBus;
///
/// # #[tokio::main]
/// # async fn main() {
/// let bus = EventBus::new();
/// let mut subscription = bus.subscribe();
///
/// bus.close();
/// assert!(subscription.recv().await.is_none());
/// # }
/// ```
pub struct Subscription {
    id: SubscriptionId,
    receiver: mpsc::UnboundedReceiver<HotplugEvent>,
}

impl Subscription {
    pub(crate) fn new(id: SubscriptionId, receiver: mpsc::UnboundedReceiver<HotplugEvent>) -> Self {
        Self { id, receiver }
    }

    /// Returns the ID of this subscription.
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Waits for the next event.
    ///
    /// Returns `None` once the detector has stopped and every buffered event
    /// has been consumed.
    pub async fn recv(&mut self) -> Option<HotplugEvent> {
        self.receiver.recv().await
    }

    /// Returns the next buffered event without waiting.
    pub fn try_recv(&mut self) -> Option<HotplugEvent> {
        self.receiver.try_recv().ok()
    }

    /// Returns the number of events waiting in this subscription's queue.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }

    /// Stops delivery to this subscription.
    ///
    /// Events already buffered can still be received.
    pub fn close(&mut self) {
        self.receiver.close();
    }

    /// Converts the subscription into a stream of attached devices only.
    pub fn attached_devices(self) -> impl Stream<Item = UsbDevice> + Send + Unpin {
        self.filter_map(|event| {
            future::ready(event.is_attached().then(|| event.into_device()))
        })
    }

    /// Converts the subscription into a stream of detached devices only.
    pub fn detached_devices(self) -> impl Stream<Item = UsbDevice> + Send + Unpin {
        self.filter_map(|event| {
            future::ready(event.is_detached().then(|| event.into_device()))
        })
    }
}

impl Stream for Subscription {
    type Item = HotplugEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("pending", &self.receiver.len())
            .finish_non_exhaustive()
    }
}
