use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use crate::types::Viewport;

type Inbox = Rc<Cell<Option<Viewport>>>;

#[derive(Default)]
struct BusInner {
    next_id: u64,
    listeners: BTreeMap<u64, Inbox>,
}

/// Process-wide source of viewport change notifications.
///
/// Cloning the bus yields another handle to the same listener table. Each
/// listener receives the most recent viewport published since it last looked;
/// the listener is deregistered when its [`Subscription`] drops.
#[derive(Clone, Default)]
pub struct ViewportBus {
    inner: Rc<RefCell<BusInner>>,
}

impl ViewportBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Subscription {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_id;
        inner.next_id += 1;
        let inbox: Inbox = Rc::new(Cell::new(None));
        inner.listeners.insert(id, inbox.clone());
        tracing::trace!(listener = id, "viewport listener registered");
        Subscription {
            id,
            inbox,
            bus: Rc::downgrade(&self.inner),
        }
    }

    pub fn publish(&self, viewport: Viewport) {
        let inner = self.inner.borrow();
        for inbox in inner.listeners.values() {
            inbox.set(Some(viewport));
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner.borrow().listeners.len()
    }
}

/// Registration of one listener on a [`ViewportBus`]; deregisters on drop.
pub struct Subscription {
    id: u64,
    inbox: Inbox,
    bus: Weak<RefCell<BusInner>>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Takes the pending viewport change, if one arrived since the last call.
    pub fn take(&self) -> Option<Viewport> {
        self.inbox.take()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.borrow_mut().listeners.remove(&self.id);
            tracing::trace!(listener = self.id, "viewport listener removed");
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscriptions_register_and_release() {
        let bus = ViewportBus::new();
        let first = bus.subscribe();
        let second = bus.subscribe();
        assert_ne!(first.id(), second.id());
        assert_eq!(bus.listener_count(), 2);
        drop(first);
        assert_eq!(bus.listener_count(), 1);
        drop(second);
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn listeners_see_only_the_latest_viewport() {
        let bus = ViewportBus::new();
        let subscription = bus.subscribe();
        assert_eq!(subscription.take(), None);
        bus.publish(Viewport::new(640.0, 480.0, 1.0));
        bus.publish(Viewport::new(1024.0, 768.0, 2.0));
        assert_eq!(subscription.take(), Some(Viewport::new(1024.0, 768.0, 2.0)));
        assert_eq!(subscription.take(), None);
    }

    #[test]
    fn late_subscribers_start_empty() {
        let bus = ViewportBus::new();
        bus.publish(Viewport::new(640.0, 480.0, 1.0));
        let subscription = bus.subscribe();
        assert_eq!(subscription.take(), None);
    }

    #[test]
    fn subscription_outliving_bus_drops_cleanly() {
        let subscription = ViewportBus::new().subscribe();
        drop(subscription);
    }
}
