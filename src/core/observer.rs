use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use parking_lot::RwLock;
use super::traits::TaskObserver;
use super::types::UploadTask;

/// Typed observer list. Every observer sees every task change.
#[derive(Default)]
pub(crate) struct ObserverRegistry {
    next_id: AtomicU64,
    observers: RwLock<Vec<(u64, Arc<dyn TaskObserver>)>>,
}

impl ObserverRegistry {
    pub fn register(self: &Arc<Self>, observer: Arc<dyn TaskObserver>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.observers.write().push((id, observer));

        Subscription {
            id,
            registry: Arc::downgrade(self),
        }
    }

    fn remove(&self, id: u64) -> bool {
        let mut observers = self.observers.write();
        let before = observers.len();
        observers.retain(|(observer_id, _)| *observer_id != id);
        observers.len() != before
    }

    pub fn len(&self) -> usize {
        self.observers.read().len()
    }

    pub fn notify(&self, task: &UploadTask) {
        // Observers run outside the lock so they may unsubscribe themselves
        let observers: Vec<_> = self
            .observers
            .read()
            .iter()
            .map(|(_, observer)| observer.clone())
            .collect();

        for observer in observers {
            observer.on_task_changed(task);
        }
    }
}

/// Disposer returned by `UploadQueue::subscribe`.
///
/// Dropping it keeps the observer registered; call `unsubscribe` to remove it.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    registry: Weak<ObserverRegistry>,
}

impl Subscription {
    /// Returns false if the observer was already gone.
    pub fn unsubscribe(self) -> bool {
        match self.registry.upgrade() {
            Some(registry) => registry.remove(self.id),
            None => false,
        }
    }
}

impl std::fmt::Debug for ObserverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverRegistry")
            .field("observers", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use super::*;
    use crate::core::types::FilePayload;

    fn sample() -> UploadTask {
        UploadTask::new("order-7", "cellar", FilePayload::new("c.png", "image/png", vec![1u8]))
    }

    #[test]
    fn test_every_observer_is_notified() {
        let registry = Arc::new(ObserverRegistry::default());
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let counter = first.clone();
        registry.register(Arc::new(move |_: &UploadTask| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        let counter = second.clone();
        registry.register(Arc::new(move |_: &UploadTask| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        registry.notify(&sample());
        registry.notify(&sample());

        assert_eq!(first.load(Ordering::SeqCst), 2);
        assert_eq!(second.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unsubscribe_stops_notifications() {
        let registry = Arc::new(ObserverRegistry::default());
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = calls.clone();
        let subscription = registry.register(Arc::new(move |_: &UploadTask| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        registry.notify(&sample());
        assert!(subscription.unsubscribe());
        registry.notify(&sample());

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_unsubscribe_after_registry_dropped() {
        let registry = Arc::new(ObserverRegistry::default());
        let subscription = registry.register(Arc::new(|_: &UploadTask| {}));
        drop(registry);

        assert!(!subscription.unsubscribe());
    }
}
