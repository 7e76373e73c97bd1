//! Listener bus for row-arrival notifications.
//!
//! Every table variant owns a [`ListenerRegistry`] and fans each published
//! annotation out to all current subscribers on the publishing thread.

use std::sync::Arc;

use parking_lot::RwLock;

/// Subscriber notified when rows arrive in a table model.
///
/// Callbacks run synchronously on the publishing thread and are expected to
/// perform only cheap state updates.
pub trait AnnotationListener<A>: Send + Sync {
    /// Called once per newly indexed annotation.
    fn annotation_added(&self, annotation: &Arc<A>);

    /// Called for a batch arrival. The default forwards each element to
    /// [`annotation_added`](Self::annotation_added).
    fn annotations_added(&self, annotations: &[Arc<A>]) {
        for annotation in annotations {
            self.annotation_added(annotation);
        }
    }
}

/// Registry of the listeners subscribed to one table.
///
/// Fan-out iterates over a snapshot of the subscriber list, so a listener
/// that registers another listener from inside its own callback cannot
/// invalidate an iteration in progress.
pub struct ListenerRegistry<A> {
    listeners: RwLock<Vec<Arc<dyn AnnotationListener<A>>>>,
}

impl<A> ListenerRegistry<A> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Registers `listener` and immediately replays `current` to it, so a
    /// late subscriber observes every row that already exists before any
    /// subsequently published one.
    pub fn subscribe(&self, listener: Arc<dyn AnnotationListener<A>>, current: &[Arc<A>]) {
        self.listeners.write().push(listener.clone());
        if !current.is_empty() {
            listener.annotations_added(current);
        }
    }

    /// Notifies every currently subscribed listener of one arrival.
    pub fn notify_added(&self, annotation: &Arc<A>) {
        for listener in self.snapshot() {
            listener.annotation_added(annotation);
        }
    }

    /// Returns the current subscriber list as an owned snapshot.
    pub fn snapshot(&self) -> Vec<Arc<dyn AnnotationListener<A>>> {
        self.listeners.read().clone()
    }

    /// Number of subscribed listeners.
    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    /// Returns true if no listener is subscribed.
    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }
}

impl<A> Default for ListenerRegistry<A> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingListener {
        count: AtomicUsize,
    }

    impl CountingListener {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                count: AtomicUsize::new(0),
            })
        }
    }

    impl AnnotationListener<String> for CountingListener {
        fn annotation_added(&self, _annotation: &Arc<String>) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_notify_reaches_all_listeners() {
        let registry = ListenerRegistry::new();
        let first = CountingListener::new();
        let second = CountingListener::new();
        registry.subscribe(first.clone(), &[]);
        registry.subscribe(second.clone(), &[]);

        registry.notify_added(&Arc::new("a".to_string()));

        assert_eq!(first.count.load(Ordering::SeqCst), 1);
        assert_eq!(second.count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_subscribe_replays_existing_rows() {
        let registry = ListenerRegistry::new();
        let existing = vec![Arc::new("a".to_string()), Arc::new("b".to_string())];

        let listener = CountingListener::new();
        registry.subscribe(listener.clone(), &existing);

        assert_eq!(listener.count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_subscribe_from_within_callback() {
        // A listener that subscribes another listener during fan-out must not
        // disturb the iteration over the snapshot.
        struct Resubscriber {
            registry: Arc<ListenerRegistry<String>>,
            added: Arc<CountingListener>,
        }

        impl AnnotationListener<String> for Resubscriber {
            fn annotation_added(&self, _annotation: &Arc<String>) {
                self.registry.subscribe(self.added.clone(), &[]);
            }
        }

        let registry = Arc::new(ListenerRegistry::new());
        let added = CountingListener::new();
        registry.subscribe(
            Arc::new(Resubscriber {
                registry: registry.clone(),
                added: added.clone(),
            }),
            &[],
        );

        registry.notify_added(&Arc::new("a".to_string()));
        assert_eq!(registry.len(), 2);
        // The newly added listener only sees events published after it joined.
        assert_eq!(added.count.load(Ordering::SeqCst), 0);

        registry.notify_added(&Arc::new("b".to_string()));
        assert_eq!(added.count.load(Ordering::SeqCst), 1);
    }
}
