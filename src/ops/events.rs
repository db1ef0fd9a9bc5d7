use std::fmt;
use std::sync::{Mutex, PoisonError};

/// Which cache an event came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKind {
    Projects,
    Tasks,
}

/// Published after every cache mutation.
///
/// Collection events carry the new version of the collection so a listener
/// can tell whether a view it computed earlier is stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    ProjectsChanged { version: u64 },
    SortChanged { version: u64 },
    FilterChanged { version: u64 },
    TasksChanged { version: u64 },
    CurrentProjectChanged(Option<String>),
    LoadingChanged { cache: CacheKind, loading: bool },
    ErrorChanged { cache: CacheKind, error: Option<String> },
}

type Listener = Box<dyn Fn(&CacheEvent) + Send + Sync>;

/// Fan-out of cache events to subscribed closures.
///
/// Listeners run synchronously on the publishing call and must not subscribe
/// from inside a callback.
#[derive(Default)]
pub struct EventBus {
    listeners: Mutex<Vec<Listener>>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        f.debug_struct("EventBus").field("listeners", &count).finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: impl Fn(&CacheEvent) + Send + Sync + 'static) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(listener));
    }

    pub fn publish(&self, event: CacheEvent) {
        tracing::trace!(?event, "cache event");
        let listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        for listener in listeners.iter() {
            listener(&event);
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_listener_sees_every_event() {
        let bus = EventBus::new();
        let first = testing::record(&bus);
        let second = testing::record(&bus);

        bus.publish(CacheEvent::TasksChanged { version: 1 });
        bus.publish(CacheEvent::LoadingChanged {
            cache: CacheKind::Tasks,
            loading: false,
        });

        assert_eq!(first.lock().unwrap().len(), 2);
        assert_eq!(*first.lock().unwrap(), *second.lock().unwrap());
    }
}
