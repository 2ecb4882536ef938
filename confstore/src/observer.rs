//! Change notification
//!
//! Observers are registered on a store and called after every `set` that
//! actually changed an entry. Calls happen in registration order, once per
//! observer, after the store lock has been released:
//!
//! 1. Setter: compare, write and save under the lock
//! 2. Setter: copy the observer list, release the lock
//! 3. Setter: call each observer with the changed entry id
//!
//! Because of step 2 an observer may read or write the store from inside
//! `on_change`. The price is that other threads may have changed further
//! entries by the time the callback runs.

use std::fmt;
use std::sync::Arc;

use crate::schema::EntryId;

/// Callback collaborator notified of changed entries
pub trait Observer: Send + Sync {
    fn on_change(&self, id: EntryId);
}

impl<F> Observer for F
where
    F: Fn(EntryId) + Send + Sync,
{
    fn on_change(&self, id: EntryId) {
        self(id);
    }
}

/// Registration token returned by `add_observer`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

impl ObserverId {
    /// Raw numeric value of the token
    #[must_use]
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Ordered observer registry
///
/// Ids are monotonic and never reused, so removing a stale id can't drop a
/// newer registration.
#[derive(Default)]
pub(crate) struct ObserverList {
    next_id: u64,
    entries: Vec<(ObserverId, Arc<dyn Observer>)>,
}

impl ObserverList {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&mut self, observer: Arc<dyn Observer>) -> ObserverId {
        let id = ObserverId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, observer));
        id
    }

    /// Token for a registration that was refused; matches nothing
    pub(crate) fn unregistered(&mut self) -> ObserverId {
        let id = ObserverId(self.next_id);
        self.next_id += 1;
        id
    }

    pub(crate) fn remove(&mut self, id: ObserverId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _)| *entry_id != id);
        if self.entries.len() == before {
            log::warn!("observers.remove: {id:?} not registered");
            return false;
        }
        true
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Copy of the handles, to be called after the lock is released
    pub(crate) fn snapshot(&self) -> Vec<Arc<dyn Observer>> {
        self.entries
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect()
    }
}

impl fmt::Debug for ObserverList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverList")
            .field("next_id", &self.next_id)
            .field("count", &self.entries.len())
            .finish()
    }
}

/// Call every observer, in order, with the changed entry
pub(crate) fn dispatch(observers: &[Arc<dyn Observer>], id: EntryId) {
    log::debug!("observers.dispatch: entry {id}, observers: {}", observers.len());
    for observer in observers {
        observer.on_change(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_add_assigns_increasing_ids() {
        let mut list = ObserverList::new();
        let a = list.add(Arc::new(|_: EntryId| {}));
        let b = list.add(Arc::new(|_: EntryId| {}));
        assert!(a.id() < b.id());
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_remove() {
        let mut list = ObserverList::new();
        let a = list.add(Arc::new(|_: EntryId| {}));
        assert!(list.remove(a));
        assert!(!list.remove(a));
        assert_eq!(list.len(), 0);
    }

    #[test]
    fn test_unregistered_token_matches_nothing() {
        let mut list = ObserverList::new();
        let token = list.unregistered();
        let a = list.add(Arc::new(|_: EntryId| {}));
        assert_ne!(token, a);
        assert!(!list.remove(token));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_dispatch_in_registration_order() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut list = ObserverList::new();
        for tag in 0..3 {
            let calls = Arc::clone(&calls);
            list.add(Arc::new(move |id: EntryId| calls.lock().push((tag, id))));
        }

        dispatch(&list.snapshot(), EntryId::new(5));

        let calls = calls.lock();
        assert_eq!(
            *calls,
            vec![
                (0, EntryId::new(5)),
                (1, EntryId::new(5)),
                (2, EntryId::new(5))
            ]
        );
    }
}
