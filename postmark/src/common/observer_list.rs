/*
 * Copyright (c) 2024. Govcraft
 *
 * Licensed under either of
 *   * Apache License, Version 2.0 (the "License");
 *     you may not use this file except in compliance with the License.
 *     You may obtain a copy of the License at http://www.apache.org/licenses/LICENSE-2.0
 *   * MIT license: http://opensource.org/licenses/MIT
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the applicable License for the specific language governing permissions and
 * limitations under that License.
 */

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

/// Token returned when an observer is added; pass it back to remove that observer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObserverHandle(u64);

type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// An ordered list of callbacks for one kind of event.
///
/// Callbacks run in the order they were added. Notification works on a snapshot taken
/// under the lock and invokes callbacks outside it, so a callback may add or remove
/// observers (including itself) without deadlocking. A panicking callback is logged and
/// skipped; the remaining callbacks still run.
pub struct ObserverList<E: ?Sized> {
    next_handle: AtomicU64,
    observers: Mutex<Vec<(ObserverHandle, Callback<E>)>>,
}

impl<E: ?Sized> Default for ObserverList<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: ?Sized> fmt::Debug for ObserverList<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverList").field("observers", &self.len()).finish()
    }
}

impl<E: ?Sized> ObserverList<E> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_handle: AtomicU64::new(1),
            observers: Mutex::new(Vec::new()),
        }
    }

    /// Appends a callback and returns its removal handle.
    pub fn add<F>(&self, callback: F) -> ObserverHandle
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let handle = ObserverHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.observers.lock().push((handle, Arc::new(callback)));
        handle
    }

    /// Removes the callback registered under `handle`. Returns `false` if it was not present.
    pub fn remove(&self, handle: ObserverHandle) -> bool {
        let mut observers = self.observers.lock();
        let before = observers.len();
        observers.retain(|(registered, _)| *registered != handle);
        observers.len() != before
    }

    /// Invokes every callback with `event`.
    pub fn notify(&self, event: &E) {
        let snapshot: Vec<Callback<E>> = self
            .observers
            .lock()
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();
        for callback in snapshot {
            if panic::catch_unwind(AssertUnwindSafe(|| callback(event))).is_err() {
                warn!("Observer panicked while handling an event");
            }
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.observers.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observers.lock().is_empty()
    }

    pub fn clear(&self) {
        self.observers.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    #[test]
    fn test_observers_run_in_order() {
        let list: ObserverList<u32> = ObserverList::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let first = Arc::clone(&seen);
        list.add(move |value| first.lock().push(("first", *value)));
        let second = Arc::clone(&seen);
        list.add(move |value| second.lock().push(("second", *value)));

        list.notify(&7);
        assert_eq!(*seen.lock(), vec![("first", 7), ("second", 7)]);
    }

    #[test]
    fn test_panicking_observer_does_not_stop_the_rest() {
        let list: ObserverList<u32> = ObserverList::new();
        let calls = Arc::new(AtomicUsize::new(0));
        list.add(|_| panic!("observer failure"));
        let counter = Arc::clone(&calls);
        list.add(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        list.notify(&1);
        list.notify(&2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_removed_observer_is_not_called() {
        let list: ObserverList<()> = ObserverList::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        let handle = list.add(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        list.notify(&());
        assert!(list.remove(handle));
        assert!(!list.remove(handle));
        list.notify(&());

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(list.is_empty());
    }

    #[test]
    fn test_observer_can_remove_itself() {
        let list: Arc<ObserverList<()>> = Arc::new(ObserverList::new());
        let slot: Arc<Mutex<Option<ObserverHandle>>> = Arc::new(Mutex::new(None));

        let weak = Arc::downgrade(&list);
        let own_handle = Arc::clone(&slot);
        let handle = list.add(move |_| {
            if let (Some(list), Some(handle)) = (weak.upgrade(), *own_handle.lock()) {
                list.remove(handle);
            }
        });
        *slot.lock() = Some(handle);

        list.notify(&());
        assert_eq!(list.len(), 0);
    }
}
