#[macro_use]
extern crate hamcrest;

mod common;

use common::{store, Shape};
use confstore::{EntryId, FaultPolicy, Observer, Store};
use hamcrest::prelude::*;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Records every notification it receives
#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<EntryId>>,
}

impl Recorder {
    fn seen(&self) -> Vec<EntryId> {
        self.seen.lock().clone()
    }
}

impl Observer for Recorder {
    fn on_change(&self, id: EntryId) {
        self.seen.lock().push(id);
    }
}

// --------------------------------------------------------------------
// Fan-out
//

#[test]
fn test_every_observer_called_once_per_change() {
    let (store, ids) = store();
    let recorders: Vec<Arc<Recorder>> = (0..3).map(|_| Arc::default()).collect();
    for recorder in &recorders {
        store.add_observer(Arc::clone(recorder) as Arc<dyn Observer>);
    }
    assert_that!(store.observer_count(), equal_to(3));

    assert!(store.set(ids.count, 100u16));

    for recorder in &recorders {
        assert_that!(recorder.seen(), equal_to(vec![ids.count]));
    }
}

#[test]
fn test_observers_called_in_registration_order() {
    let (store, ids) = store();
    let order = Arc::new(Mutex::new(Vec::new()));
    for tag in ["first", "second", "third"] {
        let order = Arc::clone(&order);
        store.observe(move |_| order.lock().push(tag));
    }

    store.set_string(ids.name, "HELLO");

    assert_that!(order.lock().clone(), equal_to(vec!["first", "second", "third"]));
}

#[test]
fn test_each_kind_of_set_notifies() {
    let (store, ids) = store();
    let recorder = Arc::new(Recorder::default());
    store.add_observer(recorder.clone());

    store.set(ids.gain, 1.5f32);
    store.set_string(ids.name, "HELLO");
    store.set_blob(
        ids.shape,
        &Shape {
            tag: b'q',
            ..Shape::default()
        },
    );

    assert_that!(recorder.seen(), equal_to(vec![ids.gain, ids.name, ids.shape]));
}

// --------------------------------------------------------------------
// Silence
//

#[test]
fn test_no_notification_without_change() {
    let (store, ids) = store();
    let recorder = Arc::new(Recorder::default());
    store.add_observer(recorder.clone());

    assert!(!store.set(ids.count, 16u16));
    assert!(!store.set(ids.count, 600u16));
    assert!(!store.set_string(ids.name, &"x".repeat(50)));
    assert!(!store.set_blob(ids.shape, &Shape::default()));

    assert_that!(recorder.seen(), equal_to(Vec::<EntryId>::new()));
}

#[test]
fn test_reset_does_not_notify() {
    let (store, ids) = store();
    store.set(ids.count, 100u16);
    let recorder = Arc::new(Recorder::default());
    store.add_observer(recorder.clone());

    store.reset();

    assert_that!(recorder.seen(), equal_to(Vec::<EntryId>::new()));
    assert_that!(store.get::<u16>(ids.count), equal_to(16));
}

// --------------------------------------------------------------------
// Registration
//

#[test]
fn test_remove_observer() {
    let (store, ids) = store();
    let kept = Arc::new(Recorder::default());
    let dropped = Arc::new(Recorder::default());
    store.add_observer(kept.clone());
    let token = store.add_observer(dropped.clone());

    assert!(store.remove_observer(token));
    assert!(!store.remove_observer(token));
    assert_that!(store.observer_count(), equal_to(1));

    store.set(ids.count, 1u16);

    assert_that!(kept.seen(), equal_to(vec![ids.count]));
    assert_that!(dropped.seen(), equal_to(Vec::<EntryId>::new()));
}

#[test]
fn test_add_before_init_is_refused_under_custom_policy() {
    common::init_logging();
    let (schema, ids) = common::schema();
    let faults = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&faults);
    let store = Store::new(schema).with_fault_policy(FaultPolicy::custom(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    }));

    let recorder = Arc::new(Recorder::default());
    let token = store.add_observer(recorder.clone());
    assert_that!(faults.load(Ordering::SeqCst), equal_to(1));
    assert_that!(store.observer_count(), equal_to(0));

    store.init();
    assert!(!store.remove_observer(token));
    store.set(ids.count, 5u16);
    assert_that!(recorder.seen(), equal_to(Vec::<EntryId>::new()));
}

#[test]
#[should_panic(expected = "store.add_observer: store not initialized")]
fn test_add_before_init_panics_by_default() {
    let (schema, _) = common::schema();
    let store = Store::new(schema);
    store.observe(|_| {});
}

// --------------------------------------------------------------------
// Reentrancy
//

#[test]
fn test_observer_may_read_the_store() {
    let (store, ids) = store();
    let store = Arc::new(store);
    let seen = Arc::new(Mutex::new(Vec::new()));

    let reader = Arc::downgrade(&store);
    let sink = Arc::clone(&seen);
    store.observe(move |id| {
        if let Some(store) = reader.upgrade() {
            sink.lock().push((id, store.get::<u16>(id)));
        }
    });

    store.set(ids.count, 250u16);

    assert_that!(seen.lock().clone(), equal_to(vec![(ids.count, 250u16)]));
}

#[test]
fn test_observer_may_write_the_store() {
    let (store, ids) = store();
    let store = Arc::new(store);
    let calls = Arc::new(AtomicUsize::new(0));

    // Mirror COUNT into TOTAL; the mirror write notifies again but settles
    let writer = Arc::downgrade(&store);
    let counter = Arc::clone(&calls);
    let count = ids.count;
    let total = ids.total;
    store.observe(move |id| {
        counter.fetch_add(1, Ordering::SeqCst);
        if id != count {
            return;
        }
        if let Some(store) = writer.upgrade() {
            let value = u32::from(store.get::<u16>(count));
            store.set(total, value);
        }
    });

    store.set(count, 300u16);

    assert_that!(store.get::<u32>(total), equal_to(300));
    assert_that!(calls.load(Ordering::SeqCst), equal_to(2));
}
