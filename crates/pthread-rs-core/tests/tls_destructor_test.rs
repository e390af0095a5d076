use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use pthread_rs_core::{Destructor, Runtime};

#[test]
fn destructor_receives_value_set_by_exiting_thread() {
    let rt = Runtime::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = Arc::clone(&seen);
    let destr: Destructor = Arc::new(move |v| s.lock().push(v));
    let key = rt.key_create(Some(destr)).unwrap();

    let inner = rt.clone();
    let t = rt
        .create(
            move |_| {
                inner.set_specific(key, 15).unwrap();
                let got = inner.get_specific(key).unwrap().unwrap_or(0);
                inner.exit(got)
            },
            0,
        )
        .unwrap();
    assert_eq!(rt.join(t), Ok(15));
    assert_eq!(*seen.lock(), vec![15]);
}

#[test]
fn every_key_destructor_runs() {
    let rt = Runtime::new();
    let total = Arc::new(AtomicUsize::new(0));
    let keys: Vec<_> = (0..8)
        .map(|_| {
            let t = Arc::clone(&total);
            rt.key_create(Some(Arc::new(move |v| {
                t.fetch_add(v, Ordering::SeqCst);
            })))
            .unwrap()
        })
        .collect();

    let inner = rt.clone();
    let ks = keys.clone();
    let t = rt
        .create(
            move |_| {
                for (i, k) in ks.iter().enumerate() {
                    inner.set_specific(*k, i + 1).unwrap();
                }
                0
            },
            0,
        )
        .unwrap();
    rt.join(t).unwrap();
    assert_eq!(total.load(Ordering::SeqCst), (1..=8).sum::<usize>());
    assert_eq!(rt.metrics().destructors_run, 8);
}

#[test]
fn detached_thread_still_runs_destructors() {
    let rt = Runtime::new();
    let seen = Arc::new(AtomicUsize::new(0));
    let s = Arc::clone(&seen);
    let key = rt
        .key_create(Some(Arc::new(move |v| s.store(v, Ordering::SeqCst))))
        .unwrap();
    let inner = rt.clone();
    let t = rt
        .create(
            move |_| {
                inner.set_specific(key, 99).unwrap();
                0
            },
            0,
        )
        .unwrap();
    rt.detach(t).unwrap();
    for _ in 0..2000 {
        if seen.load(Ordering::SeqCst) == 99 {
            break;
        }
        std::thread::sleep(std::time::Duration::from_millis(1));
    }
    assert_eq!(seen.load(Ordering::SeqCst), 99);
}

#[test]
fn runtimes_keep_separate_key_registries() {
    let a = Runtime::new();
    let b = Runtime::new();
    let ka = a.key_create(None).unwrap();
    a.set_specific(ka, 1).unwrap();
    assert_eq!(b.key_count(), 0);
    assert!(b.get_specific(ka).is_err());
}
