//! Serialization, ordering and status tests under concurrent callers.

use parking_lot::Mutex;
use serial_session::{Entity, MemoryContext, Session};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug, PartialEq)]
struct Reading(u32);

impl Entity for Reading {
    type Key = u32;

    fn key(&self) -> u32 {
        self.0
    }
}

#[derive(Clone, Debug, PartialEq)]
struct Alert(String);

impl Entity for Alert {
    type Key = String;

    fn key(&self) -> String {
        self.0.clone()
    }
}

fn test_session() -> Session<MemoryContext> {
    Session::new(
        MemoryContext::new()
            .with_rows((0..50).map(Reading).collect())
            .with_rows(vec![Alert("low".into()), Alert("high".into())]),
    )
    .unwrap()
}

/// Assert a status history never repeats a value and settles idle.
fn assert_bracketed(history: &[bool]) {
    assert_eq!(history.first(), Some(&false), "history: {:?}", history);
    assert!(history.contains(&true), "history: {:?}", history);
    assert_eq!(history.last(), Some(&false), "history: {:?}", history);
    assert!(
        history.windows(2).all(|w| w[0] != w[1]),
        "consecutive duplicates in {:?}",
        history
    );
}

#[test]
fn test_single_producer_fifo() {
    let session = test_session();
    let log = Arc::new(Mutex::new(Vec::new()));

    let streams: Vec<_> = (0..200)
        .map(|i| {
            let log = Arc::clone(&log);
            session
                .submit("record", move |_| {
                    log.lock().push(i);
                    Ok(vec![i])
                })
                .unwrap()
        })
        .collect();

    for (i, stream) in streams.into_iter().enumerate() {
        assert_eq!(stream.collect_timeout(WAIT).unwrap(), vec![i]);
    }
    assert_eq!(*log.lock(), (0..200).collect::<Vec<_>>());
}

#[test]
fn test_concurrent_producers_never_overlap() {
    let session = test_session();
    let active = Arc::new(AtomicUsize::new(0));
    let max_active = Arc::new(AtomicUsize::new(0));
    let log = Arc::new(Mutex::new(Vec::new()));

    const PRODUCERS: usize = 8;
    const ITEMS: usize = 50;

    thread::scope(|scope| {
        for producer in 0..PRODUCERS {
            let session = &session;
            let active = Arc::clone(&active);
            let max_active = Arc::clone(&max_active);
            let log = Arc::clone(&log);

            scope.spawn(move || {
                let streams: Vec<_> = (0..ITEMS)
                    .map(|seq| {
                        let active = Arc::clone(&active);
                        let max_active = Arc::clone(&max_active);
                        let log = Arc::clone(&log);
                        session
                            .submit("instrumented", move |_| {
                                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                                max_active.fetch_max(now, Ordering::SeqCst);
                                log.lock().push((producer, seq));
                                thread::yield_now();
                                active.fetch_sub(1, Ordering::SeqCst);
                                Ok(Vec::<()>::new())
                            })
                            .unwrap()
                    })
                    .collect();

                for stream in streams {
                    stream.collect_timeout(WAIT).unwrap();
                }
            });
        }
    });

    assert_eq!(max_active.load(Ordering::SeqCst), 1);

    let log = log.lock();
    assert_eq!(log.len(), PRODUCERS * ITEMS);

    // Each producer's items ran in the order it submitted them
    for producer in 0..PRODUCERS {
        let seqs: Vec<_> = log.iter().filter(|(p, _)| *p == producer).map(|(_, s)| *s).collect();
        assert_eq!(seqs, (0..ITEMS).collect::<Vec<_>>());
    }
}

#[test]
fn test_status_bracket_around_blocking_item() {
    let session = test_session();
    let status = session.is_working();
    let (release, gate) = crossbeam_channel::bounded::<()>(0);

    let stream = session
        .submit("blocked", move |_| {
            gate.recv().ok();
            Ok(vec![1])
        })
        .unwrap();

    assert_eq!(status.recv_timeout(WAIT), Ok(false));
    assert_eq!(status.recv_timeout(WAIT), Ok(true));
    assert!(session.is_busy());

    // A late observer sees the current (busy) state first
    let late = session.is_working();
    assert_eq!(late.recv_timeout(WAIT), Ok(true));

    release.send(()).unwrap();
    assert_eq!(stream.collect_timeout(WAIT).unwrap(), vec![1]);
    assert_eq!(status.recv_timeout(WAIT), Ok(false));
    assert_eq!(late.recv_timeout(WAIT), Ok(false));
}

#[test]
fn test_back_to_back_items_never_report_busy_twice() {
    let mut session = test_session();
    let status = session.is_working();

    for _ in 0..20 {
        session.fetch_results::<Reading>().unwrap();
    }
    session.close().unwrap();

    let history = status.drain();
    assert_bracketed(&history);
}

#[test]
fn test_disjoint_fetches_from_two_threads() {
    let mut session = test_session();
    let status = session.is_working();

    let (readings, alerts) = thread::scope(|scope| {
        let readings = scope.spawn(|| session.fetch_results::<Reading>().unwrap().collect_timeout(WAIT));
        let alerts = scope.spawn(|| session.fetch_results::<Alert>().unwrap().collect_timeout(WAIT));
        (readings.join().unwrap(), alerts.join().unwrap())
    });

    assert_eq!(readings.unwrap(), (0..50).map(Reading).collect::<Vec<_>>());
    assert_eq!(alerts.unwrap(), vec![Alert("low".into()), Alert("high".into())]);

    // Closing joins the worker, so the final idle transition has been sent
    session.close().unwrap();
    assert_bracketed(&status.drain());
}

#[test]
fn test_submission_does_not_wait_for_running_item() {
    let session = test_session();
    let (release, gate) = crossbeam_channel::bounded::<()>(0);

    let blocked = session
        .submit("blocked", move |_| {
            gate.recv().ok();
            Ok(vec!["first"])
        })
        .unwrap();

    // Worker is stuck; submitting more must still return immediately
    let queued: Vec<_> = (0..10)
        .map(|_| session.fetch_results::<Alert>().unwrap())
        .collect();
    assert!(session.pending_items() >= 9);

    release.send(()).unwrap();
    assert_eq!(blocked.collect_timeout(WAIT).unwrap(), vec!["first"]);
    for stream in queued {
        assert_eq!(stream.collect_timeout(WAIT).unwrap().len(), 2);
    }
}
