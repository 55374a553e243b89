//! End-to-end tests through the public facade: real mapped file, real poller
//! thread, real cleaner.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use appendlog::{AppendLog, Config};

const TERM_LENGTH: usize = 4096;

fn scenario_config() -> Config {
    Config::default()
        .with_term_length(TERM_LENGTH)
        .with_initial_term_id(7)
}

fn open_log(dir: &tempfile::TempDir, config: Config) -> AppendLog {
    AppendLog::with_config(dir.path().join("events.log"), config).unwrap()
}

fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(1));
    }
}

fn commit_payload(log: &AppendLog, payload: &[u8]) {
    let mut claim = log.claim(payload.len() as u32).unwrap();
    claim.as_mut_slice().copy_from_slice(payload);
    claim.commit();
}

#[test]
fn test_single_claim_positions_and_delivery() {
    let dir = tempfile::tempdir().unwrap();
    let mut log = open_log(&dir, scenario_config());

    let received = Arc::new(Mutex::new(Vec::<Vec<u8>>::new()));
    let sink = Arc::clone(&received);
    log.on_append(move |payload| sink.lock().unwrap().push(payload.to_vec()))
        .unwrap();
    log.start_polling().unwrap();

    // 16-byte payload: frame 48, aligned to 64
    commit_payload(&log, &[7u8; 16]);
    assert_eq!(log.position(), 64);

    wait_until("first delivery", || received.lock().unwrap().len() == 1);
    assert_eq!(received.lock().unwrap()[0], vec![7u8; 16]);
    assert_eq!(log.subscriber_position(), 64);
}

#[test]
fn test_exact_term_fill_rotates_into_next_partition() {
    let dir = tempfile::tempdir().unwrap();
    let mut log = open_log(&dir, scenario_config());

    let count = Arc::new(AtomicUsize::new(0));
    let sink = Arc::clone(&count);
    log.on_append(move |_| {
        sink.fetch_add(1, Ordering::SeqCst);
    })
    .unwrap();
    log.start_polling().unwrap();

    // 32 frames of 128 aligned bytes fill the 4096-byte term exactly
    for _ in 0..32 {
        commit_payload(&log, &[1u8; 96]);
    }
    assert_eq!(log.position(), 4096);

    // the 33rd claim trips with zero slack and lands at offset 0 of the
    // next term; its commit moves the position to 4096 + 128
    commit_payload(&log, &[2u8; 96]);
    assert_eq!(log.position(), 4096 + 128);

    wait_until("all 33 deliveries", || count.load(Ordering::SeqCst) == 33);
    wait_until("subscriber catches up", || {
        log.subscriber_position() == 4096 + 128
    });
}

#[test]
fn test_trip_with_slack_pads_and_skips() {
    let dir = tempfile::tempdir().unwrap();
    let mut log = open_log(&dir, scenario_config());

    let lengths = Arc::new(Mutex::new(Vec::<usize>::new()));
    let sink = Arc::clone(&lengths);
    log.on_append(move |payload| sink.lock().unwrap().push(payload.len()))
        .unwrap();
    log.start_polling().unwrap();

    // 3000-byte payload: frame 3032, aligned 3040; 1056 bytes of slack
    // remain, covered by one padding frame when the second claim trips
    commit_payload(&log, &[3u8; 3000]);
    commit_payload(&log, &[4u8; 3000]);
    assert_eq!(log.position(), 4096 + 3040);

    wait_until("both payloads", || lengths.lock().unwrap().len() == 2);
    assert_eq!(*lengths.lock().unwrap(), vec![3000, 3000]);
    // the reader traversed the padding without delivering it
    wait_until("subscriber past padding", || {
        log.subscriber_position() == 4096 + 3040
    });
}

#[test]
fn test_abort_is_skipped_but_advances_subscriber() {
    let dir = tempfile::tempdir().unwrap();
    let mut log = open_log(&dir, scenario_config());

    let count = Arc::new(AtomicUsize::new(0));
    let sink = Arc::clone(&count);
    log.on_append(move |_| {
        sink.fetch_add(1, Ordering::SeqCst);
    })
    .unwrap();
    log.start_polling().unwrap();

    // 100-byte payload: frame 132, aligned 160... claimed then abandoned
    let claim = log.claim(100).unwrap();
    claim.abort();

    wait_until("subscriber steps over the abort", || {
        log.subscriber_position() == 160
    });
    assert_eq!(count.load(Ordering::SeqCst), 0);
    assert_eq!(log.position(), 160);
}

#[test]
fn test_idle_poller_delivers_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let mut log = open_log(&dir, scenario_config());

    let count = Arc::new(AtomicUsize::new(0));
    let sink = Arc::clone(&count);
    log.on_append(move |_| {
        sink.fetch_add(1, Ordering::SeqCst);
    })
    .unwrap();
    log.start_polling().unwrap();

    thread::sleep(Duration::from_millis(10));

    assert_eq!(count.load(Ordering::SeqCst), 0);
    assert_eq!(log.position(), 0);
    assert_eq!(log.subscriber_position(), log.position());
}

#[test]
fn test_handler_panic_is_surfaced_and_polling_continues() {
    let dir = tempfile::tempdir().unwrap();
    let mut log = open_log(&dir, scenario_config());

    let received = Arc::new(Mutex::new(Vec::<Vec<u8>>::new()));
    let errors = Arc::new(AtomicUsize::new(0));

    let sink = Arc::clone(&received);
    log.on_append(move |payload| {
        if payload[0] == 1 {
            panic!("poisoned message");
        }
        sink.lock().unwrap().push(payload.to_vec());
    })
    .unwrap();

    let error_sink = Arc::clone(&errors);
    log.on_error(move |err| {
        assert!(err.message().contains("poisoned"));
        error_sink.fetch_add(1, Ordering::SeqCst);
    })
    .unwrap();

    log.start_polling().unwrap();

    commit_payload(&log, &[1u8; 8]); // handler panics on this one
    commit_payload(&log, &[2u8; 8]);

    wait_until("error surfaced", || errors.load(Ordering::SeqCst) == 1);
    wait_until("second message delivered", || {
        received.lock().unwrap().len() == 1
    });
    assert_eq!(received.lock().unwrap()[0], vec![2u8; 8]);
    // both 64-byte frames were consumed, poisoned one included
    wait_until("subscriber past both", || log.subscriber_position() == 128);
}

#[test]
fn test_handlers_rejected_while_polling() {
    let dir = tempfile::tempdir().unwrap();
    let mut log = open_log(&dir, scenario_config());

    log.start_polling().unwrap();
    assert!(log.on_append(|_| {}).is_err());
    assert!(log.on_error(|_| {}).is_err());
    assert!(log.start_polling().is_err());

    log.stop();
}

#[test]
fn test_oversized_claim_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let log = open_log(&dir, scenario_config());

    // payload + header can never fit one 4096-byte term
    assert!(log.claim(4096).is_err());
    // the largest frame that fits is fine
    let claim = log.claim((TERM_LENGTH - 32) as u32).unwrap();
    claim.commit();
}

#[test]
fn test_new_sizes_from_buffer_budget() {
    let dir = tempfile::tempdir().unwrap();
    // 64 KiB budget: rounded and split into 16 KiB terms
    let log = AppendLog::new(dir.path().join("sized.log"), 64 * 1024).unwrap();

    let claim = log.claim(32).unwrap();
    claim.commit();
    assert_eq!(log.position(), 64);
}

#[test]
fn test_reopen_reuses_stamped_header_template() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shared.log");

    let first = AppendLog::with_config(&path, scenario_config().with_stream_id(9)).unwrap();
    let first_session = first.session_id();
    assert_eq!(first.stream_id(), 9);
    drop(first);

    // the reopened instance reads the stored template; its own stream id
    // is ignored, its session id is still per-instance
    let second = AppendLog::with_config(&path, scenario_config().with_stream_id(3)).unwrap();
    assert_eq!(second.stream_id(), 9);
    assert_eq!(
        (second.session_id() >> 32) as u32,
        (first_session >> 32) as u32,
        "both instances of this process pack the same pid"
    );
}

#[test]
fn test_multi_producer_delivery_through_facade() {
    const N_PRODUCERS: usize = 4;
    const MESSAGES_PER_PRODUCER: usize = 200;

    let dir = tempfile::tempdir().unwrap();
    let mut log = open_log(
        &dir,
        Config::default()
            .with_term_length(32 * 1024)
            .with_poll_fragment_limit(64)
            .with_metrics(true),
    );

    let seen = Arc::new(Mutex::new(vec![
        vec![false; MESSAGES_PER_PRODUCER];
        N_PRODUCERS
    ]));
    let sink = Arc::clone(&seen);
    log.on_append(move |payload| {
        let producer = payload[0] as usize;
        let seq = u32::from_le_bytes(payload[4..8].try_into().unwrap()) as usize;
        let mut seen = sink.lock().unwrap();
        assert!(!seen[producer][seq], "duplicate delivery ({producer}, {seq})");
        seen[producer][seq] = true;
    })
    .unwrap();
    log.start_polling().unwrap();

    let log = Arc::new(log);
    let mut handles = vec![];
    for producer_id in 0..N_PRODUCERS {
        let log = Arc::clone(&log);
        handles.push(thread::spawn(move || {
            for seq in 0..MESSAGES_PER_PRODUCER {
                let mut payload = [0u8; 16];
                payload[0] = producer_id as u8;
                payload[4..8].copy_from_slice(&(seq as u32).to_le_bytes());
                let mut claim = log.claim(16).unwrap();
                claim.as_mut_slice().copy_from_slice(&payload);
                claim.commit();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    wait_until("every message delivered", || {
        seen.lock().unwrap().iter().flatten().all(|&s| s)
    });

    let expected = (N_PRODUCERS * MESSAGES_PER_PRODUCER) as u64;
    assert_eq!(log.metrics().frames_appended, expected);
    // the poller publishes its counter after the handler runs
    wait_until("poll counter settles", || {
        log.metrics().frames_polled == expected
    });
}
