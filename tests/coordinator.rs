use brigade::{
    BatchCoordinator, BatchError, FixedDelayWork, Interrupter, ItemOutcome, WaitPolicy, WorkError,
    WorkItem, WorkerPool,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

fn coordinator(capacity: usize, delay_ms: u64) -> BatchCoordinator {
    let pool = Arc::new(WorkerPool::new(capacity).expect("pool"));
    BatchCoordinator::new(pool, FixedDelayWork::new(Duration::from_millis(delay_ms)))
}

fn order(prefix: &str, count: usize) -> Vec<String> {
    (1..=count).map(|i| format!("{prefix}{i}")).collect()
}

#[test]
fn report_has_one_finished_entry_per_item() {
    let kitchen = coordinator(4, 2);
    for size in [1, 3, 4, 9] {
        let items = order("dish", size);
        let report = kitchen.process(items.clone()).unwrap();
        assert_eq!(report.len(), size);
        for item in &items {
            assert_eq!(report.get(item), Some(format!("Finished {item}").as_str()));
        }
        assert_eq!(report.failed().count(), 0);
    }
}

#[test]
fn empty_batch_returns_immediately_without_touching_the_pool() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&calls);
    let pool = Arc::new(WorkerPool::new(1).unwrap());
    let kitchen = BatchCoordinator::new(pool, move |item: &WorkItem| -> Result<String, WorkError> {
        counted.fetch_add(1, Ordering::SeqCst);
        Ok(item.to_string())
    });

    let start = Instant::now();
    let report = kitchen.process(Vec::<String>::new()).unwrap();
    assert!(report.is_empty());
    assert!(start.elapsed() < Duration::from_millis(100));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(kitchen.pool().queued(), 0);
}

#[test]
fn batch_larger_than_capacity_queues_instead_of_dropping() {
    let kitchen = coordinator(2, 50);
    let start = Instant::now();
    let report = kitchen.process(order("soup", 6)).unwrap();
    let elapsed = start.elapsed();

    assert_eq!(report.len(), 6);
    // Two workers, six items: at least three rounds of the per-item delay.
    assert!(elapsed >= Duration::from_millis(150), "{elapsed:?}");
}

#[test]
fn concurrent_batches_only_see_their_own_items() {
    let kitchen = coordinator(3, 5);
    let prefixes = ["tart", "stew", "salad", "bread"];

    let reports: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = prefixes
            .iter()
            .map(|prefix| {
                let kitchen = &kitchen;
                scope.spawn(move || kitchen.process(order(prefix, 12)).unwrap())
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let mut batch_ids = HashSet::new();
    for (prefix, report) in prefixes.iter().zip(&reports) {
        assert_eq!(report.len(), 12);
        assert!(report.iter().all(|(item, _)| item.starts_with(prefix)));
        assert!(batch_ids.insert(report.batch_id()));
    }
}

#[test]
fn concurrent_batches_share_one_capacity() {
    let capacity = 3;
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let pool = Arc::new(WorkerPool::new(capacity).unwrap());
    let kitchen = {
        let running = Arc::clone(&running);
        let peak = Arc::clone(&peak);
        BatchCoordinator::new(pool, move |item: &WorkItem| -> Result<String, WorkError> {
            let now = running.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(10));
            running.fetch_sub(1, Ordering::SeqCst);
            Ok(format!("Finished {item}"))
        })
    };

    let start = Instant::now();
    thread::scope(|scope| {
        for prefix in ["pasta", "risotto", "gnocchi", "polenta", "focaccia"] {
            let kitchen = &kitchen;
            scope.spawn(move || {
                let report = kitchen.process(order(prefix, 6)).unwrap();
                assert_eq!(report.len(), 6);
            });
        }
    });
    let elapsed = start.elapsed();

    assert!(peak.load(Ordering::SeqCst) <= capacity);
    // 30 items of 10ms over 3 workers: at least ten rounds.
    assert!(elapsed >= Duration::from_millis(100), "{elapsed:?}");
}

#[test]
fn the_same_caller_can_run_overlapping_batches() {
    let kitchen = coordinator(2, 5);
    let clone = kitchen.clone();
    let other = thread::spawn(move || clone.process(["a1", "a2", "a3"]).unwrap());
    let mine = kitchen.process(["b1", "b2"]).unwrap();
    let theirs = other.join().unwrap();

    assert_eq!(mine.len(), 2);
    assert_eq!(theirs.len(), 3);
    assert!(!mine.contains("a1"));
    assert!(!theirs.contains("b1"));
}

#[test]
fn duplicate_items_complete_with_last_writer_winning() {
    let kitchen = coordinator(2, 1);
    let report = kitchen.process(["pie", "pie", "cake"]).unwrap();
    assert_eq!(report.len(), 2);
    assert_eq!(&report["pie"], "Finished pie");
}

#[test]
fn failing_items_are_recorded_and_do_not_block_the_batch() {
    let pool = Arc::new(WorkerPool::new(2).unwrap());
    let kitchen = BatchCoordinator::new(pool, |item: &WorkItem| -> Result<String, WorkError> {
        if item.as_str().ends_with('3') {
            Err(WorkError::Failed("oven broke".to_string()))
        } else {
            Ok(format!("Finished {item}"))
        }
    });

    let report = kitchen.process(order("roast", 5)).unwrap();
    assert_eq!(report.len(), 5);
    assert_eq!(report.get("roast3"), Some("Failed roast3: oven broke"));
    assert!(report.outcome("roast3").is_some_and(ItemOutcome::is_failed));
    assert_eq!(report.finished_count(), 4);
}

#[test]
fn panicking_items_are_recorded_and_the_pool_keeps_serving() {
    let pool = Arc::new(WorkerPool::new(1).unwrap());
    let kitchen = BatchCoordinator::new(Arc::clone(&pool), |item: &WorkItem| -> Result<String, WorkError> {
        if item.as_str() == "flambe" {
            panic!("caught fire");
        }
        Ok(format!("Finished {item}"))
    });

    let report = kitchen.process(["flambe", "salad"]).unwrap();
    assert_eq!(report.get("flambe"), Some("Failed flambe: panicked: caught fire"));
    assert_eq!(report.get("salad"), Some("Finished salad"));

    let again = kitchen.process(["salad2"]).unwrap();
    assert_eq!(&again["salad2"], "Finished salad2");
}

#[test]
fn interrupted_work_still_counts_down() {
    let interrupter = Arc::new(Interrupter::new());
    interrupter.interrupt();
    let pool = Arc::new(WorkerPool::new(2).unwrap());
    let work = FixedDelayWork::interruptible(Duration::from_secs(30), Arc::clone(&interrupter));
    let kitchen = BatchCoordinator::new(pool, work);

    let report = kitchen.process(order("beef", 4)).unwrap();
    assert_eq!(report.len(), 4);
    assert_eq!(report.failed().count(), 4);
    assert_eq!(report.get("beef1"), Some("Failed beef1: work was interrupted"));
}

#[test]
fn waiting_caller_can_be_interrupted() {
    let kitchen = coordinator(1, 300);
    let interrupter = Arc::new(Interrupter::new());
    let firing = {
        let interrupter = Arc::clone(&interrupter);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            interrupter.interrupt();
        })
    };

    let start = Instant::now();
    let result = kitchen.process_interruptible(["slow1", "slow2"], &interrupter);
    firing.join().unwrap();

    match result {
        Err(BatchError::Interrupted {
            remaining, total, ..
        }) => {
            assert_eq!(total, 2);
            assert!(remaining >= 1);
        }
        other => panic!("expected an interruption, got {other:?}"),
    }
    assert!(start.elapsed() < Duration::from_millis(300));
}

#[test]
fn wait_can_time_out() {
    let kitchen = coordinator(1, 200);
    let result = kitchen.process_with_timeout(["slow1", "slow2", "slow3"], Duration::from_millis(40));
    match result {
        Err(BatchError::Timeout {
            timeout,
            remaining,
            total,
            ..
        }) => {
            assert_eq!(timeout, Duration::from_millis(40));
            assert_eq!(total, 3);
            assert!(remaining >= 2);
        }
        other => panic!("expected a timeout, got {other:?}"),
    }
}

#[test]
fn default_timeout_applies_to_plain_process() {
    let kitchen = coordinator(1, 200).with_default_timeout(Some(Duration::from_millis(30)));
    assert!(matches!(
        kitchen.process(["slow1", "slow2"]),
        Err(BatchError::Timeout { .. })
    ));
}

#[test]
fn generous_policy_still_returns_the_full_report() {
    let kitchen = coordinator(2, 5);
    let interrupter = Interrupter::new();
    let policy = WaitPolicy::forever()
        .timeout(Duration::from_secs(30))
        .interruptible_by(&interrupter);
    let report = kitchen.process_with(order("tea", 5), policy).unwrap();
    assert_eq!(report.len(), 5);
    assert!(!interrupter.is_interrupted());
}
