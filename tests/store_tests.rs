/// Store, scheduler and demo-feed integration tests.
///
/// These wire the pieces together the way `wastemeter serve` does: a shared
/// store behind a mutex, periodic jobs on a scheduler ticked with a synthetic
/// clock.
use std::sync::{Arc, Mutex};

use rand::SeedableRng;
use rand::rngs::StdRng;

use wastemeter::config::WastemeterConfig;
use wastemeter::demo::{DemoFeed, script};
use wastemeter::scheduler::Scheduler;
use wastemeter::store::RecordStore;
use wastemeter::store::record::{RecordKind, parse_jsonl};

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[test]
fn ids_increase_within_one_millisecond() {
    let mut store = RecordStore::new(60_000);
    let a = store.append(RecordKind::Prompt, "a", "general", 5_000);
    let b = store.append(RecordKind::Output, "b", "general", 5_000);
    let c = store.append(RecordKind::Interaction, "c", "general", 5_000);
    assert!(a < b && b < c);
}

#[test]
fn sweep_preserves_insertion_order() {
    let mut store = RecordStore::new(10_000);
    for (i, text) in ["old", "mid", "new", "newest"].iter().enumerate() {
        store.append(RecordKind::Prompt, *text, "general", i as i64 * 5_000);
    }

    let evicted = store.sweep(14_000);
    assert_eq!(evicted, 1);
    let texts: Vec<&str> = store
        .records(RecordKind::Prompt)
        .iter()
        .map(|r| r.text.as_str())
        .collect();
    assert_eq!(texts, ["mid", "new", "newest"]);
}

#[test]
fn interaction_flag_is_sticky_and_unknown_ids_error() {
    let mut store = RecordStore::new(60_000);
    let id = store.append(RecordKind::Output, "answer", "general", 1_000);

    store.mark_interacted(id).unwrap();
    store.mark_interacted(id).unwrap();
    assert!(store.records(RecordKind::Output)[0].metadata.has_interacted);

    let err = store.mark_interacted(id + 100).unwrap_err();
    assert!(err.to_string().contains("No output"));
}

#[test]
fn jsonl_records_load_into_the_right_streams() {
    let content = r#"
{"text":"how do lifetimes work","timestamp":1000,"type":"prompt"}
{"text":"Lifetimes describe scopes","timestamp":2000,"type":"output","category":"code"}
{"text":"summarize","timestamp":3000,"type":"interaction","metadata":{"actualTokens":90,"expectedTokens":60,"latencyMs":1200}}
{"text":"summarize again","timestamp":3500,"type":"interaction","actualTokens":90,"expectedTokens":60}
"#;
    let records = parse_jsonl(content).unwrap();
    assert_eq!(records.len(), 4);

    let mut store = RecordStore::new(3_600_000);
    for record in records {
        let ts = record.timestamp;
        store.insert(record, ts);
    }
    assert_eq!(store.records(RecordKind::Prompt).len(), 1);
    assert_eq!(store.records(RecordKind::Output).len(), 1);
    assert_eq!(store.records(RecordKind::Output)[0].category, "code");
    assert_eq!(store.records(RecordKind::Interaction).len(), 2);

    let snapshot = store.snapshot(&WastemeterConfig::default(), 4_000);
    assert!((snapshot.metrics.average_excess_ratio - 1.5).abs() < 1e-9);
}

// ---------------------------------------------------------------------------
// Scheduler-driven jobs
// ---------------------------------------------------------------------------

#[test]
fn scheduled_sweep_evicts_expired_records() {
    let store = Arc::new(Mutex::new(RecordStore::new(10_000)));
    let scheduler = Scheduler::new();

    let shared = Arc::clone(&store);
    let _sweep = scheduler.subscribe(60_000, move |now| {
        shared.lock().unwrap().sweep(now);
    });

    store
        .lock()
        .unwrap()
        .append(RecordKind::Prompt, "stale", "general", 0);

    scheduler.tick(5_000);
    assert_eq!(store.lock().unwrap().len(), 1);

    // Not due yet, so nothing is swept even though the record is expired.
    scheduler.tick(30_000);
    assert_eq!(store.lock().unwrap().len(), 1);

    scheduler.tick(65_000);
    assert!(store.lock().unwrap().is_empty());
}

#[test]
fn dropping_the_subscription_stops_the_job() {
    let scheduler = Scheduler::new();
    let store = Arc::new(Mutex::new(RecordStore::new(u64::MAX)));

    let shared = Arc::clone(&store);
    let sub = scheduler.subscribe(1_000, move |now| {
        shared
            .lock()
            .unwrap()
            .append(RecordKind::Prompt, "tick", "general", now);
    });

    scheduler.tick(0);
    scheduler.tick(1_000);
    drop(sub);
    assert!(scheduler.is_empty());
    scheduler.tick(2_000);

    assert_eq!(store.lock().unwrap().len(), 2);
}

// ---------------------------------------------------------------------------
// Demo feed
// ---------------------------------------------------------------------------

#[test]
fn demo_feed_replays_script_through_scheduler() {
    let config = WastemeterConfig::default();
    let store = Arc::new(Mutex::new(RecordStore::new(u64::MAX)));
    let scheduler = Scheduler::new();

    let feed = DemoFeed::with_rng(1.0, StdRng::seed_from_u64(7));
    let steps = feed.remaining();
    assert_eq!(steps, script().len());

    let _demo = feed.subscribe(&scheduler, Arc::clone(&store), &config.demo);
    let interval = config.demo.interval_ms as i64;
    // One extra tick lets the last output's interaction land.
    for step in 0..=steps as i64 {
        scheduler.tick(step * interval);
    }
    // The finished feed no longer occupies the scheduler.
    assert!(scheduler.is_empty());
    assert_eq!(scheduler.tick((steps as i64 + 5) * interval), 0);

    let store = store.lock().unwrap();
    assert_eq!(store.len(), steps);
    assert!(!store.records(RecordKind::Prompt).is_empty());
    assert!(!store.records(RecordKind::Interaction).is_empty());
    // Every output was interacted with at chance 1.0.
    assert!(
        store
            .records(RecordKind::Output)
            .iter()
            .all(|r| r.metadata.has_interacted)
    );
}

#[test]
fn demo_feed_with_zero_chance_never_interacts() {
    let mut store = RecordStore::new(u64::MAX);
    let mut feed = DemoFeed::with_rng(0.0, StdRng::seed_from_u64(1));

    let mut now = 0;
    while feed.step(&mut store, now) {
        now += 1_000;
    }
    assert!(feed.is_finished());
    assert!(
        store
            .records(RecordKind::Output)
            .iter()
            .all(|r| !r.metadata.has_interacted)
    );
}
