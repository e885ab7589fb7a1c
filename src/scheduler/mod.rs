//! Single owner of all periodic work.
//!
//! Jobs are registered with [`Scheduler::subscribe`], which hands back a
//! [`Subscription`]. Dropping the subscription removes the job, so whoever
//! owns the guard owns the job's lifetime. A job registered with
//! [`Scheduler::subscribe_while`] can also retire itself by returning `false`.
//!
//! Time only moves when someone calls [`Scheduler::tick`]. Tests and the CLI
//! call it directly with synthetic clocks; the server starts a [`Driver`]
//! thread that ticks with the wall clock until it is dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::store::record::{Millis, now_millis};

/// Returns `false` to unregister itself.
type Job = Box<dyn FnMut(Millis) -> bool + Send>;

struct Entry {
    id: u64,
    interval_ms: u64,
    /// `None` until the first tick after subscribing.
    next_due: Option<Millis>,
    job: Arc<Mutex<Job>>,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    entries: Vec<Entry>,
}

#[derive(Clone, Default)]
pub struct Scheduler {
    registry: Arc<Mutex<Registry>>,
}

/// Keeps a job registered. Dropping it unsubscribes.
#[must_use = "dropping a Subscription immediately unsubscribes the job"]
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<Registry>>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(shared) = self.registry.upgrade()
            && let Ok(mut registry) = shared.lock()
        {
            registry.entries.retain(|e| e.id != self.id);
        }
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `job` every `interval_ms`, starting on the next tick.
    pub fn subscribe<F>(&self, interval_ms: u64, mut job: F) -> Subscription
    where
        F: FnMut(Millis) + Send + 'static,
    {
        self.subscribe_while(interval_ms, move |now| {
            job(now);
            true
        })
    }

    /// Like [`subscribe`](Self::subscribe), but the job is unregistered as
    /// soon as it returns `false`. Dropping the subscription afterwards is a
    /// no-op.
    pub fn subscribe_while<F>(&self, interval_ms: u64, job: F) -> Subscription
    where
        F: FnMut(Millis) -> bool + Send + 'static,
    {
        let mut registry = self.lock();
        registry.next_id += 1;
        let id = registry.next_id;
        registry.entries.push(Entry {
            id,
            interval_ms,
            next_due: None,
            job: Arc::new(Mutex::new(Box::new(job))),
        });
        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Run every job that is due at `now`. Returns how many ran.
    ///
    /// A late tick runs each overdue job once and schedules the next run one
    /// interval after `now`; missed runs are not replayed. Jobs run outside
    /// the registry lock, so a job may subscribe or drop subscriptions.
    pub fn tick(&self, now: Millis) -> usize {
        let due: Vec<(u64, Arc<Mutex<Job>>)> = {
            let mut registry = self.lock();
            registry
                .entries
                .iter_mut()
                .filter(|e| e.next_due.is_none_or(|due| now >= due))
                .map(|e| {
                    let interval = i64::try_from(e.interval_ms).unwrap_or(i64::MAX);
                    e.next_due = Some(now.saturating_add(interval));
                    (e.id, Arc::clone(&e.job))
                })
                .collect()
        };

        let mut retired = Vec::new();
        for (id, job) in &due {
            match job.lock() {
                Ok(mut job) => {
                    if !job(now) {
                        retired.push(*id);
                    }
                }
                Err(_) => tracing::warn!("skipping scheduled job poisoned by an earlier panic"),
            }
        }
        if !retired.is_empty() {
            self.lock().entries.retain(|e| !retired.contains(&e.id));
            tracing::debug!(now, retired = retired.len(), "scheduled jobs finished");
        }
        if !due.is_empty() {
            tracing::trace!(now, ran = due.len(), "scheduler tick");
        }
        due.len()
    }

    /// Number of live subscriptions.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Start a background thread that ticks with the wall clock every
    /// `resolution`. The thread stops when the returned [`Driver`] drops.
    pub fn spawn_driver(&self, resolution: Duration) -> Result<Driver> {
        let stop = Arc::new(AtomicBool::new(false));
        let scheduler = self.clone();
        let flag = Arc::clone(&stop);

        let handle = std::thread::Builder::new()
            .name("wastemeter-scheduler".to_string())
            .spawn(move || {
                while !flag.load(Ordering::Relaxed) {
                    scheduler.tick(now_millis());
                    std::thread::sleep(resolution);
                }
            })
            .context("Failed to spawn scheduler thread")?;

        Ok(Driver {
            stop,
            handle: Some(handle),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Registry> {
        // A panicking job never holds the registry lock, so poisoning can only
        // come from a panic inside this module; the registry stays consistent.
        self.registry
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Handle to the background tick thread.
pub struct Driver {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Drop for Driver {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
