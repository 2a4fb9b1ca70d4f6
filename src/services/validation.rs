//! Concurrent availability validation
//!
//! One call to [`ValidationCoordinator::validate`] owns a task queue and a
//! fixed number of workers for its whole duration. Every task carries an
//! exclusive borrow of the `available` flag it updates, so no two workers
//! can touch the same record and no result merging is needed.
//!
//! All workers are futures polled by the calling task. Probes are network
//! bound, so this gives the full concurrency of the pool without requiring
//! the borrowed records to be `'static`.

use futures::future::join_all;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tokio::sync::{Mutex, Notify, mpsc};
use tracing::{debug, info};

use super::availability_prober::AvailabilityProbe;
use crate::models::{FlatEntry, StreamRecord, Validatable};

/// A single probe to run: the link and the flag that receives the verdict
struct ProbeTask<'a> {
    link: &'a str,
    available: &'a mut bool,
}

enum QueueMessage<'a> {
    Probe(ProbeTask<'a>),
    Shutdown,
}

/// Counts outstanding tasks and wakes the coordinator when the last one
/// has landed.
struct CompletionBarrier {
    outstanding: AtomicUsize,
    notify: Notify,
}

impl CompletionBarrier {
    fn new(outstanding: usize) -> Self {
        Self {
            outstanding: AtomicUsize::new(outstanding),
            notify: Notify::new(),
        }
    }

    fn arrive(&self) {
        if self.outstanding.fetch_sub(1, Ordering::AcqRel) == 1 {
            // notify_one stores a permit if the coordinator is not waiting yet
            self.notify.notify_one();
        }
    }

    async fn wait(&self) {
        while self.outstanding.load(Ordering::Acquire) > 0 {
            self.notify.notified().await;
        }
    }
}

/// Outcome of one validation pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationSummary {
    pub probed: usize,
    pub available: usize,
    pub workers: usize,
}

/// Runs availability probes over a whole data set with a bounded pool
#[derive(Clone)]
pub struct ValidationCoordinator {
    prober: Arc<dyn AvailabilityProbe>,
    workers: usize,
}

impl ValidationCoordinator {
    pub fn new(prober: Arc<dyn AvailabilityProbe>, workers: usize) -> Self {
        Self {
            prober,
            workers: workers.max(1),
        }
    }

    /// Overwrite every record's `available` flag with a fresh probe result.
    ///
    /// Returns only after every probe has completed and every worker has
    /// exited.
    pub async fn validate(&self, target: &mut Validatable) -> ValidationSummary {
        let started = Instant::now();
        debug!(
            "Validating {} records with {} workers",
            target.record_count(),
            self.workers
        );
        let probed = self.run_pool(build_tasks(target)).await;

        let available = count_available(target);
        info!(
            "Validated {} streams with {} workers in {:?}: {} available",
            probed,
            self.workers,
            started.elapsed(),
            available
        );

        ValidationSummary {
            probed,
            available,
            workers: self.workers,
        }
    }

    async fn run_pool(&self, tasks: Vec<ProbeTask<'_>>) -> usize {
        let (sender, receiver) = mpsc::unbounded_channel();
        let queue = Mutex::new(receiver);
        let barrier = CompletionBarrier::new(tasks.len());
        let prober = self.prober.as_ref();

        let producer = async {
            // The receiver lives in `queue` for the whole call, so sends
            // cannot fail here.
            for task in tasks {
                let _ = sender.send(QueueMessage::Probe(task));
            }
            barrier.wait().await;
            for _ in 0..self.workers {
                let _ = sender.send(QueueMessage::Shutdown);
            }
        };

        let workers = join_all(
            (0..self.workers).map(|worker_id| run_worker(worker_id, &queue, &barrier, prober)),
        );

        let ((), per_worker) = tokio::join!(producer, workers);
        per_worker.into_iter().sum()
    }
}

/// Drain the queue until a shutdown message arrives. Returns how many
/// probes this worker ran.
async fn run_worker(
    worker_id: usize,
    queue: &Mutex<mpsc::UnboundedReceiver<QueueMessage<'_>>>,
    barrier: &CompletionBarrier,
    prober: &dyn AvailabilityProbe,
) -> usize {
    let mut probed = 0;
    loop {
        let message = queue.lock().await.recv().await;
        match message {
            Some(QueueMessage::Probe(task)) => {
                *task.available = prober.probe(task.link).await;
                probed += 1;
                barrier.arrive();
            }
            Some(QueueMessage::Shutdown) | None => break,
        }
    }
    debug!("Validation worker {} exiting after {} probes", worker_id, probed);
    probed
}

fn build_tasks(target: &mut Validatable) -> Vec<ProbeTask<'_>> {
    match target {
        Validatable::Groups(config) => config
            .groups_mut()
            .iter_mut()
            .flat_map(|group| group.streams.iter_mut())
            .map(stream_task)
            .collect(),
        Validatable::FlatStreams(entries) => entries.iter_mut().map(flat_task).collect(),
    }
}

fn stream_task(stream: &mut StreamRecord) -> ProbeTask<'_> {
    ProbeTask {
        link: &stream.link,
        available: &mut stream.available,
    }
}

fn flat_task(entry: &mut FlatEntry) -> ProbeTask<'_> {
    ProbeTask {
        link: &entry.link,
        available: &mut entry.available,
    }
}

fn count_available(target: &Validatable) -> usize {
    match target {
        Validatable::Groups(config) => config.streams().filter(|s| s.available).count(),
        Validatable::FlatStreams(entries) => entries.iter().filter(|e| e.available).count(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::defaults::DEFAULT_VALIDATION_WORKERS;
    use crate::models::{AggregatedConfig, ChannelGroup, GroupKey};
    use crate::services::availability_prober::HttpAvailabilityProber;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::time::Duration;

    /// Marks links containing "live" as available and records concurrency
    #[derive(Default)]
    struct StubProber {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        calls: std::sync::Mutex<HashMap<String, usize>>,
    }

    #[async_trait]
    impl AvailabilityProbe for StubProber {
        async fn probe(&self, link: &str) -> bool {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            *self
                .calls
                .lock()
                .unwrap()
                .entry(link.to_string())
                .or_default() += 1;
            link.contains("live")
        }
    }

    fn grouped(links_per_group: &[&[&str]]) -> Validatable {
        let groups = links_per_group
            .iter()
            .enumerate()
            .map(|(i, links)| {
                let mut group = ChannelGroup::new(GroupKey {
                    name: format!("Channel {i}"),
                    logo: String::new(),
                    group: "Test".to_string(),
                });
                group.streams = links.iter().map(|l| StreamRecord::new(*l, "")).collect();
                group
            })
            .collect();
        Validatable::Groups(AggregatedConfig::new(groups))
    }

    fn closed_port() -> u16 {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    #[tokio::test]
    async fn test_every_record_probed_once() {
        let links: Vec<String> = (0..25)
            .map(|i| {
                if i % 2 == 0 {
                    format!("http://x/live{i}.m3u8")
                } else {
                    format!("http://x/dead{i}.m3u8")
                }
            })
            .collect();
        let refs: Vec<&str> = links.iter().map(String::as_str).collect();
        let mut target = grouped(&[&refs[..10], &refs[10..]]);

        let prober = Arc::new(StubProber::default());
        let coordinator = ValidationCoordinator::new(prober.clone(), 10);
        let summary = coordinator.validate(&mut target).await;

        assert_eq!(summary.probed, 25);
        assert_eq!(summary.available, 13);
        let calls = prober.calls.lock().unwrap();
        assert_eq!(calls.len(), 25);
        assert!(calls.values().all(|&count| count == 1));
        drop(calls);

        let Validatable::Groups(config) = &target else {
            panic!("shape changed during validation");
        };
        for stream in config.streams() {
            assert_eq!(stream.available, stream.link.contains("live"));
        }
        assert_eq!(prober.in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_pool_is_bounded_by_worker_count() {
        let links: Vec<String> = (0..40).map(|i| format!("http://x/live{i}.m3u8")).collect();
        let refs: Vec<&str> = links.iter().map(String::as_str).collect();
        let mut target = grouped(&[refs.as_slice()]);

        let prober = Arc::new(StubProber::default());
        ValidationCoordinator::new(prober.clone(), DEFAULT_VALIDATION_WORKERS)
            .validate(&mut target)
            .await;

        assert_eq!(prober.max_in_flight.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn test_fresh_verdict_overwrites_previous_flag() {
        let links: &[&str] = &["http://x/dead.m3u8"];
        let mut target = grouped(&[links]);
        if let Validatable::Groups(config) = &mut target {
            config.groups_mut()[0].streams[0].available = true;
        }

        let coordinator = ValidationCoordinator::new(Arc::new(StubProber::default()), 3);
        let summary = coordinator.validate(&mut target).await;

        assert_eq!(summary.available, 0);
        let Validatable::Groups(config) = &target else {
            panic!("shape changed during validation");
        };
        assert!(!config.groups()[0].streams[0].available);
    }

    #[tokio::test]
    async fn test_flat_entries_are_validated() {
        let entry = |link: &str| FlatEntry {
            id: "1".to_string(),
            logo: "l".to_string(),
            group: "g".to_string(),
            name: "n".to_string(),
            link: link.to_string(),
            available: false,
        };
        let mut target = Validatable::FlatStreams(vec![
            entry("http://x/live.m3u8"),
            entry("http://x/dead.m3u8"),
        ]);

        let coordinator = ValidationCoordinator::new(Arc::new(StubProber::default()), 10);
        let summary = coordinator.validate(&mut target).await;

        assert_eq!(summary.probed, 2);
        let Validatable::FlatStreams(entries) = &target else {
            panic!("shape changed during validation");
        };
        assert!(entries[0].available);
        assert!(!entries[1].available);
    }

    #[tokio::test]
    async fn test_empty_input_returns_immediately() {
        let mut target = Validatable::Groups(AggregatedConfig::default());
        let coordinator = ValidationCoordinator::new(Arc::new(StubProber::default()), 10);
        let summary = tokio::time::timeout(Duration::from_secs(1), coordinator.validate(&mut target))
            .await
            .expect("validation of nothing must not hang");
        assert_eq!(summary.probed, 0);
    }

    #[tokio::test]
    async fn test_unreachable_links_terminate_and_stay_unavailable() {
        let links: Vec<String> = (0..3)
            .map(|i| format!("http://127.0.0.1:{}/stream{i}.m3u8", closed_port()))
            .collect();
        let refs: Vec<&str> = links.iter().map(String::as_str).collect();
        let prober = Arc::new(HttpAvailabilityProber::new(Duration::from_secs(2), "test").unwrap());
        let coordinator = ValidationCoordinator::new(prober, 10);

        for _ in 0..2 {
            let mut target = grouped(&[refs.as_slice()]);
            let summary =
                tokio::time::timeout(Duration::from_secs(10), coordinator.validate(&mut target))
                    .await
                    .expect("coordinator must not deadlock");
            assert_eq!(summary.probed, 3);
            assert_eq!(summary.available, 0);
        }
    }

    #[tokio::test]
    async fn test_zero_workers_is_clamped() {
        let coordinator = ValidationCoordinator::new(Arc::new(StubProber::default()), 0);
        let links: &[&str] = &["http://x/live/a.m3u8", "http://x/dead/b.m3u8"];
        let mut target = grouped(&[links]);

        let summary = tokio::time::timeout(Duration::from_secs(5), coordinator.validate(&mut target))
            .await
            .expect("a single worker still drains the queue");
        assert_eq!(summary.workers, 1);
        assert_eq!(summary.probed, 2);
    }
}
