//! Bounded worker pool with in-order emission.
//!
//! ```text
//!  walker ──(seq, entry)──▶ [bounded queue] ──▶ worker × N ──(seq, record)──▶ re-sequencer ──▶ sink
//! ```
//!
//! The walker runs on its own thread and blocks once `queue_depth` entries
//! are waiting. Workers finish in any order; the calling thread holds early
//! results until every lower sequence number has been emitted, so output is
//! identical for any worker count.
//!
//! The walker also takes one permit per entry from a pool of `window`, and
//! a permit only comes back when its record reaches the sink. One slow file
//! therefore stalls the walk after `window` entries instead of letting held
//! records pile up behind it.
//!
//! On shutdown the walker stops, queued entries are dropped, and nothing
//! further reaches the sink. What was emitted is always a gap-free prefix of
//! the full run.

use super::shutdown::{EitherStop, ShutdownCheck};
use crate::discovery::WalkEntry;
use crate::engine::Engine;
use crate::outcome::{FileRecord, Outcome};
use crossbeam_channel::{SendTimeoutError, Sender};
use std::collections::BTreeMap;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tracing::debug;

/// Queue slots per worker when no explicit depth is given.
const QUEUE_SLOTS_PER_WORKER: usize = 4;

/// Unemitted entries allowed per worker, queued, running or held for order.
const WINDOW_SLOTS_PER_WORKER: usize = 16;

/// How often a walker waiting for a permit rechecks for shutdown.
const PERMIT_POLL: Duration = Duration::from_millis(50);

/// Worker pool sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    pub workers: usize,
    /// Walk entries allowed to wait for a worker.
    pub queue_depth: usize,
    /// Walk entries allowed between the walker and the sink.
    pub window: usize,
}

impl PipelineConfig {
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            workers,
            queue_depth: workers * QUEUE_SLOTS_PER_WORKER,
            window: workers * WINDOW_SLOTS_PER_WORKER,
        }
    }

    /// One worker per available CPU.
    pub fn from_available_parallelism() -> Self {
        Self::new(thread::available_parallelism().map_or(1, |n| n.get()))
    }
}

/// What happened during a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PipelineStats {
    pub emitted: usize,
    pub interrupted: bool,
}

/// Check every walk entry with `engine`, passing records to `sink` in walk order.
///
/// The first error returned by `sink` stops the run, including any external
/// tool still running, and is returned.
pub fn run_pipeline<I, F>(
    entries: I,
    engine: &Engine,
    config: PipelineConfig,
    shutdown: &dyn ShutdownCheck,
    mut sink: F,
) -> io::Result<PipelineStats>
where
    I: Iterator<Item = WalkEntry> + Send,
    F: FnMut(FileRecord) -> io::Result<()>,
{
    let workers = config.workers.max(1);
    let window = config.window.max(1);
    let sink_failed = AtomicBool::new(false);
    let stop = EitherStop {
        first: shutdown,
        second: &sink_failed,
    };

    thread::scope(|scope| {
        let (job_tx, job_rx) =
            crossbeam_channel::bounded::<(u64, WalkEntry)>(config.queue_depth.min(window));
        let (result_tx, result_rx) = crossbeam_channel::bounded::<(u64, FileRecord)>(window);
        let (permit_tx, permit_rx) = crossbeam_channel::bounded::<()>(window);

        scope.spawn(move || {
            let mut entries = entries;
            for seq in 0u64.. {
                if !acquire_permit(&permit_tx, &stop) {
                    break;
                }
                let Some(entry) = entries.next() else {
                    break;
                };
                if stop.should_stop() || job_tx.send((seq, entry)).is_err() {
                    break;
                }
            }
        });

        for _ in 0..workers {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            scope.spawn(move || {
                for (seq, entry) in job_rx.iter() {
                    if stop.should_stop() {
                        break;
                    }
                    let record = check_entry(engine, entry, &stop);
                    // A check cut short by shutdown is not a real result.
                    if stop.should_stop() || result_tx.send((seq, record)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(job_rx);
        drop(result_tx);

        let mut next = 0u64;
        let mut pending = BTreeMap::new();
        let mut stats = PipelineStats::default();
        let mut failure = None;

        'receive: for (seq, record) in result_rx.iter() {
            pending.insert(seq, record);
            while let Some(record) = pending.remove(&next) {
                if shutdown.should_stop() {
                    break 'receive;
                }
                if let Err(e) = sink(record) {
                    sink_failed.store(true, Ordering::SeqCst);
                    failure = Some(e);
                    break 'receive;
                }
                let _ = permit_rx.try_recv();
                next += 1;
                stats.emitted += 1;
            }
        }
        // Unblocks a walker waiting for a permit and any worker waiting to
        // hand over a result.
        drop(permit_rx);
        drop(result_rx);

        if !pending.is_empty() {
            debug!(dropped = pending.len(), "Discarding records after an ordering gap");
        }
        stats.interrupted = shutdown.should_stop();

        match failure {
            Some(e) => Err(e),
            None => Ok(stats),
        }
    })
}

/// Block until a window slot is free. False once the run is stopping.
fn acquire_permit(permits: &Sender<()>, stop: &dyn ShutdownCheck) -> bool {
    loop {
        match permits.send_timeout((), PERMIT_POLL) {
            Ok(()) => return true,
            Err(SendTimeoutError::Timeout(())) if !stop.should_stop() => continue,
            Err(_) => return false,
        }
    }
}

fn check_entry(engine: &Engine, entry: WalkEntry, stop: &dyn ShutdownCheck) -> FileRecord {
    match entry {
        WalkEntry::File(path) => engine.check_until(&path, stop),
        WalkEntry::Error { path, message } => {
            FileRecord::unclassified(path, 0, Outcome::path_error(message))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::{DirectoryWalker, WalkConfig};
    use crate::engine::Mode;
    use crate::registry::Registry;
    use crate::runtime::{NeverShutdown, ShutdownFlag};
    use crate::verifier::Invoker;
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;
    use tempfile::TempDir;

    fn engine() -> Engine {
        Engine::new(
            Arc::new(Registry::builtin().unwrap()),
            Invoker::default(),
            Mode::Verify,
        )
    }

    fn tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        for i in 0..40 {
            let sub = dir.path().join(format!("d{}", i % 5));
            fs::create_dir_all(&sub).unwrap();
            fs::write(sub.join(format!("f{i:02}.json")), format!("{{\"n\": {i}}}")).unwrap();
            fs::write(sub.join(format!("g{i:02}.txt")), "text").unwrap();
        }
        fs::write(dir.path().join("broken.json"), "{").unwrap();
        dir
    }

    fn collect(root: &Path, workers: usize) -> Vec<FileRecord> {
        let walker = DirectoryWalker::new(WalkConfig::default());
        let mut records = Vec::new();
        let stats = run_pipeline(
            walker.walk(root),
            &engine(),
            PipelineConfig::new(workers),
            &NeverShutdown,
            |record| {
                records.push(record);
                Ok(())
            },
        )
        .unwrap();
        assert_eq!(stats.emitted, records.len());
        assert!(!stats.interrupted);
        records
    }

    #[test]
    fn test_output_is_identical_for_any_worker_count() {
        let dir = tree();
        let serial = collect(dir.path(), 1);
        assert_eq!(serial.len(), 81);
        for workers in [2, 3, 8] {
            assert_eq!(collect(dir.path(), workers), serial, "workers = {workers}");
        }
    }

    #[test]
    fn test_records_follow_walk_order() {
        let dir = tree();
        let walker = DirectoryWalker::new(WalkConfig::default());
        let walked: Vec<PathBuf> = walker
            .walk(dir.path())
            .map(|e| e.path().to_path_buf())
            .collect();
        let emitted: Vec<PathBuf> = collect(dir.path(), 4).into_iter().map(|r| r.path).collect();
        assert_eq!(emitted, walked);
    }

    #[test]
    fn test_walk_errors_become_path_errors() {
        let entries = vec![WalkEntry::Error {
            path: PathBuf::from("/unreadable"),
            message: "permission denied".into(),
        }];
        let mut records = Vec::new();
        run_pipeline(
            entries.into_iter(),
            &engine(),
            PipelineConfig::new(2),
            &NeverShutdown,
            |r| {
                records.push(r);
                Ok(())
            },
        )
        .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].outcome, Outcome::path_error("permission denied"));
    }

    #[test]
    fn test_shutdown_before_start_emits_nothing() {
        let dir = tree();
        let flag = ShutdownFlag::manual();
        flag.trigger();
        let walker = DirectoryWalker::new(WalkConfig::default());
        let mut count = 0;
        let stats = run_pipeline(
            walker.walk(dir.path()),
            &engine(),
            PipelineConfig::new(4),
            &flag,
            |_| {
                count += 1;
                Ok(())
            },
        )
        .unwrap();
        assert_eq!(count, 0);
        assert!(stats.interrupted);
    }

    #[test]
    fn test_shutdown_mid_run_leaves_ordered_prefix() {
        let dir = tree();
        let full = collect(dir.path(), 1);

        let flag = ShutdownFlag::manual();
        let walker = DirectoryWalker::new(WalkConfig::default());
        let mut records = Vec::new();
        let stats = run_pipeline(
            walker.walk(dir.path()),
            &engine(),
            PipelineConfig::new(4),
            &flag,
            |record| {
                records.push(record);
                if records.len() == 10 {
                    flag.trigger();
                }
                Ok(())
            },
        )
        .unwrap();

        assert!(stats.interrupted);
        assert_eq!(records.len(), 10);
        assert_eq!(records[..], full[..10]);
    }

    #[test]
    fn test_sink_error_stops_run() {
        let dir = tree();
        let walker = DirectoryWalker::new(WalkConfig::default());
        let mut seen = 0;
        let err = run_pipeline(
            walker.walk(dir.path()),
            &engine(),
            PipelineConfig::new(2),
            &NeverShutdown,
            |_| {
                seen += 1;
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
            },
        )
        .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        assert_eq!(seen, 1);
    }

    /// Counts how many entries the pipeline has pulled from the walk.
    struct Counted<I> {
        inner: I,
        pulled: Arc<AtomicUsize>,
    }

    impl<I: Iterator> Iterator for Counted<I> {
        type Item = I::Item;

        fn next(&mut self) -> Option<I::Item> {
            let item = self.inner.next();
            if item.is_some() {
                self.pulled.fetch_add(1, Ordering::SeqCst);
            }
            item
        }
    }

    #[test]
    fn test_slow_sink_bounds_walk_ahead() {
        let pulled = Arc::new(AtomicUsize::new(0));
        let entries = Counted {
            inner: (0..5000).map(|i| WalkEntry::Error {
                path: PathBuf::from(format!("/gone/{i}")),
                message: "missing".into(),
            }),
            pulled: Arc::clone(&pulled),
        };
        let config = PipelineConfig::new(2);
        let mut pulled_during_first = None;

        let stats = run_pipeline(entries, &engine(), config, &NeverShutdown, |_| {
            if pulled_during_first.is_none() {
                thread::sleep(Duration::from_millis(300));
                pulled_during_first = Some(pulled.load(Ordering::SeqCst));
            }
            Ok(())
        })
        .unwrap();

        assert_eq!(stats.emitted, 5000);
        let ahead = pulled_during_first.unwrap();
        assert!(ahead <= config.window, "walked {ahead} entries ahead of the sink");
    }

    #[cfg(unix)]
    #[test]
    fn test_sink_error_stops_running_tool() {
        use crate::config::Config;

        let config = Config::from_toml_str(
            r#"
[[filetype]]
description = "Fake data"
extension = ".fake"
handler = "fake"

[handler.fake]
argv = ["sh", "-c", "case \"$1\" in *fast*) exit 0 ;; *) sleep 30 ;; esac", "sh"]
"#,
            "test",
        )
        .unwrap();
        let engine = Engine::new(
            Arc::new(Registry::from_config(&config).unwrap()),
            Invoker::default(),
            Mode::Verify,
        );
        let dir = TempDir::new().unwrap();
        let fast = dir.path().join("fast.fake");
        let slow = dir.path().join("slow.fake");
        fs::write(&fast, "x").unwrap();
        fs::write(&slow, "x").unwrap();

        let started = Instant::now();
        let err = run_pipeline(
            vec![WalkEntry::File(fast), WalkEntry::File(slow)].into_iter(),
            &engine,
            PipelineConfig::new(2),
            &NeverShutdown,
            |_| Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed")),
        )
        .unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
