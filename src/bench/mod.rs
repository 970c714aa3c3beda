//! DUALLOG - Benchmark Driver
//! Runs the measured phases (insert, full retrieval, windowed retrieval,
//! removal by identifier, teardown) against a `DualLog` and collects the
//! timings into a `BenchmarkReport`.

pub mod report;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Instant;

use rand::rngs::SmallRng;
use rand::{Rng, RngCore, SeedableRng};

use crate::config::{Config, InsertMode};
use crate::engine::DualLog;
use crate::error::{DualLogError, Result};
use crate::store::OrderedLogStore;
use crate::types::{LogKind, Payload, Score, ScoreBound};

pub use self::report::{BenchmarkReport, ConsistencyWarning, Operation, OperationReport};

/// Identifier the `index`-th inserted item is indexed under.
pub fn identifier(index: u64) -> String {
    format!("coalesce_{}", index)
}

/// Random bytes led by the item index, so no two items share a payload once
/// `size` reaches `MIN_BLOB_SIZE`.
fn random_blob(rng: &mut SmallRng, size: usize, index: u64) -> Payload {
    let mut blob = vec![0u8; size];
    let stamp = index.to_le_bytes();
    let stamped = stamp.len().min(size);
    blob[..stamped].copy_from_slice(&stamp[..stamped]);
    rng.fill_bytes(&mut blob[stamped..]);
    Payload::from(blob)
}

fn insert_item<S: OrderedLogStore>(
    log: &DualLog<S>,
    config: &Config,
    rng: &mut SmallRng,
    index: u64,
) -> Result<Score> {
    let payload = random_blob(rng, config.blob_size, index);
    let prepend = LogKind::for_index(index, config.prepend_pct) == LogKind::Prepend;
    log.insert(&identifier(index), payload, prepend)
}

/// Drives one benchmark run.
///
/// Phases are public so callers can interleave their own work (e.g. a
/// store snapshot after inserting); [`BenchmarkDriver::run`] chains them all.
pub struct BenchmarkDriver<S> {
    log: DualLog<S>,
    config: Config,
    rng: SmallRng,
    /// Indices of items that have not been removed yet.
    live: Vec<u64>,
    warnings: Vec<ConsistencyWarning>,
}

impl<S: OrderedLogStore> BenchmarkDriver<S> {
    /// Validate `config` and build a driver over a fresh dual log on `store`.
    pub fn new(store: S, config: Config) -> Result<Self> {
        config.validate()?;
        let log = DualLog::new(store, &config.key_base_name, config.timestamp_step);
        Ok(Self::with_log(log, config))
    }

    /// Driver over an existing dual log; `config` is assumed valid.
    pub fn with_log(log: DualLog<S>, config: Config) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };
        Self {
            log,
            config,
            rng,
            live: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn log(&self) -> &DualLog<S> {
        &self.log
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Identifiers inserted and not yet removed.
    pub fn live_identifiers(&self) -> impl Iterator<Item = String> + '_ {
        self.live.iter().map(|&i| identifier(i))
    }

    /// Consistency warnings recorded so far.
    pub fn warnings(&self) -> &[ConsistencyWarning] {
        &self.warnings
    }

    /// Wipe the store so the run starts from nothing.
    pub fn prepare(&mut self) -> Result<()> {
        self.log.store().flush_namespace()?;
        self.live.clear();
        self.warnings.clear();
        Ok(())
    }

    /// Run every phase in order.
    pub fn run(&mut self) -> Result<BenchmarkReport> {
        self.prepare()?;
        let operations = vec![
            self.insert_phase()?,
            self.retrieve_all_phase()?,
            self.retrieve_window_phase()?,
            self.remove_phase()?,
            self.teardown_phase()?,
        ];
        Ok(BenchmarkReport {
            operations,
            warnings: self.warnings.clone(),
        })
    }

    /// Insert `number_of_items` random blobs, routing each by the prepend ratio.
    pub fn insert_phase(&mut self) -> Result<OperationReport> {
        let items = self.config.number_of_items;
        log::info!(
            "Running append/prepend benchmark by inserting {} items ({} byte blobs), {}% prepends, {:?}",
            items,
            self.config.blob_size,
            self.config.prepend_pct,
            self.config.insert_mode
        );

        let start = Instant::now();
        match self.config.insert_mode {
            InsertMode::Sequential => {
                for i in 0..items {
                    insert_item(&self.log, &self.config, &mut self.rng, i)?;
                }
            }
            InsertMode::Parallel { workers } => self.insert_parallel(workers)?,
        }
        let elapsed = start.elapsed();

        self.live = (0..items).collect();
        let report = OperationReport::new(Operation::Insert, items, items, elapsed);
        log::info!(
            "Appending/prepending {} items took {:?}, average duration was {:?}",
            items,
            report.elapsed,
            report.average
        );
        Ok(report)
    }

    /// Spread inserts across `workers` scoped threads pulling indices from a
    /// shared counter, and wait for all of them.
    ///
    /// The first failing insert records its error and raises an abort flag.
    /// Other workers finish the insert they are in the middle of, then stop.
    /// The first error is returned once every worker has joined; a worker
    /// panic becomes `WorkerPanicked`.
    fn insert_parallel(&mut self, workers: usize) -> Result<()> {
        let items = self.config.number_of_items;
        let next = AtomicU64::new(0);
        let abort = AtomicBool::new(false);
        let first_error: Mutex<Option<DualLogError>> = Mutex::new(None);
        let seeds: Vec<u64> = (0..workers).map(|_| self.rng.gen()).collect();

        let log = &self.log;
        let config = &self.config;
        let panicked = thread::scope(|scope| {
            let handles: Vec<_> = seeds
                .into_iter()
                .map(|seed| {
                    let (next, abort, first_error) = (&next, &abort, &first_error);
                    scope.spawn(move || {
                        let mut rng = SmallRng::seed_from_u64(seed);
                        while !abort.load(Ordering::Acquire) {
                            let i = next.fetch_add(1, Ordering::Relaxed);
                            if i >= items {
                                break;
                            }
                            if let Err(err) = insert_item(log, config, &mut rng, i) {
                                abort.store(true, Ordering::Release);
                                let mut slot = first_error
                                    .lock()
                                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                                if slot.is_none() {
                                    *slot = Some(err);
                                }
                                break;
                            }
                        }
                    })
                })
                .collect();

            handles
                .into_iter()
                .map(|handle| handle.join())
                .filter(|joined| joined.is_err())
                .count()
        });

        let first_error = first_error
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(err) = first_error {
            return Err(err);
        }
        if panicked > 0 {
            return Err(DualLogError::WorkerPanicked);
        }
        Ok(())
    }

    /// Read the full timeline `number_of_retrievals` times.
    pub fn retrieve_all_phase(&mut self) -> Result<OperationReport> {
        let iterations = u64::from(self.config.number_of_retrievals);
        log::info!(
            "Running {} retrievals of all {} items",
            iterations,
            self.live.len()
        );
        self.timed_retrievals(
            Operation::RetrieveAll,
            ScoreBound::NegInfinity,
            ScoreBound::PosInfinity,
        )
    }

    /// Read the timeline from the midpoint of the inserted score range onward.
    pub fn retrieve_window_phase(&mut self) -> Result<OperationReport> {
        let half = i64::try_from(self.config.number_of_items / 2).unwrap_or(i64::MAX);
        let clock = self.log.clock();
        let window_start = clock
            .seed()
            .saturating_add(half.saturating_mul(clock.step()));
        log::info!(
            "Running {} retrievals of items after timestamp {}",
            self.config.number_of_retrievals,
            window_start
        );
        self.timed_retrievals(
            Operation::RetrieveWindow,
            ScoreBound::Inclusive(window_start),
            ScoreBound::PosInfinity,
        )
    }

    fn timed_retrievals(
        &mut self,
        operation: Operation,
        min: ScoreBound,
        max: ScoreBound,
    ) -> Result<OperationReport> {
        let iterations = u64::from(self.config.number_of_retrievals);
        let mut retrieved = 0;

        let start = Instant::now();
        for _ in 0..iterations {
            retrieved = self.log.retrieve_range(min, max)?.len() as u64;
        }
        let elapsed = start.elapsed();

        let report = OperationReport::new(operation, retrieved, iterations, elapsed);
        log::info!(
            "Retrieving {} items took {:?} for {} iterations, average duration was {:?}",
            retrieved,
            report.elapsed,
            iterations,
            report.average
        );
        Ok(report)
    }

    /// Remove `items_to_remove` uniformly random live items by identifier,
    /// then check that the surviving count adds up.
    pub fn remove_phase(&mut self) -> Result<OperationReport> {
        let removals = self.config.items_to_remove.min(self.live.len() as u64);
        log::info!(
            "Running remove by coalesce key benchmark by removing {} items in random locations",
            removals
        );

        let start = Instant::now();
        for _ in 0..removals {
            let pick = self.rng.gen_range(0..self.live.len());
            let index = self.live.swap_remove(pick);
            let identifier = identifier(index);

            let removal = self.log.remove(&identifier)?;
            if removal.removed != 1 {
                self.warnings.push(ConsistencyWarning::RemovalCount {
                    identifier,
                    log: removal.placement.log,
                    score: removal.placement.score,
                    removed: removal.removed,
                });
            }
        }
        let elapsed = start.elapsed();

        let report = OperationReport::new(Operation::RemoveById, removals, removals, elapsed);
        log::info!(
            "Removing {} items by coalesce key took {:?}, average duration was {:?}",
            removals,
            report.elapsed,
            report.average
        );

        let expected = self.live.len() as u64;
        let append = self.log.count(LogKind::Append)?;
        let prepend = self.log.count(LogKind::Prepend)?;
        if append + prepend != expected {
            let warning = ConsistencyWarning::LiveCount {
                expected,
                append,
                prepend,
            };
            log::warn!("{}", warning);
            self.warnings.push(warning);
        }

        Ok(report)
    }

    /// Drop both logs and the whole coalesce index.
    pub fn teardown_phase(&mut self) -> Result<OperationReport> {
        let items = self.config.number_of_items;
        log::info!("Running termination benchmark of all {} items", items);

        let start = Instant::now();
        let index_entries = self.log.clear_all(self.config.scan_batch_size)?;
        let elapsed = start.elapsed();

        self.live.clear();
        log::info!(
            "Termination of all {} items took {:?} ({} index entries deleted)",
            items,
            elapsed,
            index_entries
        );
        Ok(OperationReport::new(Operation::Teardown, items, 1, elapsed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::clock::LogicalClock;
    use crate::store::MemoryStore;

    fn small_config() -> Config {
        Config::new("t")
            .with_items(200)
            .with_prepend_pct(30)
            .with_blob_size(16)
            .with_removals(20)
            .with_retrievals(3)
            .with_scan_batch_size(16)
            .with_seed(7)
    }

    fn driver(config: Config) -> BenchmarkDriver<MemoryStore> {
        BenchmarkDriver::new(MemoryStore::new(), config).unwrap()
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = small_config().with_prepend_pct(150);
        assert!(matches!(
            BenchmarkDriver::new(MemoryStore::new(), config),
            Err(DualLogError::Config(_))
        ));
    }

    #[test]
    fn test_insert_phase_split() {
        let mut driver = driver(small_config());
        driver.prepare().unwrap();
        let report = driver.insert_phase().unwrap();

        assert_eq!(report.item_count, 200);
        assert_eq!(driver.log().count(LogKind::Prepend).unwrap(), 60);
        assert_eq!(driver.log().count(LogKind::Append).unwrap(), 140);
        assert_eq!(driver.live_identifiers().count(), 200);
    }

    #[test]
    fn test_parallel_insert_phase() {
        let config = small_config().with_insert_mode(InsertMode::Parallel { workers: 4 });
        let mut driver = driver(config);
        driver.prepare().unwrap();
        driver.insert_phase().unwrap();

        assert_eq!(driver.log().count(LogKind::Prepend).unwrap(), 60);
        assert_eq!(driver.log().count(LogKind::Append).unwrap(), 140);
        for id in driver.live_identifiers() {
            assert!(driver.log().index().lookup(driver.log().store(), &id).is_ok());
        }
    }

    #[test]
    fn test_retrieval_phases_count_items() {
        let log = DualLog::with_clock(MemoryStore::new(), "t", LogicalClock::new(0, 10));
        let mut driver = BenchmarkDriver::with_log(log, small_config());
        driver.insert_phase().unwrap();

        let all = driver.retrieve_all_phase().unwrap();
        assert_eq!(all.item_count, 200);
        assert_eq!(all.iterations, 3);

        // Window opens at score 100 * 10: items 100..200.
        let window = driver.retrieve_window_phase().unwrap();
        assert_eq!(window.item_count, 100);
    }

    #[test]
    fn test_window_follows_the_log_clock() {
        // Clock step and seed disagree with the config's timestamp_step.
        let log = DualLog::with_clock(MemoryStore::new(), "t", LogicalClock::new(-500, 3));
        let config = small_config().with_items(51).with_removals(0);
        let mut driver = BenchmarkDriver::with_log(log, config);
        driver.insert_phase().unwrap();

        // Window opens at -500 + 25 * 3: items 25..51.
        let window = driver.retrieve_window_phase().unwrap();
        assert_eq!(window.item_count, 26);
    }

    #[test]
    fn test_remove_phase_conserves_count() {
        let mut driver = driver(small_config());
        driver.prepare().unwrap();
        driver.insert_phase().unwrap();
        let report = driver.remove_phase().unwrap();

        assert_eq!(report.item_count, 20);
        assert_eq!(driver.log().live_count().unwrap(), 180);
        assert_eq!(driver.live_identifiers().count(), 180);
        assert!(driver.warnings().is_empty());
    }

    #[test]
    fn test_remove_phase_flags_missing_entries() {
        let mut driver = driver(small_config().with_removals(200));
        driver.prepare().unwrap();
        driver.insert_phase().unwrap();

        // Drop the prepend log behind the index's back.
        let prepend_key = driver.log().log_key(LogKind::Prepend).to_string();
        driver.log().store().delete(&[prepend_key]).unwrap();

        driver.remove_phase().unwrap();
        let removal_warnings = driver
            .warnings()
            .iter()
            .filter(|w| matches!(w, ConsistencyWarning::RemovalCount { removed: 0, .. }))
            .count();
        assert_eq!(removal_warnings, 60);
    }

    #[test]
    fn test_run_leaves_nothing_behind() {
        let mut driver = driver(small_config());
        let report = driver.run().unwrap();

        let names: Vec<_> = report.operations.iter().map(|r| r.operation).collect();
        assert_eq!(
            names,
            vec![
                Operation::Insert,
                Operation::RetrieveAll,
                Operation::RetrieveWindow,
                Operation::RemoveById,
                Operation::Teardown,
            ]
        );
        assert!(report.warnings.is_empty());
        assert!(driver.log().store().is_empty().unwrap());
    }

    #[test]
    fn test_seeded_runs_pick_same_targets() {
        let survivors = |seed| {
            let mut driver = driver(small_config().with_seed(seed));
            driver.prepare().unwrap();
            driver.insert_phase().unwrap();
            driver.remove_phase().unwrap();
            let mut ids: Vec<String> = driver.live_identifiers().collect();
            ids.sort();
            ids
        };
        assert_eq!(survivors(11), survivors(11));
    }
}
