// Copyright (c) The depfinder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Searching for the dependencies of many targets at once.

use crate::{
    errors::{DisplayErrorChain, FinderError, PoolBuildError, PrepareError},
    finder::{DependencyFinder, Explanation, FinderSettings},
    helpers::plural,
    oracle::{ExecutionOracle, SlotOracle, WorkerSlot},
    order::{TestOrder, check_unique},
    reporter::{BatchReport, UnexplainedTarget},
    store::DependencyStore,
};
use camino::Utf8PathBuf;
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use depfinder_metadata::TestName;
use rayon::ThreadPoolBuilder;
use tracing::{debug, debug_span, warn};

/// Configuration for a [`WorkerPool`].
///
/// Usually built through [`FinderProfile::pool_config`](crate::config::FinderProfile::pool_config).
#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// The number of workers to run. Values below 1 are treated as 1.
    pub workers: usize,

    /// The directory holding every slot's scratch files.
    pub scratch_dir: Utf8PathBuf,

    /// Files that the oracle environment writes, relative to `scratch_dir`.
    pub scratch_files: Vec<Utf8PathBuf>,

    /// Search limits for each target.
    pub settings: FinderSettings,
}

impl PoolConfig {
    /// Creates a configuration with `workers` workers, no scratch files and no search limits.
    pub fn new(workers: usize, scratch_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            workers,
            scratch_dir: scratch_dir.into(),
            scratch_files: Vec::new(),
            settings: FinderSettings::default(),
        }
    }

    /// Returns the slot owned by the worker with the given index.
    pub fn slot(&self, index: usize) -> WorkerSlot {
        WorkerSlot::new(index, &self.scratch_dir, &self.scratch_files)
    }
}

/// A fixed set of workers that search for dependencies of many targets, sharing a single
/// [`DependencyStore`].
pub struct WorkerPool<'a> {
    config: PoolConfig,
    oracle: &'a dyn ExecutionOracle,
}

impl<'a> WorkerPool<'a> {
    /// Creates a new pool. No threads are started until [`run`](Self::run) is called.
    pub fn new(config: PoolConfig, oracle: &'a dyn ExecutionOracle) -> Self {
        Self { config, oracle }
    }

    /// Executes the original and new orders once, on the first worker slot.
    pub fn prepare_orders(
        &self,
        original: Vec<TestName>,
        new: Vec<TestName>,
    ) -> Result<(TestOrder, TestOrder), PrepareError> {
        let mut oracle = SlotOracle::new(self.oracle, self.config.slot(0));
        let mut execute = |tests: Vec<TestName>, which| {
            check_unique(&tests).map_err(|err| PrepareError::Order { which, err })?;
            TestOrder::execute(tests, &mut oracle).map_err(|err| PrepareError::Oracle { which, err })
        };

        let original = execute(original, "original")?;
        let new = execute(new, "new")?;
        Ok((original, new))
    }

    /// Searches for the dependencies of every target, writing them into `store`.
    ///
    /// Failures for individual targets are logged and collected in the returned report. They
    /// don't stop other targets from being searched.
    pub fn run(
        &self,
        targets: impl IntoIterator<Item = TestName>,
        original: &TestOrder,
        new: &TestOrder,
        store: &DependencyStore,
    ) -> Result<BatchReport, PoolBuildError> {
        let workers = self.config.workers.max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|idx| format!("depfinder-worker-{idx}"))
            .build()
            .map_err(|err| PoolBuildError::new(workers, err))?;

        let (queue_sender, queue_receiver) = crossbeam_channel::unbounded();
        let mut target_count = 0;
        for target in targets {
            // The receiver is alive until the end of this function.
            let _ = queue_sender.send(target);
            target_count += 1;
        }
        drop(queue_sender);

        debug!(
            "starting {workers} {} for {target_count} {}",
            plural::workers_str(workers),
            plural::targets_str(target_count),
        );

        let (result_sender, result_receiver) = crossbeam_channel::unbounded();
        pool.scope(|scope| {
            for index in 0..workers {
                let worker = Worker {
                    slot: self.config.slot(index),
                    settings: self.config.settings,
                    oracle: self.oracle,
                    original,
                    new,
                    store,
                    queue: queue_receiver.clone(),
                    results: result_sender.clone(),
                };
                scope.spawn(move |_| worker.run());
            }
        });
        drop(result_sender);

        let mut report = BatchReport::default();
        for (target, result) in result_receiver {
            match result {
                Ok(explanation) => report.explained.push(explanation),
                Err(err) => report.unexplained.push(UnexplainedTarget::new(target, &err)),
            }
        }
        report.finish(store.flatten());

        debug!(
            explained = report.explained.len(),
            unexplained = report.unexplained.len(),
            "worker pool finished"
        );
        Ok(report)
    }
}

type WorkerResult = (TestName, Result<Explanation, FinderError>);

struct Worker<'a> {
    slot: WorkerSlot,
    settings: FinderSettings,
    oracle: &'a dyn ExecutionOracle,
    original: &'a TestOrder,
    new: &'a TestOrder,
    store: &'a DependencyStore,
    queue: Receiver<TestName>,
    results: Sender<WorkerResult>,
}

impl Worker<'_> {
    fn run(self) {
        let index = self.slot.index();
        let mut finder: Option<DependencyFinder<'_>> = None;
        let mut searched = 0;

        loop {
            let target = match self.queue.try_recv() {
                Ok(target) => target,
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            };
            let span = debug_span!("worker", slot = index, target_test = %target);
            let _guard = span.enter();
            searched += 1;

            let current = match finder.take() {
                Some(mut existing) => match existing.retarget(target.clone()) {
                    Ok(()) => Ok(existing),
                    Err(err) => {
                        finder = Some(existing);
                        Err(err)
                    }
                },
                None => DependencyFinder::new(
                    target.clone(),
                    self.original,
                    self.new,
                    self.store,
                    SlotOracle::new(self.oracle, self.slot.clone()),
                    self.settings,
                ),
            };
            let result = current.and_then(|mut current| {
                let result = current.run_dtf();
                finder = Some(current);
                result
            });

            if let Err(err) = &result {
                warn!("{}", DisplayErrorChain::new(err));
            }
            // Failure to send means the receiver was dropped.
            let _ = self.results.send((target, result));
        }

        debug!(slot = index, searched, "worker finished");
    }
}
