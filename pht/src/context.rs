//! Concurrent construction driver.
//!
//! A [`Context`] runs randomized construction attempts on a pool of worker threads until one of
//! them produces a solution, every size has exhausted its attempt budget, the deadline passes or
//! the caller requests a shutdown.
//!
//! The outcome is published through four manual-reset signals. Exactly one of
//! [`Signal::Succeeded`] and [`Signal::Failed`] is raised per run, and [`Signal::Completed`] is
//! raised once after every worker has stopped.
//!
//! The search itself is abstracted by [`Solver`], which keeps the driver independent of the
//! construction algorithm.

use crate::error::{Error, Result};
use core::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use core::time::Duration;
use log::{debug, info, trace};
use parking_lot::{Condvar, Mutex};
use rapidhash::RapidRng;
use std::time::Instant;

/// Tunables of a construction run.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub struct ContextConfig {
    /// Number of worker threads. Zero selects the number of available processors.
    pub maximum_concurrency: usize,
    /// Attempts started at one graph size before the graph is grown.
    pub attempts_per_size: u32,
    /// Number of times the graph may be grown before construction gives up.
    pub max_resizes: u32,
    /// Wall-clock budget for the whole run.
    pub timeout: Option<Duration>,
}

impl Default for ContextConfig {
    #[inline]
    fn default() -> Self {
        Self {
            maximum_concurrency: 0,
            attempts_per_size: 256,
            max_resizes: 5,
            timeout: None,
        }
    }
}

impl ContextConfig {
    /// Set [`ContextConfig::maximum_concurrency`].
    #[inline]
    #[must_use]
    pub const fn with_maximum_concurrency(mut self, workers: usize) -> Self {
        self.maximum_concurrency = workers;
        self
    }

    /// Set [`ContextConfig::attempts_per_size`].
    #[inline]
    #[must_use]
    pub const fn with_attempts_per_size(mut self, attempts: u32) -> Self {
        self.attempts_per_size = attempts;
        self
    }

    /// Set [`ContextConfig::max_resizes`].
    #[inline]
    #[must_use]
    pub const fn with_max_resizes(mut self, resizes: u32) -> Self {
        self.max_resizes = resizes;
        self
    }

    /// Set [`ContextConfig::timeout`].
    #[inline]
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Number of workers to spawn.
    #[inline]
    pub fn worker_count(&self) -> usize {
        if self.maximum_concurrency == 0 {
            std::thread::available_parallelism().map_or(1, core::num::NonZeroUsize::get)
        } else {
            self.maximum_concurrency
        }
    }
}

/// Manual-reset signals published by a [`Context`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Signal {
    /// The caller asked the run to stop.
    Shutdown,
    /// A worker found a solution.
    Succeeded,
    /// The run ended without a solution.
    Failed,
    /// Every worker has stopped.
    Completed,
}

impl Signal {
    /// Every signal, in index order.
    pub const ALL: [Self; 4] = [Self::Shutdown, Self::Succeeded, Self::Failed, Self::Completed];

    const fn index(self) -> usize {
        match self {
            Self::Shutdown => 0,
            Self::Succeeded => 1,
            Self::Failed => 2,
            Self::Completed => 3,
        }
    }

    /// Prefix of the signal's name. The full name appends the context's token.
    #[inline]
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Shutdown => "PerfectHashTableContext_ShutdownEvent_",
            Self::Succeeded => "PerfectHashTableContext_SucceededEvent_",
            Self::Failed => "PerfectHashTableContext_FailedEvent_",
            Self::Completed => "PerfectHashTableContext_CompletedEvent_",
        }
    }
}

/// Signal state guarded by [`Signals::state`].
#[derive(Default)]
struct SignalState {
    /// Whether each signal is currently set.
    set: [bool; 4],
    /// How many times each signal was raised.
    raised: [u32; 4],
}

/// Manual-reset events with waiters.
#[derive(Default)]
struct Signals {
    state: Mutex<SignalState>,
    changed: Condvar,
}

/// Summary of a finished construction run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub struct ConstructionStats {
    /// Attempts started across all workers.
    pub attempts: u64,
    /// Number of times the graph was grown.
    pub resizes: u32,
    /// Index of the worker that produced the solution.
    pub winning_worker: u32,
    /// Number of the winning attempt, counting from one.
    pub winning_attempt: u64,
    /// Wall-clock duration of the run in microseconds.
    pub solve_micros: u64,
}

impl ConstructionStats {
    /// Assemble statistics from their parts.
    #[inline]
    #[must_use]
    pub const fn new(
        attempts: u64,
        resizes: u32,
        winning_worker: u32,
        winning_attempt: u64,
        solve_micros: u64,
    ) -> Self {
        Self {
            attempts,
            resizes,
            winning_worker,
            winning_attempt,
            solve_micros,
        }
    }
}

/// A winning solution together with its statistics.
#[derive(Debug)]
#[non_exhaustive]
pub struct Solved<T> {
    /// The first solution published.
    pub solution: T,
    /// Statistics of the run.
    pub stats: ConstructionStats,
}

/// A randomized search run by [`Context::solve`].
///
/// Attempts are grouped into size rounds: round zero is the initial size, and every later round is
/// one resize further. Each worker owns one [`Solver::Worker`], prepared again whenever it moves to
/// a new round.
pub trait Solver: Sync {
    /// Result of a successful attempt.
    type Solution: Send;
    /// Per-thread scratch state.
    type Worker;

    /// Create scratch state for one worker thread.
    ///
    /// # Errors
    ///
    /// Allocation failures are reported as the run's error.
    fn new_worker(&self) -> Result<Self::Worker>;

    /// Make `worker` ready for attempts in size round `round`.
    ///
    /// # Errors
    ///
    /// Allocation failures are reported as the run's error.
    fn prepare(&self, worker: &mut Self::Worker, round: u32) -> Result<()>;

    /// Whether size round `round` exists.
    fn has_round(&self, round: u32) -> bool;

    /// Run one attempt. `Ok(None)` means this attempt found nothing.
    ///
    /// # Errors
    ///
    /// An error aborts the whole run.
    fn attempt(
        &self,
        worker: &mut Self::Worker,
        attempt: &mut Attempt<'_>,
    ) -> Result<Option<Self::Solution>>;
}

/// Identity of one attempt, handed to [`Solver::attempt`].
pub struct Attempt<'c> {
    number: u64,
    worker: usize,
    round: u32,
    rng: &'c mut RapidRng,
    context: &'c Context,
}

impl Attempt<'_> {
    /// Attempt number, counting from one across all workers.
    #[inline]
    pub const fn number(&self) -> u64 {
        self.number
    }

    /// Index of the worker running the attempt.
    #[inline]
    pub const fn worker(&self) -> usize {
        self.worker
    }

    /// Size round of the attempt.
    #[inline]
    pub const fn round(&self) -> u32 {
        self.round
    }

    /// Per-worker random stream for drawing seeds.
    #[inline]
    pub fn rng(&mut self) -> &mut RapidRng {
        self.rng
    }

    /// The context running the attempt.
    #[inline]
    pub const fn context(&self) -> &Context {
        self.context
    }

    /// Whether the attempt should be abandoned.
    #[inline]
    pub fn should_stop(&self) -> bool {
        self.context.should_stop()
    }
}

/// Search state stored in [`Context::state`].
const SEARCHING: u8 = 0;
/// A solution has been published.
const SUCCEEDED: u8 = 1;
/// The run ended without a solution.
const FAILED: u8 = 2;

/// The winning solution as captured by a worker.
struct Winner<T> {
    solution: T,
    worker: usize,
    attempt: u64,
}

/// Construction context: worker pool, outcome state and signals of a single run.
///
/// A context is single-use; a second call to [`Context::solve`] is rejected.
pub struct Context {
    config: ContextConfig,
    names: [String; 4],
    /// One of [`SEARCHING`], [`SUCCEEDED`] and [`FAILED`]; leaves `SEARCHING` exactly once.
    state: AtomicU8,
    /// Current size round in the upper half, attempts claimed in that round in the lower half.
    progress: AtomicU64,
    attempts: AtomicU64,
    shutdown: AtomicBool,
    started: AtomicBool,
    error: Mutex<Option<Error>>,
    signals: Signals,
}

impl Default for Context {
    #[inline]
    fn default() -> Self {
        Self::new(ContextConfig::default())
    }
}

/// Pack a round and an attempt count into a [`Context::progress`] word.
const fn pack(round: u32, count: u32) -> u64 {
    ((round as u64) << 32) | count as u64
}

/// Inverse of [`pack`].
#[allow(clippy::cast_possible_truncation, reason = "splitting into halves")]
const fn unpack(progress: u64) -> (u32, u32) {
    ((progress >> 32) as u32, progress as u32)
}

impl Context {
    /// Create a context with a fresh random signal-name token.
    #[inline]
    pub fn new(config: ContextConfig) -> Self {
        let token: u64 = rand::random();
        let names = Signal::ALL.map(|signal| format!("{}{token:016x}", signal.prefix()));
        Self {
            config,
            names,
            state: AtomicU8::new(SEARCHING),
            progress: AtomicU64::new(pack(0, 0)),
            attempts: AtomicU64::new(0),
            shutdown: AtomicBool::new(false),
            started: AtomicBool::new(false),
            error: Mutex::new(None),
            signals: Signals::default(),
        }
    }

    /// The configuration of this context.
    #[inline]
    pub const fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Name of `signal`, unique to this context.
    #[inline]
    pub fn signal_name(&self, signal: Signal) -> &str {
        &self.names[signal.index()]
    }

    /// Ask the run to stop. Workers notice at their next cancellation check.
    #[inline]
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        self.raise(Signal::Shutdown);
    }

    /// Whether `signal` is set.
    #[inline]
    pub fn is_set(&self, signal: Signal) -> bool {
        self.signals.state.lock().set[signal.index()]
    }

    /// How many times `signal` has been raised.
    #[inline]
    pub fn raised_count(&self, signal: Signal) -> u32 {
        self.signals.state.lock().raised[signal.index()]
    }

    /// Block until `signal` is set.
    #[inline]
    pub fn wait(&self, signal: Signal) {
        let mut state = self.signals.state.lock();
        while !state.set[signal.index()] {
            self.signals.changed.wait(&mut state);
        }
    }

    /// Block until `signal` is set or `timeout` elapses. Returns whether the signal is set.
    #[inline]
    pub fn wait_timeout(&self, signal: Signal, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.signals.state.lock();
        while !state.set[signal.index()] {
            if self
                .signals
                .changed
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                return state.set[signal.index()];
            }
        }
        true
    }

    /// Attempts started so far.
    #[inline]
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Acquire)
    }

    /// Whether workers should stop: a shutdown was requested or the outcome is decided.
    #[inline]
    pub fn should_stop(&self) -> bool {
        self.shutdown.load(Ordering::Acquire) || self.state.load(Ordering::Acquire) != SEARCHING
    }

    fn raise(&self, signal: Signal) {
        let mut state = self.signals.state.lock();
        state.set[signal.index()] = true;
        state.raised[signal.index()] += 1;
        self.signals.changed.notify_all();
    }

    /// Leave the searching state. Returns whether this call made the transition.
    fn transition(&self, to: u8) -> bool {
        self.state
            .compare_exchange(SEARCHING, to, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn fail(&self) {
        if self.transition(FAILED) {
            self.raise(Signal::Failed);
        }
    }

    fn fail_with(&self, error: Error) {
        debug!("construction aborted: {error}");
        self.error.lock().get_or_insert(error);
        self.fail();
    }

    /// Claim the next attempt, growing the graph when the current size is exhausted.
    ///
    /// Returns the attempt number and its size round, or `None` when the run is over.
    fn next_attempt<S: Solver>(&self, solver: &S, deadline: Option<Instant>) -> Option<(u64, u32)> {
        if self.should_stop() {
            return None;
        }
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            debug!("construction deadline reached");
            self.fail();
            return None;
        }

        let budget = self.config.attempts_per_size.max(1);
        let max_resizes = self.config.max_resizes;
        let claim = |progress| {
            let (round, count) = unpack(progress);
            if count < budget {
                Some(pack(round, count + 1))
            } else if round < max_resizes && solver.has_round(round + 1) {
                Some(pack(round + 1, 1))
            } else {
                None
            }
        };
        match self
            .progress
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, claim)
        {
            Ok(previous) => {
                let (mut round, count) = unpack(previous);
                if count >= budget {
                    round += 1;
                    debug!("growing graph: size round {round} after {count} attempts");
                }
                let number = self.attempts.fetch_add(1, Ordering::AcqRel) + 1;
                Some((number, round))
            }
            // Attempts claimed by other workers may still succeed; the run fails once all have joined.
            Err(_) => None,
        }
    }

    fn run_worker<S: Solver>(
        &self,
        solver: &S,
        index: usize,
        deadline: Option<Instant>,
        winner: &Mutex<Option<Winner<S::Solution>>>,
    ) {
        let mut worker = match solver.new_worker() {
            Ok(worker) => worker,
            Err(error) => return self.fail_with(error),
        };
        let mut rng = RapidRng::new(rand::random::<u64>() ^ index as u64);
        let mut prepared = None;

        while let Some((number, round)) = self.next_attempt(solver, deadline) {
            if prepared != Some(round) {
                if let Err(error) = solver.prepare(&mut worker, round) {
                    return self.fail_with(error);
                }
                prepared = Some(round);
            }

            let mut attempt = Attempt {
                number,
                worker: index,
                round,
                rng: &mut rng,
                context: self,
            };
            match solver.attempt(&mut worker, &mut attempt) {
                Ok(Some(solution)) => {
                    if self.transition(SUCCEEDED) {
                        *winner.lock() = Some(Winner {
                            solution,
                            worker: index,
                            attempt: number,
                        });
                        self.raise(Signal::Succeeded);
                    } else {
                        trace!("worker {index}: discarding late solution of attempt {number}");
                    }
                    return;
                }
                Ok(None) => {}
                Err(error) => return self.fail_with(error),
            }
        }
    }

    /// Run `solver` on the worker pool and return the first solution published.
    ///
    /// # Errors
    ///
    /// - [`Error::Cancelled`] if [`Context::shutdown`] was called before a solution was found.
    /// - [`Error::ConstructionFailed`] if every size round or the deadline was exhausted.
    /// - Any error returned by the solver, e.g. [`Error::OutOfMemory`].
    /// - [`Error::InvalidArgument`] if this context has already run.
    pub fn solve<S: Solver>(&self, solver: &S) -> Result<Solved<S::Solution>> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(Error::InvalidArgument("construction context already used"));
        }

        let start = Instant::now();
        let deadline = self.config.timeout.map(|timeout| start + timeout);
        let winner = Mutex::new(None);

        if !self.should_stop() {
            let workers = self.config.worker_count();
            debug!("starting {workers} construction workers");
            std::thread::scope(|scope| {
                for index in 0..workers {
                    let winner = &winner;
                    scope.spawn(move || self.run_worker(solver, index, deadline, winner));
                }
            });
        }

        let result = self.finish(winner.into_inner(), start);
        self.raise(Signal::Completed);
        result
    }

    fn finish<T>(&self, winner: Option<Winner<T>>, start: Instant) -> Result<Solved<T>> {
        let attempts = self.attempts();
        let resizes = unpack(self.progress.load(Ordering::Acquire)).0;
        let solve_micros = u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX);

        if let Some(winner) = winner {
            info!(
                "solved after {attempts} attempts and {resizes} resizes in {solve_micros}us \
                 (worker {}, attempt {})",
                winner.worker, winner.attempt,
            );
            return Ok(Solved {
                solution: winner.solution,
                stats: ConstructionStats {
                    attempts,
                    resizes,
                    winning_worker: u32::try_from(winner.worker).unwrap_or(u32::MAX),
                    winning_attempt: winner.attempt,
                    solve_micros,
                },
            });
        }

        // Workers stopped by a shutdown leave the state untouched.
        self.fail();
        if let Some(error) = self.error.lock().take() {
            return Err(error);
        }
        if self.shutdown.load(Ordering::Acquire) {
            info!("construction cancelled after {attempts} attempts");
            return Err(Error::Cancelled);
        }
        info!("construction failed after {attempts} attempts and {resizes} resizes");
        Err(Error::ConstructionFailed { attempts, resizes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::AtomicUsize;

    /// Solver whose attempts never succeed.
    struct Hopeless {
        rounds: u32,
        prepared: AtomicUsize,
    }

    impl Solver for Hopeless {
        type Solution = ();
        type Worker = ();

        fn new_worker(&self) -> Result<()> {
            Ok(())
        }

        fn prepare(&self, _worker: &mut (), _round: u32) -> Result<()> {
            self.prepared.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }

        fn has_round(&self, round: u32) -> bool {
            round < self.rounds
        }

        fn attempt(&self, _worker: &mut (), attempt: &mut Attempt<'_>) -> Result<Option<()>> {
            assert!(attempt.round() < self.rounds, "attempt in a missing round");
            Ok(None)
        }
    }

    /// Solver where the first attempt wins and every other attempt succeeds after it.
    struct FirstWins;

    impl Solver for FirstWins {
        type Solution = u64;
        type Worker = ();

        fn new_worker(&self) -> Result<()> {
            Ok(())
        }

        fn prepare(&self, _worker: &mut (), _round: u32) -> Result<()> {
            Ok(())
        }

        fn has_round(&self, _round: u32) -> bool {
            true
        }

        fn attempt(&self, _worker: &mut (), attempt: &mut Attempt<'_>) -> Result<Option<u64>> {
            if attempt.number() != 1 {
                assert!(
                    attempt
                        .context()
                        .wait_timeout(Signal::Succeeded, Duration::from_secs(30)),
                    "first attempt never won",
                );
            }
            Ok(Some(attempt.number()))
        }
    }

    /// Solver that spins until told to stop.
    struct Endless;

    impl Solver for Endless {
        type Solution = ();
        type Worker = ();

        fn new_worker(&self) -> Result<()> {
            Ok(())
        }

        fn prepare(&self, _worker: &mut (), _round: u32) -> Result<()> {
            Ok(())
        }

        fn has_round(&self, _round: u32) -> bool {
            true
        }

        fn attempt(&self, _worker: &mut (), attempt: &mut Attempt<'_>) -> Result<Option<()>> {
            while !attempt.should_stop() {
                std::thread::yield_now();
            }
            Ok(None)
        }
    }

    /// Solver whose attempts take a while and never succeed.
    struct Slow;

    impl Solver for Slow {
        type Solution = ();
        type Worker = ();

        fn new_worker(&self) -> Result<()> {
            Ok(())
        }

        fn prepare(&self, _worker: &mut (), _round: u32) -> Result<()> {
            Ok(())
        }

        fn has_round(&self, _round: u32) -> bool {
            true
        }

        fn attempt(&self, _worker: &mut (), _attempt: &mut Attempt<'_>) -> Result<Option<()>> {
            std::thread::sleep(Duration::from_millis(2));
            Ok(None)
        }
    }

    /// Solver whose first attempt is slow to succeed while the rest fail at once.
    struct LastWins;

    impl Solver for LastWins {
        type Solution = u64;
        type Worker = ();

        fn new_worker(&self) -> Result<()> {
            Ok(())
        }

        fn prepare(&self, _worker: &mut (), _round: u32) -> Result<()> {
            Ok(())
        }

        fn has_round(&self, round: u32) -> bool {
            round == 0
        }

        fn attempt(&self, _worker: &mut (), attempt: &mut Attempt<'_>) -> Result<Option<u64>> {
            if attempt.number() != 1 {
                return Ok(None);
            }
            std::thread::sleep(Duration::from_millis(100));
            Ok((!attempt.should_stop()).then_some(attempt.number()))
        }
    }

    /// Solver whose workers cannot be created.
    struct Starved;

    impl Solver for Starved {
        type Solution = ();
        type Worker = ();

        fn new_worker(&self) -> Result<()> {
            Err(Error::OutOfMemory(1 << 20))
        }

        fn prepare(&self, _worker: &mut (), _round: u32) -> Result<()> {
            Ok(())
        }

        fn has_round(&self, _round: u32) -> bool {
            true
        }

        fn attempt(&self, _worker: &mut (), _attempt: &mut Attempt<'_>) -> Result<Option<()>> {
            Ok(None)
        }
    }

    fn config(workers: usize) -> ContextConfig {
        ContextConfig::default()
            .with_maximum_concurrency(workers)
            .with_attempts_per_size(3)
            .with_max_resizes(2)
    }

    #[test]
    fn first_success_wins() {
        let context = Context::new(config(4).with_attempts_per_size(1000));
        let solved = context.solve(&FirstWins).unwrap();
        assert_eq!(solved.solution, 1);
        assert_eq!(solved.stats.winning_attempt, 1);
        assert_eq!(context.raised_count(Signal::Succeeded), 1);
        assert!(!context.is_set(Signal::Failed));
        assert_eq!(context.raised_count(Signal::Completed), 1);
    }

    #[test]
    fn exhaustion_fails_once() {
        let context = Context::new(config(4));
        let solver = Hopeless {
            rounds: 10,
            prepared: AtomicUsize::new(0),
        };
        match context.solve(&solver) {
            Err(Error::ConstructionFailed { attempts, resizes }) => {
                assert_eq!(attempts, 9);
                assert_eq!(resizes, 2);
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(context.attempts(), 9);
        assert_eq!(context.raised_count(Signal::Failed), 1);
        assert!(!context.is_set(Signal::Succeeded));
        assert_eq!(context.raised_count(Signal::Completed), 1);
        assert!(solver.prepared.load(Ordering::Relaxed) >= 3);
    }

    #[test]
    fn exhausted_budget_keeps_claimed_attempts() {
        let context = Context::new(config(2).with_max_resizes(0));
        let solved = context.solve(&LastWins).unwrap();
        assert_eq!(solved.solution, 1);
        assert_eq!(solved.stats.attempts, 3);
        assert_eq!(context.raised_count(Signal::Succeeded), 1);
        assert!(!context.is_set(Signal::Failed));
        assert_eq!(context.raised_count(Signal::Completed), 1);
    }

    #[test]
    fn solver_limits_rounds() {
        let context = Context::new(config(1).with_max_resizes(100));
        let solver = Hopeless {
            rounds: 2,
            prepared: AtomicUsize::new(0),
        };
        assert!(matches!(
            context.solve(&solver),
            Err(Error::ConstructionFailed {
                attempts: 6,
                resizes: 1
            })
        ));
    }

    #[test]
    fn shutdown_before_start() {
        let context = Context::new(config(2));
        context.shutdown();
        assert!(matches!(context.solve(&FirstWins), Err(Error::Cancelled)));
        assert_eq!(context.attempts(), 0);
        assert!(context.is_set(Signal::Failed));
        assert!(!context.is_set(Signal::Succeeded));
        assert!(context.is_set(Signal::Completed));
    }

    #[test]
    fn shutdown_during_run() {
        let context = Context::new(config(3));
        std::thread::scope(|scope| {
            let handle = scope.spawn(|| context.solve(&Endless));
            while context.attempts() == 0 {
                std::thread::yield_now();
            }
            context.shutdown();
            assert!(matches!(handle.join().unwrap(), Err(Error::Cancelled)));
        });
        assert_eq!(context.raised_count(Signal::Failed), 1);
        assert_eq!(context.raised_count(Signal::Completed), 1);
        assert!(context.wait_timeout(Signal::Completed, Duration::ZERO));
    }

    #[test]
    fn deadline() {
        let context = Context::new(
            config(2)
                .with_attempts_per_size(u32::MAX)
                .with_timeout(Duration::from_millis(30)),
        );
        assert!(matches!(
            context.solve(&Slow),
            Err(Error::ConstructionFailed { resizes: 0, .. })
        ));
        assert_eq!(context.raised_count(Signal::Failed), 1);
        assert!(context.attempts() > 0);
    }

    #[test]
    fn worker_errors_propagate() {
        let context = Context::new(config(2));
        assert!(matches!(
            context.solve(&Starved),
            Err(Error::OutOfMemory(_))
        ));
        assert_eq!(context.raised_count(Signal::Failed), 1);
    }

    #[test]
    fn single_use() {
        let context = Context::new(config(1));
        context.solve(&FirstWins).unwrap();
        assert!(matches!(
            context.solve(&FirstWins),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn signal_names() {
        let context = Context::default();
        let token = context
            .signal_name(Signal::Shutdown)
            .strip_prefix("PerfectHashTableContext_ShutdownEvent_")
            .unwrap()
            .to_owned();
        assert_eq!(
            context.signal_name(Signal::Completed),
            format!("PerfectHashTableContext_CompletedEvent_{token}"),
        );
        assert_ne!(
            Context::default().signal_name(Signal::Shutdown),
            context.signal_name(Signal::Shutdown),
        );
    }

    #[test]
    fn wait_returns_after_raise() {
        let context = Context::new(config(1));
        std::thread::scope(|scope| {
            scope.spawn(|| context.wait(Signal::Shutdown));
            context.shutdown();
        });
        assert!(!context.wait_timeout(Signal::Succeeded, Duration::from_millis(1)));
    }
}
