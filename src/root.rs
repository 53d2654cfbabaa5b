//! The top-level partitioner.
//!
//! A decision search fans the candidates of the host's next pending choice
//! out as fully independent jobs: each gets a private replay of the host, a
//! fresh driver with its own tree and transposition table, and exactly one
//! root candidate to explore. Once every job has finished or been abandoned,
//! the reported scores are aggregated by the root chooser's polarity into a
//! single [`Decision`].

use crate::dispatch::Dispatcher;
use crate::driver::iterative::IterativeDriver;
use crate::driver::recursive::RecursiveDriver;
use crate::driver::{Driver, DriverKind};
use crate::error::SearchError;
use crate::interface::{Evaluator, PositionHash, Score, Sequencer, Step, MIN_SCORE};
use crate::util::CancelToken;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Options controlling a top-level search.
#[derive(Clone, Default)]
pub struct SearchOptions {
    driver: DriverKind,
    deadline: Option<Duration>,
    cancel: Option<CancelToken>,
}

impl SearchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Choose the exploration strategy. Defaults to the recursive driver.
    pub fn with_driver(mut self, driver: DriverKind) -> Self {
        self.driver = driver;
        self
    }

    /// Stop searching after this much wall-clock time. Whatever the jobs
    /// settled by then is still aggregated into a decision.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Share an externally owned cancellation token with the search.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// The aggregate outcome of one decision search.
#[derive(Clone, Debug)]
pub struct Decision<R> {
    /// The winning candidate of the root choice.
    pub candidate: R,
    /// The predicted score of the winning line, from the root chooser's
    /// maximizing perspective. [`MIN_SCORE`] when no search backs the
    /// candidate (forced decisions and fallbacks).
    pub score: Score,
    /// Leaf evaluations summed over the jobs that produced a usable score.
    /// Zero means the candidate was returned without any search.
    pub evaluations: u64,
    /// Transposition substitutions summed over the same jobs.
    pub table_hits: u64,
    /// Which exploration strategy the jobs used.
    pub driver: DriverKind,
}

/// One independent job: a private host replay and one root candidate.
struct WorkOrder<Q, E>
where
    Q: Sequencer,
{
    index: usize,
    candidate: Q::Candidate,
    seq: Q,
    eval: Arc<E>,
    kind: DriverKind,
    cancel: CancelToken,
}

/// What a finished job hands back to the partitioner.
struct JobReport<Q>
where
    Q: Sequencer,
{
    index: usize,
    candidate: Q::Candidate,
    score: Option<Score>,
    evaluations: u64,
    table_hits: u64,
    error: Option<Q::Error>,
}

impl<Q, E> WorkOrder<Q, E>
where
    Q: Sequencer,
    Q::State: PositionHash,
    E: Evaluator<Q = Q>,
{
    fn run(self) -> JobReport<Q> {
        let WorkOrder { index, candidate, seq, eval, kind, cancel } = self;
        let (outcome, score, evaluations, table_hits) = match kind {
            DriverKind::Recursive => {
                let mut driver = RecursiveDriver::new(seq, eval, cancel);
                let outcome = driver.run_with_choice(candidate.clone());
                (outcome, driver.value(), driver.evaluations(), driver.table_hits())
            }
            DriverKind::Iterative => {
                let mut driver = IterativeDriver::new(seq, eval, cancel);
                let outcome = driver.run_with_choice(candidate.clone());
                (outcome, driver.value(), driver.evaluations(), driver.table_hits())
            }
        };
        match outcome {
            Ok(()) => JobReport { index, candidate, score, evaluations, table_hits, error: None },
            Err(SearchError::Host(err)) => {
                JobReport { index, candidate, score: None, evaluations, table_hits, error: Some(err) }
            }
            Err(SearchError::NoCandidates) => {
                JobReport { index, candidate, score: None, evaluations, table_hits, error: None }
            }
        }
    }
}

/// Builds, dispatches and aggregates the per-candidate jobs of one decision.
pub struct RootSearch<E> {
    eval: Arc<E>,
    options: SearchOptions,
}

impl<E> RootSearch<E> {
    pub fn new(eval: E, options: SearchOptions) -> Self {
        RootSearch { eval: Arc::new(eval), options }
    }

    /// Decide the host's next pending choice.
    ///
    /// The caller's sequencer is never mutated; every job replays a private
    /// clone. With exactly one candidate the decision is forced and returned
    /// without dispatching anything. With none, or with no pending choice at
    /// all, there is no decision to make and the search fails fast.
    pub fn decide<Q, D>(
        &self, seq: &Q, dispatcher: &mut D,
    ) -> Result<Decision<Q::Candidate>, SearchError<Q::Error>>
    where
        Q: Sequencer + Clone + Send + 'static,
        Q::State: PositionHash,
        Q::Candidate: Send + 'static,
        Q::Error: Send + 'static,
        E: Evaluator<Q = Q> + Send + Sync + 'static,
        D: Dispatcher,
    {
        let cancel = self.options.cancel.clone().unwrap_or_default();
        if let Some(deadline) = self.options.deadline {
            cancel.deadline(deadline);
        }

        // Step a private replay forward to the pending choice.
        let mut probe = seq.clone();
        let choice = loop {
            match probe.step().map_err(SearchError::Host)? {
                Step::Pending(choice) => break choice,
                Step::Continue => {}
                Step::Retry | Step::Done => return Err(SearchError::NoCandidates),
            }
        };
        let candidates = probe.candidates(&choice).map_err(SearchError::Host)?;
        let default = match candidates.first() {
            Some(candidate) => candidate.clone(),
            None => return Err(SearchError::NoCandidates),
        };
        let maximizing = self.eval.is_maximizing(probe.chooser(&choice));

        if candidates.len() == 1 {
            log::debug!("single candidate, deciding without search");
            return Ok(self.unsearched(default));
        }

        let total = candidates.len();
        let reports: Arc<Mutex<Vec<JobReport<Q>>>> =
            Arc::new(Mutex::new(Vec::with_capacity(total)));
        for (index, candidate) in candidates.into_iter().enumerate() {
            let order = WorkOrder {
                index,
                candidate,
                seq: seq.clone(),
                eval: self.eval.clone(),
                kind: self.options.driver,
                cancel: cancel.clone(),
            };
            let reports = reports.clone();
            dispatcher.dispatch(Box::new(move || {
                let report = order.run();
                reports.lock().push(report);
            }));
        }
        dispatcher.wait();

        let mut reports = std::mem::take(&mut *reports.lock());
        reports.sort_by_key(|report| report.index);

        let mut evaluations = 0;
        let mut table_hits = 0;
        let mut winner: Option<(Q::Candidate, Score)> = None;
        for report in reports {
            if let Some(err) = report.error {
                return Err(SearchError::Host(err));
            }
            let score = match report.score {
                Some(score) => score,
                None => continue,
            };
            evaluations += report.evaluations;
            table_hits += report.table_hits;
            let better = match &winner {
                None => true,
                Some((_, best)) => {
                    if maximizing {
                        score > *best
                    } else {
                        score < *best
                    }
                }
            };
            if better {
                winner = Some((report.candidate, score));
            }
        }

        match winner {
            Some((candidate, score)) => {
                log::debug!(
                    "decided from {} candidates: score {}, {} evaluations, {} table hits",
                    total,
                    score,
                    evaluations,
                    table_hits
                );
                Ok(Decision {
                    candidate,
                    score,
                    evaluations,
                    table_hits,
                    driver: self.options.driver,
                })
            }
            None => {
                // Every job was abandoned or crashed. The host still needs a
                // legal decision, so hand back the first candidate.
                log::debug!("no usable job result, falling back to the default candidate");
                Ok(self.unsearched(default))
            }
        }
    }

    fn unsearched<R>(&self, candidate: R) -> Decision<R> {
        Decision {
            candidate,
            score: MIN_SCORE,
            evaluations: 0,
            table_hits: 0,
            driver: self.options.driver,
        }
    }
}
