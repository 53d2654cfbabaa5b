//! Exploration on the native call stack.

use super::{Driver, DriverCore, LineEnd};
use crate::error::SearchError;
use crate::interface::{Evaluator, PositionHash, Score, Sequencer};
use crate::util::CancelToken;
use std::sync::Arc;

/// Explores by direct recursion: one native stack frame per decision depth.
///
/// The simplest strategy and the baseline the iterative form is measured
/// against. Hosts with very deep choice sequences should prefer
/// [`super::iterative::IterativeDriver`].
pub struct RecursiveDriver<Q, E>
where
    Q: Sequencer,
{
    core: DriverCore<Q, E>,
}

impl<Q, E> RecursiveDriver<Q, E>
where
    Q: Sequencer,
    Q::State: PositionHash,
    E: Evaluator<Q = Q>,
{
    pub fn new(seq: Q, eval: Arc<E>, cancel: CancelToken) -> Self {
        RecursiveDriver { core: DriverCore::new(seq, eval, cancel) }
    }

    /// The wrapped sequencer.
    pub fn host(&self) -> &Q {
        &self.core.seq
    }

    fn run_root(&mut self) -> Result<(), SearchError<Q::Error>> {
        match self.core.advance_line().map_err(SearchError::Host)? {
            LineEnd::Branch(choice) => {
                let candidates = self.core.seq.candidates(&choice).map_err(SearchError::Host)?;
                if candidates.is_empty() {
                    return Err(SearchError::NoCandidates);
                }
                let chooser = self.core.seq.chooser(&choice);
                self.core.fix_perspective(chooser);
                let maximizing = self.core.eval.is_maximizing(chooser);
                self.try_candidates(&choice, candidates, maximizing).map_err(SearchError::Host)
            }
            _ => Ok(()),
        }
    }

    fn run_forced(&mut self, candidate: Q::Candidate) -> Result<(), SearchError<Q::Error>> {
        match self.core.advance_line().map_err(SearchError::Host)? {
            LineEnd::Branch(choice) => {
                let chooser = self.core.seq.chooser(&choice);
                self.core.fix_perspective(chooser);
                let maximizing = self.core.eval.is_maximizing(chooser);
                self.try_candidates(&choice, vec![candidate], maximizing)
                    .map_err(SearchError::Host)
            }
            _ => Ok(()),
        }
    }

    /// Explore the current frame's line to its end.
    fn explore(&mut self) -> Result<(), Q::Error> {
        match self.core.advance_line()? {
            LineEnd::Branch(choice) => self.branch(choice),
            LineEnd::Evaluated | LineEnd::Discarded => Ok(()),
        }
    }

    /// Handle a pending choice raised below the root.
    fn branch(&mut self, choice: Q::Choice) -> Result<(), Q::Error> {
        let candidates = self.core.seq.candidates(&choice)?;
        if candidates.is_empty() {
            // A decision with nothing to decide dead-ends this line.
            self.core.tree.discard();
            return Ok(());
        }
        let maximizing = self.core.eval.is_maximizing(self.core.seq.chooser(&choice));
        self.try_candidates(&choice, candidates, maximizing)
    }

    fn try_candidates(
        &mut self, choice: &Q::Choice, candidates: Vec<Q::Candidate>, maximizing: bool,
    ) -> Result<(), Q::Error> {
        for candidate in &candidates {
            if self.core.cancel.is_cancelled() {
                break;
            }
            if !self.try_candidate(choice, candidate, maximizing)? {
                break;
            }
        }
        Ok(())
    }

    /// Explore one candidate and fold it into the parent frame. Returns
    /// whether its siblings are still worth trying.
    fn try_candidate(
        &mut self, choice: &Q::Choice, candidate: &Q::Candidate, maximizing: bool,
    ) -> Result<bool, Q::Error> {
        let txn_target = self.core.seq.open_transactions();
        match self.core.enter_candidate(choice, candidate, maximizing) {
            Ok(true) => match self.explore() {
                Ok(()) => Ok(self.core.exit_candidate(txn_target)),
                Err(err) => {
                    self.core.fail_candidate(txn_target);
                    Err(err)
                }
            },
            Ok(false) => Ok(self.core.exit_candidate(txn_target)),
            Err(err) => {
                self.core.fail_candidate(txn_target);
                Err(err)
            }
        }
    }
}

impl<Q, E> Driver<Q, E> for RecursiveDriver<Q, E>
where
    Q: Sequencer,
    Q::State: PositionHash,
    E: Evaluator<Q = Q>,
{
    fn run(&mut self) -> Result<(), SearchError<Q::Error>> {
        let floor = self.core.begin_outer();
        let outcome = self.run_root();
        self.core.unwind_to(floor);
        outcome
    }

    fn run_with_choice(&mut self, candidate: Q::Candidate) -> Result<(), SearchError<Q::Error>> {
        let floor = self.core.begin_outer();
        let outcome = self.run_forced(candidate);
        self.core.unwind_to(floor);
        outcome
    }

    fn best(&self) -> Option<(&Q::Candidate, Score)> {
        self.core.tree.result()
    }

    fn value(&self) -> Option<Score> {
        self.core.tree.value()
    }

    fn evaluations(&self) -> u64 {
        self.core.evaluations()
    }

    fn table_hits(&self) -> u64 {
        self.core.tree.table_hits()
    }
}
