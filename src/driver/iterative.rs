//! Exploration with an explicit stack of pending-sibling records.
//!
//! Instead of recursing per decision, this driver keeps one record per open
//! decision point: the choice, its remaining candidates and the transaction
//! level to restore when the decision's frame closes. The native stack stays
//! flat however deep the host's choice sequences run. Node order, evaluation
//! counts and results are identical to the recursive strategy's.

use super::{Driver, DriverCore, LineEnd};
use crate::error::SearchError;
use crate::interface::{Evaluator, PositionHash, Score, Sequencer};
use crate::util::CancelToken;
use std::sync::Arc;

/// One open decision point: which candidates are still unexplored and how
/// to unwind when the decision's frame closes.
struct PendingSiblings<Q: Sequencer> {
    choice: Q::Choice,
    candidates: Vec<Q::Candidate>,
    next: usize,
    maximizing: bool,
    // Open-transaction level to restore when the frame holding this
    // decision ends. Unused for the root record.
    txn_target: usize,
    // The root frame is never popped, so its record folds nothing on close.
    root: bool,
}

pub struct IterativeDriver<Q, E>
where
    Q: Sequencer,
{
    core: DriverCore<Q, E>,
    stack: Vec<PendingSiblings<Q>>,
}

impl<Q, E> IterativeDriver<Q, E>
where
    Q: Sequencer,
    Q::State: PositionHash,
    E: Evaluator<Q = Q>,
{
    pub fn new(seq: Q, eval: Arc<E>, cancel: CancelToken) -> Self {
        IterativeDriver { core: DriverCore::new(seq, eval, cancel), stack: Vec::new() }
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
                self.push_root_record(choice, candidates);
                self.drain().map_err(SearchError::Host)
            }
            _ => Ok(()),
        }
    }

    fn run_forced(&mut self, candidate: Q::Candidate) -> Result<(), SearchError<Q::Error>> {
        match self.core.advance_line().map_err(SearchError::Host)? {
            LineEnd::Branch(choice) => {
                self.push_root_record(choice, vec![candidate]);
                self.drain().map_err(SearchError::Host)
            }
            _ => Ok(()),
        }
    }

    fn push_root_record(&mut self, choice: Q::Choice, candidates: Vec<Q::Candidate>) {
        let chooser = self.core.seq.chooser(&choice);
        self.core.fix_perspective(chooser);
        let maximizing = self.core.eval.is_maximizing(chooser);
        let txn_target = self.core.seq.open_transactions();
        self.stack.push(PendingSiblings {
            choice,
            candidates,
            next: 0,
            maximizing,
            txn_target,
            root: true,
        });
    }

    /// Work the record stack down to empty.
    fn drain(&mut self) -> Result<(), Q::Error> {
        while !self.stack.is_empty() {
            if self.top_exhausted() {
                self.close_top();
            } else {
                self.open_next()?;
            }
        }
        Ok(())
    }

    /// Whether the innermost decision has no more candidates to open.
    /// Cancellation empties it here, before any further sibling is drawn.
    fn top_exhausted(&mut self) -> bool {
        let cancelled = self.core.cancel.is_cancelled();
        match self.stack.last_mut() {
            Some(top) => {
                if cancelled {
                    top.next = top.candidates.len();
                }
                top.next >= top.candidates.len()
            }
            None => true,
        }
    }

    /// Pop the exhausted innermost decision and close the frame it lived in.
    fn close_top(&mut self) {
        let record = match self.stack.pop() {
            Some(record) => record,
            None => return,
        };
        if !record.root {
            self.close_frame(record.txn_target);
        }
    }

    /// Fold the current frame into its parent; on a cutoff, drop the
    /// remaining siblings of the decision that owns it.
    fn close_frame(&mut self, txn_target: usize) {
        if !self.core.exit_candidate(txn_target) {
            if let Some(top) = self.stack.last_mut() {
                top.next = top.candidates.len();
            }
        }
    }

    /// Open the next candidate of the innermost decision and advance its
    /// line until it settles or raises a deeper decision.
    fn open_next(&mut self) -> Result<(), Q::Error> {
        let txn_target = self.core.seq.open_transactions();
        let top = match self.stack.last_mut() {
            Some(top) => top,
            None => return Ok(()),
        };
        let candidate = top.candidates[top.next].clone();
        top.next += 1;
        let maximizing = top.maximizing;
        match self.core.enter_candidate(&top.choice, &candidate, maximizing) {
            Ok(true) => match self.core.advance_line() {
                Ok(LineEnd::Branch(choice)) => self.descend(choice, txn_target),
                Ok(LineEnd::Evaluated) | Ok(LineEnd::Discarded) => {
                    self.close_frame(txn_target);
                    Ok(())
                }
                Err(err) => {
                    self.core.fail_candidate(txn_target);
                    Err(err)
                }
            },
            Ok(false) => {
                // Transposition value substituted; nothing below to explore.
                self.close_frame(txn_target);
                Ok(())
            }
            Err(err) => {
                self.core.fail_candidate(txn_target);
                Err(err)
            }
        }
    }

    /// Frames between a failure point and the root are still open once the
    /// record stack is abandoned; close them out as discarded lines so the
    /// tree settles the same way it does when each level unwinds itself.
    fn collapse_frames(&mut self) {
        while self.core.tree.depth() > 1 {
            self.core.tree.discard();
            self.core.tree.end_node();
        }
    }

    /// A freshly opened line raised its own decision: record it and keep
    /// descending from there.
    fn descend(&mut self, choice: Q::Choice, txn_target: usize) -> Result<(), Q::Error> {
        match self.core.seq.candidates(&choice) {
            Ok(candidates) => {
                if candidates.is_empty() {
                    self.core.tree.discard();
                    self.close_frame(txn_target);
                } else {
                    let maximizing =
                        self.core.eval.is_maximizing(self.core.seq.chooser(&choice));
                    self.stack.push(PendingSiblings {
                        choice,
                        candidates,
                        next: 0,
                        maximizing,
                        txn_target,
                        root: false,
                    });
                }
                Ok(())
            }
            Err(err) => {
                self.core.fail_candidate(txn_target);
                Err(err)
            }
        }
    }
}

impl<Q, E> Driver<Q, E> for IterativeDriver<Q, E>
where
    Q: Sequencer,
    Q::State: PositionHash,
    E: Evaluator<Q = Q>,
{
    fn run(&mut self) -> Result<(), SearchError<Q::Error>> {
        let floor = self.core.begin_outer();
        let outcome = self.run_root();
        self.core.unwind_to(floor);
        self.stack.clear();
        if outcome.is_err() {
            self.collapse_frames();
        }
        outcome
    }

    fn run_with_choice(&mut self, candidate: Q::Candidate) -> Result<(), SearchError<Q::Error>> {
        let floor = self.core.begin_outer();
        let outcome = self.run_forced(candidate);
        self.core.unwind_to(floor);
        self.stack.clear();
        if outcome.is_err() {
            self.collapse_frames();
        }
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
