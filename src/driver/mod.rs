//! Drivers walk the host's step machine through every line of play.
//!
//! A driver repeatedly steps its [`Sequencer`] until the host either raises a
//! pending choice or finishes. Pending choices branch the exploration: each
//! candidate is resolved speculatively inside a host transaction, explored to
//! its leaves, folded into the search tree and rolled back before the next
//! sibling. Finished or terminal positions are scored by the [`Evaluator`]
//! from the fixed perspective of the participant who owns the root choice.
//!
//! Two strategies implement the same contract: [`recursive::RecursiveDriver`]
//! explores with the native call stack, [`iterative::IterativeDriver`] with an
//! explicit stack of pending-sibling records. For the same host and evaluator
//! they visit the same nodes in the same order and report the same decision;
//! the iterative form exists for hosts whose choice sequences run deeper than
//! a comfortable native stack.

pub mod iterative;
pub mod recursive;

use crate::error::SearchError;
use crate::interface::{Evaluator, PositionHash, Score, Sequencer, Step};
use crate::tree::SearchTree;
use crate::util::CancelToken;
use std::sync::Arc;

/// Which exploration strategy a search should use.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum DriverKind {
    /// Native call stack, one frame per decision depth.
    #[default]
    Recursive,
    /// Explicit stack of pending-sibling records, constant native stack.
    Iterative,
}

/// The common contract of both exploration strategies.
pub trait Driver<Q, E>
where
    Q: Sequencer,
    E: Evaluator<Q = Q>,
{
    /// Search every line reachable from the host's current position. The
    /// host state is restored before returning, whatever happens inside.
    fn run(&mut self) -> Result<(), SearchError<Q::Error>>;

    /// Search only the lines under one forced candidate of the host's next
    /// pending choice, without enumerating its siblings. Used by the
    /// partitioner to assign each work order a single root candidate.
    fn run_with_choice(&mut self, candidate: Q::Candidate) -> Result<(), SearchError<Q::Error>>;

    /// The winning root candidate and its score, once a run has settled one.
    fn best(&self) -> Option<(&Q::Candidate, Score)>;

    /// The settled root value, if any.
    fn value(&self) -> Option<Score>;

    /// Number of leaf evaluations performed so far.
    fn evaluations(&self) -> u64;

    /// Number of transposition substitutions performed so far.
    fn table_hits(&self) -> u64;
}

/// How one line of exploration ended.
pub(crate) enum LineEnd<C> {
    /// The line reached a leaf and its score was folded into the tree.
    Evaluated,
    /// The line was abandoned without a score.
    Discarded,
    /// The host raised a choice; the caller must branch over its candidates.
    Branch(C),
}

/// State and stepping logic shared by both driver strategies.
///
/// The core owns the sequencer, the search tree and the counters, and
/// enforces the transaction discipline: one outer transaction around the
/// whole run, one transaction per entered candidate, and a sweep that closes
/// any transaction host logic left open inside a line before its leaf is
/// scored.
pub(crate) struct DriverCore<Q, E>
where
    Q: Sequencer,
{
    pub(crate) seq: Q,
    pub(crate) eval: Arc<E>,
    pub(crate) tree: SearchTree<Q::Candidate>,
    pub(crate) cancel: CancelToken,
    perspective: Option<Q::Participant>,
    evaluations: u64,
    // Open-transaction level right after the innermost line's own `begin`.
    // Anything above it when the line reaches a leaf is a stray the host
    // opened and never closed, and is rolled back before scoring. Only read
    // between the opening of a line and its first branch, so it is simply
    // overwritten by the next `enter_candidate`.
    line_floor: usize,
}

impl<Q, E> DriverCore<Q, E>
where
    Q: Sequencer,
    Q::State: PositionHash,
    E: Evaluator<Q = Q>,
{
    pub(crate) fn new(seq: Q, eval: Arc<E>, cancel: CancelToken) -> Self {
        DriverCore {
            seq,
            eval,
            tree: SearchTree::new(),
            cancel,
            perspective: None,
            evaluations: 0,
            line_floor: 0,
        }
    }

    pub(crate) fn evaluations(&self) -> u64 {
        self.evaluations
    }

    /// Open the transaction that brackets a whole run. Returns the level to
    /// hand back to [`DriverCore::unwind_to`] when the run finishes.
    pub(crate) fn begin_outer(&mut self) -> usize {
        let floor = self.seq.open_transactions();
        self.seq.begin();
        self.line_floor = self.seq.open_transactions();
        floor
    }

    /// Roll back until no more than `level` transactions remain open.
    pub(crate) fn unwind_to(&mut self, level: usize) {
        while self.seq.open_transactions() > level {
            self.seq.rollback();
        }
    }

    /// Fix the scoring perspective to the participant owning the root
    /// choice. Only the first caller wins; recursion keeps the root's.
    pub(crate) fn fix_perspective(&mut self, participant: Q::Participant) {
        if self.perspective.is_none() {
            self.perspective = Some(participant);
        }
    }

    /// Step the host forward until the current line ends or branches.
    pub(crate) fn advance_line(&mut self) -> Result<LineEnd<Q::Choice>, Q::Error> {
        loop {
            if self.eval.is_terminal(&self.tree, self.seq.state()) {
                return self.settle_leaf();
            }
            match self.seq.step()? {
                Step::Continue => {}
                Step::Pending(choice) => return Ok(LineEnd::Branch(choice)),
                Step::Retry => {
                    log::trace!("host refused a step, discarding the branch");
                    self.tree.discard();
                    return Ok(LineEnd::Discarded);
                }
                Step::Done => return self.settle_leaf(),
            }
        }
    }

    fn settle_leaf(&mut self) -> Result<LineEnd<Q::Choice>, Q::Error> {
        // Host logic may have opened transactions of its own inside this
        // line. They must be closed before the heuristic looks at the state.
        self.unwind_to(self.line_floor);
        match self.perspective {
            Some(p) => {
                let score = self.eval.evaluate(self.seq.state(), p)?;
                self.tree.evaluate(score);
                self.evaluations += 1;
                Ok(LineEnd::Evaluated)
            }
            None => {
                // The sequence ended before any choice fixed whose decision
                // is being searched; there is nothing meaningful to score.
                log::trace!("line ended before the first choice, discarding");
                self.tree.discard();
                Ok(LineEnd::Discarded)
            }
        }
    }

    /// Push a frame for `candidate` and apply it speculatively.
    ///
    /// Returns whether the new line still has to be explored: `false` means
    /// a transposition value was substituted and the caller should close the
    /// frame immediately. On error the frame and its transaction are left
    /// for [`DriverCore::fail_candidate`] to clean up.
    pub(crate) fn enter_candidate(
        &mut self, choice: &Q::Choice, candidate: &Q::Candidate, maximizing: bool,
    ) -> Result<bool, Q::Error> {
        self.tree.begin_node(candidate.clone());
        self.tree.initialize_node(maximizing);
        self.seq.begin();
        self.line_floor = self.seq.open_transactions();
        self.seq.resolve(choice, candidate)?;
        let key = self.seq.state().position_hash();
        Ok(self.tree.consider_transposition(key))
    }

    /// Close the current candidate frame: restore the host to `txn_target`
    /// open transactions and fold the frame into its parent. Returns whether
    /// the remaining siblings are still worth trying.
    pub(crate) fn exit_candidate(&mut self, txn_target: usize) -> bool {
        self.unwind_to(txn_target);
        self.tree.end_node()
    }

    /// Close the current candidate frame after a collaborator failure,
    /// making sure its partial value can never be selected.
    pub(crate) fn fail_candidate(&mut self, txn_target: usize) {
        self.unwind_to(txn_target);
        self.tree.discard();
        self.tree.end_node();
    }
}
