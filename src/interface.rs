//! The common structures and traits connecting a host simulation to the engine.
//!
//! The engine never manipulates host state directly. It drives a resumable
//! step machine (the [`Sequencer`]), asks it to enumerate and resolve pending
//! choices, and undoes everything through the host's transaction log. Scoring
//! and terminal detection live behind [`Evaluator`], position identity behind
//! [`PositionHash`].

use crate::tree::SearchTree;

/// An assessment of a position from the perspective of the maximizing
/// participant. Higher is better for them; a neutral position is zero.
pub type Score = i32;

// These definitions ensure that every score negates to another valid score.
// i32::MIN is never used anywhere in the engine, so window negation cannot
// overflow.

/// A won position for the maximizing participant.
pub const MAX_SCORE: Score = i32::MAX - 1;
/// A lost position for the maximizing participant. Also assigned to
/// discarded branches, from the branch's own perspective.
pub const MIN_SCORE: Score = -MAX_SCORE;

/// Upper seed of a fresh search window. Strictly above every legal score so
/// that even a won leaf can still tighten a bound.
pub const WINDOW_MAX: Score = i32::MAX;
/// Lower seed of a fresh search window.
pub const WINDOW_MIN: Score = -WINDOW_MAX;

/// The outcome of advancing a [`Sequencer`] by one step.
#[derive(Debug)]
pub enum Step<C> {
    /// The step ran and more remain. Keep stepping.
    Continue,
    /// The host cannot continue until the given choice is decided.
    Pending(C),
    /// The current step refused to run and asked to be retried later. The
    /// engine treats the whole branch as unexplorable and discards it.
    Retry,
    /// The sequence ran out of steps. The position is terminal.
    Done,
}

/// A host simulation's step machine, choice enumerator and transaction log.
///
/// One sequencer owns one view of the game state. The engine mutates it only
/// speculatively: every `resolve` happens inside a transaction the engine
/// opened with `begin` and will unwind with `rollback` before trying the next
/// sibling candidate. Implementations used with the parallel partitioner must
/// also be `Clone`, giving each work order a private replay of the current
/// position.
pub trait Sequencer {
    /// The type of the game state.
    type State;
    /// A pending decision request raised by host logic.
    type Choice;
    /// One possible resolution of a choice. An opaque value the engine only
    /// clones and hands back.
    type Candidate: Clone;
    /// The identity of a deciding participant.
    type Participant: Copy;
    /// A failure reported by host logic.
    type Error;

    /// Execute host logic up to the next step boundary.
    fn step(&mut self) -> Result<Step<Self::Choice>, Self::Error>;

    /// Supply the resolution of the pending choice. The next `step` resumes
    /// with the decision applied.
    fn resolve(&mut self, choice: &Self::Choice, candidate: &Self::Candidate)
        -> Result<(), Self::Error>;

    /// The ordered candidate resolutions of a pending choice. Order matters:
    /// the engine explores candidates exactly in this order, and the first
    /// candidate is the default when a search produces nothing usable.
    fn candidates(&self, choice: &Self::Choice) -> Result<Vec<Self::Candidate>, Self::Error>;

    /// Which participant decides this choice.
    fn chooser(&self, choice: &Self::Choice) -> Self::Participant;

    /// Read access to the current game state, for hashing and evaluation.
    fn state(&self) -> &Self::State;

    /// Open a transaction. All host mutation until the matching `rollback`
    /// is speculative.
    fn begin(&mut self);

    /// Close the innermost open transaction, undoing every mutation made
    /// since its `begin`.
    fn rollback(&mut self);

    /// Number of currently open transactions. The engine restores this to
    /// its starting value before every leaf evaluation and before returning.
    fn open_transactions(&self) -> usize;
}

/// Scores positions and decides where exploration stops.
pub trait Evaluator {
    /// The sequencer type this evaluator understands.
    type Q: Sequencer;

    /// Whether exploration should stop at this position. The tree is
    /// provided so depth-limited evaluators can read `tree.depth()`.
    fn is_terminal(
        &self, tree: &SearchTree<<Self::Q as Sequencer>::Candidate>,
        state: &<Self::Q as Sequencer>::State,
    ) -> bool;

    /// Score a terminal position. Scores are absolute: positive favors the
    /// side `is_maximizing` puts on the maximizing end, whoever is given as
    /// `perspective`. The perspective names the participant whose decision
    /// is being searched, for heuristics that weight tempo. Must return a
    /// value in `[MIN_SCORE, MAX_SCORE]`; the extremes mean lost and won.
    fn evaluate(
        &self, state: &<Self::Q as Sequencer>::State,
        perspective: <Self::Q as Sequencer>::Participant,
    ) -> Result<Score, <Self::Q as Sequencer>::Error>;

    /// Whether this participant is on the maximizing side of the search.
    fn is_maximizing(&self, participant: <Self::Q as Sequencer>::Participant) -> bool;
}

/// A hash of the host position, for transposition detection.
///
/// Expected to be cheap; typically a zobrist hash maintained incrementally
/// by the host. Two states with equal hashes are assumed to be the same
/// position at the same point in play.
pub trait PositionHash {
    /// Hash of the current position.
    fn position_hash(&self) -> u64;
}
