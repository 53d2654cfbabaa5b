//! The bounded stack of search frames.
//!
//! Each frame tracks one candidate line in a negated single-bound (negamax
//! style) form: its window and value are expressed in the local sign of the
//! participant who chose the line, so a maximizing frame's value is the
//! absolute score and a minimizing frame's value is its negation. Because
//! the same participant may decide consecutive choices, polarity does not
//! strictly alternate; window inheritance and value folding are therefore
//! relative to the parent's polarity rather than hardwired to flip.
//!
//! The stack also owns the work order's private transposition table and
//! handles registration and substitution of cached values.

use crate::interface::{Score, MAX_SCORE, MIN_SCORE, WINDOW_MAX, WINDOW_MIN};
use crate::table::{EntryFlag, TranspositionTable};
use std::cmp::{max, min};

/// One frame of the exploration. Read-only outside this module.
#[derive(Debug)]
pub struct SearchNode<R> {
    alpha: Score,
    beta: Score,
    // Window as of initialization. Folding tightens alpha/beta above, and
    // the transposition flag is classified against the original window.
    alpha0: Score,
    beta0: Score,
    // Running best value in this frame's local sign.
    value: Score,
    has_value: bool,
    is_max: bool,
    initialized: bool,
    discarded: bool,
    // The candidate that led into this subtree. None only on the root.
    tag: Option<R>,
    // Entry tag of the child subtree backing `value`.
    best: Option<R>,
    // Position key registered for storage when this frame ends.
    key: Option<u64>,
}

impl<R> SearchNode<R> {
    pub fn alpha(&self) -> Score {
        self.alpha
    }

    pub fn beta(&self) -> Score {
        self.beta
    }

    /// The running best value, in this frame's local sign.
    pub fn value(&self) -> Option<Score> {
        if self.has_value {
            Some(self.value)
        } else {
            None
        }
    }

    /// The candidate that led into this subtree.
    pub fn result(&self) -> Option<&R> {
        self.tag.as_ref()
    }

    pub fn has_result(&self) -> bool {
        self.tag.is_some()
    }

    pub fn is_maximizing(&self) -> bool {
        self.is_max
    }
}

/// The frame stack of one work order.
///
/// The root frame exists from construction, is always maximizing, and is
/// never popped; candidate frames come and go strictly LIFO around it. Call
/// sequence per frame: `begin_node`, `initialize_node`, then any of
/// `evaluate`/`discard`/`consider_transposition`/child frames, then the
/// matching `end_node`. Misuse is a bug and only `debug_assert`ed.
pub struct SearchTree<R> {
    stack: Vec<SearchNode<R>>,
    table: TranspositionTable,
    table_hits: u64,
}

impl<R> SearchTree<R> {
    pub fn new() -> Self {
        let root = SearchNode {
            alpha: WINDOW_MIN,
            beta: WINDOW_MAX,
            alpha0: WINDOW_MIN,
            beta0: WINDOW_MAX,
            value: WINDOW_MIN,
            has_value: false,
            is_max: true,
            initialized: true,
            discarded: false,
            tag: None,
            best: None,
            key: None,
        };
        SearchTree { stack: vec![root], table: TranspositionTable::new(), table_hits: 0 }
    }

    /// Number of active frames. The root counts as depth 1.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// The innermost frame.
    pub fn current(&self) -> &SearchNode<R> {
        self.stack.last().unwrap()
    }

    fn current_mut(&mut self) -> &mut SearchNode<R> {
        self.stack.last_mut().unwrap()
    }

    /// Push a frame for a candidate line. The window is derived from the
    /// parent at `initialize_node`, once the polarity is known.
    pub fn begin_node(&mut self, tag: R) {
        let parent = self.current();
        debug_assert!(parent.initialized, "began a child under an uninitialized frame");
        let (alpha, beta, is_max) = (parent.alpha, parent.beta, parent.is_max);
        self.stack.push(SearchNode {
            alpha,
            beta,
            alpha0: alpha,
            beta0: beta,
            value: WINDOW_MIN,
            has_value: false,
            is_max,
            initialized: false,
            discarded: false,
            tag: Some(tag),
            best: None,
            key: None,
        });
    }

    /// Fix the polarity of the just-begun frame and derive its window: same
    /// polarity as the parent inherits `(alpha, beta)` unchanged, inverted
    /// polarity inherits `(-beta, -alpha)` so the searching side's lower
    /// bound stays first.
    pub fn initialize_node(&mut self, is_max: bool) {
        let len = self.stack.len();
        debug_assert!(len >= 2, "the root frame is initialized at construction");
        let (pa, pb, pmax) = {
            let parent = &self.stack[len - 2];
            (parent.alpha, parent.beta, parent.is_max)
        };
        let node = &mut self.stack[len - 1];
        debug_assert!(!node.initialized, "frame initialized twice");
        let (alpha, beta) = if is_max == pmax { (pa, pb) } else { (-pb, -pa) };
        node.alpha = alpha;
        node.beta = beta;
        node.alpha0 = alpha;
        node.beta0 = beta;
        node.is_max = is_max;
        node.initialized = true;
    }

    /// Fold an absolute leaf score into the current frame.
    pub fn evaluate(&mut self, score: Score) {
        debug_assert!((MIN_SCORE..=MAX_SCORE).contains(&score), "leaf score out of range");
        let node = self.current_mut();
        debug_assert!(node.initialized, "evaluated an uninitialized frame");
        debug_assert!(!node.discarded, "evaluated a discarded frame");
        let local = if node.is_max { score } else { -score };
        if !node.has_value || local > node.value {
            node.value = local;
        }
        node.has_value = true;
    }

    /// Abandon the current frame: it takes the worst extreme for its own
    /// polarity and `end_node` will not let it become any parent's best
    /// child, regardless of sibling values.
    pub fn discard(&mut self) {
        let node = self.current_mut();
        debug_assert!(node.initialized, "discarded an uninitialized frame");
        node.value = MIN_SCORE;
        node.has_value = true;
        node.discarded = true;
    }

    /// Probe the transposition table for the current frame.
    ///
    /// Returns `false` when a cached value was substituted into the frame;
    /// the caller must then end the frame without exploring. Returns `true`
    /// when the position must be explored; the key is registered and the
    /// frame's settled value will be stored at `end_node`.
    pub fn consider_transposition(&mut self, key: u64) -> bool {
        let depth = self.stack.len();
        let hit = self.table.lookup(key).copied();
        let node = self.current_mut();
        debug_assert!(node.initialized, "probed an uninitialized frame");
        if let Some(entry) = hit {
            // Only trust values recorded with equal-or-greater remaining
            // look-ahead, which means at this stack depth or above, and only
            // under the same polarity (the stored sign convention).
            if entry.is_max == node.is_max && depth >= entry.depth {
                let substitute = match entry.flag {
                    EntryFlag::Exact => true,
                    EntryFlag::Lowerbound => {
                        node.alpha = max(node.alpha, entry.value);
                        node.alpha >= node.beta
                    }
                    EntryFlag::Upperbound => {
                        node.beta = min(node.beta, entry.value);
                        // The tightened bound is the one the exploration
                        // runs under, so the stored flag is judged against
                        // it. The original alpha stays the fail-low line.
                        node.beta0 = node.beta;
                        node.alpha >= node.beta
                    }
                };
                if substitute {
                    if !node.has_value || entry.value > node.value {
                        node.value = entry.value;
                    }
                    node.has_value = true;
                    self.table_hits += 1;
                    return false;
                }
            }
        }
        node.key = Some(key);
        true
    }

    /// Pop the current frame and fold its value into the parent.
    ///
    /// Returns whether siblings of the popped frame should still be tried;
    /// `false` means the parent's window collapsed (an alpha-beta cutoff)
    /// and the remaining candidates must be skipped.
    pub fn end_node(&mut self) -> bool {
        debug_assert!(self.stack.len() >= 2, "cannot end the root frame");
        let child = self.stack.pop().unwrap();
        debug_assert!(child.initialized, "ended an uninitialized frame");
        let child_depth = self.stack.len() + 1;
        if child.has_value && !child.discarded {
            if let Some(key) = child.key {
                let flag = if child.value <= child.alpha0 {
                    EntryFlag::Upperbound
                } else if child.value >= child.beta0 {
                    EntryFlag::Lowerbound
                } else {
                    EntryFlag::Exact
                };
                self.table.store(key, child.value, child_depth, child.is_max, flag);
            }
            let parent = self.current_mut();
            if child.is_max == parent.is_max {
                // The child's chooser shares the parent's sign: a max fold
                // that raises the parent's lower bound.
                let v = child.value;
                if !parent.has_value || v > parent.value {
                    parent.value = v;
                    parent.has_value = true;
                    parent.best = child.tag;
                }
                parent.alpha = max(parent.alpha, v);
            } else {
                // Opposing chooser: their best is the parent's min, and the
                // running min is an upper bound on the parent's value.
                let v = -child.value;
                if !parent.has_value || v < parent.value {
                    parent.value = v;
                    parent.has_value = true;
                    parent.best = child.tag;
                }
                parent.beta = min(parent.beta, v);
            }
        }
        let parent = self.current();
        parent.alpha < parent.beta
    }

    /// The settled root value, if any.
    pub fn value(&self) -> Option<Score> {
        let root = &self.stack[0];
        if root.has_value && !root.discarded {
            Some(root.value)
        } else {
            None
        }
    }

    /// The winning first-level candidate and the root value.
    pub fn result(&self) -> Option<(&R, Score)> {
        let root = &self.stack[0];
        if root.has_value && !root.discarded {
            root.best.as_ref().map(|tag| (tag, root.value))
        } else {
            None
        }
    }

    /// Number of cached values substituted so far.
    pub fn table_hits(&self) -> u64 {
        self.table_hits
    }
}

impl<R> Default for SearchTree<R> {
    fn default() -> Self {
        Self::new()
    }
}
