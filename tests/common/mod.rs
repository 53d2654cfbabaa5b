// A scripted host: a hand-built decision tree the engine explores through
// the real Sequencer interface, with true transactional rollback and an
// event log recording every host-visible interaction. Tests assert on the
// engine's decisions and on the exact order of events.

use parking_lot::Mutex;
use ponder::{CancelToken, Evaluator, PositionHash, Score, SearchTree, Sequencer, Step};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use thiserror::Error;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Who {
    Max,
    Min,
}

/// One node of a scripted game.
#[derive(Clone, Debug)]
pub enum Node {
    /// A finished position with a fixed absolute score.
    Leaf(Score),
    /// A pending choice: the chooser and the tagged candidate subtrees.
    Decide { who: Who, arms: Vec<(String, Node)> },
    /// A plain step with more work after it.
    Then(Box<Node>),
    /// A step that opens a host-side transaction and never closes it.
    Opens(Box<Node>),
    /// A step that always asks to be retried.
    Stuck,
    /// A step that fails outright.
    Broken,
    /// Overrides the position hash of the wrapped subtree, so different
    /// branches can transpose into each other.
    Keyed(u64, Box<Node>),
}

pub fn leaf(score: Score) -> Node {
    Node::Leaf(score)
}

pub fn decide(who: Who, arms: Vec<(&str, Node)>) -> Node {
    Node::Decide { who, arms: arms.into_iter().map(|(tag, node)| (tag.to_owned(), node)).collect() }
}

pub fn then(node: Node) -> Node {
    Node::Then(Box::new(node))
}

pub fn opens(node: Node) -> Node {
    Node::Opens(Box::new(node))
}

pub fn keyed(key: u64, node: Node) -> Node {
    Node::Keyed(key, Box::new(node))
}

#[derive(Clone, Debug, Eq, PartialEq, Error)]
#[error("{0}")]
pub struct ScriptError(pub &'static str);

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Event {
    Begin,
    Rollback,
    Resolve(String),
    Evaluate(Score),
}

pub type EventLog = Arc<Mutex<Vec<Event>>>;

pub fn new_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn take_events(log: &EventLog) -> Vec<Event> {
    std::mem::take(&mut *log.lock())
}

/// The scores the evaluator reported, in order.
pub fn evaluated(events: &[Event]) -> Vec<Score> {
    events
        .iter()
        .filter_map(|event| match event {
            Event::Evaluate(score) => Some(*score),
            _ => None,
        })
        .collect()
}

/// Where a script walk currently stands: the arm indices taken so far, plus
/// the current node's hash and leaf value so the engine can consume the
/// state without seeing the script.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ScriptState {
    path: Vec<usize>,
    key: u64,
    value: Option<Score>,
}

impl PositionHash for ScriptState {
    fn position_hash(&self) -> u64 {
        self.key
    }
}

#[derive(Clone, Debug)]
pub struct ScriptChoice {
    pub who: Who,
    path: Vec<usize>,
}

#[derive(Clone)]
pub struct ScriptHost {
    script: Arc<Node>,
    state: ScriptState,
    saved: Vec<ScriptState>,
    log: EventLog,
}

impl ScriptHost {
    pub fn new(script: Node, log: EventLog) -> Self {
        let script = Arc::new(script);
        let state = ScriptState {
            key: Self::key_at(&script, &[]),
            value: Self::value_at(&script, &[]),
            path: Vec::new(),
        };
        ScriptHost { script, state, saved: Vec::new(), log }
    }

    fn node_at<'a>(script: &'a Node, path: &[usize]) -> &'a Node {
        let mut node = script;
        for &index in path {
            node = match Self::unkeyed(node) {
                Node::Decide { arms, .. } => &arms[index].1,
                Node::Then(inner) | Node::Opens(inner) => inner,
                other => panic!("script path walks through {:?}", other),
            };
        }
        node
    }

    fn unkeyed(node: &Node) -> &Node {
        match node {
            Node::Keyed(_, inner) => inner,
            other => other,
        }
    }

    fn key_at(script: &Node, path: &[usize]) -> u64 {
        match Self::node_at(script, path) {
            Node::Keyed(key, _) => *key,
            _ => {
                let mut hasher = DefaultHasher::new();
                path.hash(&mut hasher);
                hasher.finish()
            }
        }
    }

    fn value_at(script: &Node, path: &[usize]) -> Option<Score> {
        match Self::unkeyed(Self::node_at(script, path)) {
            Node::Leaf(score) => Some(*score),
            _ => None,
        }
    }

    fn current(&self) -> &Node {
        Self::unkeyed(Self::node_at(&self.script, &self.state.path))
    }

    fn descend(&mut self, index: usize) {
        self.state.path.push(index);
        self.state.key = Self::key_at(&self.script, &self.state.path);
        self.state.value = Self::value_at(&self.script, &self.state.path);
    }
}

impl Sequencer for ScriptHost {
    type State = ScriptState;
    type Choice = ScriptChoice;
    type Candidate = String;
    type Participant = Who;
    type Error = ScriptError;

    fn step(&mut self) -> Result<Step<ScriptChoice>, ScriptError> {
        match self.current() {
            Node::Leaf(_) => Ok(Step::Done),
            Node::Decide { who, .. } => {
                Ok(Step::Pending(ScriptChoice { who: *who, path: self.state.path.clone() }))
            }
            Node::Then(_) => {
                self.descend(0);
                Ok(Step::Continue)
            }
            Node::Opens(_) => {
                self.begin();
                self.descend(0);
                Ok(Step::Continue)
            }
            Node::Stuck => Ok(Step::Retry),
            Node::Broken => Err(ScriptError("step failed")),
            Node::Keyed(..) => unreachable!("current() unwraps key overrides"),
        }
    }

    fn resolve(&mut self, _choice: &ScriptChoice, candidate: &String) -> Result<(), ScriptError> {
        let index = match self.current() {
            Node::Decide { arms, .. } => arms
                .iter()
                .position(|(tag, _)| tag == candidate)
                .ok_or(ScriptError("unknown candidate"))?,
            _ => return Err(ScriptError("resolve without a pending choice")),
        };
        self.log.lock().push(Event::Resolve(candidate.clone()));
        self.descend(index);
        Ok(())
    }

    fn candidates(&self, choice: &ScriptChoice) -> Result<Vec<String>, ScriptError> {
        match Self::unkeyed(Self::node_at(&self.script, &choice.path)) {
            Node::Decide { arms, .. } => Ok(arms.iter().map(|(tag, _)| tag.clone()).collect()),
            _ => Err(ScriptError("candidates without a pending choice")),
        }
    }

    fn chooser(&self, choice: &ScriptChoice) -> Who {
        choice.who
    }

    fn state(&self) -> &ScriptState {
        &self.state
    }

    fn begin(&mut self) {
        self.log.lock().push(Event::Begin);
        self.saved.push(self.state.clone());
    }

    fn rollback(&mut self) {
        self.log.lock().push(Event::Rollback);
        self.state = self.saved.pop().expect("rollback without an open transaction");
    }

    fn open_transactions(&self) -> usize {
        self.saved.len()
    }
}

/// Evaluator over script states. The optional knobs inject failures, cap
/// the exploration depth, or fire a cancellation token after a number of
/// evaluations.
pub struct ScriptEval {
    pub log: EventLog,
    pub fail_on: Option<Score>,
    pub depth_cap: Option<usize>,
    pub cancel_after: Option<(Mutex<u64>, CancelToken)>,
}

impl ScriptEval {
    pub fn new(log: EventLog) -> Self {
        ScriptEval { log, fail_on: None, depth_cap: None, cancel_after: None }
    }
}

impl Evaluator for ScriptEval {
    type Q = ScriptHost;

    fn is_terminal(&self, tree: &SearchTree<String>, _state: &ScriptState) -> bool {
        self.depth_cap.map_or(false, |cap| tree.depth() >= cap)
    }

    fn evaluate(&self, state: &ScriptState, _perspective: Who) -> Result<Score, ScriptError> {
        // Depth-capped evaluations may land on undecided nodes; those are
        // worth a flat zero.
        let score = state.value.unwrap_or(0);
        if self.fail_on == Some(score) {
            return Err(ScriptError("evaluation failed"));
        }
        self.log.lock().push(Event::Evaluate(score));
        if let Some((countdown, token)) = &self.cancel_after {
            let mut left = countdown.lock();
            if *left > 0 {
                *left -= 1;
                if *left == 0 {
                    token.cancel();
                }
            }
        }
        Ok(score)
    }

    fn is_maximizing(&self, who: Who) -> bool {
        who == Who::Max
    }
}

/// The minimax reference tree: alternating levels, two asymmetric subtrees,
/// a won and a lost leaf among ordinary scores.
pub fn minimax_reference_tree() -> Node {
    use ponder::{MAX_SCORE, MIN_SCORE};
    decide(
        Who::Max,
        vec![
            (
                "Left",
                decide(
                    Who::Min,
                    vec![
                        (
                            "LL",
                            decide(
                                Who::Max,
                                vec![
                                    (
                                        "LLL",
                                        decide(
                                            Who::Min,
                                            vec![("a", leaf(10)), ("b", leaf(MAX_SCORE))],
                                        ),
                                    ),
                                    ("LLR", decide(Who::Min, vec![("c", leaf(5))])),
                                ],
                            ),
                        ),
                        (
                            "LR",
                            decide(
                                Who::Max,
                                vec![("LRL", decide(Who::Min, vec![("d", leaf(-10))]))],
                            ),
                        ),
                    ],
                ),
            ),
            (
                "Right",
                decide(
                    Who::Min,
                    vec![
                        (
                            "RL",
                            decide(
                                Who::Max,
                                vec![
                                    (
                                        "RLL",
                                        decide(Who::Min, vec![("e", leaf(7)), ("f", leaf(5))]),
                                    ),
                                    ("RLR", decide(Who::Min, vec![("g", leaf(MIN_SCORE))])),
                                ],
                            ),
                        ),
                        (
                            "RR",
                            decide(
                                Who::Max,
                                vec![(
                                    "RRL",
                                    decide(Who::Min, vec![("h", leaf(-7)), ("i", leaf(-5))]),
                                )],
                            ),
                        ),
                    ],
                ),
            ),
        ],
    )
}

/// The alpha-beta reference tree. Exploring it in order must skip exactly
/// the 4 under "Left" and the 7 under "Middle", and nothing else.
pub fn alpha_beta_reference_tree() -> Node {
    decide(
        Who::Max,
        vec![
            (
                "Left",
                decide(
                    Who::Min,
                    vec![
                        ("L1", decide(Who::Max, vec![("a", leaf(5)), ("b", leaf(6))])),
                        ("L2", decide(Who::Max, vec![("c", leaf(7)), ("d", leaf(4))])),
                        ("L3", decide(Who::Max, vec![("e", leaf(3))])),
                    ],
                ),
            ),
            (
                "Middle",
                decide(
                    Who::Min,
                    vec![
                        ("M1", decide(Who::Max, vec![("f", leaf(6)), ("g", leaf(6))])),
                        ("M2", decide(Who::Max, vec![("h", leaf(9)), ("i", leaf(7))])),
                    ],
                ),
            ),
            (
                "Right",
                decide(Who::Min, vec![("R1", decide(Who::Max, vec![("j", leaf(5))]))]),
            ),
        ],
    )
}
