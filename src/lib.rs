//! Alpha-beta decision search for turn-based simulations that expose their
//! logic as resumable choice sequences.

pub mod dispatch;
pub mod driver;
pub mod error;
pub mod interface;
pub mod root;
mod table;
pub mod tree;
pub mod util;

pub use dispatch::{Dispatcher, SearchJob, SynchronousDispatcher, ThreadPoolDispatcher};
pub use driver::iterative::IterativeDriver;
pub use driver::recursive::RecursiveDriver;
pub use driver::{Driver, DriverKind};
pub use error::SearchError;
pub use interface::{
    Evaluator, PositionHash, Score, Sequencer, Step, MAX_SCORE, MIN_SCORE, WINDOW_MAX, WINDOW_MIN,
};
pub use root::{Decision, RootSearch, SearchOptions};
pub use tree::{SearchNode, SearchTree};
pub use util::CancelToken;
