//! The failure taxonomy of a search.
//!
//! Only two things can go wrong from the caller's point of view: the host
//! offered nothing to decide between, or a host collaborator failed mid
//! search. Everything else (cutoffs, cancellation, lost work orders) degrades
//! the result instead of erroring.

use thiserror::Error;

/// An error produced by a search, generic over the host's own error type.
#[derive(Debug, Error)]
pub enum SearchError<E> {
    /// The root choice enumerated no candidates. Reported before any work
    /// order is built.
    #[error("the root choice has no candidates")]
    NoCandidates,

    /// A host collaborator failed. The engine has already rolled back every
    /// transaction it opened before propagating this.
    #[error("host error during search")]
    Host(#[source] E),
}
