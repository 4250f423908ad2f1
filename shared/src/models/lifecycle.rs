//! Common shape of document state machines

use std::fmt;

use thiserror::Error;

/// A document status enumeration.
///
/// Each document type has a strictly ordered chain of states plus a terminal
/// cancelled state. Implementations match exhaustively so adding a state is a
/// compile error at every transition boundary.
pub trait DocumentStatus: Copy + Eq + fmt::Display {
    /// Name used in error messages ("inbound", "outbound", ...)
    const DOCUMENT: &'static str;

    /// The state a freshly created document is in; update and delete are only legal here
    fn initial() -> Self;

    fn is_terminal(self) -> bool;

    /// Whether `cancel` is legal from this state
    fn can_cancel(self) -> bool;
}

/// A transition was attempted from the wrong status
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{document} {number} is {current}, expected {expected}")]
pub struct StateError {
    pub document: &'static str,
    pub number: String,
    pub current: String,
    pub expected: String,
}

/// Checks `current == expected` for the document numbered `number`
pub fn require_status<S: DocumentStatus>(
    number: &str,
    current: S,
    expected: S,
) -> Result<(), StateError> {
    if current == expected {
        return Ok(());
    }
    Err(StateError {
        document: S::DOCUMENT,
        number: number.to_string(),
        current: current.to_string(),
        expected: expected.to_string(),
    })
}

/// Checks `current` is one of `allowed`
pub fn require_any_status<S: DocumentStatus>(
    number: &str,
    current: S,
    allowed: &[S],
) -> Result<(), StateError> {
    if allowed.contains(&current) {
        return Ok(());
    }
    let expected = allowed
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(" or ");
    Err(StateError {
        document: S::DOCUMENT,
        number: number.to_string(),
        current: current.to_string(),
        expected,
    })
}

/// Checks the document may be edited or deleted
pub fn require_initial<S: DocumentStatus>(number: &str, current: S) -> Result<(), StateError> {
    require_status(number, current, S::initial())
}

/// Checks `cancel` is legal
pub fn require_cancellable<S: DocumentStatus>(number: &str, current: S) -> Result<(), StateError> {
    if current.can_cancel() {
        return Ok(());
    }
    Err(StateError {
        document: S::DOCUMENT,
        number: number.to_string(),
        current: current.to_string(),
        expected: "a cancellable status".to_string(),
    })
}
