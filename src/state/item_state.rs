//! Work-item state definitions for tracking a search request
use crate::crawler::ErrorTag;
use crate::HarvestError;
use std::fmt;

/// Represents the current state of a work item's search request
///
/// ```text
/// Pending -> Requesting -> Success(status)
///                       -> Retrying -> Requesting ...
///                       -> Failed(tag)
/// ```
///
/// `Retrying` loops back to `Requesting` until a response arrives or the
/// retry budget runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemState {
    /// Item is queued and no request was issued yet
    Pending,

    /// A request for the item is in flight
    Requesting,

    /// The last attempt failed transiently; waiting out the backoff
    Retrying,

    /// A response was obtained (any HTTP status)
    Success(u16),

    /// The retry budget ran out without any response
    Failed(ErrorTag),
}

impl ItemState {
    /// Returns true if no further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success(_) | Self::Failed(_))
    }

    /// Returns true while the item may still produce a response
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns true if `to` is a legal next state
    pub fn can_transition_to(&self, to: &ItemState) -> bool {
        matches!(
            (self, to),
            (Self::Pending, Self::Requesting)
                | (Self::Requesting, Self::Success(_))
                | (Self::Requesting, Self::Retrying)
                | (Self::Requesting, Self::Failed(_))
                | (Self::Retrying, Self::Requesting)
                | (Self::Retrying, Self::Failed(_))
        )
    }

    /// Moves to `to`, rejecting illegal transitions
    pub fn transition(self, to: ItemState) -> Result<ItemState, HarvestError> {
        if self.can_transition_to(&to) {
            Ok(to)
        } else {
            Err(HarvestError::InvalidTransition { from: self, to })
        }
    }

    /// Short lowercase name, used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Requesting => "requesting",
            Self::Retrying => "retrying",
            Self::Success(_) => "success",
            Self::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success(status) => write!(f, "success({})", status),
            Self::Failed(tag) => write!(f, "failed({})", tag),
            other => write!(f, "{}", other.name()),
        }
    }
}
