//! Transition tables for every status-carrying record. All status writes
//! go through these checks; an illegal transition is rejected with a
//! `TransitionError` rather than silently applied.

use std::fmt;

use serde::Deserialize;

use crate::models::{ApprovalStatus, BookingStatus, TicketStatus};

/// A provider- or admin-initiated action on a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingAction {
    Confirm,
    Decline,
    Start,
    Complete,
}

impl BookingAction {
    pub fn target(&self) -> BookingStatus {
        match self {
            BookingAction::Confirm => BookingStatus::Confirmed,
            BookingAction::Decline => BookingStatus::Cancelled,
            BookingAction::Start => BookingStatus::InProgress,
            BookingAction::Complete => BookingStatus::Completed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingAction::Confirm => "confirm",
            BookingAction::Decline => "decline",
            BookingAction::Start => "start",
            BookingAction::Complete => "complete",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionError {
    pub from: &'static str,
    pub to: &'static str,
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "illegal transition from {} to {}", self.from, self.to)
    }
}

impl std::error::Error for TransitionError {}

impl BookingStatus {
    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Pending, Cancelled)
                | (Confirmed, InProgress)
                | (Confirmed, Cancelled)
                | (InProgress, Completed)
        )
    }

    /// Resolves an action against the transition table.
    pub fn apply(self, action: BookingAction) -> Result<BookingStatus, TransitionError> {
        let next = action.target();
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError {
                from: self.as_str(),
                to: next.as_str(),
            })
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }

    /// A booking still ahead of the customer: not yet completed or cancelled.
    pub fn is_upcoming(self) -> bool {
        !self.is_terminal()
    }
}

impl ApprovalStatus {
    pub fn can_transition_to(self, next: ApprovalStatus) -> bool {
        use ApprovalStatus::*;
        matches!((self, next), (Pending, Approved) | (Pending, Rejected))
    }

    pub fn decide(self, next: ApprovalStatus) -> Result<ApprovalStatus, TransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError {
                from: self.as_str(),
                to: next.as_str(),
            })
        }
    }
}

impl TicketStatus {
    pub fn can_transition_to(self, next: TicketStatus) -> bool {
        use TicketStatus::*;
        matches!(
            (self, next),
            (Open, InProgress) | (Open, Resolved) | (InProgress, Resolved)
        )
    }

    pub fn advance(self, next: TicketStatus) -> Result<TicketStatus, TransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError {
                from: self.as_str(),
                to: next.as_str(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ApprovalStatus, BookingStatus, TicketStatus};

    #[test]
    fn booking_happy_path() {
        let status = BookingStatus::Pending;
        let status = status.apply(BookingAction::Confirm).unwrap();
        assert_eq!(status, BookingStatus::Confirmed);
        let status = status.apply(BookingAction::Start).unwrap();
        assert_eq!(status, BookingStatus::InProgress);
        let status = status.apply(BookingAction::Complete).unwrap();
        assert_eq!(status, BookingStatus::Completed);
        assert!(status.is_terminal());
    }

    #[test]
    fn decline_cancels_from_pending_and_confirmed() {
        assert_eq!(
            BookingStatus::Pending.apply(BookingAction::Decline).unwrap(),
            BookingStatus::Cancelled
        );
        assert_eq!(
            BookingStatus::Confirmed
                .apply(BookingAction::Decline)
                .unwrap(),
            BookingStatus::Cancelled
        );
    }

    #[test]
    fn complete_requires_in_progress() {
        let err = BookingStatus::Pending
            .apply(BookingAction::Complete)
            .unwrap_err();
        assert_eq!(err.from, "pending");
        assert_eq!(err.to, "completed");
        assert!(BookingStatus::Confirmed
            .apply(BookingAction::Complete)
            .is_err());
    }

    #[test]
    fn terminal_states_accept_nothing() {
        for terminal in [BookingStatus::Completed, BookingStatus::Cancelled] {
            for action in [
                BookingAction::Confirm,
                BookingAction::Decline,
                BookingAction::Start,
                BookingAction::Complete,
            ] {
                assert!(terminal.apply(action).is_err());
            }
        }
    }

    #[test]
    fn double_submit_of_same_action_is_rejected() {
        let confirmed = BookingStatus::Pending.apply(BookingAction::Confirm).unwrap();
        assert!(confirmed.apply(BookingAction::Confirm).is_err());
    }

    #[test]
    fn upcoming_partition_matches_terminal_partition() {
        assert!(BookingStatus::Pending.is_upcoming());
        assert!(BookingStatus::Confirmed.is_upcoming());
        assert!(BookingStatus::InProgress.is_upcoming());
        assert!(!BookingStatus::Completed.is_upcoming());
        assert!(!BookingStatus::Cancelled.is_upcoming());
    }

    #[test]
    fn approval_only_moves_out_of_pending() {
        assert_eq!(
            ApprovalStatus::Pending
                .decide(ApprovalStatus::Approved)
                .unwrap(),
            ApprovalStatus::Approved
        );
        assert!(ApprovalStatus::Approved
            .decide(ApprovalStatus::Rejected)
            .is_err());
        assert!(ApprovalStatus::Rejected
            .decide(ApprovalStatus::Approved)
            .is_err());
    }

    #[test]
    fn ticket_flow() {
        assert!(TicketStatus::Open.can_transition_to(TicketStatus::InProgress));
        assert!(TicketStatus::Open.can_transition_to(TicketStatus::Resolved));
        assert!(TicketStatus::InProgress.can_transition_to(TicketStatus::Resolved));
        assert!(!TicketStatus::Resolved.can_transition_to(TicketStatus::Open));
        assert!(!TicketStatus::InProgress.can_transition_to(TicketStatus::Open));
    }
}
