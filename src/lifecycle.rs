//! Overtime request lifecycle. The status is an enforced state machine, not
//! an advisory field: updates may only move a request along the edges below,
//! and the N1/N2 validation timestamps are stamped on the matching
//! transitions rather than set by callers.

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Workflow step status codes persisted on `workflows.status`.
pub const STEP_PENDING: i32 = 0;
pub const STEP_APPROVED: i32 = 1;
pub const STEP_REJECTED: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestStatus {
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "submitted")]
    Submitted,
    #[serde(rename = "firstLevelApproved")]
    FirstLevelApproved,
    #[serde(rename = "inProgress")]
    InProgress,
    #[serde(rename = "secondLevelApproved")]
    SecondLevelApproved,
    #[serde(rename = "accepted")]
    Accepted,
    #[serde(rename = "rejected")]
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Submitted => "submitted",
            RequestStatus::FirstLevelApproved => "firstLevelApproved",
            RequestStatus::InProgress => "inProgress",
            RequestStatus::SecondLevelApproved => "secondLevelApproved",
            RequestStatus::Accepted => "accepted",
            RequestStatus::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(RequestStatus::Pending),
            "submitted" => Some(RequestStatus::Submitted),
            "firstLevelApproved" => Some(RequestStatus::FirstLevelApproved),
            "inProgress" => Some(RequestStatus::InProgress),
            "secondLevelApproved" => Some(RequestStatus::SecondLevelApproved),
            "accepted" => Some(RequestStatus::Accepted),
            "rejected" => Some(RequestStatus::Rejected),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Accepted | RequestStatus::Rejected)
    }

    /// Transition table. Forward progress follows the two-level approval
    /// chain; rejection is reachable from every non-terminal state.
    pub fn can_transition_to(self, next: RequestStatus) -> bool {
        use RequestStatus::*;
        match (self, next) {
            (Pending, Submitted)
            | (Submitted, FirstLevelApproved)
            | (FirstLevelApproved, InProgress)
            | (InProgress, SecondLevelApproved)
            | (SecondLevelApproved, Accepted) => true,
            (from, Rejected) => !from.is_terminal(),
            _ => false,
        }
    }
}

pub fn check_transition(from: RequestStatus, to: RequestStatus) -> AppResult<()> {
    if !from.can_transition_to(to) {
        return Err(AppError::bad_request(format!(
            "illegal status transition from {} to {}",
            from.as_str(),
            to.as_str()
        )));
    }
    Ok(())
}
