//! Core data model.
//!
//! A work item is one unit of caller-supplied work plus the processing state
//! the engine tracks for it: status, retry count, and an auxiliary result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Work Item
// ---------------------------------------------------------------------------

/// A unit of work flowing through a [`Herd`](crate::engine::Herd).
///
/// `payload` is the problem and `result` the (optional) solution. The
/// processing function may rewrite both in place; the engine never looks
/// inside them. `status` and `retry_count` are owned by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem<P, R = ()> {
    /// Stable identity for the item's lifetime.
    pub id: WorkId,

    /// Caller-supplied value. Opaque to the engine.
    pub payload: P,

    pub(crate) status: Status,

    pub(crate) retry_count: u32,

    pub(crate) result: Option<R>,

    pub submitted_at: DateTime<Utc>,

    /// Set when the item lands on the output queue.
    pub completed_at: Option<DateTime<Utc>>,
}

impl<P, R> WorkItem<P, R> {
    pub fn new(id: impl Into<WorkId>, payload: P) -> Self {
        Self {
            id: id.into(),
            payload,
            status: Status::Unprocessed,
            retry_count: 0,
            result: None,
            submitted_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Create an item with a freshly generated id.
    pub fn with_payload(payload: P) -> Self {
        Self::new(WorkId::new(), payload)
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// Number of times this item has looped back through the retry queue.
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn result(&self) -> Option<&R> {
        self.result.as_ref()
    }

    pub fn set_result(&mut self, result: R) {
        self.result = Some(result);
    }

    pub fn take_result(&mut self) -> Option<R> {
        self.result.take()
    }

    pub(crate) fn set_status(&mut self, status: Status) {
        self.status = status;
    }

    pub(crate) fn increment_retries(&mut self) {
        self.retry_count += 1;
    }
}

/// Newtype for work item IDs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkId(pub String);

impl WorkId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for WorkId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for WorkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WorkId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for WorkId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<usize> for WorkId {
    fn from(n: usize) -> Self {
        Self(n.to_string())
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Processing state of a work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Submitted, not yet attempted.
    #[default]
    Unprocessed,
    /// Processed successfully. Terminal.
    Success,
    /// Failed but retriable, will loop back while retries remain.
    Retry,
    /// Failed permanently or exhausted retries. Terminal.
    Failure,
}

impl Status {
    /// Is this a terminal status?
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Success | Status::Failure)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Status::Unprocessed => "unprocessed",
            Status::Success => "success",
            Status::Retry => "retry",
            Status::Failure => "failure",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unprocessed" => Ok(Status::Unprocessed),
            "success" => Ok(Status::Success),
            "retry" => Ok(Status::Retry),
            "failure" => Ok(Status::Failure),
            other => Err(format!("unknown status: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// What a processing function reports for one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Retry,
    Failure,
}

impl From<Outcome> for Status {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Success => Status::Success,
            Outcome::Retry => Status::Retry,
            Outcome::Failure => Status::Failure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_item_starts_unprocessed() {
        let item: WorkItem<i32> = WorkItem::new("abc", 5);
        assert_eq!(item.id.as_str(), "abc");
        assert_eq!(item.status(), Status::Unprocessed);
        assert_eq!(item.retry_count(), 0);
        assert!(item.result().is_none());
        assert!(item.completed_at.is_none());
    }

    #[test]
    fn result_can_be_set_and_taken() {
        let mut item: WorkItem<(), String> = WorkItem::new("abc", ());
        item.set_result("xyz".to_string());
        assert_eq!(item.result().map(String::as_str), Some("xyz"));
        assert_eq!(item.take_result().as_deref(), Some("xyz"));
        assert!(item.result().is_none());
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(WorkId::new(), WorkId::new());
    }

    #[test]
    fn status_round_trips_through_display() {
        for status in [
            Status::Unprocessed,
            Status::Success,
            Status::Retry,
            Status::Failure,
        ] {
            assert_eq!(status.to_string().parse::<Status>(), Ok(status));
        }
        assert!("bogus".parse::<Status>().is_err());
    }

    #[test]
    fn only_success_and_failure_are_terminal() {
        assert!(Status::Success.is_terminal());
        assert!(Status::Failure.is_terminal());
        assert!(!Status::Retry.is_terminal());
        assert!(!Status::Unprocessed.is_terminal());
    }

    #[test]
    fn outcome_maps_onto_status() {
        assert_eq!(Status::from(Outcome::Success), Status::Success);
        assert_eq!(Status::from(Outcome::Retry), Status::Retry);
        assert_eq!(Status::from(Outcome::Failure), Status::Failure);
    }
}
