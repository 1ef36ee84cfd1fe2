/// Task state definitions for tracking dispatch progress
///
/// A task is created when the dispatcher accepts a candidate and reaches a
/// terminal state exactly once.
use crate::frontier::CandidateUrl;
use crate::TaskError;
use chrono::{DateTime, Utc};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Represents the current state of a task in the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    /// Submitted, waiting for an admission slot
    Pending,

    /// Admitted and fetching
    Running,

    /// Fetch completed with a successful result
    Done,

    /// Fetch failed, retries were exhausted, or the task was never admitted
    Failed,
}

impl TaskState {
    /// Returns true if this is a terminal state (no further processing needed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Returns true if the state machine allows moving to `next`
    pub fn can_transition_to(&self, next: TaskState) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Pending, Self::Failed)
                | (Self::Running, Self::Done)
                | (Self::Running, Self::Failed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected task state change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Invalid task transition: {from} -> {to}")]
pub struct InvalidTaskTransition {
    pub from: TaskState,
    pub to: TaskState,
}

/// A unit of dispatched work for one candidate URL
#[derive(Debug, Clone)]
pub struct Task {
    /// Unique task identifier
    pub id: Uuid,

    /// The admitted candidate
    pub candidate: CandidateUrl,

    state: TaskState,

    /// When the task was admitted (Running)
    pub start_time: Option<DateTime<Utc>>,

    /// When the task reached a terminal state
    pub end_time: Option<DateTime<Utc>>,

    /// Resident memory delta over the task's lifetime, in MB
    pub memory_usage_mb: f64,

    /// Highest resident memory observed while the task ran, in MB
    pub peak_memory_mb: f64,

    /// Failure reason for `Failed` tasks
    pub error: Option<TaskError>,
}

impl Task {
    /// Creates a new pending task for a candidate
    pub fn new(candidate: CandidateUrl) -> Self {
        Self {
            id: Uuid::new_v4(),
            candidate,
            state: TaskState::Pending,
            start_time: None,
            end_time: None,
            memory_usage_mb: 0.0,
            peak_memory_mb: 0.0,
            error: None,
        }
    }

    /// Current state
    pub fn state(&self) -> TaskState {
        self.state
    }

    fn transition(&mut self, to: TaskState) -> Result<(), InvalidTaskTransition> {
        if !self.state.can_transition_to(to) {
            return Err(InvalidTaskTransition {
                from: self.state,
                to,
            });
        }
        self.state = to;
        if to == TaskState::Running {
            self.start_time = Some(Utc::now());
        } else if to.is_terminal() {
            self.end_time = Some(Utc::now());
        }
        Ok(())
    }

    /// Marks the task as admitted
    pub fn start(&mut self) -> Result<(), InvalidTaskTransition> {
        self.transition(TaskState::Running)
    }

    /// Marks the task as successfully completed
    pub fn complete(&mut self) -> Result<(), InvalidTaskTransition> {
        self.transition(TaskState::Done)
    }

    /// Marks the task as failed with the given reason
    pub fn fail(&mut self, error: TaskError) -> Result<(), InvalidTaskTransition> {
        self.transition(TaskState::Failed)?;
        self.error = Some(error);
        Ok(())
    }

    /// Records memory figures sampled around the fetch
    pub fn record_memory(&mut self, start_mb: f64, end_mb: f64) {
        self.memory_usage_mb = end_mb - start_mb;
        self.peak_memory_mb = self.peak_memory_mb.max(start_mb).max(end_mb);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> Task {
        Task::new(CandidateUrl::seed("https://example.com/").unwrap())
    }

    #[test]
    fn test_is_terminal() {
        assert!(!TaskState::Pending.is_terminal());
        assert!(!TaskState::Running.is_terminal());
        assert!(TaskState::Done.is_terminal());
        assert!(TaskState::Failed.is_terminal());
    }

    #[test]
    fn test_display() {
        assert_eq!(TaskState::Pending.to_string(), "pending");
        assert_eq!(TaskState::Failed.to_string(), "failed");
        assert_eq!(
            InvalidTaskTransition {
                from: TaskState::Done,
                to: TaskState::Running
            }
            .to_string(),
            "Invalid task transition: done -> running"
        );
    }

    #[test]
    fn test_happy_path_sets_times() {
        let mut task = task();
        assert_eq!(task.state(), TaskState::Pending);
        task.start().unwrap();
        assert!(task.start_time.is_some());
        task.complete().unwrap();
        assert_eq!(task.state(), TaskState::Done);
        assert!(task.end_time.is_some());
    }

    #[test]
    fn test_pending_can_fail_without_running() {
        let mut task = task();
        task.fail(TaskError::Cancelled).unwrap();
        assert_eq!(task.state(), TaskState::Failed);
        assert!(task.start_time.is_none());
        assert_eq!(task.error, Some(TaskError::Cancelled));
    }

    #[test]
    fn test_terminal_state_set_once() {
        let mut task = task();
        task.start().unwrap();
        task.complete().unwrap();

        let err = task.fail(TaskError::Fetch("late".into())).unwrap_err();
        assert_eq!(err.from, TaskState::Done);
        assert_eq!(task.state(), TaskState::Done);
        assert!(task.error.is_none());
        assert!(task.complete().is_err());
    }

    #[test]
    fn test_cannot_complete_pending() {
        let mut task = task();
        assert!(task.complete().is_err());
    }

    #[test]
    fn test_record_memory_tracks_peak() {
        let mut task = task();
        task.record_memory(100.0, 140.0);
        assert_eq!(task.memory_usage_mb, 40.0);
        assert_eq!(task.peak_memory_mb, 140.0);
    }
}
