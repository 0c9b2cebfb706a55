//! Progress reporting for long-running operations (import, ingestion, sync).
//!
//! Callers pass a plain callback; [`ProgressReporter`] owns the ordering rules:
//! `completed` never decreases and exactly one terminal event is emitted per
//! operation, even when there is nothing to process.

use serde::{Deserialize, Serialize};

/// Lifecycle state carried by a [`ProgressEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    /// Work is ongoing.
    Running,
    /// Terminal: the operation finished.
    Completed,
    /// Terminal: the operation was aborted.
    Failed,
}

impl ProgressStatus {
    /// Whether this status ends an operation.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// One progress notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    /// Items processed so far.
    pub completed: usize,
    /// Items in the whole operation.
    pub total: usize,
    /// `completed / total` as a rounded percentage.
    pub percentage: u8,
    /// The item being processed, when meaningful.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_item: Option<String>,
    /// Lifecycle state.
    pub status: ProgressStatus,
    /// Error detail for failed items or a failed operation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Callback receiving progress events.
pub type ProgressCallback<'a> = &'a (dyn Fn(&ProgressEvent) + Send + Sync);

/// Emits well-ordered [`ProgressEvent`]s for one logical operation.
pub struct ProgressReporter<'a> {
    callback: Option<ProgressCallback<'a>>,
    total: usize,
    completed: usize,
    finished: bool,
}

impl<'a> ProgressReporter<'a> {
    /// Create a reporter for an operation over `total` items.
    pub fn new(callback: Option<ProgressCallback<'a>>, total: usize) -> Self {
        Self { callback, total, completed: 0, finished: false }
    }

    /// Items processed so far.
    pub fn completed(&self) -> usize {
        self.completed
    }

    /// Whether a terminal event has been emitted.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Emit the initial `running` event at zero.
    pub fn start(&mut self) {
        self.emit(ProgressStatus::Running, None, None);
    }

    /// Report that work on `item` has begun without advancing the count.
    pub fn working_on(&mut self, item: &str) {
        self.emit(ProgressStatus::Running, Some(item), None);
    }

    /// Mark one more item done.
    pub fn advance(&mut self, item: Option<&str>) {
        self.step(item, None);
    }

    /// Mark one more item done, recording that it failed.
    pub fn advance_with_error(&mut self, item: Option<&str>, error: &str) {
        self.step(item, Some(error));
    }

    /// Emit the terminal `completed` event.
    pub fn complete(&mut self) {
        self.emit(ProgressStatus::Completed, None, None);
        self.finished = true;
    }

    /// Emit the terminal `failed` event.
    pub fn fail(&mut self, error: &str) {
        self.emit(ProgressStatus::Failed, None, Some(error));
        self.finished = true;
    }

    fn step(&mut self, item: Option<&str>, error: Option<&str>) {
        if self.finished {
            return;
        }
        self.completed += 1;
        self.emit(ProgressStatus::Running, item, error);
    }

    fn percentage(&self, status: ProgressStatus) -> u8 {
        if self.total == 0 {
            return if status == ProgressStatus::Completed { 100 } else { 0 };
        }
        let pct = (self.completed as f64 * 100.0 / self.total as f64).round();
        pct.clamp(0.0, 100.0) as u8
    }

    fn emit(&self, status: ProgressStatus, item: Option<&str>, error: Option<&str>) {
        if self.finished {
            return;
        }
        if let Some(callback) = self.callback {
            callback(&ProgressEvent {
                completed: self.completed,
                total: self.total,
                percentage: self.percentage(status),
                current_item: item.map(str::to_string),
                status,
                error: error.map(str::to_string),
            });
        }
    }
}
