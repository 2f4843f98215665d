//! Operation history
//!
//! Every step an engine takes against a provider is recorded as an
//! [`Operation`], most recent first, with its duration and outcome.

use std::collections::VecDeque;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Kind of step performed for a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Create,
    Read,
    Replace,
    Update,
    Delete,
    /// Desired state already matched; nothing sent to the provider
    Same,
}

impl OperationKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Create => "Create",
            Self::Read => "Read",
            Self::Replace => "Replace",
            Self::Update => "Update",
            Self::Delete => "Delete",
            Self::Same => "Same",
        }
    }

    pub fn past_tense(&self) -> &'static str {
        match self {
            Self::Create => "Created",
            Self::Read => "Read",
            Self::Replace => "Replaced",
            Self::Update => "Updated",
            Self::Delete => "Deleted",
            Self::Same => "Unchanged",
        }
    }

    pub fn present_participle(&self) -> &'static str {
        match self {
            Self::Create => "Creating",
            Self::Read => "Reading",
            Self::Replace => "Replacing",
            Self::Update => "Updating",
            Self::Delete => "Deleting",
            Self::Same => "Checking",
        }
    }
}

/// Status of an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationStatus {
    Pending,
    InProgress,
    Success,
    /// Operation failed with error message
    Error(String),
}

impl OperationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Error(_))
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Self::Pending => "◯",
            Self::InProgress => "↻",
            Self::Success => "✓",
            Self::Error(_) => "✗",
        }
    }
}

/// A single recorded operation
#[derive(Debug, Clone)]
pub struct Operation {
    pub id: Uuid,
    pub kind: OperationKind,
    pub type_token: String,
    pub urn: String,
    pub status: OperationStatus,
    pub created_at: Instant,
    pub completed_at: Option<Instant>,
}

impl Operation {
    pub fn new(kind: OperationKind, type_token: impl Into<String>, urn: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            type_token: type_token.into(),
            urn: urn.into(),
            status: OperationStatus::Pending,
            created_at: Instant::now(),
            completed_at: None,
        }
    }

    pub fn set_in_progress(&mut self) {
        self.status = OperationStatus::InProgress;
    }

    pub fn set_success(&mut self) {
        self.status = OperationStatus::Success;
        self.completed_at = Some(Instant::now());
    }

    pub fn set_error(&mut self, error: String) {
        self.status = OperationStatus::Error(error);
        self.completed_at = Some(Instant::now());
    }

    /// Duration of the operation (or elapsed time if still running)
    pub fn duration(&self) -> Duration {
        self.completed_at
            .unwrap_or_else(Instant::now)
            .duration_since(self.created_at)
    }

    pub fn duration_display(&self) -> String {
        let d = self.duration();
        if d.as_secs() < 1 {
            format!("{}ms", d.as_millis())
        } else if d.as_secs() < 60 {
            format!("{}s", d.as_secs())
        } else {
            format!("{}m{}s", d.as_secs() / 60, d.as_secs() % 60)
        }
    }

    /// One-line summary, e.g. `✓ Created urn:... (12ms)`
    pub fn summary(&self) -> String {
        let verb = match &self.status {
            OperationStatus::Pending | OperationStatus::InProgress => {
                self.kind.present_participle()
            }
            OperationStatus::Success => self.kind.past_tense(),
            OperationStatus::Error(_) => "Failed",
        };
        let base = format!("{} {} {}", self.status.icon(), verb, self.urn);
        match &self.status {
            OperationStatus::Error(err) => format!("{} - {}", base, err),
            s if s.is_terminal() => format!("{} ({})", base, self.duration_display()),
            _ => format!("{}...", base),
        }
    }
}

/// Bounded operation history
#[derive(Debug)]
pub struct OperationLog {
    /// All operations (recent first)
    pub operations: VecDeque<Operation>,
    /// Maximum operations to keep in history
    pub max_history: usize,
}

impl Default for OperationLog {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationLog {
    pub fn new() -> Self {
        Self::with_max_history(200)
    }

    pub fn with_max_history(max_history: usize) -> Self {
        Self {
            operations: VecDeque::new(),
            max_history,
        }
    }

    /// Record a new operation and return its id
    pub fn start(&mut self, kind: OperationKind, type_token: &str, urn: &str) -> Uuid {
        let mut operation = Operation::new(kind, type_token, urn);
        operation.set_in_progress();
        let id = operation.id;
        tracing::debug!("{}", operation.summary());
        self.operations.push_front(operation);
        self.trim_history();
        id
    }

    pub fn mark_success(&mut self, id: Uuid) {
        if let Some(op) = self.operations.iter_mut().find(|o| o.id == id) {
            op.set_success();
            tracing::info!("{}", op.summary());
        }
    }

    pub fn mark_error(&mut self, id: Uuid, error: String) {
        if let Some(op) = self.operations.iter_mut().find(|o| o.id == id) {
            op.set_error(error);
            tracing::warn!("{}", op.summary());
        }
    }

    /// Record a step that completed without provider interaction
    pub fn record(&mut self, kind: OperationKind, type_token: &str, urn: &str) {
        let id = self.start(kind, type_token, urn);
        self.mark_success(id);
    }

    pub fn get(&self, id: Uuid) -> Option<&Operation> {
        self.operations.iter().find(|o| o.id == id)
    }

    pub fn in_progress_count(&self) -> usize {
        self.operations
            .iter()
            .filter(|o| !o.status.is_terminal())
            .count()
    }

    /// Kinds of the operations recorded for a resource, oldest first
    pub fn kinds_for(&self, urn: &str) -> Vec<OperationKind> {
        self.operations
            .iter()
            .rev()
            .filter(|o| o.urn == urn)
            .map(|o| o.kind)
            .collect()
    }

    pub fn clear(&mut self) {
        self.operations.clear();
    }

    fn trim_history(&mut self) {
        while self.operations.len() > self.max_history {
            // Remove oldest completed operation
            if let Some(pos) = self.operations.iter().rposition(|o| o.status.is_terminal()) {
                self.operations.remove(pos);
            } else {
                self.operations.pop_back();
            }
        }
    }
}
