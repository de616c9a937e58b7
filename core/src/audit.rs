use std::fmt;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::ledger::lock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    GenerateDay,
    AcceptDay,
    RejectDay,
    RegenerateMeal,
    SwapItem,
    AddExtra,
    ConfirmItem,
    SetTraining,
}

impl AuditKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AuditKind::GenerateDay => "generate_day",
            AuditKind::AcceptDay => "accept_day",
            AuditKind::RejectDay => "reject_day",
            AuditKind::RegenerateMeal => "regenerate_meal",
            AuditKind::SwapItem => "swap_item",
            AuditKind::AddExtra => "add_extra",
            AuditKind::ConfirmItem => "confirm_item",
            AuditKind::SetTraining => "set_training",
        }
    }
}

impl fmt::Display for AuditKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub at: DateTime<Utc>,
    pub kind: AuditKind,
    pub subject: String,
}

/// Append-only record of mutating plan operations.
#[derive(Default)]
pub struct AuditLog {
    events: Mutex<Vec<AuditEvent>>,
}

impl AuditLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, kind: AuditKind, subject: impl ToString) {
        let subject = subject.to_string();
        tracing::info!(event = %kind, subject = %subject, "plan event");
        lock(&self.events).push(AuditEvent {
            at: Utc::now(),
            kind,
            subject,
        });
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<AuditEvent> {
        lock(&self.events).clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.events).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
