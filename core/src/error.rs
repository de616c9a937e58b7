use thiserror::Error;

use crate::models::{MealSlot, Role};

/// Failures surfaced by planner operations.
///
/// None of these are retried internally; the caller of the triggering
/// operation decides what to do with them.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("no candidate food with role {role} (slot {slot})")]
    NoCandidate { role: Role, slot: MealSlot },

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl PlanError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}

pub type Result<T, E = PlanError> = std::result::Result<T, E>;
