use async_trait::async_trait;

/// Asks the operator to approve a destructive action
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait Confirmer: Send + Sync {
    /// Returns true when the operator approves
    async fn confirm(&self, prompt: &str) -> bool;
}

/// Confirmer that answers every prompt the same way
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoConfirm {
    answer: bool,
}

impl AutoConfirm {
    pub fn yes() -> Self {
        Self { answer: true }
    }

    pub fn no() -> Self {
        Self { answer: false }
    }
}

#[async_trait]
impl Confirmer for AutoConfirm {
    async fn confirm(&self, _prompt: &str) -> bool {
        self.answer
    }
}

/// Outcome of a confirmation-gated delete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    Declined,
}
