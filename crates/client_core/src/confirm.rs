use async_trait::async_trait;

/// Asks the user before a destructive operation. Never fails; `false` means
/// the operation must not be sent.
#[async_trait]
pub trait ConfirmGate: Send + Sync {
    async fn confirm(&self, title: &str, message: &str) -> bool;
}

/// Answers every prompt the same way; used by non-interactive callers.
#[derive(Debug, Clone, Copy)]
pub struct AutoConfirm(pub bool);

#[async_trait]
impl ConfirmGate for AutoConfirm {
    async fn confirm(&self, _title: &str, _message: &str) -> bool {
        self.0
    }
}
