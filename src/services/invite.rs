// src/services/invite.rs

/// Outcome of an invite check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InviteDecision {
    Allowed,
    Denied,
    /// No secret configured. Registration stays closed.
    NotConfigured,
}

/// Gates registration behind the single process-wide invite secret.
#[derive(Debug, Clone)]
pub struct InviteGate {
    secret: Option<String>,
}

impl InviteGate {
    pub fn new(secret: Option<String>) -> Self {
        Self { secret }
    }

    /// Exact, case-sensitive match. Fails closed without a configured secret.
    pub fn check(&self, supplied: &str) -> InviteDecision {
        match &self.secret {
            None => InviteDecision::NotConfigured,
            Some(secret) if secret.as_str() == supplied => InviteDecision::Allowed,
            Some(_) => InviteDecision::Denied,
        }
    }
}
