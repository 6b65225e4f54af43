//! Workflow configuration loaded from environment variables.

use domain::Status;

use crate::error::{FulfillmentError, Result};

/// How admin-driven status moves are checked against the transition tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransitionPolicy {
    /// Any known status is accepted; moves outside the table are logged.
    #[default]
    Unchecked,
    /// Moves outside the table fail with an invalid-state error.
    Enforced,
}

impl TransitionPolicy {
    /// Parses `unchecked` or `enforced`, ignoring case.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "unchecked" => Some(TransitionPolicy::Unchecked),
            "enforced" => Some(TransitionPolicy::Enforced),
            _ => None,
        }
    }

    /// Decides whether an admin may move `from` to `to`.
    pub fn admit<S: Status>(&self, from: S, to: S) -> Result<()> {
        if from.can_transition_to(to) {
            return Ok(());
        }
        match self {
            TransitionPolicy::Enforced => Err(FulfillmentError::InvalidState(format!(
                "Illegal {} transition: {} -> {}",
                S::KIND,
                from.as_str(),
                to.as_str()
            ))),
            TransitionPolicy::Unchecked => {
                tracing::warn!(
                    kind = S::KIND,
                    from = from.as_str(),
                    to = to.as_str(),
                    "status move outside the transition table"
                );
                Ok(())
            }
        }
    }
}

/// Workflow settings.
///
/// Reads from environment variables:
/// - `PAYMENT_CURRENCY`: currency recorded on new payments (default: `"INR"`)
/// - `ADMIN_TRANSITIONS`: `unchecked` or `enforced` (default: `unchecked`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FulfillmentConfig {
    pub currency: String,
    pub admin_transitions: TransitionPolicy,
}

impl FulfillmentConfig {
    pub const DEFAULT_CURRENCY: &'static str = "INR";

    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let admin_transitions = match std::env::var("ADMIN_TRANSITIONS") {
            Ok(raw) => TransitionPolicy::parse(&raw).unwrap_or_else(|| {
                tracing::warn!(value = %raw, "unknown ADMIN_TRANSITIONS, using unchecked");
                TransitionPolicy::default()
            }),
            Err(_) => TransitionPolicy::default(),
        };
        Self {
            currency: std::env::var("PAYMENT_CURRENCY")
                .ok()
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| Self::DEFAULT_CURRENCY.to_string()),
            admin_transitions,
        }
    }

    pub fn with_policy(mut self, policy: TransitionPolicy) -> Self {
        self.admin_transitions = policy;
        self
    }
}

impl Default for FulfillmentConfig {
    fn default() -> Self {
        Self {
            currency: Self::DEFAULT_CURRENCY.to_string(),
            admin_transitions: TransitionPolicy::default(),
        }
    }
}
