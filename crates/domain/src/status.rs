//! Shared state-machine behavior.
//!
//! Every lifecycle enum in the domain (order, order item fulfillment,
//! payment) declares its legal moves as a static table. The trait derives
//! legality checks, terminal detection, and parsing from that table.

use crate::error::{DomainError, Result};

/// A status enum backed by an explicit transition table.
pub trait Status: Copy + Eq + std::fmt::Debug + 'static {
    /// Human-readable machine name used in errors and logs.
    const KIND: &'static str;

    /// Every variant, in declaration order.
    const ALL: &'static [Self];

    /// Canonical upper-snake name (the stored and serialized form).
    fn as_str(&self) -> &'static str;

    /// Statuses reachable from `self` in one step.
    fn transitions(&self) -> &'static [Self];

    fn can_transition_to(&self, next: Self) -> bool {
        self.transitions().contains(&next)
    }

    /// Returns true if nothing is reachable from this status.
    fn is_terminal(&self) -> bool {
        self.transitions().is_empty()
    }

    /// Fails with [`DomainError::IllegalTransition`] unless `next` is in the table.
    fn ensure_transition(&self, next: Self) -> Result<()> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(DomainError::IllegalTransition {
                kind: Self::KIND,
                from: self.as_str(),
                to: next.as_str(),
            })
        }
    }

    /// Parses a status name, ignoring case and surrounding whitespace.
    fn parse(value: &str) -> Result<Self> {
        let wanted = value.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|status| status.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| DomainError::UnknownStatus {
                kind: Self::KIND,
                value: value.to_string(),
            })
    }
}

/// Implements `Display` and `FromStr` in terms of [`Status`].
macro_rules! status_text {
    ($name:ty) => {
        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str($crate::status::Status::as_str(self))
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::error::DomainError;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                <$name as $crate::status::Status>::parse(s)
            }
        }
    };
}

pub(crate) use status_text;
