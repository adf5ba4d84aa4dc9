//! Numeric budget guard.

use crate::error::TraceError;

/// A consumable numeric allowance: `0 <= used <= limit` always holds.
#[derive(Debug, Clone, PartialEq)]
pub struct Budget {
    limit: f64,
    used: f64,
    label: Option<String>,
}

impl Budget {
    pub fn new(limit: f64, used: f64, label: Option<String>) -> Result<Self, TraceError> {
        if limit.is_nan() || limit < 0.0 {
            return Err(TraceError::InvalidBudget("limit must be >= 0"));
        }
        if used.is_nan() || used < 0.0 {
            return Err(TraceError::InvalidBudget("used must be >= 0"));
        }
        if used > limit {
            return Err(TraceError::InvalidBudget("used must be <= limit"));
        }
        Ok(Self { limit, used, label })
    }

    /// A fresh budget with nothing consumed.
    pub fn with_limit(limit: f64) -> Result<Self, TraceError> {
        Self::new(limit, 0.0, None)
    }

    pub fn limit(&self) -> f64 {
        self.limit
    }

    pub fn used(&self) -> f64 {
        self.used
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn remaining(&self) -> f64 {
        self.limit - self.used
    }

    /// Consume `amount` if it fits. Returns `false` and leaves the budget
    /// untouched when it would exceed the limit.
    pub fn consume(&mut self, amount: f64) -> Result<bool, TraceError> {
        if amount.is_nan() || amount < 0.0 {
            return Err(TraceError::InvalidBudget("amount must be >= 0"));
        }
        if self.used + amount > self.limit {
            return Ok(false);
        }
        self.used += amount;
        Ok(true)
    }
}
