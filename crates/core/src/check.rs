//! Rule check result

use serde::{Deserialize, Serialize};

/// Maximum risk contribution a check can report
pub const MAX_SCORE: u8 = 100;

/// Verdict of a single rule check
///
/// `score` is a risk contribution, not a probability:
/// 0 = no risk, 100 = maximal (hard-block) risk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub passed: bool,
    pub score: u8,
    pub reason: String,
}

impl CheckResult {
    /// A passing result with the given residual risk
    pub fn pass(score: u8, reason: impl Into<String>) -> Self {
        Self {
            passed: true,
            score: score.min(MAX_SCORE),
            reason: reason.into(),
        }
    }

    /// A failing result
    pub fn fail(score: u8, reason: impl Into<String>) -> Self {
        Self {
            passed: false,
            score: score.min(MAX_SCORE),
            reason: reason.into(),
        }
    }

    /// Whether this result forces rejection on its own
    pub fn is_hard_block(&self, hard_block_score: u8) -> bool {
        !self.passed && self.score >= hard_block_score
    }
}
