// crates/schema-registry-client/src/backoff.rs
// ============================================================================
// Module: Retry Backoff
// Description: Retriable status classification and jittered exponential backoff.
// Purpose: Shared retry timing for token fetches and registry callers.
// Dependencies: rand
// ============================================================================

//! ## Overview
//! [`backoff`] computes `min(base * 2^attempt, max)` with saturating arithmetic
//! and applies full jitter drawn from an injectable [`JitterSource`].
//! Invariants:
//! - The returned delay never exceeds `max_ms`.
//! - Large attempt numbers clamp to `max_ms` instead of overflowing.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use rand::Rng;

// ============================================================================
// SECTION: Status Classification
// ============================================================================

/// HTTP statuses that are worth retrying.
pub const RETRIABLE_STATUSES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// Returns true when an HTTP status is retriable.
///
/// Status `0` is not retriable here; callers that use `0` to mean "transport
/// failure" handle that case on their own branch.
#[must_use]
pub const fn is_retriable(status: u16) -> bool {
    matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
}

// ============================================================================
// SECTION: Jitter
// ============================================================================

/// Source of uniformly distributed samples in `[0, 1)`.
pub trait JitterSource: Send + Sync {
    /// Returns the next sample in `[0, 1)`.
    fn next_unit_f64(&self) -> f64;
}

/// Jitter drawn from the thread-local RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRngJitter;

impl JitterSource for ThreadRngJitter {
    fn next_unit_f64(&self) -> f64 {
        rand::thread_rng().r#gen::<f64>()
    }
}

/// Jitter that always returns the same factor, clamped into `[0, 1)`.
#[derive(Debug, Clone, Copy)]
pub struct FixedJitter(pub f64);

impl JitterSource for FixedJitter {
    fn next_unit_f64(&self) -> f64 {
        if self.0.is_nan() {
            return 0.0;
        }
        self.0.clamp(0.0, 1.0 - f64::EPSILON)
    }
}

// ============================================================================
// SECTION: Backoff
// ============================================================================

/// Computes the un-jittered delay ceiling for an attempt.
#[must_use]
pub fn backoff_ceiling_ms(base_ms: u64, attempt: u32, max_ms: u64) -> u64 {
    let Some(factor) = 1_u64.checked_shl(attempt).filter(|_| attempt < u64::BITS) else {
        return max_ms;
    };
    base_ms.checked_mul(factor).map_or(max_ms, |delay| delay.min(max_ms))
}

/// Computes a jittered exponential backoff delay.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "Jitter is in [0, 1) so the product stays within [0, ceiling]."
)]
pub fn backoff(base_ms: u64, attempt: u32, max_ms: u64, jitter: &dyn JitterSource) -> Duration {
    let ceiling = backoff_ceiling_ms(base_ms, attempt, max_ms);
    let factor = jitter.next_unit_f64().clamp(0.0, 1.0);
    let jittered = (ceiling as f64 * factor).floor() as u64;
    Duration::from_millis(jittered.min(ceiling))
}
