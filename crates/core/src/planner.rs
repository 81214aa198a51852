//! Cleanup decisions and byte targets
//!
//! Cleanup is triggered above the threshold (a fraction of the quota) and
//! always frees down to that threshold. Freeing only down to the hard quota
//! would leave the repository one save away from the next cleanup.

use crate::config::EvictionConfig;
use crate::inventory::InventoryStats;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why cleanup is (or is not) required
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NeedsCleanup {
    /// Usage is at or below the threshold
    None,
    /// Current usage is above the hard quota
    ExceedsMax,
    /// Current usage is above the threshold
    ExceedsThreshold,
    /// Usage after the pending save would be above the hard quota
    ProjectedExceedsMax,
    /// Usage after the pending save would be above the threshold
    ProjectedExceedsThreshold,
}

impl NeedsCleanup {
    /// Whether any cleanup is required
    #[must_use]
    pub const fn is_required(self) -> bool {
        !matches!(self, Self::None)
    }

    /// Stable label used in logs and outputs
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::ExceedsMax => "exceeds-max",
            Self::ExceedsThreshold => "exceeds-threshold",
            Self::ProjectedExceedsMax => "projected-exceeds-max",
            Self::ProjectedExceedsThreshold => "projected-exceeds-threshold",
        }
    }
}

impl fmt::Display for NeedsCleanup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Threshold in bytes for a quota and ratio
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn threshold_bytes(max_bytes: u64, ratio: f64) -> u64 {
    (max_bytes as f64 * ratio.clamp(0.0, 1.0)).floor() as u64
}

/// Decide whether cleanup is needed.
///
/// `projected_bytes` is the size of an entry about to be saved; only the
/// pre-save path supplies it. Current usage is checked first, so a repository
/// already over the quota reports [`NeedsCleanup::ExceedsMax`] regardless of
/// the projection.
#[must_use]
pub fn decide(
    total_bytes: u64,
    max_bytes: u64,
    threshold_ratio: f64,
    projected_bytes: Option<u64>,
) -> NeedsCleanup {
    let threshold = threshold_bytes(max_bytes, threshold_ratio);

    if total_bytes > max_bytes {
        return NeedsCleanup::ExceedsMax;
    }
    if total_bytes > threshold {
        return NeedsCleanup::ExceedsThreshold;
    }

    match projected_bytes.map(|p| total_bytes.saturating_add(p)) {
        Some(projected) if projected > max_bytes => NeedsCleanup::ProjectedExceedsMax,
        Some(projected) if projected > threshold => NeedsCleanup::ProjectedExceedsThreshold,
        _ => NeedsCleanup::None,
    }
}

/// Minimum bytes to free to get `reference_bytes` back to the threshold
#[must_use]
pub const fn compute_target(reference_bytes: u64, threshold_bytes: u64) -> u64 {
    reference_bytes.saturating_sub(threshold_bytes)
}

/// A cleanup decision with its byte target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvictionPlan {
    /// Why cleanup runs
    pub reason: NeedsCleanup,
    /// Usage the target is computed from (current plus projected)
    pub reference_bytes: u64,
    /// Threshold usage must return under
    pub threshold_bytes: u64,
    /// Bytes that must be freed
    pub target_bytes: u64,
    /// Key protected from eviction
    pub exclude_key: Option<String>,
}

impl EvictionPlan {
    /// Plan cleanup for an observed inventory.
    ///
    /// Returns `None` when usage (including any projection) is within the
    /// threshold.
    #[must_use]
    pub fn build(
        stats: InventoryStats,
        config: &EvictionConfig,
        exclude_key: Option<&str>,
        projected_bytes: Option<u64>,
    ) -> Option<Self> {
        let max_bytes = config.max_bytes();
        let reason = decide(
            stats.total_bytes,
            max_bytes,
            config.threshold_ratio,
            projected_bytes,
        );
        if !reason.is_required() {
            return None;
        }

        let threshold = threshold_bytes(max_bytes, config.threshold_ratio);
        let reference_bytes = stats
            .total_bytes
            .saturating_add(projected_bytes.unwrap_or(0));

        Some(Self {
            reason,
            reference_bytes,
            threshold_bytes: threshold,
            target_bytes: compute_target(reference_bytes, threshold),
            exclude_key: exclude_key.filter(|k| !k.is_empty()).map(str::to_string),
        })
    }
}


#[cfg(test)]
mod proptest_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: target is total minus threshold, floored at zero
        #[test]
        fn target_is_saturating_difference(total in any::<u64>(), threshold in any::<u64>()) {
            let target = compute_target(total, threshold);
            if total > threshold {
                prop_assert_eq!(target, total - threshold);
            } else {
                prop_assert_eq!(target, 0);
            }
        }

        /// Property: cleanup is required exactly when usage passes the threshold
        #[test]
        fn decision_matches_threshold(
            total in 0u64..(1 << 40),
            projected in prop::option::of(0u64..(1 << 36)),
            max in 1u64..(1 << 40),
        ) {
            let threshold = threshold_bytes(max, 0.8);
            let reference = total + projected.unwrap_or(0);
            let reason = decide(total, max, 0.8, projected);
            prop_assert_eq!(reason.is_required(), reference > threshold);
        }
    }
}
