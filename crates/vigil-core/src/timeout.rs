// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

/// Deadline applied to calls that carry no payload, and the lower bound for
/// every other call.
pub const DEFAULT_DEADLINE_FLOOR: Duration = Duration::from_secs(60);

/// Pessimistic effective throughput used to scale transfer deadlines: 1 Mbps.
pub const DEFAULT_SECONDS_PER_BYTE: f64 = 0.000_008;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeoutPolicy {
    pub floor: Duration,
    pub seconds_per_byte: f64,
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        Self {
            floor: DEFAULT_DEADLINE_FLOOR,
            seconds_per_byte: DEFAULT_SECONDS_PER_BYTE,
        }
    }
}

impl TimeoutPolicy {
    /// Deadline for a call moving `size_bytes` (or a metadata call when
    /// `None`). Never below `floor`, non-decreasing in size.
    #[must_use]
    pub fn deadline(&self, size_bytes: Option<u64>) -> Duration {
        let Some(size) = size_bytes else {
            return self.floor;
        };
        let scaled_secs = (size as f64 * self.seconds_per_byte).floor();
        let scaled = if scaled_secs.is_finite() && scaled_secs > 0.0 {
            Duration::from_secs(scaled_secs.min(u64::MAX as f64) as u64)
        } else {
            Duration::ZERO
        };
        scaled.max(self.floor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_calls_get_the_floor() {
        assert_eq!(TimeoutPolicy::default().deadline(None), Duration::from_secs(60));
        assert_eq!(
            TimeoutPolicy::default().deadline(Some(1 << 20)),
            Duration::from_secs(60)
        );
    }

    #[test]
    fn large_transfers_scale_with_size() {
        let policy = TimeoutPolicy::default();
        // 800 MiB at 1 Mbps
        assert_eq!(policy.deadline(Some(838_860_800)), Duration::from_secs(6710));
    }
}
