// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

/// One object in the dataset namespace as reported by the store's listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectEntry {
    #[serde(alias = "name")]
    pub key: String,
    pub size: u64,
}

impl ObjectEntry {
    #[must_use]
    pub fn new(key: impl Into<String>, size: u64) -> Self {
        Self {
            key: key.into(),
            size,
        }
    }
}

#[must_use]
pub fn total_size(entries: &[ObjectEntry]) -> u64 {
    entries.iter().map(|e| e.size).sum()
}

/// Erasure-coding parameters of the store's upload settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedundancySettings {
    pub min_shards: u32,
    pub total_shards: u32,
}

impl Default for RedundancySettings {
    fn default() -> Self {
        Self {
            min_shards: 1,
            total_shards: 1,
        }
    }
}

impl RedundancySettings {
    /// Physical bytes per logical byte. Degenerate settings collapse to 1.
    #[must_use]
    pub fn factor(&self) -> f64 {
        if self.min_shards == 0 || self.total_shards < self.min_shards {
            return 1.0;
        }
        f64::from(self.total_shards) / f64::from(self.min_shards)
    }

    #[must_use]
    pub fn physical_bytes(&self, logical: u64) -> u64 {
        (logical as f64 * self.factor()) as u64
    }
}

/// A storage contract holding space that was logically freed but not yet
/// reclaimed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrunableContract {
    pub id: String,
    pub prunable: u64,
    #[serde(default)]
    pub size: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReclaimOutcome {
    #[serde(rename = "pruned")]
    pub reclaimed: u64,
    pub remaining: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redundancy_factor_is_total_over_min() {
        let rs = RedundancySettings {
            min_shards: 10,
            total_shards: 30,
        };
        assert_eq!(rs.factor(), 3.0);
        assert_eq!(rs.physical_bytes(1000), 3000);
    }

    #[test]
    fn degenerate_redundancy_is_one() {
        for (min_shards, total_shards) in [(0, 30), (10, 5)] {
            let rs = RedundancySettings {
                min_shards,
                total_shards,
            };
            assert_eq!(rs.factor(), 1.0);
        }
    }

    #[test]
    fn entry_accepts_name_alias() {
        let entry: ObjectEntry =
            serde_json::from_str(r#"{"name":"data/ab.data","size":7}"#).expect("decode");
        assert_eq!(entry, ObjectEntry::new("data/ab.data", 7));
    }
}
