// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Deserializer, Serializer};

/// Cycle errors persist as a single `"<code>: <message>"` string.
pub mod failure_text {
    use super::*;
    use crate::CycleFailure;

    pub fn serialize<S>(value: &Option<CycleFailure>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(failure) => serializer.serialize_str(&failure.to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<CycleFailure>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw
            .filter(|text| !text.trim().is_empty())
            .map(|text| CycleFailure::parse(&text)))
    }
}

#[must_use]
pub fn is_zero_f64(value: &f64) -> bool {
    *value == 0.0
}

#[must_use]
pub fn is_zero_u64(value: &u64) -> bool {
    *value == 0
}
