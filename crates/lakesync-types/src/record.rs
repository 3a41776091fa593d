//! Record, key, and ordering-value types for the write pipeline.
//!
//! Source batches arrive in one of two shapes: structured rows (the shape
//! the transformer operates on) or generic records (written as-is). Both
//! are carried as JSON documents; the aliases exist so signatures say which
//! shape they expect.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Generic-record shape, written to the table after key extraction.
pub type Record = serde_json::Value;

/// Structured-row shape, the input and output of the transform step.
pub type Row = serde_json::Value;

/// Key uniquely identifying an entity in the target table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    /// Record key within the partition.
    pub key: String,
    /// Partition path; empty for unpartitioned tables.
    #[serde(default)]
    pub partition: String,
}

impl RecordKey {
    /// Create a key with an explicit partition path.
    #[must_use]
    pub fn new(key: impl Into<String>, partition: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            partition: partition.into(),
        }
    }

    /// Create a key for an unpartitioned table.
    #[must_use]
    pub fn unpartitioned(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            partition: String::new(),
        }
    }
}

impl std::fmt::Display for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.partition.is_empty() {
            f.write_str(&self.key)
        } else {
            write!(f, "{}/{}", self.partition, self.key)
        }
    }
}

/// Typed comparable value used to break ties between conflicting updates to
/// the same key. Larger wins.
///
/// Cross-type comparisons order by variant rank (`Null` smallest, then
/// numbers, then text); numeric variants compare by value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderingValue {
    /// Ordering field absent from the record. Compares below everything.
    Null,
    /// 64-bit signed integer ordering value.
    Int { value: i64 },
    /// Floating-point ordering value.
    Float { value: f64 },
    /// Textual ordering value, compared lexicographically.
    Text { value: String },
}

impl OrderingValue {
    /// Extract an ordering value from a JSON field value.
    #[must_use]
    pub fn from_json(value: Option<&serde_json::Value>) -> Self {
        match value {
            Some(serde_json::Value::Number(n)) => {
                if let Some(i) = n.as_i64() {
                    Self::Int { value: i }
                } else {
                    Self::Float {
                        value: n.as_f64().unwrap_or(f64::NEG_INFINITY),
                    }
                }
            }
            Some(serde_json::Value::String(s)) => Self::Text { value: s.clone() },
            Some(serde_json::Value::Bool(b)) => Self::Int { value: i64::from(*b) },
            _ => Self::Null,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Int { .. } | Self::Float { .. } => 1,
            Self::Text { .. } => 2,
        }
    }

    fn as_f64(&self) -> f64 {
        match self {
            Self::Int { value } => *value as f64,
            Self::Float { value } => *value,
            Self::Null | Self::Text { .. } => f64::NEG_INFINITY,
        }
    }
}

impl PartialOrd for OrderingValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp_total(other))
    }
}

impl OrderingValue {
    /// Total-order comparison. NaN floats compare as equal to each other and
    /// below every finite value.
    #[must_use]
    pub fn cmp_total(&self, other: &Self) -> Ordering {
        match self.rank().cmp(&other.rank()) {
            Ordering::Equal => match (self, other) {
                (Self::Int { value: a }, Self::Int { value: b }) => a.cmp(b),
                (Self::Text { value: a }, Self::Text { value: b }) => a.cmp(b),
                (Self::Null, Self::Null) => Ordering::Equal,
                _ => self
                    .as_f64()
                    .partial_cmp(&other.as_f64())
                    .unwrap_or(Ordering::Equal),
            },
            ord => ord,
        }
    }
}

/// A record ready for the physical write: extracted key, ordering value,
/// and payload. Ephemeral, one per input record per round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreparedRecord {
    pub key: RecordKey,
    pub ordering: OrderingValue,
    pub payload: Record,
}
