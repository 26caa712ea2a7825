use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Stable identifier assigned to a medication when it is created.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MedicationId(String);

/// Identifier of a history entry. Generated ids are time-ordered (UUIDv7).
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HistoryId(String);

macro_rules! impl_id_type {
    ($t:ty, $gen:expr) => {
        impl $t {
            pub fn new() -> Self {
                Self($gen.to_string())
            }

            pub fn from_str(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $t {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl Default for $t {
            fn default() -> Self {
                Self::new()
            }
        }
    };
}

impl_id_type!(MedicationId, Uuid::new_v4());
impl_id_type!(HistoryId, Uuid::now_v7());
