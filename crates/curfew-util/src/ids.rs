//! Strongly-typed identifiers for curfew

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifies one Online period: a fresh workload instance from Starting
/// until the end of its ShuttingDown sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_id_uniqueness() {
        let r1 = RunId::new();
        let r2 = RunId::new();
        assert_ne!(r1, r2);
    }

    #[test]
    fn run_id_serialize_deserialize() {
        let run_id = RunId::new();
        let json = serde_json::to_string(&run_id).unwrap();
        let parsed: RunId = serde_json::from_str(&json).unwrap();
        assert_eq!(run_id, parsed);
    }
}
