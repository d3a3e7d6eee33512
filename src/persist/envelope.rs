use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The unit written to and read from storage.
///
/// `version` is absent for legacy records. When present it is compared by
/// strict equality against the configured target version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedEnvelope {
    /// Partialized state.
    #[serde(default)]
    pub state: Value,

    /// Schema version of `state`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
}

impl PersistedEnvelope {
    pub fn new(state: Value, version: u32) -> Self {
        Self {
            state,
            version: Some(version),
        }
    }
}
