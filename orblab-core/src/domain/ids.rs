//! Identifier newtypes for instruments and opening-range windows.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Instrument identifier, e.g. `MES`, `MNQ`, `M6E`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstrumentId(pub String);

impl InstrumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InstrumentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Opening-range window identifier, e.g. `ny_0930_15m`, `ln_0800_30m`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(pub String);

impl WindowId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WindowId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_serialize_transparently() {
        let id = InstrumentId::from("MES");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"MES\"");

        let w = WindowId::from("ny_0930_15m");
        assert_eq!(serde_json::to_string(&w).unwrap(), "\"ny_0930_15m\"");
    }

    #[test]
    fn ids_are_ordered() {
        assert!(InstrumentId::from("MES") < InstrumentId::from("MNQ"));
    }
}
