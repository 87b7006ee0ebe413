//! Readiness store
//!
//! Local readiness predicates of this node. Flags only ever go from false
//! to true while the process runs; `clear` is reserved for explicit
//! teardown. Unknown flags read as false.

use std::collections::BTreeSet;
use std::convert::Infallible;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A named local precondition.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ReadinessFlag {
    /// The node's service finished installing.
    ServiceInstalled,
    /// Configuration from the counterpart peer has been observed.
    PeerConfigAcquired,
    /// Local service configuration has been rendered.
    ConfigRendered,
    /// Any other predicate, by name.
    Named(String),
}

impl ReadinessFlag {
    pub fn as_str(&self) -> &str {
        match self {
            Self::ServiceInstalled => "serviceInstalled",
            Self::PeerConfigAcquired => "peerConfigAcquired",
            Self::ConfigRendered => "configRendered",
            Self::Named(name) => name,
        }
    }
}

impl From<&str> for ReadinessFlag {
    fn from(name: &str) -> Self {
        match name {
            "serviceInstalled" => Self::ServiceInstalled,
            "peerConfigAcquired" => Self::PeerConfigAcquired,
            "configRendered" => Self::ConfigRendered,
            other => Self::Named(other.to_string()),
        }
    }
}

impl From<String> for ReadinessFlag {
    fn from(name: String) -> Self {
        Self::from(name.as_str())
    }
}

impl From<ReadinessFlag> for String {
    fn from(flag: ReadinessFlag) -> Self {
        flag.as_str().to_string()
    }
}

impl std::str::FromStr for ReadinessFlag {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

impl fmt::Display for ReadinessFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of flags that are currently true.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReadinessStore {
    ready: BTreeSet<ReadinessFlag>,
}

impl ReadinessStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `flag` true. Returns `true` only on a false → true transition.
    pub fn set_ready(&mut self, flag: ReadinessFlag) -> bool {
        self.ready.insert(flag)
    }

    pub fn is_ready(&self, flag: &ReadinessFlag) -> bool {
        self.ready.contains(flag)
    }

    /// Flags from `required` that are still false, in the given order.
    pub fn missing<'a>(&self, required: &'a [ReadinessFlag]) -> Vec<&'a ReadinessFlag> {
        required.iter().filter(|flag| !self.is_ready(flag)).collect()
    }

    pub fn all_ready(&self, required: &[ReadinessFlag]) -> bool {
        required.iter().all(|flag| self.is_ready(flag))
    }

    /// Reset every flag. Only explicit node teardown calls this.
    pub fn clear(&mut self) {
        self.ready.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReadinessFlag> {
        self.ready.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_flag_defaults_false() {
        let store = ReadinessStore::new();
        assert!(!store.is_ready(&ReadinessFlag::Named("anything".into())));
        assert!(!store.is_ready(&ReadinessFlag::ServiceInstalled));
    }

    #[test]
    fn test_set_ready_reports_transition_once() {
        let mut store = ReadinessStore::new();
        assert!(store.set_ready(ReadinessFlag::ServiceInstalled));
        assert!(!store.set_ready(ReadinessFlag::ServiceInstalled));
        assert!(store.is_ready(&ReadinessFlag::ServiceInstalled));
    }

    #[test]
    fn test_missing_preserves_order() {
        let mut store = ReadinessStore::new();
        store.set_ready(ReadinessFlag::ConfigRendered);
        let required = [
            ReadinessFlag::ServiceInstalled,
            ReadinessFlag::ConfigRendered,
            ReadinessFlag::PeerConfigAcquired,
        ];
        let missing = store.missing(&required);
        assert_eq!(
            missing,
            vec![&ReadinessFlag::ServiceInstalled, &ReadinessFlag::PeerConfigAcquired]
        );
        assert!(!store.all_ready(&required));
        assert!(store.all_ready(&[]));
    }

    #[test]
    fn test_clear_resets() {
        let mut store = ReadinessStore::new();
        store.set_ready(ReadinessFlag::ServiceInstalled);
        store.clear();
        assert!(!store.is_ready(&ReadinessFlag::ServiceInstalled));
        assert!(store.set_ready(ReadinessFlag::ServiceInstalled));
    }

    #[test]
    fn test_flag_names_round_trip() {
        for name in ["serviceInstalled", "peerConfigAcquired", "configRendered", "munged"] {
            let flag = ReadinessFlag::from(name);
            assert_eq!(flag.as_str(), name);
        }
        assert_eq!(ReadinessFlag::from("munged"), ReadinessFlag::Named("munged".into()));
        let json = serde_json::to_string(&ReadinessFlag::PeerConfigAcquired).unwrap();
        assert_eq!(json, "\"peerConfigAcquired\"");
    }
}
