use serde::{Deserialize, Serialize};

/// Engine options. Deserializable so embedders can keep them in their own
/// configuration files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Options {
    /// Bucket on `identity + feature name` instead of the identity alone, so
    /// one user does not land in the same slot for every feature.
    ///
    /// Toggling this on a live system reshuffles who is inside each
    /// percentage rollout.
    #[serde(default)]
    pub randomize_percentage: bool,

    /// Migrate features from the legacy key layout the first time they are
    /// read and have no record in the current format.
    #[serde(default)]
    pub migrate: bool,
}
