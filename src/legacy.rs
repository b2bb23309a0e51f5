//! Read side of the legacy storage layout, used to migrate features the
//! first time they are requested.

use std::collections::HashSet;

use crate::codec;
use crate::error::Result;
use crate::store::Store;

/// Key of the comma list of globally enabled features in the legacy layout.
pub const GLOBAL_KEY: &str = "feature:__global__";

/// Feature state as the legacy layout describes it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LegacyInfo {
    pub percentage: i64,
    /// Names of features switched on for everyone.
    pub global: HashSet<String>,
    pub groups: Vec<String>,
    pub users: Vec<String>,
}

/// Source of legacy feature state.
pub trait Legacy: Send + Sync {
    fn info(&self, name: &str) -> Result<LegacyInfo>;
}

impl<F> Legacy for F
where
    F: Fn(&str) -> Result<LegacyInfo> + Send + Sync,
{
    fn info(&self, name: &str) -> Result<LegacyInfo> {
        self(name)
    }
}

/// Legacy adapter reading the old per-attribute keys from a [`Store`]:
///
/// - `feature:<name>:percentage` integer text
/// - `feature:<name>:groups` comma list
/// - `feature:<name>:users` comma list
/// - `feature:__global__` comma list of feature names
#[derive(Debug)]
pub struct StoreLegacy<S> {
    storage: S,
}

impl<S: Store> StoreLegacy<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }
}

impl<S: Store> Legacy for StoreLegacy<S> {
    fn info(&self, name: &str) -> Result<LegacyInfo> {
        read_info(&self.storage, name)
    }
}

fn read_list<S: Store + ?Sized>(storage: &S, key: &str) -> Result<Vec<String>> {
    Ok(storage
        .get(key)?
        .map(|raw| {
            codec::split(&raw, codec::LIST_SEPARATOR)
                .into_iter()
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default())
}

/// Reads the legacy layout for `name` out of `storage`.
pub fn read_info<S: Store + ?Sized>(storage: &S, name: &str) -> Result<LegacyInfo> {
    let percentage = storage
        .get(&format!("feature:{}:percentage", name))?
        .map(|raw| codec::parse_integer(&raw))
        .unwrap_or(0);

    Ok(LegacyInfo {
        percentage,
        global: read_list(storage, GLOBAL_KEY)?.into_iter().collect(),
        groups: read_list(storage, &format!("feature:{}:groups", name))?,
        users: read_list(storage, &format!("feature:{}:users", name))?,
    })
}
