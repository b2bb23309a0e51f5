//! Feature rollouts stored in a key-value store.
//!
//! A feature is on for a user when any of its rules match: a global
//! percentage, an explicit user list, named groups, or per-locale
//! percentages. Percentages bucket users with CRC-32 so a user keeps the same
//! answer across processes and as a rollout grows.
//!
//! # Examples
//! ```
//! use rollout_lib::{MemoryStore, Rollout};
//!
//! let mut rollout: Rollout<MemoryStore> = Rollout::new(MemoryStore::new());
//! rollout.define_group("staff", |user: &str| user.ends_with("@corp.example"));
//!
//! rollout.activate_group("new_checkout", "staff")?;
//! rollout.activate_user("new_checkout", "alice")?;
//!
//! assert!(rollout.is_active("new_checkout", Some("ann@corp.example"))?);
//! assert!(rollout.is_active("new_checkout", Some("alice"))?);
//! assert!(!rollout.is_active("new_checkout", None)?);
//! # Ok::<(), rollout_lib::Error>(())
//! ```

pub mod bucket;
pub mod builder;
pub mod codec;
pub mod engine;
pub mod error;
pub mod feature;
pub mod legacy;
pub mod options;
pub mod predicate;
pub mod store;
pub mod user;

pub use builder::RolloutBuilder;
pub use engine::{Rollout, FEATURES_KEY};
pub use error::{Error, Result};
pub use feature::Feature;
pub use legacy::{Legacy, LegacyInfo, StoreLegacy};
pub use options::Options;
pub use predicate::{Predicate, Predicates};
pub use store::{AtomicStore, MemoryStore, Store};
pub use user::{IdResolver, Identify};
