use crate::engine::{Migration, Rollout};
use crate::legacy::{Legacy, StoreLegacy};
use crate::options::Options;
use crate::predicate::Predicates;
use crate::store::Store;
use crate::user::{IdResolver, Identify};

/// Chained configuration for a [`Rollout`].
///
/// # Examples
/// ```
/// use rollout_lib::{MemoryStore, Rollout};
///
/// let rollout: Rollout<MemoryStore> = Rollout::builder(MemoryStore::new())
///     .randomize_percentage(true)
///     .build();
/// assert!(rollout.options().randomize_percentage);
/// ```
pub struct RolloutBuilder<S, U: ?Sized = str> {
    storage: S,
    options: Options,
    identify: IdResolver<U>,
    legacy: Option<Box<dyn Legacy>>,
}

pub fn create_builder<S, U>(storage: S) -> RolloutBuilder<S, U>
where
    S: Store,
    U: Identify + ?Sized + 'static,
{
    create_builder_with(storage, IdResolver::default())
}

pub fn create_builder_with<S, U>(storage: S, identify: IdResolver<U>) -> RolloutBuilder<S, U>
where
    S: Store,
    U: ?Sized + 'static,
{
    RolloutBuilder {
        storage,
        options: Options::default(),
        identify,
        legacy: None,
    }
}

impl<S: Store, U: ?Sized + 'static> RolloutBuilder<S, U> {
    pub fn options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    pub fn randomize_percentage(mut self, randomize: bool) -> Self {
        self.options.randomize_percentage = randomize;
        self
    }

    /// Enables read-triggered migration. Without an explicit adapter the
    /// legacy keys are read from the main store.
    pub fn migrate(mut self, migrate: bool) -> Self {
        self.options.migrate = migrate;
        self
    }

    /// Accessor resolving a user value to its identity.
    pub fn id_user_by(mut self, f: impl Fn(&U) -> String + Send + Sync + 'static) -> Self {
        self.identify = IdResolver::new(f);
        self
    }

    /// Legacy adapter consulted when migration is enabled.
    pub fn legacy(mut self, legacy: impl Legacy + 'static) -> Self {
        self.legacy = Some(Box::new(legacy));
        self
    }

    /// Reads legacy keys from a separate store instead of the main one.
    pub fn legacy_storage(self, storage: impl Store + 'static) -> Self {
        self.legacy(StoreLegacy::new(storage))
    }

    pub fn build(self) -> Rollout<S, U> {
        let migration = match (self.options.migrate, self.legacy) {
            (false, _) => Migration::Disabled,
            (true, None) => Migration::SameStore,
            (true, Some(legacy)) => Migration::Adapter(legacy),
        };
        Rollout {
            storage: self.storage,
            options: self.options,
            predicates: Predicates::new(),
            identify: self.identify,
            migration,
        }
    }
}
