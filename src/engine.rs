use std::fmt;

use tracing::{debug, info};

use crate::builder::{self, RolloutBuilder};
use crate::codec;
use crate::error::{Error, Result};
use crate::feature::Feature;
use crate::legacy::{self, Legacy};
use crate::options::Options;
use crate::predicate::Predicates;
use crate::store::{AtomicStore, Store};
use crate::user::{IdResolver, Identify};

/// Key of the comma list holding every known feature name.
pub const FEATURES_KEY: &str = "feature:__features__";

/// Attempts made by [`Rollout::update_atomic`] before giving up.
pub const MAX_CAS_ATTEMPTS: u32 = 16;

pub fn key(name: &str) -> String {
    format!("feature:{}", name)
}

pub(crate) enum Migration {
    Disabled,
    SameStore,
    Adapter(Box<dyn Legacy>),
}

/// Feature rollout engine over a key-value [`Store`].
///
/// Feature names must be non-empty and free of `,`: the index of known
/// features is a comma list. A feature saved under an empty name is stored
/// but never listed by [`Rollout::features`].
///
/// Every mutation is a read-modify-write of the feature record followed by
/// a rewrite of the feature index. There is no locking across that cycle:
/// concurrent writers to one feature race and the last write wins. Backends
/// implementing [`AtomicStore`] can use [`Rollout::update_atomic`] instead.
pub struct Rollout<S, U: ?Sized = str> {
    pub(crate) storage: S,
    pub(crate) options: Options,
    pub(crate) predicates: Predicates<U>,
    pub(crate) identify: IdResolver<U>,
    pub(crate) migration: Migration,
}

impl<S, U> Rollout<S, U>
where
    S: Store,
    U: Identify + ?Sized + 'static,
{
    pub fn new(storage: S) -> Self {
        Self::builder(storage).build()
    }

    pub fn builder(storage: S) -> RolloutBuilder<S, U> {
        builder::create_builder(storage)
    }
}

impl<S, U> Rollout<S, U>
where
    S: Store,
    U: ?Sized + 'static,
{
    /// Builder for user types resolved through a custom accessor instead of
    /// [`Identify`].
    pub fn builder_with(
        storage: S,
        id_user_by: impl Fn(&U) -> String + Send + Sync + 'static,
    ) -> RolloutBuilder<S, U> {
        builder::create_builder_with(storage, IdResolver::new(id_user_by))
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn predicates(&self) -> &Predicates<U> {
        &self.predicates
    }

    pub fn user_id(&self, user: &U) -> String {
        self.identify.resolve(user)
    }

    pub fn activate(&self, name: &str) -> Result<()> {
        self.update(name, |f| f.set_percentage(100))
    }

    pub fn deactivate(&self, name: &str) -> Result<()> {
        self.update(name, Feature::clear)
    }

    pub fn set(&self, name: &str, active: bool) -> Result<()> {
        if active {
            self.activate(name)
        } else {
            self.deactivate(name)
        }
    }

    pub fn activate_group(&self, name: &str, group: &str) -> Result<()> {
        self.update(name, |f| f.add_group(group))
    }

    pub fn deactivate_group(&self, name: &str, group: &str) -> Result<()> {
        self.update(name, |f| f.remove_group(group))
    }

    pub fn activate_user(&self, name: &str, user: &U) -> Result<()> {
        let id = self.user_id(user);
        self.update(name, |f| f.add_user(&id))
    }

    pub fn deactivate_user(&self, name: &str, user: &U) -> Result<()> {
        let id = self.user_id(user);
        self.update(name, |f| f.remove_user(&id))
    }

    pub fn activate_locale(&self, name: &str, locale: &str, percentage: i64) -> Result<()> {
        self.update(name, |f| f.add_locale(locale, percentage))
    }

    pub fn deactivate_locale(&self, name: &str, locale: &str) -> Result<()> {
        self.update(name, |f| f.remove_locale(locale))
    }

    pub fn activate_percentage(&self, name: &str, percentage: i64) -> Result<()> {
        self.update(name, |f| f.set_percentage(percentage))
    }

    pub fn deactivate_percentage(&self, name: &str) -> Result<()> {
        self.update(name, |f| f.set_percentage(0))
    }

    pub fn define_group(&mut self, group: &str, predicate: impl Fn(&U) -> bool + Send + Sync + 'static) {
        self.predicates.define_group(group, predicate);
    }

    pub fn define_locale(&mut self, locale: &str, predicate: impl Fn(&U) -> bool + Send + Sync + 'static) {
        self.predicates.define_locale(locale, predicate);
    }

    pub fn active_in_group(&self, group: &str, user: &U) -> bool {
        self.predicates.active_in_group(group, user)
    }

    pub fn active_in_locale(&self, locale: &str, user: &U) -> bool {
        self.predicates.active_in_locale(locale, user)
    }

    /// Whether `name` is on for `user`. May persist a migrated record the
    /// first time a feature is read.
    pub fn is_active(&self, name: &str, user: Option<&U>) -> Result<bool> {
        Ok(self.get(name)?.is_active(self, user))
    }

    /// Current state of a feature.
    ///
    /// A missing record is migrated from the legacy layout (and saved) when
    /// migration is enabled, otherwise a cleared feature is returned without
    /// being saved.
    pub fn get(&self, name: &str) -> Result<Feature> {
        if let Some(raw) = self.storage.get(&key(name))? {
            return Ok(Feature::decode(name, &raw));
        }

        let info = match &self.migration {
            Migration::Disabled => return Ok(Feature::new(name)),
            Migration::SameStore => legacy::read_info(&self.storage, name)?,
            Migration::Adapter(adapter) => adapter.info(name)?,
        };

        let feature = Feature::from_legacy(name, info);
        info!(feature = name, percentage = feature.percentage(), "migrated legacy feature");
        self.save(&feature)?;
        Ok(feature)
    }

    /// State of a feature as JSON: `percentage`, `users`, `groups` and
    /// `locales`.
    pub fn info(&self, name: &str) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self.get(name)?)?)
    }

    /// Every feature name ever saved, in first-saved order.
    pub fn features(&self) -> Result<Vec<String>> {
        Ok(self
            .storage
            .get(FEATURES_KEY)?
            .map(|raw| {
                codec::decode_index(&raw)
                    .into_iter()
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Clears and deletes every known feature, then the index itself.
    pub fn clear(&self) -> Result<()> {
        for name in self.features()? {
            self.deactivate(&name)?;
            self.storage.del(&key(&name))?;
        }
        self.storage.del(FEATURES_KEY)?;
        debug!("cleared all features");
        Ok(())
    }

    /// Reads `name`, applies `mutate` and saves the result.
    pub fn update<F>(&self, name: &str, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut Feature),
    {
        let mut feature = self.get(name)?;
        mutate(&mut feature);
        self.save(&feature)
    }

    /// Writes the feature record, then adds its name to the index.
    pub fn save(&self, feature: &Feature) -> Result<()> {
        let record = feature.encode();
        self.storage.set(&key(feature.name()), &record)?;
        debug!(feature = feature.name(), record = %record, "saved feature");
        self.add_to_index(feature.name())
    }

    /// An empty name cannot be told apart from an empty index record, so it
    /// is never indexed.
    fn add_to_index(&self, name: &str) -> Result<()> {
        if name.is_empty() {
            debug!("empty feature name, index left unchanged");
            return Ok(());
        }
        let mut names = self.features()?;
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
        self.storage.set(FEATURES_KEY, &codec::encode_index(&names))
    }
}

impl<S, U> Rollout<S, U>
where
    S: AtomicStore,
    U: ?Sized + 'static,
{
    /// Like [`Rollout::update`], but the record is only written if nobody
    /// changed it since it was read. Lost races are retried with a fresh
    /// read, up to [`MAX_CAS_ATTEMPTS`] times.
    pub fn update_atomic<F>(&self, name: &str, mut mutate: F) -> Result<()>
    where
        F: FnMut(&mut Feature),
    {
        let key = key(name);
        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let current = self.storage.get(&key)?;
            let mut feature = match current.as_deref() {
                Some(raw) => Feature::decode(name, raw),
                None if !matches!(self.migration, Migration::Disabled) => {
                    // migration saves the record; re-read it on the next pass
                    self.get(name)?;
                    continue;
                }
                None => Feature::new(name),
            };
            mutate(&mut feature);

            if self
                .storage
                .compare_and_swap(&key, current.as_deref(), &feature.encode())?
            {
                return self.add_to_index(name);
            }
            debug!(feature = name, attempt, "record changed during update, retrying");
        }
        Err(Error::Conflict {
            name: name.to_string(),
            attempts: MAX_CAS_ATTEMPTS,
        })
    }
}

impl<S, U: ?Sized> fmt::Debug for Rollout<S, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rollout")
            .field("options", &self.options)
            .field("predicates", &self.predicates)
            .finish_non_exhaustive()
    }
}
