use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Name registered in both the group and the locale table that matches
/// every user.
pub const ALL: &str = "all";

/// Boolean test over a user value.
pub type Predicate<U> = Arc<dyn Fn(&U) -> bool + Send + Sync>;

/// Named group and locale predicates.
///
/// Populated once by the embedding application, then only read while
/// evaluating features. An unknown name never matches.
pub struct Predicates<U: ?Sized> {
    groups: HashMap<String, Predicate<U>>,
    locales: HashMap<String, Predicate<U>>,
}

impl<U: ?Sized + 'static> Predicates<U> {
    pub fn new() -> Self {
        let all: Predicate<U> = Arc::new(|_: &U| true);
        Self {
            groups: HashMap::from([(ALL.to_string(), Arc::clone(&all))]),
            locales: HashMap::from([(ALL.to_string(), all)]),
        }
    }
}

impl<U: ?Sized + 'static> Default for Predicates<U> {
    fn default() -> Self {
        Self::new()
    }
}

impl<U: ?Sized> Predicates<U> {
    /// Registers a group predicate, replacing any earlier one with that name.
    pub fn define_group(&mut self, name: &str, predicate: impl Fn(&U) -> bool + Send + Sync + 'static) {
        self.groups.insert(name.to_string(), Arc::new(predicate));
    }

    /// Registers a locale predicate, replacing any earlier one with that name.
    pub fn define_locale(&mut self, name: &str, predicate: impl Fn(&U) -> bool + Send + Sync + 'static) {
        self.locales.insert(name.to_string(), Arc::new(predicate));
    }

    pub fn active_in_group(&self, group: &str, user: &U) -> bool {
        self.groups.get(group).is_some_and(|p| p(user))
    }

    pub fn active_in_locale(&self, locale: &str, user: &U) -> bool {
        self.locales.get(locale).is_some_and(|p| p(user))
    }

    pub fn groups(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    pub fn locales(&self) -> impl Iterator<Item = &str> {
        self.locales.keys().map(String::as_str)
    }
}

impl<U: ?Sized> fmt::Debug for Predicates<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut groups: Vec<_> = self.groups().collect();
        let mut locales: Vec<_> = self.locales().collect();
        groups.sort_unstable();
        locales.sort_unstable();
        f.debug_struct("Predicates")
            .field("groups", &groups)
            .field("locales", &locales)
            .finish()
    }
}
