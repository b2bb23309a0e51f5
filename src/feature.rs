use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use tracing::trace;

use crate::bucket;
use crate::codec;
use crate::legacy::LegacyInfo;
use crate::predicate::ALL;
use crate::store::Store;
use crate::Rollout;

/// Rule set of one feature.
///
/// Built from the stored record on every read and written back after every
/// change; nothing is cached between calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Feature {
    #[serde(skip)]
    name: String,
    percentage: i64,
    users: Vec<String>,
    groups: Vec<String>,
    #[serde(serialize_with = "serialize_locales")]
    locales: Vec<(String, i64)>,
}

fn serialize_locales<S: Serializer>(locales: &[(String, i64)], serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(locales.len()))?;
    for (name, percentage) in locales {
        map.serialize_entry(name, percentage)?;
    }
    map.end()
}

impl Feature {
    /// A feature with every rule cleared.
    pub fn new(name: &str) -> Self {
        Feature {
            name: name.to_string(),
            percentage: 0,
            users: Vec::new(),
            groups: Vec::new(),
            locales: Vec::new(),
        }
    }

    /// Reads a stored record. Never fails: missing fields are empty, junk
    /// percentages read as 0.
    pub fn decode(name: &str, raw: &str) -> Self {
        let record = codec::decode(raw);
        let mut feature = Feature::new(name);
        feature.percentage = record.percentage;
        for user in record.users {
            feature.add_user(user);
        }
        for group in record.groups {
            feature.add_group(group);
        }
        for (locale, percentage) in record.locales {
            feature.add_locale(locale, percentage);
        }
        feature
    }

    /// Builds a feature from legacy state. Being globally enabled forces the
    /// percentage to 100. Repeated users or groups collapse as in
    /// [`Feature::decode`].
    pub fn from_legacy(name: &str, info: LegacyInfo) -> Self {
        let mut feature = Feature::new(name);
        feature.percentage = if info.global.contains(name) {
            100
        } else {
            info.percentage
        };
        for user in &info.users {
            feature.add_user(user);
        }
        for group in &info.groups {
            feature.add_group(group);
        }
        feature
    }

    /// Stored record text, the inverse of [`Feature::decode`].
    pub fn encode(&self) -> String {
        codec::encode(self.percentage, &self.users, &self.groups, &self.locales)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn percentage(&self) -> i64 {
        self.percentage
    }

    /// Out of range values are stored as given.
    pub fn set_percentage(&mut self, percentage: i64) {
        self.percentage = percentage;
    }

    pub fn users(&self) -> &[String] {
        &self.users
    }

    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    pub fn locales(&self) -> &[(String, i64)] {
        &self.locales
    }

    pub fn locale(&self, name: &str) -> Option<i64> {
        self.locales
            .iter()
            .find(|(locale, _)| locale == name)
            .map(|(_, pct)| *pct)
    }

    /// Adds an already resolved user identity.
    pub fn add_user(&mut self, id: &str) {
        if !self.users.iter().any(|u| u == id) {
            self.users.push(id.to_string());
        }
    }

    pub fn remove_user(&mut self, id: &str) {
        self.users.retain(|u| u != id);
    }

    pub fn add_group(&mut self, group: &str) {
        if !self.groups.iter().any(|g| g == group) {
            self.groups.push(group.to_string());
        }
    }

    pub fn remove_group(&mut self, group: &str) {
        self.groups.retain(|g| g != group);
    }

    /// Sets the percentage for a locale, replacing any earlier entry.
    pub fn add_locale(&mut self, locale: &str, percentage: i64) {
        self.remove_locale(locale);
        self.locales.push((locale.to_string(), percentage));
    }

    pub fn remove_locale(&mut self, locale: &str) {
        self.locales.retain(|(l, _)| l != locale);
    }

    pub fn clear(&mut self) {
        self.percentage = 0;
        self.users.clear();
        self.groups.clear();
        self.locales.clear();
    }

    /// Decides whether the feature is on for `user`.
    ///
    /// Without a user only a feature at 100% is active. Otherwise the gates
    /// run cheapest first and stop at the first hit: percentage, locales,
    /// explicit users, groups.
    pub fn is_active<S, U>(&self, rollout: &Rollout<S, U>, user: Option<&U>) -> bool
    where
        S: Store,
        U: ?Sized + 'static,
    {
        let Some(user) = user else {
            return self.percentage == 100;
        };

        let id = rollout.user_id(user);
        let bucket_id = self.percentage_identity(&id, rollout.options().randomize_percentage);

        let active = bucket::in_percentage(&bucket_id, self.percentage)
            || self.in_active_locale(rollout, user, &bucket_id)
            || self.users.iter().any(|u| *u == id)
            || self
                .groups
                .iter()
                .any(|group| rollout.active_in_group(group, user));

        trace!(feature = %self.name, user = %id, active, "evaluated feature");
        active
    }

    fn percentage_identity(&self, id: &str, randomize: bool) -> String {
        if randomize {
            format!("{}{}", id, self.name)
        } else {
            id.to_string()
        }
    }

    fn in_active_locale<S, U>(&self, rollout: &Rollout<S, U>, user: &U, bucket_id: &str) -> bool
    where
        S: Store,
        U: ?Sized + 'static,
    {
        self.locales.iter().any(|(locale, percentage)| {
            rollout.active_in_locale(locale, user)
                && (locale == ALL || bucket::in_percentage(bucket_id, *percentage))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn rollout() -> Rollout<MemoryStore> {
        Rollout::new(MemoryStore::new())
    }

    #[test]
    fn test_new_is_cleared() {
        let feature = Feature::new("chat");
        assert_eq!(feature.name(), "chat");
        assert_eq!(feature.percentage(), 0);
        assert!(feature.users().is_empty());
        assert!(feature.groups().is_empty());
        assert!(feature.locales().is_empty());
        assert_eq!(feature.encode(), "0|||");
    }

    #[test]
    fn test_decode_and_encode() {
        let raw = "50|alice,bob|beta_testers|fr:20,all:0";
        let feature = Feature::decode("chat", raw);
        assert_eq!(feature.percentage(), 50);
        assert_eq!(feature.users(), ["alice", "bob"]);
        assert_eq!(feature.groups(), ["beta_testers"]);
        assert_eq!(feature.locale("fr"), Some(20));
        assert_eq!(feature.locale("all"), Some(0));
        assert_eq!(feature.locale("de"), None);
        assert_eq!(feature.encode(), raw);
    }

    #[test]
    fn test_decode_collapses_duplicates() {
        let feature = Feature::decode("chat", "0|a,b,a|g,g|fr:10,de:5,fr:30");
        assert_eq!(feature.users(), ["a", "b"]);
        assert_eq!(feature.groups(), ["g"]);
        assert_eq!(
            feature.locales(),
            [("de".to_string(), 5), ("fr".to_string(), 30)]
        );
    }

    #[test]
    fn test_add_user_is_idempotent() {
        let mut feature = Feature::new("chat");
        feature.add_user("alice");
        feature.add_user("alice");
        assert_eq!(feature.users(), ["alice"]);
        feature.remove_user("alice");
        feature.remove_user("alice");
        assert!(feature.users().is_empty());
    }

    #[test]
    fn test_groups() {
        let mut feature = Feature::new("chat");
        feature.add_group("beta");
        feature.add_group("beta");
        feature.add_group("Beta");
        assert_eq!(feature.groups(), ["beta", "Beta"]);
        feature.remove_group("beta");
        assert_eq!(feature.groups(), ["Beta"]);
    }

    #[test]
    fn test_add_locale_replaces() {
        let mut feature = Feature::new("chat");
        feature.add_locale("fr", 10);
        feature.add_locale("fr", 40);
        assert_eq!(feature.locales(), [("fr".to_string(), 40)]);
        feature.remove_locale("fr");
        assert!(feature.locales().is_empty());
    }

    #[test]
    fn test_clear() {
        let mut feature = Feature::decode("chat", "50|alice|beta|all:0");
        feature.clear();
        assert_eq!(feature, Feature::new("chat"));
    }

    #[test]
    fn test_from_legacy() {
        let info = LegacyInfo {
            percentage: 30,
            global: ["other".to_string()].into(),
            groups: vec!["g".into()],
            users: vec!["u".into()],
        };
        let feature = Feature::from_legacy("chat", info.clone());
        assert_eq!(feature.percentage(), 30);
        assert_eq!(feature.groups(), ["g"]);
        assert_eq!(feature.users(), ["u"]);

        let info = LegacyInfo {
            global: ["chat".to_string()].into(),
            ..info
        };
        assert_eq!(Feature::from_legacy("chat", info).percentage(), 100);
    }

    #[test]
    fn test_from_legacy_collapses_duplicates() {
        let info = LegacyInfo {
            percentage: 10,
            groups: vec!["g".into(), "g".into()],
            users: vec!["u".into(), "u".into(), "v".into()],
            ..LegacyInfo::default()
        };
        let feature = Feature::from_legacy("chat", info);
        assert_eq!(feature.users(), ["u", "v"]);
        assert_eq!(feature.groups(), ["g"]);
        assert_eq!(Feature::decode("chat", &feature.encode()), feature);
    }

    #[test]
    fn test_no_user_only_active_at_full_percentage() {
        let rollout = rollout();
        let mut feature = Feature::decode("chat", "99|alice|all|all:0");
        assert!(!feature.is_active(&rollout, None));
        feature.set_percentage(100);
        assert!(feature.is_active(&rollout, None));
        feature.set_percentage(150);
        assert!(!feature.is_active(&rollout, None));
    }

    #[test]
    fn test_percentage_gate() {
        let rollout = rollout();
        // slot("alice") == 35, slot("bob") == 4
        let feature = Feature::decode("chat", "10");
        assert!(!feature.is_active(&rollout, Some("alice")));
        assert!(feature.is_active(&rollout, Some("bob")));

        let feature = Feature::decode("chat", "36");
        assert!(feature.is_active(&rollout, Some("alice")));
    }

    #[test]
    fn test_out_of_range_percentages() {
        let rollout = rollout();
        assert!(!Feature::decode("chat", "-5").is_active(&rollout, Some("bob")));
        assert!(Feature::decode("chat", "250").is_active(&rollout, Some("alice")));
    }

    #[test]
    fn test_randomized_percentage_identity() {
        let plain = rollout();
        let randomized = Rollout::<MemoryStore>::builder(MemoryStore::new())
            .randomize_percentage(true)
            .build();
        // slot("alice") == 35, slot("alicefeature_x") == 88
        let feature = Feature::decode("feature_x", "50");
        assert!(feature.is_active(&plain, Some("alice")));
        assert!(!feature.is_active(&randomized, Some("alice")));
    }

    #[test]
    fn test_user_gate() {
        let rollout = rollout();
        let feature = Feature::decode("chat", "0|alice");
        assert!(feature.is_active(&rollout, Some("alice")));
        assert!(!feature.is_active(&rollout, Some("bob")));
    }

    #[test]
    fn test_group_gate() {
        let mut rollout = rollout();
        rollout.define_group("staff", |u: &str| u.ends_with("@corp"));
        let feature = Feature::decode("chat", "0||staff,unknown");
        assert!(feature.is_active(&rollout, Some("ann@corp")));
        assert!(!feature.is_active(&rollout, Some("ann@home")));
    }

    #[test]
    fn test_locale_gate() {
        let mut rollout = rollout();
        rollout.define_locale("fr", |u: &str| u.starts_with("fr-"));
        // slot("fr-1") decides the 0% / 100% cases deterministically
        let off = Feature::decode("chat", "0|||fr:0");
        let on = Feature::decode("chat", "0|||fr:100");
        assert!(!off.is_active(&rollout, Some("fr-1")));
        assert!(on.is_active(&rollout, Some("fr-1")));
        assert!(!on.is_active(&rollout, Some("de-1")));

        let unknown = Feature::decode("chat", "0|||nl:100");
        assert!(!unknown.is_active(&rollout, Some("fr-1")));
    }

    #[test]
    fn test_all_locale_ignores_percentage() {
        let rollout = rollout();
        let feature = Feature::decode("chat", "0|||all:0");
        assert!(feature.is_active(&rollout, Some("anyone")));

        let mut feature = feature;
        feature.clear();
        assert!(!feature.is_active(&rollout, Some("anyone")));
    }

    #[test]
    fn test_serialize_json() {
        let feature = Feature::decode("chat", "50|alice|beta|fr:20");
        let json = serde_json::to_value(&feature).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "percentage": 50,
                "users": ["alice"],
                "groups": ["beta"],
                "locales": {"fr": 20},
            })
        );
    }
}
