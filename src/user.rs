use std::fmt;
use std::sync::Arc;

/// Resolves a user value to the identity string used for bucketing and for
/// the explicit user list.
///
/// Strings and integers are their own identity. Structured user types
/// implement this by returning their id attribute, or the engine is built
/// with a custom accessor (see [`crate::RolloutBuilder::id_user_by`]).
pub trait Identify {
    fn identify(&self) -> String;
}

impl Identify for str {
    fn identify(&self) -> String {
        self.to_string()
    }
}

impl Identify for String {
    fn identify(&self) -> String {
        self.clone()
    }
}

impl<T: Identify + ?Sized> Identify for &T {
    fn identify(&self) -> String {
        (**self).identify()
    }
}

macro_rules! identify_integer {
    ($($t:ty),*) => {
        $(
            impl Identify for $t {
                fn identify(&self) -> String {
                    self.to_string()
                }
            }
        )*
    };
}

identify_integer!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);

/// Accessor turning a user value into its identity.
pub struct IdResolver<U: ?Sized>(Arc<dyn Fn(&U) -> String + Send + Sync>);

impl<U: ?Sized> IdResolver<U> {
    pub fn new(f: impl Fn(&U) -> String + Send + Sync + 'static) -> Self {
        IdResolver(Arc::new(f))
    }

    pub fn resolve(&self, user: &U) -> String {
        (self.0)(user)
    }
}

impl<U: Identify + ?Sized + 'static> Default for IdResolver<U> {
    fn default() -> Self {
        IdResolver::new(|user: &U| user.identify())
    }
}

impl<U: ?Sized> Clone for IdResolver<U> {
    fn clone(&self) -> Self {
        IdResolver(Arc::clone(&self.0))
    }
}

impl<U: ?Sized> fmt::Debug for IdResolver<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("IdResolver(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Account {
        id: u64,
        email: String,
    }

    impl Identify for Account {
        fn identify(&self) -> String {
            self.id.identify()
        }
    }

    #[test]
    fn test_primitives_are_their_own_identity() {
        assert_eq!("alice".identify(), "alice");
        assert_eq!(String::from("bob").identify(), "bob");
        assert_eq!(42u32.identify(), "42");
        assert_eq!((-7i64).identify(), "-7");
    }

    #[test]
    fn test_default_resolver_uses_identify() {
        let resolver = IdResolver::<Account>::default();
        let account = Account {
            id: 17,
            email: "a@example.com".into(),
        };
        assert_eq!(resolver.resolve(&account), "17");
    }

    #[test]
    fn test_custom_resolver() {
        let resolver = IdResolver::new(|a: &Account| a.email.clone());
        let account = Account {
            id: 17,
            email: "a@example.com".into(),
        };
        assert_eq!(resolver.resolve(&account), "a@example.com");
        assert_eq!(resolver.clone().resolve(&account), "a@example.com");
    }

    #[test]
    fn test_unsized_str_resolver() {
        let resolver = IdResolver::<str>::default();
        assert_eq!(resolver.resolve("carol"), "carol");
    }
}
