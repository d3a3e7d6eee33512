use std::collections::{BTreeMap, HashMap};
use std::hash::{BuildHasher, Hash};

/// State that accepts partial updates.
///
/// `merge` overlays a partial value onto a copy of the previous state with
/// object-spread semantics: fields present in the partial overwrite their
/// counterparts, everything else survives.
///
/// Records usually pair with a patch struct of `Option` fields:
///
/// ```
/// use statebox::Merge;
///
/// #[derive(Clone)]
/// struct Profile { name: String, age: u32 }
///
/// #[derive(Default)]
/// struct ProfilePatch { name: Option<String>, age: Option<u32> }
///
/// impl Merge for Profile {
///     type Partial = ProfilePatch;
///
///     fn merge(&mut self, patch: ProfilePatch) {
///         if let Some(name) = patch.name { self.name = name; }
///         if let Some(age) = patch.age { self.age = age; }
///     }
/// }
/// ```
pub trait Merge: Clone {
    /// The partial shape accepted by [`Merge::merge`].
    type Partial;

    /// Overlay `partial` onto `self`.
    fn merge(&mut self, partial: Self::Partial);
}

impl Merge for serde_json::Map<String, serde_json::Value> {
    type Partial = Self;

    fn merge(&mut self, partial: Self) {
        for (key, value) in partial {
            self.insert(key, value);
        }
    }
}

impl<K, V, H> Merge for HashMap<K, V, H>
where
    K: Eq + Hash + Clone,
    V: Clone,
    H: BuildHasher + Clone,
{
    type Partial = Self;

    fn merge(&mut self, partial: Self) {
        self.extend(partial);
    }
}

impl<K: Ord + Clone, V: Clone> Merge for BTreeMap<K, V> {
    type Partial = Self;

    fn merge(&mut self, partial: Self) {
        self.extend(partial);
    }
}
