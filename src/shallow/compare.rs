use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::hash::{BuildHasher, Hash};
use std::sync::Arc;

/// Shallow structural equality.
///
/// Containers are compared one level deep: same size and pairwise-equal
/// members. Members themselves are compared with `PartialEq`, never by
/// recursing into `Shallow`.
///
/// A top-level `Arc` compares by identity only. An `Arc` held as a member
/// goes through `PartialEq` like any other member, which compares the
/// pointees, so two distinct `Arc`s with equal contents count as equal.
pub trait Shallow {
    /// Returns true when `self` and `other` are shallowly equal.
    fn shallow_eq(&self, other: &Self) -> bool;
}

/// Compare two values one level deep.
///
/// # Example
///
/// ```
/// use statebox::shallow;
/// use std::collections::HashSet;
///
/// let a: HashSet<i32> = [1, 2].into_iter().collect();
/// let b: HashSet<i32> = [2, 1].into_iter().collect();
/// assert!(shallow(&a, &b));
/// assert!(!shallow(&vec![1, 2], &vec![2, 1]));
/// ```
pub fn shallow<T: Shallow + ?Sized>(a: &T, b: &T) -> bool {
    a.shallow_eq(b)
}

macro_rules! shallow_by_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Shallow for $ty {
                fn shallow_eq(&self, other: &Self) -> bool {
                    self == other
                }
            }
        )*
    };
}

shallow_by_value!(
    bool, char, (), u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, String, str,
);

// `Object.is` semantics: NaN is equal to itself, +0 and -0 differ.
macro_rules! shallow_float {
    ($($ty:ty),*) => {
        $(
            impl Shallow for $ty {
                fn shallow_eq(&self, other: &Self) -> bool {
                    if self.is_nan() && other.is_nan() {
                        return true;
                    }
                    self == other && self.is_sign_negative() == other.is_sign_negative()
                }
            }
        )*
    };
}

shallow_float!(f32, f64);

impl<T: ?Sized> Shallow for Arc<T> {
    fn shallow_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(self, other)
    }
}

impl<T: ?Sized + Shallow> Shallow for &T {
    fn shallow_eq(&self, other: &Self) -> bool {
        std::ptr::eq(*self, *other) || (**self).shallow_eq(*other)
    }
}

impl<T: PartialEq> Shallow for Option<T> {
    fn shallow_eq(&self, other: &Self) -> bool {
        self == other
    }
}

impl<T: PartialEq> Shallow for [T] {
    fn shallow_eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().zip(other).all(|(a, b)| a == b)
    }
}

impl<T: PartialEq, const N: usize> Shallow for [T; N] {
    fn shallow_eq(&self, other: &Self) -> bool {
        self[..].shallow_eq(&other[..])
    }
}

impl<T: PartialEq> Shallow for Vec<T> {
    fn shallow_eq(&self, other: &Self) -> bool {
        self[..].shallow_eq(&other[..])
    }
}

impl<T: PartialEq> Shallow for VecDeque<T> {
    fn shallow_eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().zip(other).all(|(a, b)| a == b)
    }
}

impl<K, V, H> Shallow for HashMap<K, V, H>
where
    K: Eq + Hash,
    V: PartialEq,
    H: BuildHasher,
{
    fn shallow_eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(key, value)| other.get(key).is_some_and(|v| v == value))
    }
}

impl<K: Ord, V: PartialEq> Shallow for BTreeMap<K, V> {
    fn shallow_eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(key, value)| other.get(key).is_some_and(|v| v == value))
    }
}

impl<T: Eq + Hash, H: BuildHasher> Shallow for HashSet<T, H> {
    fn shallow_eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|item| other.contains(item))
    }
}

impl<T: Ord> Shallow for BTreeSet<T> {
    fn shallow_eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|item| other.contains(item))
    }
}

macro_rules! shallow_tuple {
    ($(($($name:ident : $idx:tt),+)),+ $(,)?) => {
        $(
            impl<$($name: PartialEq),+> Shallow for ($($name,)+) {
                fn shallow_eq(&self, other: &Self) -> bool {
                    true $(&& self.$idx == other.$idx)+
                }
            }
        )+
    };
}

shallow_tuple!(
    (A: 0),
    (A: 0, B: 1),
    (A: 0, B: 1, C: 2),
    (A: 0, B: 1, C: 2, D: 3),
    (A: 0, B: 1, C: 2, D: 3, E: 4),
    (A: 0, B: 1, C: 2, D: 3, E: 4, F: 5),
);

impl Shallow for serde_json::Map<String, serde_json::Value> {
    fn shallow_eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(key, value)| other.get(key).is_some_and(|v| v == value))
    }
}

impl Shallow for serde_json::Value {
    fn shallow_eq(&self, other: &Self) -> bool {
        use serde_json::Value;

        match (self, other) {
            (Value::Object(a), Value::Object(b)) => a.shallow_eq(b),
            (Value::Array(a), Value::Array(b)) => a.shallow_eq(b),
            (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) if a.is_f64() || b.is_f64() => x.shallow_eq(&y),
                _ => a == b,
            },
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Null, Value::Null) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn identical_values_are_equal() {
        let v = vec![1, 2, 3];
        assert!(shallow(&v, &v));
        let s = String::from("x");
        assert!(shallow(&s, &s));
        let m: HashMap<&str, i32> = [("a", 1)].into_iter().collect();
        assert!(shallow(&m, &m));
        assert!(shallow(&f64::NAN, &f64::NAN));
    }

    #[test]
    fn object_key_sets_must_match() {
        let a = json!({ "a": 1, "b": 2 });
        let b = json!({ "a": 1, "b": 2, "c": 3 });
        assert!(!shallow(&a, &b));
        assert!(!shallow(&b, &a));
        assert!(shallow(&a, &json!({ "b": 2, "a": 1 })));
    }

    #[test]
    fn arrays_are_order_sensitive() {
        assert!(shallow(&vec![1, 2], &vec![1, 2]));
        assert!(!shallow(&vec![1, 2], &vec![2, 1]));
        assert!(!shallow(&vec![1, 2], &vec![1, 2, 3]));
        assert!(shallow(&[1, 2], &[1, 2]));
    }

    #[test]
    fn sets_are_order_insensitive() {
        let a: HashSet<i32> = [1, 2].into_iter().collect();
        let b: HashSet<i32> = [2, 1].into_iter().collect();
        assert!(shallow(&a, &b));

        let c: BTreeSet<i32> = [1, 2, 3].into_iter().collect();
        let d: BTreeSet<i32> = [1, 2].into_iter().collect();
        assert!(!shallow(&c, &d));
    }

    #[test]
    fn maps_compare_by_size_and_entries() {
        let a: HashMap<&str, i32> = [("a", 1)].into_iter().collect();
        let b: HashMap<&str, i32> = [("a", 1), ("b", 2)].into_iter().collect();
        assert!(!shallow(&a, &b));

        let c: BTreeMap<&str, i32> = [("a", 1), ("b", 2)].into_iter().collect();
        let d: BTreeMap<&str, i32> = [("b", 2), ("a", 1)].into_iter().collect();
        assert!(shallow(&c, &d));

        let e: BTreeMap<&str, i32> = [("a", 1), ("c", 2)].into_iter().collect();
        assert!(!shallow(&c, &e));
    }

    #[test]
    fn only_one_level_deep() {
        // Nested containers are members, compared as whole values.
        let a = json!({ "nested": { "x": 1 } });
        let b = json!({ "nested": { "x": 1 } });
        assert!(shallow(&a, &b));

        let shared = Arc::new(vec![1]);
        let cloned = Arc::new(vec![1]);
        assert!(shallow(&vec![shared.clone()], &vec![shared.clone()]));
        assert!(!shallow(&shared, &cloned));
    }

    #[test]
    fn arc_members_compare_by_content() {
        let a = vec![Arc::new(vec![1])];
        let b = vec![Arc::new(vec![1])];
        assert!(shallow(&a, &b));
        assert!(!shallow(&a[0], &b[0]));
    }

    #[test]
    fn functions_compare_by_identity() {
        let f: Arc<dyn Fn() -> i32 + Send + Sync> = Arc::new(|| 1);
        let g: Arc<dyn Fn() -> i32 + Send + Sync> = Arc::new(|| 1);
        assert!(shallow(&f, &f.clone()));
        assert!(!shallow(&f, &g));
    }

    #[test]
    fn mismatched_json_variants_are_unequal() {
        assert!(!shallow(&json!(1), &json!("1")));
        assert!(!shallow(&json!([]), &json!({})));
        assert!(!shallow(&json!(null), &json!(false)));
    }

    #[test]
    fn signed_zero_differs() {
        assert!(!shallow(&0.0_f64, &-0.0_f64));
        assert!(shallow(&-0.0_f64, &-0.0_f64));
    }

    #[test]
    fn tuples_compare_pairwise() {
        assert!(shallow(&(1, "a"), &(1, "a")));
        assert!(!shallow(&(1, "a"), &(1, "b")));
    }
}
