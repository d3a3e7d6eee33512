//! One-level-deep structural equality.
//!
//! Used as the default comparator for selector subscriptions and exported
//! for callers that want the same "did the slice change?" check.

mod compare;

pub use compare::{shallow, Shallow};
