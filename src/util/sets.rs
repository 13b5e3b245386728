//! Order-preserving set operations over slices.
//!
//! Results keep the order (and duplicates) of the slice they are drawn from.

use std::collections::HashSet;
use std::hash::Hash;

/// Every item of `a`, then the items of `b` not in `a`.
pub fn union<T: Eq + Hash + Clone>(a: &[T], b: &[T]) -> Vec<T> {
    let seen: HashSet<&T> = a.iter().collect();
    a.iter()
        .chain(b.iter().filter(|item| !seen.contains(item)))
        .cloned()
        .collect()
}

/// Items of `b` that are also in `a`, in `b`'s order.
pub fn intersection<T: Eq + Hash + Clone>(a: &[T], b: &[T]) -> Vec<T> {
    let seen: HashSet<&T> = a.iter().collect();
    b.iter().filter(|item| seen.contains(item)).cloned().collect()
}

/// Items of `b` that are not in `a`, in `b`'s order.
///
/// Note the direction: this is `b \ a`.
pub fn difference<T: Eq + Hash + Clone>(a: &[T], b: &[T]) -> Vec<T> {
    let seen: HashSet<&T> = a.iter().collect();
    b.iter().filter(|item| !seen.contains(item)).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(items: &[&str]) -> Vec<String> {
        items.iter().map(|i| i.to_string()).collect()
    }

    #[test]
    fn union_keeps_a_then_new_items_of_b() {
        let got = union(&s(&["x", "y"]), &s(&["y", "z", "x", "w"]));
        assert_eq!(got, s(&["x", "y", "z", "w"]));
    }

    #[test]
    fn intersection_follows_b_order() {
        let got = intersection(&s(&["a", "b", "c"]), &s(&["c", "d", "a"]));
        assert_eq!(got, s(&["c", "a"]));
    }

    #[test]
    fn difference_is_b_minus_a() {
        let got = difference(&s(&["a", "b"]), &s(&["b", "c", "d"]));
        assert_eq!(got, s(&["c", "d"]));
        assert!(difference(&s(&["a"]), &s(&[])).is_empty());
    }
}
