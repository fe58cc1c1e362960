//! A deterministic `HashMap`.
//!
//! The standard library map is randomly seeded, which makes iteration order differ from run to
//! run. Everything in this crate that iterates a map (logger module filters, report writers) uses
//! this alias instead so that two runs with identical inputs behave identically.
//!
//! `HashMap<K, V, S>` has no `new` method for a custom hasher; use `HashMap::default()`.

pub use rustc_hash::FxHashMap as HashMap;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iteration_order_is_reproducible() {
        let build = || {
            let mut map = HashMap::default();
            for (i, key) in ["beta", "gamma", "population", "infected", "recovered"]
                .iter()
                .enumerate()
            {
                map.insert(*key, i);
            }
            map.into_iter().collect::<Vec<_>>()
        };
        assert_eq!(build(), build());
    }
}
