use ahash::{AHashMap, RandomState};
use std::hash::{BuildHasher, Hash, Hasher};
use std::sync::OnceLock;

/// Process-wide randomly keyed hasher for store fingerprints.
///
/// Versions are published in decision replies. The key never leaves the
/// process, so a version cannot be recomputed offline from guessed values.
/// Versions are only comparable within one process.
fn fingerprint_state() -> &'static RandomState {
    static STATE: OnceLock<RandomState> = OnceLock::new();
    STATE.get_or_init(RandomState::new)
}

/// Externally configured values available to rules, keyed by dotted path.
///
/// A store is built once per load and never mutated afterwards. Reloads
/// produce a new store; evaluations keep whichever one they started with.
#[derive(Debug, Clone)]
pub struct ReferenceData {
    values: AHashMap<String, String>,
    version: String,
}

impl ReferenceData {
    /// Build a store from flattened `dotted.key -> value` pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let values: AHashMap<String, String> = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let version = fingerprint(&values);

        ReferenceData { values, version }
    }

    /// An empty store. Every lookup is absent.
    pub fn empty() -> Self {
        ReferenceData::from_pairs(std::iter::empty::<(String, String)>())
    }

    /// Look up a dotted key. `None` when the key is not configured.
    #[inline]
    pub fn lookup(&self, dotted_key: &str) -> Option<&str> {
        self.values.get(dotted_key).map(String::as_str)
    }

    /// Content fingerprint identifying this version of the store.
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Return a new store with `overrides` layered on top of this one.
    pub fn with_overrides<I>(&self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut values = self.values.clone();
        values.extend(overrides);
        let version = fingerprint(&values);

        ReferenceData { values, version }
    }

    /// Sorted key listing, for logging what was loaded without the values.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.values.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}

impl PartialEq for ReferenceData {
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version && *self.values == *other.values
    }
}

impl Eq for ReferenceData {}

impl Default for ReferenceData {
    fn default() -> Self {
        ReferenceData::empty()
    }
}

fn fingerprint(values: &AHashMap<String, String>) -> String {
    fingerprint_with(fingerprint_state(), values)
}

fn fingerprint_with(state: &RandomState, values: &AHashMap<String, String>) -> String {
    let mut hasher = state.build_hasher();

    let mut entries: Vec<(&String, &String)> = values.iter().collect();
    entries.sort_unstable();
    for (key, value) in entries {
        key.hash(&mut hasher);
        value.hash(&mut hasher);
    }

    format!("{:016x}", hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_present_and_absent() {
        let refdata = ReferenceData::from_pairs([("allowed_tokens.ci", "secret123")]);

        assert_eq!(refdata.lookup("allowed_tokens.ci"), Some("secret123"));
        assert_eq!(refdata.lookup("allowed_tokens.cd"), None);
        assert_eq!(refdata.lookup("allowed_tokens"), None);
    }

    #[test]
    fn test_version_tracks_content() {
        let a = ReferenceData::from_pairs([("k.a", "1"), ("k.b", "2")]);
        let b = ReferenceData::from_pairs([("k.b", "2"), ("k.a", "1")]);
        let c = ReferenceData::from_pairs([("k.a", "1"), ("k.b", "3")]);

        assert_eq!(a.version(), b.version());
        assert_ne!(a.version(), c.version());
        assert_eq!(a.version().len(), 16);
    }

    #[test]
    fn test_version_not_derivable_with_known_seeds() {
        let refdata = ReferenceData::from_pairs([("allowed_tokens.ci", "hunter42")]);
        let guessed: AHashMap<String, String> =
            [("allowed_tokens.ci".to_string(), "hunter42".to_string())]
                .into_iter()
                .collect();

        // Right guess, but hashed outside the process key
        let published_seeds = RandomState::with_seeds(0, 0, 0, 0);
        assert_ne!(fingerprint_with(&published_seeds, &guessed), refdata.version());
        assert_ne!(fingerprint_with(&RandomState::new(), &guessed), refdata.version());

        // The process key itself is stable
        assert_eq!(fingerprint(&guessed), refdata.version());
    }

    #[test]
    fn test_with_overrides_leaves_original_untouched() {
        let base = ReferenceData::from_pairs([("allowed_tokens.ci", "old")]);
        let updated = base.with_overrides([("allowed_tokens.ci".to_string(), "new".to_string())]);

        assert_eq!(base.lookup("allowed_tokens.ci"), Some("old"));
        assert_eq!(updated.lookup("allowed_tokens.ci"), Some("new"));
        assert_ne!(base.version(), updated.version());
    }

    #[test]
    fn test_empty_store() {
        let refdata = ReferenceData::empty();
        assert!(refdata.is_empty());
        assert_eq!(refdata.lookup("anything"), None);
    }

    #[test]
    fn test_keys_sorted() {
        let refdata = ReferenceData::from_pairs([("b.x", "1"), ("a.y", "2")]);
        assert_eq!(refdata.keys(), vec!["a.y", "b.x"]);
    }
}
