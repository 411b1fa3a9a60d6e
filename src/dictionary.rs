/// An ordered sequence of `(key, value)` byte-string pairs, the OMAPI
/// "bindict" structure used for both message-level parameters and object
/// attributes.
///
/// Order is preserved on the wire and across [`Dictionary::update`] calls.
/// Keys are not required to be unique - a decoded dictionary may contain
/// duplicate keys, matching the permissive behaviour of the reference
/// implementation (see the Open Questions in the design docs).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dictionary {
    entries: Vec<(Vec<u8>, Vec<u8>)>,
}

impl Dictionary {
    /// Construct an empty dictionary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a `(key, value)` entry, regardless of whether `key` is
    /// already present.
    pub fn push(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        self.entries.push((key.into(), value.into()));
    }

    /// Return the value of the last entry matching `key`, mirroring the
    /// `dict(pairs)[key]` last-write-wins lookup used by the reference
    /// client when it reads a single attribute out of an `obj` dictionary.
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.entries
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_slice())
    }

    /// Iterate over the entries in wire order.
    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &[u8])> {
        self.entries.iter().map(|(k, v)| (k.as_slice(), v.as_slice()))
    }

    /// The number of entries, including duplicates.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the dictionary has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every existing entry whose key appears in `updates`, then
    /// append all of `updates` in insertion order.
    ///
    /// This is the `update_object` operation: it implements replace-or-
    /// append semantics for a batch of attribute changes.
    pub fn update<K, V>(&mut self, updates: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<Vec<u8>>,
        V: Into<Vec<u8>>,
    {
        let updates: Vec<(Vec<u8>, Vec<u8>)> =
            updates.into_iter().map(|(k, v)| (k.into(), v.into())).collect();

        self.entries
            .retain(|(k, _)| !updates.iter().any(|(uk, _)| uk == k));
        self.entries.extend(updates);
    }
}

impl<K, V> FromIterator<(K, V)> for Dictionary
where
    K: Into<Vec<u8>>,
    V: Into<Vec<u8>>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut d = Dictionary::new();
        for (k, v) in iter {
            d.push(k, v);
        }
        d
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_push_and_get() {
        let mut d = Dictionary::new();
        d.push(*b"foo", *b"bar");
        assert_eq!(d.get(b"foo"), Some(b"bar".as_slice()));
        assert_eq!(d.get(b"missing"), None);
    }

    #[test]
    fn test_get_last_write_wins() {
        let mut d = Dictionary::new();
        d.push(*b"foo", *b"bar");
        d.push(*b"foo", *b"baz");
        assert_eq!(d.get(b"foo"), Some(b"baz".as_slice()));
        assert_eq!(d.len(), 2, "duplicate entries are preserved for round-trip fidelity");
    }

    #[test]
    fn test_update_replaces_and_preserves_order() {
        let mut d: Dictionary = [("a", "1"), ("b", "2"), ("c", "3")]
            .into_iter()
            .collect();

        d.update([("b", "20"), ("d", "4")]);

        let got: Vec<_> = d.iter().collect();
        assert_eq!(
            got,
            vec![
                (b"a".as_slice(), b"1".as_slice()),
                (b"c".as_slice(), b"3".as_slice()),
                (b"b".as_slice(), b"20".as_slice()),
                (b"d".as_slice(), b"4".as_slice()),
            ]
        );
    }

    proptest! {
        /// Pushing an arbitrary sequence of (key, value) byte-string pairs,
        /// including duplicate keys, must leave every entry recoverable in
        /// the order it was pushed - the in-memory half of P1.
        #[test]
        fn prop_push_preserves_all_entries_in_order(
            pairs in prop::collection::vec(
                (prop::collection::vec(any::<u8>(), 0..32), prop::collection::vec(any::<u8>(), 0..32)),
                0..16,
            )
        ) {
            let mut d = Dictionary::new();
            for (k, v) in &pairs {
                d.push(k.clone(), v.clone());
            }

            let got: Vec<(Vec<u8>, Vec<u8>)> = d
                .iter()
                .map(|(k, v)| (k.to_vec(), v.to_vec()))
                .collect();
            prop_assert_eq!(got, pairs);
        }

        /// `update` must remove every prior entry whose key appears in the
        /// replacement batch and append the batch in order, regardless of
        /// what keys or values are involved.
        #[test]
        fn prop_update_replaces_matching_keys_only(
            existing in prop::collection::vec(
                (prop::collection::vec(any::<u8>(), 1..8), prop::collection::vec(any::<u8>(), 0..8)),
                0..8,
            ),
            updates in prop::collection::vec(
                (prop::collection::vec(any::<u8>(), 1..8), prop::collection::vec(any::<u8>(), 0..8)),
                0..8,
            ),
        ) {
            let mut d: Dictionary = existing.iter().cloned().collect();
            d.update(updates.clone());

            let update_keys: std::collections::HashSet<&[u8]> =
                updates.iter().map(|(k, _)| k.as_slice()).collect();

            let expected_untouched: Vec<(Vec<u8>, Vec<u8>)> = existing
                .into_iter()
                .filter(|(k, _)| !update_keys.contains(k.as_slice()))
                .collect();

            let got: Vec<(Vec<u8>, Vec<u8>)> = d
                .iter()
                .map(|(k, v)| (k.to_vec(), v.to_vec()))
                .collect();

            let (got_untouched, got_updates) = got.split_at(expected_untouched.len());
            prop_assert_eq!(got_untouched.to_vec(), expected_untouched);
            prop_assert_eq!(got_updates.to_vec(), updates);
        }
    }
}
