//! Ordered, unique-key property map carried by every [`crate::message::Message`].

use std::fmt;

use crate::message::error::MessageError;

/// An ordered mapping from UTF-8 property name to UTF-8 property value.
///
/// Keys are unique: inserting a key that already exists replaces its value in
/// place rather than appending a duplicate. Iteration order is insertion
/// order, which matters for the canonical serialization (spec.md §6) — two
/// messages built from the same ordered inserts serialize identically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyMap {
    entries: Vec<(String, String)>,
}

impl PropertyMap {
    /// Builds an empty property map.
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Builds a property map from an iterator of `(name, value)` pairs,
    /// defensively copying each into owned `String`s. Later duplicates of a
    /// name win, matching `insert`'s replace-in-place semantics.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut map = Self::new();
        for (k, v) in pairs {
            map.insert(k.into(), v.into());
        }
        map
    }

    /// Inserts or replaces a property, preserving the original position on
    /// replace so re-serialization of an unmodified map is stable.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Returns the value for `name`, if present.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Returns `true` if the map has no properties.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of properties.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Iterates properties in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub(crate) fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&(self.entries.len() as u32).to_be_bytes());
        for (k, v) in &self.entries {
            out.extend_from_slice(k.as_bytes());
            out.push(0);
            out.extend_from_slice(v.as_bytes());
            out.push(0);
        }
    }

    pub(crate) fn decode(buf: &[u8], cursor: &mut usize) -> Result<Self, MessageError> {
        let count = read_u32(buf, cursor)? as usize;
        let mut map = Self::new();
        for _ in 0..count {
            let name = read_cstr(buf, cursor)?;
            let value = read_cstr(buf, cursor)?;
            map.insert(name, value);
        }
        Ok(map)
    }
}

impl fmt::Display for PropertyMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (k, v)) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{k:?}: {v:?}")?;
        }
        write!(f, "}}")
    }
}

pub(crate) fn read_u32(buf: &[u8], cursor: &mut usize) -> Result<u32, MessageError> {
    let end = *cursor + 4;
    let slice = buf.get(*cursor..end).ok_or(MessageError::Truncated)?;
    *cursor = end;
    Ok(u32::from_be_bytes(slice.try_into().map_err(|_| MessageError::Truncated)?))
}

pub(crate) fn read_cstr(buf: &[u8], cursor: &mut usize) -> Result<String, MessageError> {
    let start = *cursor;
    let nul = buf[start..]
        .iter()
        .position(|b| *b == 0)
        .ok_or(MessageError::Truncated)?;
    let end = start + nul;
    let s = std::str::from_utf8(&buf[start..end])
        .map_err(|_| MessageError::InvalidUtf8)?
        .to_owned();
    *cursor = end + 1;
    Ok(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_replaces_in_place() {
        let mut map = PropertyMap::new();
        map.insert("a", "1");
        map.insert("b", "2");
        map.insert("a", "3");
        assert_eq!(map.get("a"), Some("3"));
        assert_eq!(map.iter().collect::<Vec<_>>(), vec![("a", "3"), ("b", "2")]);
    }

    #[test]
    fn from_pairs_keeps_unique_keys() {
        let map = PropertyMap::from_pairs([("k", "v"), ("k", "v2")]);
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("k"), Some("v2"));
    }

    #[test]
    fn encode_decode_roundtrip() {
        let map = PropertyMap::from_pairs([("a", "1"), ("b", "")]);
        let mut buf = Vec::new();
        map.encode(&mut buf);
        let mut cursor = 0;
        let decoded = PropertyMap::decode(&buf, &mut cursor).expect("decode");
        assert_eq!(decoded, map);
        assert_eq!(cursor, buf.len());
    }
}
