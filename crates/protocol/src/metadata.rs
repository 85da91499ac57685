//! `Upload-Metadata` codec.
//!
//! The header is a comma-separated list of `key base64(value)` pairs.
//! [`Metadata`] keeps insertion order so the encoded header is byte-stable
//! for identical input.

use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// Ordered string→string mapping sent as `Upload-Metadata`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    entries: Vec<(String, String)>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces `key`. A replaced key keeps its original position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let idx = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut metadata = Metadata::new();
        for (k, v) in iter {
            metadata.insert(k, v);
        }
        metadata
    }
}

/// Encodes metadata into the `Upload-Metadata` header value.
pub fn encode_metadata(metadata: &Metadata) -> String {
    metadata
        .iter()
        .map(|(k, v)| format!("{k} {}", STANDARD.encode(v.as_bytes())))
        .collect::<Vec<_>>()
        .join(",")
}

/// Decodes an `Upload-Metadata` header value.
///
/// A pair without a value (`key` alone) decodes to an empty string.
pub fn decode_metadata(header: &str) -> Result<Metadata, ProtocolError> {
    let mut metadata = Metadata::new();
    if header.trim().is_empty() {
        return Ok(metadata);
    }

    for pair in header.split(',') {
        let pair = pair.trim();
        let mut parts = pair.split(' ');
        let key = match parts.next() {
            Some(k) if !k.is_empty() => k,
            _ => return Err(ProtocolError::MalformedMetadata(pair.to_string())),
        };
        let encoded = parts.next().unwrap_or("");
        if parts.next().is_some() {
            return Err(ProtocolError::MalformedMetadata(pair.to_string()));
        }

        let raw = STANDARD
            .decode(encoded)
            .map_err(|source| ProtocolError::MetadataBase64 {
                key: key.to_string(),
                source,
            })?;
        let value =
            String::from_utf8(raw).map_err(|_| ProtocolError::MetadataUtf8(key.to_string()))?;
        metadata.insert(key, value);
    }

    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_single_pair() {
        let metadata: Metadata = [("filename", "hello.txt")].into_iter().collect();
        assert_eq!(encode_metadata(&metadata), "filename aGVsbG8udHh0");
    }

    #[test]
    fn encode_keeps_insertion_order() {
        let metadata: Metadata = [("zeta", "1"), ("alpha", "2"), ("mid", "3")]
            .into_iter()
            .collect();
        let header = encode_metadata(&metadata);
        assert_eq!(header, "zeta MQ==,alpha Mg==,mid Mw==");
        // Stable across calls.
        assert_eq!(header, encode_metadata(&metadata));
    }

    #[test]
    fn insert_replaces_in_place() {
        let mut metadata = Metadata::new();
        metadata.insert("a", "1");
        metadata.insert("b", "2");
        metadata.insert("a", "3");
        let keys: Vec<_> = metadata.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(metadata.get("a"), Some("3"));
    }

    #[test]
    fn decode_restores_order_and_values() {
        let metadata: Metadata = [
            ("filename", "report final.pdf"),
            ("mtime", "1700000000"),
            ("checksum", "ünïcode"),
        ]
        .into_iter()
        .collect();

        let decoded = decode_metadata(&encode_metadata(&metadata)).unwrap();
        assert_eq!(decoded, metadata);
    }

    #[test]
    fn decode_key_without_value() {
        let decoded = decode_metadata("is_confidential,filename aGVsbG8=").unwrap();
        assert_eq!(decoded.get("is_confidential"), Some(""));
        assert_eq!(decoded.get("filename"), Some("hello"));
    }

    #[test]
    fn decode_empty_header() {
        assert!(decode_metadata("").unwrap().is_empty());
    }

    #[test]
    fn decode_rejects_bad_base64() {
        let err = decode_metadata("filename !!!").unwrap_err();
        assert!(matches!(err, ProtocolError::MetadataBase64 { .. }));
    }

    #[test]
    fn decode_rejects_extra_fields() {
        let err = decode_metadata("filename aGVsbG8= extra").unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedMetadata(_)));
    }

    #[test]
    fn remove_drops_entry() {
        let mut metadata: Metadata = [("a", "1"), ("b", "2")].into_iter().collect();
        assert_eq!(metadata.remove("a").as_deref(), Some("1"));
        assert_eq!(metadata.len(), 1);
        assert!(metadata.remove("missing").is_none());
    }
}
