//! The immutable, reference-counted message envelope (spec.md §3, §4.5).

use std::sync::Arc;

use crate::message::error::MessageError;
use crate::message::properties::{read_u32, PropertyMap};

/// An immutable message: an ordered property map plus an opaque payload.
///
/// `Message` is built once by a publisher, handed to the broker, and shared
/// read-only with every dispatch worker. Cloning a `Message` is cheap — the
/// inner data is `Arc`-held, matching spec.md §9's "atomic counted shared
/// handle" guidance. There is no API to mutate a `Message` after
/// construction; once published, it is frozen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    inner: Arc<Inner>,
}

#[derive(Debug, PartialEq, Eq)]
struct Inner {
    properties: PropertyMap,
    payload: Vec<u8>,
}

impl Message {
    /// Builds a message from a property map and a payload, defensively
    /// copying both so the message is independent of the caller's buffers.
    pub fn new(properties: PropertyMap, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            inner: Arc::new(Inner {
                properties,
                payload: payload.into(),
            }),
        }
    }

    /// Builds a message with no properties.
    pub fn with_payload(payload: impl Into<Vec<u8>>) -> Self {
        Self::new(PropertyMap::new(), payload)
    }

    /// Value of a single property, by name.
    pub fn property(&self, name: &str) -> Option<&str> {
        self.inner.properties.get(name)
    }

    /// The full property map.
    pub fn properties(&self) -> &PropertyMap {
        &self.inner.properties
    }

    /// The opaque payload.
    pub fn payload(&self) -> &[u8] {
        &self.inner.payload
    }

    /// Number of strong references currently held to this message's backing
    /// data. Exposed for broker refcount bookkeeping/tests; not part of the
    /// message's logical identity.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Canonical serialization (spec.md §6):
    /// `[u32 total_len][u32 prop_count][name\0 value\0]*[u32 payload_len][payload]`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut body = Vec::new();
        self.inner.properties.encode(&mut body);
        body.extend_from_slice(&(self.inner.payload.len() as u32).to_be_bytes());
        body.extend_from_slice(&self.inner.payload);

        let total_len = (4 + body.len()) as u32;
        let mut frame = Vec::with_capacity(4 + body.len());
        frame.extend_from_slice(&total_len.to_be_bytes());
        frame.extend_from_slice(&body);
        frame
    }

    /// Inverse of [`Message::to_bytes`]. Rejects frames whose declared total
    /// length does not match the actual buffer length.
    pub fn from_bytes(buf: &[u8]) -> Result<Self, MessageError> {
        let mut cursor = 0;
        let declared_len = read_u32(buf, &mut cursor)?;
        if declared_len as usize != buf.len() {
            return Err(MessageError::LengthMismatch {
                declared: declared_len,
                actual: buf.len(),
            });
        }

        let properties = PropertyMap::decode(buf, &mut cursor)?;
        let payload_len = read_u32(buf, &mut cursor)? as usize;
        let end = cursor + payload_len;
        let payload = buf.get(cursor..end).ok_or(MessageError::Truncated)?.to_vec();
        cursor = end;
        if cursor != buf.len() {
            return Err(MessageError::LengthMismatch {
                declared: declared_len,
                actual: buf.len(),
            });
        }

        Ok(Self::new(properties, payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_with_properties_and_payload() {
        let props = PropertyMap::from_pairs([("a", "1"), ("b", "")]);
        let msg = Message::new(props, vec![0xDE, 0xAD, 0xBE, 0xEF]);
        let bytes = msg.to_bytes();
        let decoded = Message::from_bytes(&bytes).expect("decode");
        assert_eq!(decoded, msg);
    }

    #[test]
    fn roundtrip_empty_payload_and_properties() {
        let msg = Message::with_payload(Vec::new());
        let bytes = msg.to_bytes();
        let decoded = Message::from_bytes(&bytes).expect("decode");
        assert_eq!(decoded, msg);
        assert!(decoded.payload().is_empty());
        assert!(decoded.properties().is_empty());
    }

    #[test]
    fn rejects_length_mismatch() {
        let msg = Message::with_payload(vec![1, 2, 3]);
        let mut bytes = msg.to_bytes();
        bytes.push(0xFF); // trailing garbage invalidates the declared length
        let err = Message::from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, MessageError::LengthMismatch { .. }));
    }

    #[test]
    fn clone_is_cheap_shared_handle() {
        let msg = Message::with_payload(vec![1]);
        let clone = msg.clone();
        assert_eq!(msg, clone);
        assert_eq!(msg.ref_count(), 2);
    }
}
