//! The immutable message envelope: an ordered property map plus an opaque
//! payload, with a canonical serialized form (spec.md §3, §4.5, §6).

pub mod error;
pub mod message;
pub mod properties;

pub use error::MessageError;
pub use message::Message;
pub use properties::PropertyMap;
