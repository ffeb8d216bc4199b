//! Entity Codec - typed records <-> stored attribute maps.
//!
//! Every record is written in full. Status changes re-encode the whole
//! record, so decoding never meets a half-populated item written by us.

mod attribute;
mod entity;

pub use attribute::{item_key, AttributeValue, Item, PARTITION_KEY, SORT_KEY};
pub use entity::Entity;

pub(crate) use attribute::{key_part, required_s, ItemBuilder};

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("missing attribute {0:?}")]
    MissingAttribute(String),

    #[error("attribute {attribute:?} has type {actual}, expected {expected}")]
    WrongType {
        attribute: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("bad key: {0}")]
    BadKey(String),
}
