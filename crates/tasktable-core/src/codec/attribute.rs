//! Attribute model of a stored item.

use super::DecodeError;
use crate::domain::keys::{EntityRef, ItemKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const PARTITION_KEY: &str = "PartitionKey";
pub const SORT_KEY: &str = "SortKey";

/// One attribute value, tagged with its underlying type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeValue {
    S(String),
    N(String),
    Bool(bool),
}

impl AttributeValue {
    fn type_name(&self) -> &'static str {
        match self {
            AttributeValue::S(_) => "S",
            AttributeValue::N(_) => "N",
            AttributeValue::Bool(_) => "Bool",
        }
    }
}

pub type Item = BTreeMap<String, AttributeValue>;

/// Reads the primary key of a raw item.
pub fn item_key(item: &Item) -> Result<ItemKey, DecodeError> {
    let pk = required_s(item, PARTITION_KEY)?;
    let sk = required_s(item, SORT_KEY)?;
    ItemKey::from_raw(pk, sk).map_err(|err| DecodeError::BadKey(err.to_string()))
}

/// Builds an item starting from its key.
pub(crate) struct ItemBuilder {
    item: Item,
}

impl ItemBuilder {
    pub(crate) fn new(key: &ItemKey) -> Self {
        let mut item = Item::new();
        item.insert(PARTITION_KEY.to_string(), AttributeValue::S(key.pk().to_string()));
        item.insert(SORT_KEY.to_string(), AttributeValue::S(key.sk().to_string()));
        Self { item }
    }

    pub(crate) fn s(mut self, name: &str, value: impl Into<String>) -> Self {
        self.item
            .insert(name.to_string(), AttributeValue::S(value.into()));
        self
    }

    pub(crate) fn entity(self, name: &str, value: &EntityRef) -> Self {
        self.s(name, value.to_string())
    }

    pub(crate) fn build(self) -> Item {
        self.item
    }
}

pub(crate) fn required_s<'a>(item: &'a Item, name: &str) -> Result<&'a str, DecodeError> {
    match item.get(name) {
        Some(AttributeValue::S(value)) => Ok(value.as_str()),
        Some(other) => Err(DecodeError::WrongType {
            attribute: name.to_string(),
            expected: "S",
            actual: other.type_name(),
        }),
        None => Err(DecodeError::MissingAttribute(name.to_string())),
    }
}

/// Missing attributes read as an empty string; wrong types still fail.
pub(crate) fn optional_s(item: &Item, name: &str) -> Result<String, DecodeError> {
    match required_s(item, name) {
        Ok(value) => Ok(value.to_string()),
        Err(DecodeError::MissingAttribute(_)) => Ok(String::new()),
        Err(err) => Err(err),
    }
}

pub(crate) fn key_part<T>(
    raw: &str,
    parse: impl FnOnce(&str) -> Result<T, crate::domain::keys::KeyError>,
) -> Result<T, DecodeError> {
    parse(raw).map_err(|err| DecodeError::BadKey(err.to_string()))
}
