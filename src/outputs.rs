//! The output tree: generated values addressed by the template's iteration
//! structure.
//!
//! `gen` and `wait` write at the current output address; `map` and `repeat`
//! open a list under their name and push one [`OutputTree`] per iteration, so
//! the tree always mirrors the nesting of iteration combinators.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::eval::context::{format_address, AddressSegment};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutputValue {
    Text(String),
    List(Vec<OutputValue>),
    Tree(OutputTree),
}

impl OutputValue {
    pub fn text<S: Into<String>>(value: S) -> Self {
        OutputValue::Text(value.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            OutputValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[OutputValue]> {
        match self {
            OutputValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_tree(&self) -> Option<&OutputTree> {
        match self {
            OutputValue::Tree(tree) => Some(tree),
            _ => None,
        }
    }

    /// Text rendering used when a value is bridged into another prompt.
    pub fn to_text(&self) -> String {
        match self {
            OutputValue::Text(text) => text.clone(),
            other => serde_json::to_string(other).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum OutputError {
    #[error("No output node at address '{address}'")]
    InvalidAddress { address: String },
    #[error("Output '{name}' at '{address}' is not a list")]
    NotAList { address: String, name: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutputTree {
    entries: BTreeMap<String, OutputValue>,
}

impl OutputTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&OutputValue> {
        self.entries.get(name)
    }

    pub fn get_text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(OutputValue::as_text)
    }

    pub fn get_list(&self, name: &str) -> Option<&[OutputValue]> {
        self.get(name).and_then(OutputValue::as_list)
    }

    pub fn insert<S: Into<String>>(&mut self, name: S, value: OutputValue) -> Option<OutputValue> {
        self.entries.insert(name.into(), value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &OutputValue)> {
        self.entries.iter()
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }

    /// Resolves `address` (alternating field and index segments) to the tree
    /// node it names.
    pub fn node(&self, address: &[AddressSegment]) -> Option<&OutputTree> {
        let mut tree = self;
        let mut segments = address.iter();
        while let Some(segment) = segments.next() {
            let AddressSegment::Field(name) = segment else {
                return None;
            };
            tree = match tree.entries.get(name)? {
                OutputValue::Tree(child) => child,
                OutputValue::List(items) => {
                    let Some(AddressSegment::Index(index)) = segments.next() else {
                        return None;
                    };
                    items.get(*index)?.as_tree()?
                }
                OutputValue::Text(_) => return None,
            };
        }
        Some(tree)
    }

    pub fn node_mut(&mut self, address: &[AddressSegment]) -> Result<&mut OutputTree, OutputError> {
        let invalid = || OutputError::InvalidAddress {
            address: format_address(address),
        };
        let mut tree = self;
        let mut segments = address.iter();
        while let Some(segment) = segments.next() {
            let AddressSegment::Field(name) = segment else {
                return Err(invalid());
            };
            tree = match tree.entries.get_mut(name).ok_or_else(invalid)? {
                OutputValue::Tree(child) => child,
                OutputValue::List(items) => {
                    let Some(AddressSegment::Index(index)) = segments.next() else {
                        return Err(invalid());
                    };
                    match items.get_mut(*index) {
                        Some(OutputValue::Tree(child)) => child,
                        _ => return Err(invalid()),
                    }
                }
                OutputValue::Text(_) => return Err(invalid()),
            };
        }
        Ok(tree)
    }

    /// Writes `value` under `name` at `address`. With `append` the value is
    /// pushed onto a list slot, replacing any non-list value found there.
    pub fn write(
        &mut self,
        address: &[AddressSegment],
        name: &str,
        value: OutputValue,
        append: bool,
    ) -> Result<(), OutputError> {
        let node = self.node_mut(address)?;
        if !append {
            node.insert(name, value);
            return Ok(());
        }
        match node.entries.get_mut(name) {
            Some(OutputValue::List(items)) => items.push(value),
            _ => {
                node.insert(name, OutputValue::List(vec![value]));
            }
        }
        Ok(())
    }

    /// Resets `name` at `address` to an empty list.
    pub fn open_list(&mut self, address: &[AddressSegment], name: &str) -> Result<(), OutputError> {
        self.node_mut(address)?
            .insert(name, OutputValue::List(Vec::new()));
        Ok(())
    }

    /// Appends an empty tree to the list `name` at `address` and returns its index.
    pub fn push_entry(
        &mut self,
        address: &[AddressSegment],
        name: &str,
    ) -> Result<usize, OutputError> {
        let node = self.node_mut(address)?;
        match node.entries.get_mut(name) {
            Some(OutputValue::List(items)) => {
                items.push(OutputValue::Tree(OutputTree::new()));
                Ok(items.len() - 1)
            }
            _ => Err(OutputError::NotAList {
                address: format_address(address),
                name: name.to_string(),
            }),
        }
    }
}
