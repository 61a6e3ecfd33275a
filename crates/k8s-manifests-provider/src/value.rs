//! Decoded configuration values.
//!
//! Every declared field decodes into a [`Presence`], so "not set" and "set to a zero value"
//! stay distinguishable all the way to the rendered manifest.
use std::{borrow::Cow, collections::BTreeMap};

use indexmap::IndexMap;
use serde::{Serialize, ser::SerializeMap};

/// Replaces a string scalar or map key while serializing. Returning `None` keeps the string.
pub type Rewrite<'a> = &'a dyn Fn(&str) -> Option<String>;

/// Serializes a value with every string scalar and map key passed through a [`Rewrite`].
///
/// Map keys are rewritten after sorting, so the rendered order stays the order of the original
/// keys.
pub struct Rewritten<'a, T: ?Sized> {
    value: &'a T,
    rewrite: Rewrite<'a>,
}

impl<'a, T: ?Sized> Rewritten<'a, T> {
    pub fn new(value: &'a T, rewrite: Rewrite<'a>) -> Self {
        Self { value, rewrite }
    }

    pub fn value(&self) -> &'a T {
        self.value
    }

    /// Wraps a value nested in this one with the same rewrite.
    pub fn nested<U: ?Sized>(&self, value: &'a U) -> Rewritten<'a, U> {
        Rewritten::new(value, self.rewrite)
    }

    pub fn string<'s>(&self, value: &'s str) -> Cow<'s, str> {
        match (self.rewrite)(value) {
            Some(rewritten) => Cow::Owned(rewritten),
            None => Cow::Borrowed(value),
        }
    }
}

/// The [`Rewrite`] which keeps every string.
pub fn keep(_: &str) -> Option<String> {
    None
}

/// Whether a field was given a value.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Presence<T> {
    #[default]
    Absent,
    Present(T),
}

impl<T> Presence<T> {
    pub fn present(&self) -> Option<&T> {
        match self {
            Self::Absent => None,
            Self::Present(value) => Some(value),
        }
    }
}

impl<T> From<Option<T>> for Presence<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Self::Present(value),
            None => Self::Absent,
        }
    }
}

/// A single decoded value.
#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    String(String),
    Bool(bool),
    Int64(i64),
    Float64(f64),

    /// Map entries are kept sorted by key, which keeps rendering deterministic.
    Map(BTreeMap<String, String>),
    List(Vec<Node>),
    Object(Object),
}

impl Node {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Self::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Number of entries of a list or map, zero for everything else.
    pub fn len(&self) -> usize {
        match self {
            Self::Map(map) => map.len(),
            Self::List(items) => items.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Converts the node into the attribute form handed back to the configuration engine:
    /// attribute names as keys, and `null` for absent fields.
    pub fn to_state(&self) -> serde_json::Value {
        match self {
            Self::String(value) => serde_json::Value::from(value.as_str()),
            Self::Bool(value) => serde_json::Value::from(*value),
            Self::Int64(value) => serde_json::Value::from(*value),
            Self::Float64(value) => serde_json::Value::from(*value),
            Self::Map(map) => map
                .iter()
                .map(|(key, value)| (key.clone(), serde_json::Value::from(value.as_str())))
                .collect::<serde_json::Map<_, _>>()
                .into(),
            Self::List(items) => items.iter().map(Self::to_state).collect(),
            Self::Object(object) => object.to_state().into(),
        }
    }
}

impl Serialize for Node {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        Rewritten::new(self, &keep).serialize(serializer)
    }
}

impl Serialize for Rewritten<'_, Node> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.value {
            Node::String(value) => serializer.serialize_str(&self.string(value)),
            Node::Bool(value) => serializer.serialize_bool(*value),
            Node::Int64(value) => serializer.serialize_i64(*value),
            Node::Float64(value) => serializer.serialize_f64(*value),
            Node::Map(map) => {
                let mut entries = serializer.serialize_map(Some(map.len()))?;
                for (key, value) in map {
                    entries.serialize_entry(&self.string(key), &self.string(value))?;
                }
                entries.end()
            }
            Node::List(items) => serializer.collect_seq(items.iter().map(|item| self.nested(item))),
            Node::Object(object) => self.nested(object).serialize(serializer),
        }
    }
}

/// A field of an [`Object`], remembering the key it is rendered under.
#[derive(Clone, Debug, PartialEq)]
pub struct Member {
    wire_name: String,
    value: Presence<Node>,
}

impl Member {
    pub fn wire_name(&self) -> &str {
        &self.wire_name
    }

    pub fn value(&self) -> &Presence<Node> {
        &self.value
    }
}

/// The decoded fields of a nested object, in declaration order, keyed by attribute name.
///
/// Serializing an object renders the present members under their wire names and skips absent
/// ones entirely.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Object {
    members: IndexMap<String, Member>,
}

impl Object {
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        wire_name: impl Into<String>,
        value: Presence<Node>,
    ) {
        self.members.insert(
            name.into(),
            Member {
                wire_name: wire_name.into(),
                value,
            },
        );
    }

    pub fn member(&self, name: &str) -> Option<&Member> {
        self.members.get(name)
    }

    /// Returns the value of a present member.
    pub fn get(&self, name: &str) -> Option<&Node> {
        self.members.get(name)?.value.present()
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name)?.as_str()
    }

    pub fn get_object(&self, name: &str) -> Option<&Self> {
        self.get(name)?.as_object()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Member)> {
        self.members
            .iter()
            .map(|(name, member)| (name.as_str(), member))
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn to_state(&self) -> serde_json::Map<String, serde_json::Value> {
        self.members
            .iter()
            .map(|(name, member)| {
                let value = match &member.value {
                    Presence::Present(node) => node.to_state(),
                    Presence::Absent => serde_json::Value::Null,
                };
                (name.clone(), value)
            })
            .collect()
    }
}

impl Serialize for Object {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        Rewritten::new(self, &keep).serialize(serializer)
    }
}

impl Serialize for Rewritten<'_, Object> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let present = self
            .value
            .members
            .values()
            .filter_map(|member| Some((&member.wire_name, member.value.present()?)))
            .collect::<Vec<_>>();

        let mut map = serializer.serialize_map(Some(present.len()))?;
        for (wire_name, node) in present {
            map.serialize_entry(wire_name, &self.nested(node))?;
        }
        map.end()
    }
}
